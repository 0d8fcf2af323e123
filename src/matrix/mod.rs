// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Matrix collaborators consumed by the vectorized engine.
//!
//! The engine never inspects matrix internals beyond the [`Matrix`] trait:
//! shape queries, a byte-size estimate for accelerator budgeting, a factory,
//! row slicing for row-partitioned inputs, and the two merge primitives used
//! by output combination. Two representations are provided:
//!
//! - [`DenseMatrix`]: row-major values behind a shared buffer, so row slices
//!   are cheap views.
//! - [`CsrMatrix`]: compressed sparse rows. Only row-wise combination is
//!   supported for CSR outputs.

mod csr;
mod datagen;
mod dense;

pub use csr::CsrMatrix;
pub use datagen::{gen_given_vals, GivenVals};
pub use dense::DenseMatrix;

use std::fmt;
use std::ops::AddAssign;

use num_traits::Num;

/// Element types storable in a matrix.
pub trait Scalar: Num + Copy + AddAssign + PartialOrd + fmt::Debug + Send + Sync + 'static {}

impl<T> Scalar for T where T: Num + Copy + AddAssign + PartialOrd + fmt::Debug + Send + Sync + 'static {}

/// Physical representation of a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixKind {
    Dense,
    Csr,
}

impl MatrixKind {
    /// Whether outputs of this representation can be merged by elementwise
    /// accumulation.
    pub fn supports_accumulate(self) -> bool {
        matches!(self, MatrixKind::Dense)
    }
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixKind::Dense => write!(f, "dense"),
            MatrixKind::Csr => write!(f, "csr"),
        }
    }
}

/// Errors raised by matrix construction and merge operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MatrixError {
    /// Two matrices that must agree in shape do not.
    #[error("shape mismatch: expected {expected_rows}x{expected_cols}, found {found_rows}x{found_cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },
    /// A row range falls outside the matrix.
    #[error("row range {begin}..{end} out of bounds for {rows} rows")]
    RowRange { begin: usize, end: usize, rows: usize },
    /// Generator input whose element count is not a multiple of the rows.
    #[error("{elements} elements cannot be split evenly into {rows} rows")]
    NotDivisible { elements: usize, rows: usize },
    /// Generator called with zero rows.
    #[error("number of rows must be positive")]
    ZeroRows,
    /// Value buffer length does not match the declared shape.
    #[error("expected {expected} values, got {found}")]
    ValueCount { expected: usize, found: usize },
    /// Malformed compressed-sparse-row buffers.
    #[error("invalid CSR structure: {0}")]
    InvalidCsr(String),
    /// Operation not available for this representation.
    #[error("{op} is not supported for {kind} matrices")]
    Unsupported { op: &'static str, kind: MatrixKind },
}

/// The matrix capability the engine is written against.
pub trait Matrix: Clone + fmt::Debug + Send + Sync + 'static {
    type Value: Scalar;

    const KIND: MatrixKind;

    /// Allocate a `num_rows x num_cols` matrix. When `zero` is false the
    /// content is unspecified and must be fully overwritten by the caller.
    fn create(num_rows: usize, num_cols: usize, zero: bool) -> Self;

    fn num_rows(&self) -> usize;

    fn num_cols(&self) -> usize;

    /// Logical cell count (`rows * cols`), independent of sparsity.
    fn num_items(&self) -> usize {
        self.num_rows() * self.num_cols()
    }

    /// Bytes occupied by the stored representation.
    fn buffer_size(&self) -> usize;

    /// View of rows `[begin, end)`.
    fn slice_rows(&self, begin: usize, end: usize) -> Result<Self, MatrixError>;

    /// Overwrite rows `[row_offset, row_offset + block.num_rows())` with `block`.
    fn write_rows(&mut self, row_offset: usize, block: &Self) -> Result<(), MatrixError>;

    /// Write every `(row_offset, block)` pair. Blocks are sorted by offset
    /// and do not overlap.
    fn write_row_blocks(&mut self, blocks: &[(usize, Self)]) -> Result<(), MatrixError> {
        for (row_offset, block) in blocks {
            self.write_rows(*row_offset, block)?;
        }
        Ok(())
    }

    /// Elementwise `self += other`.
    fn accumulate(&mut self, other: &Self) -> Result<(), MatrixError>;
}

pub(crate) fn check_row_range(begin: usize, end: usize, rows: usize) -> Result<(), MatrixError> {
    if begin > end || end > rows {
        return Err(MatrixError::RowRange { begin, end, rows });
    }
    Ok(())
}
