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

use std::mem;
use std::sync::Arc;

use super::{check_row_range, Matrix, MatrixError, MatrixKind, Scalar};

/// Row-major dense matrix.
///
/// Values live in a shared buffer; [`Matrix::slice_rows`] produces a view
/// into the same buffer. Mutation through [`DenseMatrix::values_mut`] copies
/// the viewed rows first when the buffer is shared or only partially viewed.
#[derive(Debug, Clone)]
pub struct DenseMatrix<VT> {
    num_rows: usize,
    num_cols: usize,
    offset: usize,
    values: Arc<Vec<VT>>,
}

impl<VT: Scalar> DenseMatrix<VT> {
    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            offset: 0,
            values: Arc::new(vec![VT::zero(); num_rows * num_cols]),
        }
    }

    pub fn from_vec(num_rows: usize, num_cols: usize, values: Vec<VT>) -> Result<Self, MatrixError> {
        if values.len() != num_rows * num_cols {
            return Err(MatrixError::ValueCount {
                expected: num_rows * num_cols,
                found: values.len(),
            });
        }
        Ok(Self { num_rows, num_cols, offset: 0, values: Arc::new(values) })
    }

    /// Row-major values of this matrix (or view).
    pub fn values(&self) -> &[VT] {
        &self.values[self.offset..self.offset + self.num_rows * self.num_cols]
    }

    pub fn values_mut(&mut self) -> &mut [VT] {
        let len = self.num_rows * self.num_cols;
        if self.offset != 0 || self.values.len() != len {
            self.values = Arc::new(self.values().to_vec());
            self.offset = 0;
        }
        Arc::make_mut(&mut self.values).as_mut_slice()
    }

    pub fn row(&self, row: usize) -> &[VT] {
        let start = row * self.num_cols;
        &self.values()[start..start + self.num_cols]
    }

    pub fn get(&self, row: usize, col: usize) -> VT {
        self.values()[row * self.num_cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: VT) {
        let cols = self.num_cols;
        self.values_mut()[row * cols + col] = value;
    }

    fn check_same_shape(&self, other: &Self) -> Result<(), MatrixError> {
        if self.num_rows != other.num_rows || self.num_cols != other.num_cols {
            return Err(MatrixError::ShapeMismatch {
                expected_rows: self.num_rows,
                expected_cols: self.num_cols,
                found_rows: other.num_rows,
                found_cols: other.num_cols,
            });
        }
        Ok(())
    }
}

impl<VT: Scalar> PartialEq for DenseMatrix<VT> {
    fn eq(&self, other: &Self) -> bool {
        self.num_rows == other.num_rows
            && self.num_cols == other.num_cols
            && self.values() == other.values()
    }
}

impl<VT: Scalar> Matrix for DenseMatrix<VT> {
    type Value = VT;

    const KIND: MatrixKind = MatrixKind::Dense;

    // Safe Rust has no uninitialised allocation, so `zero = false` still
    // yields zeros; callers must not rely on that.
    fn create(num_rows: usize, num_cols: usize, _zero: bool) -> Self {
        Self::zeros(num_rows, num_cols)
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn buffer_size(&self) -> usize {
        self.num_rows * self.num_cols * mem::size_of::<VT>()
    }

    fn slice_rows(&self, begin: usize, end: usize) -> Result<Self, MatrixError> {
        check_row_range(begin, end, self.num_rows)?;
        Ok(Self {
            num_rows: end - begin,
            num_cols: self.num_cols,
            offset: self.offset + begin * self.num_cols,
            values: Arc::clone(&self.values),
        })
    }

    fn write_rows(&mut self, row_offset: usize, block: &Self) -> Result<(), MatrixError> {
        if block.num_cols != self.num_cols {
            return Err(MatrixError::ShapeMismatch {
                expected_rows: block.num_rows,
                expected_cols: self.num_cols,
                found_rows: block.num_rows,
                found_cols: block.num_cols,
            });
        }
        check_row_range(row_offset, row_offset + block.num_rows, self.num_rows)?;
        let start = row_offset * self.num_cols;
        let src = block.values();
        self.values_mut()[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn accumulate(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.check_same_shape(other)?;
        for (dst, src) in self.values_mut().iter_mut().zip(other.values()) {
            *dst += *src;
        }
        Ok(())
    }
}
