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

//! Given-values generator for small fixtures.
//!
//! # Example
//! ```
//! use mind_vectorized::matrix::{gen_given_vals, DenseMatrix};
//! // 3 1 4
//! // 1 5 9
//! let m: DenseMatrix<f64> = gen_given_vals(2, &[3.0, 1.0, 4.0, 1.0, 5.0, 9.0]).unwrap();
//! assert_eq!(m.get(1, 2), 9.0);
//! ```

use super::{CsrMatrix, DenseMatrix, Matrix, MatrixError, Scalar};

/// Matrices that can be built from row-major values.
pub trait GivenVals: Matrix {
    fn from_given_vals(num_rows: usize, elements: &[Self::Value]) -> Result<Self, MatrixError>;
}

/// Populate a matrix of `num_rows` rows with `elements` in row-major order.
///
/// The element count must be divisible by `num_rows`.
pub fn gen_given_vals<M: GivenVals>(num_rows: usize, elements: &[M::Value]) -> Result<M, MatrixError> {
    M::from_given_vals(num_rows, elements)
}

fn num_cols_for(num_rows: usize, num_cells: usize) -> Result<usize, MatrixError> {
    if num_rows == 0 {
        return Err(MatrixError::ZeroRows);
    }
    if num_cells % num_rows != 0 {
        return Err(MatrixError::NotDivisible { elements: num_cells, rows: num_rows });
    }
    Ok(num_cells / num_rows)
}

impl<VT: Scalar> GivenVals for DenseMatrix<VT> {
    fn from_given_vals(num_rows: usize, elements: &[VT]) -> Result<Self, MatrixError> {
        let num_cols = num_cols_for(num_rows, elements.len())?;
        DenseMatrix::from_vec(num_rows, num_cols, elements.to_vec())
    }
}

impl<VT: Scalar> GivenVals for CsrMatrix<VT> {
    fn from_given_vals(num_rows: usize, elements: &[VT]) -> Result<Self, MatrixError> {
        let num_cols = num_cols_for(num_rows, elements.len())?;
        let mut row_offsets = Vec::with_capacity(num_rows + 1);
        let mut col_idxs = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);
        for row in elements.chunks(num_cols.max(1)).take(num_rows) {
            for (col, &v) in row.iter().enumerate() {
                if v != VT::zero() {
                    col_idxs.push(col);
                    values.push(v);
                }
            }
            row_offsets.push(values.len());
        }
        // Zero-column input yields no chunks; pad the empty rows.
        row_offsets.resize(num_rows + 1, values.len());
        CsrMatrix::from_parts(num_rows, num_cols, row_offsets, col_idxs, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_from_given_values() {
        let m: DenseMatrix<i32> = gen_given_vals(2, &[3, 1, 4, 1, 5, 9]).unwrap();
        assert_eq!((m.num_rows(), m.num_cols()), (2, 3));
        assert_eq!(m.values(), &[3, 1, 4, 1, 5, 9]);
    }

    #[test]
    fn csr_skips_zeros() {
        let m: CsrMatrix<f64> = gen_given_vals(2, &[0.0, 2.0, 0.0, 1.0]).unwrap();
        assert_eq!(m.row_offsets(), &[0, 1, 2]);
        assert_eq!(m.col_idxs(), &[1, 1]);
        assert_eq!(m.values(), &[2.0, 1.0]);
    }

    #[test]
    fn rejects_indivisible_element_count() {
        let err = gen_given_vals::<DenseMatrix<f32>>(4, &[1.0; 6]).unwrap_err();
        assert_eq!(err, MatrixError::NotDivisible { elements: 6, rows: 4 });
        assert_eq!(gen_given_vals::<CsrMatrix<f32>>(0, &[]).unwrap_err(), MatrixError::ZeroRows);
    }

    #[test]
    fn zero_columns_produce_empty_rows() {
        let m: CsrMatrix<f32> = gen_given_vals(3, &[]).unwrap();
        assert_eq!(m.row_offsets(), &[0, 0, 0, 0]);
        assert_eq!(m.num_cols(), 0);
    }
}
