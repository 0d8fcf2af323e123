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

/// Compressed-sparse-row matrix.
///
/// `row_offsets` holds absolute positions into `col_idxs`/`values`; a row
/// slice shares all three buffers and only moves `row_start`.
#[derive(Debug, Clone)]
pub struct CsrMatrix<VT> {
    num_rows: usize,
    num_cols: usize,
    row_start: usize,
    row_offsets: Arc<Vec<usize>>,
    col_idxs: Arc<Vec<usize>>,
    values: Arc<Vec<VT>>,
}

impl<VT: Scalar> CsrMatrix<VT> {
    /// An all-zero matrix with no stored entries.
    pub fn empty(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            row_start: 0,
            row_offsets: Arc::new(vec![0; num_rows + 1]),
            col_idxs: Arc::new(Vec::new()),
            values: Arc::new(Vec::new()),
        }
    }

    pub fn from_parts(
        num_rows: usize,
        num_cols: usize,
        row_offsets: Vec<usize>,
        col_idxs: Vec<usize>,
        values: Vec<VT>,
    ) -> Result<Self, MatrixError> {
        if row_offsets.len() != num_rows + 1 {
            return Err(MatrixError::InvalidCsr(format!(
                "expected {} row offsets, got {}",
                num_rows + 1,
                row_offsets.len()
            )));
        }
        if col_idxs.len() != values.len() {
            return Err(MatrixError::InvalidCsr(
                "column index and value buffers differ in length".into(),
            ));
        }
        if row_offsets.first() != Some(&0) || row_offsets.last() != Some(&values.len()) {
            return Err(MatrixError::InvalidCsr("row offsets must span the value buffer".into()));
        }
        if row_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(MatrixError::InvalidCsr("row offsets must be non-decreasing".into()));
        }
        if let Some(&col) = col_idxs.iter().find(|&&c| c >= num_cols) {
            return Err(MatrixError::InvalidCsr(format!("column index {col} out of bounds")));
        }
        Ok(Self {
            num_rows,
            num_cols,
            row_start: 0,
            row_offsets: Arc::new(row_offsets),
            col_idxs: Arc::new(col_idxs),
            values: Arc::new(values),
        })
    }

    /// Row offsets of this matrix (or view), as absolute buffer positions.
    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets[self.row_start..=self.row_start + self.num_rows]
    }

    fn span(&self) -> (usize, usize) {
        let offsets = self.row_offsets();
        (offsets[0], offsets[self.num_rows])
    }

    pub fn num_non_zeros(&self) -> usize {
        let (begin, end) = self.span();
        end - begin
    }

    pub fn values(&self) -> &[VT] {
        let (begin, end) = self.span();
        &self.values[begin..end]
    }

    pub fn col_idxs(&self) -> &[usize] {
        let (begin, end) = self.span();
        &self.col_idxs[begin..end]
    }

    /// Column indices and values stored for `row`.
    pub fn row(&self, row: usize) -> (&[usize], &[VT]) {
        let offsets = self.row_offsets();
        let (begin, end) = (offsets[row], offsets[row + 1]);
        (&self.col_idxs[begin..end], &self.values[begin..end])
    }

    pub fn get(&self, row: usize, col: usize) -> VT {
        let (cols, vals) = self.row(row);
        match cols.binary_search(&col) {
            Ok(pos) => vals[pos],
            Err(_) => VT::zero(),
        }
    }

    /// Append rows `[begin, end)` to buffers under construction.
    fn append_rows(
        &self,
        begin: usize,
        end: usize,
        offsets: &mut Vec<usize>,
        cols: &mut Vec<usize>,
        vals: &mut Vec<VT>,
    ) {
        let own = self.row_offsets();
        let (lo, hi) = (own[begin], own[end]);
        let base = cols.len();
        cols.extend_from_slice(&self.col_idxs[lo..hi]);
        vals.extend_from_slice(&self.values[lo..hi]);
        offsets.extend(own[begin + 1..=end].iter().map(|o| o - lo + base));
    }

    fn check_block(&self, row_offset: usize, block: &Self) -> Result<(), MatrixError> {
        if block.num_cols != self.num_cols {
            return Err(MatrixError::ShapeMismatch {
                expected_rows: block.num_rows,
                expected_cols: self.num_cols,
                found_rows: block.num_rows,
                found_cols: block.num_cols,
            });
        }
        check_row_range(row_offset, row_offset + block.num_rows, self.num_rows)
    }

    /// Owned buffers with row offsets rebased to zero.
    fn to_parts(&self) -> (Vec<usize>, Vec<usize>, Vec<VT>) {
        let base = self.row_offsets()[0];
        let offsets = self.row_offsets().iter().map(|o| o - base).collect();
        (offsets, self.col_idxs().to_vec(), self.values().to_vec())
    }
}

impl<VT: Scalar> PartialEq for CsrMatrix<VT> {
    fn eq(&self, other: &Self) -> bool {
        self.num_rows == other.num_rows
            && self.num_cols == other.num_cols
            && (0..self.num_rows).all(|r| self.row(r) == other.row(r))
    }
}

impl<VT: Scalar> Matrix for CsrMatrix<VT> {
    type Value = VT;

    const KIND: MatrixKind = MatrixKind::Csr;

    fn create(num_rows: usize, num_cols: usize, _zero: bool) -> Self {
        Self::empty(num_rows, num_cols)
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn buffer_size(&self) -> usize {
        let nnz = self.num_non_zeros();
        nnz * (mem::size_of::<VT>() + mem::size_of::<usize>())
            + (self.num_rows + 1) * mem::size_of::<usize>()
    }

    fn slice_rows(&self, begin: usize, end: usize) -> Result<Self, MatrixError> {
        check_row_range(begin, end, self.num_rows)?;
        Ok(Self {
            num_rows: end - begin,
            num_cols: self.num_cols,
            row_start: self.row_start + begin,
            row_offsets: Arc::clone(&self.row_offsets),
            col_idxs: Arc::clone(&self.col_idxs),
            values: Arc::clone(&self.values),
        })
    }

    fn write_rows(&mut self, row_offset: usize, block: &Self) -> Result<(), MatrixError> {
        self.check_block(row_offset, block)?;
        let row_end = row_offset + block.num_rows;

        let (offsets, cols, vals) = self.to_parts();
        let (cut_begin, cut_end) = (offsets[row_offset], offsets[row_end]);
        let inserted = block.num_non_zeros();

        let mut new_cols = Vec::with_capacity(cols.len() - (cut_end - cut_begin) + inserted);
        new_cols.extend_from_slice(&cols[..cut_begin]);
        new_cols.extend_from_slice(block.col_idxs());
        new_cols.extend_from_slice(&cols[cut_end..]);

        let mut new_vals = Vec::with_capacity(new_cols.len());
        new_vals.extend_from_slice(&vals[..cut_begin]);
        new_vals.extend_from_slice(block.values());
        new_vals.extend_from_slice(&vals[cut_end..]);

        let block_base = block.row_offsets()[0];
        let mut new_offsets = Vec::with_capacity(self.num_rows + 1);
        new_offsets.extend_from_slice(&offsets[..=row_offset]);
        new_offsets.extend(block.row_offsets()[1..].iter().map(|o| cut_begin + (o - block_base)));
        new_offsets.extend(offsets[row_end + 1..].iter().map(|o| o - (cut_end - cut_begin) + inserted));

        self.row_start = 0;
        self.row_offsets = Arc::new(new_offsets);
        self.col_idxs = Arc::new(new_cols);
        self.values = Arc::new(new_vals);
        Ok(())
    }

    /// Rebuilds the buffers once for all blocks.
    fn write_row_blocks(&mut self, blocks: &[(usize, Self)]) -> Result<(), MatrixError> {
        let mut next_free = 0;
        let mut nnz = self.num_non_zeros();
        for (row_offset, block) in blocks {
            self.check_block(*row_offset, block)?;
            if *row_offset < next_free {
                return Err(MatrixError::InvalidCsr(format!("row block at {row_offset} overlaps its predecessor")));
            }
            next_free = row_offset + block.num_rows;
            nnz += block.num_non_zeros();
        }

        let mut offsets = Vec::with_capacity(self.num_rows + 1);
        let mut cols = Vec::with_capacity(nnz);
        let mut vals = Vec::with_capacity(nnz);
        offsets.push(0);
        let mut row = 0;
        for (row_offset, block) in blocks {
            self.append_rows(row, *row_offset, &mut offsets, &mut cols, &mut vals);
            block.append_rows(0, block.num_rows, &mut offsets, &mut cols, &mut vals);
            row = row_offset + block.num_rows;
        }
        self.append_rows(row, self.num_rows, &mut offsets, &mut cols, &mut vals);

        self.row_start = 0;
        self.row_offsets = Arc::new(offsets);
        self.col_idxs = Arc::new(cols);
        self.values = Arc::new(vals);
        Ok(())
    }

    fn accumulate(&mut self, _other: &Self) -> Result<(), MatrixError> {
        Err(MatrixError::Unsupported { op: "accumulate", kind: MatrixKind::Csr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 0 2
    // 0 0 0
    // 0 3 0
    fn sample() -> CsrMatrix<f64> {
        CsrMatrix::from_parts(3, 3, vec![0, 2, 2, 3], vec![0, 2, 1], vec![1.0, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn slice_shares_buffers() {
        let m = sample();
        let view = m.slice_rows(1, 3).unwrap();
        assert_eq!(view.num_rows(), 2);
        assert_eq!(view.num_non_zeros(), 1);
        assert_eq!(view.get(1, 1), 3.0);
        assert_eq!(view.get(0, 1), 0.0);
    }

    #[test]
    fn write_rows_splices_blocks() {
        let m = sample();
        let mut out = CsrMatrix::<f64>::create(3, 3, false);
        out.write_rows(2, &m.slice_rows(2, 3).unwrap()).unwrap();
        out.write_rows(0, &m.slice_rows(0, 2).unwrap()).unwrap();
        assert_eq!(out, m);
        assert_eq!(out.row_offsets(), &[0, 2, 2, 3]);
    }

    #[test]
    fn row_blocks_are_assembled_in_one_pass() {
        let m = sample();
        let mut out = CsrMatrix::<f64>::create(3, 3, false);
        let blocks = vec![(0, m.slice_rows(0, 1).unwrap()), (2, m.slice_rows(2, 3).unwrap())];
        out.write_row_blocks(&blocks).unwrap();
        assert_eq!(out, m);
        assert_eq!(out.row_offsets(), &[0, 2, 2, 3]);
        assert_eq!(out.col_idxs(), &[0, 2, 1]);
    }

    #[test]
    fn row_blocks_keep_untouched_rows() {
        let mut m = sample();
        let replacement = CsrMatrix::from_parts(1, 3, vec![0, 1], vec![2], vec![9.0]).unwrap();
        m.write_row_blocks(&[(1, replacement)]).unwrap();
        assert_eq!(m.row(0), (&[0usize, 2][..], &[1.0, 2.0][..]));
        assert_eq!(m.row(1), (&[2usize][..], &[9.0][..]));
        assert_eq!(m.get(2, 1), 3.0);
        assert_eq!(m.num_non_zeros(), 4);
    }

    #[test]
    fn overlapping_row_blocks_are_rejected() {
        let m = sample();
        let mut out = CsrMatrix::<f64>::create(3, 3, false);
        let blocks = vec![(0, m.slice_rows(0, 2).unwrap()), (1, m.slice_rows(1, 2).unwrap())];
        assert!(matches!(out.write_row_blocks(&blocks), Err(MatrixError::InvalidCsr(_))));
    }

    #[test]
    fn rewriting_rows_replaces_entries() {
        let mut m = sample();
        let replacement =
            CsrMatrix::from_parts(1, 3, vec![0, 3], vec![0, 1, 2], vec![4.0, 5.0, 6.0]).unwrap();
        m.write_rows(0, &replacement).unwrap();
        assert_eq!(m.row(0), (&[0usize, 1, 2][..], &[4.0, 5.0, 6.0][..]));
        assert_eq!(m.get(2, 1), 3.0);
        assert_eq!(m.num_non_zeros(), 4);
    }

    #[test]
    fn accumulate_is_rejected() {
        let mut m = sample();
        let other = sample();
        assert!(matches!(m.accumulate(&other), Err(MatrixError::Unsupported { .. })));
    }

    #[test]
    fn from_parts_validates() {
        assert!(CsrMatrix::<f32>::from_parts(2, 2, vec![0, 1], vec![0], vec![1.0]).is_err());
        assert!(CsrMatrix::<f32>::from_parts(1, 2, vec![0, 1], vec![5], vec![1.0]).is_err());
        assert!(CsrMatrix::<f32>::from_parts(1, 2, vec![0, 2], vec![0], vec![1.0]).is_err());
    }
}
