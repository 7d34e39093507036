//! Compressed sparse column matrix (CSC) — the transpose storage direct-solver factors are
//! often returned in.

use crate::error::MatrixError;
use crate::memory::{DualBuffer, MemorySpace};

use super::MatrixShape;

/// A sparse matrix stored as `col_ptr[m+1]`, `row[nnz]`, `val[nnz]`: the column-major dual of
/// [`super::CsrMatrix`].
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    nnz: usize,
    symmetric: bool,
    expanded: bool,
    col_ptr: DualBuffer<usize>,
    row: DualBuffer<usize>,
    val: DualBuffer<f64>,
}

impl CscMatrix {
    pub fn new(nrows: usize, ncols: usize, symmetric: bool) -> Self {
        Self {
            nrows,
            ncols,
            nnz: 0,
            symmetric,
            expanded: false,
            col_ptr: DualBuffer::empty(),
            row: DualBuffer::empty(),
            val: DualBuffer::empty(),
        }
    }

    /// Builds a CSC matrix directly from already-factored arrays (e.g. an `L` or `U` factor
    /// handed back by a direct solver).
    pub fn from_arrays(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row: Vec<usize>,
        val: Vec<f64>,
        space: MemorySpace,
    ) -> Self {
        let nnz = val.len();
        let mut m = Self::new(nrows, ncols, false);
        m.nnz = nnz;
        m.expanded = true;
        m.col_ptr.update_resized(&col_ptr, space);
        m.row.update_resized(&row, space);
        m.val.update_resized(&val, space);
        m
    }

    pub fn col_ptr(&mut self, space: MemorySpace) -> Result<&[usize], MatrixError> {
        Ok(self.col_ptr.get(space)?)
    }

    pub fn row_data(&mut self, space: MemorySpace) -> Result<&[usize], MatrixError> {
        Ok(self.row.get(space)?)
    }

    pub fn values(&mut self, space: MemorySpace) -> Result<&[f64], MatrixError> {
        Ok(self.val.get(space)?)
    }

    /// Expands the column-pointer layout into `(row, col, val)` triplets: column `c` spans
    /// `col_ptr[c]..col_ptr[c+1]` in `row`/`val`. Feeds the shared COO -> CSR core in
    /// [`super::csr::csc_to_csr`].
    pub fn to_coo_triplets(
        &mut self,
        space: MemorySpace,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<f64>), MatrixError> {
        self.col_ptr.sync_to(space)?;
        self.row.sync_to(space)?;
        self.val.sync_to(space)?;
        let col_ptr = self.col_ptr(space)?.to_vec();
        let row = self.row_data(space)?.to_vec();
        let val = self.values(space)?.to_vec();
        let mut cols = Vec::with_capacity(row.len());
        for c in 0..self.ncols {
            for _ in col_ptr[c]..col_ptr[c + 1] {
                cols.push(c);
            }
        }
        Ok((row, cols, val))
    }
}

impl MatrixShape for CscMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn nnz(&self) -> usize {
        self.nnz
    }
    fn nnz_expanded(&self) -> usize {
        self.nnz
    }
    fn symmetric(&self) -> bool {
        self.symmetric
    }
    fn expanded(&self) -> bool {
        self.expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::csr::csc_to_csr;

    #[test]
    fn csc_to_csr_transposes_structure() {
        // Column-major identity-ish: col 0 -> row 0 (1.0), col 1 -> row 1 (2.0)
        let mut csc = CscMatrix::from_arrays(
            2,
            2,
            vec![0, 1, 2],
            vec![0, 1],
            vec![1.0, 2.0],
            MemorySpace::Host,
        );
        let mut csr = csc_to_csr(&mut csc, MemorySpace::Host).unwrap();
        let row_ptr = csr.row_ptr(MemorySpace::Host).unwrap();
        assert_eq!(row_ptr, &[0, 1, 2]);
        let vals = csr.values(MemorySpace::Host).unwrap();
        assert_eq!(vals, &[1.0, 2.0]);
    }
}
