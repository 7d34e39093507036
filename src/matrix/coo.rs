//! Coordinate-format sparse matrix (COO).

use crate::error::MatrixError;
use crate::memory::{DualBuffer, MemorySpace};

use super::MatrixShape;

/// A sparse matrix stored as parallel `row[nnz]`, `col[nnz]`, `val[nnz]` arrays, each
/// dual-resident. This is the format a caller assembles a system in before handing it to a
/// [`crate::handler::matrix_handler::MatrixHandler`] for conversion to CSR.
pub struct CooMatrix {
    nrows: usize,
    ncols: usize,
    nnz: usize,
    symmetric: bool,
    expanded: bool,
    row: DualBuffer<usize>,
    col: DualBuffer<usize>,
    val: DualBuffer<f64>,
}

impl CooMatrix {
    /// Creates an empty matrix of the given shape; no nonzero arrays are allocated yet.
    pub fn new(nrows: usize, ncols: usize, nnz: usize, symmetric: bool, expanded: bool) -> Self {
        Self {
            nrows,
            ncols,
            nnz,
            symmetric,
            expanded,
            row: DualBuffer::empty(),
            col: DualBuffer::empty(),
            val: DualBuffer::empty(),
        }
    }

    /// Copies `(row, col, val)` triplets into `dst_space`, allocating it on demand, and marks
    /// `dst_space` fresh / the other side stale. Fails if any `(i, j)` falls outside the
    /// declared shape.
    pub fn update_data(
        &mut self,
        row: &[usize],
        col: &[usize],
        val: &[f64],
        dst_space: MemorySpace,
    ) -> Result<(), MatrixError> {
        if row.len() != col.len() || row.len() != val.len() {
            return Err(MatrixError::DimensionMismatch {
                message: "row/col/val length mismatch".into(),
            });
        }
        for (&i, &j) in row.iter().zip(col.iter()) {
            if i >= self.nrows || j >= self.ncols {
                return Err(MatrixError::IndexOutOfRange);
            }
        }
        self.nnz = row.len();
        self.row.update_resized(row, dst_space);
        self.col.update_resized(col, dst_space);
        self.val.update_resized(val, dst_space);
        Ok(())
    }

    pub fn row_data(&mut self, space: MemorySpace) -> Result<&[usize], MatrixError> {
        Ok(self.row.get(space)?)
    }

    pub fn col_data(&mut self, space: MemorySpace) -> Result<&[usize], MatrixError> {
        Ok(self.col.get(space)?)
    }

    pub fn values(&mut self, space: MemorySpace) -> Result<&[f64], MatrixError> {
        Ok(self.val.get(space)?)
    }

    /// Borrows the three triplet arrays for `space` at once, synchronizing each independently.
    pub fn triplets(
        &mut self,
        space: MemorySpace,
    ) -> Result<(&[usize], &[usize], &[f64]), MatrixError> {
        self.row.sync_to(space)?;
        self.col.sync_to(space)?;
        self.val.sync_to(space)?;
        Ok((
            self.row.get(space)?,
            self.col.get(space)?,
            self.val.get(space)?,
        ))
    }
}

impl MatrixShape for CooMatrix {
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
