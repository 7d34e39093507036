//! Dense vector / multivector with dual residency (C3).

use crate::error::MemoryError;
use crate::memory::{DualBuffer, MemorySpace};

/// A packed column-major dense buffer of size `n x k` (`k == 1` for a plain vector), dual
/// resident the same way sparse matrices are.
pub struct Multivector {
    n: usize,
    k: usize,
    data: DualBuffer<f64>,
}

impl Multivector {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            k,
            data: DualBuffer::empty(),
        }
    }

    pub fn vector(n: usize) -> Self {
        Self::new(n, 1)
    }

    pub fn nrows(&self) -> usize {
        self.n
    }

    pub fn ncols(&self) -> usize {
        self.k
    }

    pub fn allocate(&mut self, space: MemorySpace) {
        self.data.allocate(space, self.n * self.k);
    }

    pub fn update(&mut self, values: &[f64], space: MemorySpace) -> Result<(), MemoryError> {
        if values.len() != self.n * self.k {
            return Err(MemoryError::SizeMismatch {
                requested: values.len(),
                existing: self.n * self.k,
            });
        }
        self.data.update(values, space);
        Ok(())
    }

    pub fn data(&mut self, space: MemorySpace) -> Result<&[f64], MemoryError> {
        self.data.get(space)
    }

    pub fn data_mut(&mut self, space: MemorySpace) -> Result<&mut [f64], MemoryError> {
        self.data.get_mut(space)
    }

    /// Borrow of one column, synchronizing `space` first.
    pub fn column(&mut self, col: usize, space: MemorySpace) -> Result<&[f64], MemoryError> {
        let n = self.n;
        let full = self.data.get(space)?;
        Ok(&full[col * n..(col + 1) * n])
    }

    /// Mutable borrow of one column, synchronizing `space` first.
    pub fn column_mut(&mut self, col: usize, space: MemorySpace) -> Result<&mut [f64], MemoryError> {
        let n = self.n;
        let full = self.data.get_mut(space)?;
        Ok(&mut full[col * n..(col + 1) * n])
    }

    pub fn copy_data(&mut self, dst: MemorySpace) -> Result<(), MemoryError> {
        self.data.sync_to(dst)
    }

    pub fn is_valid(&self, space: MemorySpace) -> bool {
        self.data.is_valid(space)
    }
}
