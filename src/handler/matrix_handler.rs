//! Matrix handler (C5): polymorphic SpMV, format conversion, value-change-flag bookkeeping.

use std::collections::HashMap;

use crate::backend::ExecutionBackend;
use crate::error::HandlerError;
use crate::matrix::csr::{coo_to_csr, csc_to_csr};
use crate::matrix::{CooMatrix, CscMatrix, CsrMatrix, Format, MatrixShape};
use crate::memory::MemorySpace;
use crate::vector::Multivector;

/// Backend-specific analysis cached per `(matrix identity, format, space)` — in this CPU-only
/// crate there is no real "analyze once" buffer to amortize, so the descriptor only tracks the
/// expanded nonzero count it was built against, but the cache-and-invalidate shape matches a
/// vendor backend where this would hold a real opaque handle.
#[derive(Debug, Clone, Copy)]
struct Descriptor {
    nnz_expanded: usize,
}

/// Owns the registry of matrix identity tokens and their cached SpMV descriptors. One handler is
/// shared across every matrix the caller touches; matrices never hold a reference back (§9
/// "Cyclic refs").
pub struct MatrixHandler<B: ExecutionBackend> {
    backend: B,
    next_id: u64,
    descriptors: HashMap<(u64, Format, MemorySpace), Descriptor>,
}

impl<B: ExecutionBackend> MatrixHandler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            next_id: 1,
            descriptors: HashMap::new(),
        }
    }

    fn register(&mut self, a: &mut CsrMatrix) -> u64 {
        if let Some(id) = a.identity() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        a.set_identity(id);
        id
    }

    /// `y <- alpha*A*x + beta*y`. Refreshes and caches the backend descriptor for
    /// `(identity, Csr, space)` the first time it is seen or whenever the matrix's value-change
    /// flag is set; the flag is cleared once the refresh completes.
    pub fn matvec(
        &mut self,
        a: &mut CsrMatrix,
        x: &mut Multivector,
        y: &mut Multivector,
        alpha: f64,
        beta: f64,
        space: MemorySpace,
    ) -> Result<(), HandlerError> {
        if a.ncols() != x.nrows() || a.nrows() != y.nrows() {
            return Err(HandlerError::LengthMismatch {
                expected: a.nrows(),
                got: y.nrows(),
            });
        }
        if space != self.backend.space() {
            return Err(HandlerError::NotImplemented);
        }

        let id = self.register(a);
        let key = (id, Format::Csr, space);
        let nnz_expanded = a.nnz_expanded();
        let stale = match self.descriptors.get(&key) {
            Some(d) => d.nnz_expanded != nnz_expanded || a.values_changed(),
            None => true,
        };
        if stale {
            self.descriptors.insert(key, Descriptor { nnz_expanded });
            a.set_values_changed(false);
        }

        let row_ptr = a.row_ptr(space).map_err(HandlerError::from)?.to_vec();
        let col = a.col_data(space).map_err(HandlerError::from)?.to_vec();
        let val = a.values(space).map_err(HandlerError::from)?.to_vec();
        let n = a.nrows();
        let xs = x
            .data(space)
            .map_err(|_| HandlerError::Backend { code: -1 })?
            .to_vec();
        let ys = y
            .data_mut(space)
            .map_err(|_| HandlerError::Backend { code: -1 })?;
        self.backend.spmv(&row_ptr, &col, &val, n, alpha, &xs, beta, ys);
        Ok(())
    }

    /// Drops a matrix's cached descriptors for every `(format, space)` combination, used when
    /// the caller replaces the nonzero pattern rather than just the values.
    pub fn invalidate(&mut self, a: &CsrMatrix) {
        if let Some(id) = a.identity() {
            self.descriptors.retain(|&(mid, _, _), _| mid != id);
        }
    }

    /// Dispatches COO -> CSR through the host algorithm of §4.1 (the only backend this crate
    /// ships; a device backend would reuse vendor conversion utilities here instead).
    pub fn coo2csr(
        &mut self,
        src: &mut CooMatrix,
        space: MemorySpace,
    ) -> Result<CsrMatrix, HandlerError> {
        Ok(coo_to_csr(src, space)?)
    }

    pub fn csc2csr(
        &mut self,
        src: &mut CscMatrix,
        space: MemorySpace,
    ) -> Result<CsrMatrix, HandlerError> {
        Ok(csc_to_csr(src, space)?)
    }

    /// Max absolute row sum, `max_i sum_j |A_ij|`.
    pub fn matrix_inf_norm(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> Result<f64, HandlerError> {
        let row_ptr = a.row_ptr(space).map_err(HandlerError::from)?.to_vec();
        let val = a.values(space).map_err(HandlerError::from)?.to_vec();
        let mut norm = 0.0f64;
        for r in 0..a.nrows() {
            let row_sum: f64 = val[row_ptr[r]..row_ptr[r + 1]].iter().map(|v| v.abs()).sum();
            norm = norm.max(row_sum);
        }
        Ok(norm)
    }

    /// Nonzero-count-per-row diagnostic counter, used by preconditioners that want to bias
    /// ordering toward denser rows.
    pub fn row_histogram(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> Result<Vec<usize>, HandlerError> {
        let row_ptr = a.row_ptr(space).map_err(HandlerError::from)?.to_vec();
        Ok((0..a.nrows()).map(|r| row_ptr[r + 1] - row_ptr[r]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn small_matrix() -> CsrMatrix {
        let mut coo = CooMatrix::new(2, 2, 0, false, false);
        coo.update_data(&[0, 0, 1], &[0, 1, 1], &[2.0, -1.0, 2.0], MemorySpace::Host)
            .unwrap();
        coo_to_csr(&mut coo, MemorySpace::Host).unwrap()
    }

    #[test]
    fn matvec_computes_spmv_combo() {
        let mut handler = MatrixHandler::new(CpuBackend);
        let mut a = small_matrix();
        let mut x = Multivector::vector(2);
        x.update(&[1.0, 1.0], MemorySpace::Host).unwrap();
        let mut y = Multivector::vector(2);
        y.update(&[0.0, 0.0], MemorySpace::Host).unwrap();

        handler
            .matvec(&mut a, &mut x, &mut y, 1.0, 0.0, MemorySpace::Host)
            .unwrap();
        assert_eq!(y.data(MemorySpace::Host).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn repeated_matvec_reuses_descriptor_until_values_change() {
        let mut handler = MatrixHandler::new(CpuBackend);
        let mut a = small_matrix();
        let mut x = Multivector::vector(2);
        x.update(&[1.0, 1.0], MemorySpace::Host).unwrap();
        let mut y = Multivector::vector(2);
        y.update(&[0.0, 0.0], MemorySpace::Host).unwrap();

        handler
            .matvec(&mut a, &mut x, &mut y, 1.0, 0.0, MemorySpace::Host)
            .unwrap();
        assert!(!a.values_changed());

        let id = a.identity().unwrap();
        let key_present = handler.descriptors.contains_key(&(id, Format::Csr, MemorySpace::Host));
        assert!(key_present);
    }

    #[test]
    fn matrix_inf_norm_is_max_abs_row_sum() {
        let mut handler = MatrixHandler::new(CpuBackend);
        let mut a = small_matrix();
        let norm = handler.matrix_inf_norm(&mut a, MemorySpace::Host).unwrap();
        assert_eq!(norm, 3.0); // row 0: |2|+|-1| = 3, row 1: |2| = 2
    }
}
