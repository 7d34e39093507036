//! Solver that bootstraps from another solver's column ordering instead of running its own
//! symbolic analysis — the Rust counterpart of the KLU -> cuSolverRf handoff in
//! `examples/r_KLU_rf_FGMRES.cpp`, where a first factorization's ordering seeds a second,
//! cheaper solver for the rest of a family-of-matrices sequence (§9 "Factor handoff between
//! solvers", S4).

use faer::dyn_stack::{MemBuffer, MemStack};
use faer::perm::Perm;
use faer::prelude::{Reborrow, ReborrowMut};
use faer::sparse::linalg::lu::simplicial::{self, SimplicialLu};
use faer::sparse::{SparseColMat, Triplet};
use faer::{Mat, MatMut};
use problemo::Problem;

use crate::error::{ResolveResult, SolverError, Via};
use crate::matrix::{CscMatrix, CsrMatrix, MatrixShape};
use crate::memory::MemorySpace;
use crate::vector::Multivector;
use crate::{E, I};

use super::{require_state, DirectSolver, FactorView, SolverState};

fn to_faer_mat(a: &mut CsrMatrix, space: MemorySpace) -> ResolveResult<SparseColMat<I, E>> {
    let (rows, cols, vals) = a.to_triplets(space).via(SolverError::MemoryAllocation)?;
    let triplets: Vec<Triplet<I, I, E>> = rows
        .into_iter()
        .zip(cols)
        .zip(vals)
        .map(|((r, c), v)| Triplet::new(r, c, v))
        .collect();
    SparseColMat::try_new_from_triplets(a.nrows(), a.ncols(), &triplets)
        .via(SolverError::MemoryAllocation)
}

/// Simplicial LU that skips COLAMD and reuses a `q` ordering borrowed from a seed solver's
/// [`FactorView`] at `setup`. `analyze` becomes a formality that just checks the seed ordering
/// was actually supplied — the expensive symbolic step happened once, on the family's first
/// matrix.
pub struct SeededLu {
    state: SolverState,
    mat: Option<SparseColMat<I, E>>,
    lu: Option<SimplicialLu<I, E>>,
    row_perm: Option<Perm<I>>,
    col_perm: Option<Perm<I>>,
}

impl SeededLu {
    pub fn new() -> Self {
        Self {
            state: SolverState::Created,
            mat: None,
            lu: None,
            row_perm: None,
            col_perm: None,
        }
    }
}

impl Default for SeededLu {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectSolver for SeededLu {
    fn state(&self) -> SolverState {
        self.state
    }

    fn setup(&mut self, a: &mut CsrMatrix, seed: Option<FactorView<'_>>, space: MemorySpace) -> ResolveResult<()> {
        let q = seed
            .and_then(|s| s.q)
            .ok_or(SolverError::OutOfOrder {
                expected: "a seed solver's q ordering",
                attempted: "setup",
            })
            .map_err(Problem::from)?;
        let ncols = a.ncols();
        if q.len() != ncols {
            return Err(Problem::from(SolverError::OutOfOrder {
                expected: "q ordering matching matrix dimension",
                attempted: "setup",
            }));
        }
        let mut inv = vec![0usize; ncols];
        for (pos, &col) in q.iter().enumerate() {
            inv[col] = pos;
        }
        self.col_perm = Some(unsafe { Perm::new_unchecked(q.to_vec().into_boxed_slice(), inv.into_boxed_slice()) });
        self.mat = Some(to_faer_mat(a, space)?);
        self.state = SolverState::WithPattern;
        Ok(())
    }

    fn analyze(&mut self) -> ResolveResult<()> {
        require_state(self.state, SolverState::WithPattern, "analyze").map_err(Problem::from)?;
        if self.col_perm.is_none() {
            return Err(Problem::from(SolverError::SymbolicFactorization));
        }
        self.state = SolverState::Analyzed;
        Ok(())
    }

    fn factorize(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> ResolveResult<()> {
        if self.state == SolverState::WithPattern {
            self.analyze()?;
        }
        require_state(self.state, SolverState::Analyzed, "factorize").map_err(Problem::from)?;
        self.mat = Some(to_faer_mat(a, space)?);
        let mat = self.mat.as_ref().unwrap();
        let col_perm = self
            .col_perm
            .as_ref()
            .ok_or(SolverError::Singular)
            .map_err(Problem::from)?;

        let nrows = mat.nrows();
        let ncols = mat.ncols();
        let mut row_perm = vec![0usize; nrows];
        let mut row_perm_inv = vec![0usize; nrows];
        let mut lu = SimplicialLu::new();

        let mut mem = MemBuffer::try_new(simplicial::factorize_simplicial_numeric_lu_scratch::<I, E>(
            nrows, ncols,
        ))
        .via(SolverError::MemoryAllocation)?;
        let mut stack = MemStack::new(&mut mem);

        simplicial::factorize_simplicial_numeric_lu::<I, E>(
            &mut row_perm,
            &mut row_perm_inv,
            &mut lu,
            mat.rb(),
            col_perm.as_ref(),
            &mut stack,
        )
        .via(SolverError::Singular)?;

        self.row_perm = Some(unsafe {
            Perm::new_unchecked(row_perm.into_boxed_slice(), row_perm_inv.into_boxed_slice())
        });
        self.lu = Some(lu);
        self.state = SolverState::Factored;
        Ok(())
    }

    fn refactorize(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> ResolveResult<()> {
        require_state(self.state, SolverState::Factored, "refactorize").map_err(Problem::from)?;
        self.state = SolverState::Analyzed;
        self.factorize(a, space)
    }

    fn solve(&self, b: &mut Multivector, x: &mut Multivector, space: MemorySpace) -> ResolveResult<()> {
        require_state(self.state, SolverState::Factored, "solve").map_err(Problem::from)?;
        let lu = self.lu.as_ref().ok_or(SolverError::Singular).map_err(Problem::from)?;
        let row_perm = self
            .row_perm
            .as_ref()
            .ok_or(SolverError::Singular)
            .map_err(Problem::from)?;
        let col_perm = self
            .col_perm
            .as_ref()
            .ok_or(SolverError::Singular)
            .map_err(Problem::from)?;

        let n = b.nrows();
        let k = b.ncols();
        let bdata = b.data(space).map_err(|_| SolverError::Singular).map_err(Problem::from)?.to_vec();
        let mut sol = Mat::<E>::from_fn(n, k, |i, j| bdata[j * n + i]);

        let mut mem = MemBuffer::try_new(simplicial::solve_in_place_scratch::<I, E>(n, k, faer::Par::Seq))
            .via(SolverError::MemoryAllocation)?;
        let mut stack = MemStack::new(&mut mem);

        let mut sol_mut: MatMut<E> = sol.as_mut();
        lu.solve_in_place_with_conj(
            row_perm.as_ref(),
            col_perm.as_ref(),
            faer::Conj::No,
            sol_mut.rb_mut(),
            faer::Par::Seq,
            &mut stack,
        );

        let mut out = vec![0.0f64; n * k];
        for j in 0..k {
            for i in 0..n {
                out[j * n + i] = sol[(i, j)];
            }
        }
        // See the same check in `SimplicialSparseLu::solve`: a zero pivot that slips past
        // `factorize_simplicial_numeric_lu` without erroring would otherwise surface as NaN/Inf.
        if out.iter().any(|v| !v.is_finite()) {
            return Err(Problem::from(SolverError::Singular));
        }
        x.allocate(space);
        x.update(&out, space)
            .map_err(|_| SolverError::Singular)
            .map_err(Problem::from)?;
        Ok(())
    }

    fn p_ordering(&self) -> Option<&[usize]> {
        self.row_perm.as_ref().map(|p| p.arrays().0)
    }

    fn q_ordering(&self) -> Option<&[usize]> {
        self.col_perm.as_ref().map(|p| p.arrays().0)
    }

    fn l_factor(&self) -> Option<&CscMatrix> {
        None
    }

    fn u_factor(&self) -> Option<&CscMatrix> {
        None
    }
}
