//! Direct-solver abstract interface (C7): the state machine a preconditioner must honor.
//!
//! Grounded in the teacher crate's [`Solver`] trait (`linalg/solver.rs`), generalized from a
//! single `analyze`/`factorize`/`solve` flow into the full
//! `Created -> WithPattern -> Analyzed -> Factored` machine described in §4.4, with the
//! factor-handoff seed path from `examples/r_KLU_rf_FGMRES.cpp` (see [`crate::solver::refactor`]).

pub mod lu;
pub mod refactor;

use crate::error::{ResolveResult, SolverError};
use crate::matrix::{CscMatrix, CsrMatrix};
use crate::memory::MemorySpace;
use crate::vector::Multivector;

pub use lu::SimplicialSparseLu;
pub use refactor::SeededLu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Created,
    WithPattern,
    Analyzed,
    Factored,
}

/// Read-only borrow of a solver's exposed factors, passed to a second solver's `setup` for
/// bootstrapping (§9 "Factor handoff between solvers"). Any field may be `None` when the source
/// solver does not expose that piece.
pub struct FactorView<'a> {
    pub l: Option<&'a CscMatrix>,
    pub u: Option<&'a CscMatrix>,
    pub p: Option<&'a [usize]>,
    pub q: Option<&'a [usize]>,
}

impl<'a> FactorView<'a> {
    pub fn empty() -> Self {
        Self {
            l: None,
            u: None,
            p: None,
            q: None,
        }
    }
}

/// Direct-solver state machine (§4.4), consumed by the iterative core as a right preconditioner.
pub trait DirectSolver {
    fn state(&self) -> SolverState;

    /// Attaches the matrix and transitions `Created -> WithPattern`. `seed` optionally supplies
    /// orderings or factors borrowed from another solver's analysis.
    fn setup(&mut self, a: &mut CsrMatrix, seed: Option<FactorView<'_>>, space: MemorySpace) -> ResolveResult<()>;

    /// Symbolic factorization, `WithPattern -> Analyzed`.
    fn analyze(&mut self) -> ResolveResult<()>;

    /// Numeric factorization from `a`'s current values, `Analyzed -> Factored`.
    fn factorize(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> ResolveResult<()>;

    /// Repeats numeric factorization assuming structure and ordering are unchanged,
    /// `Factored -> Factored`.
    fn refactorize(&mut self, a: &mut CsrMatrix, space: MemorySpace) -> ResolveResult<()>;

    /// Forward/back substitution against current factors.
    fn solve(&self, b: &mut Multivector, x: &mut Multivector, space: MemorySpace) -> ResolveResult<()>;

    fn l_factor(&self) -> Option<&CscMatrix> {
        None
    }
    fn u_factor(&self) -> Option<&CscMatrix> {
        None
    }
    fn p_ordering(&self) -> Option<&[usize]> {
        None
    }
    fn q_ordering(&self) -> Option<&[usize]> {
        None
    }
}

pub(crate) fn require_state(actual: SolverState, expected: SolverState, attempted: &'static str) -> Result<(), SolverError> {
    if actual != expected {
        return Err(SolverError::OutOfOrder {
            expected: state_name(expected),
            attempted,
        });
    }
    Ok(())
}

fn state_name(s: SolverState) -> &'static str {
    match s {
        SolverState::Created => "setup",
        SolverState::WithPattern => "analyze",
        SolverState::Analyzed => "factorize",
        SolverState::Factored => "factorize or solve",
    }
}
