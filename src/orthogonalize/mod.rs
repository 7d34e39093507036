//! Gram-Schmidt orthogonalization module (C8): the `orthogonalize(V, H, j)` step FGMRES calls
//! once per Arnoldi iteration.

pub mod gram_schmidt;
pub mod sketch;

use crate::backend::ExecutionBackend;
use crate::error::OrthoError;
use crate::handler::VectorHandler;
use crate::memory::MemorySpace;
use crate::vector::Multivector;

pub use gram_schmidt::{Cgs, Cgs2, Mgs, MgsReorth};
pub use sketch::{build_sketch, CountSketch, FwhtSketch, Randomized, Sketch, SketchKind};

/// Selects which Gram-Schmidt variant `FgmresConfig` wires up; also the value the
/// `ortho_variant` configuration field (§6) deserializes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrthoVariant {
    Cgs,
    Mgs,
    Cgs2,
    MgsReorth,
}

/// Outcome of one `orthogonalize` call: either the new basis vector was produced normally, or
/// breakdown was detected (`h_{j+1,j} = 0`, i.e. the Krylov space is exhausted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrthoOutcome {
    Orthogonalized,
    Breakdown,
}

/// Given basis vectors `basis[0..=j]` (already orthonormal) and `basis[j+1]` holding the new,
/// not-yet-normalized vector `w` on entry, writes `h[0..=j+1]` and normalizes `basis[j+1]` in
/// place. One [`Multivector`] per Krylov basis vector mirrors `resolveLinSolverIterativeFGMRES`'s
/// `std::vector<vector::Vector*>` basis storage, and lets this operate through
/// [`VectorHandler`]'s existing two-distinct-vector signatures without any column-aliasing
/// bookkeeping.
///
/// `B` is fixed per orthogonalizer instance (not a method-level generic) so implementors can be
/// boxed as `Box<dyn Orthogonalizer<B>>` and selected at runtime from [`OrthoVariant`].
pub trait Orthogonalizer<B: ExecutionBackend + Copy> {
    fn orthogonalize(
        &self,
        handler: &VectorHandler<B>,
        basis: &mut [Multivector],
        h: &mut [f64],
        j: usize,
        space: MemorySpace,
    ) -> Result<OrthoOutcome, OrthoError>;
}

/// Instantiates the boxed orthogonalizer named by `variant`. Generic over `B` since all four
/// Gram-Schmidt flavors are expressed purely in terms of `VectorHandler` primitives and need no
/// backend-specific code.
pub fn build<B: ExecutionBackend + Copy + 'static>(variant: OrthoVariant) -> Box<dyn Orthogonalizer<B>> {
    match variant {
        OrthoVariant::Cgs => Box::new(Cgs),
        OrthoVariant::Mgs => Box::new(Mgs),
        OrthoVariant::Cgs2 => Box::new(Cgs2),
        OrthoVariant::MgsReorth => Box::new(MgsReorth),
    }
}
