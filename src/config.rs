//! Configuration surface (§6): a plain `serde`-derived struct so an out-of-scope CLI driver can
//! deserialize it from a config file without this crate knowing about CLIs, the same role
//! `build_options!`-backed structs play for the teacher crate's LP/NLP solvers.

use serde::{Deserialize, Serialize};

use crate::orthogonalize::{OrthoVariant, SketchKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecondSide {
    None,
    Right,
}

/// FGMRES (C9/C10) parameters. Field defaults match §6 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FgmresConfig {
    /// Restart length `m`, `1..=10000`.
    pub restart: usize,
    /// Absolute tolerance on the rotated residual, `(0, 1)`.
    pub tol: f64,
    /// Maximum total inner iterations across restarts.
    pub maxit: usize,
    /// When `true`, accumulate the solution update against `Z` (preconditioned basis) rather
    /// than `V`; required when the preconditioner itself varies between iterations.
    pub flexible: bool,
    pub ortho_variant: OrthoVariant,
    pub precond_side: PrecondSide,
    /// Sketch family for the randomized variant (C10); unused unless `sketch_dim > 0`.
    pub sketch_kind: SketchKind,
    /// Sketch output dimension `k`. `0` disables the randomized variant entirely (the default);
    /// this field and `sketch_seed` are ambient additions the literal configuration surface
    /// doesn't enumerate, needed so `sketch_kind` can actually be instantiated.
    pub sketch_dim: usize,
    pub sketch_seed: u64,
}

impl Default for FgmresConfig {
    fn default() -> Self {
        Self {
            restart: 10,
            tol: 1e-14,
            maxit: 100,
            flexible: false,
            ortho_variant: OrthoVariant::Cgs2,
            precond_side: PrecondSide::Right,
            sketch_kind: SketchKind::Fwht,
            sketch_dim: 0,
            sketch_seed: 0,
        }
    }
}

impl FgmresConfig {
    pub fn randomized(mut self, dim: usize, seed: u64) -> Self {
        self.sketch_dim = dim;
        self.sketch_seed = seed;
        self
    }

    pub fn is_randomized(&self) -> bool {
        self.sketch_dim > 0
    }
}
