//! Reusable sparse linear-system solver core for repeated solution of `A_i x_i = b_i` sequences
//! with stable sparsity (e.g. Newton iterations in power-grid AC analysis).
//!
//! # Layers
//! - [`memory`] / [`vector`] / [`matrix`]: dual host/device-resident storage (C1-C3).
//! - [`backend`]: the execution-backend contract BLAS/SpMV primitives run against (C4).
//! - [`handler`]: matrix and vector handlers built on a backend (C5, C6).
//! - [`solver`]: the direct-solver state machine consumed as a right preconditioner (C7).
//! - [`orthogonalize`]: Gram-Schmidt variants and randomized sketching (C8, C10).
//! - [`fgmres`]: the FGMRES iterative core (C9, C10).
//! - [`config`] / [`logging`] / [`error`]: ambient configuration, logging, and error plumbing.

pub type E = f64;
pub type I = usize;

pub mod backend;
pub mod config;
pub mod error;
pub mod fgmres;
pub mod handler;
pub mod logging;
pub mod matrix;
pub mod memory;
pub mod orthogonalize;
pub mod solver;
pub mod vector;

pub use config::FgmresConfig;
pub use error::{ResolveErrorKind, ResolveResult};
pub use fgmres::{Fgmres, FgmresOutcome, FgmresStatus};
pub use memory::MemorySpace;
