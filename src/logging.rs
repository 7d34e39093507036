//! Logging collaborator (§9: "Logging is a collaborator injected at construction"), shaped after
//! the teacher crate's `Callback`/`Terminator` injected-collaborator pattern but backed by
//! `tracing` since this crate needs iteration-level observability a solver callback alone
//! doesn't give a caller.

/// Notified at the points the FGMRES core and direct solvers make decisions worth observing.
/// Default methods are no-ops, so an implementor only needs to override what it cares about.
pub trait Logger {
    fn on_outer_restart(&self, restart: usize, residual_norm: f64) {
        let _ = (restart, residual_norm);
    }
    fn on_inner_iteration(&self, restart: usize, inner_iter: usize, rotated_residual: f64) {
        let _ = (restart, inner_iter, rotated_residual);
    }
    fn on_breakdown(&self, restart: usize, inner_iter: usize) {
        let _ = (restart, inner_iter);
    }
    fn on_converged(&self, total_iters: usize, residual_norm: f64) {
        let _ = (total_iters, residual_norm);
    }
    fn on_max_iter_reached(&self, total_iters: usize, residual_norm: f64) {
        let _ = (total_iters, residual_norm);
    }
    fn on_factorize(&self, nrows: usize, ncols: usize) {
        let _ = (nrows, ncols);
    }
    fn on_refactorize(&self, nrows: usize, ncols: usize) {
        let _ = (nrows, ncols);
    }
}

/// Default [`Logger`], emitting `tracing` events at the levels the teacher's callback-injection
/// convention would map to verbosity flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn on_outer_restart(&self, restart: usize, residual_norm: f64) {
        tracing::debug!(restart, residual_norm, "fgmres restart");
    }

    fn on_inner_iteration(&self, restart: usize, inner_iter: usize, rotated_residual: f64) {
        tracing::trace!(restart, inner_iter, rotated_residual, "fgmres inner iteration");
    }

    fn on_breakdown(&self, restart: usize, inner_iter: usize) {
        tracing::info!(restart, inner_iter, "fgmres lucky breakdown");
    }

    fn on_converged(&self, total_iters: usize, residual_norm: f64) {
        tracing::info!(total_iters, residual_norm, "fgmres converged");
    }

    fn on_max_iter_reached(&self, total_iters: usize, residual_norm: f64) {
        tracing::warn!(total_iters, residual_norm, "fgmres hit max iterations");
    }

    fn on_factorize(&self, nrows: usize, ncols: usize) {
        tracing::debug!(nrows, ncols, "direct solver factorize");
    }

    fn on_refactorize(&self, nrows: usize, ncols: usize) {
        tracing::debug!(nrows, ncols, "direct solver refactorize");
    }
}

/// Silent [`Logger`], for callers that inject their own collaborator instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {}
