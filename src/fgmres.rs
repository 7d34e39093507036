//! FGMRES iterative core (C9) and its randomized-sketch variant (C10) — the central algorithm
//! the rest of the crate exists to support. Implements the outer-restart/inner-Arnoldi state
//! machine of §4.6 with the Givens-rotation Hessenberg reduction, flexible/fixed preconditioning,
//! and breakdown handling of §4.6–§4.7.

use problemo::Problem;

use crate::backend::ExecutionBackend;
use crate::config::{FgmresConfig, PrecondSide};
use crate::error::{FgmresError, ResolveResult};
use crate::handler::{MatrixHandler, VectorHandler};
use crate::logging::Logger;
use crate::matrix::{CsrMatrix, MatrixShape};
use crate::memory::MemorySpace;
use crate::orthogonalize::{build, build_sketch, OrthoOutcome, Orthogonalizer, Randomized};
use crate::solver::DirectSolver;
use crate::vector::Multivector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FgmresStatus {
    Converged,
    MaxIterReached,
    LuckyBreakdown,
}

#[derive(Debug, Clone, Copy)]
pub struct FgmresOutcome {
    pub status: FgmresStatus,
    pub total_iters: usize,
    pub residual_norm: f64,
}

/// Returns `(cos, sin, r)` for the plane rotation zeroing `b` against `a`: `r = hypot(a, b)`.
fn givens(a: f64, b: f64) -> (f64, f64, f64) {
    if b == 0.0 {
        (1.0, 0.0, a)
    } else if a == 0.0 {
        (0.0, b.signum(), b.abs())
    } else {
        let r = a.hypot(b);
        (a / r, b / r, r)
    }
}

fn vec_norm(v: &mut Multivector, space: MemorySpace) -> Result<f64, FgmresError> {
    let data = v.data(space).map_err(|_| FgmresError::PrecondFailed)?;
    Ok(data.iter().map(|x| x * x).sum::<f64>().sqrt())
}

fn clone_vector(v: &mut Multivector, space: MemorySpace) -> Result<Multivector, FgmresError> {
    let n = v.nrows();
    let data = v.data(space).map_err(|_| FgmresError::PrecondFailed)?.to_vec();
    let mut out = Multivector::vector(n);
    out.update(&data, space).map_err(|_| FgmresError::PrecondFailed)?;
    Ok(out)
}

fn zero_vector(n: usize, space: MemorySpace) -> Result<Multivector, FgmresError> {
    let mut out = Multivector::vector(n);
    out.update(&vec![0.0f64; n], space).map_err(|_| FgmresError::PrecondFailed)?;
    Ok(out)
}

/// Owns the config, backend, and injected [`Logger`]; `solve` drives one full FGMRES invocation
/// (all restarts) against a caller-supplied matrix, right-preconditioner, and right-hand side.
pub struct Fgmres<B: ExecutionBackend + Copy, L: Logger = crate::logging::TracingLogger> {
    config: FgmresConfig,
    backend: B,
    logger: L,
}

impl<B: ExecutionBackend + Copy + 'static, L: Logger> Fgmres<B, L> {
    pub fn new(config: FgmresConfig, backend: B, logger: L) -> Self {
        Self {
            config,
            backend,
            logger,
        }
    }

    pub fn precond_side(&self) -> PrecondSide {
        self.config.precond_side
    }

    fn orthogonalizer(&self, n: usize) -> Box<dyn Orthogonalizer<B>> {
        if self.config.is_randomized() {
            let sketch = build_sketch(
                self.config.sketch_kind,
                n,
                self.config.sketch_dim,
                self.config.sketch_seed,
            );
            Box::new(Randomized::new(sketch))
        } else {
            build::<B>(self.config.ortho_variant)
        }
    }

    /// Runs FGMRES to solve `A x = b`, using `precond` as a right preconditioner (§6). `x` is
    /// used as the initial guess on entry and holds the final iterate on return, including when
    /// `MAX_ITER_REACHED` or `LUCKY_BREAKDOWN` is returned (§7 policy: the iterate is always
    /// well-defined).
    pub fn solve<S: DirectSolver>(
        &self,
        a: &mut CsrMatrix,
        precond: &mut S,
        b: &mut Multivector,
        x: &mut Multivector,
        space: MemorySpace,
    ) -> ResolveResult<FgmresOutcome> {
        if b.nrows() != x.nrows() {
            return Err(Problem::from(FgmresError::LengthMismatch));
        }
        let n = a.nrows();
        let m = self.config.restart.max(1);
        let mut mat_handler = MatrixHandler::new(self.backend);
        let vec_handler = VectorHandler::new(self.backend);
        let ortho = self.orthogonalizer(n);

        let bnorm = vec_norm(b, space).map_err(Problem::from)?;
        let bnorm = if bnorm == 0.0 { 1.0 } else { bnorm };

        let mut total_iters = 0usize;
        let mut last_residual = f64::INFINITY;

        loop {
            let mut r = clone_vector(b, space).map_err(Problem::from)?;
            mat_handler
                .matvec(a, x, &mut r, -1.0, 1.0, space)
                .map_err(|_| FgmresError::PrecondFailed)
                .map_err(Problem::from)?;
            let beta = vec_norm(&mut r, space).map_err(Problem::from)?;

            if beta / bnorm <= self.config.tol {
                self.logger.on_converged(total_iters, beta);
                return Ok(FgmresOutcome {
                    status: FgmresStatus::Converged,
                    total_iters,
                    residual_norm: beta,
                });
            }

            let mut basis: Vec<Multivector> = Vec::with_capacity(m + 1);
            {
                let scaled: Vec<f64> = r
                    .data(space)
                    .map_err(|_| FgmresError::PrecondFailed)
                    .map_err(Problem::from)?
                    .iter()
                    .map(|v| v / beta)
                    .collect();
                r.update(&scaled, space).map_err(|_| FgmresError::PrecondFailed).map_err(Problem::from)?;
            }
            basis.push(r);
            for _ in 0..m {
                basis.push(zero_vector(n, space).map_err(Problem::from)?);
            }

            let mut flexible_z: Vec<Multivector> = Vec::new();
            let mut g = vec![0.0f64; m + 1];
            g[0] = beta;
            let mut cs = vec![0.0f64; m];
            let mut sn = vec![0.0f64; m];
            let mut hess: Vec<Vec<f64>> = (0..m).map(|_| vec![0.0f64; m + 1]).collect();

            let mut jlast = 0usize;
            let mut outcome_status = FgmresStatus::MaxIterReached;
            let mut inner_done = false;
            let identity_precond = matches!(self.config.precond_side, PrecondSide::None);

            for j in 0..m {
                let mut z = if identity_precond {
                    clone_vector(&mut basis[j], space).map_err(Problem::from)?
                } else {
                    let mut z = Multivector::vector(n);
                    precond
                        .solve(&mut basis[j], &mut z, space)
                        .map_err(|_| FgmresError::PrecondFailed)?;
                    z
                };
                if self.config.flexible {
                    flexible_z.push(clone_vector(&mut z, space).map_err(Problem::from)?);
                }

                // w = A z, written into basis[j+1] (the not-yet-orthogonalized slot).
                mat_handler
                    .matvec(a, &mut z, &mut basis[j + 1], 1.0, 0.0, space)
                    .map_err(|_| FgmresError::PrecondFailed)
                    .map_err(Problem::from)?;

                let h_col = &mut hess[j];
                let outcome = ortho
                    .orthogonalize(&vec_handler, &mut basis[..=j + 1], h_col, j, space)
                    .map_err(FgmresError::from)
                    .map_err(Problem::from)?;

                for i in 0..j {
                    let temp = cs[i] * h_col[i] + sn[i] * h_col[i + 1];
                    h_col[i + 1] = -sn[i] * h_col[i] + cs[i] * h_col[i + 1];
                    h_col[i] = temp;
                }
                let (c, s, r_coef) = givens(h_col[j], h_col[j + 1]);
                h_col[j] = r_coef;
                h_col[j + 1] = 0.0;
                cs[j] = c;
                sn[j] = s;

                let temp = cs[j] * g[j] + sn[j] * g[j + 1];
                g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
                g[j] = temp;

                let rho = g[j + 1].abs();
                total_iters += 1;
                last_residual = rho;
                self.logger.on_inner_iteration(0, j, rho);

                if matches!(outcome, OrthoOutcome::Breakdown) {
                    jlast = j;
                    outcome_status = if rho / bnorm <= self.config.tol {
                        FgmresStatus::Converged
                    } else {
                        FgmresStatus::LuckyBreakdown
                    };
                    self.logger.on_breakdown(0, j);
                    inner_done = true;
                    break;
                }
                if rho / bnorm <= self.config.tol {
                    jlast = j;
                    outcome_status = FgmresStatus::Converged;
                    inner_done = true;
                    break;
                }
                if total_iters >= self.config.maxit {
                    jlast = j;
                    outcome_status = FgmresStatus::MaxIterReached;
                    inner_done = true;
                    break;
                }
            }
            if !inner_done {
                jlast = m - 1;
            }

            // Back-substitute the (jlast+1)x(jlast+1) upper-triangular system H y = g.
            let mut y = vec![0.0f64; jlast + 1];
            for i in (0..=jlast).rev() {
                let mut sum = g[i];
                for k in (i + 1)..=jlast {
                    sum -= hess[k][i] * y[k];
                }
                y[i] = sum / hess[i][i];
            }

            if self.config.flexible {
                for i in 0..=jlast {
                    vec_handler
                        .axpy(y[i], &mut flexible_z[i], x, space)
                        .map_err(|_| FgmresError::PrecondFailed)
                        .map_err(Problem::from)?;
                }
            } else {
                // Fixed preconditioner: M^-1 is linear, so defer applying it until after the
                // Krylov combination is formed rather than storing one z per iteration. With
                // `PrecondSide::None` there is no M^-1 to defer; the combination is the update.
                let mut combo = zero_vector(n, space).map_err(Problem::from)?;
                for i in 0..=jlast {
                    vec_handler
                        .axpy(y[i], &mut basis[i], &mut combo, space)
                        .map_err(|_| FgmresError::PrecondFailed)
                        .map_err(Problem::from)?;
                }
                if identity_precond {
                    vec_handler
                        .axpy(1.0, &mut combo, x, space)
                        .map_err(|_| FgmresError::PrecondFailed)
                        .map_err(Problem::from)?;
                } else {
                    let mut update = Multivector::vector(n);
                    precond
                        .solve(&mut combo, &mut update, space)
                        .map_err(|_| FgmresError::PrecondFailed)?;
                    vec_handler
                        .axpy(1.0, &mut update, x, space)
                        .map_err(|_| FgmresError::PrecondFailed)
                        .map_err(Problem::from)?;
                }
            }

            if matches!(outcome_status, FgmresStatus::Converged) {
                self.logger.on_converged(total_iters, last_residual);
                return Ok(FgmresOutcome {
                    status: FgmresStatus::Converged,
                    total_iters,
                    residual_norm: last_residual,
                });
            }
            if matches!(outcome_status, FgmresStatus::LuckyBreakdown) {
                return Ok(FgmresOutcome {
                    status: FgmresStatus::LuckyBreakdown,
                    total_iters,
                    residual_norm: last_residual,
                });
            }
            if total_iters >= self.config.maxit {
                self.logger.on_max_iter_reached(total_iters, last_residual);
                return Ok(FgmresOutcome {
                    status: FgmresStatus::MaxIterReached,
                    total_iters,
                    residual_norm: last_residual,
                });
            }
            self.logger.on_outer_restart(total_iters, last_residual);
        }
    }
}
