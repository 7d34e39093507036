//! Crate-wide error envelope.
//!
//! Every subsystem defines a small `derive_more`-based error enum and converts it into
//! [`problemo::Problem`] via [`problemo::Via::via`], mirroring the way the teacher crate's
//! `LinearSolverError` flows into `Problem` at call sites.

use derive_more::{Display, Error};
use problemo::Problem;

/// The nine error kinds a caller can observe crossing the library boundary.
///
/// `MAX_ITER_REACHED` and `LUCKY_BREAKDOWN` are informational: the iterate returned alongside
/// them is well-defined and usable.
#[derive(Debug, Display, Error, PartialEq, Eq, Clone, Copy)]
pub enum ResolveErrorKind {
    #[display("invalid argument")]
    InvalidArg,
    #[display("data not allocated in requested memory space")]
    NotAllocated,
    #[display("host/device copy failed")]
    CopyFailed,
    #[display("factorization encountered a singular pivot")]
    FactorizationSingular,
    #[display("preconditioner solve failed")]
    PrecondFailed,
    #[display("execution backend reported an error")]
    BackendError,
    #[display("maximum iteration count reached")]
    MaxIterReached,
    #[display("lucky breakdown: Krylov space exhausted before convergence")]
    LuckyBreakdown,
    #[display("operation not implemented for this memory space")]
    NotImplemented,
}

impl ResolveErrorKind {
    /// `true` for the two informational kinds that are not really failures.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            ResolveErrorKind::MaxIterReached | ResolveErrorKind::LuckyBreakdown
        )
    }
}

/// Error raised by the dual-residency matrix/vector data model (C1–C3).
#[derive(Debug, Display, Error, PartialEq)]
pub enum MemoryError {
    #[display("neither host nor device side holds valid data")]
    NotAllocated,
    #[display("requested size {requested} does not match existing allocation {existing}")]
    SizeMismatch { requested: usize, existing: usize },
    #[display("copy between memory spaces failed")]
    CopyFailed,
}

impl From<MemoryError> for ResolveErrorKind {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::NotAllocated => ResolveErrorKind::NotAllocated,
            MemoryError::SizeMismatch { .. } => ResolveErrorKind::InvalidArg,
            MemoryError::CopyFailed => ResolveErrorKind::CopyFailed,
        }
    }
}

/// Error raised by sparse-matrix construction and format conversion (C2).
#[derive(Debug, Display, Error, PartialEq)]
pub enum MatrixError {
    #[display("row or column index out of range")]
    IndexOutOfRange,
    #[display("row_ptr is not a valid non-decreasing prefix sum")]
    InvalidRowPtr,
    #[display("dimension mismatch: {message}")]
    DimensionMismatch { message: String },
    #[display("{source}")]
    Memory { source: MemoryError },
}

impl From<MemoryError> for MatrixError {
    fn from(source: MemoryError) -> Self {
        MatrixError::Memory { source }
    }
}

impl From<MatrixError> for ResolveErrorKind {
    fn from(e: MatrixError) -> Self {
        match e {
            MatrixError::IndexOutOfRange => ResolveErrorKind::InvalidArg,
            MatrixError::InvalidRowPtr => ResolveErrorKind::InvalidArg,
            MatrixError::DimensionMismatch { .. } => ResolveErrorKind::InvalidArg,
            MatrixError::Memory { source } => source.into(),
        }
    }
}

/// Error raised by the matrix/vector handler layer (C5, C6).
#[derive(Debug, Display, Error, PartialEq)]
pub enum HandlerError {
    #[display("{source}")]
    Matrix { source: MatrixError },
    #[display("vector length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[display("execution backend reported error code {code}")]
    Backend { code: i32 },
    #[display("operation not implemented for this memory space")]
    NotImplemented,
}

impl From<MatrixError> for HandlerError {
    fn from(source: MatrixError) -> Self {
        HandlerError::Matrix { source }
    }
}

impl From<HandlerError> for ResolveErrorKind {
    fn from(e: HandlerError) -> Self {
        match e {
            HandlerError::Matrix { source } => source.into(),
            HandlerError::LengthMismatch { .. } => ResolveErrorKind::InvalidArg,
            HandlerError::Backend { .. } => ResolveErrorKind::BackendError,
            HandlerError::NotImplemented => ResolveErrorKind::NotImplemented,
        }
    }
}

/// Error raised by the direct-solver state machine (C7).
#[derive(Debug, Display, Error, PartialEq)]
pub enum SolverError {
    #[display("called out of order: {expected} required before {attempted}")]
    OutOfOrder {
        expected: &'static str,
        attempted: &'static str,
    },
    #[display("symbolic analysis failed")]
    SymbolicFactorization,
    #[display("numeric factorization hit a zero or near-zero pivot")]
    Singular,
    #[display("no factors available: solver does not expose L/U/P/Q")]
    NoFactors,
    #[display("memory reservation failed")]
    MemoryReservation,
    #[display("memory allocation failed")]
    MemoryAllocation,
}

impl From<SolverError> for ResolveErrorKind {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::OutOfOrder { .. } => ResolveErrorKind::InvalidArg,
            SolverError::SymbolicFactorization => ResolveErrorKind::InvalidArg,
            SolverError::Singular => ResolveErrorKind::FactorizationSingular,
            SolverError::NoFactors => ResolveErrorKind::NotImplemented,
            SolverError::MemoryReservation | SolverError::MemoryAllocation => {
                ResolveErrorKind::BackendError
            }
        }
    }
}

/// Error raised by the Gram-Schmidt / sketch orthogonalization module (C8, C10).
#[derive(Debug, Display, Error, PartialEq)]
pub enum OrthoError {
    #[display("basis vector count exceeds restart length")]
    BasisOverflow,
    #[display("sketch dimension must exceed restart length")]
    SketchTooSmall,
    #[display("execution backend reported an error during orthogonalization")]
    BackendFailure,
}

impl From<OrthoError> for ResolveErrorKind {
    fn from(e: OrthoError) -> Self {
        match e {
            OrthoError::BackendFailure => ResolveErrorKind::BackendError,
            OrthoError::BasisOverflow | OrthoError::SketchTooSmall => ResolveErrorKind::InvalidArg,
        }
    }
}

/// Error raised by the FGMRES iterative core (C9, C10).
#[derive(Debug, Display, Error, PartialEq)]
pub enum FgmresError {
    #[display("{source}")]
    Ortho { source: OrthoError },
    #[display("preconditioner solve returned failure")]
    PrecondFailed,
    #[display("right-hand side and initial guess have mismatched length")]
    LengthMismatch,
}

impl From<OrthoError> for FgmresError {
    fn from(source: OrthoError) -> Self {
        FgmresError::Ortho { source }
    }
}

impl From<FgmresError> for ResolveErrorKind {
    fn from(e: FgmresError) -> Self {
        match e {
            FgmresError::Ortho { source } => source.into(),
            FgmresError::PrecondFailed => ResolveErrorKind::PrecondFailed,
            FgmresError::LengthMismatch => ResolveErrorKind::InvalidArg,
        }
    }
}

/// Extension trait that discards a foreign error (an allocation failure, a backend status code)
/// and replaces it with one of this crate's own error variants on its way into [`Problem`],
/// mirroring the teacher's `.via(LinearSolverError::MemoryReservation)` call sites.
pub trait Via<T> {
    fn via<E2>(self, err: E2) -> Result<T, Problem>
    where
        E2: std::error::Error + Send + Sync + 'static;
}

impl<T, E1> Via<T> for Result<T, E1> {
    fn via<E2>(self, err: E2) -> Result<T, Problem>
    where
        E2: std::error::Error + Send + Sync + 'static,
    {
        self.map_err(|_| Problem::from(err))
    }
}

pub type ResolveResult<T> = Result<T, Problem>;
