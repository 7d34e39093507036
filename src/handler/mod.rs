//! Matrix- and vector-handler layer (C5, C6): BLAS-/SpMV-class primitives, polymorphic over an
//! [`crate::backend::ExecutionBackend`].

pub mod matrix_handler;
pub mod vector_handler;

pub use matrix_handler::MatrixHandler;
pub use vector_handler::VectorHandler;
