//! Domain-specific error types for pipewright
//!
//! # Error Categories
//!
//! - **ValidationError**: datatype, compound datatype, method and pipeline checks
//! - **SerializationError**: pipeline dictionary codec and catalog documents
//!
//! Application layers (plan runner, CLI) wrap these in `anyhow::Error`.
//!
//! ```rust
//! use pipewright::errors::{SerializationError, ValidationError};
//!
//! fn check(indices: &[u32]) -> Result<(), ValidationError> {
//!     if indices.first() != Some(&1) {
//!         return Err(ValidationError::Structural(
//!             "Inputs are not consecutively numbered starting from 1".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! let err: SerializationError = check(&[2]).unwrap_err().into();
//! assert_eq!(err.error_code(), "STRUCTURAL");
//! ```

pub mod serialization;
pub mod validation;

pub use serialization::SerializationError;
pub use validation::ValidationError;

/// Result type alias for validation passes
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for dictionary codec operations
pub type SerializationResult<T> = Result<T, SerializationError>;
