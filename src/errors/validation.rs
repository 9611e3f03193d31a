//! Validation error types
//!
//! Every `clean`/`complete_clean` pass reports the first violation it finds as a
//! [`ValidationError`]. The variant says which rule family was broken and the
//! message names the offending entity.
//!
//! # Examples
//!
//! ```rust
//! use pipewright::errors::ValidationError;
//!
//! let err = ValidationError::Structural(
//!     "Datatype \"DNA\" has a circular restriction".to_string(),
//! );
//! assert_eq!(err.error_code(), "STRUCTURAL");
//! assert!(!err.is_completeness_error());
//! ```

use thiserror::Error;

/// Validation failures raised by the datatype, CDT and pipeline checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Non-consecutive indices, circular restrictions, self-containing pipelines,
    /// double-cabled step inputs, references to steps or xputs that do not belong
    /// where they are used
    #[error("{0}")]
    Structural(String),

    /// Wiring between incompatible datatypes, pins outside their CDT, raw/CDT
    /// mismatches and row-count infeasibility
    #[error("{0}")]
    TypeCompatibility(String),

    /// Inverted or empty effective bounds, duplicate same-kind constraints
    #[error("{0}")]
    ConstraintConflict(String),

    /// Un-cabled inputs, missing wiring, incomplete datatypes
    #[error("{0}")]
    Completeness(String),

    /// A constraint whose rule cannot be interpreted for its datatype
    #[error("{0}")]
    InvalidConstraint(String),

    /// An id that does not resolve inside the catalog
    #[error("{0}")]
    InvalidReference(String),
}

impl ValidationError {
    /// The message without the category
    pub fn message(&self) -> &str {
        match self {
            ValidationError::Structural(msg)
            | ValidationError::TypeCompatibility(msg)
            | ValidationError::ConstraintConflict(msg)
            | ValidationError::Completeness(msg)
            | ValidationError::InvalidConstraint(msg)
            | ValidationError::InvalidReference(msg) => msg,
        }
    }

    /// Only raised by the completeness pass
    pub fn is_completeness_error(&self) -> bool {
        matches!(self, ValidationError::Completeness(_))
    }

    /// Stable code for reports and machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Structural(_) => "STRUCTURAL",
            ValidationError::TypeCompatibility(_) => "TYPE_COMPATIBILITY",
            ValidationError::ConstraintConflict(_) => "CONSTRAINT_CONFLICT",
            ValidationError::Completeness(_) => "INCOMPLETE",
            ValidationError::InvalidConstraint(_) => "INVALID_CONSTRAINT",
            ValidationError::InvalidReference(_) => "INVALID_REFERENCE",
        }
    }
}
