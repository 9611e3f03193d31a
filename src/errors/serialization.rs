//! Dictionary codec error types

use thiserror::Error;

use super::ValidationError;

/// Failures while encoding or decoding pipeline dictionaries and catalog documents
#[derive(Error, Debug)]
pub enum SerializationError {
    /// `create_from_dict` on a family name that already exists
    #[error("Duplicate pipeline family name \"{0}\"")]
    DuplicateFamilyName(String),

    /// The pipeline has been run or revised
    #[error("Pipeline \"{pipeline}\" {reason} and cannot be modified")]
    ImmutablePipeline {
        /// Display name of the pipeline
        pipeline: String,
        /// What froze it
        reason: String,
    },

    /// A revision names a family that does not exist
    #[error("Pipeline family {0} does not exist")]
    FamilyNotFound(u32),

    /// A pk, dataset name or column index in the dictionary resolves to nothing
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// The decoded graph failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// JSON encoding failed
    #[error("Invalid dictionary format: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SerializationError::DuplicateFamilyName(_) => "CONFLICT",
            SerializationError::ImmutablePipeline { .. } => "IMMUTABLE",
            SerializationError::FamilyNotFound(_) => "NOT_FOUND",
            SerializationError::UnknownReference(_) => "UNKNOWN_REFERENCE",
            SerializationError::Validation(err) => err.error_code(),
            SerializationError::Json(_) => "INVALID_FORMAT",
        }
    }
}
