pub mod catalog;
pub mod common;
pub mod data_loader;
pub mod errors;
pub mod ids;
pub mod metadata;
pub mod pipeline;
pub mod plan;
pub mod plan_execution;
pub mod serializer;
pub mod transformation;

pub use catalog::{CableRef, Catalog};
pub use errors::{SerializationError, ValidationError};
