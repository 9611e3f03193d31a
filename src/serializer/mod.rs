//! Pipeline dictionaries and catalog documents
//!
//! A pipeline is persisted as a nested [`PipelineDict`] whose references are
//! dataset names and column indices rather than ids. Decoding resolves those
//! names against the catalog, derives the pipeline outputs and runs
//! `clean_pipeline`; a failed decode leaves the catalog unchanged.

pub mod document;
pub mod pipeline;
pub mod schema;

pub use document::{load_catalog_file, CatalogDocument, LoadedCatalog};
pub use schema::{
    InputCableDict, OutputCableDict, PipelineDict, PipelineInputDict, PipelineStepDict, WireDict,
};

use std::collections::BTreeSet;

use crate::ids::PipelineId;

/// Whether a pipeline has ever been executed
pub trait ExecutionHistory {
    fn has_run(&self, pipeline: PipelineId) -> bool;
}

impl ExecutionHistory for BTreeSet<PipelineId> {
    fn has_run(&self, pipeline: PipelineId) -> bool {
        self.contains(&pipeline)
    }
}

/// A history in which nothing has run
#[derive(Copy, Clone, Debug, Default)]
pub struct NoExecutions;

impl ExecutionHistory for NoExecutions {
    fn has_run(&self, _pipeline: PipelineId) -> bool {
        false
    }
}
