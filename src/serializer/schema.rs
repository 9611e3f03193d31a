//! Dictionary shapes used to persist and restore pipelines

use serde::{Deserialize, Serialize};

use crate::transformation::TransformationKind;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineDict {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub users_allowed: Vec<String>,
    #[serde(default)]
    pub groups_allowed: Vec<String>,
    #[serde(default)]
    pub family_pk: Option<u32>,
    pub family_name: String,
    #[serde(default)]
    pub family_desc: String,
    #[serde(default)]
    pub revision_number: Option<u32>,
    #[serde(default)]
    pub revision_name: String,
    #[serde(default)]
    pub revision_desc: String,
    #[serde(default)]
    pub revision_parent_pk: Option<u32>,
    #[serde(default)]
    pub pipeline_inputs: Vec<PipelineInputDict>,
    #[serde(default)]
    pub pipeline_steps: Vec<PipelineStepDict>,
    #[serde(default)]
    pub pipeline_outputs: Vec<OutputCableDict>,
    #[serde(default)]
    pub is_published_version: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineInputDict {
    /// Absent for raw inputs
    #[serde(rename = "CDT_pk", default)]
    pub cdt_pk: Option<u32>,
    pub dataset_name: String,
    pub dataset_idx: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub min_row: Option<u32>,
    #[serde(default)]
    pub max_row: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStepDict {
    pub transf_pk: u32,
    pub transf_type: TransformationKind,
    pub family_pk: u32,
    pub step_num: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cables_in: Vec<InputCableDict>,
    /// Output dataset names
    #[serde(default)]
    pub outputs_to_delete: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputCableDict {
    pub source_dataset_name: String,
    pub source_step: u32,
    pub dest_dataset_name: String,
    #[serde(default)]
    pub keep_output: bool,
    #[serde(default)]
    pub wires: Vec<WireDict>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputCableDict {
    pub output_idx: u32,
    pub output_name: String,
    #[serde(rename = "output_CDT_pk", default)]
    pub output_cdt_pk: Option<u32>,
    pub source_step: u32,
    pub source_dataset_name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub wires: Vec<WireDict>,
}

/// Column indices on the source and destination CDTs
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDict {
    pub source_idx: u32,
    pub dest_idx: u32,
}
