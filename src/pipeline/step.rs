use std::collections::HashSet;
use tracing::debug;

use crate::catalog::Catalog;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::XputId;
use crate::transformation::TransformationId;

use super::{InputCable, Pipeline};

/// One transformation placed in a pipeline, with the cables feeding it
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineStep {
    pub step_num: u32,
    pub transformation: TransformationId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub cables_in: Vec<InputCable>,
    /// Outputs discarded after the step runs
    pub outputs_to_delete: Vec<XputId>,
}

impl PipelineStep {
    pub fn cable_feeding(&self, input: XputId) -> Option<&InputCable> {
        self.cables_in.iter().find(|c| c.dest == input)
    }
}

impl Catalog {
    pub fn clean_step(&self, pipeline: &Pipeline, step: &PipelineStep) -> ValidationResult<()> {
        let transformation = self.require_transformation(step.transformation)?;

        if let TransformationId::Pipeline(inner) = step.transformation {
            if inner == pipeline.id || self.pipeline_contains(inner, pipeline.id) {
                return Err(ValidationError::Structural(format!(
                    "Step {} contains the parent pipeline",
                    step.step_num
                )));
            }
        }

        let mut cabled = HashSet::new();
        for cable in &step.cables_in {
            self.clean_input_cable(pipeline, step, cable)?;
            if !cabled.insert(cable.dest) {
                return Err(ValidationError::Structural(format!(
                    "Input \"{}\" to transformation at step {} is cabled more than once",
                    self.xput_label(cable.dest),
                    step.step_num
                )));
            }
        }

        for output in &step.outputs_to_delete {
            if transformation.output(*output).is_none() {
                return Err(ValidationError::InvalidReference(format!(
                    "Transformation at step {} does not have output \"{}\"",
                    step.step_num,
                    self.xput_label(*output)
                )));
            }
        }

        debug!("Step {} of \"{}\" is clean", step.step_num, self.pipeline_label(pipeline.id));
        Ok(())
    }

    pub fn complete_clean_step(&self, pipeline: &Pipeline, step: &PipelineStep) -> ValidationResult<()> {
        self.clean_step(pipeline, step)?;
        let transformation = self.require_transformation(step.transformation)?;

        for input in transformation.inputs() {
            if step.cable_feeding(input.id).is_none() {
                return Err(ValidationError::Completeness(format!(
                    "Input \"{}\" to transformation at step {} is not cabled",
                    input.dataset_name, step.step_num
                )));
            }
        }
        for cable in &step.cables_in {
            self.clean_and_completely_wired_input_cable(pipeline, step, cable)?;
        }
        if let TransformationId::Pipeline(inner) = step.transformation {
            self.complete_clean_pipeline(inner)?;
        }
        Ok(())
    }
}
