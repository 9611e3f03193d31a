//! Pipelines: steps wired together by cables
//!
//! `clean_pipeline` checks local structure and fails on the first violation.
//! `complete_clean_pipeline` additionally requires every step input to be
//! cabled and every cable to be completely wired.

pub mod cable;
pub mod step;

pub use cable::{CustomWire, InputCable, OutputCable};
pub use step::PipelineStep;

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::catalog::Catalog;
use crate::common::is_consecutive_from_one;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{PipelineFamilyId, PipelineId, XputId};
use crate::transformation::{
    Transformation, TransformationId, TransformationXput, XputDirection, XputStructure,
};

#[derive(Clone, Debug)]
pub struct PipelineFamily {
    pub id: PipelineFamilyId,
    pub name: String,
    pub description: String,
    pub published_version: Option<PipelineId>,
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    pub id: PipelineId,
    pub family: PipelineFamilyId,
    pub revision_number: u32,
    pub revision_name: String,
    pub revision_desc: String,
    pub revision_parent: Option<PipelineId>,
    pub user: String,
    pub users_allowed: Vec<String>,
    pub groups_allowed: Vec<String>,
    pub inputs: Vec<TransformationXput>,
    pub steps: Vec<PipelineStep>,
    pub outcables: Vec<OutputCable>,
    /// Derived from `outcables` by `create_outputs`
    pub outputs: Vec<TransformationXput>,
}

impl Pipeline {
    pub fn step(&self, step_num: u32) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.step_num == step_num)
    }

    pub fn step_mut(&mut self, step_num: u32) -> Option<&mut PipelineStep> {
        self.steps.iter_mut().find(|s| s.step_num == step_num)
    }

    pub fn outcable(&self, output_idx: u32) -> Option<&OutputCable> {
        self.outcables.iter().find(|c| c.output_idx == output_idx)
    }
}

impl Transformation for Pipeline {
    fn inputs(&self) -> &[TransformationXput] {
        &self.inputs
    }

    fn outputs(&self) -> &[TransformationXput] {
        &self.outputs
    }
}

impl Catalog {
    pub(crate) fn require_pipeline(&self, id: PipelineId) -> ValidationResult<&Pipeline> {
        self.pipeline(id).ok_or_else(|| {
            ValidationError::InvalidReference(format!("Pipeline {} does not exist", id))
        })
    }

    pub fn pipeline_label(&self, id: PipelineId) -> String {
        match self.pipeline(id) {
            Some(pipeline) => {
                let family = self
                    .pipeline_family(pipeline.family)
                    .map(|f| f.name.as_str())
                    .unwrap_or("?");
                format!("{}:{}", family, pipeline.revision_number)
            }
            None => format!("Pipeline {}", id),
        }
    }

    /// True iff `target` appears as a step anywhere inside `outer`, at any depth
    pub fn pipeline_contains(&self, outer: PipelineId, target: PipelineId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![outer];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(pipeline) = self.pipeline(current) else {
                continue;
            };
            for step in &pipeline.steps {
                if let TransformationId::Pipeline(inner) = step.transformation {
                    if inner == target {
                        return true;
                    }
                    stack.push(inner);
                }
            }
        }
        false
    }

    pub fn clean_pipeline(&self, id: PipelineId) -> ValidationResult<()> {
        let pipeline = self.require_pipeline(id)?;
        let label = self.pipeline_label(id);

        pipeline.check_input_indices()?;
        self.clean_xput_list(&pipeline.inputs, XputDirection::Input, &label)?;

        if !is_consecutive_from_one(pipeline.steps.iter().map(|s| s.step_num)) {
            return Err(ValidationError::Structural(
                "Steps are not consecutively numbered starting from 1".to_string(),
            ));
        }
        let mut steps: Vec<&PipelineStep> = pipeline.steps.iter().collect();
        steps.sort_by_key(|s| s.step_num);
        for step in steps {
            self.clean_step(pipeline, step)?;
        }

        for cable in &pipeline.outcables {
            self.clean_outcable(pipeline, cable)?;
        }
        if !is_consecutive_from_one(pipeline.outcables.iter().map(|c| c.output_idx)) {
            return Err(ValidationError::Structural(
                "Outputs are not consecutively numbered starting from 1".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for cable in &pipeline.outcables {
            if !names.insert(cable.output_name.as_str()) {
                return Err(ValidationError::Structural(format!(
                    "Pipeline \"{}\" has more than one output named \"{}\"",
                    label, cable.output_name
                )));
            }
        }

        debug!("Pipeline \"{}\" is clean", label);
        Ok(())
    }

    pub fn complete_clean_pipeline(&self, id: PipelineId) -> ValidationResult<()> {
        self.clean_pipeline(id)?;
        let pipeline = self.require_pipeline(id)?;
        for step in &pipeline.steps {
            self.complete_clean_step(pipeline, step)?;
        }
        if !pipeline.steps.is_empty() {
            for cable in &pipeline.outcables {
                self.clean_and_completely_wired_outcable(pipeline, cable)?;
            }
        }
        Ok(())
    }

    /// Replaces the pipeline's outputs with one per output cable. An output at an
    /// index that already existed keeps its id.
    pub fn create_outputs(&mut self, id: PipelineId) -> ValidationResult<()> {
        let pipeline = self.require_pipeline(id)?;
        let existing: BTreeMap<u32, XputId> = pipeline
            .outputs
            .iter()
            .map(|o| (o.dataset_idx, o.id))
            .collect();

        let mut cables: Vec<&OutputCable> = pipeline.outcables.iter().collect();
        cables.sort_by_key(|c| c.output_idx);
        let derived: Vec<(Option<XputId>, OutputCable, Option<XputStructure>)> = cables
            .into_iter()
            .map(|cable| {
                let structure = cable.output_cdt.map(|cdt| {
                    match self.xput(cable.source).and_then(|s| s.structure.clone()) {
                        Some(source) if source.compound_datatype == cdt => {
                            XputStructure::new(cdt).with_rows(source.min_row, source.max_row)
                        }
                        _ => XputStructure::new(cdt),
                    }
                });
                (existing.get(&cable.output_idx).copied(), cable.clone(), structure)
            })
            .collect();

        let mut outputs = Vec::with_capacity(derived.len());
        for (reused, cable, structure) in derived {
            let xput_id = match reused {
                Some(xput_id) => xput_id,
                None => self.allocate_xput(TransformationId::Pipeline(id), XputDirection::Output),
            };
            outputs.push(TransformationXput {
                id: xput_id,
                dataset_idx: cable.output_idx,
                dataset_name: cable.output_name,
                structure,
                x: cable.x,
                y: cable.y,
            });
        }
        self.require_pipeline_mut(id)?.outputs = outputs;
        Ok(())
    }
}
