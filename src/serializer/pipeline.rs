use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::catalog::{CableRef, Catalog};
use crate::errors::{SerializationError, SerializationResult};
use crate::ids::{CompoundDatatypeId, MemberId, MethodId, PipelineFamilyId, PipelineId, XputId};
use crate::pipeline::CustomWire;
use crate::transformation::{
    Transformation, TransformationId, TransformationKind, TransformationXput, XputDirection,
    XputStructure,
};

use super::schema::{
    InputCableDict, OutputCableDict, PipelineDict, PipelineInputDict, PipelineStepDict, WireDict,
};
use super::ExecutionHistory;

fn unknown(what: String) -> SerializationError {
    SerializationError::UnknownReference(what)
}

impl Catalog {
    pub fn represent_as_dict(&self, id: PipelineId) -> SerializationResult<PipelineDict> {
        let pipeline = self.require_pipeline(id)?;
        let family = self
            .pipeline_family(pipeline.family)
            .ok_or(SerializationError::FamilyNotFound(pipeline.family.0))?;

        let mut inputs: Vec<&TransformationXput> = pipeline.inputs.iter().collect();
        inputs.sort_by_key(|x| x.dataset_idx);
        let pipeline_inputs = inputs
            .into_iter()
            .map(|input| PipelineInputDict {
                cdt_pk: input.compound_datatype().map(|c| c.0),
                dataset_name: input.dataset_name.clone(),
                dataset_idx: input.dataset_idx,
                x: input.x,
                y: input.y,
                min_row: input.min_row(),
                max_row: input.max_row(),
            })
            .collect();

        let mut steps: Vec<_> = pipeline.steps.iter().collect();
        steps.sort_by_key(|s| s.step_num);
        let mut pipeline_steps = Vec::with_capacity(steps.len());
        for step in steps {
            let cables_in = step
                .cables_in
                .iter()
                .map(|cable| {
                    Ok(InputCableDict {
                        source_dataset_name: self.xput_label(cable.source),
                        source_step: cable.source_step,
                        dest_dataset_name: self.xput_label(cable.dest),
                        keep_output: cable.keep_output,
                        wires: self.represent_wires(&cable.custom_wires)?,
                    })
                })
                .collect::<SerializationResult<Vec<_>>>()?;
            pipeline_steps.push(PipelineStepDict {
                transf_pk: step.transformation.pk(),
                transf_type: step.transformation.kind(),
                family_pk: self.transformation_family_pk(step.transformation)?,
                step_num: step.step_num,
                x: step.x,
                y: step.y,
                name: step.name.clone(),
                cables_in,
                outputs_to_delete: step
                    .outputs_to_delete
                    .iter()
                    .map(|o| self.xput_label(*o))
                    .collect(),
            });
        }

        let mut outcables: Vec<_> = pipeline.outcables.iter().collect();
        outcables.sort_by_key(|c| c.output_idx);
        let pipeline_outputs = outcables
            .into_iter()
            .map(|cable| {
                Ok(OutputCableDict {
                    output_idx: cable.output_idx,
                    output_name: cable.output_name.clone(),
                    output_cdt_pk: cable.output_cdt.map(|c| c.0),
                    source_step: cable.source_step,
                    source_dataset_name: self.xput_label(cable.source),
                    x: cable.x,
                    y: cable.y,
                    wires: self.represent_wires(&cable.custom_wires)?,
                })
            })
            .collect::<SerializationResult<Vec<_>>>()?;

        Ok(PipelineDict {
            user: pipeline.user.clone(),
            users_allowed: pipeline.users_allowed.clone(),
            groups_allowed: pipeline.groups_allowed.clone(),
            family_pk: Some(family.id.0),
            family_name: family.name.clone(),
            family_desc: family.description.clone(),
            revision_number: Some(pipeline.revision_number),
            revision_name: pipeline.revision_name.clone(),
            revision_desc: pipeline.revision_desc.clone(),
            revision_parent_pk: pipeline.revision_parent.map(|p| p.0),
            pipeline_inputs,
            pipeline_steps,
            pipeline_outputs,
            is_published_version: family.published_version == Some(id),
        })
    }

    fn represent_wires(&self, wires: &[CustomWire]) -> SerializationResult<Vec<WireDict>> {
        wires
            .iter()
            .map(|wire| {
                Ok(WireDict {
                    source_idx: self.wire_pin_column(wire.source_pin)?,
                    dest_idx: self.wire_pin_column(wire.dest_pin)?,
                })
            })
            .collect()
    }

    fn wire_pin_column(&self, pin: MemberId) -> SerializationResult<u32> {
        self.member(pin)
            .map(|member| member.column_idx)
            .ok_or_else(|| unknown(format!("Wire pin {} is not a compound datatype member", pin)))
    }

    fn transformation_family_pk(&self, id: TransformationId) -> SerializationResult<u32> {
        match id {
            TransformationId::Method(m) => Ok(self.require_method(m)?.family.0),
            TransformationId::Pipeline(p) => Ok(self.require_pipeline(p)?.family.0),
        }
    }

    /// Creates a new family and its first revision from `dict`
    pub fn create_from_dict(&mut self, dict: &PipelineDict) -> SerializationResult<PipelineId> {
        if self.pipeline_family_by_name(&dict.family_name).is_some() {
            return Err(SerializationError::DuplicateFamilyName(dict.family_name.clone()));
        }
        let id = self.transactionally(|catalog| {
            let family = catalog.add_pipeline_family(&dict.family_name, &dict.family_desc);
            let id = catalog.add_pipeline(family)?;
            catalog.populate_pipeline(id, dict, &BTreeMap::new())?;
            Ok(id)
        })?;
        info!("Created pipeline \"{}\"", self.pipeline_label(id));
        Ok(id)
    }

    /// Adds a revision to the family `dict.family_pk`
    pub fn revise_from_dict(&mut self, dict: &PipelineDict) -> SerializationResult<PipelineId> {
        let family_pk = dict
            .family_pk
            .ok_or_else(|| unknown("family_pk is required to revise a pipeline".to_string()))?;
        let family = PipelineFamilyId(family_pk);
        if self.pipeline_family(family).is_none() {
            return Err(SerializationError::FamilyNotFound(family_pk));
        }
        let parent = match dict.revision_parent_pk {
            Some(pk) => {
                let parent = PipelineId(pk);
                match self.pipeline(parent) {
                    Some(p) if p.family == family => Some(parent),
                    _ => {
                        return Err(unknown(format!(
                            "Revision parent {} is not a revision of family {}",
                            pk, family_pk
                        )))
                    }
                }
            }
            None => self.latest_revision(family),
        };

        let id = self.transactionally(|catalog| {
            let id = catalog.add_pipeline(family)?;
            catalog.require_pipeline_mut(id)?.revision_parent = parent;
            catalog.populate_pipeline(id, dict, &BTreeMap::new())?;
            Ok(id)
        })?;
        info!("Revised pipeline family as \"{}\"", self.pipeline_label(id));
        Ok(id)
    }

    /// Replaces the contents of a pipeline that has neither been run nor revised
    pub fn update_from_dict(
        &mut self,
        id: PipelineId,
        dict: &PipelineDict,
        history: &impl ExecutionHistory,
    ) -> SerializationResult<()> {
        self.require_pipeline(id)?;
        let label = self.pipeline_label(id);
        if history.has_run(id) {
            return Err(SerializationError::ImmutablePipeline {
                pipeline: label,
                reason: "has been run".to_string(),
            });
        }
        if self.has_been_revised(id) {
            return Err(SerializationError::ImmutablePipeline {
                pipeline: label,
                reason: "has already been revised".to_string(),
            });
        }

        self.transactionally(|catalog| {
            let pipeline = catalog.require_pipeline_mut(id)?;
            let kept_inputs: BTreeMap<u32, XputId> = pipeline
                .inputs
                .drain(..)
                .map(|input| (input.dataset_idx, input.id))
                .collect();
            pipeline.steps.clear();
            pipeline.outcables.clear();
            catalog.populate_pipeline(id, dict, &kept_inputs)
        })?;
        info!("Updated pipeline \"{}\"", label);
        Ok(())
    }

    /// Runs `edit` and restores the catalog if it fails
    fn transactionally<T>(
        &mut self,
        edit: impl FnOnce(&mut Catalog) -> SerializationResult<T>,
    ) -> SerializationResult<T> {
        let snapshot = self.clone();
        let result = edit(self);
        if let Err(err) = &result {
            warn!("Discarding pipeline changes: {}", err);
            *self = snapshot;
        }
        result
    }

    /// Fills an empty pipeline from `dict`. Inputs whose index is in
    /// `kept_inputs` reuse that id so enclosing pipelines stay wired.
    fn populate_pipeline(
        &mut self,
        id: PipelineId,
        dict: &PipelineDict,
        kept_inputs: &BTreeMap<u32, XputId>,
    ) -> SerializationResult<()> {
        {
            let pipeline = self.require_pipeline_mut(id)?;
            pipeline.user = dict.user.clone();
            pipeline.users_allowed = dict.users_allowed.clone();
            pipeline.groups_allowed = dict.groups_allowed.clone();
            pipeline.revision_name = dict.revision_name.clone();
            pipeline.revision_desc = dict.revision_desc.clone();
        }

        for input in &dict.pipeline_inputs {
            let structure = match input.cdt_pk {
                Some(pk) => Some(
                    XputStructure::new(self.resolve_cdt(pk)?).with_rows(input.min_row, input.max_row),
                ),
                None => None,
            };
            let xput = match kept_inputs.get(&input.dataset_idx) {
                Some(kept) => *kept,
                None => self.allocate_xput(TransformationId::Pipeline(id), XputDirection::Input),
            };
            self.require_pipeline_mut(id)?.inputs.push(TransformationXput {
                id: xput,
                dataset_idx: input.dataset_idx,
                dataset_name: input.dataset_name.clone(),
                structure,
                x: input.x,
                y: input.y,
            });
        }

        for step in &dict.pipeline_steps {
            let transformation = self.resolve_transformation(step)?;
            self.add_step(id, step.step_num, transformation, &step.name)?;
            if let Some(added) = self.pipeline_mut(id).and_then(|p| p.step_mut(step.step_num)) {
                added.x = step.x;
                added.y = step.y;
            }
        }

        for step in &dict.pipeline_steps {
            self.populate_step_cables(id, step)?;
        }

        for output in &dict.pipeline_outputs {
            self.populate_outcable(id, output)?;
        }

        self.create_outputs(id)?;
        let family = self.require_pipeline(id)?.family;
        if let Some(family) = self.pipeline_family_mut(family) {
            family.description = dict.family_desc.clone();
            if dict.is_published_version {
                family.published_version = Some(id);
            } else if family.published_version == Some(id) {
                family.published_version = None;
            }
        }
        self.clean_pipeline(id)?;
        debug!("Populated pipeline \"{}\" from dictionary", self.pipeline_label(id));
        Ok(())
    }

    fn resolve_cdt(&self, pk: u32) -> SerializationResult<CompoundDatatypeId> {
        let id = CompoundDatatypeId(pk);
        self.compound_datatype(id)
            .map(|_| id)
            .ok_or_else(|| unknown(format!("Compound datatype {} does not exist", pk)))
    }

    fn resolve_transformation(&self, step: &PipelineStepDict) -> SerializationResult<TransformationId> {
        let (id, family) = match step.transf_type {
            TransformationKind::Method => {
                let method = self
                    .method(MethodId(step.transf_pk))
                    .ok_or_else(|| unknown(format!("Method {} does not exist", step.transf_pk)))?;
                (TransformationId::Method(method.id), method.family.0)
            }
            TransformationKind::Pipeline => {
                let pipeline = self
                    .pipeline(PipelineId(step.transf_pk))
                    .ok_or_else(|| unknown(format!("Pipeline {} does not exist", step.transf_pk)))?;
                (TransformationId::Pipeline(pipeline.id), pipeline.family.0)
            }
        };
        if family != step.family_pk {
            return Err(unknown(format!(
                "{:?} {} at step {} does not belong to family {}",
                step.transf_type, step.transf_pk, step.step_num, step.family_pk
            )));
        }
        Ok(id)
    }

    fn transformation_at(&self, pipeline: PipelineId, step_num: u32) -> SerializationResult<&dyn Transformation> {
        let step = self
            .require_pipeline(pipeline)?
            .step(step_num)
            .ok_or_else(|| unknown(format!("Step {} does not exist", step_num)))?;
        Ok(self.require_transformation(step.transformation)?)
    }

    /// The xput named `name` among the pipeline inputs (`step_num == 0`) or the
    /// outputs of the transformation at `step_num`
    fn resolve_source(&self, pipeline: PipelineId, step_num: u32, name: &str) -> SerializationResult<&TransformationXput> {
        if step_num == 0 {
            return self
                .require_pipeline(pipeline)?
                .input_named(name)
                .ok_or_else(|| unknown(format!("Pipeline input \"{}\" does not exist", name)));
        }
        self.transformation_at(pipeline, step_num)?
            .output_named(name)
            .ok_or_else(|| {
                unknown(format!("Step {} has no output named \"{}\"", step_num, name))
            })
    }

    fn resolve_pin(&self, cdt: Option<CompoundDatatypeId>, column_idx: u32) -> SerializationResult<MemberId> {
        cdt.and_then(|cdt| self.compound_datatype(cdt))
            .and_then(|cdt| cdt.member_at(column_idx))
            .map(|m| m.id)
            .ok_or_else(|| unknown(format!("Wire refers to missing column {}", column_idx)))
    }

    fn populate_wires(
        &mut self,
        cable: CableRef,
        source_cdt: Option<CompoundDatatypeId>,
        dest_cdt: Option<CompoundDatatypeId>,
        wires: &[WireDict],
    ) -> SerializationResult<()> {
        for wire in wires {
            let source_pin = self.resolve_pin(source_cdt, wire.source_idx)?;
            let dest_pin = self.resolve_pin(dest_cdt, wire.dest_idx)?;
            self.add_wire(cable, source_pin, dest_pin)?;
        }
        Ok(())
    }

    fn populate_step_cables(&mut self, id: PipelineId, step: &PipelineStepDict) -> SerializationResult<()> {
        for cable in &step.cables_in {
            let source = self.resolve_source(id, cable.source_step, &cable.source_dataset_name)?;
            let (source_id, source_cdt) = (source.id, source.compound_datatype());
            let dest = self
                .transformation_at(id, step.step_num)?
                .input_named(&cable.dest_dataset_name)
                .ok_or_else(|| {
                    unknown(format!(
                        "Step {} has no input named \"{}\"",
                        step.step_num, cable.dest_dataset_name
                    ))
                })?;
            let (dest_id, dest_cdt) = (dest.id, dest.compound_datatype());

            let cable_ref = self.add_input_cable(id, step.step_num, cable.source_step, source_id, dest_id)?;
            if let CableRef::Input { index, .. } = cable_ref {
                if let Some(added) = self
                    .pipeline_mut(id)
                    .and_then(|p| p.step_mut(step.step_num))
                    .and_then(|s| s.cables_in.get_mut(index))
                {
                    added.keep_output = cable.keep_output;
                }
            }
            self.populate_wires(cable_ref, source_cdt, dest_cdt, &cable.wires)?;
        }

        for name in &step.outputs_to_delete {
            let output: XputId = self
                .transformation_at(id, step.step_num)?
                .output_named(name)
                .map(|o| o.id)
                .ok_or_else(|| {
                    unknown(format!("Step {} has no output named \"{}\"", step.step_num, name))
                })?;
            self.add_output_to_delete(id, step.step_num, output)?;
        }
        Ok(())
    }

    fn populate_outcable(&mut self, id: PipelineId, output: &OutputCableDict) -> SerializationResult<()> {
        let source = self.resolve_source(id, output.source_step, &output.source_dataset_name)?;
        let (source_id, source_cdt) = (source.id, source.compound_datatype());
        let output_cdt = output.output_cdt_pk.map(|pk| self.resolve_cdt(pk)).transpose()?;

        let cable_ref = self.add_outcable(
            id,
            output.output_idx,
            &output.output_name,
            output_cdt,
            output.source_step,
            source_id,
        )?;
        if let CableRef::Output { index, .. } = cable_ref {
            if let Some(added) = self.pipeline_mut(id).and_then(|p| p.outcables.get_mut(index)) {
                added.x = output.x;
                added.y = output.y;
            }
        }
        self.populate_wires(cable_ref, source_cdt, output_cdt, &output.wires)
    }
}
