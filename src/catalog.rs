//! The arena that owns every datatype, compound datatype, method and pipeline
//!
//! Entities are created through the mutation methods below and refer to each
//! other by id. Validation lives next to each entity type as further
//! `impl Catalog` blocks.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;

use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{
    CompoundDatatypeId, ConstraintId, DatatypeId, MemberId, MethodFamilyId, MethodId,
    PipelineFamilyId, PipelineId, XputId,
};
use crate::metadata::{
    BasicConstraint, CompoundDatatype, CompoundDatatypeMember, ConstraintKind, Datatype,
    BUILTIN_TABLE,
};
use crate::pipeline::{
    CustomWire, InputCable, OutputCable, Pipeline, PipelineFamily, PipelineStep,
};
use crate::transformation::{
    Method, MethodFamily, Transformation, TransformationId, TransformationXput, XputDirection,
    XputStructure,
};

/// Address of a cable inside a pipeline, returned when the cable is added
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CableRef {
    Input {
        pipeline: PipelineId,
        step_num: u32,
        index: usize,
    },
    Output {
        pipeline: PipelineId,
        index: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Catalog {
    datatypes: Vec<Datatype>,
    next_constraint: u32,
    compound_datatypes: Vec<CompoundDatatype>,
    /// Owning compound datatype, indexed by `MemberId`
    members: Vec<CompoundDatatypeId>,
    method_families: Vec<MethodFamily>,
    methods: Vec<Method>,
    pipeline_families: IndexMap<String, PipelineFamily>,
    pipelines: Vec<Pipeline>,
    /// Owner and direction, indexed by `XputId`
    xputs: Vec<(TransformationId, XputDirection)>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An empty catalog holding only the builtin datatypes
    pub fn new() -> Self {
        let datatypes = BUILTIN_TABLE
            .iter()
            .map(|spec| Datatype {
                id: spec.id,
                name: spec.builtin.to_string(),
                description: spec.description.to_string(),
                restricts: spec.restricts.iter().map(|b| b.datatype_id()).collect(),
                constraints: Vec::new(),
                prototype: None,
            })
            .collect();

        Self {
            datatypes,
            next_constraint: 0,
            compound_datatypes: Vec::new(),
            members: Vec::new(),
            method_families: Vec::new(),
            methods: Vec::new(),
            pipeline_families: IndexMap::new(),
            pipelines: Vec::new(),
            xputs: Vec::new(),
        }
    }

    // Datatypes

    pub fn add_datatype(&mut self, name: &str, description: &str) -> DatatypeId {
        let id = DatatypeId::from_index(self.datatypes.len());
        self.datatypes.push(Datatype {
            id,
            name: name.to_string(),
            description: description.to_string(),
            restricts: BTreeSet::new(),
            constraints: Vec::new(),
            prototype: None,
        });
        debug!("Added datatype {} \"{}\"", id, name);
        id
    }

    /// Records that `id` restricts `parent`; cycles are reported by `clean_datatype`
    pub fn add_restriction(&mut self, id: DatatypeId, parent: DatatypeId) -> ValidationResult<()> {
        self.require_datatype(parent)?;
        self.require_datatype_mut(id)?.restricts.insert(parent);
        Ok(())
    }

    pub fn add_constraint(
        &mut self,
        id: DatatypeId,
        kind: ConstraintKind,
        rule: &str,
    ) -> ValidationResult<ConstraintId> {
        let constraint_id = ConstraintId(self.next_constraint);
        self.require_datatype_mut(id)?.constraints.push(BasicConstraint {
            id: constraint_id,
            datatype: id,
            kind,
            rule: rule.to_string(),
        });
        self.next_constraint += 1;
        Ok(constraint_id)
    }

    pub fn datatype(&self, id: DatatypeId) -> Option<&Datatype> {
        self.datatypes.get(id.index())
    }

    pub fn datatype_mut(&mut self, id: DatatypeId) -> Option<&mut Datatype> {
        self.datatypes.get_mut(id.index())
    }

    fn require_datatype_mut(&mut self, id: DatatypeId) -> ValidationResult<&mut Datatype> {
        self.datatypes.get_mut(id.index()).ok_or_else(|| {
            ValidationError::InvalidReference(format!("Datatype {} does not exist", id))
        })
    }

    pub fn datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.datatypes.iter()
    }

    pub fn datatype_by_name(&self, name: &str) -> Option<&Datatype> {
        self.datatypes.iter().find(|dt| dt.name == name)
    }

    // Compound datatypes

    pub fn add_compound_datatype(&mut self, name: &str) -> CompoundDatatypeId {
        let id = CompoundDatatypeId::from_index(self.compound_datatypes.len());
        self.compound_datatypes.push(CompoundDatatype {
            id,
            name: name.to_string(),
            members: Vec::new(),
        });
        id
    }

    pub fn add_member(
        &mut self,
        compound_datatype: CompoundDatatypeId,
        column_idx: u32,
        column_name: &str,
        datatype: DatatypeId,
        blankable: bool,
    ) -> ValidationResult<MemberId> {
        self.require_datatype(datatype)?;
        let id = MemberId::from_index(self.members.len());
        let cdt = self
            .compound_datatypes
            .get_mut(compound_datatype.index())
            .ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Compound datatype {} does not exist",
                    compound_datatype
                ))
            })?;
        cdt.members.push(CompoundDatatypeMember {
            id,
            compound_datatype,
            column_idx,
            column_name: column_name.to_string(),
            datatype,
            blankable,
        });
        self.members.push(compound_datatype);
        Ok(id)
    }

    pub fn compound_datatype(&self, id: CompoundDatatypeId) -> Option<&CompoundDatatype> {
        self.compound_datatypes.get(id.index())
    }

    pub fn compound_datatypes(&self) -> impl Iterator<Item = &CompoundDatatype> {
        self.compound_datatypes.iter()
    }

    pub fn compound_datatype_by_name(&self, name: &str) -> Option<&CompoundDatatype> {
        self.compound_datatypes.iter().find(|cdt| cdt.name == name)
    }

    pub fn member(&self, id: MemberId) -> Option<&CompoundDatatypeMember> {
        let cdt = self.members.get(id.index())?;
        self.compound_datatype(*cdt)?.member(id)
    }

    // Methods

    pub fn add_method_family(&mut self, name: &str, description: &str) -> MethodFamilyId {
        let id = MethodFamilyId::from_index(self.method_families.len());
        self.method_families.push(MethodFamily {
            id,
            name: name.to_string(),
            description: description.to_string(),
        });
        id
    }

    /// Adds the next revision of a method family, parented on the latest one
    pub fn add_method(
        &mut self,
        family: MethodFamilyId,
        revision_name: &str,
    ) -> ValidationResult<MethodId> {
        if self.method_family(family).is_none() {
            return Err(ValidationError::InvalidReference(format!(
                "Method family {} does not exist",
                family
            )));
        }
        let latest = self
            .methods
            .iter()
            .filter(|m| m.family == family)
            .max_by_key(|m| m.revision_number);
        let revision_number = latest.map_or(1, |m| m.revision_number + 1);
        let revision_parent = latest.map(|m| m.id);

        let id = MethodId::from_index(self.methods.len());
        self.methods.push(Method {
            id,
            family,
            revision_number,
            revision_name: revision_name.to_string(),
            revision_desc: String::new(),
            revision_parent,
            driver: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        Ok(id)
    }

    pub fn method_family(&self, id: MethodFamilyId) -> Option<&MethodFamily> {
        self.method_families.get(id.index())
    }

    pub fn method_families(&self) -> impl Iterator<Item = &MethodFamily> {
        self.method_families.iter()
    }

    pub fn method(&self, id: MethodId) -> Option<&Method> {
        self.methods.get(id.index())
    }

    pub fn method_mut(&mut self, id: MethodId) -> Option<&mut Method> {
        self.methods.get_mut(id.index())
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    // Xputs

    pub(crate) fn allocate_xput(
        &mut self,
        owner: TransformationId,
        direction: XputDirection,
    ) -> XputId {
        let id = XputId::from_index(self.xputs.len());
        self.xputs.push((owner, direction));
        id
    }

    /// Adds an input to a method or pipeline
    pub fn add_input(
        &mut self,
        owner: TransformationId,
        dataset_idx: u32,
        dataset_name: &str,
        structure: Option<XputStructure>,
    ) -> ValidationResult<XputId> {
        self.require_transformation(owner)?;
        let id = self.allocate_xput(owner, XputDirection::Input);
        let xput = TransformationXput {
            id,
            dataset_idx,
            dataset_name: dataset_name.to_string(),
            structure,
            x: 0.0,
            y: 0.0,
        };
        match owner {
            TransformationId::Method(m) => self.methods[m.index()].inputs.push(xput),
            TransformationId::Pipeline(p) => self.pipelines[p.index()].inputs.push(xput),
        }
        Ok(id)
    }

    /// Adds an output to a method. Pipeline outputs are derived by `create_outputs`.
    pub fn add_output(
        &mut self,
        method: MethodId,
        dataset_idx: u32,
        dataset_name: &str,
        structure: Option<XputStructure>,
    ) -> ValidationResult<XputId> {
        self.require_method(method)?;
        let id = self.allocate_xput(TransformationId::Method(method), XputDirection::Output);
        self.methods[method.index()].outputs.push(TransformationXput {
            id,
            dataset_idx,
            dataset_name: dataset_name.to_string(),
            structure,
            x: 0.0,
            y: 0.0,
        });
        Ok(id)
    }

    pub fn xput(&self, id: XputId) -> Option<&TransformationXput> {
        let (owner, direction) = self.xput_owner(id)?;
        let transformation = self.transformation(owner)?;
        match direction {
            XputDirection::Input => transformation.input(id),
            XputDirection::Output => transformation.output(id),
        }
    }

    pub fn xput_owner(&self, id: XputId) -> Option<(TransformationId, XputDirection)> {
        self.xputs.get(id.index()).copied()
    }

    // Pipelines

    pub fn add_pipeline_family(&mut self, name: &str, description: &str) -> PipelineFamilyId {
        if let Some(existing) = self.pipeline_families.get(name) {
            return existing.id;
        }
        let id = PipelineFamilyId::from_index(self.pipeline_families.len());
        self.pipeline_families.insert(
            name.to_string(),
            PipelineFamily {
                id,
                name: name.to_string(),
                description: description.to_string(),
                published_version: None,
            },
        );
        id
    }

    pub fn pipeline_family(&self, id: PipelineFamilyId) -> Option<&PipelineFamily> {
        self.pipeline_families
            .get_index(id.index())
            .map(|(_, family)| family)
    }

    pub fn pipeline_family_mut(&mut self, id: PipelineFamilyId) -> Option<&mut PipelineFamily> {
        self.pipeline_families
            .get_index_mut(id.index())
            .map(|(_, family)| family)
    }

    pub fn pipeline_family_by_name(&self, name: &str) -> Option<&PipelineFamily> {
        self.pipeline_families.get(name)
    }

    pub fn pipeline_families(&self) -> impl Iterator<Item = &PipelineFamily> {
        self.pipeline_families.values()
    }

    /// Adds the next revision of a pipeline family, parented on the latest one
    pub fn add_pipeline(&mut self, family: PipelineFamilyId) -> ValidationResult<PipelineId> {
        if self.pipeline_family(family).is_none() {
            return Err(ValidationError::InvalidReference(format!(
                "Pipeline family {} does not exist",
                family
            )));
        }
        let latest = self.latest_revision(family);
        let revision_number = latest
            .and_then(|p| self.pipeline(p))
            .map_or(1, |p| p.revision_number + 1);

        let id = PipelineId::from_index(self.pipelines.len());
        self.pipelines.push(Pipeline {
            id,
            family,
            revision_number,
            revision_name: String::new(),
            revision_desc: String::new(),
            revision_parent: latest,
            user: String::new(),
            users_allowed: Vec::new(),
            groups_allowed: Vec::new(),
            inputs: Vec::new(),
            steps: Vec::new(),
            outcables: Vec::new(),
            outputs: Vec::new(),
        });
        debug!("Added pipeline revision {} to family {}", revision_number, family);
        Ok(id)
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.get(id.index())
    }

    pub fn pipeline_mut(&mut self, id: PipelineId) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(id.index())
    }

    pub(crate) fn require_pipeline_mut(&mut self, id: PipelineId) -> ValidationResult<&mut Pipeline> {
        self.pipelines.get_mut(id.index()).ok_or_else(|| {
            ValidationError::InvalidReference(format!("Pipeline {} does not exist", id))
        })
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.iter()
    }

    /// Revisions of a family in revision order
    pub fn family_revisions(&self, family: PipelineFamilyId) -> Vec<PipelineId> {
        let mut revisions: Vec<&Pipeline> =
            self.pipelines.iter().filter(|p| p.family == family).collect();
        revisions.sort_by_key(|p| p.revision_number);
        revisions.into_iter().map(|p| p.id).collect()
    }

    pub fn latest_revision(&self, family: PipelineFamilyId) -> Option<PipelineId> {
        self.family_revisions(family).last().copied()
    }

    pub fn pipeline_revision(&self, family: PipelineFamilyId, revision: u32) -> Option<PipelineId> {
        self.pipelines
            .iter()
            .find(|p| p.family == family && p.revision_number == revision)
            .map(|p| p.id)
    }

    /// True iff some other revision names `id` as its parent
    pub fn has_been_revised(&self, id: PipelineId) -> bool {
        self.pipelines.iter().any(|p| p.revision_parent == Some(id))
    }

    pub fn add_step(
        &mut self,
        pipeline: PipelineId,
        step_num: u32,
        transformation: TransformationId,
        name: &str,
    ) -> ValidationResult<()> {
        self.require_transformation(transformation)?;
        self.require_pipeline_mut(pipeline)?.steps.push(PipelineStep {
            step_num,
            transformation,
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
            cables_in: Vec::new(),
            outputs_to_delete: Vec::new(),
        });
        Ok(())
    }

    fn require_step_mut(
        &mut self,
        pipeline: PipelineId,
        step_num: u32,
    ) -> ValidationResult<&mut PipelineStep> {
        let label = self.pipeline_label(pipeline);
        self.require_pipeline_mut(pipeline)?
            .step_mut(step_num)
            .ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Pipeline \"{}\" has no step {}",
                    label, step_num
                ))
            })
    }

    /// Feeds `dest`, an input of the transformation at `step_num`, from `source`.
    /// A `source_step` of 0 means `source` is a pipeline input.
    pub fn add_input_cable(
        &mut self,
        pipeline: PipelineId,
        step_num: u32,
        source_step: u32,
        source: XputId,
        dest: XputId,
    ) -> ValidationResult<CableRef> {
        let step = self.require_step_mut(pipeline, step_num)?;
        step.cables_in.push(InputCable {
            source_step,
            source,
            dest,
            keep_output: false,
            custom_wires: Vec::new(),
        });
        Ok(CableRef::Input {
            pipeline,
            step_num,
            index: step.cables_in.len() - 1,
        })
    }

    pub fn add_outcable(
        &mut self,
        pipeline: PipelineId,
        output_idx: u32,
        output_name: &str,
        output_cdt: Option<CompoundDatatypeId>,
        source_step: u32,
        source: XputId,
    ) -> ValidationResult<CableRef> {
        let target = self.require_pipeline_mut(pipeline)?;
        target.outcables.push(OutputCable {
            output_idx,
            output_name: output_name.to_string(),
            output_cdt,
            source_step,
            source,
            x: 0.0,
            y: 0.0,
            custom_wires: Vec::new(),
        });
        Ok(CableRef::Output {
            pipeline,
            index: target.outcables.len() - 1,
        })
    }

    pub fn add_wire(
        &mut self,
        cable: CableRef,
        source_pin: MemberId,
        dest_pin: MemberId,
    ) -> ValidationResult<()> {
        let wire = CustomWire {
            source_pin,
            dest_pin,
        };
        let missing = || ValidationError::InvalidReference(format!("Cable {:?} does not exist", cable));
        match cable {
            CableRef::Input {
                pipeline,
                step_num,
                index,
            } => self
                .require_step_mut(pipeline, step_num)?
                .cables_in
                .get_mut(index)
                .ok_or_else(missing)?
                .custom_wires
                .push(wire),
            CableRef::Output { pipeline, index } => self
                .require_pipeline_mut(pipeline)?
                .outcables
                .get_mut(index)
                .ok_or_else(missing)?
                .custom_wires
                .push(wire),
        }
        Ok(())
    }

    pub fn add_output_to_delete(
        &mut self,
        pipeline: PipelineId,
        step_num: u32,
        output: XputId,
    ) -> ValidationResult<()> {
        let step = self.require_step_mut(pipeline, step_num)?;
        if !step.outputs_to_delete.contains(&output) {
            step.outputs_to_delete.push(output);
        }
        Ok(())
    }
}
