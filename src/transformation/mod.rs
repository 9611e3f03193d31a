//! Transformations: anything with ordered typed or raw inputs and outputs
//!
//! A transformation is either a [`Method`] or a [`Pipeline`]. Both expose their
//! xputs through the [`Transformation`] trait so steps can treat them alike.

pub mod method;

pub use method::{Method, MethodFamily};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::catalog::Catalog;
use crate::common::is_consecutive_from_one;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{CompoundDatatypeId, MethodId, PipelineId, XputId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformationId {
    Method(MethodId),
    Pipeline(PipelineId),
}

impl TransformationId {
    pub fn kind(self) -> TransformationKind {
        match self {
            TransformationId::Method(_) => TransformationKind::Method,
            TransformationId::Pipeline(_) => TransformationKind::Pipeline,
        }
    }

    pub fn pk(self) -> u32 {
        match self {
            TransformationId::Method(id) => id.0,
            TransformationId::Pipeline(id) => id.0,
        }
    }
}

/// The `transf_type` of a pipeline step dictionary
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformationKind {
    Method,
    Pipeline,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum XputDirection {
    Input,
    Output,
}

impl fmt::Display for XputDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XputDirection::Input => write!(f, "Input"),
            XputDirection::Output => write!(f, "Output"),
        }
    }
}

/// CDT and row bounds of a non-raw xput
#[derive(Clone, Debug, PartialEq)]
pub struct XputStructure {
    pub compound_datatype: CompoundDatatypeId,
    pub min_row: Option<u32>,
    pub max_row: Option<u32>,
}

impl XputStructure {
    pub fn new(compound_datatype: CompoundDatatypeId) -> Self {
        Self {
            compound_datatype,
            min_row: None,
            max_row: None,
        }
    }

    pub fn with_rows(mut self, min_row: Option<u32>, max_row: Option<u32>) -> Self {
        self.min_row = min_row;
        self.max_row = max_row;
        self
    }
}

/// An input or output of a transformation; no structure means raw
#[derive(Clone, Debug, PartialEq)]
pub struct TransformationXput {
    pub id: XputId,
    pub dataset_idx: u32,
    pub dataset_name: String,
    pub structure: Option<XputStructure>,
    pub x: f64,
    pub y: f64,
}

impl TransformationXput {
    pub fn is_raw(&self) -> bool {
        self.structure.is_none()
    }

    pub fn compound_datatype(&self) -> Option<CompoundDatatypeId> {
        self.structure.as_ref().map(|s| s.compound_datatype)
    }

    pub fn min_row(&self) -> Option<u32> {
        self.structure.as_ref().and_then(|s| s.min_row)
    }

    pub fn max_row(&self) -> Option<u32> {
        self.structure.as_ref().and_then(|s| s.max_row)
    }
}

pub trait Transformation {
    fn inputs(&self) -> &[TransformationXput];

    fn outputs(&self) -> &[TransformationXput];

    fn input(&self, id: XputId) -> Option<&TransformationXput> {
        self.inputs().iter().find(|x| x.id == id)
    }

    fn output(&self, id: XputId) -> Option<&TransformationXput> {
        self.outputs().iter().find(|x| x.id == id)
    }

    fn input_named(&self, name: &str) -> Option<&TransformationXput> {
        self.inputs().iter().find(|x| x.dataset_name == name)
    }

    fn output_named(&self, name: &str) -> Option<&TransformationXput> {
        self.outputs().iter().find(|x| x.dataset_name == name)
    }

    fn check_input_indices(&self) -> ValidationResult<()> {
        if !is_consecutive_from_one(self.inputs().iter().map(|x| x.dataset_idx)) {
            return Err(ValidationError::Structural(
                "Inputs are not consecutively numbered starting from 1".to_string(),
            ));
        }
        Ok(())
    }

    fn check_output_indices(&self) -> ValidationResult<()> {
        if !is_consecutive_from_one(self.outputs().iter().map(|x| x.dataset_idx)) {
            return Err(ValidationError::Structural(
                "Outputs are not consecutively numbered starting from 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Catalog {
    pub fn transformation(&self, id: TransformationId) -> Option<&dyn Transformation> {
        match id {
            TransformationId::Method(m) => self.method(m).map(|m| m as &dyn Transformation),
            TransformationId::Pipeline(p) => self.pipeline(p).map(|p| p as &dyn Transformation),
        }
    }

    pub(crate) fn require_transformation(
        &self,
        id: TransformationId,
    ) -> ValidationResult<&dyn Transformation> {
        self.transformation(id).ok_or_else(|| {
            ValidationError::InvalidReference(format!(
                "{:?} {} does not exist",
                id.kind(),
                id.pk()
            ))
        })
    }

    /// Name of an xput for messages, falling back to its id
    pub(crate) fn xput_label(&self, id: XputId) -> String {
        self.xput(id)
            .map(|x| x.dataset_name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    fn clean_xput(
        &self,
        xput: &TransformationXput,
        direction: XputDirection,
        owner: &str,
    ) -> ValidationResult<()> {
        if xput.dataset_name.trim().is_empty() {
            return Err(ValidationError::Structural(format!(
                "{} {} of {} has a blank name",
                direction, xput.dataset_idx, owner
            )));
        }
        if let Some(structure) = &xput.structure {
            self.require_compound_datatype(structure.compound_datatype)?;
            if let (Some(min), Some(max)) = (structure.min_row, structure.max_row) {
                if min > max {
                    return Err(ValidationError::Structural(format!(
                        "{} \"{}\" of {} has min_row {} exceeding its max_row {}",
                        direction, xput.dataset_name, owner, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn clean_xput_list(
        &self,
        xputs: &[TransformationXput],
        direction: XputDirection,
        owner: &str,
    ) -> ValidationResult<()> {
        let mut names = HashSet::new();
        for xput in xputs {
            self.clean_xput(xput, direction, owner)?;
            if !names.insert(xput.dataset_name.as_str()) {
                return Err(ValidationError::Structural(format!(
                    "{} has more than one {} named \"{}\"",
                    owner,
                    direction.to_string().to_lowercase(),
                    xput.dataset_name
                )));
            }
        }
        Ok(())
    }

    /// `family:revision` label used in messages
    pub fn transformation_label(&self, id: TransformationId) -> String {
        match id {
            TransformationId::Method(m) => self.method_label(m),
            TransformationId::Pipeline(p) => self.pipeline_label(p),
        }
    }

    /// Index consecutiveness plus per-xput validity for both directions
    pub fn clean_transformation_xputs(&self, id: TransformationId) -> ValidationResult<()> {
        let transformation = self.require_transformation(id)?;
        let owner = self.transformation_label(id);
        transformation.check_input_indices()?;
        transformation.check_output_indices()?;
        self.clean_xput_list(transformation.inputs(), XputDirection::Input, &owner)?;
        self.clean_xput_list(transformation.outputs(), XputDirection::Output, &owner)
    }
}
