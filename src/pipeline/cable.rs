//! Cables feed data between steps; custom wires map columns across CDTs

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{CompoundDatatypeId, MemberId, XputId};
use crate::transformation::{Transformation, TransformationXput};

use super::{Pipeline, PipelineStep};

/// Routes one source column to one destination column
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CustomWire {
    pub source_pin: MemberId,
    pub dest_pin: MemberId,
}

/// Feeds an input of a step from a pipeline input (`source_step == 0`) or an
/// earlier step's output
#[derive(Clone, Debug, PartialEq)]
pub struct InputCable {
    pub source_step: u32,
    pub source: XputId,
    pub dest: XputId,
    pub keep_output: bool,
    pub custom_wires: Vec<CustomWire>,
}

/// Exposes a step output as a pipeline output
#[derive(Clone, Debug, PartialEq)]
pub struct OutputCable {
    pub output_idx: u32,
    pub output_name: String,
    pub output_cdt: Option<CompoundDatatypeId>,
    pub source_step: u32,
    pub source: XputId,
    pub x: f64,
    pub y: f64,
    pub custom_wires: Vec<CustomWire>,
}

impl Catalog {
    fn pin_label(&self, pin: MemberId) -> String {
        self.member(pin)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("#{}", pin))
    }

    fn cdt_label(&self, cdt: CompoundDatatypeId) -> String {
        self.compound_datatype(cdt)
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("#{}", cdt))
    }

    /// Raw agreement and per-wire checks shared by input and output cables
    fn clean_wiring(
        &self,
        source: &TransformationXput,
        dest_cdt: Option<CompoundDatatypeId>,
        wires: &[CustomWire],
        cable: &str,
    ) -> ValidationResult<()> {
        let (source_cdt, dest_cdt) = match (source.compound_datatype(), dest_cdt) {
            (None, None) => {
                if !wires.is_empty() {
                    return Err(ValidationError::Structural(format!(
                        "{} is raw and cannot have custom wires",
                        cable
                    )));
                }
                return Ok(());
            }
            (Some(source_cdt), Some(dest_cdt)) => (source_cdt, dest_cdt),
            _ => {
                return Err(ValidationError::TypeCompatibility(format!(
                    "{} connects raw and non-raw data",
                    cable
                )))
            }
        };

        let mut fed = HashSet::new();
        for wire in wires {
            let source_pin = self
                .member(wire.source_pin)
                .filter(|m| m.compound_datatype == source_cdt)
                .ok_or_else(|| {
                    ValidationError::TypeCompatibility(format!(
                        "Source pin \"{}\" does not come from compound datatype \"{}\"",
                        self.pin_label(wire.source_pin),
                        self.cdt_label(source_cdt)
                    ))
                })?;
            let dest_pin = self
                .member(wire.dest_pin)
                .filter(|m| m.compound_datatype == dest_cdt)
                .ok_or_else(|| {
                    ValidationError::TypeCompatibility(format!(
                        "Destination pin \"{}\" does not come from compound datatype \"{}\"",
                        self.pin_label(wire.dest_pin),
                        self.cdt_label(dest_cdt)
                    ))
                })?;
            if source_pin.datatype != dest_pin.datatype
                && !self.is_restricted_by(source_pin.datatype, dest_pin.datatype)
            {
                return Err(ValidationError::TypeCompatibility(format!(
                    "The datatype of the source pin \"{}\" is incompatible with the datatype of the destination pin \"{}\"",
                    source_pin, dest_pin
                )));
            }
            if !fed.insert(wire.dest_pin) {
                return Err(ValidationError::Structural(format!(
                    "Destination pin \"{}\" is fed by more than one wire",
                    dest_pin
                )));
            }
        }
        Ok(())
    }

    /// Every member of a differing destination CDT needs a wire
    fn check_complete_wiring(
        &self,
        source_cdt: Option<CompoundDatatypeId>,
        dest_cdt: Option<CompoundDatatypeId>,
        wires: &[CustomWire],
    ) -> ValidationResult<()> {
        let Some(dest_cdt) = dest_cdt else {
            return Ok(());
        };
        if source_cdt == Some(dest_cdt) {
            return Ok(());
        }
        let dest = self.require_compound_datatype(dest_cdt)?;
        for member in dest.columns() {
            if !wires.iter().any(|w| w.dest_pin == member.id) {
                return Err(ValidationError::Completeness(format!(
                    "Destination member \"{}\" has no wires leading to it",
                    member
                )));
            }
        }
        Ok(())
    }

    /// The xput a cable draws from, checked against the pipeline inputs or the
    /// outputs of the source step
    fn resolve_cable_source<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        source_step: u32,
        source: XputId,
    ) -> ValidationResult<&'a TransformationXput> {
        if source_step == 0 {
            return pipeline.input(source).ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Pipeline \"{}\" does not have input \"{}\"",
                    self.pipeline_label(pipeline.id),
                    self.xput_label(source)
                ))
            });
        }
        let step = pipeline.step(source_step).ok_or_else(|| {
            ValidationError::InvalidReference(format!(
                "Step {} of pipeline \"{}\" does not exist",
                source_step,
                self.pipeline_label(pipeline.id)
            ))
        })?;
        self.require_transformation(step.transformation)?
            .output(source)
            .ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Transformation at step {} does not produce output \"{}\"",
                    source_step,
                    self.xput_label(source)
                ))
            })
    }

    pub fn clean_input_cable(
        &self,
        pipeline: &Pipeline,
        step: &PipelineStep,
        cable: &InputCable,
    ) -> ValidationResult<()> {
        if cable.source_step >= step.step_num {
            return Err(ValidationError::Structural(format!(
                "Step {} requests input from a later step",
                step.step_num
            )));
        }
        let source = self.resolve_cable_source(pipeline, cable.source_step, cable.source)?;
        let dest = self
            .require_transformation(step.transformation)?
            .input(cable.dest)
            .ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Transformation at step {} does not have input \"{}\"",
                    step.step_num,
                    self.xput_label(cable.dest)
                ))
            })?;

        let description = format!(
            "Cable feeding input \"{}\" of step {}",
            dest.dataset_name, step.step_num
        );
        self.clean_wiring(source, dest.compound_datatype(), &cable.custom_wires, &description)?;

        if dest.is_raw() {
            return Ok(());
        }
        if dest.min_row().unwrap_or(0) > source.min_row().unwrap_or(0) {
            return Err(ValidationError::Structural(format!(
                "Data fed to input \"{}\" of step {} may have too few rows",
                dest.dataset_name, step.step_num
            )));
        }
        if let Some(dest_max) = dest.max_row() {
            if source.max_row().map_or(true, |source_max| source_max > dest_max) {
                return Err(ValidationError::Structural(format!(
                    "Data fed to input \"{}\" of step {} may have too many rows",
                    dest.dataset_name, step.step_num
                )));
            }
        }
        Ok(())
    }

    pub fn clean_and_completely_wired_input_cable(
        &self,
        pipeline: &Pipeline,
        step: &PipelineStep,
        cable: &InputCable,
    ) -> ValidationResult<()> {
        self.clean_input_cable(pipeline, step, cable)?;
        let source = self.resolve_cable_source(pipeline, cable.source_step, cable.source)?;
        let dest_cdt = self
            .xput(cable.dest)
            .and_then(|dest| dest.compound_datatype());
        self.check_complete_wiring(source.compound_datatype(), dest_cdt, &cable.custom_wires)
    }

    pub fn clean_outcable(&self, pipeline: &Pipeline, cable: &OutputCable) -> ValidationResult<()> {
        let step = pipeline.step(cable.source_step).ok_or_else(|| {
            ValidationError::Structural(format!(
                "Output cable \"{}\" requests output from a non-existent step {}",
                cable.output_name, cable.source_step
            ))
        })?;
        let source = self
            .require_transformation(step.transformation)?
            .output(cable.source)
            .ok_or_else(|| {
                ValidationError::InvalidReference(format!(
                    "Transformation at step {} does not produce output \"{}\"",
                    cable.source_step,
                    self.xput_label(cable.source)
                ))
            })?;
        if let Some(cdt) = cable.output_cdt {
            self.require_compound_datatype(cdt)?;
        }
        let description = format!("Output cable \"{}\"", cable.output_name);
        self.clean_wiring(source, cable.output_cdt, &cable.custom_wires, &description)
    }

    pub fn clean_and_completely_wired_outcable(
        &self,
        pipeline: &Pipeline,
        cable: &OutputCable,
    ) -> ValidationResult<()> {
        self.clean_outcable(pipeline, cable)?;
        let source_cdt = self
            .xput(cable.source)
            .and_then(|source| source.compound_datatype());
        self.check_complete_wiring(source_cdt, cable.output_cdt, &cable.custom_wires)
    }
}
