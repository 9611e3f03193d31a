//! Datatype restriction resolution and the effective constraint algebra

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::catalog::Catalog;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{ConstraintId, DatatypeId};

use super::builtin::BuiltinType;
use super::constraint::{BasicConstraint, ConstraintKind};

#[derive(Clone, Debug)]
pub struct Datatype {
    pub id: DatatypeId,
    pub name: String,
    pub description: String,
    /// Direct supertypes
    pub restricts: BTreeSet<DatatypeId>,
    pub constraints: Vec<BasicConstraint>,
    pub prototype: Option<Vec<PrototypeExample>>,
}

/// A sample value and whether it should pass the datatype's constraints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrototypeExample {
    pub value: String,
    pub valid: bool,
}

/// A MIN_/MAX_ bound in effect on a datatype and the constraint it comes from
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveBound {
    pub constraint: BasicConstraint,
    pub value: f64,
}

#[derive(Clone, Debug, Default)]
pub struct EffectiveConstraints {
    pub min_length: Option<EffectiveBound>,
    pub max_length: Option<EffectiveBound>,
    pub min_val: Option<EffectiveBound>,
    pub max_val: Option<EffectiveBound>,
    pub datetime_format: Option<BasicConstraint>,
    pub regexps: Vec<BasicConstraint>,
}

/// Why a single value failed its datatype
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintFailure {
    Blank,
    NotOfType(BuiltinType),
    Violated(BasicConstraint),
}

impl fmt::Display for ConstraintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintFailure::Blank => write!(f, "Was blank"),
            ConstraintFailure::NotOfType(builtin) => write!(f, "Was not of type {}", builtin),
            ConstraintFailure::Violated(constraint) => write!(f, "Failed {}", constraint),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl Catalog {
    pub(crate) fn require_datatype(&self, id: DatatypeId) -> ValidationResult<&Datatype> {
        self.datatype(id).ok_or_else(|| {
            ValidationError::InvalidReference(format!("Datatype {} does not exist", id))
        })
    }

    /// True iff `other` is reachable from `id` through `restricts`
    pub fn is_restricted_by(&self, id: DatatypeId, other: DatatypeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<DatatypeId> = self.supertypes(id).collect();
        while let Some(current) = stack.pop() {
            if current == other {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.supertypes(current));
            }
        }
        false
    }

    fn supertypes(&self, id: DatatypeId) -> impl Iterator<Item = DatatypeId> + '_ {
        self.datatype(id)
            .into_iter()
            .flat_map(|dt| dt.restricts.iter().copied())
    }

    /// Datatypes reachable from `id`, `id` included
    fn lineage(&self, id: DatatypeId) -> BTreeSet<DatatypeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if seen.insert(current) {
                stack.extend(self.supertypes(current));
            }
        }
        seen
    }

    /// Highest-precedence builtin reachable through `restricts`
    pub fn builtin_type(&self, id: DatatypeId) -> Option<BuiltinType> {
        self.lineage(id)
            .into_iter()
            .filter_map(BuiltinType::from_datatype_id)
            .max()
    }

    pub fn is_complete_datatype(&self, id: DatatypeId) -> bool {
        self.builtin_type(id).is_some()
    }

    /// Returns the datatype at which a back edge was found, if any cycle is
    /// reachable from `id`
    fn find_restriction_cycle(
        &self,
        id: DatatypeId,
        marks: &mut HashMap<DatatypeId, Mark>,
    ) -> Option<DatatypeId> {
        marks.insert(id, Mark::InProgress);
        for parent in self.supertypes(id) {
            match marks.get(&parent) {
                Some(Mark::InProgress) => return Some(parent),
                Some(Mark::Done) => continue,
                None => {
                    if let Some(hit) = self.find_restriction_cycle(parent, marks) {
                        return Some(hit);
                    }
                }
            }
        }
        marks.insert(id, Mark::Done);
        None
    }

    fn check_restrictions_acyclic(&self, datatype: &Datatype) -> ValidationResult<()> {
        if self.is_restricted_by(datatype.id, datatype.id) {
            return Err(circular(datatype));
        }
        if let Some(hit) = self.find_restriction_cycle(datatype.id, &mut HashMap::new()) {
            let other = self.datatype(hit).map(|dt| dt.name.as_str()).unwrap_or("?");
            return Err(ValidationError::Structural(format!(
                "Datatype \"{}\" restricts \"{}\", which has a circular restriction",
                datatype.name, other
            )));
        }
        Ok(())
    }

    fn own_constraints_of(
        &self,
        datatype: &Datatype,
        kind: ConstraintKind,
    ) -> ValidationResult<Option<BasicConstraint>> {
        let mut own = datatype.constraints.iter().filter(|c| c.kind == kind);
        let first = own.next();
        let extra = own.count();
        if extra > 0 {
            return Err(ValidationError::ConstraintConflict(format!(
                "Datatype \"{}\" has {} constraints of type {}, but should have at most one",
                datatype.name,
                extra + 1,
                kind
            )));
        }
        Ok(first.cloned())
    }

    /// The MIN_/MAX_ bound of `kind` in effect on `id`: its own constraint if it
    /// has one, otherwise the most restrictive bound among its supertypes
    pub fn effective_bound(
        &self,
        id: DatatypeId,
        kind: ConstraintKind,
    ) -> ValidationResult<Option<EffectiveBound>> {
        self.effective_bound_memoized(id, kind, &mut HashSet::new(), &mut HashMap::new())
    }

    /// Each datatype is resolved once; `visiting` holds the current path only
    fn effective_bound_memoized(
        &self,
        id: DatatypeId,
        kind: ConstraintKind,
        visiting: &mut HashSet<DatatypeId>,
        resolved: &mut HashMap<DatatypeId, Option<EffectiveBound>>,
    ) -> ValidationResult<Option<EffectiveBound>> {
        if let Some(known) = resolved.get(&id) {
            return Ok(known.clone());
        }
        let datatype = self.require_datatype(id)?;
        if !visiting.insert(id) {
            return Err(circular(datatype));
        }
        let result = match self.own_constraints_of(datatype, kind)? {
            Some(constraint) => Some(EffectiveBound {
                value: constraint.bound()?,
                constraint,
            }),
            None => {
                let mut merged: Option<EffectiveBound> = None;
                for parent in &datatype.restricts {
                    let Some(candidate) =
                        self.effective_bound_memoized(*parent, kind, visiting, resolved)?
                    else {
                        continue;
                    };
                    let tighter = match &merged {
                        None => true,
                        Some(current) if kind.is_lower_bound() => candidate.value > current.value,
                        Some(current) => candidate.value < current.value,
                    };
                    if tighter {
                        merged = Some(candidate);
                    }
                }
                merged
            }
        };
        visiting.remove(&id);
        resolved.insert(id, result.clone());
        Ok(result)
    }

    /// DATETIMEFORMAT constraints acting on `id`, keyed by constraint identity
    fn datetime_formats_in_effect(
        &self,
        id: DatatypeId,
        visiting: &mut HashSet<DatatypeId>,
        resolved: &mut HashMap<DatatypeId, BTreeMap<ConstraintId, BasicConstraint>>,
    ) -> ValidationResult<BTreeMap<ConstraintId, BasicConstraint>> {
        if let Some(known) = resolved.get(&id) {
            return Ok(known.clone());
        }
        let datatype = self.require_datatype(id)?;
        if !visiting.insert(id) {
            return Err(circular(datatype));
        }
        let mut formats = BTreeMap::new();
        match self.own_constraints_of(datatype, ConstraintKind::DatetimeFormat)? {
            Some(own) => {
                formats.insert(own.id, own);
            }
            None => {
                for parent in &datatype.restricts {
                    formats.extend(self.datetime_formats_in_effect(*parent, visiting, resolved)?);
                }
            }
        }
        visiting.remove(&id);
        resolved.insert(id, formats.clone());
        Ok(formats)
    }

    pub fn effective_datetime_format(
        &self,
        id: DatatypeId,
    ) -> ValidationResult<Option<BasicConstraint>> {
        let formats = self.datetime_formats_in_effect(id, &mut HashSet::new(), &mut HashMap::new())?;
        if formats.len() > 1 {
            let datatype = self.require_datatype(id)?;
            return Err(ValidationError::ConstraintConflict(format!(
                "Datatype \"{}\" should have only one DATETIMEFORMAT restriction acting on it, but it has {}",
                datatype.name,
                formats.len()
            )));
        }
        Ok(formats.into_values().next())
    }

    /// Own and inherited REGEXP constraints; all of them apply
    pub fn effective_regexps(&self, id: DatatypeId) -> Vec<BasicConstraint> {
        let mut regexps = BTreeMap::new();
        for ancestor in self.lineage(id) {
            if let Some(datatype) = self.datatype(ancestor) {
                for constraint in &datatype.constraints {
                    if constraint.kind == ConstraintKind::Regexp {
                        regexps.insert(constraint.id, constraint.clone());
                    }
                }
            }
        }
        regexps.into_values().collect()
    }

    pub fn effective_constraints(&self, id: DatatypeId) -> ValidationResult<EffectiveConstraints> {
        Ok(EffectiveConstraints {
            min_length: self.effective_bound(id, ConstraintKind::MinLength)?,
            max_length: self.effective_bound(id, ConstraintKind::MaxLength)?,
            min_val: self.effective_bound(id, ConstraintKind::MinVal)?,
            max_val: self.effective_bound(id, ConstraintKind::MaxVal)?,
            datetime_format: self.effective_datetime_format(id)?,
            regexps: self.effective_regexps(id),
        })
    }

    pub fn clean_datatype(&self, id: DatatypeId) -> ValidationResult<()> {
        let datatype = self.require_datatype(id)?;
        if datatype.name.trim().is_empty() {
            return Err(ValidationError::Structural(format!(
                "Datatype {} has a blank name",
                id
            )));
        }
        for parent in &datatype.restricts {
            self.require_datatype(*parent)?;
        }
        self.check_restrictions_acyclic(datatype)?;

        let builtin = self.builtin_type(id);
        if builtin.is_none() {
            debug!(
                "Datatype \"{}\" has no builtin type yet; skipping applicability checks",
                datatype.name
            );
        }
        for constraint in &datatype.constraints {
            constraint.clean(builtin, &datatype.name)?;
        }
        for kind in ConstraintKind::SINGULAR {
            self.own_constraints_of(datatype, kind)?;
        }

        let effective = self.effective_constraints(id)?;
        if let (Some(min), Some(max)) = (&effective.min_val, &effective.max_val) {
            if min.value > max.value {
                return Err(ValidationError::ConstraintConflict(format!(
                    "Datatype \"{}\" has effective MIN_VAL {} exceeding its effective MAX_VAL {}",
                    datatype.name, min.value, max.value
                )));
            }
            if builtin == Some(BuiltinType::Int) && min.value.ceil() > max.value.floor() {
                return Err(ValidationError::ConstraintConflict(format!(
                    "Datatype \"{}\" has no integers between its effective MIN_VAL {} and its effective MAX_VAL {}",
                    datatype.name, min.value, max.value
                )));
            }
        }
        if let (Some(min), Some(max)) = (&effective.min_length, &effective.max_length) {
            if min.value > max.value {
                return Err(ValidationError::ConstraintConflict(format!(
                    "Datatype \"{}\" has effective MIN_LENGTH {} exceeding its effective MAX_LENGTH {}",
                    datatype.name, min.value, max.value
                )));
            }
        }

        debug!("Datatype \"{}\" is clean", datatype.name);
        Ok(())
    }

    pub fn complete_clean_datatype(&self, id: DatatypeId) -> ValidationResult<()> {
        self.clean_datatype(id)?;
        let datatype = self.require_datatype(id)?;
        if !self.is_complete_datatype(id) {
            return Err(ValidationError::Completeness(format!(
                "Datatype \"{}\" does not restrict any of the builtin types",
                datatype.name
            )));
        }
        if let Some(examples) = &datatype.prototype {
            let checker = self.value_checker(id)?;
            for example in examples {
                let passes = checker.check(&example.value).is_empty();
                if passes != example.valid {
                    return Err(ValidationError::Completeness(format!(
                        "Prototype of Datatype \"{}\" marks \"{}\" as {}, but it is not",
                        datatype.name,
                        example.value,
                        if example.valid { "valid" } else { "invalid" }
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolves everything needed to check values of `id` so that repeated
    /// checks do no hierarchy walks
    pub fn value_checker(&self, id: DatatypeId) -> ValidationResult<ValueChecker> {
        let datatype = self.require_datatype(id)?;
        let builtin = self.builtin_type(id).ok_or_else(|| {
            ValidationError::Completeness(format!(
                "Datatype \"{}\" does not restrict any of the builtin types",
                datatype.name
            ))
        })?;
        let effective = self.effective_constraints(id)?;
        let regexps = effective
            .regexps
            .iter()
            .map(|c| Ok((c.clone(), c.compiled_regex()?)))
            .collect::<ValidationResult<Vec<_>>>()?;
        Ok(ValueChecker {
            builtin,
            effective,
            regexps,
        })
    }

    /// Constraints `value` violates. A value that does not parse as the builtin
    /// type yields only the type failure.
    pub fn check_basic_constraints(
        &self,
        id: DatatypeId,
        value: &str,
    ) -> ValidationResult<Vec<ConstraintFailure>> {
        Ok(self.value_checker(id)?.check(value))
    }
}

fn circular(datatype: &Datatype) -> ValidationError {
    ValidationError::Structural(format!(
        "Datatype \"{}\" has a circular restriction",
        datatype.name
    ))
}

/// The resolved builtin type and effective constraints of one datatype
#[derive(Clone, Debug)]
pub struct ValueChecker {
    builtin: BuiltinType,
    effective: EffectiveConstraints,
    regexps: Vec<(BasicConstraint, Regex)>,
}

impl ValueChecker {
    pub fn builtin(&self) -> BuiltinType {
        self.builtin
    }

    pub fn check(&self, value: &str) -> Vec<ConstraintFailure> {
        if !self.builtin.parses(value) {
            return vec![ConstraintFailure::NotOfType(self.builtin)];
        }
        let effective = &self.effective;
        let mut failures = Vec::new();

        if self.builtin == BuiltinType::Str {
            let length = value.chars().count() as f64;
            if let Some(min) = effective.min_length.as_ref().filter(|b| length < b.value) {
                failures.push(ConstraintFailure::Violated(min.constraint.clone()));
            }
            if let Some(max) = effective.max_length.as_ref().filter(|b| length > b.value) {
                failures.push(ConstraintFailure::Violated(max.constraint.clone()));
            }
            if let Some(format) = effective
                .datetime_format
                .as_ref()
                .filter(|c| !c.matches_datetime_format(value))
            {
                failures.push(ConstraintFailure::Violated(format.clone()));
            }
        }

        if let Some(number) = self.builtin.numeric_value(value) {
            if let Some(min) = effective.min_val.as_ref().filter(|b| number < b.value) {
                failures.push(ConstraintFailure::Violated(min.constraint.clone()));
            }
            if let Some(max) = effective.max_val.as_ref().filter(|b| number > b.value) {
                failures.push(ConstraintFailure::Violated(max.constraint.clone()));
            }
        }

        for (constraint, regex) in &self.regexps {
            if !regex.is_match(value) {
                failures.push(ConstraintFailure::Violated(constraint.clone()));
            }
        }

        failures
    }
}
