use chrono::format::{Item, Parsed, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{ConstraintId, DatatypeId};

use super::builtin::BuiltinType;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ConstraintKind {
    #[serde(rename = "REGEXP")]
    #[strum(serialize = "REGEXP")]
    Regexp,
    #[serde(rename = "MIN_LENGTH")]
    #[strum(serialize = "MIN_LENGTH")]
    MinLength,
    #[serde(rename = "MAX_LENGTH")]
    #[strum(serialize = "MAX_LENGTH")]
    MaxLength,
    #[serde(rename = "MIN_VAL")]
    #[strum(serialize = "MIN_VAL")]
    MinVal,
    #[serde(rename = "MAX_VAL")]
    #[strum(serialize = "MAX_VAL")]
    MaxVal,
    #[serde(rename = "DATETIMEFORMAT")]
    #[strum(serialize = "DATETIMEFORMAT")]
    DatetimeFormat,
}

impl ConstraintKind {
    /// Kinds that may appear at most once in a datatype's effective view
    pub const SINGULAR: [ConstraintKind; 5] = [
        ConstraintKind::MinLength,
        ConstraintKind::MaxLength,
        ConstraintKind::MinVal,
        ConstraintKind::MaxVal,
        ConstraintKind::DatetimeFormat,
    ];

    pub fn is_lower_bound(self) -> bool {
        matches!(self, ConstraintKind::MinLength | ConstraintKind::MinVal)
    }

    pub fn is_length_bound(self) -> bool {
        matches!(self, ConstraintKind::MinLength | ConstraintKind::MaxLength)
    }

    pub fn is_value_bound(self) -> bool {
        matches!(self, ConstraintKind::MinVal | ConstraintKind::MaxVal)
    }
}

/// One validation rule attached to a datatype
#[derive(Clone, Debug, PartialEq)]
pub struct BasicConstraint {
    pub id: ConstraintId,
    pub datatype: DatatypeId,
    pub kind: ConstraintKind,
    pub rule: String,
}

impl fmt::Display for BasicConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.kind, self.rule)
    }
}

impl BasicConstraint {
    /// Checks the rule can be read for its kind and that the kind applies to
    /// `builtin`. `datatype_name` is only used in messages.
    pub fn clean(&self, builtin: Option<BuiltinType>, datatype_name: &str) -> ValidationResult<()> {
        match self.kind {
            ConstraintKind::Regexp => {
                self.compiled_regex()?;
            }
            ConstraintKind::MinLength | ConstraintKind::MaxLength => {
                self.bound()?;
                self.require_builtin(builtin, datatype_name, "on string length", |b| {
                    b == BuiltinType::Str
                })?;
            }
            ConstraintKind::MinVal | ConstraintKind::MaxVal => {
                self.bound()?;
                self.require_builtin(builtin, datatype_name, "on numeric value", |b| {
                    b.is_numeric()
                })?;
            }
            ConstraintKind::DatetimeFormat => {
                if StrftimeItems::new(&self.rule).any(|item| matches!(item, Item::Error)) {
                    return Err(ValidationError::InvalidConstraint(format!(
                        "BasicConstraint {} of Datatype \"{}\" is not a valid date-time format",
                        self, datatype_name
                    )));
                }
                self.require_builtin(builtin, datatype_name, "on date-time format", |b| {
                    b == BuiltinType::Str
                })?;
            }
        }
        Ok(())
    }

    fn require_builtin(
        &self,
        builtin: Option<BuiltinType>,
        datatype_name: &str,
        what: &str,
        applies: impl Fn(BuiltinType) -> bool,
    ) -> ValidationResult<()> {
        match builtin {
            Some(b) if !applies(b) => Err(ValidationError::InvalidConstraint(format!(
                "BasicConstraint {} specifies a bound {}, but its Datatype \"{}\" has builtin type {}",
                self, what, datatype_name, b
            ))),
            _ => Ok(()),
        }
    }

    /// Numeric reading of a MIN_/MAX_ rule
    pub fn bound(&self) -> ValidationResult<f64> {
        if self.kind.is_length_bound() {
            return self.rule.trim().parse::<u64>().map(|v| v as f64).map_err(|_| {
                ValidationError::InvalidConstraint(format!(
                    "BasicConstraint {} specifies a bound on string length which is not a non-negative integer",
                    self
                ))
            });
        }
        match self.rule.trim().parse::<f64>() {
            Ok(v) if self.kind.is_value_bound() && v.is_finite() => Ok(v),
            _ => Err(ValidationError::InvalidConstraint(format!(
                "BasicConstraint {} does not specify a numeric bound",
                self
            ))),
        }
    }

    pub fn compiled_regex(&self) -> ValidationResult<Regex> {
        Regex::new(&self.rule).map_err(|_| {
            ValidationError::InvalidConstraint(format!(
                "BasicConstraint {} specifies an invalid regular expression",
                self
            ))
        })
    }

    /// Whether `value` matches the date-time format of a DATETIMEFORMAT rule
    pub fn matches_datetime_format(&self, value: &str) -> bool {
        let mut parsed = Parsed::default();
        chrono::format::parse(&mut parsed, value, StrftimeItems::new(&self.rule)).is_ok()
    }
}
