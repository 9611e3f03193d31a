//! Builtin primitive datatypes
//!
//! The four builtins are seeded into every catalog at fixed ids and form the
//! roots of the restriction hierarchy. The table is process-wide and read-only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::ids::DatatypeId;

/// Builtin primitive types.
///
/// Declaration order is precedence order, so `Ord` picks the most specific
/// builtin: `BOOL > INT > FLOAT > STR`.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum BuiltinType {
    #[serde(rename = "STR")]
    #[strum(serialize = "STR")]
    Str,
    #[serde(rename = "FLOAT")]
    #[strum(serialize = "FLOAT")]
    Float,
    #[serde(rename = "INT")]
    #[strum(serialize = "INT")]
    Int,
    #[serde(rename = "BOOL")]
    #[strum(serialize = "BOOL")]
    Bool,
}

pub struct BuiltinSpec {
    pub builtin: BuiltinType,
    pub id: DatatypeId,
    pub description: &'static str,
    pub restricts: &'static [BuiltinType],
}

pub static BUILTIN_TABLE: Lazy<[BuiltinSpec; 4]> = Lazy::new(|| {
    [
        BuiltinSpec {
            builtin: BuiltinType::Str,
            id: DatatypeId(0),
            description: "String (basically anything)",
            restricts: &[],
        },
        BuiltinSpec {
            builtin: BuiltinType::Int,
            id: DatatypeId(1),
            description: "Integer",
            restricts: &[BuiltinType::Float],
        },
        BuiltinSpec {
            builtin: BuiltinType::Float,
            id: DatatypeId(2),
            description: "Floating-point number",
            restricts: &[BuiltinType::Str],
        },
        BuiltinSpec {
            builtin: BuiltinType::Bool,
            id: DatatypeId(3),
            description: "True or false",
            restricts: &[BuiltinType::Str],
        },
    ]
});

static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer pattern is valid"));

const BOOLEAN_VALUES: [&str; 12] = [
    "True", "False", "true", "false", "TRUE", "FALSE", "T", "F", "t", "f", "1", "0",
];

impl BuiltinType {
    pub fn spec(self) -> &'static BuiltinSpec {
        BUILTIN_TABLE
            .iter()
            .find(|spec| spec.builtin == self)
            .expect("every builtin has a table entry")
    }

    pub fn datatype_id(self) -> DatatypeId {
        self.spec().id
    }

    pub fn from_datatype_id(id: DatatypeId) -> Option<Self> {
        BUILTIN_TABLE
            .iter()
            .find(|spec| spec.id == id)
            .map(|spec| spec.builtin)
    }

    /// Whether `value` can be read as this type
    pub fn parses(self, value: &str) -> bool {
        match self {
            BuiltinType::Str => true,
            BuiltinType::Int => INTEGER_PATTERN.is_match(value),
            BuiltinType::Float => value.parse::<f64>().is_ok(),
            BuiltinType::Bool => BOOLEAN_VALUES.contains(&value),
        }
    }

    /// Numeric value for bound checks; `None` for STR and BOOL
    pub fn numeric_value(self, value: &str) -> Option<f64> {
        match self {
            BuiltinType::Int | BuiltinType::Float => value.parse::<f64>().ok(),
            BuiltinType::Str | BuiltinType::Bool => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, BuiltinType::Int | BuiltinType::Float)
    }
}
