//! Datatypes, their constraints and compound datatypes

pub mod builtin;
pub mod compound;
pub mod constraint;
pub mod datatype;

pub use builtin::{BuiltinType, BUILTIN_TABLE};
pub use compound::{CompoundDatatype, CompoundDatatypeMember, RowChecker};
pub use constraint::{BasicConstraint, ConstraintKind};
pub use datatype::{
    ConstraintFailure, Datatype, EffectiveBound, EffectiveConstraints, PrototypeExample,
    ValueChecker,
};
