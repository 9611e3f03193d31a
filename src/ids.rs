//! Arena identifiers
//!
//! Every entity owned by a [`Catalog`](crate::catalog::Catalog) is addressed by a
//! small integer newtype. The same numbers are used as the "pk" values of the
//! pipeline dictionary schema.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Panics if the arena outgrows the id space
            #[allow(dead_code)]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index exceeds u32::MAX"))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(
    /// A node of the restriction hierarchy
    DatatypeId
);
arena_id!(ConstraintId);
arena_id!(CompoundDatatypeId);
arena_id!(
    /// A column of a compound datatype; wires connect members by identity
    MemberId
);
arena_id!(MethodFamilyId);
arena_id!(MethodId);
arena_id!(PipelineFamilyId);
arena_id!(PipelineId);
arena_id!(
    /// An input or output of a method or pipeline
    XputId
);
