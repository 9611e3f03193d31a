use std::collections::BTreeSet;
use tracing::debug;

use crate::catalog::Catalog;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{MethodFamilyId, MethodId};

use super::{Transformation, TransformationId, TransformationXput};

#[derive(Clone, Debug)]
pub struct MethodFamily {
    pub id: MethodFamilyId,
    pub name: String,
    pub description: String,
}

/// A revision of a wrapped external program
#[derive(Clone, Debug)]
pub struct Method {
    pub id: MethodId,
    pub family: MethodFamilyId,
    pub revision_number: u32,
    pub revision_name: String,
    pub revision_desc: String,
    pub revision_parent: Option<MethodId>,
    /// Opaque reference to the code that runs this method
    pub driver: Option<String>,
    pub inputs: Vec<TransformationXput>,
    pub outputs: Vec<TransformationXput>,
}

impl Transformation for Method {
    fn inputs(&self) -> &[TransformationXput] {
        &self.inputs
    }

    fn outputs(&self) -> &[TransformationXput] {
        &self.outputs
    }
}

impl Catalog {
    pub(crate) fn require_method(&self, id: MethodId) -> ValidationResult<&Method> {
        self.method(id)
            .ok_or_else(|| ValidationError::InvalidReference(format!("Method {} does not exist", id)))
    }

    pub fn method_label(&self, id: MethodId) -> String {
        match self.method(id) {
            Some(method) => {
                let family = self
                    .method_family(method.family)
                    .map(|f| f.name.as_str())
                    .unwrap_or("?");
                format!("{}:{}", family, method.revision_number)
            }
            None => format!("Method {}", id),
        }
    }

    pub fn clean_method(&self, id: MethodId) -> ValidationResult<()> {
        let method = self.require_method(id)?;
        if self.method_family(method.family).is_none() {
            return Err(ValidationError::InvalidReference(format!(
                "Method family {} does not exist",
                method.family
            )));
        }
        self.clean_transformation_xputs(TransformationId::Method(id))?;
        debug!("Method \"{}\" is clean", self.method_label(id));
        Ok(())
    }

    pub fn complete_clean_method(&self, id: MethodId) -> ValidationResult<()> {
        self.clean_method(id)?;
        let method = self.require_method(id)?;
        if method.driver.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(ValidationError::Completeness(format!(
                "Method \"{}\" has no driver",
                self.method_label(id)
            )));
        }
        let cdts: BTreeSet<_> = method
            .inputs
            .iter()
            .chain(&method.outputs)
            .filter_map(|x| x.compound_datatype())
            .collect();
        for cdt in cdts {
            self.complete_clean_compound_datatype(cdt)?;
        }
        Ok(())
    }
}
