//! Whole-catalog documents (JSON or YAML)
//!
//! ```text
//! CatalogDocument
//!   ├── datatypes: Vec<DatatypeEntry>          pk, name, restricts, constraints, prototype
//!   ├── compound_datatypes: Vec<CdtEntry>      pk, name, members
//!   ├── methods: Vec<MethodEntry>              pk, family, driver, inputs, outputs
//!   ├── pipelines: Vec<PipelineEntry>          pk + PipelineDict
//!   └── executed_pipelines: Vec<u32>           pipeline pks that have run
//! ```
//!
//! Document pks are local to the document and mapped to catalog ids on load.
//! Datatypes may also be referenced by builtin name (`STR`, `INT`, ...).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::errors::{SerializationError, SerializationResult};
use crate::ids::{CompoundDatatypeId, DatatypeId, MethodId, PipelineId};
use crate::metadata::{BuiltinType, ConstraintKind, PrototypeExample};
use crate::transformation::{TransformationId, TransformationKind, XputStructure};

use super::schema::PipelineDict;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub datatypes: Vec<DatatypeEntry>,
    #[serde(default)]
    pub compound_datatypes: Vec<CompoundDatatypeEntry>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub pipelines: Vec<PipelineEntry>,
    #[serde(default)]
    pub executed_pipelines: Vec<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatatypeRef {
    Pk(u32),
    Builtin(BuiltinType),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatatypeEntry {
    pub pk: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub restricts: Vec<DatatypeRef>,
    #[serde(default)]
    pub constraints: Vec<ConstraintEntry>,
    #[serde(default)]
    pub prototype: Option<Vec<PrototypeExample>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstraintEntry {
    pub kind: ConstraintKind,
    pub rule: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompoundDatatypeEntry {
    pub pk: u32,
    #[serde(default)]
    pub name: String,
    pub members: Vec<MemberEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberEntry {
    pub column_idx: u32,
    pub column_name: String,
    pub datatype: DatatypeRef,
    #[serde(default)]
    pub blankable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodEntry {
    pub pk: u32,
    pub family: String,
    #[serde(default)]
    pub family_desc: String,
    #[serde(default)]
    pub revision_name: String,
    #[serde(default)]
    pub revision_desc: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub inputs: Vec<XputEntry>,
    #[serde(default)]
    pub outputs: Vec<XputEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XputEntry {
    pub dataset_idx: u32,
    pub dataset_name: String,
    #[serde(rename = "CDT_pk", default)]
    pub cdt_pk: Option<u32>,
    #[serde(default)]
    pub min_row: Option<u32>,
    #[serde(default)]
    pub max_row: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub pk: u32,
    pub pipeline: PipelineDict,
}

/// A catalog built from a document, with the pipelines it records as executed
#[derive(Clone, Debug)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub executed: BTreeSet<PipelineId>,
}

#[derive(Default)]
struct PkMap {
    datatypes: HashMap<u32, DatatypeId>,
    compound_datatypes: HashMap<u32, CompoundDatatypeId>,
    methods: HashMap<u32, MethodId>,
    pipelines: HashMap<u32, PipelineId>,
}

impl PkMap {
    fn datatype(&self, reference: DatatypeRef) -> SerializationResult<DatatypeId> {
        match reference {
            DatatypeRef::Builtin(builtin) => Ok(builtin.datatype_id()),
            DatatypeRef::Pk(pk) => self.datatypes.get(&pk).copied().ok_or_else(|| {
                SerializationError::UnknownReference(format!("Datatype pk {} is not defined", pk))
            }),
        }
    }

    fn compound_datatype(&self, pk: u32) -> SerializationResult<CompoundDatatypeId> {
        self.compound_datatypes.get(&pk).copied().ok_or_else(|| {
            SerializationError::UnknownReference(format!(
                "Compound datatype pk {} is not defined",
                pk
            ))
        })
    }

    fn structure(&self, xput: &XputEntry) -> SerializationResult<Option<XputStructure>> {
        xput.cdt_pk
            .map(|pk| -> SerializationResult<XputStructure> {
                Ok(XputStructure::new(self.compound_datatype(pk)?)
                    .with_rows(xput.min_row, xput.max_row))
            })
            .transpose()
    }

    fn pipeline(&self, pk: u32) -> SerializationResult<PipelineId> {
        self.pipelines.get(&pk).copied().ok_or_else(|| {
            SerializationError::UnknownReference(format!("Pipeline pk {} is not defined", pk))
        })
    }

    /// Rewrites document pks inside a pipeline dictionary to catalog ids
    fn localize(&self, catalog: &Catalog, dict: &PipelineDict) -> SerializationResult<PipelineDict> {
        let mut dict = dict.clone();
        dict.family_pk = catalog
            .pipeline_family_by_name(&dict.family_name)
            .map(|family| family.id.0);
        dict.revision_parent_pk = dict
            .revision_parent_pk
            .map(|pk| self.pipeline(pk).map(|id| id.0))
            .transpose()?;
        for input in &mut dict.pipeline_inputs {
            input.cdt_pk = input
                .cdt_pk
                .map(|pk| self.compound_datatype(pk).map(|id| id.0))
                .transpose()?;
        }
        for step in &mut dict.pipeline_steps {
            let transformation = match step.transf_type {
                TransformationKind::Method => {
                    TransformationId::Method(self.methods.get(&step.transf_pk).copied().ok_or_else(
                        || {
                            SerializationError::UnknownReference(format!(
                                "Method pk {} is not defined",
                                step.transf_pk
                            ))
                        },
                    )?)
                }
                TransformationKind::Pipeline => {
                    TransformationId::Pipeline(self.pipeline(step.transf_pk)?)
                }
            };
            step.transf_pk = transformation.pk();
            step.family_pk = match transformation {
                TransformationId::Method(m) => catalog.require_method(m)?.family.0,
                TransformationId::Pipeline(p) => catalog.require_pipeline(p)?.family.0,
            };
        }
        for output in &mut dict.pipeline_outputs {
            output.output_cdt_pk = output
                .output_cdt_pk
                .map(|pk| self.compound_datatype(pk).map(|id| id.0))
                .transpose()?;
        }
        Ok(dict)
    }
}

impl CatalogDocument {
    /// Builds a fresh catalog from the document
    pub fn load(&self) -> SerializationResult<LoadedCatalog> {
        let mut catalog = Catalog::new();
        let mut pks = PkMap::default();

        for entry in &self.datatypes {
            let id = catalog.add_datatype(&entry.name, &entry.description);
            pks.datatypes.insert(entry.pk, id);
        }
        for entry in &self.datatypes {
            let id = pks.datatype(DatatypeRef::Pk(entry.pk))?;
            for parent in &entry.restricts {
                catalog.add_restriction(id, pks.datatype(*parent)?)?;
            }
            for constraint in &entry.constraints {
                catalog.add_constraint(id, constraint.kind, &constraint.rule)?;
            }
            if let Some(datatype) = catalog.datatype_mut(id) {
                datatype.prototype = entry.prototype.clone();
            }
        }

        for entry in &self.compound_datatypes {
            let id = catalog.add_compound_datatype(&entry.name);
            for member in &entry.members {
                catalog.add_member(
                    id,
                    member.column_idx,
                    &member.column_name,
                    pks.datatype(member.datatype)?,
                    member.blankable,
                )?;
            }
            pks.compound_datatypes.insert(entry.pk, id);
        }

        let mut families = HashMap::new();
        for entry in &self.methods {
            let family = *families
                .entry(entry.family.clone())
                .or_insert_with(|| catalog.add_method_family(&entry.family, &entry.family_desc));
            let id = catalog.add_method(family, &entry.revision_name)?;
            if let Some(method) = catalog.method_mut(id) {
                method.revision_desc = entry.revision_desc.clone();
                method.driver = entry.driver.clone();
            }
            for input in &entry.inputs {
                catalog.add_input(
                    TransformationId::Method(id),
                    input.dataset_idx,
                    &input.dataset_name,
                    pks.structure(input)?,
                )?;
            }
            for output in &entry.outputs {
                catalog.add_output(id, output.dataset_idx, &output.dataset_name, pks.structure(output)?)?;
            }
            pks.methods.insert(entry.pk, id);
        }

        for entry in &self.pipelines {
            let dict = pks.localize(&catalog, &entry.pipeline)?;
            let id = if dict.family_pk.is_some() {
                catalog.revise_from_dict(&dict)?
            } else {
                catalog.create_from_dict(&dict)?
            };
            pks.pipelines.insert(entry.pk, id);
        }

        let executed = self
            .executed_pipelines
            .iter()
            .map(|pk| pks.pipeline(*pk))
            .collect::<SerializationResult<BTreeSet<_>>>()?;

        debug!(
            "Loaded {} datatypes, {} compound datatypes, {} methods, {} pipelines",
            self.datatypes.len(),
            self.compound_datatypes.len(),
            self.methods.len(),
            self.pipelines.len()
        );
        Ok(LoadedCatalog { catalog, executed })
    }
}

/// Reads a catalog document, as YAML for `.yaml`/`.yml` files and JSON otherwise
pub fn load_catalog_file(path: &Path) -> Result<LoadedCatalog> {
    info!("Loading catalog {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");
    let document: CatalogDocument = match extension {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid catalog document {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid catalog document {}", path.display()))?,
    };
    document
        .load()
        .map_err(|e| anyhow!("Failed to load catalog {}: {}", path.display(), e))
}
