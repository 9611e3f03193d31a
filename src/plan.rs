use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ## Structure
/// The validation plan file read by `pipewright validate`.
///
/// ```text
/// ValidationPlan
///   ├── catalog: String                     catalog document, relative to the plan
///   ├── meta: Option<Meta>
///   │   └── name: Option<String>
///   ├── checks: Vec<CheckItem>
///   │   ├── target: CheckTarget
///   │   │   ├── all
///   │   │   ├── datatype(String)
///   │   │   ├── compound_datatype(String)
///   │   │   ├── method { family, revision }
///   │   │   └── pipeline { family, revision }
///   │   └── level: CheckLevel (clean | complete)
///   └── datasets: Vec<DatasetProfile>
///       ├── filename: String
///       ├── compound_datatype: String
///       ├── has_header: bool (default true)
///       └── separator: Option<char>        defaults from the extension
/// ```

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValidationPlan {
    pub catalog: String,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub checks: Vec<CheckItem>,
    #[serde(default)]
    pub datasets: Vec<DatasetProfile>,
}

impl Default for ValidationPlan {
    fn default() -> Self {
        Self {
            catalog: "catalog.json".to_string(),
            meta: Some(Meta {
                name: Some("Validation plan".to_string()),
            }),
            checks: vec![CheckItem {
                target: CheckTarget::All,
                level: CheckLevel::Complete,
            }],
            datasets: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckItem {
    pub target: CheckTarget,
    #[serde(default)]
    pub level: CheckLevel,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CheckTarget {
    All,
    Datatype(String),
    CompoundDatatype(String),
    Method {
        family: String,
        revision: Option<u32>,
    },
    Pipeline {
        family: String,
        revision: Option<u32>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    Clean,
    #[default]
    Complete,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub filename: String,
    pub compound_datatype: String,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    #[serde(default)]
    pub separator: Option<char>,
}

fn default_has_header() -> bool {
    true
}

impl ValidationPlan {
    pub fn name(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|meta| meta.name.as_deref())
            .unwrap_or("Unnamed plan")
    }

    /// Parses a plan as TOML for `.toml` files and YAML otherwise
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let plan = match path.extension().and_then(std::ffi::OsStr::to_str) {
            Some("toml") => toml::from_str(content)
                .with_context(|| format!("Invalid TOML plan {}", path.display()))?,
            _ => serde_yaml::from_str(content)
                .with_context(|| format!("Invalid YAML plan {}", path.display()))?,
        };
        Ok(plan)
    }

    pub fn to_string_for(&self, path: &Path) -> Result<String> {
        match path.extension().and_then(std::ffi::OsStr::to_str) {
            Some("toml") => Ok(toml::to_string(self)?),
            _ => Ok(serde_yaml::to_string(self)?),
        }
    }
}
