use anyhow::{anyhow, Result};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::data_loader::{self, DatasetReport};
use crate::errors::ValidationResult;
use crate::ids::{CompoundDatatypeId, DatatypeId, MethodId, PipelineId};
use crate::metadata::BuiltinType;
use crate::plan::{CheckItem, CheckLevel, CheckTarget, DatasetProfile, ValidationPlan};
use crate::serializer::load_catalog_file;

/// Outcome of validating one entity
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub subject: String,
    pub level: CheckLevel,
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DatasetOutcome {
    pub filename: String,
    pub compound_datatype: String,
    pub result: std::result::Result<DatasetReport, String>,
}

impl DatasetOutcome {
    pub fn passed(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_valid())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub plan_name: String,
    pub checks: Vec<CheckOutcome>,
    pub datasets: Vec<DatasetOutcome>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed) && self.datasets.iter().all(DatasetOutcome::passed)
    }

    pub fn failure_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed()).count()
            + self.datasets.iter().filter(|d| !d.passed()).count()
    }
}

fn plan_dir(plan_file_path: &Path) -> Result<&Path> {
    plan_file_path
        .parent()
        .ok_or_else(|| anyhow!("Plan file has no parent directory"))
}

fn outcome(subject: String, level: CheckLevel, result: ValidationResult<()>) -> CheckOutcome {
    match result {
        Ok(()) => {
            debug!("{} passed", subject);
            CheckOutcome {
                subject,
                level,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: {}", subject, e);
            CheckOutcome {
                subject,
                level,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Runs one check item, expanding `all` to every user-defined entity
fn run_check(catalog: &Catalog, item: &CheckItem) -> Result<Vec<CheckOutcome>> {
    let complete = item.level == CheckLevel::Complete;
    let level = item.level;
    let mut outcomes = Vec::new();

    let datatype_outcome = |id: DatatypeId| {
        let name = catalog.datatype(id).map(|d| d.name.clone()).unwrap_or_default();
        let result = if complete {
            catalog.complete_clean_datatype(id)
        } else {
            catalog.clean_datatype(id)
        };
        outcome(format!("Datatype \"{}\"", name), level, result)
    };
    let cdt_outcome = |id: CompoundDatatypeId| {
        let name = catalog
            .compound_datatype(id)
            .map(|c| c.to_string())
            .unwrap_or_default();
        let result = if complete {
            catalog.complete_clean_compound_datatype(id)
        } else {
            catalog.clean_compound_datatype(id)
        };
        outcome(format!("CompoundDatatype \"{}\"", name), level, result)
    };
    let method_outcome = |id: MethodId| {
        let result = if complete {
            catalog.complete_clean_method(id)
        } else {
            catalog.clean_method(id)
        };
        outcome(format!("Method \"{}\"", catalog.method_label(id)), level, result)
    };
    let pipeline_outcome = |id: PipelineId| {
        let result = if complete {
            catalog.complete_clean_pipeline(id)
        } else {
            catalog.clean_pipeline(id)
        };
        outcome(format!("Pipeline \"{}\"", catalog.pipeline_label(id)), level, result)
    };

    match &item.target {
        CheckTarget::All => {
            outcomes.extend(
                catalog
                    .datatypes()
                    .filter(|d| BuiltinType::from_datatype_id(d.id).is_none())
                    .map(|d| datatype_outcome(d.id)),
            );
            outcomes.extend(catalog.compound_datatypes().map(|c| cdt_outcome(c.id)));
            outcomes.extend(catalog.methods().map(|m| method_outcome(m.id)));
            outcomes.extend(catalog.pipelines().map(|p| pipeline_outcome(p.id)));
        }
        CheckTarget::Datatype(name) => {
            let datatype = catalog
                .datatype_by_name(name)
                .ok_or_else(|| anyhow!("Datatype \"{}\" is not in the catalog", name))?;
            outcomes.push(datatype_outcome(datatype.id));
        }
        CheckTarget::CompoundDatatype(name) => {
            let cdt = catalog
                .compound_datatype_by_name(name)
                .ok_or_else(|| anyhow!("Compound datatype \"{}\" is not in the catalog", name))?;
            outcomes.push(cdt_outcome(cdt.id));
        }
        CheckTarget::Method { family, revision } => {
            let family_id = catalog
                .method_families()
                .find(|f| &f.name == family)
                .map(|f| f.id)
                .ok_or_else(|| anyhow!("Method family \"{}\" is not in the catalog", family))?;
            let method = catalog
                .methods()
                .filter(|m| m.family == family_id)
                .filter(|m| revision.map_or(true, |r| m.revision_number == r))
                .max_by_key(|m| m.revision_number)
                .ok_or_else(|| anyhow!("Method family \"{}\" has no such revision", family))?;
            outcomes.push(method_outcome(method.id));
        }
        CheckTarget::Pipeline { family, revision } => {
            let family_id = catalog
                .pipeline_family_by_name(family)
                .map(|f| f.id)
                .ok_or_else(|| anyhow!("Pipeline family \"{}\" is not in the catalog", family))?;
            let pipeline = match revision {
                Some(r) => catalog.pipeline_revision(family_id, *r),
                None => catalog.latest_revision(family_id),
            }
            .ok_or_else(|| anyhow!("Pipeline family \"{}\" has no such revision", family))?;
            outcomes.push(pipeline_outcome(pipeline));
        }
    }
    Ok(outcomes)
}

fn run_dataset(catalog: &Catalog, profile: &DatasetProfile, dir: &Path) -> DatasetOutcome {
    let path = dir.join(&profile.filename);
    info!("Checking dataset {} against {}", path.display(), profile.compound_datatype);
    let result = (|| -> Result<DatasetReport> {
        let cdt = catalog
            .compound_datatype_by_name(&profile.compound_datatype)
            .ok_or_else(|| {
                anyhow!(
                    "Compound datatype \"{}\" is not in the catalog",
                    profile.compound_datatype
                )
            })?;
        let separator = data_loader::separator_for(&path, profile.separator)?;
        let dataset = data_loader::load_dataset(&path, separator, profile.has_header)?;
        data_loader::check_dataset(catalog, cdt.id, &dataset)
    })();
    if let Err(e) = &result {
        error!("Failed to check dataset {}: {}", profile.filename, e);
    }
    DatasetOutcome {
        filename: profile.filename.clone(),
        compound_datatype: profile.compound_datatype.clone(),
        result: result.map_err(|e| e.to_string()),
    }
}

/// Loads the plan's catalog and runs every check and dataset in it
pub fn run_plan(plan: &ValidationPlan, plan_file_path: &Path) -> Result<ValidationReport> {
    let dir = plan_dir(plan_file_path)?;
    let loaded = load_catalog_file(&dir.join(&plan.catalog))?;
    let catalog = loaded.catalog;

    let mut report = ValidationReport {
        plan_name: plan.name().to_string(),
        ..Default::default()
    };
    for item in &plan.checks {
        report.checks.extend(run_check(&catalog, item)?);
    }
    for profile in &plan.datasets {
        report.datasets.push(run_dataset(&catalog, profile, dir));
    }

    if report.passed() {
        info!("Plan \"{}\" passed", report.plan_name);
    } else {
        warn!(
            "Plan \"{}\" has {} failing check(s)",
            report.plan_name,
            report.failure_count()
        );
    }
    Ok(report)
}

/// Main function to execute a plan, with optional file watching
pub fn execute_plan(
    plan: &str,
    watch: bool,
    on_report: &mut dyn FnMut(&ValidationReport),
) -> Result<ValidationReport> {
    info!("Executing plan {}", plan);

    let plan_file_path = Path::new(plan);
    let validation_plan = ValidationPlan::from_file(plan_file_path)?;
    debug!("Executing plan: {:?}", validation_plan);
    let report = run_plan(&validation_plan, plan_file_path)?;
    on_report(&report);

    if watch {
        watch_for_changes(&validation_plan, plan_file_path, on_report)?;
    }

    Ok(report)
}

/// Plan, catalog and dataset files, which trigger a re-run when modified
pub fn watched_files(plan: &ValidationPlan, plan_file_path: &Path) -> Result<Vec<PathBuf>> {
    let dir = plan_dir(plan_file_path)?;
    let mut files = vec![plan_file_path.to_path_buf(), dir.join(&plan.catalog)];
    files.extend(plan.datasets.iter().map(|d| dir.join(&d.filename)));
    Ok(files)
}

fn watch_for_changes(
    plan: &ValidationPlan,
    plan_file_path: &Path,
    on_report: &mut dyn FnMut(&ValidationReport),
) -> Result<()> {
    info!("Watching for changes");
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    for path in watched_files(plan, plan_file_path)? {
        watcher.watch(&path, RecursiveMode::NonRecursive)?;
    }

    let mut plan = plan.clone();
    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                if let EventKind::Modify(_) = event.kind {
                    debug!("File modified {:?}", event.paths);
                    info!("Change detected, re-running plan");
                    match ValidationPlan::from_file(plan_file_path) {
                        Ok(reloaded) => plan = reloaded,
                        Err(e) => error!("Keeping previous plan: {:#}", e),
                    }
                    match run_plan(&plan, plan_file_path) {
                        Ok(report) => on_report(&report),
                        Err(e) => error!("Plan run failed: {:#}", e),
                    }
                }
            }
            Ok(Err(e)) => error!("Watch error: {:?}", e),
            Err(e) => return Err(anyhow!("Watcher channel closed: {}", e)),
        }
    }
}
