use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use pipewright::common;
use pipewright::data_loader;
use pipewright::plan::ValidationPlan;
use pipewright::plan_execution::{self, ValidationReport};
use pipewright::serializer::load_catalog_file;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checks and dataset validations of a plan
    Validate {
        #[clap(short, long)]
        plan: String,
        #[clap(short, long)]
        watch: bool,
    },
    /// Write a default plan
    Init {
        #[clap(short, long)]
        plan: String,
    },
    /// Check a CSV/TSV file against a compound datatype
    CheckDataset {
        #[clap(short, long)]
        catalog: String,
        #[clap(short = 't', long)]
        compound_datatype: String,
        #[clap(short, long)]
        file: String,
        #[clap(long)]
        no_header: bool,
    },
    /// Print a pipeline as a dictionary
    Export {
        #[clap(short, long)]
        catalog: String,
        #[clap(short, long)]
        family: String,
        #[clap(short, long)]
        revision: Option<u32>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Validate { plan, watch } => {
            info!("Running plan: {}", plan);
            let report = plan_execution::execute_plan(&plan, watch, &mut print_report)?;
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Commands::Init { plan } => {
            info!("Initializing plan: {}", plan);
            let serialized_plan = ValidationPlan::default().to_string_for(Path::new(&plan))?;
            common::write_string_to_file(&plan, &serialized_plan)?;
        }
        Commands::CheckDataset {
            catalog,
            compound_datatype,
            file,
            no_header,
        } => {
            let loaded = load_catalog_file(Path::new(&catalog))?;
            let cdt = loaded
                .catalog
                .compound_datatype_by_name(&compound_datatype)
                .ok_or_else(|| anyhow!("Compound datatype \"{}\" is not in the catalog", compound_datatype))?;
            let path = Path::new(&file);
            let separator = data_loader::separator_for(path, None)?;
            let dataset = data_loader::load_dataset(path, separator, !no_header)?;
            let report = data_loader::check_dataset(&loaded.catalog, cdt.id, &dataset)?;

            if let Some(header_error) = &report.header_error {
                println!("{} {}", "FAIL".red().bold(), header_error);
            }
            for failure in &report.failures {
                println!("{} {}", "FAIL".red().bold(), failure);
            }
            if report.is_valid() {
                println!("{} {} rows conform to {}", "OK".green().bold(), report.rows_checked, compound_datatype);
            } else {
                std::process::exit(1);
            }
        }
        Commands::Export {
            catalog,
            family,
            revision,
        } => {
            let loaded = load_catalog_file(Path::new(&catalog))?;
            let family_id = loaded
                .catalog
                .pipeline_family_by_name(&family)
                .map(|f| f.id)
                .ok_or_else(|| anyhow!("Pipeline family \"{}\" is not in the catalog", family))?;
            let pipeline = match revision {
                Some(r) => loaded.catalog.pipeline_revision(family_id, r),
                None => loaded.catalog.latest_revision(family_id),
            }
            .ok_or_else(|| anyhow!("Pipeline family \"{}\" has no such revision", family))?;
            let dict = loaded.catalog.represent_as_dict(pipeline)?;
            println!("{}", serde_json::to_string_pretty(&dict)?);
        }
    }

    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!("{}", report.plan_name.bold());
    for check in &report.checks {
        match &check.error {
            None => println!("  {} {} ({:?})", "OK".green().bold(), check.subject, check.level),
            Some(e) => println!("  {} {}: {}", "FAIL".red().bold(), check.subject, e),
        }
    }
    for dataset in &report.datasets {
        match &dataset.result {
            Ok(result) if result.is_valid() => println!(
                "  {} {} ({} rows of {})",
                "OK".green().bold(),
                dataset.filename,
                result.rows_checked,
                dataset.compound_datatype
            ),
            Ok(result) => {
                println!("  {} {}", "FAIL".red().bold(), dataset.filename);
                if let Some(header_error) = &result.header_error {
                    println!("      {}", header_error);
                }
                for failure in &result.failures {
                    println!("      {}", failure);
                }
            }
            Err(e) => println!("  {} {}: {}", "ERROR".yellow().bold(), dataset.filename, e),
        }
    }
    let summary = format!("{} failure(s)", report.failure_count());
    if report.passed() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("notify=off,{}", log_level)))
        .with_writer(std::io::stderr)
        .init();
}
