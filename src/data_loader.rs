use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::ids::CompoundDatatypeId;
use crate::metadata::ConstraintFailure;

/// A tabular file read into memory
#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: Option<Vec<String>>,
    pub records: Vec<StringRecord>,
}

/// One cell that failed its column's datatype. `row` counts data rows from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub failures: Vec<ConstraintFailure>,
}

impl Display for CellFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reasons: Vec<String> = self.failures.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "row {}, column \"{}\", value \"{}\": {}",
            self.row,
            self.column,
            self.value,
            reasons.join("; ")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetReport {
    pub rows_checked: usize,
    pub header_error: Option<String>,
    pub failures: Vec<CellFailure>,
}

impl DatasetReport {
    pub fn is_valid(&self) -> bool {
        self.header_error.is_none() && self.failures.is_empty()
    }
}

/// Separator for a file: explicit, or `\t` for `.tsv` and `,` for `.csv`
pub fn separator_for(path: &Path, explicit: Option<char>) -> Result<u8> {
    if let Some(separator) = explicit {
        if !separator.is_ascii() {
            return Err(anyhow!("Separator {:?} is not an ASCII character", separator));
        }
        return Ok(separator as u8);
    }
    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");
    match extension {
        "csv" => Ok(b','),
        "tsv" => Ok(b'\t'),
        _ => Err(anyhow!("Unsupported extension {:?} for {}", extension, path.display())),
    }
}

pub fn load_dataset(path: &Path, separator: u8, has_header: bool) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(has_header)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;

    let headers = if has_header {
        Some(
            reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
        )
    } else {
        None
    };
    let records: Vec<StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(Dataset { headers, records })
}

/// Checks the header and every row of `dataset` against a compound datatype
pub fn check_dataset(
    catalog: &Catalog,
    compound_datatype: CompoundDatatypeId,
    dataset: &Dataset,
) -> Result<DatasetReport> {
    let cdt = catalog
        .compound_datatype(compound_datatype)
        .ok_or_else(|| anyhow!("Compound datatype {} does not exist", compound_datatype))?;
    let columns: Vec<String> = cdt.columns().iter().map(|m| m.column_name.clone()).collect();

    let mut report = DatasetReport::default();
    if let Some(headers) = &dataset.headers {
        if let Err(e) = catalog.check_header(compound_datatype, headers) {
            warn!("{}", e);
            report.header_error = Some(e.to_string());
        }
    }

    let checker = catalog.row_checker(compound_datatype)?;
    for (index, record) in dataset.records.iter().enumerate() {
        let row: Vec<&str> = record.iter().collect();
        let cells = checker.check(&row)?;
        for ((failures, column), value) in cells.into_iter().zip(&columns).zip(&row) {
            if !failures.is_empty() {
                report.failures.push(CellFailure {
                    row: index + 1,
                    column: column.clone(),
                    value: value.to_string(),
                    failures,
                });
            }
        }
        report.rows_checked += 1;
    }

    Ok(report)
}
