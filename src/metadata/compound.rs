use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::catalog::Catalog;
use crate::common::is_consecutive_from_one;
use crate::errors::{ValidationError, ValidationResult};
use crate::ids::{CompoundDatatypeId, DatatypeId, MemberId};

use super::datatype::{ConstraintFailure, ValueChecker};

#[derive(Clone, Debug, PartialEq)]
pub struct CompoundDatatypeMember {
    pub id: MemberId,
    pub compound_datatype: CompoundDatatypeId,
    pub column_idx: u32,
    pub column_name: String,
    pub datatype: DatatypeId,
    pub blankable: bool,
}

impl fmt::Display for CompoundDatatypeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.column_idx, self.column_name)
    }
}

/// An ordered, named list of datatype-typed columns
#[derive(Clone, Debug)]
pub struct CompoundDatatype {
    pub id: CompoundDatatypeId,
    pub name: String,
    pub members: Vec<CompoundDatatypeMember>,
}

impl CompoundDatatype {
    pub fn member(&self, id: MemberId) -> Option<&CompoundDatatypeMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn member_at(&self, column_idx: u32) -> Option<&CompoundDatatypeMember> {
        self.members.iter().find(|m| m.column_idx == column_idx)
    }

    /// Members sorted by column index
    pub fn columns(&self) -> Vec<&CompoundDatatypeMember> {
        let mut columns: Vec<_> = self.members.iter().collect();
        columns.sort_by_key(|m| m.column_idx);
        columns
    }
}

impl fmt::Display for CompoundDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.trim().is_empty() {
            return write!(f, "{}", self.name);
        }
        let columns: Vec<String> = self.columns().iter().map(|m| m.column_name.clone()).collect();
        write!(f, "({})", columns.join(", "))
    }
}

impl Catalog {
    pub(crate) fn require_compound_datatype(
        &self,
        id: CompoundDatatypeId,
    ) -> ValidationResult<&CompoundDatatype> {
        self.compound_datatype(id).ok_or_else(|| {
            ValidationError::InvalidReference(format!("Compound datatype {} does not exist", id))
        })
    }

    pub fn clean_compound_datatype(&self, id: CompoundDatatypeId) -> ValidationResult<()> {
        let cdt = self.require_compound_datatype(id)?;

        if !is_consecutive_from_one(cdt.members.iter().map(|m| m.column_idx)) {
            return Err(ValidationError::Structural(format!(
                "Column indices of CompoundDatatype \"{}\" are not consecutive starting from 1",
                cdt
            )));
        }

        let mut names = HashSet::new();
        for member in cdt.columns() {
            if member.column_name.trim().is_empty() {
                return Err(ValidationError::Structural(format!(
                    "Column {} of CompoundDatatype \"{}\" has a blank name",
                    member.column_idx, cdt
                )));
            }
            if !names.insert(member.column_name.as_str()) {
                return Err(ValidationError::Structural(format!(
                    "CompoundDatatype \"{}\" has more than one column named \"{}\"",
                    cdt, member.column_name
                )));
            }
            self.clean_datatype(member.datatype)?;
        }

        debug!("CompoundDatatype \"{}\" is clean", cdt);
        Ok(())
    }

    pub fn complete_clean_compound_datatype(&self, id: CompoundDatatypeId) -> ValidationResult<()> {
        self.clean_compound_datatype(id)?;
        let cdt = self.require_compound_datatype(id)?;
        for member in &cdt.members {
            self.complete_clean_datatype(member.datatype)?;
        }
        Ok(())
    }

    /// Resolves the constraints of every column once for checking many rows
    pub fn row_checker(&self, id: CompoundDatatypeId) -> ValidationResult<RowChecker> {
        let cdt = self.require_compound_datatype(id)?;
        let columns = cdt
            .columns()
            .into_iter()
            .map(|member| Ok((member.blankable, self.value_checker(member.datatype)?)))
            .collect::<ValidationResult<Vec<_>>>()?;
        Ok(RowChecker {
            compound_datatype: cdt.to_string(),
            columns,
        })
    }

    /// Per-column constraint failures of one row; an all-empty result means the
    /// row conforms
    pub fn check_constraints<S: AsRef<str>>(
        &self,
        id: CompoundDatatypeId,
        row: &[S],
    ) -> ValidationResult<Vec<Vec<ConstraintFailure>>> {
        self.row_checker(id)?.check(row)
    }

    /// Header names must equal the column names in order
    pub fn check_header<S: AsRef<str>>(
        &self,
        id: CompoundDatatypeId,
        header: &[S],
    ) -> ValidationResult<()> {
        let cdt = self.require_compound_datatype(id)?;
        let expected: Vec<&str> = cdt.columns().iter().map(|m| m.column_name.as_str()).collect();
        let actual: Vec<&str> = header.iter().map(|h| h.as_ref()).collect();
        if expected != actual {
            return Err(ValidationError::TypeCompatibility(format!(
                "Header [{}] does not match CompoundDatatype \"{}\" columns [{}]",
                actual.join(", "),
                cdt,
                expected.join(", ")
            )));
        }
        Ok(())
    }
}

/// Value checkers for the columns of a compound datatype, in column order
#[derive(Clone, Debug)]
pub struct RowChecker {
    compound_datatype: String,
    columns: Vec<(bool, ValueChecker)>,
}

impl RowChecker {
    pub fn check<S: AsRef<str>>(&self, row: &[S]) -> ValidationResult<Vec<Vec<ConstraintFailure>>> {
        if row.len() != self.columns.len() {
            return Err(ValidationError::Structural(format!(
                "Row has {} values but CompoundDatatype \"{}\" has {} columns",
                row.len(),
                self.compound_datatype,
                self.columns.len()
            )));
        }

        Ok(self
            .columns
            .iter()
            .zip(row)
            .map(|((blankable, checker), cell)| {
                let cell = cell.as_ref();
                if cell.is_empty() {
                    if *blankable {
                        Vec::new()
                    } else {
                        vec![ConstraintFailure::Blank]
                    }
                } else {
                    checker.check(cell)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{BuiltinType, ConstraintKind};

    fn reads_catalog() -> (Catalog, CompoundDatatypeId) {
        let mut catalog = Catalog::new();
        let dna = catalog.add_datatype("DNA", "");
        catalog.add_restriction(dna, BuiltinType::Str.datatype_id()).unwrap();
        catalog.add_constraint(dna, ConstraintKind::Regexp, "^[ACGT]+$").unwrap();
        let reads = catalog.add_compound_datatype("reads");
        catalog.add_member(reads, 1, "header", BuiltinType::Str.datatype_id(), false).unwrap();
        catalog.add_member(reads, 2, "sequence", dna, false).unwrap();
        catalog
            .add_member(reads, 3, "quality", BuiltinType::Int.datatype_id(), true)
            .unwrap();
        (catalog, reads)
    }

    #[test]
    fn clean_cdt_passes() {
        let (catalog, reads) = reads_catalog();
        assert!(catalog.clean_compound_datatype(reads).is_ok());
        assert!(catalog.complete_clean_compound_datatype(reads).is_ok());
    }

    #[test]
    fn gaps_in_column_indices_are_rejected() {
        let mut catalog = Catalog::new();
        let pair = catalog.add_compound_datatype("pair");
        let str_id = BuiltinType::Str.datatype_id();
        catalog.add_member(pair, 1, "a", str_id, false).unwrap();
        catalog.add_member(pair, 3, "b", str_id, false).unwrap();
        let err = catalog.clean_compound_datatype(pair).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Column indices of CompoundDatatype \"pair\" are not consecutive starting from 1"
        );
    }

    #[test]
    fn blank_and_duplicate_names_are_rejected() {
        let mut catalog = Catalog::new();
        let str_id = BuiltinType::Str.datatype_id();
        let blank = catalog.add_compound_datatype("blank");
        catalog.add_member(blank, 1, "  ", str_id, false).unwrap();
        assert!(catalog
            .clean_compound_datatype(blank)
            .unwrap_err()
            .to_string()
            .contains("has a blank name"));

        let twice = catalog.add_compound_datatype("twice");
        catalog.add_member(twice, 1, "x", str_id, false).unwrap();
        catalog.add_member(twice, 2, "x", str_id, false).unwrap();
        assert!(catalog
            .clean_compound_datatype(twice)
            .unwrap_err()
            .to_string()
            .contains("more than one column named \"x\""));
    }

    #[test]
    fn check_constraints_per_cell() {
        let (catalog, reads) = reads_catalog();
        let result = catalog
            .check_constraints(reads, &["read1", "ACGT", ""])
            .unwrap();
        assert!(result.iter().all(|cell| cell.is_empty()));

        let result = catalog
            .check_constraints(reads, &["", "ACXT", "high"])
            .unwrap();
        assert_eq!(result[0], vec![ConstraintFailure::Blank]);
        assert_eq!(result[1].len(), 1);
        assert_eq!(result[2], vec![ConstraintFailure::NotOfType(BuiltinType::Int)]);
    }

    #[test]
    fn row_width_must_match() {
        let (catalog, reads) = reads_catalog();
        let err = catalog.check_constraints(reads, &["read1"]).unwrap_err();
        assert!(err.to_string().contains("has 3 columns"));
    }

    #[test]
    fn header_check() {
        let (catalog, reads) = reads_catalog();
        assert!(catalog
            .check_header(reads, &["header", "sequence", "quality"])
            .is_ok());
        assert!(catalog
            .check_header(reads, &["sequence", "header", "quality"])
            .is_err());
    }
}
