//! Datatype and compound datatype validation tests
//!
//! Restriction cycles, effective constraint resolution, constraint cleaning and
//! value checks against the catalog.

mod common;

use pipewright::metadata::{BuiltinType, ConstraintFailure, ConstraintKind, PrototypeExample};
use pipewright::{Catalog, ValidationError};
use proptest::prelude::*;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;

#[test]
fn test_circular_restriction_is_reported_on_every_member() {
    let mut catalog = Catalog::new();
    let dt1 = catalog.add_datatype("dt1", "");
    let dt2 = catalog.add_datatype("dt2", "");
    let dt3 = catalog.add_datatype("dt3", "");
    catalog.add_restriction(dt1, dt2).unwrap();
    catalog.add_restriction(dt2, dt1).unwrap();
    catalog.add_restriction(dt3, dt1).unwrap();

    let err = catalog.clean_datatype(dt1).unwrap_err();
    assert_eq!(
        err,
        ValidationError::Structural("Datatype \"dt1\" has a circular restriction".to_string())
    );
    assert!(catalog.clean_datatype(dt2).is_err());

    let err = catalog.clean_datatype(dt3).unwrap_err();
    assert!(err.to_string().contains("which has a circular restriction"));
    assert!(err.to_string().starts_with("Datatype \"dt3\""));
    assert_eq!(err.error_code(), "STRUCTURAL");
}

#[test]
fn test_cycle_through_one_of_several_supertypes() {
    let mut catalog = Catalog::new();
    let str_id = BuiltinType::Str.datatype_id();
    let dt1 = catalog.add_datatype("dt1", "");
    let others: Vec<_> = ["dt2", "dt3", "dt4"]
        .iter()
        .map(|name| catalog.add_datatype(name, ""))
        .collect();
    for other in &others {
        catalog.add_restriction(dt1, *other).unwrap();
        catalog.add_restriction(*other, str_id).unwrap();
    }
    catalog.add_restriction(others[1], dt1).unwrap();

    let err = catalog.clean_datatype(dt1).unwrap_err();
    assert_eq!(err.to_string(), "Datatype \"dt1\" has a circular restriction");
    assert!(catalog.clean_datatype(others[0]).is_ok());
}

#[test]
fn test_restriction_chain_without_cycle_is_clean() {
    let fx = common::sequencing();
    let mut catalog = fx.catalog;
    let short_dna = catalog.add_datatype("short DNA", "");
    catalog.add_restriction(short_dna, fx.dna).unwrap();
    catalog
        .add_constraint(short_dna, ConstraintKind::MaxLength, "4")
        .unwrap();

    assert!(catalog.clean_datatype(short_dna).is_ok());
    assert!(catalog.complete_clean_datatype(short_dna).is_ok());
    assert_eq!(catalog.builtin_type(short_dna), Some(BuiltinType::Str));
    assert!(catalog.is_restricted_by(short_dna, BuiltinType::Str.datatype_id()));
    assert!(!catalog.is_restricted_by(short_dna, fx.rna));
}

#[test]
fn test_compound_datatype_with_gap_in_indices() {
    let mut catalog = Catalog::new();
    let str_id = BuiltinType::Str.datatype_id();
    let cdt = catalog.add_compound_datatype("gapped");
    catalog.add_member(cdt, 1, "first", str_id, false).unwrap();
    catalog.add_member(cdt, 3, "third", str_id, false).unwrap();

    let err = catalog.clean_compound_datatype(cdt).unwrap_err();
    assert!(err.to_string().contains("not consecutive starting from 1"));
    assert_eq!(err.error_code(), "STRUCTURAL");
}

#[test]
fn test_inverted_inherited_bounds_conflict() {
    let mut catalog = Catalog::new();
    let int_id = BuiltinType::Int.datatype_id();
    let at_least = catalog.add_datatype("at least 15", "");
    catalog.add_restriction(at_least, int_id).unwrap();
    catalog
        .add_constraint(at_least, ConstraintKind::MinVal, "15")
        .unwrap();
    let at_most = catalog.add_datatype("at most 5", "");
    catalog.add_restriction(at_most, int_id).unwrap();
    catalog
        .add_constraint(at_most, ConstraintKind::MaxVal, "5")
        .unwrap();
    let both = catalog.add_datatype("both", "");
    catalog.add_restriction(both, at_least).unwrap();
    catalog.add_restriction(both, at_most).unwrap();

    assert!(catalog.clean_datatype(at_least).is_ok());
    assert!(catalog.clean_datatype(at_most).is_ok());

    let err = catalog.clean_datatype(both).unwrap_err();
    assert_eq!(
        err,
        ValidationError::ConstraintConflict(
            "Datatype \"both\" has effective MIN_VAL 15 exceeding its effective MAX_VAL 5"
                .to_string()
        )
    );
}

#[test]
fn test_own_bound_overrides_inherited_bound() {
    let mut catalog = Catalog::new();
    let int_id = BuiltinType::Int.datatype_id();
    let small = catalog.add_datatype("small", "");
    catalog.add_restriction(small, int_id).unwrap();
    catalog.add_constraint(small, ConstraintKind::MaxVal, "10").unwrap();
    let smaller = catalog.add_datatype("smaller", "");
    catalog.add_restriction(smaller, small).unwrap();
    catalog.add_constraint(smaller, ConstraintKind::MaxVal, "3").unwrap();

    let bound = catalog
        .effective_bound(smaller, ConstraintKind::MaxVal)
        .unwrap()
        .unwrap();
    assert_eq!(bound.value, 3.0);
    assert_eq!(bound.constraint.datatype, smaller);

    let failures = catalog.check_basic_constraints(smaller, "7").unwrap();
    assert_eq!(failures.len(), 1);
    assert!(catalog.check_basic_constraints(small, "7").unwrap().is_empty());
}

#[test]
fn test_tightest_inherited_bound_wins() {
    let mut catalog = Catalog::new();
    let str_id = BuiltinType::Str.datatype_id();
    let mut parents = Vec::new();
    for (name, rule) in [("short", "10"), ("shorter", "4")] {
        let dt = catalog.add_datatype(name, "");
        catalog.add_restriction(dt, str_id).unwrap();
        catalog.add_constraint(dt, ConstraintKind::MaxLength, rule).unwrap();
        parents.push(dt);
    }
    let child = catalog.add_datatype("child", "");
    for parent in &parents {
        catalog.add_restriction(child, *parent).unwrap();
    }

    let bound = catalog
        .effective_bound(child, ConstraintKind::MaxLength)
        .unwrap()
        .unwrap();
    assert_eq!(bound.value, 4.0);
    assert_eq!(bound.constraint.datatype, parents[1]);
}

#[test]
fn test_conflicting_inherited_datetime_formats() {
    let mut catalog = Catalog::new();
    let str_id = BuiltinType::Str.datatype_id();
    let iso = catalog.add_datatype("iso date", "");
    catalog.add_restriction(iso, str_id).unwrap();
    catalog
        .add_constraint(iso, ConstraintKind::DatetimeFormat, "%Y-%m-%d")
        .unwrap();
    let european = catalog.add_datatype("european date", "");
    catalog.add_restriction(european, str_id).unwrap();
    catalog
        .add_constraint(european, ConstraintKind::DatetimeFormat, "%d/%m/%Y")
        .unwrap();
    let both = catalog.add_datatype("any date", "");
    catalog.add_restriction(both, iso).unwrap();
    catalog.add_restriction(both, european).unwrap();

    assert!(catalog.check_basic_constraints(iso, "2024-01-31").unwrap().is_empty());
    assert_eq!(catalog.check_basic_constraints(iso, "31/01/2024").unwrap().len(), 1);

    let err = catalog.clean_datatype(both).unwrap_err();
    assert_eq!(err.error_code(), "CONSTRAINT_CONFLICT");
    assert!(err.to_string().contains("only one DATETIMEFORMAT"));
}

#[test]
fn test_duplicate_own_constraint_kind() {
    let mut catalog = Catalog::new();
    let dt = catalog.add_datatype("twice bounded", "");
    catalog.add_restriction(dt, BuiltinType::Str.datatype_id()).unwrap();
    catalog.add_constraint(dt, ConstraintKind::MinLength, "1").unwrap();
    catalog.add_constraint(dt, ConstraintKind::MinLength, "2").unwrap();

    let err = catalog.clean_datatype(dt).unwrap_err();
    assert_eq!(err.error_code(), "CONSTRAINT_CONFLICT");
    assert!(err.to_string().contains("should have at most one"));
}

#[test]
fn test_constraint_clean_errors() {
    let mut catalog = Catalog::new();

    let bad_regex = catalog.add_datatype("bad regex", "");
    catalog.add_restriction(bad_regex, BuiltinType::Str.datatype_id()).unwrap();
    catalog.add_constraint(bad_regex, ConstraintKind::Regexp, "(").unwrap();
    let err = catalog.clean_datatype(bad_regex).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONSTRAINT");
    assert_eq!(
        err.to_string(),
        "BasicConstraint REGEXP \"(\" specifies an invalid regular expression"
    );

    let length_on_int = catalog.add_datatype("count", "");
    catalog.add_restriction(length_on_int, BuiltinType::Int.datatype_id()).unwrap();
    catalog
        .add_constraint(length_on_int, ConstraintKind::MinLength, "3")
        .unwrap();
    let err = catalog.clean_datatype(length_on_int).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONSTRAINT");
    assert_eq!(
        err.to_string(),
        "BasicConstraint MIN_LENGTH \"3\" specifies a bound on string length, but its Datatype \"count\" has builtin type INT"
    );

    let value_on_str = catalog.add_datatype("label", "");
    catalog.add_restriction(value_on_str, BuiltinType::Str.datatype_id()).unwrap();
    catalog.add_constraint(value_on_str, ConstraintKind::MaxVal, "9").unwrap();
    assert_eq!(
        catalog.clean_datatype(value_on_str).unwrap_err().error_code(),
        "INVALID_CONSTRAINT"
    );

    let not_a_number = catalog.add_datatype("weight", "");
    catalog.add_restriction(not_a_number, BuiltinType::Float.datatype_id()).unwrap();
    catalog
        .add_constraint(not_a_number, ConstraintKind::MinVal, "heavy")
        .unwrap();
    assert_eq!(
        catalog.clean_datatype(not_a_number).unwrap_err().error_code(),
        "INVALID_CONSTRAINT"
    );
}

#[test]
fn test_datatype_without_builtin_is_incomplete() {
    let mut catalog = Catalog::new();
    let floating = catalog.add_datatype("floating", "");

    assert!(catalog.clean_datatype(floating).is_ok());
    let err = catalog.complete_clean_datatype(floating).unwrap_err();
    assert!(err.is_completeness_error());
    assert_eq!(err.error_code(), "INCOMPLETE");
    assert!(catalog.check_basic_constraints(floating, "x").is_err());
}

#[test]
fn test_prototype_examples_must_agree_with_constraints() {
    let fx = common::sequencing();
    let mut catalog = fx.catalog;
    catalog.datatype_mut(fx.dna).unwrap().prototype = Some(vec![
        PrototypeExample {
            value: "ACGT".to_string(),
            valid: true,
        },
        PrototypeExample {
            value: "hello".to_string(),
            valid: false,
        },
    ]);
    assert!(catalog.complete_clean_datatype(fx.dna).is_ok());

    catalog.datatype_mut(fx.dna).unwrap().prototype = Some(vec![PrototypeExample {
        value: "hello".to_string(),
        valid: true,
    }]);
    let err = catalog.complete_clean_datatype(fx.dna).unwrap_err();
    assert!(err.is_completeness_error());
    assert!(err.to_string().contains("\"hello\""));
}

#[test]
fn test_regexps_accumulate_through_restrictions() {
    let fx = common::sequencing();
    let mut catalog = fx.catalog;
    let no_n = catalog.add_datatype("unambiguous DNA", "");
    catalog.add_restriction(no_n, fx.dna).unwrap();
    catalog.add_constraint(no_n, ConstraintKind::Regexp, "^[^N]*$").unwrap();

    assert_eq!(catalog.effective_regexps(no_n).len(), 2);
    assert!(catalog.check_basic_constraints(no_n, "ACGT").unwrap().is_empty());
    assert_eq!(catalog.check_basic_constraints(no_n, "ACNT").unwrap().len(), 1);
    assert_eq!(catalog.check_basic_constraints(no_n, "UUNN").unwrap().len(), 2);
}

#[test]
fn test_value_of_wrong_builtin_type_reports_only_type_failure() {
    let mut catalog = Catalog::new();
    let positive = catalog.add_datatype("positive", "");
    catalog.add_restriction(positive, BuiltinType::Int.datatype_id()).unwrap();
    catalog.add_constraint(positive, ConstraintKind::MinVal, "1").unwrap();

    assert_eq!(
        catalog.check_basic_constraints(positive, "1.5").unwrap(),
        vec![ConstraintFailure::NotOfType(BuiltinType::Int)]
    );
    assert_eq!(catalog.check_basic_constraints(positive, "0").unwrap().len(), 1);
    assert!(catalog.check_basic_constraints(positive, "12").unwrap().is_empty());
}

#[test]
fn test_check_constraints_on_compound_rows() {
    let fx = common::sequencing();
    let ok = fx
        .catalog
        .check_constraints(fx.sequences, &["read1", "ACGT"])
        .unwrap();
    assert!(ok.iter().all(Vec::is_empty));

    let bad = fx
        .catalog
        .check_constraints(fx.sequences, &["", "ACGU"])
        .unwrap();
    assert_eq!(bad[0], vec![ConstraintFailure::Blank]);
    assert_eq!(bad[1].len(), 1);

    let err = fx
        .catalog
        .check_constraints(fx.sequences, &["read1", "ACGT", "extra"])
        .unwrap_err();
    assert_eq!(err.error_code(), "STRUCTURAL");
}

#[test]
fn test_diamond_shares_one_inherited_datetime_format() {
    let mut catalog = Catalog::new();
    let stamp = catalog.add_datatype("stamp", "");
    catalog.add_restriction(stamp, BuiltinType::Str.datatype_id()).unwrap();
    catalog
        .add_constraint(stamp, ConstraintKind::DatetimeFormat, "%Y-%m-%d")
        .unwrap();
    catalog.add_constraint(stamp, ConstraintKind::Regexp, "^2").unwrap();
    catalog.add_constraint(stamp, ConstraintKind::MaxLength, "10").unwrap();
    let left = catalog.add_datatype("left", "");
    catalog.add_restriction(left, stamp).unwrap();
    let right = catalog.add_datatype("right", "");
    catalog.add_restriction(right, stamp).unwrap();
    catalog.add_constraint(right, ConstraintKind::MinLength, "8").unwrap();
    let joined = catalog.add_datatype("joined", "");
    catalog.add_restriction(joined, left).unwrap();
    catalog.add_restriction(joined, right).unwrap();

    assert!(catalog.complete_clean_datatype(joined).is_ok());
    let effective = catalog.effective_constraints(joined).unwrap();
    assert_eq!(effective.datetime_format.unwrap().rule, "%Y-%m-%d");
    assert_eq!(effective.regexps.len(), 1);
    assert_eq!(effective.max_length.unwrap().value, 10.0);
    assert_eq!(effective.min_length.unwrap().value, 8.0);

    assert!(catalog.check_basic_constraints(joined, "2024-01-31").unwrap().is_empty());
    assert_eq!(catalog.check_basic_constraints(joined, "1999-01-31").unwrap().len(), 1);
}

#[test]
fn test_deep_lattice_cleans_quickly() {
    let mut catalog = Catalog::new();
    let root = catalog.add_datatype("root", "");
    catalog.add_restriction(root, BuiltinType::Int.datatype_id()).unwrap();
    catalog.add_constraint(root, ConstraintKind::MinVal, "0").unwrap();
    let mut level = vec![root];
    for depth in 0..40 {
        let next: Vec<_> = (0..2)
            .map(|side| {
                let id = catalog.add_datatype(&format!("level{}_{}", depth, side), "");
                for parent in &level {
                    catalog.add_restriction(id, *parent).unwrap();
                }
                id
            })
            .collect();
        level = next;
    }
    let leaf = level[0];
    catalog.add_constraint(level[1], ConstraintKind::MaxVal, "9").unwrap();

    let started = Instant::now();
    assert!(catalog.complete_clean_datatype(leaf).is_ok());
    assert!(catalog.clean_datatype(level[1]).is_ok());
    let bound = catalog.effective_bound(leaf, ConstraintKind::MinVal).unwrap();
    assert_eq!(bound.unwrap().value, 0.0);
    let failures = catalog.check_basic_constraints(leaf, "-1").unwrap();
    assert_eq!(failures.len(), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn builtin_subset() -> impl Strategy<Value = Vec<BuiltinType>> {
    proptest::sample::subsequence(BuiltinType::iter().collect::<Vec<_>>(), 1..=4)
}

proptest! {
    #[test]
    fn prop_most_specific_builtin_wins(parents in builtin_subset()) {
        let mut catalog = Catalog::new();
        let dt = catalog.add_datatype("mixed", "");
        for parent in &parents {
            catalog.add_restriction(dt, parent.datatype_id()).unwrap();
        }
        let expected = parents.iter().copied().max();
        prop_assert_eq!(catalog.builtin_type(dt), expected);
    }

    #[test]
    fn prop_value_checks_are_repeatable(value in "[ACGTUN]{0,12}") {
        let fx = common::sequencing();
        let first = fx.catalog.check_basic_constraints(fx.dna, &value).unwrap();
        let second = fx.catalog.check_basic_constraints(fx.dna, &value).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.is_empty(), !value.contains('U'));
    }
}
