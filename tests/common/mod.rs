#![allow(dead_code)]

use pipewright::ids::{CompoundDatatypeId, DatatypeId, MethodId};
use pipewright::metadata::{BuiltinType, ConstraintKind};
use pipewright::serializer::{
    InputCableDict, OutputCableDict, PipelineDict, PipelineInputDict, PipelineStepDict, WireDict,
};
use pipewright::transformation::{TransformationId, TransformationKind, XputStructure};
use pipewright::Catalog;

/// A small sequencing catalog:
///
/// * `DNA` and `RNA` both restrict STR and are unrelated to each other
/// * `sequences` is (header: STR, sequence: DNA)
/// * `strings` is (label: STR, value: STR)
/// * `rna_pairs` is (label: STR, value: RNA)
/// * `reverse` maps `seqs: sequences` to `reversed: sequences`
/// * `summarize` maps `table: strings` to `summary: strings` and a raw `log`
pub struct Sequencing {
    pub catalog: Catalog,
    pub dna: DatatypeId,
    pub rna: DatatypeId,
    pub sequences: CompoundDatatypeId,
    pub strings: CompoundDatatypeId,
    pub rna_pairs: CompoundDatatypeId,
    pub reverse: MethodId,
    pub summarize: MethodId,
}

pub fn sequencing() -> Sequencing {
    let mut catalog = Catalog::new();
    let str_id = BuiltinType::Str.datatype_id();

    let dna = catalog.add_datatype("DNA", "nucleotide sequence");
    catalog.add_restriction(dna, str_id).unwrap();
    catalog
        .add_constraint(dna, ConstraintKind::Regexp, "^[ACGTN]*$")
        .unwrap();
    let rna = catalog.add_datatype("RNA", "ribonucleotide sequence");
    catalog.add_restriction(rna, str_id).unwrap();
    catalog
        .add_constraint(rna, ConstraintKind::Regexp, "^[ACGUN]*$")
        .unwrap();

    let sequences = catalog.add_compound_datatype("sequences");
    catalog.add_member(sequences, 1, "header", str_id, false).unwrap();
    catalog.add_member(sequences, 2, "sequence", dna, false).unwrap();

    let strings = catalog.add_compound_datatype("strings");
    catalog.add_member(strings, 1, "label", str_id, false).unwrap();
    catalog.add_member(strings, 2, "value", str_id, false).unwrap();

    let rna_pairs = catalog.add_compound_datatype("rna_pairs");
    catalog.add_member(rna_pairs, 1, "label", str_id, false).unwrap();
    catalog.add_member(rna_pairs, 2, "value", rna, false).unwrap();

    let reverse_family = catalog.add_method_family("reverse", "reverse sequences");
    let reverse = catalog.add_method(reverse_family, "initial").unwrap();
    catalog
        .add_input(
            TransformationId::Method(reverse),
            1,
            "seqs",
            Some(XputStructure::new(sequences)),
        )
        .unwrap();
    catalog
        .add_output(reverse, 1, "reversed", Some(XputStructure::new(sequences)))
        .unwrap();
    catalog.method_mut(reverse).unwrap().driver = Some("reverse.py".to_string());

    let summarize_family = catalog.add_method_family("summarize", "");
    let summarize = catalog.add_method(summarize_family, "initial").unwrap();
    catalog
        .add_input(
            TransformationId::Method(summarize),
            1,
            "table",
            Some(XputStructure::new(strings)),
        )
        .unwrap();
    catalog
        .add_output(summarize, 1, "summary", Some(XputStructure::new(strings)))
        .unwrap();
    catalog.add_output(summarize, 2, "log", None).unwrap();
    catalog.method_mut(summarize).unwrap().driver = Some("summarize.py".to_string());

    Sequencing {
        catalog,
        dna,
        rna,
        sequences,
        strings,
        rna_pairs,
        reverse,
        summarize,
    }
}

/// reads -> reverse -> summarize -> summary, with custom wires into step 2
pub fn two_step_dict(fx: &Sequencing, family_name: &str) -> PipelineDict {
    let reverse_family = fx.catalog.method(fx.reverse).unwrap().family.0;
    let summarize_family = fx.catalog.method(fx.summarize).unwrap().family.0;

    PipelineDict {
        user: "alice".to_string(),
        users_allowed: vec!["bob".to_string()],
        groups_allowed: vec!["Everyone".to_string()],
        family_pk: None,
        family_name: family_name.to_string(),
        family_desc: "reverse then summarize".to_string(),
        revision_number: None,
        revision_name: "first".to_string(),
        revision_desc: "initial revision".to_string(),
        revision_parent_pk: None,
        pipeline_inputs: vec![PipelineInputDict {
            cdt_pk: Some(fx.sequences.0),
            dataset_name: "reads".to_string(),
            dataset_idx: 1,
            x: 0.1,
            y: 0.2,
            min_row: None,
            max_row: None,
        }],
        pipeline_steps: vec![
            PipelineStepDict {
                transf_pk: fx.reverse.0,
                transf_type: TransformationKind::Method,
                family_pk: reverse_family,
                step_num: 1,
                x: 0.3,
                y: 0.3,
                name: "reverse".to_string(),
                cables_in: vec![InputCableDict {
                    source_dataset_name: "reads".to_string(),
                    source_step: 0,
                    dest_dataset_name: "seqs".to_string(),
                    keep_output: false,
                    wires: Vec::new(),
                }],
                outputs_to_delete: Vec::new(),
            },
            PipelineStepDict {
                transf_pk: fx.summarize.0,
                transf_type: TransformationKind::Method,
                family_pk: summarize_family,
                step_num: 2,
                x: 0.6,
                y: 0.4,
                name: "summarize".to_string(),
                cables_in: vec![InputCableDict {
                    source_dataset_name: "reversed".to_string(),
                    source_step: 1,
                    dest_dataset_name: "table".to_string(),
                    keep_output: true,
                    wires: vec![
                        WireDict {
                            source_idx: 1,
                            dest_idx: 1,
                        },
                        WireDict {
                            source_idx: 2,
                            dest_idx: 2,
                        },
                    ],
                }],
                outputs_to_delete: vec!["log".to_string()],
            },
        ],
        pipeline_outputs: vec![OutputCableDict {
            output_idx: 1,
            output_name: "summary".to_string(),
            output_cdt_pk: Some(fx.strings.0),
            source_step: 2,
            source_dataset_name: "summary".to_string(),
            x: 0.9,
            y: 0.5,
            wires: Vec::new(),
        }],
        is_published_version: true,
    }
}

/// A catalog document in YAML holding the sequencing entities and one pipeline
pub const SEQUENCING_DOCUMENT: &str = r#"
datatypes:
  - pk: 1
    name: DNA
    restricts: [STR]
    constraints:
      - kind: REGEXP
        rule: "^[ACGTN]*$"
    prototype:
      - value: ACGT
        valid: true
      - value: hello
        valid: false
compound_datatypes:
  - pk: 1
    name: sequences
    members:
      - column_idx: 1
        column_name: header
        datatype: STR
      - column_idx: 2
        column_name: sequence
        datatype: 1
methods:
  - pk: 7
    family: reverse
    driver: reverse.py
    inputs:
      - dataset_idx: 1
        dataset_name: seqs
        CDT_pk: 1
    outputs:
      - dataset_idx: 1
        dataset_name: reversed
        CDT_pk: 1
pipelines:
  - pk: 20
    pipeline:
      family_name: reverser
      revision_name: first
      pipeline_inputs:
        - CDT_pk: 1
          dataset_name: reads
          dataset_idx: 1
      pipeline_steps:
        - transf_pk: 7
          transf_type: Method
          family_pk: 0
          step_num: 1
          cables_in:
            - source_dataset_name: reads
              source_step: 0
              dest_dataset_name: seqs
      pipeline_outputs:
        - output_idx: 1
          output_name: reversed_reads
          output_CDT_pk: 1
          source_step: 1
          source_dataset_name: reversed
  - pk: 21
    pipeline:
      family_name: reverser
      revision_name: second
      revision_parent_pk: 20
      pipeline_inputs:
        - CDT_pk: 1
          dataset_name: reads
          dataset_idx: 1
      pipeline_steps:
        - transf_pk: 7
          transf_type: Method
          family_pk: 0
          step_num: 1
          cables_in:
            - source_dataset_name: reads
              source_step: 0
              dest_dataset_name: seqs
      pipeline_outputs:
        - output_idx: 1
          output_name: reversed_reads
          output_CDT_pk: 1
          source_step: 1
          source_dataset_name: reversed
executed_pipelines: [20]
"#;
