//! Structural checks on emitted encodings: quantifier shape, variable
//! layout, and the acyclicity constraints for feedback pairs.

use alsvid_ir::{Circuit, TruthTable};
use alsvid_qbf::encoder::SpecSource;
use alsvid_qbf::{Encoder, EncoderOptions, HostSpec, IsolatedSpec, QbfError};

fn and_table() -> TruthTable {
    TruthTable::from_rows(&[false, false, false, true])
}

fn xor_table() -> TruthTable {
    TruthTable::from_rows(&[false, true, true, false])
}

fn or_table() -> TruthTable {
    TruthTable::from_rows(&[false, true, true, true])
}

/// and3 over PIs 1..3 as two 2-input ANDs.
fn and3_circuit() -> Circuit {
    let mut c = Circuit::new(vec![1, 2, 3], vec![11]);
    c.add_gate(10, vec![1, 2], and_table()).unwrap();
    c.add_gate(11, vec![10, 3], and_table()).unwrap();
    c.init(true).unwrap();
    c
}

fn encode_to_string(
    spec: &impl SpecSource,
    opts: EncoderOptions,
    nof_gates: usize,
) -> (String, alsvid_qbf::EncodingLayout) {
    let encoder = Encoder::new(spec, opts);
    let mut buf = vec![];
    let layout = encoder.encode(nof_gates, 2, &mut buf).unwrap();
    (String::from_utf8(buf).unwrap(), layout)
}

#[test]
fn host_encoding_shape() {
    let circuit = and3_circuit();
    let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
    let (text, layout) = encode_to_string(&spec, EncoderOptions::default(), 1);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "#QCIR-G14");
    assert!(lines[1].starts_with("exists("));
    assert_eq!(lines[2], "forall(1, 2, 3)");
    assert!(lines[3].starts_with("exists("));
    assert_eq!(text.matches("forall(").count(), 1);
    assert_eq!(text.matches("output(").count(), 1);

    // One candidate gate over three subcircuit inputs.
    assert_eq!(layout.selection.len(), 1);
    assert_eq!(layout.selection[0].len(), 3);
    assert_eq!(layout.definition[0].len(), 3);
    // Output rows: 1 gate + 3 inputs + 1 constant, one slot each.
    assert_eq!(layout.output.len(), 5);
    assert_eq!(layout.output[0].len(), 1);
}

#[test]
fn host_encoding_without_candidate_outputs() {
    let circuit = and3_circuit();
    let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
    let opts = EncoderOptions {
        inputs_as_outputs: false,
        constants_as_outputs: false,
        ..EncoderOptions::default()
    };
    let (_, layout) = encode_to_string(&spec, opts, 2);
    assert_eq!(layout.output.len(), 2);
    assert_eq!(layout.selection[1].len(), 4);
}

#[test]
fn rejects_too_few_inputs() {
    let mut c = Circuit::new(vec![1], vec![10]);
    c.add_gate(10, vec![1], TruthTable::from_rows(&[false, true]))
        .unwrap();
    c.init(true).unwrap();
    let spec = HostSpec::new(&c, &[10]).unwrap();
    let encoder = Encoder::new(&spec, EncoderOptions::default());
    let err = encoder.encode(1, 2, &mut vec![]).unwrap_err();
    assert!(matches!(
        err,
        QbfError::NotEnoughInputs {
            available: 1,
            required: 2
        }
    ));
}

#[test]
fn empty_selection_reports_no_inputs() {
    let mut c = Circuit::new(vec![1, 2], vec![10]);
    c.add_gate(10, vec![1, 2], and_table()).unwrap();
    c.init(true).unwrap();
    // Selecting nothing yields no inputs.
    assert!(matches!(
        HostSpec::new(&c, &[]),
        Err(QbfError::NoInputs { .. })
    ));
}

/// The feedback scenario: subcircuit {3, 5} with input 4 reachable from
/// output 3 outside the set. The encoder must rename the affected input to
/// its downstream copy and emit the cycle constraints.
#[test]
fn feedback_pair_emits_cycle_constraints() {
    let mut c = Circuit::new(vec![1, 2], vec![5]);
    c.add_gate(3, vec![1, 2], xor_table()).unwrap();
    c.add_gate(4, vec![3, 2], and_table()).unwrap();
    c.add_gate(5, vec![3, 4], or_table()).unwrap();
    c.init(true).unwrap();

    let spec = HostSpec::new(&c, &[3, 5]).unwrap();
    assert_eq!(spec.subcircuit_inputs(), &[1, 2, 4]);
    assert_eq!(spec.subcircuit_outputs(), &[3, 5]);
    assert_eq!(spec.forbidden().len(), 1);
    let (output, renamed_input) = spec.forbidden()[0];
    assert_eq!(output, 3);
    // The input of the pair is read through its copy, so it is a fresh
    // variable, not alias 4 itself.
    assert!(renamed_input > c.max_alias());
    assert!(spec.candidate_inputs().contains(&renamed_input));
    assert!(!spec.candidate_inputs().contains(&4));

    let (text, _) = encode_to_string(&spec, EncoderOptions::default(), 2);
    assert!(text.contains("# Cycle Constraint"));
    assert!(text.contains("# Cycle Restrictions"));
    // Gate 4 is downstream of output 3: its copy must be emitted.
    assert!(text.contains("# Specification Copy"));
}

#[test]
fn no_feedback_means_no_cycle_section() {
    let circuit = and3_circuit();
    let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
    assert!(spec.forbidden().is_empty());
    let (text, _) = encode_to_string(&spec, EncoderOptions::default(), 1);
    assert!(!text.contains("# Cycle Constraint"));
}

#[test]
fn isolated_spec_has_no_copy() {
    let c = and3_circuit();
    let gates: Vec<_> = c
        .ordered_gates()
        .map(|g| (g.alias, g.cover()))
        .collect();
    let spec = IsolatedSpec::new(vec![1, 2, 3], vec![11], gates, vec![]).unwrap();
    let (text, layout) = encode_to_string(&spec, EncoderOptions::default(), 2);
    assert_eq!(text.matches("forall(").count(), 1);
    assert!(text.contains("forall(1, 2, 3)"));
    assert_eq!(layout.selection.len(), 2);
    // Specification copy section is empty for isolated specs.
    let copy_idx = text.find("# Specification Copy").unwrap();
    let next = text[copy_idx..].lines().nth(1).unwrap();
    assert!(next.starts_with('#'), "unexpected copy content: {next}");
}

#[test]
fn aig_mode_restricts_definitions() {
    let circuit = and3_circuit();
    let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
    let opts = EncoderOptions {
        aig: true,
        ..EncoderOptions::default()
    };
    let (text, layout) = encode_to_string(&spec, opts, 1);
    let d = &layout.definition[0];
    assert!(text.contains(&format!("or(-{}, -{}, {})", d[0], d[1], d[2])));
}
