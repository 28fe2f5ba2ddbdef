//! Synthesiser behaviour against stub solver processes: the UNSAT and
//! timeout paths, which need no real QBF solver.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use alsvid_ir::{Circuit, TruthTable};
use alsvid_synth::{Config, ReduceOutcome, Synthesiser};

fn stub_solver(dir: &tempfile::TempDir, script: &str) -> std::path::PathBuf {
    let path = dir.path().join("solver.sh");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "#!/bin/sh\n{script}").unwrap();
    let mut perm = f.metadata().unwrap().permissions();
    perm.set_mode(0o755);
    std::fs::set_permissions(&path, perm).unwrap();
    path
}

fn and3_circuit() -> Circuit {
    let and2 = TruthTable::from_rows(&[false, false, false, true]);
    let mut c = Circuit::new(vec![1, 2, 3], vec![11]);
    c.add_gate(10, vec![1, 2], and2.clone()).unwrap();
    c.add_gate(11, vec![10, 3], and2).unwrap();
    c.init(true).unwrap();
    c
}

#[test]
fn unsat_solver_means_unrealisable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        solver_path: stub_solver(&dir, "exit 20"),
        require_reduction: true,
        ..Config::default()
    };
    let mut circuit = and3_circuit();
    let mut synth = Synthesiser::new(&cfg);
    let outcome = synth.reduce(&mut circuit, &[10, 11], true).unwrap();
    assert!(matches!(outcome, ReduceOutcome::Unrealisable));
    // The circuit is untouched.
    assert_eq!(circuit.gate_count(), 2);
    circuit.verify_integrity().unwrap();
}

#[test]
fn slow_solver_reports_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        solver_path: stub_solver(&dir, "sleep 5; exit 20"),
        require_reduction: true,
        base_timeout: Duration::from_millis(150),
        minimal_timeout: Duration::from_millis(10),
        ..Config::default()
    };
    let mut circuit = and3_circuit();
    let mut synth = Synthesiser::new(&cfg);
    let outcome = synth.reduce(&mut circuit, &[10, 11], true).unwrap();
    assert!(matches!(outcome, ReduceOutcome::Timeout));
}

#[test]
fn failing_solver_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        solver_path: stub_solver(&dir, "exit 3"),
        require_reduction: true,
        ..Config::default()
    };
    let mut circuit = and3_circuit();
    let mut synth = Synthesiser::new(&cfg);
    let err = synth.reduce(&mut circuit, &[10, 11], true).unwrap_err();
    assert!(matches!(
        err,
        alsvid_synth::SynthError::Qbf(alsvid_qbf::QbfError::SolverFailed { .. })
    ));
}
