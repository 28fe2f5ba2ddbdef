//! Equivalence check between two subcircuits through a miter QBF.
//!
//! Both subcircuits share a sorted input list; the second may declare
//! constant-false outputs. A satisfying assignment of the existentially
//! quantified inputs witnesses a differing output, so *unsatisfiable* means
//! equivalent. Used only to log whether a replacement happened to be an
//! exact equivalent rather than a mere same-cardinality alternative.

use std::io::Write as _;
use std::path::Path;

use rustc_hash::FxHashMap;

use alsvid_ir::{Gate, TruthTable};

use crate::error::QbfResult;
use crate::qcir::{QcirWriter, lit};
use crate::solver::{QbfSolver, SolverOutcome, solve};

/// A standalone subcircuit for the equivalence check.
#[derive(Debug, Clone)]
pub struct SubcircuitSpec {
    /// Shared input aliases, sorted.
    pub inputs: Vec<u32>,
    /// Output aliases; `None` marks a constant-false output slot.
    pub outputs: Vec<Option<u32>>,
    /// The gates as (alias, inputs, table).
    pub gates: Vec<(u32, Vec<u32>, TruthTable)>,
}

/// Ask the solver whether the two subcircuits compute the same outputs for
/// every input assignment. The first subcircuit must not contain constant
/// output markers.
pub fn equivalent(
    first: &SubcircuitSpec,
    second: &SubcircuitSpec,
    solver_command: &Path,
    solver: QbfSolver,
) -> QbfResult<bool> {
    debug_assert_eq!(first.inputs, second.inputs);
    debug_assert_eq!(first.outputs.len(), second.outputs.len());

    let mut file = tempfile::Builder::new().suffix(".qcir").tempfile()?;
    let last_used = first
        .inputs
        .iter()
        .chain(first.gates.iter().map(|(a, _, _)| a))
        .chain(second.gates.iter().map(|(a, _, _)| a))
        .copied()
        .max()
        .unwrap_or(0);
    let mut w = QcirWriter::new(&mut file, last_used, false);

    w.header()?;
    w.exists(first.inputs.iter().copied())?;
    // The top gate is defined last; reserve its name up front.
    let output_var = w.fresh();
    w.output(output_var)?;

    let mut first_names = rustc_hash::FxHashSet::default();
    for (alias, inputs, table) in &first.gates {
        first_names.insert(*alias);
        let gate = Gate::new(*alias, inputs.clone(), table.clone());
        w.cover_gate(*alias, &gate.cover())?;
    }

    // The second subcircuit's internal aliases may collide with the first's;
    // rename them apart.
    let mut renaming: FxHashMap<u32, u32> = FxHashMap::default();
    for (alias, inputs, table) in &second.gates {
        let gate_var = if first_names.contains(alias) {
            let fresh = w.fresh();
            renaming.insert(*alias, fresh);
            fresh
        } else {
            *alias
        };
        let renamed: Vec<u32> = inputs
            .iter()
            .map(|x| renaming.get(x).copied().unwrap_or(*x))
            .collect();
        let gate = Gate::new(gate_var, renamed, table.clone());
        w.cover_gate(gate_var, &gate.cover())?;
    }

    let mut difference = vec![];
    for (idx, &out1) in first.outputs.iter().enumerate() {
        match (out1, second.outputs[idx]) {
            (None, None) => {}
            // A constant-false slot differs exactly when the other side is
            // true.
            (Some(o1), None) => difference.push(lit(o1)),
            (None, Some(o2)) => {
                let o2 = renaming.get(&o2).copied().unwrap_or(o2);
                difference.push(lit(o2));
            }
            (Some(o1), Some(o2)) => {
                let o2 = renaming.get(&o2).copied().unwrap_or(o2);
                let var = w.fresh();
                w.xor(var, lit(o1), lit(o2))?;
                difference.push(lit(var));
            }
        }
    }
    w.or(output_var, &difference)?;
    w.flush()?;
    file.flush()?;

    let run = solve(solver_command, solver, file.path(), None)?;
    match run.outcome {
        SolverOutcome::Realisable(_) => Ok(false),
        SolverOutcome::Unrealisable => Ok(true),
    }
}
