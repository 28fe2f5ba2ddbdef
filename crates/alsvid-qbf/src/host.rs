//! Host-embedded specification provider.
//!
//! The specification is the full host circuit; everything downstream of the
//! subcircuit being replaced is duplicated under fresh names, reading the
//! candidate's output value variables where it would have read the replaced
//! gates. The miter then requires every primary output of the copy to equal
//! the original's.

use std::io::{self, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use alsvid_ir::Circuit;

use crate::encoder::SpecSource;
use crate::error::{QbfError, QbfResult};
use crate::qcir::{QcirWriter, lit};

/// Specification provider for a subcircuit embedded in a host circuit.
pub struct HostSpec<'c> {
    circuit: &'c Circuit,
    sub_inputs: Vec<u32>,
    sub_outputs: Vec<u32>,
    candidate_inputs: Vec<u32>,
    /// `(output alias, renamed input variable)` feedback pairs.
    forbidden: Vec<(u32, u32)>,
    /// Fresh names for the subcircuit outputs (their value variables) and
    /// for every downstream gate (its copy).
    renaming: FxHashMap<u32, u32>,
    gates_to_copy: FxHashSet<u32>,
    last_used: u32,
}

impl<'c> HostSpec<'c> {
    /// Analyse the subcircuit `to_replace` of `circuit`.
    ///
    /// Fails with [`QbfError::NoInputs`] (a selection bug; fatal upstream)
    /// or [`QbfError::NoOutputs`] (recoverable: the empty replacement).
    pub fn new(circuit: &'c Circuit, to_replace: &[u32]) -> QbfResult<Self> {
        let internal: FxHashSet<u32> = to_replace.iter().copied().collect();
        let sub_inputs = circuit.subcircuit_inputs(&internal);
        if sub_inputs.is_empty() {
            return Err(QbfError::NoInputs {
                subcircuit: to_replace.to_vec(),
            });
        }
        let sub_outputs = circuit.subcircuit_outputs(&internal);
        if sub_outputs.is_empty() {
            return Err(QbfError::NoOutputs);
        }
        let mut forbidden = circuit.potential_cycles(&sub_inputs, &sub_outputs, &internal);

        let mut last_used = circuit.max_alias();
        let mut renaming: FxHashMap<u32, u32> = FxHashMap::default();
        let mut seen: FxHashSet<u32> = sub_outputs.iter().copied().collect();
        let mut to_analyse: Vec<u32> = vec![];
        for &out in &sub_outputs {
            last_used += 1;
            renaming.insert(out, last_used);
            for s in circuit.successors_of(out) {
                if seen.insert(s) {
                    to_analyse.push(s);
                }
            }
        }
        let mut gates_to_copy = FxHashSet::default();
        while let Some(gate) = to_analyse.pop() {
            if internal.contains(&gate) {
                continue;
            }
            gates_to_copy.insert(gate);
            last_used += 1;
            renaming.insert(gate, last_used);
            for s in circuit.successors_of(gate) {
                if seen.insert(s) {
                    to_analyse.push(s);
                }
            }
        }

        // A subcircuit input that is itself downstream of an output must be
        // read through its copy, and the feedback pairs follow suit.
        let candidate_inputs = if forbidden.is_empty() {
            sub_inputs.clone()
        } else {
            let affected: FxHashSet<u32> = forbidden.iter().map(|&(_, y)| y).collect();
            for (_, y) in forbidden.iter_mut() {
                *y = *renaming.get(y).ok_or_else(|| {
                    QbfError::Encoding(format!("feedback input {y} has no downstream copy"))
                })?;
            }
            sub_inputs
                .iter()
                .map(|&x| {
                    if affected.contains(&x) {
                        renaming[&x]
                    } else {
                        x
                    }
                })
                .collect()
        };

        Ok(Self {
            circuit,
            sub_inputs,
            sub_outputs,
            candidate_inputs,
            forbidden,
            renaming,
            gates_to_copy,
            last_used,
        })
    }

    /// The host circuit this provider wraps.
    pub fn circuit(&self) -> &'c Circuit {
        self.circuit
    }
}

impl SpecSource for HostSpec<'_> {
    fn universal_variables(&self) -> &[u32] {
        self.circuit.inputs()
    }

    fn candidate_inputs(&self) -> &[u32] {
        &self.candidate_inputs
    }

    fn subcircuit_inputs(&self) -> &[u32] {
        &self.sub_inputs
    }

    fn subcircuit_outputs(&self) -> &[u32] {
        &self.sub_outputs
    }

    fn output_value_var(&self, idx: usize) -> u32 {
        self.renaming[&self.sub_outputs[idx]]
    }

    fn forbidden(&self) -> &[(u32, u32)] {
        &self.forbidden
    }

    fn last_used_var(&self) -> u32 {
        self.last_used
    }

    fn write_specification<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<()> {
        for gate in self.circuit.ordered_gates() {
            w.cover_gate(gate.alias, &gate.cover())?;
        }
        Ok(())
    }

    fn write_specification_copy<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<()> {
        for gate in self.circuit.ordered_gates() {
            if !self.gates_to_copy.contains(&gate.alias) {
                continue;
            }
            debug_assert!(!gate.is_constant());
            let names: Vec<i64> = gate
                .inputs
                .iter()
                .map(|x| i64::from(self.renaming.get(x).copied().unwrap_or(*x)))
                .collect();
            w.cover_gate(self.renaming[&gate.alias], &gate.cover_named(&names))?;
        }
        Ok(())
    }

    fn write_miter<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<Vec<u32>> {
        let mut constraints = vec![];
        let mut seen = FxHashSet::default();
        for &po in self.circuit.outputs() {
            if let Some(&copy) = self.renaming.get(&po) {
                if seen.insert(po) {
                    let var = w.fresh();
                    w.equivalence(var, lit(po), lit(copy))?;
                    constraints.push(var);
                }
            }
        }
        Ok(constraints)
    }
}
