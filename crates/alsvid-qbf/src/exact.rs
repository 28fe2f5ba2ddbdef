//! Isolated specification provider: the specification is a bare gate list
//! instead of a subcircuit embedded in a host, so there is nothing to copy
//! and the miter equates the specification outputs with the candidate's
//! output value variables directly.

use std::io::{self, Write};

use alsvid_ir::Cover;

use crate::encoder::SpecSource;
use crate::error::{QbfError, QbfResult};
use crate::qcir::{QcirWriter, lit};

/// Specification provider for an isolated gate list.
pub struct IsolatedSpec {
    inputs: Vec<u32>,
    outputs: Vec<u32>,
    gates: Vec<(u32, Cover)>,
    forbidden: Vec<(u32, u32)>,
    value_vars: Vec<u32>,
    last_used: u32,
}

impl IsolatedSpec {
    /// Build a provider from the gate list (alias and two-level cover over
    /// the original aliases), its inputs/outputs and any feedback pairs the
    /// caller derived from a surrounding context.
    pub fn new(
        inputs: Vec<u32>,
        outputs: Vec<u32>,
        gates: Vec<(u32, Cover)>,
        forbidden: Vec<(u32, u32)>,
    ) -> QbfResult<Self> {
        if inputs.is_empty() {
            return Err(QbfError::NoInputs {
                subcircuit: gates.iter().map(|&(a, _)| a).collect(),
            });
        }
        if outputs.is_empty() {
            return Err(QbfError::NoOutputs);
        }
        let mut last_used = inputs
            .iter()
            .chain(outputs.iter())
            .chain(gates.iter().map(|(a, _)| a))
            .copied()
            .max()
            .unwrap_or(0);
        let value_vars = outputs
            .iter()
            .map(|_| {
                last_used += 1;
                last_used
            })
            .collect();
        Ok(Self {
            inputs,
            outputs,
            gates,
            forbidden,
            value_vars,
            last_used,
        })
    }
}

impl SpecSource for IsolatedSpec {
    fn universal_variables(&self) -> &[u32] {
        &self.inputs
    }

    fn candidate_inputs(&self) -> &[u32] {
        &self.inputs
    }

    fn subcircuit_inputs(&self) -> &[u32] {
        &self.inputs
    }

    fn subcircuit_outputs(&self) -> &[u32] {
        &self.outputs
    }

    fn output_value_var(&self, idx: usize) -> u32 {
        self.value_vars[idx]
    }

    fn forbidden(&self) -> &[(u32, u32)] {
        &self.forbidden
    }

    fn last_used_var(&self) -> u32 {
        self.last_used
    }

    fn write_specification<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<()> {
        for (alias, cover) in &self.gates {
            w.cover_gate(*alias, cover)?;
        }
        Ok(())
    }

    fn write_miter<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<Vec<u32>> {
        let mut constraints = vec![];
        for (q, &out) in self.outputs.iter().enumerate() {
            let var = w.fresh();
            w.equivalence(var, lit(out), lit(self.value_vars[q]))?;
            constraints.push(var);
        }
        Ok(constraints)
    }
}
