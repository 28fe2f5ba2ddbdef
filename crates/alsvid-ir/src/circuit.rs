//! The mutable circuit DAG.
//!
//! Gates are stored in an arena of maps keyed by dense integer aliases; the
//! successor index is the exact inverse of the input relation. All references
//! between gates are aliases, never owning pointers, so no reference cycles
//! exist. Every public mutation re-establishes the invariants: normalised
//! tables, consistent successor index, levels and topological order matching
//! the input relation, acyclicity, at most one constant gate, and no dead
//! gates.

use bitvec::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{IrError, IrResult};
use crate::gate::Gate;
use crate::table::TruthTable;

/// A combinational Boolean circuit.
///
/// Primary outputs may repeat and may reference primary inputs directly.
/// `negated_outputs` carries one bit per output position: internally every
/// gate is normalised, and a set bit means the emitted output is the
/// negation of the referenced gate.
#[derive(Debug, Clone)]
pub struct Circuit {
    primary_inputs: Vec<u32>,
    primary_outputs: Vec<u32>,
    inputs_set: FxHashSet<u32>,
    outputs_set: FxHashSet<u32>,
    negated_outputs: BitVec,
    gates: FxHashMap<u32, Gate>,
    successors: FxHashMap<u32, FxHashSet<u32>>,
    level: FxHashMap<u32, u32>,
    topological_order: Vec<u32>,
    constant_alias: Option<u32>,
    max_alias: u32,
}

impl Circuit {
    /// Create an empty circuit over the given primary inputs and outputs.
    /// Gates are added afterwards; call [`Circuit::init`] once ingestion is
    /// complete.
    pub fn new(primary_inputs: Vec<u32>, primary_outputs: Vec<u32>) -> Self {
        let inputs_set: FxHashSet<u32> = primary_inputs.iter().copied().collect();
        let outputs_set: FxHashSet<u32> = primary_outputs.iter().copied().collect();
        let max_alias = primary_inputs
            .iter()
            .chain(primary_outputs.iter())
            .copied()
            .max()
            .unwrap_or(0);
        let successors = primary_inputs
            .iter()
            .map(|&x| (x, FxHashSet::default()))
            .collect();
        let level = primary_inputs.iter().map(|&x| (x, 0)).collect();
        let negated_outputs = bitvec![0; primary_outputs.len()];
        Self {
            primary_inputs,
            primary_outputs,
            inputs_set,
            outputs_set,
            negated_outputs,
            gates: FxHashMap::default(),
            successors,
            level,
            topological_order: vec![],
            constant_alias: None,
            max_alias,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The ordered primary inputs.
    pub fn inputs(&self) -> &[u32] {
        &self.primary_inputs
    }

    /// The ordered primary outputs (duplicates permitted).
    pub fn outputs(&self) -> &[u32] {
        &self.primary_outputs
    }

    /// Whether the output at `idx` is emitted negated.
    pub fn is_output_negated(&self, idx: usize) -> bool {
        self.negated_outputs[idx]
    }

    /// Whether `alias` is a primary input.
    pub fn is_primary_input(&self, alias: u32) -> bool {
        self.inputs_set.contains(&alias)
    }

    /// Whether `alias` appears in the primary-output list.
    pub fn is_primary_output(&self, alias: u32) -> bool {
        self.outputs_set.contains(&alias)
    }

    /// Number of gates, the constant included.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Look up a gate.
    pub fn gate(&self, alias: u32) -> Option<&Gate> {
        self.gates.get(&alias)
    }

    /// The input aliases of a gate; empty for unknown aliases.
    pub fn gate_inputs(&self, alias: u32) -> &[u32] {
        self.gates.get(&alias).map_or(&[], |g| g.inputs.as_slice())
    }

    /// The gates reading `alias`.
    pub fn successors_of(&self, alias: u32) -> impl Iterator<Item = u32> + '_ {
        self.successors.get(&alias).into_iter().flatten().copied()
    }

    /// Number of gates reading `alias`.
    pub fn successor_count(&self, alias: u32) -> usize {
        self.successors.get(&alias).map_or(0, FxHashSet::len)
    }

    /// The level of an alias: 0 for primary inputs and the constant,
    /// 1 + max input level otherwise.
    pub fn level(&self, alias: u32) -> u32 {
        self.level.get(&alias).copied().unwrap_or(0)
    }

    /// Maximum level over the primary outputs.
    pub fn depth(&self) -> u32 {
        self.primary_outputs
            .iter()
            .map(|&x| self.level(x))
            .max()
            .unwrap_or(0)
    }

    /// The largest alias handed out so far.
    pub fn max_alias(&self) -> u32 {
        self.max_alias
    }

    /// The alias of the constant-false gate, if one has been materialised.
    pub fn constant_alias(&self) -> Option<u32> {
        self.constant_alias
    }

    /// All gate aliases, unordered.
    pub fn gate_aliases(&self) -> impl Iterator<Item = u32> + '_ {
        self.gates.keys().copied()
    }

    /// Every gate exactly once in topological order. The circuit must not
    /// be mutated while the traversal is live; the borrow enforces this.
    pub fn ordered_gates(&self) -> impl Iterator<Item = &Gate> {
        self.topological_order
            .iter()
            .filter_map(|a| self.gates.get(a))
    }

    /// The topological order itself.
    pub fn topological_order(&self) -> &[u32] {
        &self.topological_order
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Install a gate whose inputs are already known to the circuit (they
    /// are primary inputs or previously added gates).
    pub fn add_gate(&mut self, alias: u32, inputs: Vec<u32>, table: TruthTable) -> IrResult<()> {
        self.validate_gate(alias, &inputs, &table)?;
        for &x in &inputs {
            match self.successors.get_mut(&x) {
                Some(set) => {
                    set.insert(alias);
                }
                None => return Err(IrError::UndefinedAlias { alias: x, referent: alias }),
            }
        }
        self.max_alias = self.max_alias.max(alias);
        self.successors.entry(alias).or_default();
        self.gates.insert(alias, Gate::new(alias, inputs, table));
        Ok(())
    }

    /// Install a gate without requiring its inputs to be defined yet; the
    /// successor index is rebuilt by [`Circuit::init`].
    pub fn add_gate_unsorted(
        &mut self,
        alias: u32,
        inputs: Vec<u32>,
        table: TruthTable,
    ) -> IrResult<()> {
        self.validate_gate(alias, &inputs, &table)?;
        self.max_alias = self.max_alias.max(alias);
        self.successors.entry(alias).or_default();
        self.gates.insert(alias, Gate::new(alias, inputs, table));
        Ok(())
    }

    fn validate_gate(&self, alias: u32, inputs: &[u32], table: &TruthTable) -> IrResult<()> {
        if self.gates.contains_key(&alias) || self.inputs_set.contains(&alias) {
            return Err(IrError::DuplicateGate(alias));
        }
        if table.len() != 1 << inputs.len() {
            return Err(IrError::TableArityMismatch {
                alias,
                arity: inputs.len(),
                table_len: table.len(),
            });
        }
        if !table.is_normalised() {
            return Err(IrError::DenormalisedTable(alias));
        }
        Ok(())
    }

    /// Finalise after ingestion: build the successor index if the gates
    /// were not added in topological order, fold constant gates away, sweep
    /// dead gates, and compute levels and the topological order.
    pub fn init(&mut self, inputs_topologically_ordered: bool) -> IrResult<()> {
        if !inputs_topologically_ordered {
            let edges: Vec<(u32, u32)> = self
                .gates
                .values()
                .flat_map(|g| g.inputs.iter().map(move |&x| (x, g.alias)))
                .collect();
            for (input, consumer) in edges {
                match self.successors.get_mut(&input) {
                    Some(set) => {
                        set.insert(consumer);
                    }
                    None => {
                        return Err(IrError::UndefinedAlias {
                            alias: input,
                            referent: consumer,
                        });
                    }
                }
            }
        }
        self.remove_constant_gates();
        let all: FxHashSet<u32> = self.gates.keys().copied().collect();
        self.remove_unused_gates(all);
        self.set_gate_levels()
    }

    /// Fold away every zero-input gate: substitute constant false into its
    /// consumers (cascading through consumers that collapse) and redirect
    /// primary outputs onto the single shared constant gate.
    fn remove_constant_gates(&mut self) {
        let mut worklist: Vec<u32> = self
            .gates
            .values()
            .filter(|g| g.is_constant())
            .map(|g| g.alias)
            .collect();
        let mut substitution: FxHashMap<u32, Option<u32>> =
            worklist.iter().map(|&x| (x, None)).collect();
        while let Some(alias) = worklist.pop() {
            if !self.gates.contains_key(&alias) {
                continue;
            }
            let consumers: Vec<u32> = self.successors_of(alias).collect();
            for s in consumers {
                let Some(gate) = self.gates.get_mut(&s) else {
                    continue;
                };
                let remaining = gate.substitute(&substitution);
                if gate.is_constant() {
                    // Detach the collapsed gate from its surviving inputs so
                    // the successor index stays exact.
                    for x in remaining {
                        if let Some(set) = self.successors.get_mut(&x) {
                            set.remove(&s);
                        }
                    }
                    substitution.insert(s, None);
                    worklist.push(s);
                }
            }
            self.remove_gate(alias);
            if self.is_primary_output(alias) {
                let constant = self.ensure_constant_alias(alias);
                for out in self.primary_outputs.iter_mut() {
                    if *out == alias {
                        *out = constant;
                    }
                }
                self.outputs_set = self.primary_outputs.iter().copied().collect();
            }
        }
    }

    /// The single representation of the constant-false gate, allocated on
    /// demand under `candidate` (an alias known to be free).
    fn ensure_constant_alias(&mut self, candidate: u32) -> u32 {
        match self.constant_alias {
            Some(c) => c,
            None => {
                self.constant_alias = Some(candidate);
                self.max_alias = self.max_alias.max(candidate);
                self.level.insert(candidate, 0);
                self.successors.entry(candidate).or_default();
                self.gates.insert(candidate, Gate::constant(candidate));
                candidate
            }
        }
    }

    fn remove_gate(&mut self, alias: u32) {
        let inputs = self
            .gates
            .get(&alias)
            .map(|g| g.inputs.clone())
            .unwrap_or_default();
        self.remove_gate_with_inputs(alias, &inputs);
    }

    /// Remove `alias`, detaching it from the given input list. The input
    /// list is passed separately because a substitution may already have
    /// renamed the stored one.
    fn remove_gate_with_inputs(&mut self, alias: u32, inputs: &[u32]) {
        for x in inputs {
            if let Some(set) = self.successors.get_mut(x) {
                set.remove(&alias);
            }
        }
        self.gates.remove(&alias);
        self.level.remove(&alias);
        self.successors.remove(&alias);
        if self.constant_alias == Some(alias) {
            self.constant_alias = None;
        }
    }

    // =========================================================================
    // Subcircuit queries
    // =========================================================================

    /// The aliases feeding the given gate set from outside, sorted.
    pub fn subcircuit_inputs(&self, aliases: &FxHashSet<u32>) -> Vec<u32> {
        let mut inputs: Vec<u32> = self.subcircuit_input_set(aliases).into_iter().collect();
        inputs.sort_unstable();
        inputs
    }

    fn subcircuit_input_set(&self, aliases: &FxHashSet<u32>) -> FxHashSet<u32> {
        aliases
            .iter()
            .flat_map(|&a| self.gate_inputs(a).iter().copied())
            .filter(|x| !aliases.contains(x))
            .collect()
    }

    /// The members of the set consumed outside it (or exported as primary
    /// outputs), sorted.
    pub fn subcircuit_outputs(&self, aliases: &FxHashSet<u32>) -> Vec<u32> {
        let mut outputs: Vec<u32> = aliases
            .iter()
            .copied()
            .filter(|&x| {
                self.is_primary_output(x) || self.successors_of(x).any(|s| !aliases.contains(&s))
            })
            .collect();
        outputs.sort_unstable();
        outputs
    }

    /// The gates outside the set that read a member of it.
    pub fn direct_successors(&self, aliases: &FxHashSet<u32>) -> FxHashSet<u32> {
        aliases
            .iter()
            .flat_map(|&a| self.successors_of(a))
            .filter(|x| !aliases.contains(x))
            .collect()
    }

    /// Every pair `(output, input)` of the subcircuit such that a path from
    /// the output to the input exists entirely outside `internal`. A
    /// replacement that routes such a pair through a new gate would close a
    /// cycle, so the encoder must forbid it.
    pub fn potential_cycles(
        &self,
        inputs: &[u32],
        outputs: &[u32],
        internal: &FxHashSet<u32>,
    ) -> Vec<(u32, u32)> {
        let mut pairs = vec![];
        if outputs.is_empty() {
            return pairs;
        }
        let min_level = outputs.iter().map(|&x| self.level(x)).min().unwrap_or(0);
        let output_set: FxHashSet<u32> = outputs.iter().copied().collect();
        for &inp in inputs {
            // Walk the fan-in cone of the subcircuit input upward, outside
            // the subcircuit, until an output is found or the level falls
            // below the lowest output.
            if min_level >= self.level(inp) {
                continue;
            }
            let mut seen: FxHashSet<u32> = internal.clone();
            let mut to_check = vec![inp];
            seen.insert(inp);
            while let Some(current) = to_check.pop() {
                for &x in self.gate_inputs(current) {
                    if output_set.contains(&x) {
                        pairs.push((x, inp));
                    } else if seen.insert(x) && self.level(x) > min_level {
                        to_check.push(x);
                    }
                }
            }
        }
        pairs
    }

    // =========================================================================
    // Splicing
    // =========================================================================

    /// Replace the induced subcircuit of `to_remove` by `new_gates`.
    ///
    /// `output_assoc` maps every subcircuit output to its replacement: a
    /// new-gate alias, an external alias (wire-through), or `None` for
    /// constant false. The map is extended in place when an external
    /// successor folds to a constant during rewiring. Returns every alias
    /// removed, transitive casualties included.
    pub fn replace_subcircuit(
        &mut self,
        to_remove: &[u32],
        new_gates: Vec<Gate>,
        output_assoc: &mut FxHashMap<u32, Option<u32>>,
    ) -> IrResult<FxHashSet<u32>> {
        let old_set: FxHashSet<u32> = to_remove.iter().copied().collect();
        let mut work: Vec<u32> = self.direct_successors(&old_set).into_iter().collect();
        let mut unused_candidates = self.subcircuit_input_set(&old_set);
        let output_log = self.rewired_successors(&old_set, output_assoc);
        let mut redundant = FxHashSet::default();

        for &x in to_remove {
            self.remove_gate(x);
        }
        self.insert_gates(new_gates)?;
        for (alias, outs) in output_log {
            if let Some(set) = self.successors.get_mut(&alias) {
                set.extend(outs);
            }
        }

        // Rewire the external successors; a successor whose table zeroes out
        // folds to constant false and its own successors join the worklist.
        while let Some(s) = work.pop() {
            let Some(gate) = self.gates.get_mut(&s) else {
                continue;
            };
            let old_inputs = gate.substitute(output_assoc);
            if gate.is_constant() {
                output_assoc.insert(s, None);
                redundant.insert(s);
                work.extend(self.successors_of(s));
                self.remove_gate_with_inputs(s, &old_inputs);
                unused_candidates.extend(old_inputs);
            }
        }

        self.update_outputs(output_assoc);
        unused_candidates.retain(|x| !self.inputs_set.contains(x));
        let mut unused = self.remove_unused_gates(unused_candidates);
        unused.extend(redundant);
        self.set_gate_levels()?;
        Ok(unused)
    }

    /// For every subcircuit output, the external successors that its
    /// replacement alias inherits. Constant replacements inherit nothing:
    /// the constant is substituted into the consumers instead.
    fn rewired_successors(
        &self,
        old_set: &FxHashSet<u32>,
        output_assoc: &FxHashMap<u32, Option<u32>>,
    ) -> FxHashMap<u32, FxHashSet<u32>> {
        let mut log: FxHashMap<u32, FxHashSet<u32>> = FxHashMap::default();
        for x in self.subcircuit_outputs(old_set) {
            let external: FxHashSet<u32> = self
                .successors_of(x)
                .filter(|s| !old_set.contains(s))
                .collect();
            match output_assoc.get(&x) {
                Some(Some(target)) => {
                    log.entry(*target).or_default().extend(external);
                }
                Some(None) => {}
                None => debug_assert!(false, "subcircuit output {x} missing from output_assoc"),
            }
        }
        log
    }

    fn insert_gates(&mut self, new_gates: Vec<Gate>) -> IrResult<()> {
        // Pre-create the successor entries so forward references between
        // new gates resolve regardless of insertion order.
        for g in &new_gates {
            self.successors.entry(g.alias).or_default();
        }
        for g in new_gates {
            self.add_gate(g.alias, g.inputs, g.table)?;
        }
        Ok(())
    }

    fn update_outputs(&mut self, output_assoc: &FxHashMap<u32, Option<u32>>) {
        for i in 0..self.primary_outputs.len() {
            let x = self.primary_outputs[i];
            match output_assoc.get(&x) {
                Some(Some(y)) => self.primary_outputs[i] = *y,
                Some(None) => {
                    let c = self.ensure_constant_alias(x);
                    self.primary_outputs[i] = c;
                }
                None => {}
            }
        }
        self.outputs_set = self.primary_outputs.iter().copied().collect();
    }

    /// Sweep dead gates: every non-output gate with no consumers is removed
    /// and its inputs become candidates in turn. Returns the removed set.
    fn remove_unused_gates(&mut self, candidates: FxHashSet<u32>) -> FxHashSet<u32> {
        let mut unused = FxHashSet::default();
        let mut work: Vec<u32> = candidates.into_iter().collect();
        while let Some(x) = work.pop() {
            if !self.gates.contains_key(&x) || self.is_primary_output(x) {
                continue;
            }
            if self.successor_count(x) == 0 {
                work.extend(
                    self.gate_inputs(x)
                        .iter()
                        .filter(|i| !self.inputs_set.contains(i)),
                );
                self.remove_gate(x);
                unused.insert(x);
            }
        }
        unused
    }

    // =========================================================================
    // Levels and topological order
    // =========================================================================

    /// Recompute the topological order and every gate level.
    pub fn set_gate_levels(&mut self) -> IrResult<()> {
        self.compute_topological_order()?;
        self.level = self.primary_inputs.iter().map(|&x| (x, 0)).collect();
        if let Some(c) = self.constant_alias {
            self.level.insert(c, 0);
        }
        for i in 0..self.topological_order.len() {
            let alias = self.topological_order[i];
            let Some(gate) = self.gates.get(&alias) else {
                continue;
            };
            if !gate.inputs.is_empty() {
                let lvl = gate
                    .inputs
                    .iter()
                    .map(|x| self.level.get(x).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                self.level.insert(alias, lvl + 1);
            }
        }
        Ok(())
    }

    /// Iterative DFS from the primary inputs through the successor index.
    ///
    /// The stack carries `(alias, children_processed)` markers; on the
    /// second visit the alias is prepended to the order. Re-entering a node
    /// that is on the active path is a cycle. Recursive DFS is deliberately
    /// avoided: circuit depth exceeds comfortable stack depth.
    fn compute_topological_order(&mut self) -> IrResult<()> {
        let n = self.gates.len();
        let mut order = vec![0u32; n];
        let mut order_index = n;
        let mut expanded: FxHashSet<u32> = FxHashSet::default();
        let mut visited: FxHashSet<u32> = FxHashSet::default();
        for pi_idx in 0..self.primary_inputs.len() {
            let pi = self.primary_inputs[pi_idx];
            let mut stack: Vec<(u32, bool)> = self
                .successors_of(pi)
                .filter(|x| !expanded.contains(x))
                .map(|x| (x, false))
                .collect();
            while let Some((alias, children_processed)) = stack.pop() {
                if expanded.contains(&alias) {
                    continue;
                }
                if children_processed {
                    order_index -= 1;
                    order[order_index] = alias;
                    expanded.insert(alias);
                } else {
                    if !visited.insert(alias) {
                        // Re-expansion of a node on the current DFS path.
                        return Err(IrError::CycleDetected);
                    }
                    stack.push((alias, true));
                    stack.extend(
                        self.successors_of(alias)
                            .filter(|x| !expanded.contains(x))
                            .map(|x| (x, false)),
                    );
                }
            }
        }
        if expanded.len() != n {
            // Only the constant gate is unreachable from the primary inputs.
            match self.constant_alias {
                Some(c) if expanded.len() == n - 1 && !expanded.contains(&c) => {
                    order[0] = c;
                }
                _ => return Err(IrError::CycleDetected),
            }
        }
        self.topological_order = order;
        Ok(())
    }

    // =========================================================================
    // Outputs and negation flags
    // =========================================================================

    /// Mark every output position referencing `alias` as negated.
    pub fn negate_output(&mut self, alias: u32) {
        for (i, &out) in self.primary_outputs.iter().enumerate() {
            if out == alias {
                self.negated_outputs.set(i, true);
            }
        }
    }

    /// Set the negation flag of a single output position.
    pub fn set_output_negated(&mut self, idx: usize, negated: bool) {
        self.negated_outputs.set(idx, negated);
    }

    /// Flip the negation flag of every output position referencing `alias`.
    pub fn toggle_output_negation(&mut self, alias: u32) {
        for (i, &out) in self.primary_outputs.iter().enumerate() {
            if out == alias {
                let v = self.negated_outputs[i];
                self.negated_outputs.set(i, !v);
            }
        }
    }

    /// Partition the outputs for the writers: aliases emitted only negated,
    /// and aliases needed in both polarities.
    pub fn outputs_to_negate(&self) -> (FxHashSet<u32>, FxHashSet<u32>) {
        let mut positive = FxHashSet::default();
        let mut negative = FxHashSet::default();
        for (idx, &out) in self.primary_outputs.iter().enumerate() {
            if self.negated_outputs[idx] {
                negative.insert(out);
            } else {
                positive.insert(out);
            }
        }
        let both: FxHashSet<u32> = negative.intersection(&positive).copied().collect();
        negative.retain(|x| !positive.contains(x));
        (negative, both)
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Evaluate the circuit on one input assignment (in primary-input list
    /// order) and return the output values, negation flags applied.
    pub fn evaluate(&self, values: &[bool]) -> IrResult<Vec<bool>> {
        if values.len() != self.primary_inputs.len() {
            return Err(IrError::InputCountMismatch {
                expected: self.primary_inputs.len(),
                got: values.len(),
            });
        }
        let mut val: FxHashMap<u32, bool> = self
            .primary_inputs
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect();
        for &alias in &self.topological_order {
            let Some(gate) = self.gates.get(&alias) else {
                continue;
            };
            let idx = gate.inputs.iter().fold(0usize, |acc, x| {
                acc << 1 | usize::from(val.get(x).copied().unwrap_or(false))
            });
            val.insert(alias, gate.table.get(idx));
        }
        Ok(self
            .primary_outputs
            .iter()
            .enumerate()
            .map(|(i, o)| val.get(o).copied().unwrap_or(false) ^ self.negated_outputs[i])
            .collect())
    }

    // =========================================================================
    // Integrity
    // =========================================================================

    /// Verify the structural invariants. Intended for tests and post-mortem
    /// checks; every public mutation must leave the circuit in a state where
    /// this succeeds.
    pub fn verify_integrity(&self) -> IrResult<()> {
        let mut constants = 0usize;
        for gate in self.gates.values() {
            if gate.table.len() != 1 << gate.inputs.len() {
                return Err(IrError::TableArityMismatch {
                    alias: gate.alias,
                    arity: gate.inputs.len(),
                    table_len: gate.table.len(),
                });
            }
            if !gate.table.is_normalised() {
                return Err(IrError::DenormalisedTable(gate.alias));
            }
            if gate.is_constant() {
                constants += 1;
                if self.constant_alias != Some(gate.alias) {
                    return Err(IrError::DuplicateGate(gate.alias));
                }
            }
            for &x in &gate.inputs {
                if !self.inputs_set.contains(&x) && !self.gates.contains_key(&x) {
                    return Err(IrError::UndefinedAlias {
                        alias: x,
                        referent: gate.alias,
                    });
                }
                if !self.successors.get(&x).is_some_and(|s| s.contains(&gate.alias)) {
                    return Err(IrError::UndefinedAlias {
                        alias: x,
                        referent: gate.alias,
                    });
                }
                if self.level(x) >= self.level(gate.alias) {
                    return Err(IrError::CycleDetected);
                }
            }
        }
        if constants > 1 {
            return Err(IrError::CycleDetected);
        }
        for (&alias, set) in &self.successors {
            for &s in set {
                if !self.gates.get(&s).is_some_and(|g| g.inputs.contains(&alias)) {
                    return Err(IrError::UndefinedAlias { alias, referent: s });
                }
            }
        }
        for gate in self.gates.values() {
            if !self.is_primary_output(gate.alias) && self.successor_count(gate.alias) == 0 {
                return Err(IrError::UndefinedAlias {
                    alias: gate.alias,
                    referent: gate.alias,
                });
            }
        }
        if self.topological_order.len() != self.gates.len() {
            return Err(IrError::CycleDetected);
        }
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        for &alias in &self.topological_order {
            let Some(gate) = self.gates.get(&alias) else {
                return Err(IrError::CycleDetected);
            };
            for &x in &gate.inputs {
                if self.gates.contains_key(&x) && !seen.contains(&x) {
                    return Err(IrError::CycleDetected);
                }
            }
            seen.insert(alias);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and_table() -> TruthTable {
        TruthTable::from_rows(&[false, false, false, true])
    }

    fn or_table() -> TruthTable {
        TruthTable::from_rows(&[false, true, true, true])
    }

    fn xor_table() -> TruthTable {
        TruthTable::from_rows(&[false, true, true, false])
    }

    /// and3 over PIs 1..3 split into two 2-input ANDs 10 and 11.
    fn and3_circuit() -> Circuit {
        let mut c = Circuit::new(vec![1, 2, 3], vec![11]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![10, 3], and_table()).unwrap();
        c.init(true).unwrap();
        c
    }

    #[test]
    fn test_build_and_levels() {
        let c = and3_circuit();
        assert_eq!(c.gate_count(), 2);
        assert_eq!(c.level(10), 1);
        assert_eq!(c.level(11), 2);
        assert_eq!(c.depth(), 2);
        c.verify_integrity().unwrap();
    }

    #[test]
    fn test_topological_order() {
        let c = and3_circuit();
        let order = c.topological_order();
        let pos10 = order.iter().position(|&x| x == 10).unwrap();
        let pos11 = order.iter().position(|&x| x == 11).unwrap();
        assert!(pos10 < pos11);
    }

    #[test]
    fn test_cycle_detected() {
        let mut c = Circuit::new(vec![1], vec![10]);
        c.add_gate_unsorted(10, vec![1, 11], and_table()).unwrap();
        c.add_gate_unsorted(11, vec![10], TruthTable::from_rows(&[false, true]))
            .unwrap();
        assert!(matches!(c.init(false), Err(IrError::CycleDetected)));
    }

    #[test]
    fn test_undefined_alias() {
        let mut c = Circuit::new(vec![1], vec![10]);
        c.add_gate_unsorted(10, vec![1, 99], and_table()).unwrap();
        assert!(matches!(
            c.init(false),
            Err(IrError::UndefinedAlias { alias: 99, .. })
        ));
    }

    #[test]
    fn test_evaluate_and3() {
        let c = and3_circuit();
        for i in 0..8usize {
            let values: Vec<bool> = crate::table::bit_seq(i, 3).collect();
            let out = c.evaluate(&values).unwrap();
            assert_eq!(out, vec![i == 7]);
        }
    }

    #[test]
    fn test_dead_gate_sweep_at_init() {
        let mut c = Circuit::new(vec![1, 2], vec![10]);
        c.add_gate_unsorted(10, vec![1, 2], and_table()).unwrap();
        // 11 feeds nothing and is not an output.
        c.add_gate_unsorted(11, vec![1, 2], or_table()).unwrap();
        c.init(false).unwrap();
        assert_eq!(c.gate_count(), 1);
        assert!(c.gate(11).is_none());
        c.verify_integrity().unwrap();
    }

    #[test]
    fn test_constant_folding_cascades_to_output() {
        // 10 is constant false; 11 = and(10, 1) collapses; 12 = or(11, 2)
        // reduces to the projection of 2.
        let mut c = Circuit::new(vec![1, 2], vec![12]);
        c.add_gate_unsorted(10, vec![], TruthTable::constant_false())
            .unwrap();
        c.add_gate_unsorted(11, vec![10, 1], and_table()).unwrap();
        c.add_gate_unsorted(12, vec![11, 2], or_table()).unwrap();
        c.init(false).unwrap();
        c.verify_integrity().unwrap();
        assert!(c.gate(10).is_none());
        assert!(c.gate(11).is_none());
        let g12 = c.gate(12).unwrap();
        assert_eq!(g12.inputs, vec![2]);
        assert_eq!(g12.projection_on(), Some(0));
        assert_eq!(c.evaluate(&[true, false]).unwrap(), vec![false]);
        assert_eq!(c.evaluate(&[false, true]).unwrap(), vec![true]);
    }

    #[test]
    fn test_constant_output_keeps_polarity() {
        // The all-false gate 10 is the only output; after folding the
        // circuit is a single constant gate exported as the output.
        let mut c = Circuit::new(vec![1], vec![10, 10]);
        c.add_gate_unsorted(10, vec![], TruthTable::constant_false())
            .unwrap();
        c.negate_output(10);
        c.init(false).unwrap();
        assert_eq!(c.gate_count(), 1);
        let constant = c.constant_alias().unwrap();
        assert_eq!(c.outputs(), &[constant, constant]);
        assert_eq!(c.evaluate(&[false]).unwrap(), vec![true, true]);
        c.verify_integrity().unwrap();
    }

    #[test]
    fn test_subcircuit_io() {
        let c = and3_circuit();
        let set: FxHashSet<u32> = [10, 11].into_iter().collect();
        assert_eq!(c.subcircuit_inputs(&set), vec![1, 2, 3]);
        assert_eq!(c.subcircuit_outputs(&set), vec![11]);
        let set: FxHashSet<u32> = [10].into_iter().collect();
        assert_eq!(c.subcircuit_inputs(&set), vec![1, 2]);
        assert_eq!(c.subcircuit_outputs(&set), vec![10]);
    }

    /// g2 and g3 form a subcircuit whose input g4 depends on output g2
    /// outside the subcircuit: (g2, g4) is a feedback pair.
    fn feedback_circuit() -> Circuit {
        let mut c = Circuit::new(vec![1, 2], vec![5]);
        c.add_gate(3, vec![1, 2], xor_table()).unwrap(); // g2 in the scenario
        c.add_gate(4, vec![3, 2], and_table()).unwrap(); // outside path
        c.add_gate(5, vec![3, 4], or_table()).unwrap(); // consumes both
        c.init(true).unwrap();
        c
    }

    #[test]
    fn test_potential_cycles() {
        let c = feedback_circuit();
        // Replace {5} extended with 3: subcircuit {3, 5}, inputs {1, 2, 4},
        // outputs {3, 5}; 4 is reachable from 3 outside the set.
        let internal: FxHashSet<u32> = [3, 5].into_iter().collect();
        let inputs = c.subcircuit_inputs(&internal);
        let outputs = c.subcircuit_outputs(&internal);
        assert_eq!(inputs, vec![1, 2, 4]);
        assert_eq!(outputs, vec![3, 5]);
        let pairs = c.potential_cycles(&inputs, &outputs, &internal);
        assert_eq!(pairs, vec![(3, 4)]);
    }

    #[test]
    fn test_replace_subcircuit_same_function() {
        // Replace the two ANDs with two fresh ANDs computing the same thing.
        let mut c = and3_circuit();
        let new_gates = vec![
            Gate::new(20, vec![2, 3], and_table()),
            Gate::new(21, vec![1, 20], and_table()),
        ];
        let mut assoc = FxHashMap::default();
        assoc.insert(11, Some(21));
        let removed = c
            .replace_subcircuit(&[10, 11], new_gates, &mut assoc)
            .unwrap();
        assert_eq!(removed.len(), 0);
        assert_eq!(c.gate_count(), 2);
        assert_eq!(c.outputs(), &[21]);
        c.verify_integrity().unwrap();
        for i in 0..8usize {
            let values: Vec<bool> = crate::table::bit_seq(i, 3).collect();
            assert_eq!(c.evaluate(&values).unwrap(), vec![i == 7]);
        }
    }

    #[test]
    fn test_replace_subcircuit_wire_through() {
        // xor(a, b) and and(xor, b) replaced by a single gate wired so that
        // the removed xor's external consumer is rewired onto the new gate.
        let mut c = Circuit::new(vec![1, 2], vec![11]);
        c.add_gate(10, vec![1, 2], or_table()).unwrap();
        c.add_gate(11, vec![10, 2], and_table()).unwrap();
        c.init(true).unwrap();
        // or(a, b) & b == b: replace both gates, wiring the output straight
        // to input 2.
        let mut assoc = FxHashMap::default();
        assoc.insert(11, Some(2));
        let removed = c.replace_subcircuit(&[10, 11], vec![], &mut assoc).unwrap();
        assert_eq!(removed.len(), 0);
        assert_eq!(c.gate_count(), 0);
        assert_eq!(c.outputs(), &[2]);
        c.verify_integrity().unwrap();
        assert_eq!(c.evaluate(&[true, false]).unwrap(), vec![false]);
        assert_eq!(c.evaluate(&[false, true]).unwrap(), vec![true]);
    }

    #[test]
    fn test_replace_subcircuit_constant_output() {
        // and(a, b) replaced by constant false; its consumer or(10, 2)
        // reduces to the projection of 2.
        let mut c = Circuit::new(vec![1, 2], vec![11]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![10, 2], or_table()).unwrap();
        c.init(true).unwrap();
        let mut assoc = FxHashMap::default();
        assoc.insert(10, None);
        c.replace_subcircuit(&[10], vec![], &mut assoc).unwrap();
        c.verify_integrity().unwrap();
        let g11 = c.gate(11).unwrap();
        assert_eq!(g11.inputs, vec![2]);
        assert_eq!(c.evaluate(&[true, false]).unwrap(), vec![false]);
        assert_eq!(c.evaluate(&[true, true]).unwrap(), vec![true]);
    }

    #[test]
    fn test_replace_subcircuit_collapse_cascade() {
        // and(a, b) -> 10; and(10, c) -> 11 (output). Replacing 10 by the
        // constant collapses 11 too; the output becomes the constant gate.
        let mut c = Circuit::new(vec![1, 2, 3], vec![11]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![10, 3], and_table()).unwrap();
        c.init(true).unwrap();
        let mut assoc = FxHashMap::default();
        assoc.insert(10, None);
        let removed = c.replace_subcircuit(&[10], vec![], &mut assoc).unwrap();
        assert!(removed.contains(&11));
        c.verify_integrity().unwrap();
        let constant = c.constant_alias().unwrap();
        assert_eq!(c.outputs(), &[constant]);
        assert_eq!(c.evaluate(&[true, true, true]).unwrap(), vec![false]);
    }

    #[test]
    fn test_replace_keeps_po_gate_alive() {
        // A new gate serving a primary output survives the dead-gate sweep
        // even when its only gate consumer collapses.
        let mut c = Circuit::new(vec![1, 2], vec![10, 11]);
        c.add_gate(10, vec![1, 2], xor_table()).unwrap();
        c.add_gate(11, vec![10, 1], and_table()).unwrap();
        c.init(true).unwrap();
        // Replace {10, 11}: 10 -> new gate 20, 11 -> constant.
        let new_gates = vec![Gate::new(20, vec![1, 2], xor_table())];
        let mut assoc = FxHashMap::default();
        assoc.insert(10, Some(20));
        assoc.insert(11, None);
        c.replace_subcircuit(&[10, 11], new_gates, &mut assoc).unwrap();
        c.verify_integrity().unwrap();
        assert!(c.gate(20).is_some());
        let constant = c.constant_alias().unwrap();
        assert_eq!(c.outputs(), &[20, constant]);
        assert_eq!(c.evaluate(&[true, false]).unwrap(), vec![true, false]);
    }
}
