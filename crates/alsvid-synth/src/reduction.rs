//! The randomised, taboo-guided reduction loop.
//!
//! Each iteration picks a random non-taboo root gate, grows a subcircuit
//! around it with the configured strategy, and hands the result to the
//! synthesiser. Successful replacements free their aliases from the taboo
//! list; timeouts shrink the subcircuit size until a size is validated, and
//! consistently fast SAT checks grow it again.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rand::Rng;
use rand::rngs::StdRng;
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::{debug, info, trace, warn};

use alsvid_ir::Circuit;

use crate::config::{Config, SearchStrategy};
use crate::error::SynthResult;
use crate::synthesiser::{ReduceOutcome, Synthesiser};

/// Stop conditions of one reduction run.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    /// Wall-clock limit.
    pub time: Duration,
    /// Iteration limit, if any.
    pub iterations: Option<u64>,
}

/// One run of the reduction loop over a circuit.
pub struct Reduction<'a> {
    cfg: &'a Config,
    synth: Synthesiser<'a>,
    /// Alias -> iteration of insertion; insertion order drives eviction.
    taboo: IndexMap<u32, u64, FxBuildHasher>,
    subcircuit_size: usize,
    size_validated: bool,
    last_validated: Option<usize>,
    check_for_larger: bool,
    start: Instant,
    selection_time: Duration,
    single_output_replacements: u64,
    single_output_reductions: u64,
    multi_output_replacements: u64,
    multi_output_reductions: u64,
}

impl<'a> Reduction<'a> {
    /// Create a run with a fresh synthesiser and taboo list.
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            synth: Synthesiser::new(cfg),
            taboo: IndexMap::default(),
            subcircuit_size: cfg.initial_subcircuit_size,
            size_validated: false,
            last_validated: None,
            check_for_larger: true,
            start: Instant::now(),
            selection_time: Duration::ZERO,
            single_output_replacements: 0,
            single_output_reductions: 0,
            multi_output_replacements: 0,
            multi_output_reductions: 0,
        }
    }

    /// The synthesiser of this run, for statistics.
    pub fn synthesiser(&self) -> &Synthesiser<'a> {
        &self.synth
    }

    /// Run the loop until a budget is exhausted, no non-taboo roots remain,
    /// or the subcircuit size cannot be reduced further.
    pub fn run(
        &mut self,
        circuit: &mut Circuit,
        budget: &Budget,
        rng: &mut StdRng,
    ) -> SynthResult<()> {
        self.start = Instant::now();
        if circuit.gate_count() < self.cfg.gate_inputs {
            return Ok(());
        }
        let mut counter: u64 = 0;
        let mut intermediate_counter: u64 = 0;
        loop {
            if let Some(limit) = budget.iterations {
                if counter >= limit {
                    info!(iterations = counter, "iteration budget used up");
                    return Ok(());
                }
            }
            if self.start.elapsed() > budget.time {
                info!(iterations = counter, "time budget used up");
                return Ok(());
            }
            counter += 1;

            // Subcircuits of size 1 cannot be reduced; taboo their root and
            // retry until a real subcircuit or nothing is left.
            let selection_start = Instant::now();
            let (root, to_replace) = loop {
                let Some(root) = self.random_gate(circuit, rng) else {
                    info!("too many subcircuits of size 1; further reduction is unlikely");
                    return Ok(());
                };
                let to_replace = self.grow_subcircuit(circuit, root);
                if to_replace.len() == 1 {
                    self.taboo.insert(root, counter);
                } else {
                    break (root, to_replace);
                }
            };
            self.selection_time += selection_start.elapsed();

            // Until a size is validated, keep require_reduction off: the
            // SAT probe at the current size is what calibrates the timeout.
            let require_reduction = self.cfg.require_reduction && self.size_validated;
            let outcome = self.synth.reduce(circuit, &to_replace, require_reduction)?;
            let new_size = match &outcome {
                ReduceOutcome::Replaced(info) => Some(info.new_size),
                _ => None,
            };
            debug!(
                iteration = counter,
                root,
                old_size = to_replace.len(),
                ?new_size,
                "subcircuit attempt"
            );

            match &outcome {
                ReduceOutcome::Timeout if !self.size_validated => {
                    match self.last_validated {
                        None => {
                            self.subcircuit_size -= 1;
                            if self.subcircuit_size < 2 {
                                warn!(
                                    "the encoding for a subcircuit with 2 gates could not be \
                                     solved within the given timeout"
                                );
                                warn!(
                                    "restart with a longer timeout; if it was already \
                                     reasonably long the specification may be too hard"
                                );
                                return Ok(());
                            }
                        }
                        Some(validated) => {
                            self.subcircuit_size = validated;
                            self.size_validated = true;
                        }
                    }
                    self.check_for_larger = false;
                    info!(
                        size = self.subcircuit_size,
                        "QBF call takes too long; decreasing the subcircuit size"
                    );
                }
                ReduceOutcome::Replaced(_)
                    if !self.size_validated && self.subcircuit_size == to_replace.len() =>
                {
                    self.size_validated = true;
                    self.last_validated = Some(self.subcircuit_size);
                }
                _ => {}
            }

            if self.check_for_larger && counter % self.cfg.check_subcircuit_size_interval == 0 {
                if let Some((mean, samples)) = self.synth.timer().sat_stats(self.subcircuit_size) {
                    if samples > self.cfg.subcircuit_size_increase_samples
                        && mean.as_secs_f64() < self.cfg.subcircuit_size_increase_limit
                    {
                        self.subcircuit_size += 1;
                        self.size_validated = false;
                        info!(
                            size = self.subcircuit_size,
                            "QBF calls are fast; increasing the subcircuit size"
                        );
                    }
                }
            }

            if let ReduceOutcome::Replaced(info) = outcome {
                let reduced = info.gate_names.len() < to_replace.len();
                if info.output_assoc.len() == 1 {
                    self.single_output_replacements += 1;
                    self.single_output_reductions += u64::from(reduced);
                } else {
                    self.multi_output_replacements += 1;
                    self.multi_output_reductions += u64::from(reduced);
                }

                for g in &to_replace {
                    self.taboo.shift_remove(g);
                }
                for g in &info.removed {
                    self.taboo.shift_remove(g);
                }

                if circuit.gate_count() == 0 {
                    info!("no gates left");
                    return Ok(());
                }

                if self.cfg.use_taboo_list {
                    match info.output_assoc.get(&root) {
                        None => warn!(root, "root gate not in the output association"),
                        Some(Some(representation)) => {
                            self.taboo.insert(*representation, counter);
                        }
                        Some(None) => {}
                    }
                }

                self.log_snapshot(circuit, counter, &mut intermediate_counter)?;
            }

            if self.cfg.use_taboo_list {
                self.taboo.insert(root, counter);
                while !self.taboo.is_empty()
                    && self.taboo.len() as f64
                        >= self.cfg.taboo_ratio * circuit.gate_count() as f64
                {
                    self.taboo.shift_remove_index(0);
                }
            }
            trace!(iteration = counter, gates = circuit.gate_count());
        }
    }

    /// Print the per-run counters.
    pub fn print_statistics(&self) {
        println!(
            "Time subcircuit selection: {:.3}s",
            self.selection_time.as_secs_f64()
        );
        self.synth.print_statistics();
        println!(
            "Single output subcircuits: replacements: {}; reductions: {}",
            self.single_output_replacements, self.single_output_reductions
        );
        println!(
            "Multiple output subcircuits: replacements: {}; reductions: {}",
            self.multi_output_replacements, self.multi_output_reductions
        );
    }

    fn log_snapshot(
        &self,
        circuit: &Circuit,
        counter: u64,
        intermediate_counter: &mut u64,
    ) -> SynthResult<()> {
        let Some(dir) = &self.cfg.specification_log_dir else {
            return Ok(());
        };
        if let Some(steps) = self.cfg.log_time_steps {
            if self.start.elapsed().as_secs() / steps > *intermediate_counter {
                let path = dir.join(format!("spec_it_{counter}.blif"));
                alsvid_io::write_blif_file(&path, circuit, "spec")?;
                info!(?path, elapsed = ?self.start.elapsed(), "intermediate result written");
                *intermediate_counter += 1;
            }
        } else if let Some(steps) = self.cfg.log_iteration_steps {
            if counter % steps == 0 {
                let path = dir.join(format!("spec_it_{counter}.blif"));
                alsvid_io::write_blif_file(&path, circuit, "spec")?;
            }
        }
        Ok(())
    }

    /// A uniformly random gate outside the taboo list.
    fn random_gate(&self, circuit: &Circuit, rng: &mut StdRng) -> Option<u32> {
        let mut pool: Vec<u32> = circuit
            .gate_aliases()
            .filter(|a| !self.taboo.contains_key(a))
            .collect();
        if pool.is_empty() {
            return None;
        }
        pool.sort_unstable();
        Some(pool[rng.gen_range(0..pool.len())])
    }

    fn grow_subcircuit(&self, circuit: &Circuit, root: u32) -> Vec<u32> {
        match self.cfg.search_strategy {
            SearchStrategy::OutputReduction => {
                output_reduction(circuit, root, self.subcircuit_size)
            }
            SearchStrategy::SingleOutput => {
                single_output_expansion(circuit, root, self.subcircuit_size)
            }
        }
    }
}

/// Grow a subcircuit by repeatedly absorbing the frontier gate (the inputs
/// of the current set) that leaves the fewest subcircuit outputs, breaking
/// ties on fewest new inputs, then on lowest level. The root is the first
/// element of the result.
fn output_reduction(circuit: &Circuit, root: u32, size: usize) -> Vec<u32> {
    let mut selected: FxHashSet<u32> = FxHashSet::default();
    let mut frontier: std::collections::BTreeSet<u32> = [root].into();
    let mut covered_outputs: FxHashSet<u32> = FxHashSet::default();

    while !frontier.is_empty() && selected.len() < size {
        let mut best: Option<(u32, (usize, usize, u32))> = None;
        for &gate in &frontier {
            let mut nof_outputs = circuit
                .successors_of(gate)
                .filter(|s| !selected.contains(s))
                .count();
            if circuit.is_primary_output(gate) {
                nof_outputs += 1;
            }
            if covered_outputs.contains(&gate) {
                nof_outputs = nof_outputs.saturating_sub(1);
            }
            let nof_inputs = circuit
                .gate_inputs(gate)
                .iter()
                .filter(|x| !selected.contains(x))
                .count();
            let key = (nof_outputs, nof_inputs, circuit.level(gate));
            if best.is_none_or(|(_, best_key)| key < best_key) {
                best = Some((gate, key));
            }
        }
        let Some((gate, _)) = best else { break };
        frontier.remove(&gate);
        covered_outputs.extend(
            circuit
                .successors_of(gate)
                .filter(|s| !selected.contains(s)),
        );
        selected.insert(gate);
        frontier.extend(
            circuit
                .gate_inputs(gate)
                .iter()
                .filter(|&&x| !circuit.is_primary_input(x) && !selected.contains(&x)),
        );
    }

    with_root_first(root, selected)
}

/// Expand toward the root's inputs, adding only gates whose consumers all
/// already belong to the set, so the result has a single output.
fn single_output_expansion(circuit: &Circuit, root: u32, size: usize) -> Vec<u32> {
    let mut selected: FxHashSet<u32> = [root].into_iter().collect();
    let mut frontier: std::collections::BTreeSet<u32> = circuit
        .gate_inputs(root)
        .iter()
        .filter(|&&x| !circuit.is_primary_input(x))
        .copied()
        .collect();

    while !frontier.is_empty() && selected.len() < size {
        let found = frontier
            .iter()
            .copied()
            .find(|&g| circuit.successors_of(g).all(|s| selected.contains(&s)));
        let Some(gate) = found else { break };
        frontier.remove(&gate);
        selected.insert(gate);
        frontier.extend(
            circuit
                .gate_inputs(gate)
                .iter()
                .filter(|&&x| !circuit.is_primary_input(x) && !selected.contains(&x)),
        );
    }

    with_root_first(root, selected)
}

fn with_root_first(root: u32, mut selected: FxHashSet<u32>) -> Vec<u32> {
    selected.remove(&root);
    let mut rest: Vec<u32> = selected.into_iter().collect();
    rest.sort_unstable();
    let mut result = vec![root];
    result.extend(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::TruthTable;

    fn and_table() -> TruthTable {
        TruthTable::from_rows(&[false, false, false, true])
    }

    /// A two-level AND tree: 10 = and(1, 2), 11 = and(3, 4),
    /// 12 = and(10, 11) as the only output.
    fn tree_circuit() -> Circuit {
        let mut c = Circuit::new(vec![1, 2, 3, 4], vec![12]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![3, 4], and_table()).unwrap();
        c.add_gate(12, vec![10, 11], and_table()).unwrap();
        c.init(true).unwrap();
        c
    }

    #[test]
    fn test_output_reduction_grows_whole_tree() {
        let c = tree_circuit();
        let sub = output_reduction(&c, 12, 3);
        assert_eq!(sub[0], 12);
        let set: FxHashSet<u32> = sub.iter().copied().collect();
        assert_eq!(set, [10, 11, 12].into_iter().collect());
    }

    #[test]
    fn test_output_reduction_respects_size() {
        let c = tree_circuit();
        let sub = output_reduction(&c, 12, 2);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub[0], 12);
    }

    #[test]
    fn test_output_reduction_from_leaf() {
        // Growing from 10: after absorbing 10 the frontier is empty (its
        // inputs are primary), so the subcircuit stays size 1.
        let c = tree_circuit();
        let sub = output_reduction(&c, 10, 3);
        assert_eq!(sub, vec![10]);
    }

    #[test]
    fn test_single_output_expansion() {
        let c = tree_circuit();
        let sub = single_output_expansion(&c, 12, 3);
        let set: FxHashSet<u32> = sub.iter().copied().collect();
        assert_eq!(set, [10, 11, 12].into_iter().collect());
    }

    #[test]
    fn test_single_output_expansion_blocked_by_external_consumer() {
        // 10 feeds both 12 and an extra output gate 13, so expanding from
        // 12 may not absorb 10.
        let mut c = Circuit::new(vec![1, 2, 3, 4], vec![12, 13]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![3, 4], and_table()).unwrap();
        c.add_gate(12, vec![10, 11], and_table()).unwrap();
        c.add_gate(13, vec![10, 3], and_table()).unwrap();
        c.init(true).unwrap();
        let sub = single_output_expansion(&c, 12, 4);
        let set: FxHashSet<u32> = sub.iter().copied().collect();
        assert_eq!(set, [11, 12].into_iter().collect());
    }

    #[test]
    fn test_taboo_eviction_order() {
        let cfg = Config::default();
        let mut red = Reduction::new(&cfg);
        red.taboo.insert(1, 1);
        red.taboo.insert(2, 2);
        red.taboo.insert(3, 3);
        // Re-inserting an existing key keeps its position.
        red.taboo.insert(1, 4);
        red.taboo.shift_remove_index(0);
        assert!(!red.taboo.contains_key(&1));
        assert_eq!(red.taboo.len(), 2);
        red.taboo.shift_remove_index(0);
        assert!(!red.taboo.contains_key(&2));
    }
}
