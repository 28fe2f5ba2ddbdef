//! Randomised invariant checks for circuit construction and splicing.

use alsvid_ir::{Circuit, Gate, TruthTable};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

/// A random normalised table for the given arity.
fn arb_table(arity: usize) -> impl Strategy<Value = TruthTable> {
    prop::collection::vec(any::<bool>(), 1 << arity).prop_map(|mut rows| {
        rows[0] = false;
        TruthTable::from_rows(&rows)
    })
}

/// A random layered circuit: `n_pi` inputs, `n_gates` two-input gates, each
/// reading two earlier aliases, the last gate exported as the output.
fn arb_circuit(n_pi: usize, n_gates: usize) -> impl Strategy<Value = Circuit> {
    let picks = prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), n_gates);
    let tables = prop::collection::vec(arb_table(2), n_gates);
    (picks, tables).prop_map(move |(picks, tables)| {
        let pis: Vec<u32> = (1..=n_pi as u32).collect();
        let first_gate = n_pi as u32 + 1;
        let last = first_gate + n_gates as u32 - 1;
        let mut circuit = Circuit::new(pis, vec![last]);
        for (i, ((a, b), table)) in picks.into_iter().zip(tables).enumerate() {
            let alias = first_gate + i as u32;
            let pool: Vec<u32> = (1..alias).collect();
            let ia = pool[a.index(pool.len())];
            let ib = pool[b.index(pool.len())];
            circuit
                .add_gate_unsorted(alias, vec![ia, ib], table)
                .unwrap();
        }
        circuit.init(false).unwrap();
        circuit
    })
}

proptest! {
    #[test]
    fn init_establishes_invariants(circuit in arb_circuit(4, 12)) {
        circuit.verify_integrity().unwrap();
    }

    /// Splicing a single gate out with an identical fresh gate preserves
    /// the outputs on every input assignment.
    #[test]
    fn identity_splice_preserves_semantics(circuit in arb_circuit(4, 12)) {
        let mut aliases: Vec<u32> = circuit.gate_aliases().collect();
        aliases.sort_unstable();
        prop_assume!(!aliases.is_empty());
        let victim = aliases[aliases.len() / 2];
        let old = circuit.gate(victim).unwrap().clone();
        prop_assume!(!old.is_constant());

        let before: Vec<Vec<bool>> = (0..16usize)
            .map(|i| {
                let values: Vec<bool> = alsvid_ir::bit_seq(i, 4).collect();
                circuit.evaluate(&values).unwrap()
            })
            .collect();

        let mut spliced = circuit.clone();
        let fresh = spliced.max_alias() + 1;
        let replacement = Gate::new(fresh, old.inputs.clone(), old.table.clone());
        let mut assoc = FxHashMap::default();
        assoc.insert(victim, Some(fresh));
        spliced
            .replace_subcircuit(&[victim], vec![replacement], &mut assoc)
            .unwrap();
        spliced.verify_integrity().unwrap();

        for (i, expected) in before.iter().enumerate() {
            let values: Vec<bool> = alsvid_ir::bit_seq(i, 4).collect();
            prop_assert_eq!(&spliced.evaluate(&values).unwrap(), expected);
        }
    }
}
