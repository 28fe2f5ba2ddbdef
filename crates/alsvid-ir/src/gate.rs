//! A single Boolean gate: ordered input aliases and a truth table.

use rustc_hash::FxHashMap;

use crate::table::{TruthTable, bit_seq};

/// Two-level form of a gate over signed input literals, used by the QBF
/// encoders: either an OR of AND rows (one row per true table entry) or an
/// AND of OR rows (one row per false entry), whichever needs fewer rows.
/// Ties go to the sum-of-products form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover {
    /// The gate is the disjunction of the conjunction rows. No rows means
    /// constant false.
    SumOfProducts(Vec<Vec<i64>>),
    /// The gate is the conjunction of the disjunction rows. No rows means
    /// constant true.
    ProductOfSums(Vec<Vec<i64>>),
}

/// One Boolean function node of a circuit.
///
/// Invariants: the table has `2^k` rows for `k` inputs and is normalised
/// (false on the all-false row). A gate with no inputs is the constant
/// false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    /// Stable identifier, unique within one circuit.
    pub alias: u32,
    /// Ordered input aliases; the first is the table's most significant bit.
    pub inputs: Vec<u32>,
    /// Output value per input combination.
    pub table: TruthTable,
}

impl Gate {
    /// Create a gate. The caller guarantees the §invariants; the circuit
    /// re-checks them on insertion.
    pub fn new(alias: u32, inputs: Vec<u32>, table: TruthTable) -> Self {
        Self {
            alias,
            inputs,
            table,
        }
    }

    /// The constant-false gate under the given alias.
    pub fn constant(alias: u32) -> Self {
        Self {
            alias,
            inputs: vec![],
            table: TruthTable::constant_false(),
        }
    }

    /// True iff the gate is the constant false (no inputs).
    pub fn is_constant(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Rename inputs in place. A renaming value of `None` marks an input
    /// that became constant false: it is removed via cofactor reduction.
    /// If the table zeroes out the gate collapses to the constant shape.
    ///
    /// Returns the renamed input list (removed inputs excluded) so the
    /// caller can update the successor index.
    pub fn substitute(&mut self, renaming: &FxHashMap<u32, Option<u32>>) -> Vec<u32> {
        let removed: Vec<usize> = self
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, x)| matches!(renaming.get(x), Some(None)))
            .map(|(idx, _)| idx)
            .collect();
        let renamed: Vec<u32> = self
            .inputs
            .iter()
            .filter_map(|x| match renaming.get(x) {
                Some(None) => None,
                Some(Some(y)) => Some(*y),
                None => Some(*x),
            })
            .collect();
        let arity = self.inputs.len();
        if !removed.is_empty() {
            // Positions are ascending, so reducing against the original
            // arity stays correct as the table shrinks.
            for &pos in &removed {
                self.table = self.table.cofactor_remove(pos, arity);
            }
            if self.table.is_zero() {
                self.inputs.clear();
                self.table = TruthTable::constant_false();
                return renamed;
            }
        }
        if !self.inputs.is_empty() {
            self.inputs = renamed.clone();
        }
        renamed
    }

    /// If the gate projects one of its inputs, the index of that input.
    ///
    /// A normalised single-input gate is either the constant false (already
    /// collapsed) or the projection of its input. With wider gates this is
    /// sufficient but not necessary.
    pub fn projection_on(&self) -> Option<usize> {
        if self.inputs.len() == 1 && self.table.get(1) {
            Some(0)
        } else {
            None
        }
    }

    /// The two-level form of the gate over its own input aliases.
    pub fn cover(&self) -> Cover {
        let names: Vec<i64> = self.inputs.iter().map(|&x| i64::from(x)).collect();
        self.cover_named(&names)
    }

    /// The two-level form over caller-supplied literals standing in for the
    /// inputs, in input-list order.
    pub fn cover_named(&self, names: &[i64]) -> Cover {
        debug_assert_eq!(names.len(), self.inputs.len());
        let sum_of_products = 2 * self.table.count_ones() <= self.table.len();
        let wanted = sum_of_products;
        let rows: Vec<Vec<i64>> = self
            .table
            .rows()
            .enumerate()
            .filter(|(_, v)| *v == wanted)
            .map(|(idx, _)| {
                bit_seq(idx, names.len())
                    .zip(names)
                    .map(|(bit, &name)| if bit == wanted { name } else { -name })
                    .collect()
            })
            .collect();
        if sum_of_products {
            Cover::SumOfProducts(rows)
        } else {
            Cover::ProductOfSums(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and2(alias: u32, a: u32, b: u32) -> Gate {
        Gate::new(
            alias,
            vec![a, b],
            TruthTable::from_rows(&[false, false, false, true]),
        )
    }

    #[test]
    fn test_substitute_renames() {
        let mut g = and2(5, 1, 2);
        let mut renaming = FxHashMap::default();
        renaming.insert(1, Some(7));
        let renamed = g.substitute(&renaming);
        assert_eq!(renamed, vec![7, 2]);
        assert_eq!(g.inputs, vec![7, 2]);
        assert_eq!(g.table, TruthTable::from_rows(&[false, false, false, true]));
    }

    #[test]
    fn test_substitute_constant_collapses_and() {
        // and(a, b) with a = false collapses to the constant gate.
        let mut g = and2(5, 1, 2);
        let mut renaming = FxHashMap::default();
        renaming.insert(1, None);
        let renamed = g.substitute(&renaming);
        assert_eq!(renamed, vec![2]);
        assert!(g.is_constant());
        assert_eq!(g.table, TruthTable::constant_false());
    }

    #[test]
    fn test_substitute_constant_reduces_or() {
        // or(a, b) with a = false reduces to the projection of b.
        let mut g = Gate::new(
            5,
            vec![1, 2],
            TruthTable::from_rows(&[false, true, true, true]),
        );
        let mut renaming = FxHashMap::default();
        renaming.insert(1, None);
        g.substitute(&renaming);
        assert_eq!(g.inputs, vec![2]);
        assert_eq!(g.projection_on(), Some(0));
    }

    #[test]
    fn test_projection_on() {
        assert_eq!(
            Gate::new(3, vec![1], TruthTable::from_rows(&[false, true])).projection_on(),
            Some(0)
        );
        assert_eq!(and2(3, 1, 2).projection_on(), None);
        assert_eq!(Gate::constant(3).projection_on(), None);
    }

    #[test]
    fn test_cover_and_gate() {
        // One true row: sum of products with a single conjunction.
        let g = and2(5, 1, 2);
        assert_eq!(g.cover(), Cover::SumOfProducts(vec![vec![1, 2]]));
    }

    #[test]
    fn test_cover_or_gate() {
        // Three true rows of four: product of sums with the single zero row.
        let g = Gate::new(
            5,
            vec![1, 2],
            TruthTable::from_rows(&[false, true, true, true]),
        );
        assert_eq!(g.cover(), Cover::ProductOfSums(vec![vec![1, 2]]));
    }

    #[test]
    fn test_cover_xor_tie_breaks_to_sop() {
        let g = Gate::new(
            5,
            vec![1, 2],
            TruthTable::from_rows(&[false, true, true, false]),
        );
        assert_eq!(
            g.cover(),
            Cover::SumOfProducts(vec![vec![-1, 2], vec![1, -2]])
        );
    }

    #[test]
    fn test_cover_constant_false() {
        let g = Gate::constant(5);
        assert_eq!(g.cover(), Cover::SumOfProducts(vec![]));
    }

    #[test]
    fn test_cover_named() {
        let g = and2(5, 1, 2);
        assert_eq!(
            g.cover_named(&[10, -11]),
            Cover::SumOfProducts(vec![vec![10, -11]])
        );
    }
}
