/*
 * Result container
 *
 * Per-statement, per-fact lattice values produced by a completed solve.
 * Values only ever move up the join order: `insert` merges with the join
 * operator, and a pair the solver never reached reads back as ⊤
 * ("no information").
 */

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::io::{self, Write};

use crate::flow::DataflowFact;
use crate::lattice::JoinLattice;

/// Final (node, fact) -> value table of a solve.
#[derive(Debug, Clone)]
pub struct SolverResults<N, D, L> {
    table: FxHashMap<N, FxHashMap<D, L>>,
}

impl<N, D, L> SolverResults<N, D, L>
where
    N: Copy + Eq + Ord + Hash + Debug,
    D: DataflowFact,
    L: JoinLattice,
{
    pub(crate) fn new() -> Self {
        Self {
            table: FxHashMap::default(),
        }
    }

    /// Store `value` for `(node, fact)`, joining with any existing entry.
    pub(crate) fn insert(&mut self, node: N, fact: D, value: L) {
        let row = self.table.entry(node).or_default();
        match row.get_mut(&fact) {
            Some(existing) => {
                *existing = existing.join(&value);
            }
            None => {
                row.insert(fact, value);
            }
        }
    }

    /// Value at `(node, fact)`; ⊤ when the pair was never reached.
    pub fn result_at(&self, node: N, fact: &D) -> L {
        self.table
            .get(&node)
            .and_then(|row| row.get(fact))
            .cloned()
            .unwrap_or_else(L::top)
    }

    /// All facts recorded at `node` with their values.
    pub fn results_at(&self, node: N) -> FxHashMap<D, L> {
        self.table.get(&node).cloned().unwrap_or_default()
    }

    /// Iterate the facts recorded at `node`.
    pub fn facts_at(&self, node: N) -> impl Iterator<Item = (&D, &L)> {
        self.table.get(&node).into_iter().flat_map(|row| row.iter())
    }

    /// Whether `fact` was reached at `node` with any value.
    pub fn contains(&self, node: N, fact: &D) -> bool {
        self.table
            .get(&node)
            .is_some_and(|row| row.contains_key(fact))
    }

    /// All nodes with at least one recorded fact, in a deterministic order.
    pub fn nodes(&self) -> Vec<N> {
        let mut nodes: Vec<N> = self.table.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Total number of (node, fact) entries.
    pub fn len(&self) -> usize {
        self.table.values().map(|row| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Text dump for diagnostics; rows are ordered deterministically via the
    /// supplied printers.
    pub fn dump<W: Write>(
        &self,
        writer: &mut W,
        node_str: impl Fn(N) -> String,
        fact_str: impl Fn(&D) -> String,
        value_str: impl Fn(&L) -> String,
    ) -> io::Result<()> {
        for node in self.nodes() {
            writeln!(writer, "{}:", node_str(node))?;
            let row = &self.table[&node];
            let mut lines: Vec<String> = row
                .iter()
                .map(|(d, l)| format!("  {} => {}", fact_str(d), value_str(l)))
                .collect();
            lines.sort();
            for line in lines {
                writeln!(writer, "{line}")?;
            }
        }
        Ok(())
    }

    /// Key-for-key equality under value equality; used by the fixed-point
    /// stability checks.
    pub fn table_eq(&self, other: &Self) -> bool {
        if self.table.len() != other.table.len() {
            return false;
        }
        self.table.iter().all(|(node, row)| {
            other
                .table
                .get(node)
                .is_some_and(|other_row| row == other_row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::BinaryDomain;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Fact {
        Zero,
        Var(&'static str),
    }

    impl DataflowFact for Fact {
        fn zero() -> Self {
            Fact::Zero
        }
        fn is_zero(&self) -> bool {
            matches!(self, Fact::Zero)
        }
    }

    #[test]
    fn test_absent_reads_back_as_top() {
        let results: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        assert_eq!(results.result_at(7, &Fact::Var("x")), BinaryDomain::Top);
        assert!(!results.contains(7, &Fact::Var("x")));
    }

    #[test]
    fn test_insert_joins_with_existing() {
        let mut results: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        results.insert(1, Fact::Var("x"), BinaryDomain::Bottom);
        assert_eq!(results.result_at(1, &Fact::Var("x")), BinaryDomain::Bottom);
        results.insert(1, Fact::Var("x"), BinaryDomain::Top);
        // Bottom ⊔ Top = Top; values never move down.
        assert_eq!(results.result_at(1, &Fact::Var("x")), BinaryDomain::Top);
    }

    #[test]
    fn test_results_at_collects_the_row() {
        let mut results: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        results.insert(1, Fact::Zero, BinaryDomain::Bottom);
        results.insert(1, Fact::Var("x"), BinaryDomain::Bottom);
        results.insert(2, Fact::Var("y"), BinaryDomain::Bottom);
        let row = results.results_at(1);
        assert_eq!(row.len(), 2);
        assert!(row.contains_key(&Fact::Zero));
        assert_eq!(results.facts_at(2).count(), 1);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_dump_is_deterministic() {
        let mut results: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        results.insert(2, Fact::Var("b"), BinaryDomain::Bottom);
        results.insert(1, Fact::Var("a"), BinaryDomain::Bottom);
        let mut out = Vec::new();
        results
            .dump(
                &mut out,
                |n| format!("n{n}"),
                |d| format!("{d:?}"),
                |l| format!("{l:?}"),
            )
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let n1 = text.find("n1:").unwrap();
        let n2 = text.find("n2:").unwrap();
        assert!(n1 < n2);
    }

    #[test]
    fn test_table_eq_is_key_for_key() {
        let mut a: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        let mut b: SolverResults<u32, Fact, BinaryDomain> = SolverResults::new();
        a.insert(1, Fact::Var("x"), BinaryDomain::Bottom);
        b.insert(1, Fact::Var("x"), BinaryDomain::Bottom);
        assert!(a.table_eq(&b));
        b.insert(2, Fact::Var("y"), BinaryDomain::Bottom);
        assert!(!a.table_eq(&b));
    }
}
