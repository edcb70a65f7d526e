/*
 * Lattice primitives for IDE value domains
 *
 * Every IDE problem computes over a bounded join-semilattice. Edge functions
 * are monotone maps over this lattice; the solver merges values flowing in
 * over distinct paths with the join operator.
 *
 * Laws (verified by property tests):
 * - Idempotence:   a ⊔ a = a
 * - Commutativity: a ⊔ b = b ⊔ a
 * - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
 * - Bottom unit:   ⊥ ⊔ a = a
 * - Top absorbs:   ⊤ ⊔ a = ⊤
 *
 * References:
 * - Sagiv, Reps, Horwitz (1996): "Precise Interprocedural Dataflow Analysis
 *   with Applications to Constant Propagation"
 */

use std::fmt::Debug;
use std::hash::Hash;

/// A bounded join-semilattice.
///
/// `bottom()` is the unit of `join` and the value carried by freshly seeded
/// analysis facts; `top()` means "no information" and is what the result
/// container reports for a pair it never saw. Termination of the solver
/// requires all ascending chains `a ⊑ a ⊔ b ⊑ ...` to be finite.
pub trait JoinLattice: Clone + Eq + Hash + Debug {
    /// Least element (unit of join).
    fn bottom() -> Self;

    /// Greatest element (absorbing for join, "no information").
    fn top() -> Self;

    /// Least upper bound of two elements.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }

    fn is_top(&self) -> bool {
        *self == Self::top()
    }
}

/// The two-point lattice: Bottom ⊑ Top.
///
/// Embeds plain IFDS reachability problems into the IDE machinery: seeds
/// carry `Bottom`, identity edge functions preserve it, and any (node, fact)
/// pair that shows up in the result table with `Bottom` is reachable. Pairs
/// the solver never reached stay at `Top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryDomain {
    Bottom,
    Top,
}

impl JoinLattice for BinaryDomain {
    fn bottom() -> Self {
        BinaryDomain::Bottom
    }

    fn top() -> Self {
        BinaryDomain::Top
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (BinaryDomain::Bottom, BinaryDomain::Bottom) => BinaryDomain::Bottom,
            _ => BinaryDomain::Top,
        }
    }
}
