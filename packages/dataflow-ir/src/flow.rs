/*
 * Flow-function algebra
 *
 * A flow function maps one incoming dataflow fact to the set of facts that
 * hold after an exploded-supergraph edge. The solver queries four factories
 * (normal, call, return, call-to-return) for every edge it explores; each
 * returned function must be pure, deterministic and distributive.
 *
 * The distinguished zero fact Λ is the tautological fact that holds at every
 * program point. Every flow function must map Λ to a set containing Λ; this
 * identity lane is what carries constant contributions in IDE problems. The
 * solver enforces the contract at application time.
 *
 * References:
 * - Reps, Horwitz, Sagiv (1995): "Precise Interprocedural Dataflow Analysis
 *   via Graph Reachability"
 */

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Dataflow fact (abstract domain element)
///
/// Example:
///   - Taint analysis: `Tainted("x")`
///   - Uninitialised variables: `Uninit(alloca_id)`
///
/// The zero fact Λ is unique per problem and must not be a member of the
/// ordinary fact domain.
pub trait DataflowFact: Clone + Eq + Hash + Debug {
    /// Create the zero fact Λ.
    fn zero() -> Self;

    /// Check whether this is the zero fact.
    fn is_zero(&self) -> bool;
}

/// Flow function: D → 2^D (maps one fact to a set of facts)
pub trait FlowFunction<F: DataflowFact> {
    /// Compute the output facts for one input fact.
    fn compute(&self, fact: &F) -> HashSet<F>;
}

/// Boxed flow function as returned by problem factories.
pub type FlowFunctionRef<F> = Box<dyn FlowFunction<F>>;

// ============================================================================
// Stock flow functions
// ============================================================================

/// Identity flow: f(d) = {d}
pub struct Identity;

impl<F: DataflowFact> FlowFunction<F> for Identity {
    fn compute(&self, fact: &F) -> HashSet<F> {
        HashSet::from([fact.clone()])
    }
}

/// Kill-all flow: f(Λ) = {Λ}, f(d) = ∅ otherwise.
///
/// The zero lane survives so the containing procedure stays reachable.
pub struct KillAll;

impl<F: DataflowFact> FlowFunction<F> for KillAll {
    fn compute(&self, fact: &F) -> HashSet<F> {
        if fact.is_zero() {
            HashSet::from([fact.clone()])
        } else {
            HashSet::new()
        }
    }
}

/// Kill one fact: f(kill) = ∅, f(d) = {d} otherwise.
pub struct Kill<F> {
    pub kill: F,
}

impl<F: DataflowFact> FlowFunction<F> for Kill<F> {
    fn compute(&self, fact: &F) -> HashSet<F> {
        if *fact == self.kill {
            HashSet::new()
        } else {
            HashSet::from([fact.clone()])
        }
    }
}

/// Generate a fact from a trigger: f(from) = {from, gen}, f(d) = {d}.
///
/// With `from = Λ` this is the classic "source" pattern that materialises a
/// new fact out of the zero lane.
pub struct Gen<F> {
    pub gen: F,
    pub from: F,
}

impl<F: DataflowFact> FlowFunction<F> for Gen<F> {
    fn compute(&self, fact: &F) -> HashSet<F> {
        if *fact == self.from {
            HashSet::from([fact.clone(), self.gen.clone()])
        } else {
            HashSet::from([fact.clone()])
        }
    }
}

/// Transfer a fact: f(from) = {from, to}, f(to) = ∅, f(d) = {d}.
///
/// Models strong-update assignment `to = from`: the target loses its old
/// fact, the source keeps flowing and additionally reaches the target.
pub struct Transfer<F> {
    pub to: F,
    pub from: F,
}

impl<F: DataflowFact> FlowFunction<F> for Transfer<F> {
    fn compute(&self, fact: &F) -> HashSet<F> {
        if *fact == self.from {
            HashSet::from([fact.clone(), self.to.clone()])
        } else if *fact == self.to {
            HashSet::new()
        } else {
            HashSet::from([fact.clone()])
        }
    }
}

/// Union of flow functions: f(d) = f1(d) ∪ ... ∪ fn(d)
pub struct Union<F: DataflowFact> {
    funcs: Vec<FlowFunctionRef<F>>,
}

impl<F: DataflowFact> Union<F> {
    pub fn new(funcs: Vec<FlowFunctionRef<F>>) -> Self {
        Self { funcs }
    }
}

impl<F: DataflowFact> FlowFunction<F> for Union<F> {
    fn compute(&self, fact: &F) -> HashSet<F> {
        let mut out = HashSet::new();
        for f in &self.funcs {
            out.extend(f.compute(fact));
        }
        out
    }
}

/// Map an explicit fact-to-facts table, identity everywhere else.
///
/// Convenient for call flows that map actuals into formals: list the pairs,
/// everything unlisted is killed (callee does not see caller locals).
pub struct MapFacts<F: DataflowFact> {
    mapping: Vec<(F, Vec<F>)>,
    /// Facts with no mapping entry are killed when true, passed when false.
    kill_unmapped: bool,
}

impl<F: DataflowFact> MapFacts<F> {
    pub fn into_callee(mapping: Vec<(F, Vec<F>)>) -> Self {
        Self {
            mapping,
            kill_unmapped: true,
        }
    }

    pub fn with_passthrough(mapping: Vec<(F, Vec<F>)>) -> Self {
        Self {
            mapping,
            kill_unmapped: false,
        }
    }
}

impl<F: DataflowFact> FlowFunction<F> for MapFacts<F> {
    fn compute(&self, fact: &F) -> HashSet<F> {
        // Zero always passes as identity regardless of the mapping.
        if fact.is_zero() {
            return HashSet::from([fact.clone()]);
        }
        for (from, to) in &self.mapping {
            if from == fact {
                return to.iter().cloned().collect();
            }
        }
        if self.kill_unmapped {
            HashSet::new()
        } else {
            HashSet::from([fact.clone()])
        }
    }
}
