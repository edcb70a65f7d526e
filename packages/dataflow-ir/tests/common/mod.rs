//! Shared fixtures for the end-to-end solver tests: a variable-fact domain,
//! a linear-constant value lattice with closed-form edge functions, and a
//! taint-severity lattice.

#![allow(dead_code)] // Not every fixture is used by every test binary.

use dataflow_ir::{DataflowFact, EdgeOp, Icfg, InstrId, JoinLattice, ProgramGraph};

/// Variable facts plus the tautological zero fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fact {
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

/// Linear-constant lattice: ⊥ ⊑ Val(c) ⊑ ⊤, distinct constants widen to ⊤
/// ("unknown constant").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lcp {
    Bottom,
    Val(i64),
    Top,
}

impl JoinLattice for Lcp {
    fn bottom() -> Self {
        Lcp::Bottom
    }
    fn top() -> Self {
        Lcp::Top
    }
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Lcp::Bottom, x) | (x, Lcp::Bottom) => *x,
            (Lcp::Top, _) | (_, Lcp::Top) => Lcp::Top,
            (Lcp::Val(a), Lcp::Val(b)) => {
                if a == b {
                    Lcp::Val(*a)
                } else {
                    Lcp::Top
                }
            }
        }
    }
}

/// λx. a·x + b over [`Lcp`]; composes in closed form, which is what keeps
/// jump functions collapsed around loops and recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Linear {
    pub a: i64,
    pub b: i64,
}

impl Linear {
    pub fn add(b: i64) -> Self {
        Linear { a: 1, b }
    }
    pub fn mul(a: i64) -> Self {
        Linear { a, b: 0 }
    }
}

impl EdgeOp<Lcp> for Linear {
    fn compute(&self, source: &Lcp) -> Lcp {
        match source {
            Lcp::Bottom => Lcp::Bottom,
            Lcp::Val(v) => Lcp::Val(self.a * v + self.b),
            Lcp::Top => Lcp::Top,
        }
    }

    fn then(&self, other: &Self) -> Option<Self> {
        Some(Linear {
            a: other.a * self.a,
            b: other.a * self.b + other.b,
        })
    }
}

/// Taint severity 0..=10; join takes the maximum, 10 is "fully tainted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level(pub u8);

impl JoinLattice for Level {
    fn bottom() -> Self {
        Level(0)
    }
    fn top() -> Self {
        Level(10)
    }
    fn join(&self, other: &Self) -> Self {
        Level(self.0.max(other.0))
    }
}

/// Local statement label without the `function::` qualifier.
pub fn label(graph: &ProgramGraph, node: InstrId) -> String {
    let id = graph.statement_id(node);
    match id.rsplit_once("::") {
        Some((_, local)) => local.to_string(),
        None => id,
    }
}
