/*
 * Edge-function algebra with structural interning
 *
 * Edge functions are the IDE contribution over plain IFDS: each exploded
 * supergraph edge carries a monotone map over the value lattice, and the
 * solver accumulates them into jump functions by composition and join.
 *
 * Representation: an arena of canonical expressions plus an intern table.
 * Every constructed function is interned, so syntactically identical
 * functions share one copyable handle and equality is a handle comparison.
 * Composition and join apply canonical rewrites before allocating:
 *
 * - identity is eliminated on either side of a composition
 * - a constant on the outside of a composition absorbs the inside
 * - a constant on the inside folds through the outer function
 * - AllTop / AllBottom are the constants ⊤ / ⊥
 * - joins are flattened into a deduplicated operand set, constants are
 *   merged pointwise, ⊥ is dropped as the join unit and ⊤ absorbs
 * - composition distributes over join (edge functions are distributive)
 *
 * Problems may additionally give their atomic functions a closed normal
 * form via `EdgeOp::then`, which is how e.g. linear-constant edges
 * (λx. ax + b) stay collapsed along cyclic paths.
 *
 * References:
 * - Sagiv, Reps, Horwitz (1996): "Precise Interprocedural Dataflow Analysis
 *   with Applications to Constant Propagation"
 */

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::lattice::JoinLattice;

/// Problem-defined atomic edge function.
///
/// Atoms must be cheap to clone, comparable and hashable so the interner can
/// canonicalise them. `then` optionally collapses `self` followed by `other`
/// into a single atom; returning `None` makes the table build an explicit
/// composition node instead.
pub trait EdgeOp<L: JoinLattice>: Clone + Eq + Hash + Debug {
    /// Evaluate the function on a source value.
    fn compute(&self, source: &L) -> L;

    /// Optional closed form for `other(self(x))`.
    fn then(&self, _other: &Self) -> Option<Self> {
        None
    }
}

/// Atom type for problems whose edge functions are only the canonical
/// constants (identity, all-top, all-bottom). Plain IFDS problems use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoOp {}

impl<L: JoinLattice> EdgeOp<L> for NoOp {
    fn compute(&self, _source: &L) -> L {
        match *self {}
    }
}

/// Edge function as returned by problem factories.
///
/// The canonical constants are tagged variants; `Op` wraps a problem atom.
/// The solver interns whatever the factory returns, so factories may build
/// these freely on every query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeFunction<A, L> {
    /// λx. x
    Identity,
    /// λx. ⊤
    AllTop,
    /// λx. ⊥
    AllBottom,
    /// λx. c
    Constant(L),
    /// Problem-defined atom.
    Op(A),
}

/// Copyable handle to an interned edge function.
///
/// Handles are only meaningful relative to the `EdgeFunctionTable` that
/// issued them. Equal handles imply equal functions; the reverse is the
/// conservative equivalence used for fixed-point detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeFn(u32);

impl EdgeFn {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Canonical expression stored in the arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Expr<A, L> {
    Identity,
    Constant(L),
    Op(A),
    /// Apply `.0` first, then `.1`.
    Compose(EdgeFn, EdgeFn),
    /// Pointwise join of the operands; flattened, deduplicated, sorted,
    /// always at least two entries.
    Join(Vec<EdgeFn>),
}

/// Arena + intern table for edge functions.
///
/// Owned by the solver; jump functions, summaries and results all reference
/// functions through `EdgeFn` handles into this table. The expression graph
/// is a DAG: composition and join only ever reference older handles.
pub struct EdgeFunctionTable<A, L> {
    arena: Vec<Expr<A, L>>,
    intern: FxHashMap<Expr<A, L>, EdgeFn>,
    hits: usize,
}

impl<A: EdgeOp<L>, L: JoinLattice> EdgeFunctionTable<A, L> {
    pub fn new() -> Self {
        let mut table = Self {
            arena: Vec::new(),
            intern: FxHashMap::default(),
            hits: 0,
        };
        // Handle 0 is always the identity.
        table.intern_expr(Expr::Identity);
        table
    }

    /// The identity function's handle.
    pub fn identity(&self) -> EdgeFn {
        EdgeFn(0)
    }

    pub fn all_top(&mut self) -> EdgeFn {
        self.intern_expr(Expr::Constant(L::top()))
    }

    pub fn all_bottom(&mut self) -> EdgeFn {
        self.intern_expr(Expr::Constant(L::bottom()))
    }

    /// Number of distinct functions interned so far.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Number of intern lookups that found an existing function.
    pub fn intern_hits(&self) -> usize {
        self.hits
    }

    /// Intern a factory-built edge function.
    pub fn intern(&mut self, func: EdgeFunction<A, L>) -> EdgeFn {
        match func {
            EdgeFunction::Identity => self.identity(),
            EdgeFunction::AllTop => self.all_top(),
            EdgeFunction::AllBottom => self.all_bottom(),
            EdgeFunction::Constant(c) => self.intern_expr(Expr::Constant(c)),
            EdgeFunction::Op(op) => self.intern_expr(Expr::Op(op)),
        }
    }

    fn intern_expr(&mut self, expr: Expr<A, L>) -> EdgeFn {
        if let Some(&handle) = self.intern.get(&expr) {
            self.hits += 1;
            return handle;
        }
        let handle = EdgeFn(u32::try_from(self.arena.len()).expect("edge function arena overflow"));
        self.arena.push(expr.clone());
        self.intern.insert(expr, handle);
        handle
    }

    /// Evaluate `f` on a source value.
    pub fn compute(&self, f: EdgeFn, source: &L) -> L {
        match &self.arena[f.index()] {
            Expr::Identity => source.clone(),
            Expr::Constant(c) => c.clone(),
            Expr::Op(op) => op.compute(source),
            Expr::Compose(first, second) => {
                let mid = self.compute(*first, source);
                self.compute(*second, &mid)
            }
            Expr::Join(ops) => {
                let mut acc = L::bottom();
                for op in ops {
                    acc = acc.join(&self.compute(*op, source));
                }
                acc
            }
        }
    }

    /// λx. second(first(x)) with canonical rewrites applied.
    pub fn compose(&mut self, first: EdgeFn, second: EdgeFn) -> EdgeFn {
        if first == self.identity() {
            return second;
        }
        if second == self.identity() {
            return first;
        }
        // The outer function ignores its input when constant.
        if let Expr::Constant(c) = &self.arena[second.index()] {
            let c = c.clone();
            return self.intern_expr(Expr::Constant(c));
        }
        // A constant inner function folds through the outer one.
        if let Expr::Constant(c) = &self.arena[first.index()] {
            let folded = self.compute(second, &c.clone());
            return self.intern_expr(Expr::Constant(folded));
        }
        // Distribute over joins on either side; edge functions are
        // distributive, so this preserves meaning and keeps joins outermost.
        if let Expr::Join(ops) = &self.arena[first.index()] {
            let ops = ops.clone();
            let composed: Vec<EdgeFn> = ops.into_iter().map(|op| self.compose(op, second)).collect();
            return self.join_many(composed);
        }
        if let Expr::Join(ops) = &self.arena[second.index()] {
            let ops = ops.clone();
            let composed: Vec<EdgeFn> = ops.into_iter().map(|op| self.compose(first, op)).collect();
            return self.join_many(composed);
        }
        // Closed-form atom composition, when the problem provides one.
        let collapsed = match (&self.arena[first.index()], &self.arena[second.index()]) {
            (Expr::Op(a), Expr::Op(b)) => a.then(b),
            _ => None,
        };
        if let Some(op) = collapsed {
            return self.intern_expr(Expr::Op(op));
        }
        self.intern_expr(Expr::Compose(first, second))
    }

    /// Pointwise join of two functions.
    pub fn join(&mut self, f: EdgeFn, g: EdgeFn) -> EdgeFn {
        if f == g {
            return f;
        }
        self.join_many(vec![f, g])
    }

    fn join_many(&mut self, handles: Vec<EdgeFn>) -> EdgeFn {
        let mut ops: Vec<EdgeFn> = Vec::new();
        let mut constant: Option<L> = None;
        for h in handles {
            match &self.arena[h.index()] {
                Expr::Join(inner) => {
                    for &i in inner.clone().iter() {
                        self.join_collect(i, &mut ops, &mut constant);
                    }
                }
                _ => self.join_collect(h, &mut ops, &mut constant),
            }
        }
        if let Some(c) = constant {
            if c.is_top() || ops.is_empty() {
                return self.intern_expr(Expr::Constant(c));
            }
            // ⊥ is the unit of join and contributes nothing next to other
            // operands.
            if !c.is_bottom() {
                ops.push(self.intern_expr(Expr::Constant(c)));
            }
        }
        ops.sort_unstable();
        ops.dedup();
        match ops.len() {
            0 => self.all_bottom(),
            1 => ops[0],
            _ => self.intern_expr(Expr::Join(ops)),
        }
    }

    fn join_collect(&self, h: EdgeFn, ops: &mut Vec<EdgeFn>, constant: &mut Option<L>) {
        if let Expr::Constant(c) = &self.arena[h.index()] {
            *constant = Some(match constant {
                Some(acc) => acc.join(c),
                None => c.clone(),
            });
        } else {
            ops.push(h);
        }
    }

    /// Conservative equivalence: equal handles denote equal functions.
    pub fn equal(&self, f: EdgeFn, g: EdgeFn) -> bool {
        f == g
    }

    /// Human-readable rendering for diagnostics.
    pub fn describe(&self, f: EdgeFn) -> String {
        match &self.arena[f.index()] {
            Expr::Identity => "id".to_string(),
            Expr::Constant(c) => format!("const({c:?})"),
            Expr::Op(op) => format!("{op:?}"),
            Expr::Compose(a, b) => format!("({} ; {})", self.describe(*a), self.describe(*b)),
            Expr::Join(ops) => {
                let parts: Vec<_> = ops.iter().map(|o| self.describe(*o)).collect();
                format!("join[{}]", parts.join(", "))
            }
        }
    }
}

impl<A: EdgeOp<L>, L: JoinLattice> Default for EdgeFunctionTable<A, L> {
    fn default() -> Self {
        Self::new()
    }
}
