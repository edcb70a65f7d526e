/*
 * Alias provider collaborator
 *
 * Read-only alias information consumed by analysis problems, typically in
 * their call-to-return and store-handling flow functions. Must-alias and
 * may-alias are kept distinct: taint-style problems propagate a fact to the
 * whole must-set and treat may-aliases conservatively.
 *
 * The in-memory implementation keeps equivalence classes via union-find for
 * must-aliases plus an explicit may-edge relation on top.
 */

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Outcome of an alias query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AliasResult {
    /// The two values certainly refer to the same storage.
    Must,
    /// The two values possibly refer to the same storage.
    May,
    /// The two values certainly refer to distinct storage.
    No,
}

/// Query surface over precomputed alias information.
///
/// `Ctx` is an opaque query context (a function, a call string, a program
/// point); implementations that are context-insensitive ignore it.
pub trait AliasInfo {
    type Value: Clone + Eq + Hash + Debug;
    type Ctx;

    fn alias(&self, a: &Self::Value, b: &Self::Value, ctx: &Self::Ctx) -> AliasResult;

    /// All values aliasing `v` (must and may), including `v` itself.
    fn alias_set(&self, v: &Self::Value, ctx: &Self::Ctx) -> HashSet<Self::Value>;

    /// Allocation sites from which `v` may originate.
    fn reachable_allocation_sites(
        &self,
        v: &Self::Value,
        intra_procedural_only: bool,
        at: &Self::Ctx,
    ) -> HashSet<Self::Value>;
}

/// Context-insensitive in-memory alias sets.
pub struct ProgramAliasInfo<V> {
    /// Union-find parent links over must-alias classes.
    parent: FxHashMap<V, V>,
    /// May-alias edges between class representatives.
    may_edges: FxHashMap<V, HashSet<V>>,
    /// Allocation sites per class representative.
    allocation_sites: FxHashMap<V, HashSet<V>>,
}

impl<V: Clone + Eq + Hash + Debug> ProgramAliasInfo<V> {
    pub fn new() -> Self {
        Self {
            parent: FxHashMap::default(),
            may_edges: FxHashMap::default(),
            allocation_sites: FxHashMap::default(),
        }
    }

    fn find(&self, v: &V) -> V {
        let mut current = v.clone();
        while let Some(p) = self.parent.get(&current) {
            if *p == current {
                break;
            }
            current = p.clone();
        }
        current
    }

    fn ensure(&mut self, v: &V) {
        if !self.parent.contains_key(v) {
            self.parent.insert(v.clone(), v.clone());
        }
    }

    /// Record that `a` and `b` certainly alias (merges their classes).
    pub fn add_must_alias(&mut self, a: V, b: V) {
        self.ensure(&a);
        self.ensure(&b);
        let ra = self.find(&a);
        let rb = self.find(&b);
        if ra != rb {
            self.parent.insert(rb, ra);
        }
    }

    /// Record that `a` and `b` possibly alias.
    pub fn add_may_alias(&mut self, a: V, b: V) {
        self.ensure(&a);
        self.ensure(&b);
        let ra = self.find(&a);
        let rb = self.find(&b);
        self.may_edges.entry(ra.clone()).or_default().insert(rb.clone());
        self.may_edges.entry(rb).or_default().insert(ra);
    }

    /// Record an allocation site for `v`'s storage.
    pub fn add_allocation_site(&mut self, v: V, site: V) {
        self.ensure(&v);
        let r = self.find(&v);
        self.allocation_sites.entry(r).or_default().insert(site);
    }
}

impl<V: Clone + Eq + Hash + Debug> Default for ProgramAliasInfo<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Eq + Hash + Debug> AliasInfo for ProgramAliasInfo<V> {
    type Value = V;
    type Ctx = ();

    fn alias(&self, a: &V, b: &V, _ctx: &()) -> AliasResult {
        if !self.parent.contains_key(a) || !self.parent.contains_key(b) {
            return AliasResult::No;
        }
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return AliasResult::Must;
        }
        // May-edges were recorded against the representatives current at
        // insertion time; later must-merges can retire those, so edges are
        // re-canonicalised on lookup.
        let may = self.may_edges.iter().any(|(from, tos)| {
            let rf = self.find(from);
            (rf == ra && tos.iter().any(|t| self.find(t) == rb))
                || (rf == rb && tos.iter().any(|t| self.find(t) == ra))
        });
        if may {
            AliasResult::May
        } else {
            AliasResult::No
        }
    }

    fn alias_set(&self, v: &V, _ctx: &()) -> HashSet<V> {
        let mut out = HashSet::new();
        out.insert(v.clone());
        if !self.parent.contains_key(v) {
            return out;
        }
        let rv = self.find(v);
        let mut reps = HashSet::new();
        reps.insert(rv.clone());
        for (from, tos) in &self.may_edges {
            let rf = self.find(from);
            for t in tos {
                let rt = self.find(t);
                if rf == rv {
                    reps.insert(rt);
                } else if rt == rv {
                    reps.insert(rf.clone());
                }
            }
        }
        for candidate in self.parent.keys() {
            if reps.contains(&self.find(candidate)) {
                out.insert(candidate.clone());
            }
        }
        out
    }

    fn reachable_allocation_sites(
        &self,
        v: &V,
        _intra_procedural_only: bool,
        _at: &(),
    ) -> HashSet<V> {
        if !self.parent.contains_key(v) {
            return HashSet::new();
        }
        let rv = self.find(v);
        let mut out = HashSet::new();
        for (owner, sites) in &self.allocation_sites {
            if self.find(owner) == rv {
                out.extend(sites.iter().cloned());
            }
        }
        out
    }
}
