/*
 * Interprocedural control-flow graph abstraction
 *
 * The solver is generic over this query surface; it never inspects program
 * syntax. Node and function identities are opaque, comparable and stable for
 * the lifetime of a solve. All returned sequences must iterate in a stable,
 * deterministic order across calls: the final fixed point is order
 * independent, but intermediate observables and performance are not.
 *
 * Guarantees an implementation must deliver:
 * - every call site has at least one return site
 * - every function that is ever called has at least one start point
 * - exit points may be empty only for functions that never return; the
 *   solver then drops callee facts at the call and keeps the bypass lane
 * - virtual/indirect call resolution is the graph's responsibility; the
 *   solver accepts any finite callee set (an empty set degrades the call to
 *   its call-to-return edge)
 */

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Classification of compiler-synthesised member functions.
///
/// Lowered object-oriented IRs call these implicitly; analyses frequently
/// want to treat them specially (e.g. constructors as allocation-adjacent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialMemberKind {
    Constructor,
    Destructor,
    CopyAssignment,
    MoveAssignment,
}

/// Query interface over an interprocedural control-flow graph.
pub trait Icfg {
    /// Opaque identity of a program point (instruction).
    type Node: Copy + Eq + Ord + Hash + Debug;

    /// Opaque identity of a callable.
    type Fun: Clone + Eq + Hash + Debug;

    fn function_of(&self, node: Self::Node) -> Self::Fun;

    /// Predecessors in declared order.
    fn predecessors_of(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Successors in declared order.
    fn successors_of(&self, node: Self::Node) -> Vec<Self::Node>;

    fn start_points_of(&self, fun: &Self::Fun) -> Vec<Self::Node>;

    fn exit_points_of(&self, fun: &Self::Fun) -> Vec<Self::Node>;

    fn is_call_site(&self, node: Self::Node) -> bool;

    fn is_exit_inst(&self, node: Self::Node) -> bool;

    fn is_start_point(&self, node: Self::Node) -> bool;

    /// Resolved callees of a call site; empty when resolution found nothing.
    fn callees_of_call_at(&self, node: Self::Node) -> Vec<Self::Fun>;

    /// All call sites that may invoke `fun`.
    fn callers_of(&self, fun: &Self::Fun) -> Vec<Self::Node>;

    /// Return sites of a call site (several under exceptional control flow).
    fn return_sites_of_call_at(&self, node: Self::Node) -> Vec<Self::Node>;

    fn is_branch_target(&self, node: Self::Node, succ: Self::Node) -> bool;

    fn is_fall_through_successor(&self, node: Self::Node, succ: Self::Node) -> bool;

    fn is_heap_allocating_function(&self, fun: &Self::Fun) -> bool {
        let _ = fun;
        false
    }

    fn special_member_kind(&self, fun: &Self::Fun) -> Option<SpecialMemberKind> {
        let _ = fun;
        None
    }

    fn is_special_member_function(&self, fun: &Self::Fun) -> bool {
        self.special_member_kind(fun).is_some()
    }

    /// All instructions belonging to a function, in declared order.
    fn all_instructions_of(&self, fun: &Self::Fun) -> Vec<Self::Node>;

    /// All intra-procedural edges of a function.
    fn control_flow_edges_of(&self, fun: &Self::Fun) -> Vec<(Self::Node, Self::Node)> {
        let mut edges = Vec::new();
        for n in self.all_instructions_of(fun) {
            for s in self.successors_of(n) {
                edges.push((n, s));
            }
        }
        edges
    }

    /// Call sites contained in a function, in declared order.
    fn calls_from_within(&self, fun: &Self::Fun) -> Vec<Self::Node> {
        self.all_instructions_of(fun)
            .into_iter()
            .filter(|&n| self.is_call_site(n))
            .collect()
    }

    /// Stable textual id of a statement; the only textual boundary of the
    /// engine, used for diagnostics alone.
    fn statement_id(&self, node: Self::Node) -> String;

    fn function_name(&self, fun: &Self::Fun) -> String;
}
