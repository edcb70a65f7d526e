/*
 * Analysis-problem interface
 *
 * An IFDS/IDE problem supplies the solver with flow-function factories (which
 * facts propagate across an edge), edge-function factories (what lattice
 * values those flows compute), the initial seeds and printers. The solver
 * queries factories once per explored exploded-supergraph edge; factories
 * must be pure and deterministic, and any error they report aborts the solve.
 *
 * Plain IFDS problems implement only the flow side: the edge factories
 * default to identity, and `BinaryDomain` as the value lattice turns the IDE
 * value computation into reachability.
 */

use crate::edge::{EdgeFunction, EdgeOp};
use crate::errors::ProblemError;
use crate::flow::{DataflowFact, FlowFunctionRef};
use crate::icfg::Icfg;
use crate::lattice::JoinLattice;

/// An interprocedural, finite, distributive subset problem with an optional
/// environment (value) extension.
pub trait IfdsIdeProblem<I: Icfg> {
    /// Dataflow fact domain, including the distinguished zero fact Λ.
    type Fact: DataflowFact;

    /// Value lattice the edge functions compute over.
    type Value: JoinLattice;

    /// Atomic edge functions of this problem; `NoOp` when only the canonical
    /// constants (identity, all-top, all-bottom) are needed.
    type EdgeOp: EdgeOp<Self::Value>;

    /// The tautological fact Λ, unique per problem.
    fn zero_fact(&self) -> Self::Fact {
        Self::Fact::zero()
    }

    /// Initial seeds: (node, fact, value) triples. The solver additionally
    /// seeds `(node, Λ, ⊥)` for every seeded node, so the identity lane is
    /// always live at the analysis entries.
    fn initial_seeds(&self) -> Vec<(I::Node, Self::Fact, Self::Value)>;

    // ------------------------------------------------------------------
    // Flow-function factories (fact propagation)
    // ------------------------------------------------------------------

    /// Intra-procedural edge `curr -> succ`.
    fn normal_flow(
        &self,
        curr: I::Node,
        succ: I::Node,
    ) -> Result<FlowFunctionRef<Self::Fact>, ProblemError>;

    /// Maps caller facts at `call_site` into `callee`'s entry facts
    /// (actuals into formals).
    fn call_flow(
        &self,
        call_site: I::Node,
        callee: &I::Fun,
    ) -> Result<FlowFunctionRef<Self::Fact>, ProblemError>;

    /// Maps callee facts visible at `exit` back into the caller at
    /// `return_site`.
    fn return_flow(
        &self,
        call_site: I::Node,
        callee: &I::Fun,
        exit: I::Node,
        return_site: I::Node,
    ) -> Result<FlowFunctionRef<Self::Fact>, ProblemError>;

    /// Propagates caller facts that bypass the call entirely (locals passed
    /// by value, globals handled locally). Queried even when `callees` is
    /// empty, in which case the call degrades to this bypass lane.
    fn call_to_return_flow(
        &self,
        call_site: I::Node,
        return_site: I::Node,
        callees: &[I::Fun],
    ) -> Result<FlowFunctionRef<Self::Fact>, ProblemError>;

    // ------------------------------------------------------------------
    // Edge-function factories (value computation); default to identity
    // ------------------------------------------------------------------

    fn normal_edge_function(
        &self,
        curr: I::Node,
        curr_fact: &Self::Fact,
        succ: I::Node,
        succ_fact: &Self::Fact,
    ) -> Result<EdgeFunction<Self::EdgeOp, Self::Value>, ProblemError> {
        let _ = (curr, curr_fact, succ, succ_fact);
        Ok(EdgeFunction::Identity)
    }

    fn call_edge_function(
        &self,
        call_site: I::Node,
        src_fact: &Self::Fact,
        callee: &I::Fun,
        dest_fact: &Self::Fact,
    ) -> Result<EdgeFunction<Self::EdgeOp, Self::Value>, ProblemError> {
        let _ = (call_site, src_fact, callee, dest_fact);
        Ok(EdgeFunction::Identity)
    }

    fn return_edge_function(
        &self,
        call_site: I::Node,
        callee: &I::Fun,
        exit: I::Node,
        exit_fact: &Self::Fact,
        return_site: I::Node,
        ret_fact: &Self::Fact,
    ) -> Result<EdgeFunction<Self::EdgeOp, Self::Value>, ProblemError> {
        let _ = (call_site, callee, exit, exit_fact, return_site, ret_fact);
        Ok(EdgeFunction::Identity)
    }

    fn call_to_return_edge_function(
        &self,
        call_site: I::Node,
        src_fact: &Self::Fact,
        return_site: I::Node,
        ret_fact: &Self::Fact,
        callees: &[I::Fun],
    ) -> Result<EdgeFunction<Self::EdgeOp, Self::Value>, ProblemError> {
        let _ = (call_site, src_fact, return_site, ret_fact, callees);
        Ok(EdgeFunction::Identity)
    }

    // ------------------------------------------------------------------
    // Precomputed summaries (optional)
    // ------------------------------------------------------------------

    /// Precomputed summary for a known callee. When this returns `Some`, the
    /// summary REPLACES callee exploration at this call site: the solver
    /// routes the produced facts straight to the return sites through
    /// `summary_edge_function` and does not query `call_flow`/`return_flow`
    /// for this callee. `None` selects the standard call path.
    fn summary_flow(
        &self,
        call_site: I::Node,
        callee: &I::Fun,
    ) -> Option<FlowFunctionRef<Self::Fact>> {
        let _ = (call_site, callee);
        None
    }

    /// Edge function for a summary-produced `(src-fact -> dst-fact)` pair;
    /// queried only when `summary_flow` returned `Some`.
    fn summary_edge_function(
        &self,
        call_site: I::Node,
        src_fact: &Self::Fact,
        return_site: I::Node,
        ret_fact: &Self::Fact,
    ) -> Result<EdgeFunction<Self::EdgeOp, Self::Value>, ProblemError> {
        let _ = (call_site, src_fact, return_site, ret_fact);
        Ok(EdgeFunction::Identity)
    }

    // ------------------------------------------------------------------
    // Printers (diagnostics only)
    // ------------------------------------------------------------------

    fn fact_to_string(&self, fact: &Self::Fact) -> String {
        format!("{fact:?}")
    }

    fn value_to_string(&self, value: &Self::Value) -> String {
        format!("{value:?}")
    }
}
