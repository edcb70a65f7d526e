//! Solver-level properties: fixed-point stability, worklist-order
//! independence, round-trip re-seeding, invariant enforcement and failure
//! semantics.

mod common;

use std::collections::HashSet;

use common::{label, Fact, Lcp, Linear};
use dataflow_ir::flow::{FlowFunction, Gen, Identity, Kill, MapFacts};
use dataflow_ir::{
    BinaryDomain, EdgeFunction, FlowFunctionRef, FunId, IdeSolver, IfdsIdeProblem, InstrId, NoOp,
    ProblemError, ProgramGraph, ProgramGraphBuilder, SolverConfig, SolverError, WorklistOrder,
};

use Fact::{Var, Zero};

// ============================================================================
// Fixture: pass-through taint over main -> id -> main
// ============================================================================

struct PassThroughTaint<'g> {
    graph: &'g ProgramGraph,
    seeds: Vec<(InstrId, Fact, BinaryDomain)>,
}

impl IfdsIdeProblem<ProgramGraph> for PassThroughTaint<'_> {
    type Fact = Fact;
    type Value = BinaryDomain;
    type EdgeOp = NoOp;

    fn initial_seeds(&self) -> Vec<(InstrId, Fact, BinaryDomain)> {
        self.seeds.clone()
    }

    fn normal_flow(
        &self,
        curr: InstrId,
        _succ: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(match label(self.graph, curr).as_str() {
            "a=src" => Box::new(Gen {
                gen: Var("a"),
                from: Zero,
            }),
            _ => Box::new(Identity),
        })
    }

    fn call_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(MapFacts::into_callee(vec![(
            Var("a"),
            vec![Var("p")],
        )])))
    }

    fn return_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
        _exit: InstrId,
        _return_site: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(MapFacts::into_callee(vec![(
            Var("p"),
            vec![Var("b")],
        )])))
    }

    fn call_to_return_flow(
        &self,
        _call_site: InstrId,
        _return_site: InstrId,
        _callees: &[FunId],
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Kill { kill: Var("b") }))
    }
}

fn pass_through_graph() -> (ProgramGraph, InstrId) {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let id = b.function("id");

    let m0 = b.instruction(main, "a=src");
    let m1 = b.call_site(main, "b=id(a)", &[id]);
    let m2 = b.instruction(main, "sink(b)");
    let m3 = b.instruction(main, "ret");
    b.edge(m0, m1);
    b.edge(m1, m2);
    b.edge(m2, m3);
    b.mark_exit(m3);

    let i0 = b.instruction(id, "body");
    let i1 = b.instruction(id, "ret_p");
    b.edge(i0, i1);
    b.mark_exit(i1);

    (b.build(), m0)
}

// ============================================================================
// Fixture: diamond with conflicting constants
// ============================================================================

struct DiamondConst<'g> {
    graph: &'g ProgramGraph,
    entry: InstrId,
}

impl IfdsIdeProblem<ProgramGraph> for DiamondConst<'_> {
    type Fact = Fact;
    type Value = Lcp;
    type EdgeOp = Linear;

    fn initial_seeds(&self) -> Vec<(InstrId, Fact, Lcp)> {
        vec![(self.entry, Zero, Lcp::Bottom)]
    }

    fn normal_flow(
        &self,
        curr: InstrId,
        _succ: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(match label(self.graph, curr).as_str() {
            "x=3" | "x=4" => Box::new(Gen {
                gen: Var("x"),
                from: Zero,
            }),
            _ => Box::new(Identity),
        })
    }

    fn call_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn return_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
        _exit: InstrId,
        _return_site: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn call_to_return_flow(
        &self,
        _call_site: InstrId,
        _return_site: InstrId,
        _callees: &[FunId],
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn normal_edge_function(
        &self,
        curr: InstrId,
        curr_fact: &Fact,
        _succ: InstrId,
        succ_fact: &Fact,
    ) -> Result<EdgeFunction<Linear, Lcp>, ProblemError> {
        Ok(
            match (label(self.graph, curr).as_str(), curr_fact, succ_fact) {
                ("x=3", Zero, Var("x")) => EdgeFunction::Constant(Lcp::Val(3)),
                ("x=4", Zero, Var("x")) => EdgeFunction::Constant(Lcp::Val(4)),
                _ => EdgeFunction::Identity,
            },
        )
    }
}

fn diamond_graph() -> (ProgramGraph, [InstrId; 5]) {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let e = b.instruction(main, "branch");
    let l = b.instruction(main, "x=3");
    let r = b.instruction(main, "x=4");
    let m = b.instruction(main, "merge");
    let x = b.instruction(main, "exit");
    b.edge(e, l);
    b.branch_edge(e, r);
    b.edge(l, m);
    b.edge(r, m);
    b.edge(m, x);
    b.mark_exit(x);
    (b.build(), [e, l, r, m, x])
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn fixed_point_is_stable_across_reruns() {
    let (graph, entry) = pass_through_graph();
    let seeds = vec![(entry, Zero, BinaryDomain::Bottom)];
    let problem = PassThroughTaint {
        graph: &graph,
        seeds,
    };
    let first = IdeSolver::new(&problem, &graph).solve().unwrap();
    let second = IdeSolver::new(&problem, &graph).solve().unwrap();
    assert!(first.results().table_eq(second.results()));
}

#[test]
fn worklist_order_does_not_change_the_fixed_point() {
    let (graph, entry) = pass_through_graph();
    let problem = PassThroughTaint {
        graph: &graph,
        seeds: vec![(entry, Zero, BinaryDomain::Bottom)],
    };
    let fifo = IdeSolver::new(&problem, &graph).solve().unwrap();
    let lifo = IdeSolver::with_config(
        &problem,
        &graph,
        SolverConfig {
            worklist_order: WorklistOrder::Lifo,
            ..SolverConfig::default()
        },
    )
    .solve()
    .unwrap();
    assert!(fifo.results().table_eq(lifo.results()));
}

#[test]
fn worklist_order_does_not_change_joined_values() {
    let (graph, [entry, _, _, merge, exit]) = diamond_graph();
    let problem = DiamondConst {
        graph: &graph,
        entry,
    };
    let fifo = IdeSolver::new(&problem, &graph).solve().unwrap();
    let lifo = IdeSolver::with_config(
        &problem,
        &graph,
        SolverConfig {
            worklist_order: WorklistOrder::Lifo,
            ..SolverConfig::default()
        },
    )
    .solve()
    .unwrap();

    // Conflicting constants widen at the merge regardless of order.
    assert_eq!(fifo.result_at(merge, &Var("x")), Lcp::Top);
    assert_eq!(fifo.result_at(exit, &Var("x")), Lcp::Top);
    assert!(fifo.results().table_eq(lifo.results()));
}

#[test]
fn reseeding_with_prior_results_reaches_the_same_table() {
    let (graph, entry) = pass_through_graph();
    let problem = PassThroughTaint {
        graph: &graph,
        seeds: vec![(entry, Zero, BinaryDomain::Bottom)],
    };
    let first = IdeSolver::new(&problem, &graph).solve().unwrap();

    // Seed the second run with everything the first run derived at the
    // original seed node; the table is already a fixed point, so nothing
    // may change.
    let reseeded: Vec<(InstrId, Fact, BinaryDomain)> = first
        .results_at(entry)
        .into_iter()
        .map(|(fact, value)| (entry, fact, value))
        .collect();
    let problem2 = PassThroughTaint {
        graph: &graph,
        seeds: reseeded,
    };
    let second = IdeSolver::new(&problem2, &graph).solve().unwrap();
    assert!(first.results().table_eq(second.results()));
}

// ============================================================================
// Invariant enforcement and failure semantics
// ============================================================================

/// Flow function that (illegally) drops every fact, including Λ.
struct DropEverything;

impl FlowFunction<Fact> for DropEverything {
    fn compute(&self, _fact: &Fact) -> HashSet<Fact> {
        HashSet::new()
    }
}

struct ZeroDropper<'g> {
    #[allow(dead_code)]
    graph: &'g ProgramGraph,
    entry: InstrId,
}

impl IfdsIdeProblem<ProgramGraph> for ZeroDropper<'_> {
    type Fact = Fact;
    type Value = BinaryDomain;
    type EdgeOp = NoOp;

    fn initial_seeds(&self) -> Vec<(InstrId, Fact, BinaryDomain)> {
        vec![(self.entry, Zero, BinaryDomain::Bottom)]
    }

    fn normal_flow(
        &self,
        _curr: InstrId,
        _succ: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(DropEverything))
    }

    fn call_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn return_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
        _exit: InstrId,
        _return_site: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn call_to_return_flow(
        &self,
        _call_site: InstrId,
        _return_site: InstrId,
        _callees: &[FunId],
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }
}

fn straight_line_graph() -> (ProgramGraph, InstrId) {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let n0 = b.instruction(main, "n0");
    let n1 = b.instruction(main, "n1");
    let n2 = b.instruction(main, "n2");
    b.edge(n0, n1);
    b.edge(n1, n2);
    b.mark_exit(n2);
    (b.build(), n0)
}

#[test]
fn dropping_the_zero_fact_is_an_invariant_violation() {
    let (graph, entry) = straight_line_graph();
    let problem = ZeroDropper {
        graph: &graph,
        entry,
    };
    let err = IdeSolver::new(&problem, &graph).solve().unwrap_err();
    match err {
        SolverError::InvariantViolation(msg) => {
            assert!(msg.contains("zero fact"));
            assert!(msg.contains("main::n0"));
        }
        other => panic!("expected InvariantViolation, got {other:?}"),
    }
}

#[test]
fn call_site_without_return_site_is_inconsistent() {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let callee = b.function("callee");
    let call = b.call_site(main, "dangling_call", &[callee]);
    let c0 = b.instruction(callee, "c0");
    b.mark_exit(c0);
    let graph = b.build();

    let problem = PassThroughTaint {
        graph: &graph,
        seeds: vec![(call, Zero, BinaryDomain::Bottom)],
    };
    let err = IdeSolver::new(&problem, &graph).solve().unwrap_err();
    assert!(matches!(err, SolverError::IcfgInconsistency(_)));
}

#[test]
fn exhausted_worklist_budget_aborts_the_solve() {
    let (graph, entry) = pass_through_graph();
    let problem = PassThroughTaint {
        graph: &graph,
        seeds: vec![(entry, Zero, BinaryDomain::Bottom)],
    };
    let err = IdeSolver::with_config(
        &problem,
        &graph,
        SolverConfig {
            max_worklist_steps: Some(1),
            ..SolverConfig::default()
        },
    )
    .solve()
    .unwrap_err();
    assert!(matches!(err, SolverError::ResourceExhausted(_)));
}

/// Factory that reports an error on the first normal-flow query.
struct FailingFactory {
    entry: InstrId,
}

impl IfdsIdeProblem<ProgramGraph> for FailingFactory {
    type Fact = Fact;
    type Value = BinaryDomain;
    type EdgeOp = NoOp;

    fn initial_seeds(&self) -> Vec<(InstrId, Fact, BinaryDomain)> {
        vec![(self.entry, Zero, BinaryDomain::Bottom)]
    }

    fn normal_flow(
        &self,
        _curr: InstrId,
        _succ: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Err(ProblemError::new("flow factory exploded"))
    }

    fn call_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn return_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
        _exit: InstrId,
        _return_site: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn call_to_return_flow(
        &self,
        _call_site: InstrId,
        _return_site: InstrId,
        _callees: &[FunId],
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }
}

#[test]
fn factory_errors_surface_unchanged() {
    let (graph, entry) = straight_line_graph();
    let problem = FailingFactory { entry };
    let err = IdeSolver::new(&problem, &graph).solve().unwrap_err();
    match err {
        SolverError::Problem(inner) => assert_eq!(inner.message(), "flow factory exploded"),
        other => panic!("expected Problem, got {other:?}"),
    }
}

#[test]
fn empty_callee_set_degrades_to_bypass() {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let m0 = b.instruction(main, "a=src");
    let m1 = b.call_site(main, "unresolved()", &[]);
    let m2 = b.instruction(main, "after");
    b.edge(m0, m1);
    b.edge(m1, m2);
    b.mark_exit(m2);
    let graph = b.build();

    let problem = PassThroughTaint {
        graph: &graph,
        seeds: vec![(m0, Zero, BinaryDomain::Bottom)],
    };
    let solution = IdeSolver::new(&problem, &graph).solve().unwrap();

    // The bypass lane still runs and the degradation is counted.
    assert!(solution.results_at(m2).contains_key(&Var("a")));
    assert!(solution.stats().num_calls_without_callees >= 1);
}

// ============================================================================
// Problem-supplied summaries
// ============================================================================

/// Uses a precomputed summary for `lib`: `a` additionally taints `s` at the
/// return site, and the callee body is never explored.
struct SummarisedCall<'g> {
    graph: &'g ProgramGraph,
    entry: InstrId,
}

impl IfdsIdeProblem<ProgramGraph> for SummarisedCall<'_> {
    type Fact = Fact;
    type Value = BinaryDomain;
    type EdgeOp = NoOp;

    fn initial_seeds(&self) -> Vec<(InstrId, Fact, BinaryDomain)> {
        vec![(self.entry, Zero, BinaryDomain::Bottom)]
    }

    fn normal_flow(
        &self,
        curr: InstrId,
        _succ: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(match label(self.graph, curr).as_str() {
            "a=src" => Box::new(Gen {
                gen: Var("a"),
                from: Zero,
            }),
            _ => Box::new(Identity),
        })
    }

    fn call_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn return_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
        _exit: InstrId,
        _return_site: InstrId,
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn call_to_return_flow(
        &self,
        _call_site: InstrId,
        _return_site: InstrId,
        _callees: &[FunId],
    ) -> Result<FlowFunctionRef<Fact>, ProblemError> {
        Ok(Box::new(Identity))
    }

    fn summary_flow(
        &self,
        _call_site: InstrId,
        _callee: &FunId,
    ) -> Option<FlowFunctionRef<Fact>> {
        Some(Box::new(Gen {
            gen: Var("s"),
            from: Var("a"),
        }))
    }
}

#[test]
fn problem_summary_replaces_callee_exploration() {
    let mut b = ProgramGraphBuilder::new();
    let main = b.function("main");
    let lib = b.function("lib");

    let m0 = b.instruction(main, "a=src");
    let m1 = b.call_site(main, "lib()", &[lib]);
    let m2 = b.instruction(main, "after");
    b.edge(m0, m1);
    b.edge(m1, m2);
    b.mark_exit(m2);

    let l0 = b.instruction(lib, "body");
    b.mark_exit(l0);
    let graph = b.build();

    let problem = SummarisedCall {
        graph: &graph,
        entry: m0,
    };
    let solution = IdeSolver::new(&problem, &graph).solve().unwrap();

    // The summary produced s at the return site.
    assert!(solution.results_at(m2).contains_key(&Var("s")));
    assert!(solution.results_at(m2).contains_key(&Var("a")));
    // The callee body was never explored.
    assert!(solution.results_at(l0).is_empty());
    assert_eq!(solution.stats().num_incoming_entries, 0);
    assert!(solution.stats().num_problem_summaries_applied > 0);
}
