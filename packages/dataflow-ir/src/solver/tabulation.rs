/*
 * IFDS/IDE tabulation solver
 *
 * Implements the worklist-based tabulation algorithm over a lazily explored
 * exploded supergraph:
 *
 * 1. Seed path edges (n0, d0; n0, d0) with the identity jump function.
 * 2. Pop a path edge (sp, d1; n, d2) and dispatch on the kind of n:
 *    - call site: map facts into callees, record incoming, replay cached end
 *      summaries, and propagate the bypass lane through call-to-return
 *    - exit: record an end summary and splice the callee's effect into every
 *      caller context recorded in the incoming table
 *    - ordinary: apply the normal flow to each successor
 * 3. Merge jump functions on re-discovery: equal is a no-op, otherwise join
 *    and re-enqueue. Termination follows from lattice boundedness.
 * 4. After reachability stabilises, propagate values: seed entry values,
 *    push them through call edges into callee entries to a fixed point, then
 *    evaluate every jump function at its entry value and join into the
 *    result table.
 *
 * The solve is pure over its inputs and never retries: the first factory
 * error or broken invariant aborts it, and no partial results are returned.
 *
 * References:
 * - Reps, Horwitz, Sagiv (1995): "Precise Interprocedural Dataflow Analysis
 *   via Graph Reachability"
 * - Sagiv, Reps, Horwitz (1996): "Precise Interprocedural Dataflow Analysis
 *   with Applications to Constant Propagation"
 */

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, trace};

use crate::edge::{EdgeFn, EdgeFunctionTable};
use crate::errors::{Result, SolverError};
use crate::flow::{DataflowFact, FlowFunction};
use crate::icfg::Icfg;
use crate::lattice::JoinLattice;
use crate::problem::IfdsIdeProblem;
use crate::solver::results::SolverResults;

/// Worklist discipline for phase I.
///
/// The final fixed point is order independent; the alternate order exists so
/// that callers (and the test suite) can demonstrate exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorklistOrder {
    #[default]
    Fifo,
    Lifo,
}

/// Solver configuration.
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    pub worklist_order: WorklistOrder,
    /// Abort with `ResourceExhausted` when the path-edge count passes this.
    pub max_path_edges: Option<usize>,
    /// Abort with `ResourceExhausted` when phase I pops more items than this.
    pub max_worklist_steps: Option<usize>,
}

/// Counters populated during a solve.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverStats {
    /// Distinct path edges discovered.
    pub num_path_edges: usize,
    /// Jump-function entries updated by a join after re-discovery.
    pub num_jump_function_updates: usize,
    /// End summaries recorded at callee exits.
    pub num_end_summaries: usize,
    /// Summaries spliced into caller contexts.
    pub num_summary_applications: usize,
    /// Precomputed problem summaries applied at call sites.
    pub num_problem_summaries_applied: usize,
    /// Entries in the incoming table.
    pub num_incoming_entries: usize,
    /// Worklist items processed in phase I.
    pub num_worklist_steps: usize,
    /// Call sites whose callee set was empty (degraded to bypass only).
    pub num_calls_without_callees: usize,
    /// Value-table updates in phase II.
    pub num_value_propagations: usize,
    /// Distinct edge functions interned.
    pub num_edge_functions: usize,
    /// Intern-table hits (structural sharing).
    pub num_intern_hits: usize,
    /// Wall-clock time of the whole solve.
    pub analysis_time_ms: u64,
}

/// Path edge (sp, d1; n, d2): fact d2 is reachable at n from fact d1 at the
/// start point sp of n's function. The associated jump function lives in the
/// jump-function table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathEdge<N, D> {
    source_node: N,
    source_fact: D,
    target_node: N,
    target_fact: D,
}

/// A completed solve: the result table plus solve statistics.
#[derive(Debug)]
pub struct IdeSolution<N, D, L> {
    results: SolverResults<N, D, L>,
    stats: SolverStats,
}

impl<N, D, L> IdeSolution<N, D, L>
where
    N: Copy + Eq + Ord + std::hash::Hash + std::fmt::Debug,
    D: DataflowFact,
    L: JoinLattice,
{
    /// Value at `(node, fact)`; ⊤ when the pair was never reached.
    pub fn result_at(&self, node: N, fact: &D) -> L {
        self.results.result_at(node, fact)
    }

    /// All facts recorded at `node` with their values.
    pub fn results_at(&self, node: N) -> FxHashMap<D, L> {
        self.results.results_at(node)
    }

    pub fn results(&self) -> &SolverResults<N, D, L> {
        &self.results
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Text dump of the whole table.
    pub fn dump_results<W: std::io::Write>(
        &self,
        writer: &mut W,
        node_str: impl Fn(N) -> String,
        fact_str: impl Fn(&D) -> String,
        value_str: impl Fn(&L) -> String,
    ) -> std::io::Result<()> {
        self.results.dump(writer, node_str, fact_str, value_str)
    }
}

/// The tabulation solver.
///
/// Generic over the ICFG and the problem; owns all tabulation state. The
/// ICFG and problem are shared-read collaborators and are never mutated.
pub struct IdeSolver<'a, I: Icfg, P: IfdsIdeProblem<I>> {
    problem: &'a P,
    icfg: &'a I,
    config: SolverConfig,
    table: EdgeFunctionTable<P::EdgeOp, P::Value>,
    /// (n, d2) -> (sp, d1) -> jump function
    jump_functions: FxHashMap<(I::Node, P::Fact), FxHashMap<(I::Node, P::Fact), EdgeFn>>,
    /// (sp, d1) -> (n, d2) -> jump function (forward view for phase II)
    jump_forward: FxHashMap<(I::Node, P::Fact), FxHashMap<(I::Node, P::Fact), EdgeFn>>,
    /// (sp, d1) -> (exit, d_exit) -> summary function
    end_summaries: FxHashMap<(I::Node, P::Fact), FxHashMap<(I::Node, P::Fact), EdgeFn>>,
    /// (sp, d1) -> call site -> caller facts that reached it
    incoming: FxHashMap<(I::Node, P::Fact), FxHashMap<I::Node, HashSet<P::Fact>>>,
    worklist: VecDeque<PathEdge<I::Node, P::Fact>>,
    /// (entry node, entry fact) -> lattice value (phase II)
    values: FxHashMap<(I::Node, P::Fact), P::Value>,
    stats: SolverStats,
}

impl<'a, I, P> IdeSolver<'a, I, P>
where
    I: Icfg,
    P: IfdsIdeProblem<I>,
{
    pub fn new(problem: &'a P, icfg: &'a I) -> Self {
        Self::with_config(problem, icfg, SolverConfig::default())
    }

    pub fn with_config(problem: &'a P, icfg: &'a I, config: SolverConfig) -> Self {
        Self {
            problem,
            icfg,
            config,
            table: EdgeFunctionTable::new(),
            jump_functions: FxHashMap::default(),
            jump_forward: FxHashMap::default(),
            end_summaries: FxHashMap::default(),
            incoming: FxHashMap::default(),
            worklist: VecDeque::new(),
            values: FxHashMap::default(),
            stats: SolverStats::default(),
        }
    }

    /// Run tabulation to the fixed point and compute per-statement values.
    pub fn solve(mut self) -> Result<IdeSolution<I::Node, P::Fact, P::Value>> {
        let started = Instant::now();

        self.seed();
        debug!(
            seeds = self.values.len(),
            "tabulation phase started"
        );
        self.tabulate()?;
        debug!(
            path_edges = self.stats.num_path_edges,
            end_summaries = self.stats.num_end_summaries,
            "value phase started"
        );
        let results = self.compute_values()?;

        self.stats.num_edge_functions = self.table.len();
        self.stats.num_intern_hits = self.table.intern_hits();
        self.stats.analysis_time_ms = started.elapsed().as_millis() as u64;

        Ok(IdeSolution {
            results,
            stats: self.stats,
        })
    }

    // ------------------------------------------------------------------
    // Phase I: tabulation
    // ------------------------------------------------------------------

    fn seed(&mut self) {
        let zero = self.problem.zero_fact();
        let identity = self.table.identity();
        for (node, fact, value) in self.problem.initial_seeds() {
            self.join_value(node, fact.clone(), value);
            self.propagate(node, fact.clone(), node, fact, identity);
            // Implicit zero lane at every seeded entry.
            self.join_value(node, zero.clone(), P::Value::bottom());
            self.propagate(node, zero.clone(), node, zero.clone(), identity);
        }
    }

    fn tabulate(&mut self) -> Result<()> {
        while let Some(edge) = self.pop() {
            self.stats.num_worklist_steps += 1;
            if let Some(max) = self.config.max_worklist_steps {
                if self.stats.num_worklist_steps > max {
                    return Err(SolverError::ResourceExhausted(format!(
                        "worklist step budget of {max} exceeded"
                    )));
                }
            }
            if let Some(max) = self.config.max_path_edges {
                if self.stats.num_path_edges > max {
                    return Err(SolverError::ResourceExhausted(format!(
                        "path edge budget of {max} exceeded"
                    )));
                }
            }

            let jf = self.jump_function_of(&edge);
            let n = edge.target_node;
            if self.icfg.is_call_site(n) {
                self.process_call(&edge, jf)?;
            } else if self.icfg.is_exit_inst(n) {
                self.process_exit(&edge, jf)?;
            } else {
                self.process_normal(&edge, jf)?;
            }
        }
        Ok(())
    }

    fn pop(&mut self) -> Option<PathEdge<I::Node, P::Fact>> {
        match self.config.worklist_order {
            WorklistOrder::Fifo => self.worklist.pop_front(),
            WorklistOrder::Lifo => self.worklist.pop_back(),
        }
    }

    fn jump_function_of(&self, edge: &PathEdge<I::Node, P::Fact>) -> EdgeFn {
        self.jump_functions
            .get(&(edge.target_node, edge.target_fact.clone()))
            .and_then(|sources| sources.get(&(edge.source_node, edge.source_fact.clone())))
            .copied()
            .unwrap_or_else(|| self.table.identity())
    }

    /// Insert or merge a jump function and enqueue the path edge when it
    /// carried new information.
    fn propagate(
        &mut self,
        sp: I::Node,
        d1: P::Fact,
        target: I::Node,
        d2: P::Fact,
        f: EdgeFn,
    ) {
        let target_key = (target, d2.clone());
        let source_key = (sp, d1.clone());
        let existing = self
            .jump_functions
            .get(&target_key)
            .and_then(|sources| sources.get(&source_key))
            .copied();

        let merged = match existing {
            None => f,
            Some(old) => {
                if self.table.equal(old, f) {
                    return;
                }
                let joined = self.table.join(old, f);
                if self.table.equal(joined, old) {
                    // Subsumed: nothing new flows along this edge.
                    return;
                }
                joined
            }
        };

        self.jump_functions
            .entry(target_key.clone())
            .or_default()
            .insert(source_key.clone(), merged);
        self.jump_forward
            .entry(source_key)
            .or_default()
            .insert(target_key, merged);

        if existing.is_none() {
            self.stats.num_path_edges += 1;
        } else {
            self.stats.num_jump_function_updates += 1;
        }

        self.worklist.push_back(PathEdge {
            source_node: sp,
            source_fact: d1,
            target_node: target,
            target_fact: d2,
        });
    }

    /// Apply a flow function, enforcing the zero-fact identity lane.
    fn apply_flow(
        &self,
        kind: &str,
        ff: &dyn FlowFunction<P::Fact>,
        fact: &P::Fact,
        at: I::Node,
    ) -> Result<HashSet<P::Fact>> {
        let out = ff.compute(fact);
        if fact.is_zero() && !out.contains(fact) {
            return Err(SolverError::zero_fact_dropped(
                kind,
                self.icfg.statement_id(at),
            ));
        }
        Ok(out)
    }

    fn process_normal(&mut self, edge: &PathEdge<I::Node, P::Fact>, jf: EdgeFn) -> Result<()> {
        let n = edge.target_node;
        let d2 = edge.target_fact.clone();
        for succ in self.icfg.successors_of(n) {
            let ff = self.problem.normal_flow(n, succ)?;
            for d3 in self.apply_flow("normal", ff.as_ref(), &d2, n)? {
                let spec = self.problem.normal_edge_function(n, &d2, succ, &d3)?;
                let ef = self.table.intern(spec);
                let composed = self.table.compose(jf, ef);
                self.propagate(
                    edge.source_node,
                    edge.source_fact.clone(),
                    succ,
                    d3,
                    composed,
                );
            }
        }
        Ok(())
    }

    fn process_call(&mut self, edge: &PathEdge<I::Node, P::Fact>, jf: EdgeFn) -> Result<()> {
        let n = edge.target_node;
        let d2 = edge.target_fact.clone();
        let ret_sites = self.icfg.return_sites_of_call_at(n);
        if ret_sites.is_empty() {
            return Err(SolverError::IcfgInconsistency(format!(
                "call site '{}' has no return site",
                self.icfg.statement_id(n)
            )));
        }
        let callees = self.icfg.callees_of_call_at(n);
        if callees.is_empty() {
            self.stats.num_calls_without_callees += 1;
            debug!(
                call_site = %self.icfg.statement_id(n),
                "call site without resolved callees, bypass lane only"
            );
        }

        for callee in &callees {
            // A problem-supplied summary replaces callee exploration.
            if let Some(sf) = self.problem.summary_flow(n, callee) {
                self.stats.num_problem_summaries_applied += 1;
                for d3 in self.apply_flow("summary", sf.as_ref(), &d2, n)? {
                    for &r in &ret_sites {
                        let spec = self.problem.summary_edge_function(n, &d2, r, &d3)?;
                        let sef = self.table.intern(spec);
                        let composed = self.table.compose(jf, sef);
                        self.propagate(
                            edge.source_node,
                            edge.source_fact.clone(),
                            r,
                            d3.clone(),
                            composed,
                        );
                    }
                }
                continue;
            }

            let start_points = self.icfg.start_points_of(callee);
            if start_points.is_empty() {
                return Err(SolverError::IcfgInconsistency(format!(
                    "function '{}' called at '{}' has no start point",
                    self.icfg.function_name(callee),
                    self.icfg.statement_id(n)
                )));
            }

            let cff = self.problem.call_flow(n, callee)?;
            for d3 in self.apply_flow("call", cff.as_ref(), &d2, n)? {
                for &sp_callee in &start_points {
                    // Self-loop path edge at the callee entry.
                    let identity = self.table.identity();
                    self.propagate(
                        sp_callee,
                        d3.clone(),
                        sp_callee,
                        d3.clone(),
                        identity,
                    );

                    // Remember who called, for exit-time splicing.
                    let inserted = self
                        .incoming
                        .entry((sp_callee, d3.clone()))
                        .or_default()
                        .entry(n)
                        .or_default()
                        .insert(d2.clone());
                    if inserted {
                        self.stats.num_incoming_entries += 1;
                    }

                    // Replay end summaries this callee entry already has.
                    let summaries = self
                        .end_summaries
                        .get(&(sp_callee, d3.clone()))
                        .cloned()
                        .unwrap_or_default();
                    for ((exit_node, d_exit), summary_f) in summaries {
                        for &r in &ret_sites {
                            let rff = self.problem.return_flow(n, callee, exit_node, r)?;
                            for d5 in self.apply_flow("return", rff.as_ref(), &d_exit, exit_node)? {
                                let cef_spec =
                                    self.problem.call_edge_function(n, &d2, callee, &d3)?;
                                let ref_spec = self.problem.return_edge_function(
                                    n, callee, exit_node, &d_exit, r, &d5,
                                )?;
                                let cef = self.table.intern(cef_spec);
                                let ref_fn = self.table.intern(ref_spec);
                                let into_callee = self.table.compose(jf, cef);
                                let through = self.table.compose(into_callee, summary_f);
                                let total = self.table.compose(through, ref_fn);
                                self.stats.num_summary_applications += 1;
                                self.propagate(
                                    edge.source_node,
                                    edge.source_fact.clone(),
                                    r,
                                    d5,
                                    total,
                                );
                            }
                        }
                    }
                }
            }
        }

        // Bypass lane, queried regardless of the callee set.
        for &r in &ret_sites {
            let ctr = self.problem.call_to_return_flow(n, r, &callees)?;
            for d3 in self.apply_flow("call-to-return", ctr.as_ref(), &d2, n)? {
                let spec = self
                    .problem
                    .call_to_return_edge_function(n, &d2, r, &d3, &callees)?;
                let ef = self.table.intern(spec);
                let composed = self.table.compose(jf, ef);
                self.propagate(edge.source_node, edge.source_fact.clone(), r, d3, composed);
            }
        }
        Ok(())
    }

    fn process_exit(&mut self, edge: &PathEdge<I::Node, P::Fact>, jf: EdgeFn) -> Result<()> {
        let n = edge.target_node;
        let d2 = edge.target_fact.clone();
        let sp = edge.source_node;
        let d1 = edge.source_fact.clone();
        let fun = self.icfg.function_of(n);

        // Record (or widen) the end summary for this callee entry.
        let existing = self
            .end_summaries
            .get(&(sp, d1.clone()))
            .and_then(|m| m.get(&(n, d2.clone())))
            .copied();
        let summary_f = match existing {
            None => {
                self.stats.num_end_summaries += 1;
                jf
            }
            Some(old) => self.table.join(old, jf),
        };
        self.end_summaries
            .entry((sp, d1.clone()))
            .or_default()
            .insert((n, d2.clone()), summary_f);

        // Splice the callee's effect into every recorded caller.
        let callers = match self.incoming.get(&(sp, d1.clone())) {
            Some(map) => map.clone(),
            None => {
                trace!(
                    exit = %self.icfg.statement_id(n),
                    "exit without incoming callers (entry function)"
                );
                return Ok(());
            }
        };

        for (call_site, caller_facts) in callers {
            for r in self.icfg.return_sites_of_call_at(call_site) {
                let rff = self.problem.return_flow(call_site, &fun, n, r)?;
                let d5s = self.apply_flow("return", rff.as_ref(), &d2, n)?;
                for d4 in &caller_facts {
                    let cef_spec = self.problem.call_edge_function(call_site, d4, &fun, &d1)?;
                    let cef = self.table.intern(cef_spec);
                    for d5 in &d5s {
                        let ref_spec = self
                            .problem
                            .return_edge_function(call_site, &fun, n, &d2, r, d5)?;
                        let ref_fn = self.table.intern(ref_spec);
                        let into_callee = self.table.compose(cef, summary_f);
                        let through = self.table.compose(into_callee, ref_fn);

                        // Every caller context that reached (call_site, d4).
                        let caller_contexts = self
                            .jump_functions
                            .get(&(call_site, d4.clone()))
                            .cloned()
                            .unwrap_or_default();
                        for ((sp_caller, d3_caller), jf_caller) in caller_contexts {
                            let total = self.table.compose(jf_caller, through);
                            self.stats.num_summary_applications += 1;
                            self.propagate(sp_caller, d3_caller, r, d5.clone(), total);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase II: value computation
    // ------------------------------------------------------------------

    fn join_value(&mut self, node: I::Node, fact: P::Fact, value: P::Value) -> bool {
        let key = (node, fact);
        match self.values.get(&key) {
            Some(current) => {
                let joined = current.join(&value);
                if joined != *current {
                    self.values.insert(key, joined);
                    true
                } else {
                    false
                }
            }
            None => {
                self.values.insert(key, value);
                true
            }
        }
    }

    fn compute_values(&mut self) -> Result<SolverResults<I::Node, P::Fact, P::Value>> {
        // Push entry values through call edges until stable.
        let mut worklist: VecDeque<(I::Node, P::Fact)> = self.values.keys().cloned().collect();
        while let Some((sp, d1)) = worklist.pop_front() {
            let value = match self.values.get(&(sp, d1.clone())) {
                Some(v) => v.clone(),
                None => continue,
            };
            let targets = match self.jump_forward.get(&(sp, d1.clone())) {
                Some(t) => t.clone(),
                None => continue,
            };
            for ((n, d2), jf) in targets {
                if !self.icfg.is_call_site(n) {
                    continue;
                }
                let value_at_call = self.table.compute(jf, &value);
                for callee in self.icfg.callees_of_call_at(n) {
                    if self.problem.summary_flow(n, &callee).is_some() {
                        // Summarised callees are never entered.
                        continue;
                    }
                    let cff = self.problem.call_flow(n, &callee)?;
                    for d3 in self.apply_flow("call", cff.as_ref(), &d2, n)? {
                        let cef_spec = self.problem.call_edge_function(n, &d2, &callee, &d3)?;
                        let cef = self.table.intern(cef_spec);
                        let entry_value = self.table.compute(cef, &value_at_call);
                        for sp_callee in self.icfg.start_points_of(&callee) {
                            if self.join_value(sp_callee, d3.clone(), entry_value.clone()) {
                                self.stats.num_value_propagations += 1;
                                worklist.push_back((sp_callee, d3.clone()));
                            }
                        }
                    }
                }
            }
        }

        // Evaluate every jump function at its entry value.
        let mut results = SolverResults::new();
        for ((target, d2), sources) in &self.jump_functions {
            for ((sp, d1), jf) in sources {
                if let Some(entry_value) = self.values.get(&(*sp, d1.clone())) {
                    let value = self.table.compute(*jf, entry_value);
                    results.insert(*target, d2.clone(), value);
                }
            }
        }
        Ok(results)
    }
}
