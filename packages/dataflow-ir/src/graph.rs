/*
 * Concrete in-memory ICFG
 *
 * A program graph built from opaque instructions grouped into functions,
 * with intra-procedural edges and call-site/callee linkage. Drivers lower
 * their IR into this structure; the test suites build their miniature
 * programs with it. Doubles as the IR-database surface: iteration over all
 * functions and globals.
 *
 * Determinism: all query results iterate in insertion order, which makes
 * solver runs reproducible statement by statement.
 */

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::icfg::{Icfg, SpecialMemberKind};

/// Opaque instruction identity, stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(NodeIndex);

/// Opaque function identity, stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunId(u32);

impl FunId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct InstrData {
    label: String,
    fun: FunId,
    /// Callee set when this instruction is a call site.
    callees: Option<Vec<FunId>>,
    is_exit: bool,
}

#[derive(Debug, Clone)]
struct FunctionData {
    name: String,
    instructions: Vec<InstrId>,
    starts: Vec<InstrId>,
    exits: Vec<InstrId>,
    callers: Vec<InstrId>,
    heap_allocating: bool,
    special: Option<SpecialMemberKind>,
}

/// Edge payload: `true` when the edge is a branch target rather than the
/// fall-through successor.
type BranchFlag = bool;

/// In-memory interprocedural control-flow graph.
pub struct ProgramGraph {
    graph: DiGraph<InstrData, BranchFlag>,
    functions: Vec<FunctionData>,
    globals: Vec<String>,
}

impl ProgramGraph {
    /// All functions, in registration order.
    pub fn functions(&self) -> impl Iterator<Item = FunId> + '_ {
        (0..self.functions.len()).map(|i| FunId(i as u32))
    }

    /// All registered globals, in registration order.
    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FunId(i as u32))
    }

    fn data(&self, node: InstrId) -> &InstrData {
        &self.graph[node.0]
    }

    /// petgraph iterates neighbours most-recent-first; reverse restores
    /// insertion order.
    fn ordered_neighbors(&self, node: InstrId, dir: Direction) -> Vec<InstrId> {
        let mut out: Vec<InstrId> = self
            .graph
            .neighbors_directed(node.0, dir)
            .map(InstrId)
            .collect();
        out.reverse();
        out
    }
}

impl Icfg for ProgramGraph {
    type Node = InstrId;
    type Fun = FunId;

    fn function_of(&self, node: InstrId) -> FunId {
        self.data(node).fun
    }

    fn predecessors_of(&self, node: InstrId) -> Vec<InstrId> {
        self.ordered_neighbors(node, Direction::Incoming)
    }

    fn successors_of(&self, node: InstrId) -> Vec<InstrId> {
        self.ordered_neighbors(node, Direction::Outgoing)
    }

    fn start_points_of(&self, fun: &FunId) -> Vec<InstrId> {
        self.functions[fun.index()].starts.clone()
    }

    fn exit_points_of(&self, fun: &FunId) -> Vec<InstrId> {
        self.functions[fun.index()].exits.clone()
    }

    fn is_call_site(&self, node: InstrId) -> bool {
        self.data(node).callees.is_some()
    }

    fn is_exit_inst(&self, node: InstrId) -> bool {
        self.data(node).is_exit
    }

    fn is_start_point(&self, node: InstrId) -> bool {
        self.functions[self.data(node).fun.index()]
            .starts
            .contains(&node)
    }

    fn callees_of_call_at(&self, node: InstrId) -> Vec<FunId> {
        self.data(node).callees.clone().unwrap_or_default()
    }

    fn callers_of(&self, fun: &FunId) -> Vec<InstrId> {
        self.functions[fun.index()].callers.clone()
    }

    fn return_sites_of_call_at(&self, node: InstrId) -> Vec<InstrId> {
        // The intra-procedural successors of a call site are its return
        // sites; exceptional flow contributes additional successors.
        self.successors_of(node)
    }

    fn is_branch_target(&self, node: InstrId, succ: InstrId) -> bool {
        self.graph
            .edges_connecting(node.0, succ.0)
            .any(|e| *e.weight())
    }

    fn is_fall_through_successor(&self, node: InstrId, succ: InstrId) -> bool {
        self.graph
            .edges_connecting(node.0, succ.0)
            .any(|e| !*e.weight())
    }

    fn is_heap_allocating_function(&self, fun: &FunId) -> bool {
        self.functions[fun.index()].heap_allocating
    }

    fn special_member_kind(&self, fun: &FunId) -> Option<SpecialMemberKind> {
        self.functions[fun.index()].special
    }

    fn all_instructions_of(&self, fun: &FunId) -> Vec<InstrId> {
        self.functions[fun.index()].instructions.clone()
    }

    fn statement_id(&self, node: InstrId) -> String {
        let data = self.data(node);
        format!(
            "{}::{}",
            self.functions[data.fun.index()].name,
            data.label
        )
    }

    fn function_name(&self, fun: &FunId) -> String {
        self.functions[fun.index()].name.clone()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ProgramGraph`].
///
/// The first instruction added to a function becomes its start point unless
/// `mark_start` overrides that. Exits are explicit. Call sites name their
/// callee set up front; return sites are the call's intra-procedural
/// successors.
pub struct ProgramGraphBuilder {
    graph: DiGraph<InstrData, BranchFlag>,
    functions: Vec<FunctionData>,
    by_name: FxHashMap<String, FunId>,
    globals: Vec<String>,
    explicit_starts: Vec<bool>,
}

impl ProgramGraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            functions: Vec::new(),
            by_name: FxHashMap::default(),
            globals: Vec::new(),
            explicit_starts: Vec::new(),
        }
    }

    /// Register a function (idempotent per name).
    pub fn function(&mut self, name: impl Into<String>) -> FunId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = FunId(self.functions.len() as u32);
        self.functions.push(FunctionData {
            name: name.clone(),
            instructions: Vec::new(),
            starts: Vec::new(),
            exits: Vec::new(),
            callers: Vec::new(),
            heap_allocating: false,
            special: None,
        });
        self.explicit_starts.push(false);
        self.by_name.insert(name, id);
        id
    }

    fn add_instr(&mut self, fun: FunId, label: String, callees: Option<Vec<FunId>>) -> InstrId {
        let node = InstrId(self.graph.add_node(InstrData {
            label,
            fun,
            callees,
            is_exit: false,
        }));
        let data = &mut self.functions[fun.index()];
        if data.instructions.is_empty() && !self.explicit_starts[fun.index()] {
            data.starts.push(node);
        }
        data.instructions.push(node);
        node
    }

    /// Add an ordinary instruction.
    pub fn instruction(&mut self, fun: FunId, label: impl Into<String>) -> InstrId {
        self.add_instr(fun, label.into(), None)
    }

    /// Add a call site with its resolved callee set.
    pub fn call_site(
        &mut self,
        fun: FunId,
        label: impl Into<String>,
        callees: &[FunId],
    ) -> InstrId {
        let node = self.add_instr(fun, label.into(), Some(callees.to_vec()));
        for callee in callees {
            self.functions[callee.index()].callers.push(node);
        }
        node
    }

    /// Add a fall-through edge.
    pub fn edge(&mut self, from: InstrId, to: InstrId) {
        self.graph.add_edge(from.0, to.0, false);
    }

    /// Add a branch-target edge.
    pub fn branch_edge(&mut self, from: InstrId, to: InstrId) {
        self.graph.add_edge(from.0, to.0, true);
    }

    /// Override the automatic first-instruction start point.
    pub fn mark_start(&mut self, node: InstrId) {
        let fun = self.graph[node.0].fun;
        let data = &mut self.functions[fun.index()];
        if !self.explicit_starts[fun.index()] {
            data.starts.clear();
            self.explicit_starts[fun.index()] = true;
        }
        if !data.starts.contains(&node) {
            data.starts.push(node);
        }
    }

    /// Mark an instruction as an exit of its function.
    pub fn mark_exit(&mut self, node: InstrId) {
        self.graph[node.0].is_exit = true;
        let fun = self.graph[node.0].fun;
        let data = &mut self.functions[fun.index()];
        if !data.exits.contains(&node) {
            data.exits.push(node);
        }
    }

    pub fn mark_heap_allocating(&mut self, fun: FunId) {
        self.functions[fun.index()].heap_allocating = true;
    }

    pub fn mark_special_member(&mut self, fun: FunId, kind: SpecialMemberKind) {
        self.functions[fun.index()].special = Some(kind);
    }

    /// Register a global value name.
    pub fn global(&mut self, name: impl Into<String>) {
        self.globals.push(name.into());
    }

    pub fn build(self) -> ProgramGraph {
        ProgramGraph {
            graph: self.graph,
            functions: self.functions,
            globals: self.globals,
        }
    }
}

impl Default for ProgramGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
