/*
 * dataflow-ir - Interprocedural IFDS/IDE Dataflow Engine
 *
 * Core engine for interprocedural, finite, distributive subset problems
 * (IFDS) and their environment-valued extension (IDE), solved by worklist
 * tabulation over a lazily explored exploded supergraph.
 *
 * Layering (leaves first):
 * - lattice/   : bounded join-semilattice primitives
 * - flow/      : flow-function algebra over dataflow facts (zero fact Λ)
 * - edge/      : edge-function algebra with composition, join and interning
 * - icfg/      : interprocedural CFG query abstraction + in-memory graph
 * - problem/   : analysis-problem interface (factories, seeds, printers)
 * - solver/    : tabulation solver (path edges, summaries, jump functions)
 *
 * The engine consumes an ICFG provider, a type hierarchy and an alias
 * provider as read-only collaborators; IR loading, call-graph construction
 * and concrete analysis problems live outside this crate.
 *
 * References:
 * - Reps, Horwitz, Sagiv (1995): "Precise Interprocedural Dataflow Analysis
 *   via Graph Reachability"
 * - Sagiv, Reps, Horwitz (1996): "Precise Interprocedural Dataflow Analysis
 *   with Applications to Constant Propagation"
 */

#![allow(clippy::type_complexity)] // Solver tables are nested maps by design
#![allow(clippy::too_many_arguments)] // Edge factories mirror supergraph edges

/// Lattice primitives
pub mod lattice;

/// Flow-function algebra
pub mod flow;

/// Edge-function algebra and interning
pub mod edge;

/// ICFG query abstraction
pub mod icfg;

/// Concrete in-memory ICFG
pub mod graph;

/// Type-hierarchy collaborator
pub mod hierarchy;

/// Alias-provider collaborator
pub mod alias;

/// Analysis-problem interface
pub mod problem;

/// Tabulation solver and result container
pub mod solver;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for the public API
// ═══════════════════════════════════════════════════════════════════════════

pub use alias::{AliasInfo, AliasResult, ProgramAliasInfo};
pub use edge::{EdgeFn, EdgeFunction, EdgeFunctionTable, EdgeOp, NoOp};
pub use errors::{ProblemError, Result, SolverError};
pub use flow::{DataflowFact, FlowFunction, FlowFunctionRef};
pub use graph::{FunId, InstrId, ProgramGraph, ProgramGraphBuilder};
pub use hierarchy::{ProgramTypeHierarchy, TypeHierarchy};
pub use icfg::{Icfg, SpecialMemberKind};
pub use lattice::{BinaryDomain, JoinLattice};
pub use problem::IfdsIdeProblem;
pub use solver::{IdeSolution, IdeSolver, SolverConfig, SolverResults, SolverStats, WorklistOrder};
