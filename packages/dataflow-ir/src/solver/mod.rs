//! Tabulation solver
//!
//! Worklist-based IFDS/IDE tabulation over a lazily explored exploded
//! supergraph, plus the per-statement result container it produces.

pub mod results;
pub mod tabulation;

pub use results::SolverResults;
pub use tabulation::{IdeSolution, IdeSolver, SolverConfig, SolverStats, WorklistOrder};
