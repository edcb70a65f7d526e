//! Error types for dataflow-ir
//!
//! Provides unified error handling across the crate. Every failure during a
//! solve is fatal: the solver never retries and never commits partial results.

use thiserror::Error;

/// Error raised by an analysis problem's flow or edge function factories.
///
/// Factories are the only problem-side code the solver calls during
/// tabulation; whatever they report is surfaced unchanged from `solve()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProblemError {
    message: String,
}

impl ProblemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Main error type for solver operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// A documented algebraic contract was broken by the analysis problem,
    /// e.g. a flow function that drops the zero fact.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The interprocedural control-flow graph contradicts its own guarantees,
    /// e.g. a call site without any return site.
    #[error("inconsistent ICFG: {0}")]
    IcfgInconsistency(String),

    /// Factory-originated error, surfaced unchanged.
    #[error("analysis problem error: {0}")]
    Problem(#[from] ProblemError),

    /// A configured resource budget was exceeded mid-solve.
    #[error("resource limit exceeded: {0}")]
    ResourceExhausted(String),
}

impl SolverError {
    /// Invariant violation for a flow function that lost the zero fact.
    pub(crate) fn zero_fact_dropped(kind: &str, at: impl AsRef<str>) -> Self {
        SolverError::InvariantViolation(format!(
            "{} flow function dropped the zero fact at '{}'",
            kind,
            at.as_ref()
        ))
    }
}

/// Result type alias for solver operations
pub type Result<T> = std::result::Result<T, SolverError>;
