// =============================================================================
// Execution module — Executor (C6)
// =============================================================================

pub mod executor;

pub use executor::{ExecutionOutcome, Executor};
