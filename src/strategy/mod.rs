// =============================================================================
// Strategy module — indicator snapshots and the Strategy Evaluator (C4)
// =============================================================================

pub mod evaluator;
pub mod snapshot;

pub use evaluator::{EvaluatorInputs, Intent, StrategyEvaluator};
pub use snapshot::{build_snapshot, IndicatorSnapshot};
