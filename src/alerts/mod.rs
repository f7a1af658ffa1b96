//! User price alerts: management and periodic evaluation.

pub mod evaluator;
pub mod manager;

pub use evaluator::{AlertEvaluator, AlertOutcome, EvaluatorConfig, SweepSummary};
pub use manager::AlertManager;
