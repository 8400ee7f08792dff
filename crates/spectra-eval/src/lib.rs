//! Evaluation tooling for causal reconstruction: edge metrics against ground
//! truth, event-type ablation, failure propagation and reference scenarios.

pub mod ablation;
pub mod error;
pub mod failure;
pub mod metrics;
pub mod scenarios;

pub use ablation::{single_type_exclusions, AblationHarness, AblationReport, AblationRun, Importance};
pub use error::EvalError;
pub use failure::{FailureAnalysis, FailureAnalyzer, FailureTrace, Propagation, RootCause};
pub use metrics::{compute_metrics, evaluate_dag, EdgeKey, Ratio, ReconstructionMetrics};
pub use scenarios::{scenario, Scenario};
