//! Causal reconstruction: correlate semantic events into scopes, then infer a
//! causal DAG per scope from delegation, intra-agent order and temporal proximity.

pub mod batch;
pub mod correlator;
pub mod dag;
pub mod diagnostics;
pub mod error;

pub use batch::{reconstruct_all, BatchReconstruction, BatchSummary};
pub use correlator::{correlate, CorrelationGroup};
pub use dag::{build_dag, CausalDag, DagBuilder, Reconstruction};
pub use diagnostics::Diagnostic;
pub use error::ReconstructError;
