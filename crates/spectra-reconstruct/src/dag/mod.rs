pub mod builder;
pub mod model;

pub use builder::{build_dag, DagBuilder, Reconstruction};
pub use model::{CausalDag, CycleRejection};
