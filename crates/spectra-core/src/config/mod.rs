pub mod settings;

pub use settings::{FailureConfig, ReconstructionConfig, SpectraConfig};
