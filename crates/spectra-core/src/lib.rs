//! Core data model, configuration and JSONL storage for Spectra.

pub mod config;
pub mod error;
pub mod model;
pub mod storage;

pub use config::{FailureConfig, ReconstructionConfig, SpectraConfig};
pub use error::CoreError;
