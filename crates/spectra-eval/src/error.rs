use spectra_core::error::CoreError;
use spectra_reconstruct::ReconstructError;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Reconstruction error: {0}")]
    Reconstruct(#[from] ReconstructError),

    #[error(
        "Unknown scenario: {0} (available: {names})",
        names = crate::scenarios::SCENARIO_NAMES.join(", ")
    )]
    UnknownScenario(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
