use spectra_core::error::CoreError;
use spectra_core::model::{CorrelationId, EventId};

#[derive(Debug, thiserror::Error)]
pub enum ReconstructError {
    #[error(
        "Malformed event in scope {}: {source}",
        .scope.as_ref().map(|s| s.as_str()).unwrap_or("<unscoped>")
    )]
    Malformed {
        scope: Option<CorrelationId>,
        #[source]
        source: CoreError,
    },

    #[error("Cycle detected in scope {correlation_id} through {} events", .events.len())]
    CycleDetected {
        correlation_id: CorrelationId,
        events: Vec<EventId>,
    },

    #[error("Invalid edge {from} -> {to}: {detail}")]
    InvalidEdge {
        from: EventId,
        to: EventId,
        detail: &'static str,
    },
}

impl ReconstructError {
    /// The correlation scope this error is confined to, if known.
    pub fn scope(&self) -> Option<&CorrelationId> {
        match self {
            ReconstructError::Malformed { scope, .. } => scope.as_ref(),
            ReconstructError::CycleDetected { correlation_id, .. } => Some(correlation_id),
            ReconstructError::InvalidEdge { .. } => None,
        }
    }
}
