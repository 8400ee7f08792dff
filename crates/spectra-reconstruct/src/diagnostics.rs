use serde::{Deserialize, Serialize};
use spectra_core::model::{AgentId, CorrelationId, EdgeReason, EventId, EventType};

/// A non-fatal observation made while reconstructing or analyzing a scope.
///
/// Diagnostics never abort a run; they ride along with the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A candidate edge was dropped because it would have closed a cycle.
    CycleDetected {
        from: EventId,
        to: EventId,
        reason: EdgeReason,
    },
    /// The delegate agent never emitted an event after the delegation.
    DanglingDelegation { event_id: EventId, delegate: AgentId },
    /// No delegate could be determined for a delegation-capable event.
    UnroutedDelegation { event_id: EventId },
    EmptyScope { correlation_id: CorrelationId },
    EmptyInput,
    NoFailureEventsFound { failure_type: EventType },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::CycleDetected { from, to, reason } => write!(
                f,
                "cycle_detected: dropped {reason} edge {} -> {}",
                from.short(),
                to.short()
            ),
            Diagnostic::DanglingDelegation { event_id, delegate } => write!(
                f,
                "dangling_delegation: {} delegates to {delegate}, which emits nothing later",
                event_id.short()
            ),
            Diagnostic::UnroutedDelegation { event_id } => write!(
                f,
                "unrouted_delegation: no delegate known for {}",
                event_id.short()
            ),
            Diagnostic::EmptyScope { correlation_id } => {
                write!(f, "empty_scope: {correlation_id} has no events")
            }
            Diagnostic::EmptyInput => f.write_str("empty_input: no events supplied"),
            Diagnostic::NoFailureEventsFound { failure_type } => {
                write!(f, "no_failure_events_found: no {failure_type} events")
            }
        }
    }
}
