use serde::{Deserialize, Serialize};

use super::event::EventId;

/// The rule that produced a causal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeReason {
    Delegation,
    IntraAgentSequence,
    InferredByProximity,
}

impl EdgeReason {
    pub const ALL: [EdgeReason; 3] = [
        EdgeReason::Delegation,
        EdgeReason::IntraAgentSequence,
        EdgeReason::InferredByProximity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeReason::Delegation => "delegation",
            EdgeReason::IntraAgentSequence => "intra_agent_sequence",
            EdgeReason::InferredByProximity => "inferred_by_proximity",
        }
    }

    /// Heuristic edges that downstream consumers may discount.
    pub fn is_inferred(self) -> bool {
        matches!(self, EdgeReason::InferredByProximity)
    }
}

impl std::fmt::Display for EdgeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed causal relation between two events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CausalEdge {
    pub from_event_id: EventId,
    pub to_event_id: EventId,
    pub reason: EdgeReason,
}

impl CausalEdge {
    pub fn new(from: impl Into<EventId>, to: impl Into<EventId>, reason: EdgeReason) -> Self {
        Self {
            from_event_id: from.into(),
            to_event_id: to.into(),
            reason,
        }
    }

    /// The ordered pair this edge connects.
    pub fn pair(&self) -> (&EventId, &EventId) {
        (&self.from_event_id, &self.to_event_id)
    }
}
