pub mod edge;
pub mod event;

pub use edge::{CausalEdge, EdgeReason};
pub use event::{
    AgentId, CorrelationId, Event, EventId, EventKind, EventRecord, EventType, Payload, Timestamp,
};
