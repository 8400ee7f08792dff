use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed event {event_id}: missing or invalid {field}")]
    MalformedEvent { event_id: String, field: &'static str },

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Duplicate event id: {0}")]
    DuplicateEvent(String),

    #[error("Edge {from} -> {to} references an event that is not stored")]
    DanglingEdge { from: String, to: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
