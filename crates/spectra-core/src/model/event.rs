use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// A unique identifier for an event.
/// Generated as UUID v4 hex (no dashes) unless a collector assigns sequential ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_simple().to_string())
    }

    /// Parse and validate an ID string. Must not be empty.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(CoreError::MalformedEvent {
                event_id: s,
                field: "event_id",
            });
        }
        Ok(Self(s))
    }

    /// First 8 characters, for display. Cuts on a char boundary.
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(8)
            .map_or(self.0.as_str(), |(end, _)| &self.0[..end])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque label of the agent that emitted an event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of the workflow run (trace) an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Event time in microseconds. Wall-clock collectors count from the Unix epoch,
/// logical collectors from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_micros(us: i64) -> Self {
        Self(us)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }

    /// Interpret as wall-clock time. `None` if out of chrono's range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }

    pub fn as_micros(self) -> i64 {
        self.0
    }

    pub fn abs_diff(self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// The fixed enumeration of semantic event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    GoalCreated,
    GoalDelegated,
    ReasoningStep,
    ToolInvoked,
    GoalCompleted,
    GoalFailed,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::GoalCreated,
        EventType::GoalDelegated,
        EventType::ReasoningStep,
        EventType::ToolInvoked,
        EventType::GoalCompleted,
        EventType::GoalFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::GoalCreated => "GOAL_CREATED",
            EventType::GoalDelegated => "GOAL_DELEGATED",
            EventType::ReasoningStep => "REASONING_STEP",
            EventType::ToolInvoked => "TOOL_INVOKED",
            EventType::GoalCompleted => "GOAL_COMPLETED",
            EventType::GoalFailed => "GOAL_FAILED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    /// Accepts `GOAL_FAILED`, `goal_failed` and `goal-failed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownEventType(s.to_string()))
    }
}

/// Typed event kind. Only delegation carries data the rules read; everything
/// else an agent wants to record goes in the opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    GoalCreated,
    GoalDelegated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<AgentId>,
    },
    ReasoningStep,
    ToolInvoked,
    GoalCompleted,
    GoalFailed,
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::GoalCreated => EventType::GoalCreated,
            EventKind::GoalDelegated { .. } => EventType::GoalDelegated,
            EventKind::ReasoningStep => EventType::ReasoningStep,
            EventKind::ToolInvoked => EventType::ToolInvoked,
            EventKind::GoalCompleted => EventType::GoalCompleted,
            EventKind::GoalFailed => EventType::GoalFailed,
        }
    }

    /// The delegate agent declared by the event itself, if any.
    pub fn delegate(&self) -> Option<&AgentId> {
        match self {
            EventKind::GoalDelegated { to } => to.as_ref(),
            _ => None,
        }
    }
}

/// Opaque structured data attached to an event. Never inspected by reconstruction.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A validated, immutable semantic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub agent_id: AgentId,
    pub timestamp: Timestamp,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

/// Wire form of an event as it appears in logs. Required fields may be absent
/// here; validation into [`Event`] reports which one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
    /// Set on records salvaged from a line that failed to decode: the field at fault.
    #[serde(skip)]
    pub invalid: Option<&'static str>,
}

impl EventRecord {
    /// Recover the identity of a log object that failed to decode as a record,
    /// so validation can charge the failure to its scope.
    ///
    /// `None` unless `event_id` and `correlation_id` are both strings.
    pub fn salvage(value: &serde_json::Value) -> Option<EventRecord> {
        let obj = value.as_object()?;
        let event_id = obj.get("event_id")?.as_str()?;
        let correlation_id = obj.get("correlation_id")?.as_str()?;

        let kind = serde_json::from_value::<EventKind>(value.clone());
        let invalid = if kind.is_err() {
            "event_type"
        } else if obj.get("timestamp").is_some_and(|t| !t.is_null() && !t.is_i64()) {
            "timestamp"
        } else if obj.get("agent_id").is_some_and(|a| !a.is_null() && !a.is_string()) {
            "agent_id"
        } else if obj.get("payload").is_some_and(|p| !p.is_object()) {
            "payload"
        } else {
            "record"
        };

        Some(EventRecord {
            event_id: event_id.into(),
            kind: kind.unwrap_or(EventKind::ReasoningStep),
            agent_id: None,
            timestamp: None,
            correlation_id: Some(correlation_id.into()),
            payload: Payload::new(),
            invalid: Some(invalid),
        })
    }

    /// The correlation id, treating an empty string as absent.
    pub fn scope(&self) -> Option<&CorrelationId> {
        self.correlation_id
            .as_ref()
            .filter(|c| !c.as_str().trim().is_empty())
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = CoreError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let event_id = EventId::parse(record.event_id.0)?;
        let malformed = |field| CoreError::MalformedEvent {
            event_id: event_id.0.clone(),
            field,
        };
        if let Some(field) = record.invalid {
            return Err(malformed(field));
        }

        let correlation_id = record
            .correlation_id
            .filter(|c| !c.as_str().trim().is_empty())
            .ok_or_else(|| malformed("correlation_id"))?;
        let agent_id = record
            .agent_id
            .filter(|a| !a.as_str().trim().is_empty())
            .ok_or_else(|| malformed("agent_id"))?;
        let timestamp = record.timestamp.ok_or_else(|| malformed("timestamp"))?;

        Ok(Event {
            event_id,
            kind: record.kind,
            agent_id,
            timestamp,
            correlation_id,
            payload: record.payload,
        })
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            event_id: event.event_id,
            kind: event.kind,
            agent_id: Some(event.agent_id),
            timestamp: Some(event.timestamp),
            correlation_id: Some(event.correlation_id),
            payload: event.payload,
            invalid: None,
        }
    }
}
