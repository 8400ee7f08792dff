use std::path::Path;

use serde_json::Value;
use spectra_core::error::CoreError;
use spectra_core::model::{AgentId, CorrelationId, Event, EventId, EventKind, Payload, Timestamp};
use spectra_core::storage::{write_event_log, TraceStore};

#[derive(Debug, Clone)]
enum Clock {
    /// Wall clock, nudged forward so consecutive events never share a timestamp.
    Wall { last: Option<Timestamp> },
    /// Deterministic clock advancing a fixed step per event.
    Logical { next: i64, step_us: i64 },
}

impl Clock {
    fn tick(&mut self) -> Timestamp {
        match self {
            Clock::Wall { last } => {
                let now = Timestamp::now();
                let ts = match *last {
                    Some(prev) if now <= prev => {
                        Timestamp::from_micros(prev.as_micros().saturating_add(1))
                    }
                    _ => now,
                };
                *last = Some(ts);
                ts
            }
            Clock::Logical { next, step_us } => {
                let ts = Timestamp::from_micros(*next);
                // Pins at i64::MAX rather than wrapping
                *next = next.saturating_add(*step_us);
                ts
            }
        }
    }
}

#[derive(Debug, Clone)]
enum IdSource {
    Random,
    Sequential { prefix: String, next: u64 },
}

impl IdSource {
    fn next_id(&mut self) -> EventId {
        match self {
            IdSource::Random => EventId::new(),
            IdSource::Sequential { prefix, next } => {
                let id = EventId(format!("{prefix}-{next:04}"));
                *next += 1;
                id
            }
        }
    }
}

/// An in-process event buffer for instrumenting agents.
///
/// Every emitted event is stamped with the collector's current correlation id,
/// a fresh id and a non-decreasing timestamp. Events can be read back, drained
/// or persisted; the collector never reconstructs anything itself.
#[derive(Debug, Clone)]
pub struct TraceCollector {
    correlation_id: CorrelationId,
    clock: Clock,
    ids: IdSource,
    events: Vec<Event>,
}

impl TraceCollector {
    /// Collector using the wall clock and random ids.
    pub fn new(correlation: impl Into<CorrelationId>) -> Self {
        Self {
            correlation_id: correlation.into(),
            clock: Clock::Wall { last: None },
            ids: IdSource::Random,
            events: Vec::new(),
        }
    }

    /// Collector with a logical clock starting at zero and advancing `step_us`
    /// per event. Used for reproducible traces.
    pub fn logical(correlation: impl Into<CorrelationId>, step_us: u64) -> Self {
        Self {
            clock: Clock::Logical {
                next: 0,
                step_us: i64::try_from(step_us).unwrap_or(i64::MAX),
            },
            ..Self::new(correlation)
        }
    }

    /// Switch to ids `<prefix>-0000`, `<prefix>-0001`, ... which sort in emission order.
    pub fn sequential_ids(mut self, prefix: &str) -> Self {
        self.ids = IdSource::Sequential {
            prefix: prefix.to_string(),
            next: 0,
        };
        self
    }

    /// Events emitted from now on belong to `correlation`.
    pub fn set_correlation(&mut self, correlation: impl Into<CorrelationId>) -> &mut Self {
        self.correlation_id = correlation.into();
        self
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Record one event and return its id.
    pub fn emit(&mut self, kind: EventKind, agent: impl Into<AgentId>, payload: Payload) -> EventId {
        let event_id = self.ids.next_id();
        let event = Event {
            event_id: event_id.clone(),
            kind,
            agent_id: agent.into(),
            timestamp: self.clock.tick(),
            correlation_id: self.correlation_id.clone(),
            payload,
        };
        tracing::trace!(
            "Emitted {} {} for {}",
            event.event_type(),
            event.event_id,
            event.agent_id
        );
        self.events.push(event);
        event_id
    }

    /// GOAL_CREATED with a goal description.
    pub fn goal(&mut self, agent: impl Into<AgentId>, goal: &str) -> EventId {
        self.emit(EventKind::GoalCreated, agent, payload("goal", goal))
    }

    /// REASONING_STEP with the agent's thought.
    pub fn reasoning(&mut self, agent: impl Into<AgentId>, thought: &str) -> EventId {
        self.emit(EventKind::ReasoningStep, agent, payload("thought", thought))
    }

    /// GOAL_DELEGATED naming the delegate agent explicitly.
    pub fn delegate(
        &mut self,
        agent: impl Into<AgentId>,
        to: impl Into<AgentId>,
        goal: &str,
    ) -> EventId {
        self.emit(
            EventKind::GoalDelegated {
                to: Some(to.into()),
            },
            agent,
            payload("goal", goal),
        )
    }

    /// TOOL_INVOKED with the tool name.
    pub fn tool(&mut self, agent: impl Into<AgentId>, tool: &str) -> EventId {
        self.emit(EventKind::ToolInvoked, agent, payload("tool", tool))
    }

    /// GOAL_FAILED with an error description.
    pub fn fail(&mut self, agent: impl Into<AgentId>, error: &str) -> EventId {
        self.emit(EventKind::GoalFailed, agent, payload("error", error))
    }

    /// GOAL_COMPLETED with an optional result summary.
    pub fn complete(&mut self, agent: impl Into<AgentId>, result: Option<&str>) -> EventId {
        let payload = result.map(|r| payload("result", r)).unwrap_or_default();
        self.emit(EventKind::GoalCompleted, agent, payload)
    }

    /// Events recorded so far, in emission order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take all recorded events, leaving the buffer empty. Clocks and id
    /// counters keep running.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Write the buffer to a JSONL event log.
    pub fn write_log(&self, path: &Path) -> Result<(), CoreError> {
        write_event_log(path, &self.events)
    }

    /// Append the buffer to a trace store and clear it on success.
    pub fn flush_to(&mut self, store: &TraceStore) -> Result<usize, CoreError> {
        let written = store.append_events(&self.events)?;
        self.events.clear();
        Ok(written)
    }
}

fn payload(key: &str, value: &str) -> Payload {
    let mut map = Payload::new();
    map.insert(key.to_string(), Value::String(value.to_string()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_core::model::EventType;
    use spectra_core::storage::{read_event_log, EventFilter};

    #[test]
    fn test_logical_clock_and_sequential_ids() {
        let mut trace = TraceCollector::logical("run-1", 1_000).sequential_ids("evt");
        let first = trace.reasoning("planner", "Break the task down");
        let second = trace.delegate("planner", "worker", "Fetch data");
        trace.tool("worker", "http_get");

        assert_eq!(first.as_str(), "evt-0000");
        assert_eq!(second.as_str(), "evt-0001");

        let events = trace.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].timestamp, Timestamp(0));
        assert_eq!(events[2].timestamp, Timestamp(2_000));
        assert_eq!(events[1].kind.delegate().unwrap().as_str(), "worker");
        assert_eq!(events[2].payload["tool"], "http_get");
        assert!(events.iter().all(|e| e.correlation_id.as_str() == "run-1"));
    }

    #[test]
    fn test_logical_clock_saturates() {
        let mut trace = TraceCollector::logical("huge", u64::MAX);
        trace.reasoning("agent", "one");
        trace.reasoning("agent", "two");
        trace.reasoning("agent", "three");

        let ts: Vec<Timestamp> = trace.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![Timestamp(0), Timestamp(i64::MAX), Timestamp(i64::MAX)]);
    }

    #[test]
    fn test_wall_clock_is_strictly_increasing() {
        let mut trace = TraceCollector::new("wall");
        for _ in 0..50 {
            trace.reasoning("agent", "step");
        }
        let ts: Vec<Timestamp> = trace.events().iter().map(|e| e.timestamp).collect();
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        assert_ne!(trace.events()[0].event_id, trace.events()[1].event_id);
    }

    #[test]
    fn test_set_correlation_and_drain() {
        let mut trace = TraceCollector::logical("first", 10);
        trace.goal("agent", "Answer the question");
        trace.set_correlation("second");
        trace.complete("agent", None);

        let drained = trace.drain();
        assert_eq!(drained[0].correlation_id.as_str(), "first");
        assert_eq!(drained[1].correlation_id.as_str(), "second");
        assert!(drained[1].payload.is_empty());
        assert!(trace.is_empty());

        // The clock keeps running after a drain
        trace.fail("agent", "timeout");
        assert_eq!(trace.events()[0].timestamp, Timestamp(20));
        trace.clear();
        assert_eq!(trace.len(), 0);
    }

    #[test]
    fn test_write_log_and_flush_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = TraceCollector::logical("persisted", 1_000);
        trace.reasoning("agent", "think");
        trace.fail("agent", "boom");

        let log = dir.path().join("events.jsonl");
        trace.write_log(&log).unwrap();
        assert_eq!(read_event_log(&log).unwrap().len(), 2);

        let store = TraceStore::open(&dir.path().join("store")).unwrap();
        assert_eq!(trace.flush_to(&store).unwrap(), 2);
        assert!(trace.is_empty());

        let failures = store
            .events(&EventFilter {
                event_type: Some(EventType::GoalFailed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].payload["error"], "boom");
    }
}
