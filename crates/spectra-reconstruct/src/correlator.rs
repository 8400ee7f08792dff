use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use spectra_core::error::CoreError;
use spectra_core::model::{AgentId, CorrelationId, Event, EventRecord, EventType};

use crate::error::ReconstructError;

/// All events of one correlation scope, with the orderings reconstruction needs.
#[derive(Debug, Clone)]
pub struct CorrelationGroup {
    correlation_id: CorrelationId,
    events: Vec<Event>,
    /// Indices into `events` by (timestamp, insertion index).
    chronological: Vec<usize>,
    /// Per-agent chronological indices.
    by_agent: BTreeMap<AgentId, Vec<usize>>,
}

impl CorrelationGroup {
    /// Build a group from events in insertion order. Callers guarantee the
    /// events share `correlation_id`.
    pub fn new(correlation_id: CorrelationId, events: Vec<Event>) -> Self {
        let mut chronological: Vec<usize> = (0..events.len()).collect();
        // Stable: equal timestamps keep insertion order
        chronological.sort_by_key(|&i| events[i].timestamp);

        let mut by_agent: BTreeMap<AgentId, Vec<usize>> = BTreeMap::new();
        for &i in &chronological {
            by_agent
                .entry(events[i].agent_id.clone())
                .or_default()
                .push(i);
        }

        Self {
            correlation_id,
            events,
            chronological,
            by_agent,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn chronological_indices(&self) -> &[usize] {
        &self.chronological
    }

    /// All events of the scope in global chronological order.
    pub fn chronological(&self) -> impl Iterator<Item = &Event> + '_ {
        self.chronological.iter().map(|&i| &self.events[i])
    }

    /// Agents present, in lexicographic order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentId> + '_ {
        self.by_agent.keys()
    }

    /// Chronological indices of one agent's events; empty for unknown agents.
    pub fn agent_indices(&self, agent: &AgentId) -> &[usize] {
        self.by_agent.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One agent's events in chronological order.
    pub fn agent_sequence(&self, agent: &AgentId) -> Vec<&Event> {
        self.agent_indices(agent)
            .iter()
            .map(|&i| &self.events[i])
            .collect()
    }

    pub fn agent_sequences(&self) -> impl Iterator<Item = (&AgentId, &[usize])> + '_ {
        self.by_agent.iter().map(|(a, seq)| (a, seq.as_slice()))
    }

    /// Distinct event types present.
    pub fn event_types(&self) -> BTreeSet<EventType> {
        self.events.iter().map(Event::event_type).collect()
    }

    /// A new, independent group without events of the excluded types.
    pub fn without_types(&self, excluded: &BTreeSet<EventType>) -> CorrelationGroup {
        let kept = self
            .events
            .iter()
            .filter(|e| !excluded.contains(&e.event_type()))
            .cloned()
            .collect();
        CorrelationGroup::new(self.correlation_id.clone(), kept)
    }
}

/// Group event records by correlation id, validating each scope independently.
///
/// Scopes come back in order of first appearance. A malformed record fails only
/// its own scope; records with no correlation id share one unscoped failure.
pub fn correlate<I>(records: I) -> Vec<Result<CorrelationGroup, ReconstructError>>
where
    I: IntoIterator<Item = EventRecord>,
{
    let mut order: Vec<Option<CorrelationId>> = Vec::new();
    let mut buckets: HashMap<Option<CorrelationId>, Vec<EventRecord>> = HashMap::new();

    for record in records {
        let key = record.scope().cloned();
        let bucket = buckets.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        bucket.push(record);
    }

    order
        .into_iter()
        .map(|key| {
            let records = buckets.remove(&key).unwrap_or_default();
            match key {
                Some(correlation_id) => validate_scope(correlation_id, records),
                None => Err(ReconstructError::Malformed {
                    scope: None,
                    source: CoreError::MalformedEvent {
                        event_id: records
                            .first()
                            .map(|r| r.event_id.to_string())
                            .unwrap_or_default(),
                        field: "correlation_id",
                    },
                }),
            }
        })
        .collect()
}

fn validate_scope(
    correlation_id: CorrelationId,
    records: Vec<EventRecord>,
) -> Result<CorrelationGroup, ReconstructError> {
    let malformed = |source| ReconstructError::Malformed {
        scope: Some(correlation_id.clone()),
        source,
    };

    let mut seen = HashSet::new();
    let mut events = Vec::with_capacity(records.len());
    for record in records {
        let event = Event::try_from(record).map_err(malformed)?;
        if !seen.insert(event.event_id.clone()) {
            return Err(malformed(CoreError::DuplicateEvent(event.event_id.to_string())));
        }
        events.push(event);
    }

    tracing::debug!(
        "Correlated scope {correlation_id}: {} events",
        events.len()
    );
    Ok(CorrelationGroup::new(correlation_id, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_core::model::{EventKind, Timestamp};

    fn record(id: &str, agent: &str, scope: Option<&str>, ts: Option<i64>) -> EventRecord {
        EventRecord {
            event_id: id.into(),
            kind: EventKind::ReasoningStep,
            agent_id: Some(agent.into()),
            timestamp: ts.map(Timestamp),
            correlation_id: scope.map(CorrelationId::from),
            payload: Default::default(),
            invalid: None,
        }
    }

    #[test]
    fn test_groups_by_scope_in_first_appearance_order() {
        let scopes = correlate(vec![
            record("b1", "a", Some("run_b"), Some(0)),
            record("a1", "a", Some("run_a"), Some(0)),
            record("b2", "a", Some("run_b"), Some(1)),
        ]);
        assert_eq!(scopes.len(), 2);
        let first = scopes[0].as_ref().unwrap();
        assert_eq!(first.correlation_id().as_str(), "run_b");
        assert_eq!(first.len(), 2);
        assert_eq!(scopes[1].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_per_agent_sequences_sorted_stably() {
        let scopes = correlate(vec![
            record("x3", "agent_b", Some("c"), Some(5)),
            record("x1", "agent_a", Some("c"), Some(2)),
            record("x2", "agent_a", Some("c"), Some(2)),
            record("x0", "agent_a", Some("c"), Some(1)),
        ]);
        let group = scopes[0].as_ref().unwrap();

        let a: Vec<&str> = group
            .agent_sequence(&"agent_a".into())
            .iter()
            .map(|e| e.event_id.as_str())
            .collect();
        // x1 and x2 tie on timestamp and keep insertion order
        assert_eq!(a, vec!["x0", "x1", "x2"]);

        let global: Vec<&str> = group.chronological().map(|e| e.event_id.as_str()).collect();
        assert_eq!(global, vec!["x0", "x1", "x2", "x3"]);

        let agents: Vec<&str> = group.agents().map(|a| a.as_str()).collect();
        assert_eq!(agents, vec!["agent_a", "agent_b"]);
        assert!(group.agent_indices(&"nobody".into()).is_empty());
    }

    #[test]
    fn test_malformed_event_isolated_to_its_scope() {
        let scopes = correlate(vec![
            record("ok1", "a", Some("good"), Some(0)),
            record("bad", "a", Some("broken"), None),
            record("ok2", "a", Some("good"), Some(1)),
            record("also_ok", "a", Some("broken"), Some(3)),
        ]);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].as_ref().unwrap().len(), 2);
        match &scopes[1] {
            Err(ReconstructError::Malformed {
                scope,
                source: CoreError::MalformedEvent { event_id, field },
            }) => {
                assert_eq!(scope.as_ref().unwrap().as_str(), "broken");
                assert_eq!(event_id, "bad");
                assert_eq!(*field, "timestamp");
            }
            other => panic!("expected malformed scope, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_correlation_is_unscoped_failure() {
        let scopes = correlate(vec![
            record("lost", "a", None, Some(0)),
            record("blank", "a", Some(""), Some(0)),
            record("fine", "a", Some("c"), Some(0)),
        ]);
        assert_eq!(scopes.len(), 2);
        let err = scopes[0].as_ref().unwrap_err();
        assert!(err.scope().is_none());
        assert!(err.to_string().contains("<unscoped>"));
        assert!(scopes[1].is_ok());
    }

    #[test]
    fn test_duplicate_ids_fail_scope() {
        let scopes = correlate(vec![
            record("dup", "a", Some("c"), Some(0)),
            record("dup", "b", Some("c"), Some(1)),
        ]);
        assert!(matches!(
            &scopes[0],
            Err(ReconstructError::Malformed {
                source: CoreError::DuplicateEvent(_),
                ..
            })
        ));
    }

    #[test]
    fn test_without_types_is_independent() {
        let mut records = vec![record("r1", "a", Some("c"), Some(0))];
        let mut tool = record("t1", "a", Some("c"), Some(1));
        tool.kind = EventKind::ToolInvoked;
        records.push(tool);

        let group = correlate(records).remove(0).unwrap();
        let filtered = group.without_types(&BTreeSet::from([EventType::ReasoningStep]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.events()[0].event_id.as_str(), "t1");
        assert_eq!(group.len(), 2);
        assert_eq!(
            group.event_types(),
            BTreeSet::from([EventType::ReasoningStep, EventType::ToolInvoked])
        );
    }
}
