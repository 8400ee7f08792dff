use std::io::Write as _;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{CausalEdge, Event, EventRecord};

/// Read an event log: one JSON object per line, or a single JSON array.
///
/// Objects that fail to decode but still carry an `event_id` and a
/// `correlation_id` are kept as invalid records, so their scope fails
/// validation. Anything else is skipped with a warning.
pub fn read_event_log(path: &Path) -> Result<Vec<EventRecord>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    parse_event_log(&content)
}

pub fn parse_event_log(content: &str) -> Result<Vec<EventRecord>, CoreError> {
    if content.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(content)?;
        return Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| decode_record(value, "element", i))
            .collect());
    }

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => records.extend(decode_record(value, "line", lineno + 1)),
            Err(e) => tracing::warn!("Skipping unparseable event log line {}: {e}", lineno + 1),
        }
    }
    Ok(records)
}

fn decode_record(value: serde_json::Value, unit: &str, position: usize) -> Option<EventRecord> {
    match EventRecord::deserialize(&value) {
        Ok(record) => Some(record),
        Err(e) => match EventRecord::salvage(&value) {
            Some(record) => {
                tracing::warn!(
                    "Event {} at {unit} {position} does not decode ({e}); scope {} will be rejected",
                    record.event_id,
                    record.correlation_id.as_ref().map(|c| c.as_str()).unwrap_or_default()
                );
                Some(record)
            }
            None => {
                tracing::warn!("Skipping undecodable event at {unit} {position}: {e}");
                None
            }
        },
    }
}

/// Write events as JSONL, replacing the file.
pub fn write_event_log(path: &Path, events: &[Event]) -> Result<(), CoreError> {
    write_lines(path, events)
}

/// Read an edge file (e.g. scenario ground truth), JSONL or JSON array.
pub fn read_edge_log(path: &Path) -> Result<Vec<CausalEdge>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }
    Ok(parse_lines(&content))
}

pub fn write_edge_log(path: &Path, edges: &[CausalEdge]) -> Result<(), CoreError> {
    write_lines(path, edges)
}

fn write_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<(), CoreError> {
    let mut file = std::fs::File::create(path)?;
    for item in items {
        serde_json::to_writer(&mut file, item)?;
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(())
}

pub(crate) fn parse_lines<T: DeserializeOwned>(content: &str) -> Vec<T> {
    let mut items = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("Skipping unparseable JSONL line {}: {e}", lineno + 1);
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, Timestamp};
    use tempfile::TempDir;

    fn event(id: &str, ts: i64) -> Event {
        Event {
            event_id: id.into(),
            kind: EventKind::ReasoningStep,
            agent_id: "agent_a".into(),
            timestamp: Timestamp(ts),
            correlation_id: "run_001".into(),
            payload: Default::default(),
        }
    }

    #[test]
    fn test_write_then_read_log() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        write_event_log(&path, &[event("e1", 0), event("e2", 1)]).unwrap();

        let records = read_event_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].event_id.as_str(), "e2");
        assert_eq!(records[1].timestamp, Some(Timestamp(1)));
    }

    #[test]
    fn test_garbage_lines_skipped() {
        let content = concat!(
            r#"{"event_id":"e1","event_type":"REASONING_STEP","agent_id":"a","timestamp":0,"correlation_id":"c"}"#,
            "\n",
            "not json at all\n",
            "\n",
            r#"{"event_id":"e2","event_type":"GOAL_FAILED","agent_id":"a","correlation_id":"c"}"#,
            "\n",
        );
        let records = parse_event_log(content).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].timestamp.is_none());
    }

    #[test]
    fn test_undecodable_line_kept_as_invalid_record() {
        let content = concat!(
            r#"{"event_id":"e1","event_type":"REASONING_STEP","agent_id":"a","timestamp":0,"correlation_id":"c"}"#,
            "\n",
            r#"{"event_id":"e2","event_type":"REASONING_STEP","agent_id":"a","timestamp":1.5,"correlation_id":"c"}"#,
            "\n",
            r#"{"event_type":"REASONING_STEP","timestamp":"oops"}"#,
            "\n",
        );
        let records = parse_event_log(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].invalid, None);
        assert_eq!(records[1].event_id.as_str(), "e2");
        assert_eq!(records[1].invalid, Some("timestamp"));
    }

    #[test]
    fn test_json_array_with_bad_element() {
        let content = r#"[
            {"event_id":"e1","event_type":"REASONING_STEP","agent_id":"a","timestamp":0,"correlation_id":"c"},
            {"event_id":"e2","event_type":"NOT_A_TYPE","agent_id":"a","timestamp":1,"correlation_id":"c"}
        ]"#;
        let records = parse_event_log(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].invalid, Some("event_type"));
    }

    #[test]
    fn test_edge_log() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("truth.jsonl");
        let edges = vec![CausalEdge::new("e1", "e2", crate::model::EdgeReason::Delegation)];
        write_edge_log(&path, &edges).unwrap();
        assert_eq!(read_edge_log(&path).unwrap(), edges);
    }

    #[test]
    fn test_json_array_log() {
        let content = r#"[
            {"event_id":"e1","event_type":"GOAL_DELEGATED","to":"b","agent_id":"a","timestamp":3,"correlation_id":"c"}
        ]"#;
        let records = parse_event_log(content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind.delegate().map(|a| a.as_str()), Some("b"));
    }
}
