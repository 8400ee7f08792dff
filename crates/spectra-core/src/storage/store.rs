use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::model::{AgentId, CausalEdge, CorrelationId, Event, EventId, EventType};

use super::log::parse_lines;

const EVENTS_FILE: &str = "events.jsonl";
const EDGES_FILE: &str = "edges.jsonl";

/// Filters for reading events back.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub correlation_id: Option<CorrelationId>,
    pub agent_id: Option<AgentId>,
    pub event_type: Option<EventType>,
}

impl EventFilter {
    pub fn scope(correlation_id: impl Into<CorrelationId>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }

    fn matches(&self, event: &Event) -> bool {
        self.correlation_id
            .as_ref()
            .map_or(true, |c| *c == event.correlation_id)
            && self.agent_id.as_ref().map_or(true, |a| *a == event.agent_id)
            && self.event_type.map_or(true, |t| t == event.event_type())
    }
}

/// Directory-backed store for events and reconstructed edges.
///
/// Layout: `<root>/events.jsonl` and `<root>/edges.jsonl`. Appends take an
/// exclusive lock on the file they write, reads a shared one.
pub struct TraceStore {
    root: PathBuf,
}

impl TraceStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, CoreError> {
        fs::create_dir_all(root)?;
        for name in [EVENTS_FILE, EDGES_FILE] {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(root.join(name))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append events. Rejects the whole batch if any id is already stored or repeated.
    pub fn append_events(&self, events: &[Event]) -> Result<usize, CoreError> {
        let file = self.open_rw(EVENTS_FILE)?;
        fs2::FileExt::lock_exclusive(&file).map_err(CoreError::Io)?;
        let result = append_unique(&file, events);
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        let count = result?;
        tracing::debug!("Stored {count} events in {}", self.root.display());
        Ok(count)
    }

    /// Append edges. Every endpoint must reference a stored event.
    pub fn append_edges(&self, edges: &[CausalEdge]) -> Result<usize, CoreError> {
        let known: HashSet<EventId> = self
            .events(&EventFilter::default())?
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        check_endpoints(&known, edges)?;

        let count = self.append_edges_unchecked(edges)?;
        tracing::debug!("Stored {count} edges in {}", self.root.display());
        Ok(count)
    }

    /// Append a reconstructed trace: events plus edges over them.
    ///
    /// Both batches are validated before either file is written, so a
    /// rejected trace leaves the store unchanged. Edge endpoints may be
    /// events of this batch or already stored ones.
    pub fn append_trace(
        &self,
        events: &[Event],
        edges: &[CausalEdge],
    ) -> Result<(usize, usize), CoreError> {
        let file = self.open_rw(EVENTS_FILE)?;
        fs2::FileExt::lock_exclusive(&file).map_err(CoreError::Io)?;
        let result = self.append_trace_locked(&file, events, edges);
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        let (n_events, n_edges) = result?;
        tracing::debug!(
            "Stored {n_events} events and {n_edges} edges in {}",
            self.root.display()
        );
        Ok((n_events, n_edges))
    }

    fn append_trace_locked(
        &self,
        events_file: &File,
        events: &[Event],
        edges: &[CausalEdge],
    ) -> Result<(usize, usize), CoreError> {
        let stored: Vec<Event> = read_all(events_file)?;
        let mut known: HashSet<EventId> = stored.into_iter().map(|e| e.event_id).collect();
        for event in events {
            if !known.insert(event.event_id.clone()) {
                return Err(CoreError::DuplicateEvent(event.event_id.to_string()));
            }
        }
        check_endpoints(&known, edges)?;

        let n_events = append_all(events_file, events)?;
        let n_edges = self.append_edges_unchecked(edges)?;
        Ok((n_events, n_edges))
    }

    fn append_edges_unchecked(&self, edges: &[CausalEdge]) -> Result<usize, CoreError> {
        let file = self.open_rw(EDGES_FILE)?;
        fs2::FileExt::lock_exclusive(&file).map_err(CoreError::Io)?;
        let result = append_all(&file, edges);
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        result
    }

    /// Stored events matching the filter, ordered by timestamp (insertion order on ties).
    pub fn events(&self, filter: &EventFilter) -> Result<Vec<Event>, CoreError> {
        let file = File::open(self.root.join(EVENTS_FILE))?;
        fs2::FileExt::lock_shared(&file).map_err(CoreError::Io)?;
        let result: Result<Vec<Event>, CoreError> = read_all(&file);
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;

        let mut events: Vec<Event> = result?.into_iter().filter(|e| filter.matches(e)).collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// Stored edges. With a correlation id, only edges whose source event is in that scope.
    pub fn edges(&self, correlation_id: Option<&CorrelationId>) -> Result<Vec<CausalEdge>, CoreError> {
        let file = File::open(self.root.join(EDGES_FILE))?;
        fs2::FileExt::lock_shared(&file).map_err(CoreError::Io)?;
        let result: Result<Vec<CausalEdge>, CoreError> = read_all(&file);
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        let edges = result?;

        let Some(scope) = correlation_id else {
            return Ok(edges);
        };
        let in_scope: HashSet<EventId> = self
            .events(&EventFilter::scope(scope.clone()))?
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        Ok(edges
            .into_iter()
            .filter(|e| in_scope.contains(&e.from_event_id))
            .collect())
    }

    fn open_rw(&self, name: &str) -> Result<File, CoreError> {
        Ok(OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.root.join(name))?)
    }
}

fn append_unique(file: &File, events: &[Event]) -> Result<usize, CoreError> {
    let existing: Vec<Event> = read_all(file)?;
    let mut seen: HashSet<EventId> = existing.into_iter().map(|e| e.event_id).collect();
    for event in events {
        if !seen.insert(event.event_id.clone()) {
            return Err(CoreError::DuplicateEvent(event.event_id.to_string()));
        }
    }
    append_all(file, events)
}

fn check_endpoints(known: &HashSet<EventId>, edges: &[CausalEdge]) -> Result<(), CoreError> {
    match edges
        .iter()
        .find(|e| !known.contains(&e.from_event_id) || !known.contains(&e.to_event_id))
    {
        Some(bad) => Err(CoreError::DanglingEdge {
            from: bad.from_event_id.to_string(),
            to: bad.to_event_id.to_string(),
        }),
        None => Ok(()),
    }
}

fn read_all<T: serde::de::DeserializeOwned>(file: &File) -> Result<Vec<T>, CoreError> {
    let mut data = String::new();
    (&*file).read_to_string(&mut data)?;
    Ok(parse_lines(&data))
}

fn append_all<T: serde::Serialize>(file: &File, items: &[T]) -> Result<usize, CoreError> {
    let mut buf = Vec::new();
    for item in items {
        serde_json::to_writer(&mut buf, item)?;
        buf.push(b'\n');
    }
    (&*file).write_all(&buf)?;
    Ok(items.len())
}
