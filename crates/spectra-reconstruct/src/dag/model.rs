use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;
use spectra_core::model::{CausalEdge, CorrelationId, EdgeReason, Event, EventId, EventType};

use crate::error::ReconstructError;

/// An edge insertion refused because the target already reaches the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRejection {
    pub from: EventId,
    pub to: EventId,
    pub reason: EdgeReason,
}

/// The reconstructed causal graph of one correlation scope.
///
/// Holds its own copy of the scope's events plus the edge multiset, with
/// adjacency lists of edge indices in both directions.
#[derive(Debug, Clone, Serialize)]
pub struct CausalDag {
    correlation_id: CorrelationId,
    events: Vec<Event>,
    edges: Vec<CausalEdge>,
    #[serde(skip)]
    index: HashMap<EventId, usize>,
    #[serde(skip)]
    outgoing: Vec<Vec<usize>>,
    #[serde(skip)]
    incoming: Vec<Vec<usize>>,
}

impl CausalDag {
    /// An edgeless graph over `events`.
    pub fn new(correlation_id: CorrelationId, events: Vec<Event>) -> Self {
        let index = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.event_id.clone(), i))
            .collect();
        let n = events.len();
        Self {
            correlation_id,
            events,
            edges: Vec::new(),
            index,
            outgoing: vec![Vec::new(); n],
            incoming: vec![Vec::new(); n],
        }
    }

    /// Assemble a graph from externally supplied edges (ground truth, stored
    /// edges). Endpoints must exist, self-loops and cycles are refused.
    pub fn from_parts(
        correlation_id: CorrelationId,
        events: Vec<Event>,
        edges: Vec<CausalEdge>,
    ) -> Result<Self, ReconstructError> {
        let mut dag = Self::new(correlation_id, events);
        for edge in edges {
            let invalid = |detail| ReconstructError::InvalidEdge {
                from: edge.from_event_id.clone(),
                to: edge.to_event_id.clone(),
                detail,
            };
            let from = dag
                .index_of(&edge.from_event_id)
                .ok_or_else(|| invalid("unknown source event"))?;
            let to = dag
                .index_of(&edge.to_event_id)
                .ok_or_else(|| invalid("unknown target event"))?;
            if from == to {
                return Err(invalid("self-loop"));
            }
            dag.push_edge(from, to, edge.reason);
        }
        dag.topological_order()?;
        Ok(dag)
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn edges(&self) -> &[CausalEdge] {
        &self.edges
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.index_of(id).map(|i| &self.events[i])
    }

    pub fn event_at(&self, index: usize) -> &Event {
        &self.events[index]
    }

    pub fn index_of(&self, id: &EventId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Edges pointing at `index`, paired with their source index.
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = (usize, &CausalEdge)> + '_ {
        self.incoming[index].iter().map(move |&e| {
            let edge = &self.edges[e];
            (self.index[&edge.from_event_id], edge)
        })
    }

    /// Edges leaving `index`, paired with their target index.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = (usize, &CausalEdge)> + '_ {
        self.outgoing[index].iter().map(move |&e| {
            let edge = &self.edges[e];
            (self.index[&edge.to_event_id], edge)
        })
    }

    /// Events with no incoming edge.
    pub fn roots(&self) -> impl Iterator<Item = &Event> + '_ {
        (0..self.events.len())
            .filter(|&i| self.incoming[i].is_empty())
            .map(|i| &self.events[i])
    }

    /// Insert an edge without any check. Callers guarantee acyclicity.
    pub(crate) fn push_edge(&mut self, from: usize, to: usize, reason: EdgeReason) {
        let edge_index = self.edges.len();
        self.edges.push(CausalEdge {
            from_event_id: self.events[from].event_id.clone(),
            to_event_id: self.events[to].event_id.clone(),
            reason,
        });
        self.outgoing[from].push(edge_index);
        self.incoming[to].push(edge_index);
    }

    /// Insert an edge unless it would close a directed cycle.
    pub(crate) fn add_edge_checked(
        &mut self,
        from: usize,
        to: usize,
        reason: EdgeReason,
    ) -> Result<(), CycleRejection> {
        if self.reachable(to, from) {
            return Err(CycleRejection {
                from: self.events[from].event_id.clone(),
                to: self.events[to].event_id.clone(),
                reason,
            });
        }
        self.push_edge(from, to, reason);
        Ok(())
    }

    /// Whether a directed path leads from `from` to `to` (trivially true if equal).
    pub fn reachable(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.events.len()];
        let mut stack = vec![from];
        visited[from] = true;
        while let Some(current) = stack.pop() {
            for (next, _) in self.successors(current) {
                if next == to {
                    return true;
                }
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Kahn topological order. On a cycle, the error lists the events left unsorted.
    pub fn topological_order(&self) -> Result<Vec<usize>, ReconstructError> {
        let n = self.events.len();
        let mut in_degree: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(current) = ready.pop_front() {
            order.push(current);
            for &e in &self.outgoing[current] {
                let next = self.index[&self.edges[e].to_event_id];
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < n {
            let sorted: HashSet<usize> = order.into_iter().collect();
            let events = (0..n)
                .filter(|i| !sorted.contains(i))
                .map(|i| self.events[i].event_id.clone())
                .collect();
            return Err(ReconstructError::CycleDetected {
                correlation_id: self.correlation_id.clone(),
                events,
            });
        }
        Ok(order)
    }

    /// Edge count per reason (every reason present, zero if unused).
    pub fn reason_counts(&self) -> BTreeMap<EdgeReason, usize> {
        let mut counts: BTreeMap<EdgeReason, usize> =
            EdgeReason::ALL.into_iter().map(|r| (r, 0)).collect();
        for edge in &self.edges {
            *counts.entry(edge.reason).or_default() += 1;
        }
        counts
    }

    /// Extract a subgraph centered on an event, up to a given undirected depth.
    pub fn subgraph(&self, center: &EventId, depth: usize) -> CausalDag {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(start) = self.index_of(center) {
            queue.push_back((start, 0));
            visited.insert(start);
        }

        while let Some((current, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            let neighbors = self
                .successors(current)
                .chain(self.predecessors(current))
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, d + 1));
                }
            }
        }

        let events: Vec<Event> = (0..self.events.len())
            .filter(|i| visited.contains(i))
            .map(|i| self.events[i].clone())
            .collect();
        let mut sub = CausalDag::new(self.correlation_id.clone(), events);
        for edge in &self.edges {
            if let (Some(from), Some(to)) = (
                sub.index_of(&edge.from_event_id),
                sub.index_of(&edge.to_event_id),
            ) {
                sub.push_edge(from, to, edge.reason);
            }
        }
        sub
    }

    /// Render as DOT format for Graphviz. One cluster per agent; inferred edges dashed.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph spectra {\n  rankdir=LR;\n");

        let mut by_agent: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
        for event in &self.events {
            by_agent.entry(event.agent_id.as_str()).or_default().push(event);
        }
        for (i, (agent, events)) in by_agent.iter().enumerate() {
            dot.push_str(&format!(
                "  subgraph cluster_{i} {{\n    label=\"{}\";\n",
                dot_escape(agent)
            ));
            for event in events {
                let shape = match event.event_type() {
                    EventType::GoalDelegated => "diamond",
                    EventType::ToolInvoked => "hexagon",
                    EventType::GoalFailed => "octagon",
                    _ => "box",
                };
                dot.push_str(&format!(
                    "    \"{}\" [label=\"{}\\n{}\" shape={}];\n",
                    dot_escape(event.event_id.as_str()),
                    event.event_type(),
                    dot_escape(event.event_id.short()),
                    shape
                ));
            }
            dot.push_str("  }\n");
        }

        for edge in &self.edges {
            let style = match edge.reason {
                EdgeReason::Delegation => "bold",
                EdgeReason::IntraAgentSequence => "solid",
                EdgeReason::InferredByProximity => "dashed",
            };
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\" style={}];\n",
                dot_escape(edge.from_event_id.as_str()),
                dot_escape(edge.to_event_id.as_str()),
                edge.reason,
                style
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

/// Escape a value for use inside a quoted DOT ID.
fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
