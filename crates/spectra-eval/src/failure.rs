use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;
use spectra_core::config::FailureConfig;
use spectra_core::model::{AgentId, CausalEdge, EventId, EventType};
use spectra_reconstruct::{CausalDag, Diagnostic};

/// One candidate origin of a failure and the path that leads from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootCause {
    pub root: EventId,
    /// Event ids from the root to the failure, both included.
    pub path: Vec<EventId>,
    pub agents: BTreeSet<AgentId>,
}

/// Backward analysis of a single failure event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureTrace {
    pub failure: EventId,
    pub agent: AgentId,
    pub root_causes: Vec<RootCause>,
    pub affected_agents: BTreeSet<AgentId>,
    /// Nearest `TOOL_INVOKED` ancestor.
    pub trigger: Option<EventId>,
    /// The hop limit stopped the walk before every ancestor was visited.
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureAnalysis {
    pub failures: Vec<FailureTrace>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Forward reach of a failure: everything downstream of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Propagation {
    pub source: EventId,
    /// The source first, then descendants in breadth-first order.
    pub affected_events: Vec<EventId>,
    pub affected_agents: BTreeSet<AgentId>,
    pub truncated: bool,
}

/// Walks a reconstructed DAG backward from failure events to their likely causes.
#[derive(Debug, Clone, Default)]
pub struct FailureAnalyzer {
    config: FailureConfig,
}

impl FailureAnalyzer {
    pub fn new(config: FailureConfig) -> Self {
        Self { config }
    }

    fn follows(&self, edge: &CausalEdge) -> bool {
        self.config.follow_inferred || !edge.reason.is_inferred()
    }

    /// Analyze every failure event of the configured type, in chronological order.
    pub fn analyze(&self, dag: &CausalDag) -> FailureAnalysis {
        let rank = chronological_rank(dag);
        let mut failures: Vec<usize> = (0..dag.events().len())
            .filter(|&i| dag.event_at(i).event_type() == self.config.failure_type)
            .collect();
        failures.sort_by_key(|&i| rank[i]);

        if failures.is_empty() {
            tracing::debug!(
                "No {} events in scope {}",
                self.config.failure_type,
                dag.correlation_id()
            );
            return FailureAnalysis {
                failures: Vec::new(),
                diagnostics: vec![Diagnostic::NoFailureEventsFound {
                    failure_type: self.config.failure_type,
                }],
            };
        }

        let traces = failures
            .into_iter()
            .map(|f| self.trace_back(dag, &rank, f))
            .collect();
        FailureAnalysis {
            failures: traces,
            diagnostics: Vec::new(),
        }
    }

    fn trace_back(&self, dag: &CausalDag, rank: &[usize], failure: usize) -> FailureTrace {
        // Toward the failure: next_hop[ancestor] is one step closer
        let mut next_hop: HashMap<usize, usize> = HashMap::new();
        let mut depth: HashMap<usize, usize> = HashMap::from([(failure, 0)]);
        let mut queue = VecDeque::from([failure]);
        let mut roots = Vec::new();
        let mut trigger = None;
        let mut truncated = false;

        while let Some(current) = queue.pop_front() {
            let d = depth[&current];
            if current != failure
                && trigger.is_none()
                && dag.event_at(current).event_type() == EventType::ToolInvoked
            {
                trigger = Some(current);
            }

            let mut preds: Vec<usize> = dag
                .predecessors(current)
                .filter(|(_, edge)| self.follows(edge))
                .map(|(i, _)| i)
                .collect();
            preds.sort_by_key(|&i| rank[i]);
            preds.dedup();

            if preds.is_empty() {
                roots.push(current);
                continue;
            }
            if d >= self.config.max_hops {
                truncated = true;
                roots.push(current);
                continue;
            }
            for p in preds {
                if !depth.contains_key(&p) {
                    depth.insert(p, d + 1);
                    next_hop.insert(p, current);
                    queue.push_back(p);
                }
            }
        }

        roots.sort_by_key(|&i| rank[i]);
        let root_causes: Vec<RootCause> = roots
            .into_iter()
            .map(|root| {
                let mut path = vec![root];
                let mut at = root;
                while let Some(&next) = next_hop.get(&at) {
                    path.push(next);
                    at = next;
                }
                RootCause {
                    root: dag.event_at(root).event_id.clone(),
                    agents: path
                        .iter()
                        .map(|&i| dag.event_at(i).agent_id.clone())
                        .collect(),
                    path: path
                        .iter()
                        .map(|&i| dag.event_at(i).event_id.clone())
                        .collect(),
                }
            })
            .collect();

        let affected_agents = root_causes
            .iter()
            .flat_map(|r| r.agents.iter().cloned())
            .collect();
        let event = dag.event_at(failure);
        if truncated {
            tracing::warn!(
                "Failure {} truncated at {} hops",
                event.event_id,
                self.config.max_hops
            );
        }

        FailureTrace {
            failure: event.event_id.clone(),
            agent: event.agent_id.clone(),
            root_causes,
            affected_agents,
            trigger: trigger.map(|t| dag.event_at(t).event_id.clone()),
            truncated,
        }
    }

    /// Descendants of `source` within the hop limit. `None` if the event is not in the DAG.
    pub fn propagate_forward(&self, dag: &CausalDag, source: &EventId) -> Option<Propagation> {
        let start = dag.index_of(source)?;
        let rank = chronological_rank(dag);
        let mut depth: HashMap<usize, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();
        let mut truncated = false;

        while let Some(current) = queue.pop_front() {
            order.push(current);
            let d = depth[&current];
            let mut succs: Vec<usize> = dag
                .successors(current)
                .filter(|(_, edge)| self.follows(edge))
                .map(|(i, _)| i)
                .filter(|i| !depth.contains_key(i))
                .collect();
            succs.sort_by_key(|&i| rank[i]);
            succs.dedup();
            if d >= self.config.max_hops {
                truncated |= !succs.is_empty();
                continue;
            }
            for s in succs {
                depth.insert(s, d + 1);
                queue.push_back(s);
            }
        }

        Some(Propagation {
            source: source.clone(),
            affected_agents: order
                .iter()
                .map(|&i| dag.event_at(i).agent_id.clone())
                .collect(),
            affected_events: order
                .iter()
                .map(|&i| dag.event_at(i).event_id.clone())
                .collect(),
            truncated,
        })
    }
}

/// Position of each event in (timestamp, insertion) order.
fn chronological_rank(dag: &CausalDag) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dag.events().len()).collect();
    order.sort_by_key(|&i| dag.event_at(i).timestamp);
    let mut rank = vec![0; order.len()];
    for (r, i) in order.into_iter().enumerate() {
        rank[i] = r;
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_core::config::ReconstructionConfig;
    use spectra_reconstruct::build_dag;

    use crate::scenarios;

    fn failure_dag() -> CausalDag {
        let s = scenarios::tool_failure();
        build_dag(&s.group(), &ReconstructionConfig::default())
            .unwrap()
            .dag
    }

    fn ids(path: &[EventId]) -> Vec<&str> {
        path.iter().map(|e| e.as_str()).collect()
    }

    #[test]
    fn test_root_cause_through_tool_trigger() {
        let analysis = FailureAnalyzer::default().analyze(&failure_dag());
        assert!(analysis.diagnostics.is_empty());
        assert_eq!(analysis.failures.len(), 1);

        let trace = &analysis.failures[0];
        assert_eq!(trace.failure.as_str(), "failure-0004");
        assert_eq!(trace.trigger.as_ref().unwrap().as_str(), "failure-0003");
        assert_eq!(trace.root_causes.len(), 1);
        assert_eq!(
            ids(&trace.root_causes[0].path),
            vec!["failure-0002", "failure-0003", "failure-0004"]
        );
        assert_eq!(trace.affected_agents.len(), 1);
        assert!(trace.affected_agents.contains(&AgentId::from("agent_b")));
        assert!(!trace.truncated);
    }

    #[test]
    fn test_following_inferred_edges_reaches_orchestrator() {
        let analyzer = FailureAnalyzer::new(FailureConfig {
            follow_inferred: true,
            ..Default::default()
        });
        let trace = &analyzer.analyze(&failure_dag()).failures[0];
        assert_eq!(trace.root_causes[0].root.as_str(), "failure-0000");
        assert_eq!(trace.affected_agents.len(), 2);
    }

    #[test]
    fn test_hop_limit_truncates() {
        let analyzer = FailureAnalyzer::new(FailureConfig {
            max_hops: 1,
            ..Default::default()
        });
        let trace = &analyzer.analyze(&failure_dag()).failures[0];
        assert!(trace.truncated);
        assert_eq!(ids(&trace.root_causes[0].path), vec!["failure-0003", "failure-0004"]);
    }

    #[test]
    fn test_no_failure_events() {
        let s = scenarios::single_agent();
        let dag = build_dag(&s.group(), &ReconstructionConfig::default())
            .unwrap()
            .dag;
        let analysis = FailureAnalyzer::default().analyze(&dag);
        assert!(analysis.failures.is_empty());
        assert_eq!(
            analysis.diagnostics,
            vec![Diagnostic::NoFailureEventsFound {
                failure_type: EventType::GoalFailed
            }]
        );
    }

    #[test]
    fn test_propagate_forward() {
        let dag = failure_dag();
        let analyzer = FailureAnalyzer::new(FailureConfig {
            follow_inferred: true,
            ..Default::default()
        });
        let prop = analyzer
            .propagate_forward(&dag, &"failure-0002".into())
            .unwrap();
        assert_eq!(
            ids(&prop.affected_events),
            vec!["failure-0002", "failure-0003", "failure-0004"]
        );
        assert!(analyzer.propagate_forward(&dag, &"missing".into()).is_none());

        let from_start = analyzer
            .propagate_forward(&dag, &"failure-0000".into())
            .unwrap();
        assert_eq!(from_start.affected_events.len(), 7);
        assert_eq!(from_start.affected_agents.len(), 2);
    }
}
