use std::collections::HashSet;

use serde::Serialize;
use spectra_core::config::ReconstructionConfig;
use spectra_core::model::{AgentId, EdgeReason, EventId};

use super::model::CausalDag;
use crate::correlator::CorrelationGroup;
use crate::diagnostics::Diagnostic;
use crate::error::ReconstructError;

/// A reconstructed scope: the DAG plus everything noticed along the way.
#[derive(Debug, Clone, Serialize)]
pub struct Reconstruction {
    pub dag: CausalDag,
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies the delegation, intra-agent sequence and proximity rules, in that order.
#[derive(Debug, Clone, Default)]
pub struct DagBuilder {
    config: ReconstructionConfig,
}

impl DagBuilder {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    pub fn build(&self, group: &CorrelationGroup) -> Result<Reconstruction, ReconstructError> {
        let mut dag = CausalDag::new(group.correlation_id().clone(), group.events().to_vec());
        let mut diagnostics = Vec::new();

        if group.is_empty() {
            tracing::debug!("Scope {} is empty", group.correlation_id());
            diagnostics.push(Diagnostic::EmptyScope {
                correlation_id: group.correlation_id().clone(),
            });
            return Ok(Reconstruction { dag, diagnostics });
        }

        let handoffs = self.apply_delegation(group, &mut dag, &mut diagnostics);
        self.apply_sequence(group, &handoffs, &mut dag, &mut diagnostics);
        self.apply_proximity(group, &mut dag);

        dag.topological_order()?;

        let counts = dag.reason_counts();
        tracing::info!(
            "Reconstructed scope {}: {} events, {} edges ({} delegation, {} sequence, {} proximity)",
            group.correlation_id(),
            dag.events().len(),
            dag.edges().len(),
            counts[&EdgeReason::Delegation],
            counts[&EdgeReason::IntraAgentSequence],
            counts[&EdgeReason::InferredByProximity]
        );
        Ok(Reconstruction { dag, diagnostics })
    }

    /// Rule 1. Returns the indices of events that handed control to a delegate.
    fn apply_delegation(
        &self,
        group: &CorrelationGroup,
        dag: &mut CausalDag,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> HashSet<usize> {
        let events = group.events();
        let mut handoffs = HashSet::new();

        for &i in group.chronological_indices() {
            let event = &events[i];
            if !self.config.is_delegation_capable(event.event_type()) {
                continue;
            }
            let Some(delegate) = self.resolve_delegate(event.kind.delegate(), &event.agent_id)
            else {
                diagnostics.push(Diagnostic::UnroutedDelegation {
                    event_id: event.event_id.clone(),
                });
                continue;
            };

            let target = group
                .agent_indices(delegate)
                .iter()
                .copied()
                .find(|&j| events[j].timestamp > event.timestamp);
            let Some(j) = target else {
                diagnostics.push(Diagnostic::DanglingDelegation {
                    event_id: event.event_id.clone(),
                    delegate: delegate.clone(),
                });
                continue;
            };

            match dag.add_edge_checked(i, j, EdgeReason::Delegation) {
                Ok(()) => {
                    handoffs.insert(i);
                }
                Err(rejected) => diagnostics.push(reject(rejected.from, rejected.to, rejected.reason)),
            }
        }

        tracing::debug!("Delegation rule: {} edges", handoffs.len());
        handoffs
    }

    fn resolve_delegate<'a>(
        &'a self,
        declared: Option<&'a AgentId>,
        source: &AgentId,
    ) -> Option<&'a AgentId> {
        declared.or_else(|| self.config.delegation_routes.get(source))
    }

    /// Rule 2.
    fn apply_sequence(
        &self,
        group: &CorrelationGroup,
        handoffs: &HashSet<usize>,
        dag: &mut CausalDag,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let mut added = 0usize;
        for (_, sequence) in group.agent_sequences() {
            for pair in sequence.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                // Control left this agent; gap completion reconnects the return
                if handoffs.contains(&from) {
                    continue;
                }
                match dag.add_edge_checked(from, to, EdgeReason::IntraAgentSequence) {
                    Ok(()) => added += 1,
                    Err(rejected) => {
                        diagnostics.push(reject(rejected.from, rejected.to, rejected.reason))
                    }
                }
            }
        }
        tracing::debug!("Sequence rule: {added} edges");
    }

    /// Rule 3. Greedy nearest-neighbor bridging of disjoint components.
    fn apply_proximity(&self, group: &CorrelationGroup, dag: &mut CausalDag) {
        let events = group.events();
        let mut components = Components::new(events.len());
        for edge in dag.edges() {
            if let (Some(from), Some(to)) =
                (dag.index_of(&edge.from_event_id), dag.index_of(&edge.to_event_id))
            {
                components.union(from, to);
            }
        }
        if components.count() <= 1 {
            tracing::debug!("Proximity rule: scope already connected");
            return;
        }

        let threshold = self.config.proximity_threshold_us;
        let order = group.chronological_indices();
        let mut candidates: Vec<(u64, &EventId, &EventId, usize, usize)> = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            for &j in &order[pos + 1..] {
                let gap = events[i].timestamp.abs_diff(events[j].timestamp);
                if gap >= threshold {
                    break;
                }
                if components.find(i) != components.find(j) {
                    candidates.push((gap, &events[i].event_id, &events[j].event_id, i, j));
                }
            }
        }
        candidates.sort();

        let mut added = 0usize;
        for (_, _, _, i, j) in candidates {
            if components.count() <= 1 {
                break;
            }
            // Joining disjoint components cannot close a cycle
            if components.union(i, j) {
                dag.push_edge(i, j, EdgeReason::InferredByProximity);
                added += 1;
            }
        }
        tracing::debug!(
            "Proximity rule: {added} edges, {} components remain",
            components.count()
        );
    }
}

fn reject(from: EventId, to: EventId, reason: EdgeReason) -> Diagnostic {
    tracing::warn!("Rejected {reason} edge {from} -> {to}: would close a cycle");
    Diagnostic::CycleDetected { from, to, reason }
}

/// Reconstruct one scope with the given configuration.
pub fn build_dag(
    group: &CorrelationGroup,
    config: &ReconstructionConfig,
) -> Result<Reconstruction, ReconstructError> {
    DagBuilder::new(config.clone()).build(group)
}

/// Weakly connected components over event indices (union-find).
#[derive(Debug)]
struct Components {
    parent: Vec<usize>,
    rank: Vec<u8>,
    count: usize,
}

impl Components {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            count: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the components of `a` and `b`. False if they were already one.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        self.count -= 1;
        true
    }

    fn count(&self) -> usize {
        self.count
    }
}
