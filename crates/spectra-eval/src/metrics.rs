use std::collections::BTreeSet;

use serde::Serialize;
use spectra_core::model::{CausalEdge, EdgeReason, EventId};
use spectra_reconstruct::CausalDag;

/// A fraction that may be undefined (zero denominator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "Option<f64>")]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    pub fn of(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(numerator as f64 / denominator as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(v),
            Ratio::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Ratio::Defined(_))
    }

    /// `self - baseline`, undefined if either side is.
    pub fn delta(self, baseline: Ratio) -> Ratio {
        match (self, baseline) {
            (Ratio::Defined(a), Ratio::Defined(b)) => Ratio::Defined(a - b),
            _ => Ratio::Undefined,
        }
    }
}

impl From<Ratio> for Option<f64> {
    fn from(r: Ratio) -> Self {
        r.value()
    }
}

/// Percent with two decimals, or `N/A`.
impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{:.2}%", v * 100.0),
            Ratio::Undefined => f.write_str("N/A"),
        }
    }
}

/// The identity an edge is matched on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeKey {
    pub from: EventId,
    pub to: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EdgeReason>,
}

impl EdgeKey {
    fn of(edge: &CausalEdge, match_reasons: bool) -> Self {
        Self {
            from: edge.from_event_id.clone(),
            to: edge.to_event_id.clone(),
            reason: match_reasons.then_some(edge.reason),
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        if let Some(reason) = self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Edge-level comparison of a reconstruction against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructionMetrics {
    /// Edge recall. Reported as the headline accuracy.
    pub accuracy: Ratio,
    pub recall: Ratio,
    pub precision: Ratio,
    pub matched: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub reconstructed_edges: usize,
    pub ground_truth_edges: usize,
    pub events: usize,
    /// Events observed over events expected; undefined without an expectation.
    pub trace_completeness: Ratio,
    pub missing: Vec<EdgeKey>,
    pub spurious: Vec<EdgeKey>,
}

impl ReconstructionMetrics {
    /// Record observed against expected event counts.
    pub fn with_completeness(mut self, observed: usize, expected: Option<usize>) -> Self {
        self.events = observed;
        self.trace_completeness = expected.map_or(Ratio::Undefined, |e| Ratio::of(observed, e));
        self
    }
}

/// Compare two edge collections. Both are reduced to distinct keys first, so
/// parallel edges only count once unless `match_reasons` tells them apart.
pub fn compute_metrics(
    reconstructed: &[CausalEdge],
    ground_truth: &[CausalEdge],
    match_reasons: bool,
) -> ReconstructionMetrics {
    let found: BTreeSet<EdgeKey> = reconstructed
        .iter()
        .map(|e| EdgeKey::of(e, match_reasons))
        .collect();
    let expected: BTreeSet<EdgeKey> = ground_truth
        .iter()
        .map(|e| EdgeKey::of(e, match_reasons))
        .collect();

    let matched = found.intersection(&expected).count();
    let recall = Ratio::of(matched, expected.len());

    ReconstructionMetrics {
        accuracy: recall,
        recall,
        precision: Ratio::of(matched, found.len()),
        matched,
        false_positives: found.len() - matched,
        false_negatives: expected.len() - matched,
        reconstructed_edges: found.len(),
        ground_truth_edges: expected.len(),
        events: 0,
        trace_completeness: Ratio::Undefined,
        missing: expected.difference(&found).cloned().collect(),
        spurious: found.difference(&expected).cloned().collect(),
    }
}

/// Metrics for a whole reconstructed DAG, including trace completeness.
pub fn evaluate_dag(
    dag: &CausalDag,
    ground_truth: &[CausalEdge],
    match_reasons: bool,
    expected_events: Option<usize>,
) -> ReconstructionMetrics {
    compute_metrics(dag.edges(), ground_truth, match_reasons)
        .with_completeness(dag.events().len(), expected_events)
}
