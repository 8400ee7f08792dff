use std::collections::BTreeSet;

use serde::Serialize;
use spectra_core::config::ReconstructionConfig;
use spectra_core::model::{CausalEdge, EventType};
use spectra_reconstruct::{CorrelationGroup, DagBuilder, Diagnostic};

use crate::error::EvalError;
use crate::metrics::{compute_metrics, Ratio, ReconstructionMetrics};

pub const DEFAULT_ESSENTIAL_THRESHOLD: f64 = 0.8;

/// One reconstruction run of an ablation study.
#[derive(Debug, Clone, Serialize)]
pub struct AblationRun {
    pub excluded: BTreeSet<EventType>,
    pub events: usize,
    pub edges: usize,
    pub metrics: ReconstructionMetrics,
    /// Accuracy minus baseline accuracy.
    pub accuracy_delta: Ratio,
    pub diagnostics: Vec<Diagnostic>,
}

impl AblationRun {
    /// `baseline` or `without GOAL_DELEGATED+TOOL_INVOKED`.
    pub fn label(&self) -> String {
        if self.excluded.is_empty() {
            return "baseline".to_string();
        }
        let names: Vec<&str> = self.excluded.iter().map(|t| t.as_str()).collect();
        format!("without {}", names.join("+"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Essential,
    Optional,
}

#[derive(Debug, Clone, Serialize)]
pub struct AblationReport {
    pub baseline: AblationRun,
    /// In the order the exclusion sets were requested.
    pub runs: Vec<AblationRun>,
}

impl AblationReport {
    /// Classify each single-type exclusion: essential when accuracy without it
    /// falls below `threshold`. Runs with undefined accuracy are skipped.
    pub fn classify(&self, threshold: f64) -> Vec<(EventType, Importance)> {
        self.runs
            .iter()
            .filter(|run| run.excluded.len() == 1)
            .filter_map(|run| {
                let event_type = *run.excluded.iter().next()?;
                let accuracy = run.metrics.accuracy.value()?;
                let importance = if accuracy < threshold {
                    Importance::Essential
                } else {
                    Importance::Optional
                };
                Some((event_type, importance))
            })
            .collect()
    }
}

/// Measures how much each event type contributes to reconstruction accuracy.
#[derive(Debug, Clone, Default)]
pub struct AblationHarness {
    builder: DagBuilder,
}

impl AblationHarness {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self {
            builder: DagBuilder::new(config),
        }
    }

    /// Baseline run, then one independent run per exclusion set. Every run is
    /// scored against the full, unfiltered ground truth.
    pub fn run(
        &self,
        group: &CorrelationGroup,
        ground_truth: &[CausalEdge],
        exclusions: &[BTreeSet<EventType>],
    ) -> Result<AblationReport, EvalError> {
        let baseline = self.run_one(group, ground_truth, BTreeSet::new(), Ratio::Undefined)?;
        let baseline_accuracy = baseline.metrics.accuracy;
        let baseline = AblationRun {
            accuracy_delta: Ratio::Defined(0.0),
            ..baseline
        };

        let mut runs = Vec::with_capacity(exclusions.len());
        for excluded in exclusions {
            let filtered = group.without_types(excluded);
            let run = self.run_one(&filtered, ground_truth, excluded.clone(), baseline_accuracy)?;
            tracing::info!(
                "Ablation {}: {} events, {} edges, accuracy {} ({})",
                run.label(),
                run.events,
                run.edges,
                run.metrics.accuracy,
                run.accuracy_delta
            );
            runs.push(run);
        }

        Ok(AblationReport { baseline, runs })
    }

    fn run_one(
        &self,
        group: &CorrelationGroup,
        ground_truth: &[CausalEdge],
        excluded: BTreeSet<EventType>,
        baseline_accuracy: Ratio,
    ) -> Result<AblationRun, EvalError> {
        let result = self.builder.build(group)?;
        let metrics = compute_metrics(
            result.dag.edges(),
            ground_truth,
            self.builder.config().match_reasons,
        )
        .with_completeness(group.len(), None);

        Ok(AblationRun {
            excluded,
            events: result.dag.events().len(),
            edges: result.dag.edges().len(),
            accuracy_delta: metrics.accuracy.delta(baseline_accuracy),
            metrics,
            diagnostics: result.diagnostics,
        })
    }
}

/// One single-type exclusion per event type present, in type order.
pub fn single_type_exclusions(group: &CorrelationGroup) -> Vec<BTreeSet<EventType>> {
    group
        .event_types()
        .into_iter()
        .map(|t| BTreeSet::from([t]))
        .collect()
}
