pub mod ablate;
pub mod evaluate;
pub mod failures;
pub mod graph;
pub mod reconstruct;
pub mod scenario;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use spectra_core::config::ReconstructionConfig;
use spectra_core::model::{CausalEdge, CorrelationId, EventType};
use spectra_core::storage::{read_edge_log, read_event_log};
use spectra_reconstruct::{
    correlate, reconstruct_all, BatchReconstruction, CausalDag, CorrelationGroup,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the events (and ground truth) of a reference scenario
    Scenario(scenario::ScenarioArgs),
    /// Reconstruct causal DAGs from an event log
    Reconstruct(reconstruct::ReconstructArgs),
    /// Score a reconstruction against ground truth
    Evaluate(evaluate::EvaluateArgs),
    /// Measure accuracy with event types removed
    Ablate(ablate::AblateArgs),
    /// Trace failure events back to their root causes
    Failures(failures::FailuresArgs),
    /// Show a reconstructed DAG
    Graph(graph::GraphArgs),
    /// Print version information
    Version,
}

/// A single scope plus its ground truth, from a named scenario or from files.
#[derive(Args)]
pub struct TraceSource {
    /// Reference scenario name
    #[arg(long, conflicts_with_all = ["events", "ground_truth"])]
    pub scenario: Option<String>,

    /// Event log (JSONL or JSON array)
    #[arg(long, requires = "ground_truth")]
    pub events: Option<PathBuf>,

    /// Ground-truth edges (JSONL or JSON array)
    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    /// Correlation scope to use when the log holds several
    #[arg(long)]
    pub scope: Option<String>,
}

pub struct LoadedTrace {
    pub name: String,
    pub group: CorrelationGroup,
    pub ground_truth: Vec<CausalEdge>,
    pub expected_events: Option<usize>,
}

impl TraceSource {
    pub fn load(&self) -> Result<LoadedTrace> {
        if let Some(name) = &self.scenario {
            let s = spectra_eval::scenario(name)?;
            return Ok(LoadedTrace {
                name: s.name.to_string(),
                group: s.group(),
                ground_truth: s.ground_truth.clone(),
                expected_events: Some(s.expected_events),
            });
        }

        let (Some(events), Some(truth)) = (&self.events, &self.ground_truth) else {
            bail!("Provide either --scenario or both --events and --ground-truth");
        };
        let group = load_group(events, self.scope.as_deref())?;
        let ground_truth = read_edge_log(truth)
            .with_context(|| format!("Failed to read ground truth {}", truth.display()))?;
        // Truth edges must form a DAG over this scope's events
        CausalDag::from_parts(
            group.correlation_id().clone(),
            group.events().to_vec(),
            ground_truth.clone(),
        )
        .with_context(|| {
            format!(
                "Ground truth {} does not fit scope {}",
                truth.display(),
                group.correlation_id()
            )
        })?;
        Ok(LoadedTrace {
            name: group.correlation_id().to_string(),
            group,
            ground_truth,
            expected_events: None,
        })
    }
}

/// Correlate an event log and pick one scope: `scope` if given, else the first valid one.
pub fn load_group(path: &Path, scope: Option<&str>) -> Result<CorrelationGroup> {
    let records = read_event_log(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    let mut groups = correlate(records);
    if groups.is_empty() {
        bail!("No events in {}", path.display());
    }

    let wanted = scope.map(CorrelationId::from);
    let position = groups.iter().position(|g| match (&wanted, g) {
        (Some(w), Ok(group)) => group.correlation_id() == w,
        (Some(w), Err(e)) => e.scope() == Some(w),
        (None, Ok(_)) => true,
        (None, Err(_)) => false,
    });
    match position {
        Some(i) => Ok(groups.swap_remove(i)?),
        None => match scope {
            Some(s) => bail!("Scope {s} not found in {}", path.display()),
            None => bail!("No valid scope in {}", path.display()),
        },
    }
}

/// Read and reconstruct every scope of an event log.
pub fn reconstruct_log(path: &Path, config: &ReconstructionConfig) -> Result<BatchReconstruction> {
    let records = read_event_log(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    Ok(reconstruct_all(records, config))
}

pub fn parse_event_type(s: &str) -> Result<EventType, String> {
    s.parse().map_err(|e: spectra_core::CoreError| e.to_string())
}
