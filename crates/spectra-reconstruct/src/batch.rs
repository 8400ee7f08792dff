use serde::Serialize;
use spectra_core::config::ReconstructionConfig;
use spectra_core::model::{CorrelationId, EventRecord};

use crate::correlator::correlate;
use crate::dag::{DagBuilder, Reconstruction};
use crate::diagnostics::Diagnostic;
use crate::error::ReconstructError;

/// Per-scope outcomes of reconstructing a whole record batch.
#[derive(Debug)]
pub struct BatchReconstruction {
    pub scopes: Vec<Result<Reconstruction, ReconstructError>>,
    /// Batch-level diagnostics (scope diagnostics live in each reconstruction).
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchReconstruction {
    pub fn successes(&self) -> impl Iterator<Item = &Reconstruction> + '_ {
        self.scopes.iter().filter_map(|s| s.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReconstructError> + '_ {
        self.scopes.iter().filter_map(|s| s.as_ref().err())
    }

    /// Look up a successfully reconstructed scope.
    pub fn scope(&self, correlation_id: &CorrelationId) -> Option<&Reconstruction> {
        self.successes()
            .find(|r| r.dag.correlation_id() == correlation_id)
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.successes().count();
        BatchSummary {
            scopes: self.scopes.len(),
            succeeded,
            failed: self.scopes.len() - succeeded,
            events: self.successes().map(|r| r.dag.events().len()).sum(),
            edges: self.successes().map(|r| r.dag.edges().len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub scopes: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub events: usize,
    pub edges: usize,
}

/// Correlate a record batch and reconstruct every scope independently.
pub fn reconstruct_all<I>(records: I, config: &ReconstructionConfig) -> BatchReconstruction
where
    I: IntoIterator<Item = EventRecord>,
{
    let groups = correlate(records);
    if groups.is_empty() {
        tracing::warn!("No events to reconstruct");
        return BatchReconstruction {
            scopes: Vec::new(),
            diagnostics: vec![Diagnostic::EmptyInput],
        };
    }

    let builder = DagBuilder::new(config.clone());
    let scopes = groups
        .into_iter()
        .map(|group| {
            let outcome = group.and_then(|g| builder.build(&g));
            if let Err(e) = &outcome {
                tracing::warn!("Scope failed: {e}");
            }
            outcome
        })
        .collect();

    BatchReconstruction {
        scopes,
        diagnostics: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_core::model::{EventKind, Timestamp};

    fn record(id: &str, scope: &str, ts: Option<i64>) -> EventRecord {
        EventRecord {
            event_id: id.into(),
            kind: EventKind::ReasoningStep,
            agent_id: Some("agent".into()),
            timestamp: ts.map(Timestamp),
            correlation_id: Some(scope.into()),
            payload: Default::default(),
            invalid: None,
        }
    }

    #[test]
    fn test_empty_batch_reports_empty_input() {
        let batch = reconstruct_all(Vec::new(), &ReconstructionConfig::default());
        assert!(batch.scopes.is_empty());
        assert_eq!(batch.diagnostics, vec![Diagnostic::EmptyInput]);
    }

    #[test]
    fn test_failed_scope_does_not_affect_others() {
        let batch = reconstruct_all(
            vec![
                record("a1", "left", Some(0)),
                record("b1", "right", None),
                record("a2", "left", Some(1_000)),
            ],
            &ReconstructionConfig::default(),
        );

        let summary = batch.summary();
        assert_eq!(summary.scopes, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.edges, 1);

        let left = batch.scope(&"left".into()).unwrap();
        assert_eq!(left.dag.edges().len(), 1);
        assert!(batch.scope(&"right".into()).is_none());
        assert_eq!(
            batch.failures().next().unwrap().scope().unwrap().as_str(),
            "right"
        );
    }

    #[test]
    fn test_undecodable_line_fails_its_scope() {
        let log = concat!(
            r#"{"event_id":"e1","event_type":"REASONING_STEP","agent_id":"a","timestamp":0,"correlation_id":"run"}"#,
            "\n",
            r#"{"event_id":"e2","event_type":"REASONING_STEP","agent_id":"a","timestamp":1.5,"correlation_id":"run"}"#,
            "\n",
            r#"{"event_id":"e3","event_type":"REASONING_STEP","agent_id":"a","timestamp":2000,"correlation_id":"run"}"#,
            "\n",
        );
        let records = spectra_core::storage::parse_event_log(log).unwrap();
        let batch = reconstruct_all(records, &ReconstructionConfig::default());

        let summary = batch.summary();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);
        let err = batch.failures().next().unwrap();
        assert_eq!(err.scope().unwrap().as_str(), "run");
        assert!(err.to_string().contains("timestamp"));
    }
}
