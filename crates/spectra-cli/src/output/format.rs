use spectra_core::model::EdgeReason;
use spectra_eval::{AblationReport, FailureAnalysis, Importance, ReconstructionMetrics};
use spectra_reconstruct::{Diagnostic, Reconstruction};

use super::OutputFormat;

pub fn format_reconstruction(r: &Reconstruction, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(r).unwrap_or_default(),
        OutputFormat::Text => format_reconstruction_text(r),
        OutputFormat::Markdown => format_reconstruction_markdown(r),
    }
}

fn reason_breakdown(r: &Reconstruction) -> String {
    let counts = r.dag.reason_counts();
    EdgeReason::ALL
        .iter()
        .map(|reason| format!("{reason}: {}", counts[reason]))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_reconstruction_text(r: &Reconstruction) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Scope {}: {} events, {} edges ({})\n",
        r.dag.correlation_id(),
        r.dag.events().len(),
        r.dag.edges().len(),
        reason_breakdown(r)
    ));
    for edge in r.dag.edges() {
        out.push_str(&format!(
            "  {} -> {}  [{}]\n",
            edge.from_event_id, edge.to_event_id, edge.reason
        ));
    }
    out.push_str(&format_diagnostics(&r.diagnostics));
    out
}

fn format_reconstruction_markdown(r: &Reconstruction) -> String {
    let mut out = format!("## Scope `{}`\n\n", r.dag.correlation_id());
    out.push_str(&format!(
        "{} events, {} edges ({})\n\n",
        r.dag.events().len(),
        r.dag.edges().len(),
        reason_breakdown(r)
    ));
    out.push_str("| From | To | Reason |\n|---|---|---|\n");
    for edge in r.dag.edges() {
        out.push_str(&format!(
            "| `{}` | `{}` | {} |\n",
            edge.from_event_id, edge.to_event_id, edge.reason
        ));
    }
    if !r.diagnostics.is_empty() {
        out.push_str("\n**Diagnostics**\n\n");
        for d in &r.diagnostics {
            out.push_str(&format!("- {d}\n"));
        }
    }
    out
}

pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  ! {d}\n"))
        .collect()
}

pub fn format_metrics(name: &str, m: &ReconstructionMetrics, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(m).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("Reconstruction metrics - {name}\n"));
            out.push_str(&format!(
                "Accuracy (recall):   {}  ({}/{} ground-truth edges)\n",
                m.accuracy, m.matched, m.ground_truth_edges
            ));
            if !m.accuracy.is_defined() {
                out.push_str("  (ground truth is empty)\n");
            }
            out.push_str(&format!(
                "Precision:           {}  ({}/{} reconstructed edges)\n",
                m.precision, m.matched, m.reconstructed_edges
            ));
            out.push_str(&format!(
                "Trace completeness:  {}  ({} events)\n",
                m.trace_completeness, m.events
            ));
            out.push_str(&format!("False positives:     {}\n", m.false_positives));
            out.push_str(&format!("False negatives:     {}\n", m.false_negatives));
            for key in &m.missing {
                out.push_str(&format!("  missing  {key}\n"));
            }
            for key in &m.spurious {
                out.push_str(&format!("  spurious {key}\n"));
            }
            out
        }
        OutputFormat::Markdown => format!(
            "## {name}\n\n| Metric | Value |\n|---|---|\n\
             | Accuracy | {} |\n| Precision | {} |\n| Trace completeness | {} |\n\
             | False positives | {} |\n| False negatives | {} |\n",
            m.accuracy, m.precision, m.trace_completeness, m.false_positives, m.false_negatives
        ),
    }
}

pub fn format_ablation(
    report: &AblationReport,
    classes: &[(spectra_core::model::EventType, Importance)],
    fmt: OutputFormat,
) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "report": report,
            "classification": classes
                .iter()
                .map(|(t, i)| serde_json::json!({ "event_type": t, "importance": i }))
                .collect::<Vec<_>>(),
        }))
        .unwrap_or_default(),
        OutputFormat::Text | OutputFormat::Markdown => {
            let markdown = matches!(fmt, OutputFormat::Markdown);
            let mut out = String::new();
            if markdown {
                out.push_str("| Configuration | Events | Edges | Accuracy | Delta |\n");
                out.push_str("|---|---|---|---|---|\n");
            } else {
                out.push_str(&format!(
                    "{:<40} | {:<6} | {:<6} | {:>8} | {:>8}\n",
                    "Configuration", "Events", "Edges", "Accuracy", "Delta"
                ));
                out.push_str(&format!("{}\n", "-".repeat(80)));
            }
            for run in std::iter::once(&report.baseline).chain(&report.runs) {
                let label = run.label();
                if markdown {
                    out.push_str(&format!(
                        "| {label} | {} | {} | {} | {} |\n",
                        run.events, run.edges, run.metrics.accuracy, run.accuracy_delta
                    ));
                } else {
                    out.push_str(&format!(
                        "{label:<40} | {:<6} | {:<6} | {:>8} | {:>8}\n",
                        run.events,
                        run.edges,
                        run.metrics.accuracy.to_string(),
                        run.accuracy_delta.to_string()
                    ));
                }
            }
            if !classes.is_empty() {
                out.push('\n');
                for (event_type, importance) in classes {
                    let label = match importance {
                        Importance::Essential => "essential",
                        Importance::Optional => "optional",
                    };
                    out.push_str(&format!("{event_type}: {label}\n"));
                }
            }
            out
        }
    }
}

pub fn format_failures(scope: &str, analysis: &FailureAnalysis, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(analysis).unwrap_or_default(),
        OutputFormat::Text | OutputFormat::Markdown => {
            let mut out = format!("Scope {scope}: {} failure(s)\n", analysis.failures.len());
            for trace in &analysis.failures {
                out.push_str(&format!("Failure {} ({})\n", trace.failure, trace.agent));
                if let Some(trigger) = &trace.trigger {
                    out.push_str(&format!("  trigger: {trigger}\n"));
                }
                for cause in &trace.root_causes {
                    let path: Vec<&str> = cause.path.iter().map(|e| e.as_str()).collect();
                    out.push_str(&format!(
                        "  root {}: {}\n",
                        cause.root,
                        path.join(" -> ")
                    ));
                }
                let agents: Vec<&str> = trace.affected_agents.iter().map(|a| a.as_str()).collect();
                out.push_str(&format!(
                    "  affected agents ({}): {}\n",
                    agents.len(),
                    agents.join(", ")
                ));
                if trace.truncated {
                    out.push_str("  (walk truncated at hop limit)\n");
                }
            }
            out.push_str(&format_diagnostics(&analysis.diagnostics));
            out
        }
    }
}
