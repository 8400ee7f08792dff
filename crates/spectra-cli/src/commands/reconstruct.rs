use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use spectra_core::storage::TraceStore;
use spectra_core::SpectraConfig;

use crate::output::format::{format_diagnostics, format_reconstruction};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ReconstructArgs {
    /// Event log (JSONL or JSON array)
    pub events: PathBuf,

    /// Proximity threshold in microseconds
    #[arg(long, env = "SPECTRA_THRESHOLD_US")]
    pub threshold_us: Option<u64>,

    /// Persist events and reconstructed edges to this store directory
    #[arg(long)]
    pub store: Option<PathBuf>,
}

pub fn run(args: &ReconstructArgs, config: &SpectraConfig, format: OutputFormat) -> Result<()> {
    let mut settings = config.reconstruction.clone();
    if let Some(threshold) = args.threshold_us {
        settings.proximity_threshold_us = threshold;
    }

    let batch = super::reconstruct_log(&args.events, &settings)?;
    let store = args
        .store
        .as_ref()
        .map(|dir| {
            TraceStore::open(dir).with_context(|| format!("Failed to open store {}", dir.display()))
        })
        .transpose()?;

    if let Some(store) = &store {
        let events: Vec<_> = batch
            .successes()
            .flat_map(|r| r.dag.events().iter().cloned())
            .collect();
        let edges: Vec<_> = batch
            .successes()
            .flat_map(|r| r.dag.edges().iter().cloned())
            .collect();
        store
            .append_trace(&events, &edges)
            .with_context(|| format!("Failed to store trace in {}", store.root().display()))?;
    }

    match format {
        OutputFormat::Json => {
            let scopes: Vec<_> = batch
                .scopes
                .iter()
                .map(|outcome| match outcome {
                    Ok(r) => serde_json::json!({
                        "correlation_id": r.dag.correlation_id(),
                        "edges": r.dag.edges(),
                        "reason_counts": r.dag.reason_counts(),
                        "diagnostics": r.diagnostics,
                    }),
                    Err(e) => serde_json::json!({
                        "correlation_id": e.scope(),
                        "error": e.to_string(),
                    }),
                })
                .collect();
            let out = serde_json::json!({
                "summary": batch.summary(),
                "scopes": scopes,
                "diagnostics": batch.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            print!("{}", format_diagnostics(&batch.diagnostics));
            for outcome in &batch.scopes {
                match outcome {
                    Ok(r) => print!("{}", format_reconstruction(r, format)),
                    Err(e) => println!("Scope failed: {e}"),
                }
            }
            let summary = batch.summary();
            println!(
                "\n{} scope(s): {} reconstructed, {} failed, {} edges",
                summary.scopes, summary.succeeded, summary.failed, summary.edges
            );
        }
    }

    if let Some(store) = &store {
        eprintln!("Stored trace in {}", store.root().display());
    }
    let summary = batch.summary();
    if summary.scopes > 0 && summary.succeeded == 0 {
        bail!("No scope could be reconstructed");
    }
    Ok(())
}
