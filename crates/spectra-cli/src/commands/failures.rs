use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use spectra_core::model::EventType;
use spectra_core::SpectraConfig;
use spectra_eval::FailureAnalyzer;

use super::parse_event_type;
use crate::output::format::format_failures;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct FailuresArgs {
    /// Event log (JSONL or JSON array)
    pub events: PathBuf,

    /// Event type treated as a failure
    #[arg(long, value_parser = parse_event_type)]
    pub failure_type: Option<EventType>,

    /// Maximum number of edges to walk back from a failure
    #[arg(long, env = "SPECTRA_MAX_HOPS")]
    pub max_hops: Option<usize>,

    /// Also walk inferred_by_proximity edges
    #[arg(long)]
    pub follow_inferred: bool,

    /// List everything downstream of each failure as well
    #[arg(long)]
    pub forward: bool,
}

pub fn run(args: &FailuresArgs, config: &SpectraConfig, format: OutputFormat) -> Result<()> {
    let mut settings = config.failure.clone();
    if let Some(t) = args.failure_type {
        settings.failure_type = t;
    }
    if let Some(hops) = args.max_hops {
        settings.max_hops = hops;
    }
    settings.follow_inferred |= args.follow_inferred;

    let batch = super::reconstruct_log(&args.events, &config.reconstruction)?;
    let analyzer = FailureAnalyzer::new(settings);
    let mut json_scopes = Vec::new();

    for outcome in &batch.scopes {
        let r = match outcome {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Scope failed: {e}");
                continue;
            }
        };
        let analysis = analyzer.analyze(&r.dag);
        let forward: Vec<_> = if args.forward {
            analysis
                .failures
                .iter()
                .filter_map(|f| analyzer.propagate_forward(&r.dag, &f.failure))
                .collect()
        } else {
            Vec::new()
        };

        match format {
            OutputFormat::Json => json_scopes.push(serde_json::json!({
                "correlation_id": r.dag.correlation_id(),
                "analysis": analysis,
                "forward": forward,
            })),
            OutputFormat::Text | OutputFormat::Markdown => {
                print!(
                    "{}",
                    format_failures(r.dag.correlation_id().as_str(), &analysis, format)
                );
                for p in &forward {
                    let agents: Vec<&str> = p.affected_agents.iter().map(|a| a.as_str()).collect();
                    println!(
                        "  {} reaches {} event(s) across {}",
                        p.source,
                        p.affected_events.len(),
                        agents.join(", ")
                    );
                }
            }
        }
    }

    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&json_scopes)?);
    }
    Ok(())
}
