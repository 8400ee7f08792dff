use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use spectra_core::model::EventId;
use spectra_core::SpectraConfig;
use spectra_reconstruct::DagBuilder;

use crate::output::OutputFormat;

#[derive(Args)]
pub struct GraphArgs {
    /// Event log (JSONL or JSON array)
    pub events: PathBuf,

    /// Correlation scope (defaults to the first valid one)
    #[arg(long)]
    pub scope: Option<String>,

    /// Center event ID
    #[arg(long)]
    pub node: Option<String>,

    /// Traversal depth from center node
    #[arg(long, default_value = "2")]
    pub depth: usize,

    /// Output DOT format for Graphviz
    #[arg(long)]
    pub dot: bool,
}

pub fn run(args: &GraphArgs, config: &SpectraConfig, format: OutputFormat) -> Result<()> {
    let group = super::load_group(&args.events, args.scope.as_deref())?;
    let full = DagBuilder::new(config.reconstruction.clone()).build(&group)?.dag;

    let dag = match &args.node {
        Some(center) => {
            let id = EventId::from(center.as_str());
            if full.event(&id).is_none() {
                bail!("Event {center} not found in scope {}", full.correlation_id());
            }
            full.subgraph(&id, args.depth)
        }
        None => full,
    };

    if args.dot {
        print!("{}", dag.to_dot());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&dag)?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            println!(
                "Causal graph {}: {} events, {} edges",
                dag.correlation_id(),
                dag.events().len(),
                dag.edges().len()
            );
            println!();
            for event in dag.events() {
                println!(
                    "  [{}] {} {} @ {}",
                    event.event_type(),
                    event.event_id,
                    event.agent_id,
                    event.timestamp
                );
            }
            let roots: Vec<&str> = dag.roots().map(|e| e.event_id.as_str()).collect();
            println!();
            println!("  Roots ({}): {}", roots.len(), roots.join(", "));
            if !dag.edges().is_empty() {
                println!();
                for edge in dag.edges() {
                    println!(
                        "  {} --[{}]--> {}",
                        edge.from_event_id, edge.reason, edge.to_event_id
                    );
                }
            }
            println!();
            println!("Use --dot to output Graphviz format");
        }
    }

    Ok(())
}
