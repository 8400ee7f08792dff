use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spectra_core::storage::{write_edge_log, write_event_log};

use crate::output::OutputFormat;

#[derive(Args)]
pub struct ScenarioArgs {
    /// Scenario name; omit to list the available scenarios
    pub name: Option<String>,

    /// Write events to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Also write the ground-truth edges to this file
    #[arg(long)]
    pub ground_truth: Option<PathBuf>,
}

pub fn run(args: &ScenarioArgs, format: OutputFormat) -> Result<()> {
    let Some(name) = &args.name else {
        return list(format);
    };
    let scenario = spectra_eval::scenario(name)?;

    if let Some(path) = &args.ground_truth {
        write_edge_log(path, &scenario.ground_truth)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "Wrote {} ground-truth edges to {}",
            scenario.ground_truth.len(),
            path.display()
        );
    }

    match &args.out {
        Some(path) => {
            write_event_log(path, &scenario.events)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} events to {}", scenario.events.len(), path.display());
        }
        None => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&scenario.events)?),
            OutputFormat::Text | OutputFormat::Markdown => {
                for event in &scenario.events {
                    println!("{}", serde_json::to_string(event)?);
                }
            }
        },
    }
    Ok(())
}

fn list(format: OutputFormat) -> Result<()> {
    let scenarios = spectra_eval::scenarios::all();
    match format {
        OutputFormat::Json => {
            let listing: Vec<_> = scenarios
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "description": s.description,
                        "events": s.expected_events,
                        "ground_truth_edges": s.ground_truth.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            for s in &scenarios {
                println!(
                    "{:<22} {} events, {} edges  {}",
                    s.name,
                    s.expected_events,
                    s.ground_truth.len(),
                    s.description
                );
            }
        }
    }
    Ok(())
}
