use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spectra_core::SpectraConfig;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "spectra",
    version,
    about = "Reconstruct causal traces of multi-agent runs from semantic events"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// JSON config file (reconstruction and failure settings)
    #[arg(long, global = true, env = "SPECTRA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<SpectraConfig> {
    match path {
        Some(path) => SpectraConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SpectraConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match &cli.command {
        commands::Commands::Scenario(args) => commands::scenario::run(args, cli.format),
        commands::Commands::Reconstruct(args) => {
            commands::reconstruct::run(args, &config, cli.format)
        }
        commands::Commands::Evaluate(args) => commands::evaluate::run(args, &config, cli.format),
        commands::Commands::Ablate(args) => commands::ablate::run(args, &config, cli.format),
        commands::Commands::Failures(args) => commands::failures::run(args, &config, cli.format),
        commands::Commands::Graph(args) => commands::graph::run(args, &config, cli.format),
        commands::Commands::Version => commands::version::run(),
    }
}
