use anyhow::Result;
use clap::Args;
use spectra_core::SpectraConfig;
use spectra_eval::evaluate_dag;
use spectra_reconstruct::DagBuilder;

use super::TraceSource;
use crate::output::format::{format_diagnostics, format_metrics};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub source: TraceSource,

    /// Match edges on (from, to, reason) instead of (from, to)
    #[arg(long)]
    pub match_reasons: bool,
}

pub fn run(args: &EvaluateArgs, config: &SpectraConfig, format: OutputFormat) -> Result<()> {
    let trace = args.source.load()?;
    let mut settings = config.reconstruction.clone();
    settings.match_reasons |= args.match_reasons;

    let result = DagBuilder::new(settings.clone()).build(&trace.group)?;
    let metrics = evaluate_dag(
        &result.dag,
        &trace.ground_truth,
        settings.match_reasons,
        trace.expected_events,
    );

    println!("{}", format_metrics(&trace.name, &metrics, format).trim_end());
    if !matches!(format, OutputFormat::Json) {
        print!("{}", format_diagnostics(&result.diagnostics));
    }
    Ok(())
}
