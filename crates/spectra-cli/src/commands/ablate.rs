use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;
use spectra_core::model::EventType;
use spectra_core::SpectraConfig;
use spectra_eval::ablation::DEFAULT_ESSENTIAL_THRESHOLD;
use spectra_eval::{single_type_exclusions, AblationHarness};

use super::{parse_event_type, TraceSource};
use crate::output::format::format_ablation;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct AblateArgs {
    #[command(flatten)]
    pub source: TraceSource,

    /// Event types to exclude together in one run (repeat for more runs).
    /// Defaults to one run per event type present.
    #[arg(long, value_name = "TYPE,TYPE")]
    pub exclude: Vec<String>,

    /// Accuracy below which an excluded type counts as essential
    #[arg(long, default_value_t = DEFAULT_ESSENTIAL_THRESHOLD)]
    pub essential_threshold: f64,
}

fn parse_exclusion(list: &str) -> Result<BTreeSet<EventType>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_event_type(s).map_err(anyhow::Error::msg))
        .collect()
}

pub fn run(args: &AblateArgs, config: &SpectraConfig, format: OutputFormat) -> Result<()> {
    let trace = args.source.load()?;
    let exclusions = if args.exclude.is_empty() {
        single_type_exclusions(&trace.group)
    } else {
        args.exclude
            .iter()
            .map(|list| parse_exclusion(list))
            .collect::<Result<Vec<_>>>()?
    };

    let report = AblationHarness::new(config.reconstruction.clone()).run(
        &trace.group,
        &trace.ground_truth,
        &exclusions,
    )?;
    let classes = report.classify(args.essential_threshold);
    println!("{}", format_ablation(&report, &classes, format).trim_end());
    Ok(())
}
