use crate::{
    Sort,
    output::{Histograms, JsonStyle, write_json},
};
use anyhow::{Context, Result};
use griffin_calibration::ResidualCalibration;
use griffin_coincidence::{
    AnalysisMode, AnalysisSettings, EnergyBinning, RunSummary, run_coincidence_analysis,
};
use griffin_common::EnergyResidualTable;
use griffin_event_file::EventFile;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct SortOutput<'a> {
    mode: AnalysisMode,
    summary: RunSummary,
    histograms: Histograms<'a>,
}

/// Loads residual curves, or an empty table when none are given.
pub(crate) fn load_residuals(path: Option<&Path>) -> Result<EnergyResidualTable> {
    let Some(path) = path else {
        return Ok(EnergyResidualTable::empty());
    };
    let table = ResidualCalibration::load(path)
        .with_context(|| format!("Cannot load residuals from {}", path.display()))?
        .to_table()?;
    info!("Loaded residual curves for {} channels", table.len());
    Ok(table)
}

fn settings(mode: AnalysisMode, args: &Sort) -> AnalysisSettings {
    let binning = args.bins.map(|bins| {
        let default = mode.default_binning();
        EnergyBinning::new(bins, default.low, args.energy_max.unwrap_or(default.high))
    });
    AnalysisSettings {
        first_entry: args.first_entry,
        max_entries: args.max_entries,
        binning,
        ..AnalysisSettings::new(mode)
    }
}

pub(crate) fn run(mode: AnalysisMode, args: Sort) -> Result<()> {
    let table = load_residuals(args.residuals.as_deref())?;
    let settings = settings(mode, &args);
    let mut source = EventFile::open(&args.events)
        .with_context(|| format!("Cannot open {}", args.events.display()))?;

    let (sink, summary) = run_coincidence_analysis(&mut source, &table, &settings)?;
    write_json(
        &SortOutput {
            mode,
            summary,
            histograms: Histograms(&sink),
        },
        args.output.as_deref(),
        JsonStyle::Compact,
    )
}
