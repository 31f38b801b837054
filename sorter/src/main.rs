mod calibrate;
mod output;
mod simulate;
mod sort;

use anyhow::Result;
use clap::{Parser, Subcommand};
use griffin_coincidence::AnalysisMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Sort crystal-pair matrices for cross-talk studies
    CrossTalk(Sort),

    /// Sort singles, addback and gamma-gamma calibration matrices
    CalMatrices(Sort),

    /// Measure per-channel non-linearity residual curves
    Residuals(Residuals),

    /// Two-point gain match against an existing calibration
    GainMatch(GainMatch),

    /// Write a synthetic event file
    Simulate(Simulate),
}

#[derive(Debug, Parser)]
struct Sort {
    /// Event file to sort
    events: PathBuf,

    /// Residual curves, as written by `residuals`, to correct energies with
    #[clap(long)]
    residuals: Option<PathBuf>,

    /// First entry to sort
    #[clap(long, default_value = "0")]
    first_entry: usize,

    /// Entry to stop before, 0 sorts to the end of the file
    #[clap(long, default_value = "0")]
    max_entries: usize,

    /// Number of energy bins, overriding the default axis
    #[clap(long)]
    bins: Option<usize>,

    /// Upper edge of the energy axis in keV, used with `bins`
    #[clap(long, requires = "bins")]
    energy_max: Option<f64>,

    /// Write the histograms here instead of stdout
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct Residuals {
    /// Event file to project
    events: PathBuf,

    /// Reference peak energies in keV
    #[clap(long, num_args = 1.., value_delimiter = ',')]
    peaks: Option<Vec<f64>>,

    /// Search half-widths in keV, one per peak
    #[clap(long, num_args = 1.., value_delimiter = ',', requires = "peaks")]
    widths: Option<Vec<f64>>,

    /// Write the curves here instead of stdout
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GainMatch {
    /// Event file to project
    events: PathBuf,

    /// Existing channel calibrations
    #[clap(long)]
    calibration: PathBuf,

    /// Write the updated calibrations here instead of stdout
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct Simulate {
    /// Event file to create
    output: PathBuf,

    /// Number of events to generate
    #[clap(long, default_value = "100000")]
    events: usize,

    /// Random seed
    #[clap(long, default_value = "0")]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    griffin_common::metrics::component_info_metric("griffin-sort");

    match cli.mode {
        Mode::CrossTalk(args) => sort::run(AnalysisMode::CrossTalk, args),
        Mode::CalMatrices(args) => sort::run(AnalysisMode::GammaGamma, args),
        Mode::Residuals(args) => calibrate::residuals(args),
        Mode::GainMatch(args) => calibrate::gain_match(args),
        Mode::Simulate(args) => simulate::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_peak_lists() {
        let cli = Cli::try_parse_from([
            "griffin-sort",
            "residuals",
            "run.grfn",
            "--peaks",
            "511,1332.5",
            "--widths",
            "20,15",
        ])
        .unwrap();
        let Mode::Residuals(args) = cli.mode else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.peaks, Some(vec![511.0, 1332.5]));
        assert_eq!(args.widths, Some(vec![20.0, 15.0]));
    }

    #[test]
    fn sort_defaults_to_every_entry() {
        let cli = Cli::try_parse_from(["griffin-sort", "cal-matrices", "run.grfn"]).unwrap();
        let Mode::CalMatrices(args) = cli.mode else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.first_entry, 0);
        assert_eq!(args.max_entries, 0);
        assert!(args.residuals.is_none());
    }
}
