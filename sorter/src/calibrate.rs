use crate::{
    GainMatch, Residuals,
    output::{JsonStyle, write_json},
};
use anyhow::{Context, Result};
use griffin_calibration::{
    CentroidFit, ChannelCalibrationStore, GainMatchSettings, ResidualSettings, run_gain_match,
    run_residual_calibration,
};
use griffin_event_file::EventFile;
use tracing::{info, warn};

fn residual_settings(args: &Residuals) -> Result<ResidualSettings> {
    let defaults = ResidualSettings::default();
    let Some(peaks) = &args.peaks else {
        return Ok(defaults);
    };
    let widths = args
        .widths
        .clone()
        .unwrap_or_else(|| vec![ResidualSettings::DEFAULT_WIDTH; peaks.len()]);
    Ok(ResidualSettings::from_lists(
        peaks,
        &widths,
        defaults.search,
    )?)
}

pub(crate) fn residuals(args: Residuals) -> Result<()> {
    // Checked before the event file is touched.
    let settings = residual_settings(&args)?;
    let mut source = EventFile::open(&args.events)
        .with_context(|| format!("Cannot open {}", args.events.display()))?;

    let calibration = run_residual_calibration(&mut source, &settings, &CentroidFit)?;
    for skipped in calibration.skipped() {
        info!(
            "Channel {}: skipped {} keV ({})",
            skipped.channel, skipped.nominal, skipped.reason
        );
    }
    write_json(&calibration, args.output.as_deref(), JsonStyle::Pretty)
}

pub(crate) fn gain_match(args: GainMatch) -> Result<()> {
    let mut store = ChannelCalibrationStore::load(&args.calibration).with_context(|| {
        format!("Cannot load calibration from {}", args.calibration.display())
    })?;
    let mut source = EventFile::open(&args.events)
        .with_context(|| format!("Cannot open {}", args.events.display()))?;

    let report = run_gain_match(
        &mut source,
        &store,
        &GainMatchSettings::default(),
        &CentroidFit,
    )?;
    for (channel, error) in report.failed() {
        warn!("Channel {channel} keeps its old calibration: {error}");
    }
    report.apply(&mut store);
    write_json(&store, args.output.as_deref(), JsonStyle::Pretty)
}
