use crate::{
    CalibrationError, ChannelCalibration, ChannelCalibrationStore, ChannelSpectra,
    GainMatchError, GainMatchSettings, PeakFit, ReferencePeak, SearchSettings,
};
use griffin_common::{
    ChannelIndex, EventSource, Histogram1D,
    metrics::{
        failures::{self, FailureKind},
        names::CHANNEL_FAILURES,
    },
};
use metrics::counter;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// New coefficients from two peaks measured in the old calibration.
///
/// Each measured energy is mapped back to the charge that produced it, and
/// the line through the two (charge, nominal energy) points is the new
/// calibration.
pub fn solve_two_point(
    old: &ChannelCalibration,
    measured: [f64; 2],
    nominal: [f64; 2],
) -> Result<ChannelCalibration, GainMatchError> {
    let [m0, m1] = measured;
    let [n0, n1] = nominal;
    let (Some(c0), Some(c1)) = (old.charge(m0), old.charge(m1)) else {
        return Err(GainMatchError::ZeroSlope);
    };
    if c0 == c1 {
        return Err(GainMatchError::DegenerateCharges(c0));
    }
    let slope = (n1 - n0) / (c1 - c0);
    Ok(ChannelCalibration::new(n0 - slope * c0, slope))
}

fn measure(
    spectrum: &Histogram1D,
    peak: &ReferencePeak,
    search: &SearchSettings,
    fitter: &impl PeakFit,
) -> Result<f64, GainMatchError> {
    let guess = fitter
        .search(spectrum, peak.low(), peak.high(), search)
        .first()
        .copied()
        .filter(|&guess| guess >= 1.0)
        .ok_or(GainMatchError::PeakNotFound(peak.energy))?;
    fitter
        .fit(spectrum, guess - peak.width, guess + peak.width, guess)
        .map(|estimate| estimate.centroid)
        .ok_or(GainMatchError::FitFailed(peak.energy))
}

/// Gain matches one channel. Either peak failing fails the channel.
pub fn gain_match_channel(
    spectrum: &Histogram1D,
    old: &ChannelCalibration,
    settings: &GainMatchSettings,
    fitter: &impl PeakFit,
) -> Result<ChannelCalibration, GainMatchError> {
    let [first, second] = &settings.peaks;
    let measured = [
        measure(spectrum, first, &settings.search, fitter)?,
        measure(spectrum, second, &settings.search, fitter)?,
    ];
    solve_two_point(old, measured, [first.energy, second.energy])
}

/// Outcome of a gain match run, one entry per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainMatchReport {
    pub channels: BTreeMap<ChannelIndex, Result<ChannelCalibration, GainMatchError>>,
}

impl GainMatchReport {
    pub fn matched(&self) -> impl Iterator<Item = (ChannelIndex, &ChannelCalibration)> {
        self.channels
            .iter()
            .filter_map(|(&channel, result)| Some((channel, result.as_ref().ok()?)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (ChannelIndex, &GainMatchError)> {
        self.channels
            .iter()
            .filter_map(|(&channel, result)| Some((channel, result.as_ref().err()?)))
    }

    /// Writes the new coefficients of every matched channel into `store`.
    /// Failed channels keep their old coefficients.
    pub fn apply(&self, store: &mut ChannelCalibrationStore) {
        for (channel, calibration) in self.matched() {
            store.insert(channel, *calibration);
        }
    }
}

fn failure_kind(error: &GainMatchError) -> FailureKind {
    match error {
        GainMatchError::PeakNotFound(_) => FailureKind::PeakNotFound,
        GainMatchError::FitFailed(_) => FailureKind::FitFailed,
        GainMatchError::NoCalibration
        | GainMatchError::ZeroSlope
        | GainMatchError::DegenerateCharges(_) => FailureKind::DegenerateCalibration,
    }
}

/// Gain matches every channel of `spectra` concurrently.
pub fn gain_match_spectra(
    spectra: &ChannelSpectra,
    store: &ChannelCalibrationStore,
    settings: &GainMatchSettings,
    fitter: &impl PeakFit,
) -> Result<GainMatchReport, CalibrationError> {
    settings.validate()?;
    let channels = ChannelIndex::all()
        .collect::<Vec<_>>()
        .into_par_iter()
        .filter_map(|channel| {
            let spectrum = spectra.spectrum(channel)?;
            let result = store
                .get(channel)
                .ok_or(GainMatchError::NoCalibration)
                .and_then(|old| gain_match_channel(&spectrum, old, settings, fitter));
            if let Err(error) = &result {
                warn!(channel = %channel, "Gain match failed: {error}");
                counter!(
                    CHANNEL_FAILURES,
                    &[failures::get_label(failure_kind(error))]
                )
                .increment(1);
            }
            Some((channel, result))
        })
        .collect::<BTreeMap<_, _>>();
    let report = GainMatchReport { channels };
    info!(
        "Gain matched {} channels, {} failed",
        report.matched().count(),
        report.failed().count()
    );
    Ok(report)
}

/// Projects `source` into channel spectra and gain matches them against the
/// calibrations in `store`.
#[tracing::instrument(skip_all, fields(num_calibrated = store.len()))]
pub fn run_gain_match<S: EventSource>(
    source: &mut S,
    store: &ChannelCalibrationStore,
    settings: &GainMatchSettings,
    fitter: &impl PeakFit,
) -> Result<GainMatchReport, CalibrationError> {
    settings.validate()?;
    let spectra = ChannelSpectra::from_source(source)?;
    gain_match_spectra(&spectra, store, settings, fitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CentroidFit;
    use assert_approx_eq::assert_approx_eq;
    use griffin_common::{EventFrame, Hit, QualityFlag, VecEventSource};
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    const NOMINAL: [f64; 2] = [315.42, 1864.89];

    #[test]
    fn two_point_solution() {
        let old = ChannelCalibration::new(0.0, 1.0);
        let new = solve_two_point(&old, [300.0, 1800.0], NOMINAL).unwrap();
        assert_approx_eq!(new.slope, 1.03298, 1e-9);
        assert_approx_eq!(new.offset, 5.526, 1e-9);
        assert_approx_eq!(new.energy(300.0), 315.42);
        assert_approx_eq!(new.energy(1800.0), 1864.89);
    }

    #[test]
    fn solution_goes_through_old_charges() {
        let old = ChannelCalibration::new(12.0, 0.5);
        let new = solve_two_point(&old, [300.0, 1800.0], NOMINAL).unwrap();
        assert_approx_eq!(new.energy(old.charge(300.0).unwrap()), 315.42);
        assert_approx_eq!(new.energy(old.charge(1800.0).unwrap()), 1864.89);
    }

    #[test]
    fn zero_slope_fails() {
        let old = ChannelCalibration::new(0.0, 0.0);
        assert_eq!(
            solve_two_point(&old, [300.0, 1800.0], NOMINAL),
            Err(GainMatchError::ZeroSlope)
        );
    }

    #[test]
    fn coincident_peaks_fail() {
        let old = ChannelCalibration::new(0.0, 2.0);
        assert_eq!(
            solve_two_point(&old, [500.0, 500.0], NOMINAL),
            Err(GainMatchError::DegenerateCharges(250.0))
        );
    }

    /// Hits in `channel` whose lines sit at `scale` times the nominal
    /// energies.
    fn scaled_frames(channel: ChannelIndex, scale: f64) -> Vec<EventFrame> {
        let mut rng = StdRng::seed_from_u64(7);
        NOMINAL
            .iter()
            .map(|&energy| {
                let line = Normal::new(energy * scale, 1.5).unwrap();
                let hits = (0..5000)
                    .map(|_| {
                        Hit::new(
                            channel.detector(),
                            channel.crystal(),
                            line.sample(&mut rng),
                            0.0,
                            QualityFlag::Good,
                        )
                    })
                    .collect();
                EventFrame::new(hits, vec![])
            })
            .collect()
    }

    #[test]
    fn channels_fail_independently() {
        let good = ChannelIndex::new(20).unwrap();
        let uncalibrated = ChannelIndex::new(21).unwrap();
        let mut frames = scaled_frames(good, 0.995);
        frames.extend(scaled_frames(uncalibrated, 0.995));

        let mut store = ChannelCalibrationStore::new();
        store.insert(good, ChannelCalibration::new(0.0, 1.0));
        let mut source = VecEventSource::new(frames);
        let report = run_gain_match(
            &mut source,
            &store,
            &GainMatchSettings::default(),
            &CentroidFit,
        )
        .unwrap();

        assert_eq!(report.channels.len(), 64);
        assert_eq!(
            report.channels.get(&uncalibrated),
            Some(&Err(GainMatchError::NoCalibration))
        );
        assert!(matches!(
            report.channels.get(&ChannelIndex::new(0).unwrap()),
            Some(Err(GainMatchError::NoCalibration))
        ));

        let matched: Vec<_> = report.matched().collect();
        assert_eq!(matched.len(), 1);
        let (channel, calibration) = matched[0];
        assert_eq!(channel, good);
        assert_approx_eq!(calibration.slope, 1.0 / 0.995, 0.002);
        assert_approx_eq!(calibration.offset, 0.0, 2.0);

        report.apply(&mut store);
        assert_eq!(store.get(good), Some(calibration));
    }

    #[test]
    fn missing_peak_fails_the_channel() {
        let channel = ChannelIndex::new(5).unwrap();
        let mut frames = scaled_frames(channel, 1.0);
        frames.truncate(1);
        let spectra = ChannelSpectra::from_frames(&frames).unwrap();
        let old = ChannelCalibration::new(0.0, 1.0);
        let result = gain_match_channel(
            &spectra.spectrum(channel).unwrap(),
            &old,
            &GainMatchSettings::default(),
            &CentroidFit,
        );
        assert_eq!(result, Err(GainMatchError::PeakNotFound(1864.89)));
    }
}
