use crate::{CalibrationError, ChannelSpectra, PeakFit, ResidualSettings};
use griffin_common::{
    ChannelIndex, EnergyResidualTable, EventSource, Histogram1D, Interpolation,
    InterpolationError,
    metrics::{
        failures::{self, FailureKind},
        names::{CHANNEL_FAILURES, PEAKS_SKIPPED},
    },
};
use itertools::Itertools;
use metrics::counter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};
use strum::Display;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResidualPoint {
    pub measured: f64,
    pub residual: f64,
    pub error: f64,
}

impl ResidualPoint {
    fn boundary(measured: f64) -> Self {
        Self {
            measured,
            residual: 0.0,
            error: 0.0,
        }
    }
}

/// Measured-minus-nominal residuals for one channel, by measured energy.
///
/// The last two points are always zero-residual boundary points 10 keV and
/// 30 keV above the highest measured peak, which pin the correction to zero
/// beyond the calibrated range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResidualCurve {
    channel: ChannelIndex,
    points: Vec<ResidualPoint>,
}

impl ResidualCurve {
    pub const FIRST_BOUNDARY_OFFSET: f64 = 10.0;
    pub const SECOND_BOUNDARY_OFFSET: f64 = 20.0;

    /// Orders the measurements and appends the boundary points. Returns
    /// `None` when there are no measurements.
    pub fn from_measurements(channel: ChannelIndex, points: Vec<ResidualPoint>) -> Option<Self> {
        let mut points: Vec<_> = points
            .into_iter()
            .sorted_by(|a, b| a.measured.total_cmp(&b.measured))
            .dedup_by(|a, b| a.measured == b.measured)
            .collect();
        let first_boundary = points.last()?.measured + Self::FIRST_BOUNDARY_OFFSET;
        points.push(ResidualPoint::boundary(first_boundary));
        points.push(ResidualPoint::boundary(
            first_boundary + Self::SECOND_BOUNDARY_OFFSET,
        ));
        Some(Self { channel, points })
    }

    pub fn channel(&self) -> ChannelIndex {
        self.channel
    }

    pub fn points(&self) -> &[ResidualPoint] {
        &self.points
    }

    pub fn interpolation(&self) -> Result<Interpolation, InterpolationError> {
        Interpolation::new(self.points.iter().map(|p| (p.measured, p.residual)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NotFound,
    FitFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkippedPeak {
    pub channel: ChannelIndex,
    pub nominal: f64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelResidual {
    pub channel: ChannelIndex,
    /// Absent when every peak was skipped.
    pub curve: Option<ResidualCurve>,
    pub skipped: Vec<SkippedPeak>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualCalibration {
    pub channels: Vec<ChannelResidual>,
}

impl ResidualCalibration {
    pub fn curves(&self) -> impl Iterator<Item = &ResidualCurve> {
        self.channels.iter().filter_map(|channel| channel.curve.as_ref())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedPeak> {
        self.channels.iter().flat_map(|channel| &channel.skipped)
    }

    pub fn to_table(&self) -> Result<EnergyResidualTable, CalibrationError> {
        let mut table = EnergyResidualTable::empty();
        for curve in self.curves() {
            let interpolation = curve
                .interpolation()
                .map_err(|source| CalibrationError::Curve {
                    channel: curve.channel(),
                    source,
                })?;
            table.insert(curve.channel(), interpolation);
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        Ok(serde_json::to_writer_pretty(File::create(path)?, self)?)
    }
}

/// Measures every reference peak in one channel's spectrum.
///
/// A peak is skipped when the search finds nothing, or only a position below
/// 1 keV, or when the fit fails. Skipping never affects the other peaks.
#[tracing::instrument(skip_all, fields(channel = %channel))]
pub fn calibrate_channel(
    channel: ChannelIndex,
    spectrum: &Histogram1D,
    settings: &ResidualSettings,
    fitter: &impl PeakFit,
) -> ChannelResidual {
    let mut points = Vec::with_capacity(settings.peaks.len());
    let mut skipped = Vec::new();
    let mut skip = |nominal, reason| {
        debug!("Skipping {nominal} keV: {reason}");
        let kind = match reason {
            SkipReason::NotFound => FailureKind::PeakNotFound,
            SkipReason::FitFailed => FailureKind::FitFailed,
        };
        counter!(PEAKS_SKIPPED, &[failures::get_label(kind)]).increment(1);
        skipped.push(SkippedPeak {
            channel,
            nominal,
            reason,
        });
    };

    for peak in &settings.peaks {
        let candidates = fitter.search(spectrum, peak.low(), peak.high(), &settings.search);
        let Some(&guess) = candidates.first().filter(|&&guess| guess >= 1.0) else {
            skip(peak.energy, SkipReason::NotFound);
            continue;
        };
        let Some(estimate) = fitter.fit(spectrum, guess - peak.width, guess + peak.width, guess)
        else {
            skip(peak.energy, SkipReason::FitFailed);
            continue;
        };
        points.push(ResidualPoint {
            measured: estimate.centroid,
            residual: estimate.centroid - peak.energy,
            error: estimate.centroid_error,
        });
    }

    let curve = ResidualCurve::from_measurements(channel, points);
    if curve.is_none() {
        warn!("No peaks found, channel is left uncorrected");
        counter!(
            CHANNEL_FAILURES,
            &[failures::get_label(FailureKind::TooFewPoints)]
        )
        .increment(1);
    }
    ChannelResidual {
        channel,
        curve,
        skipped,
    }
}

/// Residual curves for every channel, calibrated concurrently.
pub fn calibrate_residuals(
    spectra: &ChannelSpectra,
    settings: &ResidualSettings,
    fitter: &impl PeakFit,
) -> Result<ResidualCalibration, CalibrationError> {
    settings.validate()?;
    let channels: Vec<ChannelResidual> = ChannelIndex::all()
        .collect::<Vec<_>>()
        .into_par_iter()
        .filter_map(|channel| {
            let spectrum = spectra.spectrum(channel)?;
            Some(calibrate_channel(channel, &spectrum, settings, fitter))
        })
        .collect();
    let calibration = ResidualCalibration { channels };
    info!(
        "Built {} residual curves, skipped {} peaks",
        calibration.curves().count(),
        calibration.skipped().count()
    );
    Ok(calibration)
}

/// Projects `source` into channel spectra and calibrates them. The settings
/// are checked before any event is read.
#[tracing::instrument(skip_all, fields(num_peaks = settings.peaks.len()))]
pub fn run_residual_calibration<S: EventSource>(
    source: &mut S,
    settings: &ResidualSettings,
    fitter: &impl PeakFit,
) -> Result<ResidualCalibration, CalibrationError> {
    settings.validate()?;
    let spectra = ChannelSpectra::from_source(source)?;
    calibrate_residuals(&spectra, settings, fitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CentroidFit, PeakEstimate, ReferencePeak, SearchSettings};
    use assert_approx_eq::assert_approx_eq;
    use griffin_common::{
        Axis, CrystalId, DetectorId, EventFrame, Hit, QualityFlag, VecEventSource,
    };
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    fn channel(index: usize) -> ChannelIndex {
        ChannelIndex::new(index).unwrap()
    }

    /// A fitter that reports every nominal position shifted by a fixed amount.
    struct Shifted {
        shift: f64,
        missing: Vec<f64>,
    }

    impl PeakFit for Shifted {
        fn search(&self, _: &Histogram1D, low: f64, high: f64, _: &SearchSettings) -> Vec<f64> {
            let centre = (low + high) / 2.0;
            if self.missing.iter().any(|m| (m - centre).abs() < 1e-6) {
                vec![]
            } else {
                vec![centre + self.shift]
            }
        }

        fn fit(&self, _: &Histogram1D, _: f64, _: f64, guess: f64) -> Option<PeakEstimate> {
            Some(PeakEstimate {
                centroid: guess,
                centroid_error: 0.05,
            })
        }
    }

    fn empty_spectrum() -> Histogram1D {
        Histogram1D::new(Axis::new(10, 0.0, 10.0).unwrap())
    }

    #[test]
    fn boundary_points_close_every_curve() {
        let settings = ResidualSettings::default();
        let fitter = Shifted {
            shift: 0.5,
            missing: vec![],
        };
        let result = calibrate_channel(channel(3), &empty_spectrum(), &settings, &fitter);
        let curve = result.curve.unwrap();
        let points = curve.points();
        assert_eq!(points.len(), settings.peaks.len() + 2);

        let [.., last_measured, first_boundary, second_boundary] = points else {
            panic!("curve too short");
        };
        assert_approx_eq!(last_measured.measured, 2547.11);
        assert_approx_eq!(first_boundary.measured, last_measured.measured + 10.0);
        assert_approx_eq!(second_boundary.measured, last_measured.measured + 30.0);
        for boundary in [first_boundary, second_boundary] {
            assert_eq!(boundary.residual, 0.0);
            assert_eq!(boundary.error, 0.0);
        }
        assert!(points.windows(2).all(|w| w[0].measured < w[1].measured));
        assert!(
            points
                .iter()
                .take(settings.peaks.len())
                .all(|p| (p.residual - 0.5).abs() < 1e-9)
        );
    }

    #[test]
    fn missing_peaks_are_skipped() {
        let settings = ResidualSettings::default();
        let fitter = Shifted {
            shift: 0.0,
            missing: vec![511.0, 2546.61],
        };
        let result = calibrate_channel(channel(0), &empty_spectrum(), &settings, &fitter);
        let skipped: Vec<_> = result.skipped.iter().map(|s| s.nominal).collect();
        assert_eq!(skipped, vec![511.0, 2546.61]);

        let points = result.curve.unwrap().points().to_vec();
        assert_eq!(points.len(), settings.peaks.len() - 2 + 2);
        assert_approx_eq!(points[points.len() - 2].measured, 2118.26 + 10.0);
    }

    #[test]
    fn channel_without_peaks_has_no_curve() {
        let settings = ResidualSettings {
            peaks: vec![ReferencePeak::new(511.0, 20.0)],
            ..ResidualSettings::default()
        };
        let fitter = Shifted {
            shift: 0.0,
            missing: vec![511.0],
        };
        let result = calibrate_channel(channel(0), &empty_spectrum(), &settings, &fitter);
        assert!(result.curve.is_none());
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn candidates_below_one_kev_are_skipped() {
        let settings = ResidualSettings {
            peaks: vec![ReferencePeak::new(10.0, 20.0)],
            ..ResidualSettings::default()
        };
        let fitter = Shifted {
            shift: -9.5,
            missing: vec![],
        };
        let result = calibrate_channel(channel(0), &empty_spectrum(), &settings, &fitter);
        assert!(result.curve.is_none());
        assert_eq!(
            result.skipped.first().map(|s| s.reason),
            Some(SkipReason::NotFound)
        );
    }

    #[test]
    fn measurements_are_ordered_before_boundaries() {
        let curve = ResidualCurve::from_measurements(
            channel(0),
            vec![
                ResidualPoint {
                    measured: 1000.0,
                    residual: 1.0,
                    error: 0.1,
                },
                ResidualPoint {
                    measured: 500.0,
                    residual: -1.0,
                    error: 0.1,
                },
            ],
        )
        .unwrap();
        let measured: Vec<_> = curve.points().iter().map(|p| p.measured).collect();
        assert_eq!(measured, vec![500.0, 1000.0, 1010.0, 1030.0]);
        let interpolation = curve.interpolation().unwrap();
        assert_approx_eq!(interpolation.eval(750.0), 0.0);
        assert_approx_eq!(interpolation.eval(5000.0), 0.0);
    }

    #[test]
    fn mismatched_settings_fail_before_reading() {
        struct Unreadable;
        impl EventSource for Unreadable {
            type Error = std::io::Error;
            fn len(&self) -> usize {
                1
            }
            fn event(&mut self, _: usize) -> Result<EventFrame, Self::Error> {
                Err(std::io::Error::other("unreadable"))
            }
        }
        let settings = ResidualSettings {
            peaks: vec![],
            ..ResidualSettings::default()
        };
        assert!(matches!(
            run_residual_calibration(&mut Unreadable, &settings, &CentroidFit),
            Err(CalibrationError::NoPeaks)
        ));
    }

    /// Events whose hits reproduce every reference line exactly, with a
    /// linear, correctly calibrated response.
    fn linear_frames(channels: &[ChannelIndex], settings: &ResidualSettings) -> Vec<EventFrame> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut frames = Vec::new();
        for &channel in channels {
            for peak in &settings.peaks {
                let line = Normal::new(peak.energy, 1.5).unwrap();
                let hits = (0..8000)
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
                frames.push(EventFrame::new(hits, vec![]));
            }
        }
        frames
    }

    #[test]
    fn residuals_vanish_for_linear_response() {
        let settings = ResidualSettings::default();
        let channels = [
            ChannelIndex::from_detector_crystal(
                DetectorId::new(1).unwrap(),
                CrystalId::new(0).unwrap(),
            ),
            channel(45),
        ];
        let mut source = VecEventSource::new(linear_frames(&channels, &settings));
        let calibration =
            run_residual_calibration(&mut source, &settings, &CentroidFit).unwrap();

        assert_eq!(calibration.channels.len(), 64);
        assert_eq!(calibration.curves().count(), 2);
        for curve in calibration.curves() {
            assert!(channels.contains(&curve.channel()));
            assert_eq!(curve.points().len(), settings.peaks.len() + 2);
            for point in curve.points() {
                assert_approx_eq!(point.residual, 0.0, 0.1);
            }
        }

        let table = calibration.to_table().unwrap();
        assert_eq!(table.len(), 2);
        for peak in &settings.peaks {
            assert_approx_eq!(table.correct(channel(45), peak.energy), peak.energy, 0.1);
        }
    }
}
