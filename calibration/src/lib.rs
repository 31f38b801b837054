//! Offline energy calibrations built from per-channel spectra.
//!
//! Both calibrators start from [`ChannelSpectra`], one raw-energy spectrum
//! per crystal channel, and locate reference peaks in each through a
//! [`PeakFit`]. [`run_residual_calibration`] turns the peak positions into
//! non-linearity curves, [`run_gain_match`] into new linear coefficients.

mod error;
mod gain_match;
pub mod peaks;
mod residual;
mod settings;
mod spectra;
mod store;

pub use error::{CalibrationError, GainMatchError};
pub use gain_match::{
    GainMatchReport, gain_match_channel, gain_match_spectra, run_gain_match, solve_two_point,
};
pub use peaks::{CentroidFit, PeakEstimate, PeakFit};
pub use residual::{
    ChannelResidual, ResidualCalibration, ResidualCurve, ResidualPoint, SkipReason, SkippedPeak,
    calibrate_channel, calibrate_residuals, run_residual_calibration,
};
pub use settings::{GainMatchSettings, ReferencePeak, ResidualSettings, SearchSettings};
pub use spectra::ChannelSpectra;
pub use store::{ChannelCalibration, ChannelCalibrationStore};
