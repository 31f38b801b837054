use griffin_common::{ChannelIndex, HistogramError, InterpolationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("{peaks} peaks but {widths} widths")]
    PeakWidthMismatch { peaks: usize, widths: usize },
    #[error("No reference peaks given")]
    NoPeaks,
    #[error("Invalid peak {energy} with half-width {width}")]
    InvalidPeak { energy: f64, width: f64 },
    #[error("Histogram Error: {0}")]
    Histogram(#[from] HistogramError),
    #[error("Could not read event {index}: {source}")]
    Source {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Residual curve for channel {channel}: {source}")]
    Curve {
        channel: ChannelIndex,
        #[source]
        source: InterpolationError,
    },
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single channel could not be gain matched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GainMatchError {
    #[error("No existing calibration")]
    NoCalibration,
    #[error("No peak found near {0} keV")]
    PeakNotFound(f64),
    #[error("Fit failed for the peak near {0} keV")]
    FitFailed(f64),
    #[error("Existing calibration has zero slope")]
    ZeroSlope,
    #[error("Both peaks measured at charge {0}")]
    DegenerateCharges(f64),
}
