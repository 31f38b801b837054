//! Locating calibration lines in a spectrum.
//!
//! Search treats the spectrum as a stream of `(energy, counts)` points:
//! ```text
//! spectrum.window(low, high)
//!     .window(GaussianSmoothing::new(sigma, bin_width))   // smoothed counts
//!     .events(LocalMaximumDetector::default())            // every local maximum
//! ```
//! and the candidates are then ranked by height. A fit refines one candidate
//! into a centroid with an uncertainty.

mod centroid;
mod detector;
mod window;

pub use centroid::CentroidFit;
pub use detector::{Candidate, Detector, EventFilter, LocalMaximumDetector};
pub use window::{GaussianSmoothing, Window, WindowFilter};

use crate::SearchSettings;
use griffin_common::Histogram1D;
use serde::{Deserialize, Serialize};

pub type Real = f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeakEstimate {
    pub centroid: Real,
    pub centroid_error: Real,
}

/// A peak search and fit. Implementations hold no per-fit state, so one
/// value can serve every channel concurrently.
pub trait PeakFit: Sync {
    /// Candidate positions within `[low, high]`, most intense first.
    fn search(
        &self,
        spectrum: &Histogram1D,
        low: Real,
        high: Real,
        settings: &SearchSettings,
    ) -> Vec<Real>;

    /// Refines `guess` using the bins within `[low, high]`.
    fn fit(&self, spectrum: &Histogram1D, low: Real, high: Real, guess: Real)
    -> Option<PeakEstimate>;
}
