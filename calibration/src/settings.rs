use crate::CalibrationError;
use serde::{Deserialize, Serialize};

/// Coarse peak search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchSettings {
    /// Expected peak sigma, in bins.
    pub sigma: f64,
    /// Candidates lower than this fraction of the highest are dropped.
    pub threshold: f64,
}

impl SearchSettings {
    pub const fn new(sigma: f64, threshold: f64) -> Self {
        Self { sigma, threshold }
    }
}

/// A calibration line at `energy` keV, searched for within `± width` keV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeak {
    pub energy: f64,
    pub width: f64,
}

impl ReferencePeak {
    pub const fn new(energy: f64, width: f64) -> Self {
        Self { energy, width }
    }

    pub fn low(&self) -> f64 {
        self.energy - self.width
    }

    pub fn high(&self) -> f64 {
        self.energy + self.width
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.energy.is_finite() && self.width.is_finite() && self.width > 0.0 {
            Ok(())
        } else {
            Err(CalibrationError::InvalidPeak {
                energy: self.energy,
                width: self.width,
            })
        }
    }
}

const RESIDUAL_PEAKS: [f64; 11] = [
    315.42, 511.0, 570.41, 645.2, 728.53, 769.31, 1008.53, 1054.3, 1864.89, 2118.26, 2546.61,
];
const RESIDUAL_WIDTHS: [f64; 11] = [
    20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 15.0, 20.0, 20.0, 20.0,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResidualSettings {
    pub peaks: Vec<ReferencePeak>,
    pub search: SearchSettings,
}

impl Default for ResidualSettings {
    fn default() -> Self {
        Self {
            peaks: RESIDUAL_PEAKS
                .into_iter()
                .zip(RESIDUAL_WIDTHS)
                .map(|(energy, width)| ReferencePeak::new(energy, width))
                .collect(),
            search: SearchSettings::new(2.0, 0.15),
        }
    }
}

impl ResidualSettings {
    pub const DEFAULT_WIDTH: f64 = 20.0;

    /// Pairs nominal energies with their half-widths. The lists must be the
    /// same length.
    pub fn from_lists(
        peaks: &[f64],
        widths: &[f64],
        search: SearchSettings,
    ) -> Result<Self, CalibrationError> {
        if peaks.len() != widths.len() {
            return Err(CalibrationError::PeakWidthMismatch {
                peaks: peaks.len(),
                widths: widths.len(),
            });
        }
        let settings = Self {
            peaks: peaks
                .iter()
                .zip(widths)
                .map(|(&energy, &width)| ReferencePeak::new(energy, width))
                .collect(),
            search,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.peaks.is_empty() {
            return Err(CalibrationError::NoPeaks);
        }
        self.peaks.iter().try_for_each(ReferencePeak::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GainMatchSettings {
    pub peaks: [ReferencePeak; 2],
    pub search: SearchSettings,
}

impl Default for GainMatchSettings {
    fn default() -> Self {
        Self {
            peaks: [
                ReferencePeak::new(315.42, 20.0),
                ReferencePeak::new(1864.89, 20.0),
            ],
            search: SearchSettings::new(2.0, 0.25),
        }
    }
}

impl GainMatchSettings {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.peaks.iter().try_for_each(ReferencePeak::validate)
    }
}
