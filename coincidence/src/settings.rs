use clap::ValueEnum;
use griffin_common::{Axis, HistogramError, Time};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AnalysisMode {
    /// Crystal-pair matrices within one clover, for cross-talk.
    CrossTalk,
    /// Singles, addback and gamma-gamma matrices, for calibration.
    GammaGamma,
}

impl AnalysisMode {
    pub fn default_binning(self) -> EnergyBinning {
        match self {
            AnalysisMode::CrossTalk => EnergyBinning::new(2000, 0.0, 2000.0),
            AnalysisMode::GammaGamma => EnergyBinning::new(6000, 0.0, 6000.0),
        }
    }
}

/// Energy axis shared by every spectrum and matrix of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBinning {
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl EnergyBinning {
    pub const fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    pub fn axis(&self) -> Result<Axis, HistogramError> {
        Axis::new(self.bins, self.low, self.high)
    }
}

/// Half-open interval `[low, high)` on `|Δt|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub low: Time,
    pub high: Time,
}

impl TimeWindow {
    pub const fn new(low: Time, high: Time) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, dt: Time) -> bool {
        self.low <= dt && dt < self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoincidenceWindows {
    /// Cross-talk pairs need `|Δt|` at most this, inclusive.
    pub cross_talk_max_dt: Time,
    pub prompt: TimeWindow,
    pub time_random: TimeWindow,
    /// Opening angle above which a prompt pair is back to back, radians.
    pub back_to_back_angle: f64,
}

impl Default for CoincidenceWindows {
    fn default() -> Self {
        Self {
            cross_talk_max_dt: 300.0,
            prompt: TimeWindow::new(0.0, 350.0),
            time_random: TimeWindow::new(1000.0, 2000.0),
            back_to_back_angle: 3.13,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisSettings {
    pub mode: AnalysisMode,
    pub first_entry: usize,
    /// Zero, or anything beyond the source length, means every entry.
    pub max_entries: usize,
    pub windows: CoincidenceWindows,
    /// Overrides the mode's default energy axis.
    pub binning: Option<EnergyBinning>,
}

impl AnalysisSettings {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            first_entry: 0,
            max_entries: 0,
            windows: CoincidenceWindows::default(),
            binning: None,
        }
    }

    pub fn binning(&self) -> EnergyBinning {
        self.binning
            .unwrap_or_else(|| self.mode.default_binning())
    }

    /// Entries to process for a source of `len` events.
    pub fn entries(&self, len: usize) -> std::ops::Range<usize> {
        let end = if self.max_entries == 0 || self.max_entries > len {
            len
        } else {
            self.max_entries
        };
        self.first_entry.min(end)..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_window_is_half_open() {
        let windows = CoincidenceWindows::default();
        assert!(windows.prompt.contains(0.0));
        assert!(windows.prompt.contains(349.9));
        assert!(!windows.prompt.contains(350.0));
        assert!(!windows.prompt.contains(f64::NAN));
    }

    #[test]
    fn entry_range() {
        let mut settings = AnalysisSettings::new(AnalysisMode::CrossTalk);
        assert_eq!(settings.entries(100), 0..100);
        settings.max_entries = 40;
        assert_eq!(settings.entries(100), 0..40);
        settings.max_entries = 400;
        assert_eq!(settings.entries(100), 0..100);
        settings.first_entry = 1;
        assert_eq!(settings.entries(100), 1..100);
        settings.first_entry = 200;
        assert_eq!(settings.entries(100), 100..100);
    }

    #[test]
    fn default_binning_follows_mode() {
        let mut settings = AnalysisSettings::new(AnalysisMode::CrossTalk);
        assert_eq!(settings.binning(), EnergyBinning::new(2000, 0.0, 2000.0));
        settings.mode = AnalysisMode::GammaGamma;
        assert_eq!(settings.binning(), EnergyBinning::new(6000, 0.0, 6000.0));
        settings.binning = Some(EnergyBinning::new(10, 0.0, 10.0));
        assert_eq!(settings.binning().bins, 10);
    }

    #[test]
    fn mode_names() {
        assert_eq!(AnalysisMode::CrossTalk.to_string(), "cross-talk");
        assert_eq!(AnalysisMode::GammaGamma.to_string(), "gamma-gamma");
    }
}
