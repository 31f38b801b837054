use crate::CalibrationError;
use griffin_common::ChannelIndex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

/// Linear charge to energy calibration, `energy = offset + slope * charge`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    pub offset: f64,
    pub slope: f64,
}

impl ChannelCalibration {
    pub const fn new(offset: f64, slope: f64) -> Self {
        Self { offset, slope }
    }

    pub fn energy(&self, charge: f64) -> f64 {
        self.offset + self.slope * charge
    }

    /// Inverts the calibration. `None` when the slope is zero.
    pub fn charge(&self, energy: f64) -> Option<f64> {
        (self.slope != 0.0).then(|| (energy - self.offset) / self.slope)
    }
}

/// Channel calibrations, keyed by flat channel index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelCalibrationStore {
    channels: BTreeMap<ChannelIndex, ChannelCalibration>,
}

impl ChannelCalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel with the same calibration.
    pub fn uniform(calibration: ChannelCalibration) -> Self {
        ChannelIndex::all().map(|c| (c, calibration)).collect()
    }

    pub fn get(&self, channel: ChannelIndex) -> Option<&ChannelCalibration> {
        self.channels.get(&channel)
    }

    /// Replaces the channel's coefficients, returning the old ones.
    pub fn insert(
        &mut self,
        channel: ChannelIndex,
        calibration: ChannelCalibration,
    ) -> Option<ChannelCalibration> {
        self.channels.insert(channel, calibration)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelIndex, &ChannelCalibration)> {
        self.channels.iter().map(|(&c, cal)| (c, cal))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        Ok(serde_json::to_writer_pretty(File::create(path)?, self)?)
    }
}

impl FromIterator<(ChannelIndex, ChannelCalibration)> for ChannelCalibrationStore {
    fn from_iter<T: IntoIterator<Item = (ChannelIndex, ChannelCalibration)>>(iter: T) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}
