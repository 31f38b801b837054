use crate::{
    ChannelIndex, CrystalId, DetectorId, Energy, EnergyResidualTable, FragmentCount, Time,
    geometry::{self, Position},
};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityFlag {
    #[default]
    Good,
    Pileup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Hit {
    pub detector: DetectorId,
    pub crystal: CrystalId,
    pub raw_energy: Energy,
    /// Equal to `raw_energy` until a residual table is applied.
    pub corrected_energy: Energy,
    pub timestamp: Time,
    pub quality: QualityFlag,
    pub position: Position,
}

impl Hit {
    /// Creates a hit at its crystal's nominal position.
    pub fn new(
        detector: DetectorId,
        crystal: CrystalId,
        raw_energy: Energy,
        timestamp: Time,
        quality: QualityFlag,
    ) -> Self {
        Self {
            detector,
            crystal,
            raw_energy,
            corrected_energy: raw_energy,
            timestamp,
            quality,
            position: geometry::crystal_position(detector, crystal),
        }
    }

    pub fn with_position(self, position: Position) -> Self {
        Self { position, ..self }
    }

    pub fn channel(&self) -> ChannelIndex {
        ChannelIndex::from_detector_crystal(self.detector, self.crystal)
    }

    pub fn is_good(&self) -> bool {
        self.quality == QualityFlag::Good
    }
}

/// A detector-summed hit, pre-aggregated upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddbackHit {
    pub detector: DetectorId,
    pub energy: Energy,
    pub timestamp: Time,
    pub fragments: FragmentCount,
    pub quality: QualityFlag,
}

impl AddbackHit {
    pub fn is_good(&self) -> bool {
        self.quality == QualityFlag::Good
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub hits: Vec<Hit>,
    pub addbacks: Vec<AddbackHit>,
}

impl EventFrame {
    pub fn new(hits: Vec<Hit>, addbacks: Vec<AddbackHit>) -> Self {
        Self { hits, addbacks }
    }

    pub fn good_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|hit| hit.is_good())
    }

    pub fn good_addbacks(&self) -> impl Iterator<Item = &AddbackHit> {
        self.addbacks.iter().filter(|hit| hit.is_good())
    }

    /// Recomputes every hit's corrected energy from its raw energy.
    pub fn apply_residuals(&mut self, table: &EnergyResidualTable) {
        for hit in &mut self.hits {
            hit.corrected_energy = table.correct(hit.channel(), hit.raw_energy);
        }
    }
}
