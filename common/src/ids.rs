//! Validated identifiers for the array.
//!
//! Detectors are numbered `1..=16`, crystals `0..=3` within a detector, and
//! the flat channel index runs `0..=63`. Every conversion between these goes
//! through the functions in this module so a 1-based detector id is never
//! used directly as an array offset.

use crate::{CRYSTALS_PER_DETECTOR, NUM_CHANNELS, NUM_CRYSTAL_PAIRS, NUM_DETECTORS};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Detector id {0} outside 1..=16")]
    Detector(u8),
    #[error("Crystal id {0} outside 0..=3")]
    Crystal(u8),
    #[error("Channel index {0} outside 0..=63")]
    Channel(usize),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct DetectorId(u8);

impl DetectorId {
    pub fn new(id: u8) -> Result<Self, IdError> {
        if (1..=NUM_DETECTORS).contains(&id) {
            Ok(Self(id))
        } else {
            Err(IdError::Detector(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position of this detector, in `0..16`.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=NUM_DETECTORS).map(Self)
    }
}

impl TryFrom<u8> for DetectorId {
    type Error = IdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DetectorId> for u8 {
    fn from(value: DetectorId) -> Self {
        value.0
    }
}

impl Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct CrystalId(u8);

impl CrystalId {
    pub fn new(id: u8) -> Result<Self, IdError> {
        if id < CRYSTALS_PER_DETECTOR {
            Ok(Self(id))
        } else {
            Err(IdError::Crystal(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..CRYSTALS_PER_DETECTOR).map(Self)
    }
}

impl TryFrom<u8> for CrystalId {
    type Error = IdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CrystalId> for u8 {
    fn from(value: CrystalId) -> Self {
        value.0
    }
}

impl Display for CrystalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat crystal channel, `4 * (detector - 1) + crystal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChannelIndex(usize);

impl ChannelIndex {
    pub fn new(index: usize) -> Result<Self, IdError> {
        if index < NUM_CHANNELS {
            Ok(Self(index))
        } else {
            Err(IdError::Channel(index))
        }
    }

    pub fn from_detector_crystal(detector: DetectorId, crystal: CrystalId) -> Self {
        Self(detector.index() * usize::from(CRYSTALS_PER_DETECTOR) + crystal.index())
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn detector(self) -> DetectorId {
        // `self.0 < 64` so the quotient is always in `0..16`.
        DetectorId((self.0 / usize::from(CRYSTALS_PER_DETECTOR)) as u8 + 1)
    }

    pub fn crystal(self) -> CrystalId {
        CrystalId((self.0 % usize::from(CRYSTALS_PER_DETECTOR)) as u8)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..NUM_CHANNELS).map(Self)
    }
}

impl TryFrom<usize> for ChannelIndex {
    type Error = IdError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelIndex> for usize {
    fn from(value: ChannelIndex) -> Self {
        value.0
    }
}

impl Display for ChannelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// An unordered pair of distinct crystals in one detector, stored low-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrystalPair {
    low: CrystalId,
    high: CrystalId,
    index: usize,
}

impl CrystalPair {
    /// Returns `None` when both crystals are the same, as a same-crystal pair
    /// has no canonical bin.
    pub fn new(a: CrystalId, b: CrystalId) -> Option<Self> {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let index = match (low.0, high.0) {
            (0, 1) => 0,
            (0, 2) => 1,
            (0, 3) => 2,
            (1, 2) => 3,
            (1, 3) => 4,
            (2, 3) => 5,
            _ => return None,
        };
        Some(Self { low, high, index })
    }

    pub fn low(&self) -> CrystalId {
        self.low
    }

    pub fn high(&self) -> CrystalId {
        self.high
    }

    /// Canonical pair index in `0..6`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// All six pairs in canonical order.
    pub fn all() -> impl Iterator<Item = Self> {
        CrystalId::all()
            .flat_map(|a| CrystalId::all().filter_map(move |b| (a < b).then_some((a, b))))
            .filter_map(|(a, b)| Self::new(a, b))
    }

    /// Index of the cross-talk matrix for this pair in `detector`, in `0..96`.
    pub fn matrix_index(&self, detector: DetectorId) -> usize {
        NUM_CRYSTAL_PAIRS * detector.index() + self.index
    }
}
