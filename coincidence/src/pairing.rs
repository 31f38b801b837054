//! Pair enumeration over the Good hits of one event.
//!
//! Pairs are produced lazily as `(i, j)` with `i < j` in hit order, so the
//! engine never materialises the O(n²) pair list.

use crate::MultiplicityMap;
use griffin_common::{CrystalPair, DetectorId, EventFrame, Hit, Time, geometry};
use itertools::Itertools;

fn good_pairs(frame: &EventFrame) -> impl Iterator<Item = (&Hit, &Hit)> {
    frame
        .hits
        .iter()
        .filter(|hit| hit.is_good())
        .tuple_combinations()
}

/// Two hits in distinct crystals of one clover, ordered by crystal.
#[derive(Debug, Clone, Copy)]
pub struct CrossTalkPair<'a> {
    pub detector: DetectorId,
    pub pair: CrystalPair,
    pub low: &'a Hit,
    pub high: &'a Hit,
}

impl CrossTalkPair<'_> {
    pub fn matrix_index(&self) -> usize {
        self.pair.matrix_index(self.detector)
    }
}

/// Pairs of Good hits in the same clover, where that clover saw exactly two
/// Good hits, `|Δt| <= max_dt` and the crystals differ.
pub fn cross_talk_pairs<'a>(
    frame: &'a EventFrame,
    multiplicity: &'a MultiplicityMap,
    max_dt: Time,
) -> impl Iterator<Item = CrossTalkPair<'a>> + 'a {
    good_pairs(frame).filter_map(move |(a, b)| {
        if multiplicity.get(a.detector) != 2 || a.detector != b.detector {
            return None;
        }
        if !((a.timestamp - b.timestamp).abs() <= max_dt) {
            return None;
        }
        let pair = CrystalPair::new(a.crystal, b.crystal)?;
        let (low, high) = if a.crystal < b.crystal { (a, b) } else { (b, a) };
        Some(CrossTalkPair {
            detector: a.detector,
            pair,
            low,
            high,
        })
    })
}

/// Two Good hits anywhere in the array, in hit order.
#[derive(Debug, Clone, Copy)]
pub struct GammaGammaPair<'a> {
    pub first: &'a Hit,
    pub second: &'a Hit,
}

impl GammaGammaPair<'_> {
    pub fn time_difference(&self) -> Time {
        (self.first.timestamp - self.second.timestamp).abs()
    }

    pub fn opening_angle(&self) -> f64 {
        geometry::opening_angle(&self.first.position, &self.second.position)
    }

    pub fn energies(&self) -> (f64, f64) {
        (self.first.corrected_energy, self.second.corrected_energy)
    }
}

/// Every pair of Good hits that are not in the same crystal.
pub fn gamma_gamma_pairs(frame: &EventFrame) -> impl Iterator<Item = GammaGammaPair<'_>> {
    good_pairs(frame)
        .filter(|(a, b)| (a.detector, a.crystal) != (b.detector, b.crystal))
        .map(|(first, second)| GammaGammaPair { first, second })
}
