use crate::{ChannelIndex, Energy, NUM_CHANNELS};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("Interpolation needs at least two points, got {0}")]
    TooFewPoints(usize),
    #[error("Interpolation abscissae must be finite and strictly increasing, failed at {0}")]
    NotIncreasing(f64),
}

/// Piecewise-linear curve through a set of points.
///
/// Outside the first and last points the curve is extended along the edge
/// segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Interpolation {
    points: Vec<(f64, f64)>,
}

impl Interpolation {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, InterpolationError> {
        if points.len() < 2 {
            return Err(InterpolationError::TooFewPoints(points.len()));
        }
        if let Some(&(x, _)) = points.iter().find(|(x, _)| !x.is_finite()) {
            return Err(InterpolationError::NotIncreasing(x));
        }
        if let Some((_, &(x, _))) = points.iter().tuple_windows().find(|(a, b)| a.0 >= b.0) {
            return Err(InterpolationError::NotIncreasing(x));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn eval(&self, x: f64) -> f64 {
        // Index of the segment whose lower end is the last point at or below x,
        // clamped to the first and last segments.
        let upper = self
            .points
            .partition_point(|&(px, _)| px <= x)
            .clamp(1, self.points.len() - 1);
        match (self.points.get(upper - 1), self.points.get(upper)) {
            (Some(&(x0, y0)), Some(&(x1, y1))) => y0 + (y1 - y0) * (x - x0) / (x1 - x0),
            _ => 0.0,
        }
    }
}

impl TryFrom<Vec<(f64, f64)>> for Interpolation {
    type Error = InterpolationError;

    fn try_from(value: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Interpolation> for Vec<(f64, f64)> {
    fn from(value: Interpolation) -> Self {
        value.points
    }
}

/// Per-channel energy residual curves.
///
/// The corrected energy of a hit is its raw energy less the residual
/// evaluated at the raw energy. Channels without a curve are not corrected,
/// so an empty table leaves every energy untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyResidualTable {
    curves: Vec<Option<Interpolation>>,
}

impl Default for EnergyResidualTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl EnergyResidualTable {
    pub fn empty() -> Self {
        Self {
            curves: vec![None; NUM_CHANNELS],
        }
    }

    pub fn from_curves(curves: impl IntoIterator<Item = (ChannelIndex, Interpolation)>) -> Self {
        let mut table = Self::empty();
        for (channel, curve) in curves {
            table.insert(channel, curve);
        }
        table
    }

    pub fn insert(&mut self, channel: ChannelIndex, curve: Interpolation) {
        if let Some(slot) = self.curves.get_mut(channel.get()) {
            *slot = Some(curve);
        }
    }

    pub fn curve(&self, channel: ChannelIndex) -> Option<&Interpolation> {
        self.curves.get(channel.get()).and_then(Option::as_ref)
    }

    /// Number of channels with a curve.
    pub fn len(&self) -> usize {
        self.curves.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn correct(&self, channel: ChannelIndex, energy: Energy) -> Energy {
        match self.curve(channel) {
            Some(curve) => energy - curve.eval(energy),
            None => energy,
        }
    }
}
