//! Approximate crystal positions for the 16-clover array.
//!
//! Only opening angles are ever derived from these, so the clover faces sit at
//! a common distance and each crystal is a fixed lateral offset from its
//! clover axis.

use crate::{CrystalId, DetectorId};
use std::f64::consts::PI;

pub type Position = [f64; 3];

/// Distance from target to clover face, mm.
const FACE_DISTANCE: f64 = 145.0;
/// Lateral offset of a crystal centre from its clover axis, mm.
const CRYSTAL_OFFSET: f64 = 22.5;

/// Polar and azimuthal angle of a clover axis, in degrees.
fn clover_direction(detector: DetectorId) -> (f64, f64) {
    let index = detector.index();
    match index {
        0..=3 => (45.0, 67.5 + 90.0 * index as f64),
        4..=11 => (90.0, 22.5 + 45.0 * (index - 4) as f64),
        _ => (135.0, 67.5 + 90.0 * (index - 12) as f64),
    }
}

/// Offsets along the local polar and azimuthal unit vectors, in units of
/// `CRYSTAL_OFFSET`.
fn crystal_offset(crystal: CrystalId) -> (f64, f64) {
    match crystal.get() {
        0 => (-1.0, 1.0),
        1 => (1.0, 1.0),
        2 => (1.0, -1.0),
        _ => (-1.0, -1.0),
    }
}

pub fn crystal_position(detector: DetectorId, crystal: CrystalId) -> Position {
    let (theta, phi) = clover_direction(detector);
    let (theta, phi) = (theta * PI / 180.0, phi * PI / 180.0);

    let axis = [
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    ];
    let e_theta = [
        theta.cos() * phi.cos(),
        theta.cos() * phi.sin(),
        -theta.sin(),
    ];
    let e_phi = [-phi.sin(), phi.cos(), 0.0];

    let (a, b) = crystal_offset(crystal);
    let mut position = Position::default();
    for (p, ((n, t), f)) in position
        .iter_mut()
        .zip(axis.iter().zip(&e_theta).zip(&e_phi))
    {
        *p = FACE_DISTANCE * n + CRYSTAL_OFFSET * (a * t + b * f);
    }
    position
}

/// Opening angle between two positions as seen from the target, in radians.
pub fn opening_angle(a: &Position, b: &Position) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |p: &Position| p.iter().map(|x| x * x).sum::<f64>().sqrt();
    let denominator = norm(a) * norm(b);
    if denominator == 0.0 {
        return 0.0;
    }
    (dot / denominator).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn position(detector: u8, crystal: u8) -> Position {
        crystal_position(
            DetectorId::new(detector).unwrap(),
            CrystalId::new(crystal).unwrap(),
        )
    }

    #[test]
    fn same_crystal_has_zero_angle() {
        assert_approx_eq!(opening_angle(&position(5, 2), &position(5, 2)), 0.0, 1e-6);
    }

    #[test]
    fn opposite_clovers_have_back_to_back_crystals() {
        // Detector 1 (45°, 67.5°) faces detector 15 (135°, 247.5°). The polar
        // unit vector is shared and the azimuthal one flips, so crystal 0
        // (-1, +1) mirrors onto crystal 1 (+1, +1).
        let angle = opening_angle(&position(1, 0), &position(15, 1));
        assert_approx_eq!(angle, PI, 1e-9);
    }

    #[test]
    fn neighbouring_crystals_are_not_back_to_back() {
        assert!(opening_angle(&position(1, 0), &position(1, 1)) < 0.5);
        assert!(opening_angle(&position(1, 0), &position(15, 0)) < 3.13);
    }

    #[test]
    fn degenerate_position() {
        assert_eq!(opening_angle(&[0.0; 3], &position(1, 0)), 0.0);
    }
}
