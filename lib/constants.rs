//! Physical constants in natural units and fixed geometry of the diamond
//! lattice around an NV center.
//!
//! Time is measured in seconds and frequencies in radians per second; lengths
//! are converted to time via the speed of light, and magnetic fields are
//! scaled so that `gyromagnetic ratio × field` is an angular frequency.

use crate::vector::Vector3;

// gyromagnetic ratio of the NV electron (includes the electron g-factor)
pub const GE: f64 = -3.9051409185542915e-22;

// gyromagnetic ratio of C-13
pub const G_C13: f64 = 1.492163006551919e-25;

// diamond lattice parameter (unit cell side length) at 300 K
pub const A0: f64 = 1.1897564147527688e-18;

// NV ground-state zero-field splitting [rad/s]
pub const NV_ZFS: f64 = 18032741831.60541;

// one tesla and one gauss in natural units
pub const TESLA: f64 = 4.509081092653326e32;
pub const GAUSS: f64 = 4.509081092653326e28;

/// Unit vectors of the NV frame, expressed in lattice coordinates.
///
/// `z` points from the vacancy to the nitrogen and is also the direction of
/// the static magnetic field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Axes {
    pub x: Vector3,
    pub y: Vector3,
    pub z: Vector3,
}

impl Axes {
    /// Construct the NV frame for a center oriented along `[1, 1, 1]`.
    pub fn nv() -> Self {
        Self {
            x: Vector3::new(2.0, -1.0, -1.0) / 6.0_f64.sqrt(),
            y: Vector3::new(0.0, 1.0, -1.0) / 2.0_f64.sqrt(),
            z: Vector3::new(1.0, 1.0, 1.0) / 3.0_f64.sqrt(),
        }
    }

    /// Return the unit vector at the given azimuthal and polar angles.
    pub fn axis(&self, azimuth: f64, polar: f64) -> Vector3 {
        polar.cos() * self.z
            + polar.sin() * (azimuth.cos() * self.x + azimuth.sin() * self.y)
    }

    /// Return the three unit vectors as an ordered basis.
    pub fn basis(&self) -> [Vector3; 3] { [self.x, self.y, self.z] }
}

impl Default for Axes {
    fn default() -> Self { Self::nv() }
}

/// Primitive vectors of the diamond lattice, scaled to the lattice parameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lattice {
    /// Offset between the two atoms of the primitive cell.
    pub ao: Vector3,
    pub a1: Vector3,
    pub a2: Vector3,
    pub a3: Vector3,
}

impl Lattice {
    /// Construct the diamond lattice with the vacancy at the origin.
    pub fn diamond() -> Self {
        Self {
            ao: Vector3::new(1.0, 1.0, 1.0) / 4.0,
            a1: Vector3::new(0.0, 1.0, 1.0) / 2.0,
            a2: Vector3::new(1.0, 0.0, 1.0) / 2.0,
            a3: Vector3::new(1.0, 1.0, 0.0) / 2.0,
        }
    }

    /// Position of the lattice site `b * ao + l * a1 + m * a2 + n * a3`, where
    /// `b` selects the sublattice.
    pub fn site(&self, b: i32, l: i32, m: i32, n: i32) -> Vector3 {
        f64::from(b) * self.ao
            + f64::from(l) * self.a1
            + f64::from(m) * self.a2
            + f64::from(n) * self.a3
    }
}

impl Default for Lattice {
    fn default() -> Self { Self::diamond() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv_frame_is_orthonormal_and_right_handed() {
        let ax = Axes::nv();
        for v in ax.basis() {
            assert!((v.norm() - 1.0).abs() < 1e-14);
        }
        assert!(ax.x.dot(&ax.y).abs() < 1e-14);
        assert!(ax.y.dot(&ax.z).abs() < 1e-14);
        assert!(ax.z.dot(&ax.x).abs() < 1e-14);
        assert!((ax.x.cross(&ax.y) - ax.z).norm() < 1e-14);
    }

    #[test]
    fn nitrogen_site_lies_on_nv_axis() {
        let lat = Lattice::diamond();
        let n = lat.site(1, 0, 0, 0);
        assert!(n.perp(&Axes::nv().z).norm() < 1e-14);
    }
}
