//! Classical control fields applied on top of the static field.

use crate::{
    constants::Axes,
    vector::Vector3,
};

/// A single sinusoidal field component, `B cos(w t - phase)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControlComponent {
    /// Amplitude vector.
    pub b: Vector3,
    /// Angular frequency.
    pub w: f64,
    pub phase: f64,
}

impl ControlComponent {
    pub fn new(b: Vector3, w: f64, phase: f64) -> Self { Self { b, w, phase } }

    /// Field vector at time `t`.
    pub fn at(&self, t: f64) -> Vector3 {
        self.b * (self.w * t - self.phase).cos()
    }
}

/// A sum of sinusoidal field components.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlFields {
    components: Vec<ControlComponent>,
}

impl ControlFields {
    /// Create an empty (zero) field.
    pub fn new() -> Self { Self::default() }

    /// Create a field with a single component.
    pub fn single(b: Vector3, w: f64, phase: f64) -> Self {
        Self { components: vec![ControlComponent::new(b, w, phase)] }
    }

    /// Add a component.
    pub fn add(&mut self, b: Vector3, w: f64, phase: f64) -> &mut Self {
        self.components.push(ControlComponent::new(b, w, phase));
        self
    }

    /// Builder-style version of [`Self::add`].
    pub fn with(mut self, b: Vector3, w: f64, phase: f64) -> Self {
        self.add(b, w, phase);
        self
    }

    /// Number of components.
    pub fn len(&self) -> usize { self.components.len() }

    pub fn is_empty(&self) -> bool { self.components.is_empty() }

    pub fn components(&self) -> &[ControlComponent] { &self.components }

    /// Return `true` if no component varies in time.
    pub fn is_static(&self) -> bool {
        self.components.iter().all(|c| c.w == 0.0)
    }

    /// Total field vector at time `t`.
    pub fn at(&self, t: f64) -> Vector3 {
        self.components.iter().map(|c| c.at(t)).sum()
    }

    /// Largest component frequency, or 0 if there are none.
    pub fn max_frequency(&self) -> f64 {
        self.components.iter().map(|c| c.w.abs()).fold(0.0, f64::max)
    }

    /// Upper bound on the field vector over all time, expressed as the sum of
    /// the component amplitudes projected onto each axis of `axes`.
    pub fn amplitude_bound(&self, axes: &Axes) -> Vector3 {
        self.components.iter()
            .map(|c| {
                axes.basis().into_iter()
                    .map(|ax| c.b.dot(&ax).abs() * ax)
                    .sum::<Vector3>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn sinusoid_sum() {
        let x = Vector3::unit(0);
        let z = Vector3::unit(2);
        let ctl = ControlFields::new()
            .with(x * 2.0, 1.0, 0.0)
            .with(z, 3.0, PI / 2.0);
        assert_eq!(ctl.len(), 2);
        assert!(!ctl.is_static());
        assert_eq!(ctl.max_frequency(), 3.0);
        let b = ctl.at(0.0);
        assert!((b - x * 2.0).norm() < 1e-15);
        let b = ctl.at(PI / 2.0);
        // cos(π/2) = 0 and cos(3π/2 - π/2) = -1
        assert!((b + z).norm() < 1e-15);
    }

    #[test]
    fn static_fields() {
        assert!(ControlFields::new().is_static());
        let ctl = ControlFields::single(Vector3::new(0.0, 1.0, 0.0), 0.0, PI);
        assert!(ctl.is_static());
        assert!((ctl.at(123.0) - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn amplitude_bound_dominates_field() {
        let axes = Axes::nv();
        let ctl = ControlFields::new()
            .with(axes.x - axes.z * 2.0, 5.0, 0.3)
            .with(axes.y * 0.5 + axes.z, 7.0, -1.0);
        let bound = ctl.amplitude_bound(&axes);
        assert!((bound.dot(&axes.z) - 3.0).abs() < 1e-12);
        for k in 0..50 {
            let b = ctl.at(0.1 * k as f64);
            assert!(b.norm() <= bound.norm() + 1e-12);
        }
    }
}
