//! Spins in the diamond lattice and the NV-plus-bath system they make up.
//!
//! All positions are in units of the lattice parameter [`A0`], measured from
//! the vacancy. The NV electron is treated as a two-level system spanned by
//! the `|ms⟩` (qubit state 0) and `|0⟩` (qubit state 1) sublevels of its
//! ground-state triplet.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::{
    axy::Harmonic,
    constants::{ A0, Axes, G_C13, GE, Lattice },
    error::{ NvError, NvResult },
    opvec::OpVec,
    vector::Vector3,
};

/// Single-qubit operators, constructed once per system.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinOps {
    /// Identity.
    pub I: nd::Array2<C64>,
    /// Pauli X.
    pub sx: nd::Array2<C64>,
    /// Pauli Y.
    pub sy: nd::Array2<C64>,
    /// Pauli Z.
    pub sz: nd::Array2<C64>,
    /// Projector onto qubit state 0.
    pub proj_up: nd::Array2<C64>,
    /// Projector onto qubit state 1.
    pub proj_dn: nd::Array2<C64>,
    /// Spin-1/2 vector operator with its quantization axis along the NV axis.
    pub s_vec: OpVec,
}

impl SpinOps {
    /// Build the operators, orienting [`Self::s_vec`] along `axes`.
    pub fn new(axes: &Axes) -> Self {
        let (o, l, i) = (C64::zero(), C64::one(), C64::i());
        let I: nd::Array2<C64> = nd::Array2::eye(2);
        let sx: nd::Array2<C64> = nd::array![[o, l], [l, o]];
        let sy: nd::Array2<C64> = nd::array![[o, -i], [i, o]];
        let sz: nd::Array2<C64> = nd::array![[l, o], [o, -l]];
        let proj_up: nd::Array2<C64> = nd::array![[l, o], [o, o]];
        let proj_dn: nd::Array2<C64> = nd::array![[o, o], [o, l]];
        let s_vec
            = OpVec::from_axis(&(&sx * 0.5), &axes.x)
            + OpVec::from_axis(&(&sy * 0.5), &axes.y)
            + OpVec::from_axis(&(&sz * 0.5), &axes.z);
        Self { I, sx, sy, sz, proj_up, proj_dn, s_vec }
    }
}

impl Default for SpinOps {
    fn default() -> Self { Self::new(&Axes::nv()) }
}

/// A spin at a fixed position.
#[derive(Clone, Debug, PartialEq)]
pub struct Spin {
    /// Position in lattice units.
    pub pos: Vector3,
    /// Gyromagnetic ratio.
    pub g: f64,
    /// Spin vector operator.
    pub S: OpVec,
}

impl Spin {
    pub fn new(pos: Vector3, g: f64, S: OpVec) -> Self { Self { pos, g, S } }

    /// The NV electron spin, restricted to its `{|ms⟩, |0⟩}` subspace.
    ///
    /// `ms` is the spin projection of the electron's active sublevel and
    /// should be `±1`.
    pub fn nv_electron(ms: i32) -> Self {
        let axes = Axes::nv();
        let ops = SpinOps::new(&axes);
        let m = f64::from(ms);
        let S
            = OpVec::from_axis(&(&ops.sx / 2.0_f64.sqrt()), &axes.x)
            + OpVec::from_axis(&(&ops.sy * (m / 2.0_f64.sqrt())), &axes.y)
            + OpVec::from_axis(&((&ops.sz + &ops.I) * (m / 2.0)), &axes.z);
        Self::new(Vector3::zeros(), GE, S)
    }

    /// The nitrogen nucleus, which is taken not to couple to anything.
    pub fn nitrogen() -> Self {
        Self::new(
            Lattice::diamond().ao,
            0.0,
            SpinOps::default().s_vec,
        )
    }

    /// A C-13 nucleus at `pos`.
    pub fn c13(pos: Vector3) -> Self {
        Self::new(pos, G_C13, SpinOps::default().s_vec)
    }
}

/// An NV center together with a bath of nuclear spins and the parameters
/// controlling how it is simulated.
#[derive(Clone, Debug)]
pub struct NvSystem {
    pub axes: Axes,
    pub lattice: Lattice,
    pub ops: SpinOps,
    /// Spin projection of the active NV sublevel, `±1`.
    pub ms: i32,
    /// Static field strength along the NV axis.
    pub static_bz: f64,
    /// Ratio between the strength of the interaction being driven and the
    /// couplings it must resolve; larger is slower and more selective.
    pub scale_factor: f64,
    /// Number of integration steps per unit of the fastest time scale.
    pub integration_factor: f64,
    /// Default AXY harmonic.
    pub k_dd: Harmonic,
    pub e: Spin,
    pub n: Spin,
    pub nuclei: Vec<Spin>,
    // partition of `nuclei` into non-interacting clusters; only replaced
    // through `set_clusters` and the calibration routines
    pub(crate) clusters: Vec<Vec<usize>>,
}

impl NvSystem {
    /// Create a new system with no nuclei.
    pub fn new(
        ms: i32,
        static_bz: f64,
        scale_factor: f64,
        integration_factor: f64,
        k_dd: Harmonic,
    ) -> NvResult<Self>
    {
        if ms != 1 && ms != -1 {
            return Err(NvError::InvalidParam(
                format!("ms must be +1 or -1; got {}", ms)));
        }
        if !(scale_factor > 0.0) {
            return Err(NvError::InvalidParam(
                format!("scale factor must be positive; got {}", scale_factor)));
        }
        if !(integration_factor > 0.0) {
            return Err(NvError::InvalidParam(
                format!(
                    "integration factor must be positive; got {}",
                    integration_factor,
                )
            ));
        }
        let axes = Axes::nv();
        Ok(Self {
            axes,
            lattice: Lattice::diamond(),
            ops: SpinOps::new(&axes),
            ms,
            static_bz,
            scale_factor,
            integration_factor,
            k_dd,
            e: Spin::nv_electron(ms),
            n: Spin::nitrogen(),
            nuclei: Vec::new(),
            clusters: Vec::new(),
        })
    }

    /// Add C-13 nuclei at the given positions, each in a cluster of its own.
    pub fn with_c13<I>(mut self, positions: I) -> Self
    where I: IntoIterator<Item = Vector3>
    {
        for pos in positions.into_iter() {
            self.clusters.push(vec![self.nuclei.len()]);
            self.nuclei.push(Spin::c13(pos));
        }
        self
    }

    /// Static magnetic field vector.
    pub fn static_field(&self) -> Vector3 { self.static_bz * self.axes.z }

    /// Look up nucleus `index`.
    pub fn nucleus(&self, index: usize) -> NvResult<&Spin> {
        self.nuclei.get(index)
            .ok_or_else(|| NvError::InvalidParam(
                format!("no nucleus with index {}", index)))
    }

    /// Partition of the nuclei into non-interacting clusters.
    pub fn clusters(&self) -> &[Vec<usize>] { &self.clusters }

    /// Number of qubits in the NV-plus-cluster space of cluster `c`.
    pub fn cluster_qubits(&self, c: usize) -> NvResult<usize> {
        self.clusters.get(c)
            .map(|cluster| cluster.len() + 1)
            .ok_or_else(|| NvError::InvalidParam(
                format!("no cluster with index {}", c)))
    }
}

/// Dipolar coupling strength between two spins, assuming a strong field
/// along the NV axis.
pub fn coupling_strength(s1: &Spin, s2: &Spin) -> f64 {
    let r = s2.pos - s1.pos;
    let cos = r.hat().dot(&Axes::nv().z);
    (s1.g * s2.g / (8.0 * PI * (r.norm() * A0).powi(3))
        * (1.0 - 3.0 * cos * cos)).abs()
}

/// Hyperfine field experienced by a nucleus.
pub fn hyperfine(nv: &NvSystem, s: &Spin) -> Vector3 {
    let r = s.pos - nv.e.pos;
    let rhat = r.hat();
    let z = nv.axes.z;
    nv.e.g * s.g / (4.0 * PI * (r.norm() * A0).powi(3))
        * (z - 3.0 * rhat.dot(&z) * rhat)
}

/// Effective Larmor precession vector of a nucleus, accounting for the
/// static field and the hyperfine field of the NV center's mean spin.
pub fn effective_larmor(nv: &NvSystem, s: &Spin) -> Vector3 {
    s.g * nv.static_field() - f64::from(nv.ms) / 2.0 * hyperfine(nv, s)
}

/// Component of the hyperfine field perpendicular to the effective Larmor
/// axis.
pub fn hyperfine_perp(nv: &NvSystem, s: &Spin) -> Vector3 {
    hyperfine(nv, s).perp(&effective_larmor(nv, s))
}

/// Minimum difference in effective Larmor frequency between nucleus `index`
/// and every other nucleus; `f64::MAX` if there are no others.
pub fn larmor_resolution(nv: &NvSystem, index: usize) -> NvResult<f64> {
    let target = effective_larmor(nv, nv.nucleus(index)?).norm();
    let dw_min: f64
        = nv.nuclei.iter().enumerate()
        .filter(|(s, _)| *s != index)
        .map(|(_, spin)| (target - effective_larmor(nv, spin).norm()).abs())
        .fold(f64::MAX, f64::min);
    Ok(dw_min)
}

/// Determine whether two nuclei are related by the NV center's symmetry and
/// hence share the same effective Larmor frequency.
pub fn is_larmor_pair(nv: &NvSystem, idx1: usize, idx2: usize)
    -> NvResult<bool>
{
    let z = nv.axes.z;
    let ao = nv.lattice.ao;
    let signature = |s: &Spin| -> (i64, i64) {
        let r = s.pos - nv.e.pos;
        let par = (16.0 * r.dot(&ao).abs()).round() as i64;
        let perp = (12.0 * (r - r.dot(&z) * z).norm_sqr()).round() as i64;
        (par, perp)
    };
    Ok(signature(nv.nucleus(idx1)?) == signature(nv.nucleus(idx2)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GAUSS;

    fn system() -> NvSystem {
        let lat = Lattice::diamond();
        NvSystem::new(1, 140.0 * GAUSS, 10.0, 40.0, Harmonic::First)
            .unwrap()
            .with_c13([
                lat.site(0, 0, 1, 1),
                lat.a1,
                lat.a2,
                lat.site(1, 1, 0, 0),
            ])
    }

    #[test]
    fn electron_projection_onto_nv_axis() {
        for ms in [1, -1] {
            let e = Spin::nv_electron(ms);
            let ops = SpinOps::default();
            let sz = e.S.dot_vec(&Axes::nv().z);
            let expected = &ops.proj_up * f64::from(ms);
            assert!((&sz - &expected).iter().all(|x| x.norm() < 1e-14));
        }
    }

    #[test]
    fn nuclear_spin_vector_is_spin_half() {
        let ops = SpinOps::default();
        let axes = Axes::nv();
        for v in axes.basis() {
            let s = ops.s_vec.dot_vec(&v);
            let s2 = s.dot(&s);
            assert!((&s2 - &(&ops.I * 0.25)).iter().all(|x| x.norm() < 1e-14));
        }
        assert!((&ops.s_vec.dot_vec(&axes.z) - &(&ops.sz * 0.5)).iter()
            .all(|x| x.norm() < 1e-14));
    }

    #[test]
    fn coupling_is_symmetric_and_angular() {
        let z = Axes::nv().z;
        let a = Spin::c13(Vector3::zeros());
        let b = Spin::c13(z * 2.0);
        let expected = 2.0 * G_C13 * G_C13 / (8.0 * PI * (2.0 * A0).powi(3));
        assert!((coupling_strength(&a, &b) / expected - 1.0).abs() < 1e-12);
        assert_eq!(coupling_strength(&a, &b), coupling_strength(&b, &a));
        // magic angle
        let magic = (1.0_f64 / 3.0).sqrt().acos();
        let c = Spin::c13(
            2.0 * (magic.cos() * z + magic.sin() * Axes::nv().x));
        assert!(coupling_strength(&a, &c) / expected < 1e-12);
    }

    #[test]
    fn symmetric_sites_form_larmor_pairs() {
        let nv = system();
        assert!(is_larmor_pair(&nv, 1, 2).unwrap());
        assert!(!is_larmor_pair(&nv, 1, 3).unwrap());
        let w1 = effective_larmor(&nv, &nv.nuclei[1]).norm();
        let w2 = effective_larmor(&nv, &nv.nuclei[2]).norm();
        assert!((w1 - w2).abs() / w1 < 1e-12);
        assert!(larmor_resolution(&nv, 1).unwrap() < 1e-9 * w1);
        assert!(is_larmor_pair(&nv, 0, 9).is_err());
    }

    #[test]
    fn larmor_vector_and_perpendicular_hyperfine() {
        let nv = system();
        let s = &nv.nuclei[3];
        let w = effective_larmor(&nv, s);
        let expected = s.g * nv.static_field() - 0.5 * hyperfine(&nv, s);
        assert!((w - expected).norm() < 1e-12 * w.norm());
        let perp = hyperfine_perp(&nv, s);
        assert!(perp.dot(&w).abs() < 1e-9 * perp.norm() * w.norm());
        let lone = NvSystem::new(1, 0.0, 1.0, 1.0, Harmonic::First).unwrap()
            .with_c13([Vector3::new(0.5, 0.5, 0.0)]);
        assert_eq!(larmor_resolution(&lone, 0).unwrap(), f64::MAX);
    }

    #[test]
    fn invalid_system_parameters() {
        assert!(NvSystem::new(0, 0.0, 1.0, 1.0, Harmonic::First).is_err());
        assert!(NvSystem::new(1, 0.0, 0.0, 1.0, Harmonic::First).is_err());
        assert!(NvSystem::new(-1, 0.0, 1.0, -2.0, Harmonic::Third).is_err());
    }
}
