//! Hamiltonians of the NV electron together with one cluster of nuclei.
//!
//! The NV electron is always qubit 0; the `s`-th member of the cluster is
//! qubit `s + 1`.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    constants::{ A0, GE, NV_ZFS },
    control::ControlFields,
    error::{ NvError, NvResult },
    qubits::{ act, tp },
    spin::{ NvSystem, Spin, hyperfine },
    vector::Vector3,
};

/// Full dipolar coupling between two spins.
pub fn h_ss(s1: &Spin, s2: &Spin) -> nd::Array2<C64> {
    let r = s2.pos - s1.pos;
    let rhat = r.hat();
    let prefactor = s1.g * s2.g / (4.0 * PI * (r.norm() * A0).powi(3));
    (s1.S.dot(&s2.S) - tp(&s1.S.dot_vec(&rhat), &s2.S.dot_vec(&rhat)) * 3.0)
        * prefactor
}

/// Secular part of the dipolar coupling between two spins under a strong
/// field along `z`.
pub fn h_ss_large_static_bz(s1: &Spin, s2: &Spin, z: &Vector3)
    -> nd::Array2<C64>
{
    let r = s2.pos - s1.pos;
    let cos = r.hat().dot(z);
    let prefactor
        = s1.g * s2.g / (4.0 * PI * (r.norm() * A0).powi(3))
        * (1.0 - 3.0 * cos * cos) / 2.0;
    (tp(&s1.S.dot_vec(z), &s2.S.dot_vec(z)) * 3.0 - s1.S.dot(&s2.S))
        * prefactor
}

/// Hamiltonian builder for the NV electron and a single cluster.
#[derive(Clone, Debug)]
pub struct ClusterHamiltonian<'a> {
    nv: &'a NvSystem,
    cluster: &'a [usize],
}

impl<'a> ClusterHamiltonian<'a> {
    /// Create a new builder for cluster `c` of `nv`.
    pub fn new(nv: &'a NvSystem, c: usize) -> NvResult<Self> {
        let cluster
            = nv.clusters.get(c)
            .ok_or_else(|| NvError::InvalidParam(
                format!("no cluster with index {}", c)))?;
        Self::from_members(nv, cluster)
    }

    /// Create a new builder for an arbitrary list of nuclei of `nv`.
    pub fn from_members(nv: &'a NvSystem, cluster: &'a [usize])
        -> NvResult<Self>
    {
        for &s in cluster.iter() { nv.nucleus(s)?; }
        Ok(Self { nv, cluster })
    }

    /// Get a reference to the underlying system.
    pub fn system(&self) -> &NvSystem { self.nv }

    /// Nucleus indices of the cluster, in qubit order.
    pub fn members(&self) -> &[usize] { self.cluster }

    /// Number of qubits, including the NV electron.
    pub fn spins(&self) -> usize { self.cluster.len() + 1 }

    /// Dimension of the NV-plus-cluster space.
    pub fn dim(&self) -> usize { 1 << self.spins() }

    fn nucleus(&self, s: usize) -> &Spin { &self.nv.nuclei[self.cluster[s]] }

    fn zeros(&self) -> nd::Array2<C64> {
        nd::Array2::zeros((self.dim(), self.dim()))
    }

    /// Full dipolar coupling among the NV electron and all nuclei.
    pub fn h_int(&self) -> NvResult<nd::Array2<C64>> {
        let n = self.spins();
        let mut H = self.zeros();
        for s in 0..self.cluster.len() {
            H += &act(&h_ss(&self.nv.e, self.nucleus(s)), &[0, s + 1], n)?;
            for r in 0..s {
                H += &act(
                    &h_ss(self.nucleus(r), self.nucleus(s)),
                    &[r + 1, s + 1],
                    n,
                )?;
            }
        }
        Ok(H)
    }

    /// Secular coupling under a strong static field along the NV axis: the
    /// NV electron couples to each nucleus only through its own `z`
    /// projection, and nuclei couple to each other through the secular part
    /// of the dipolar interaction.
    pub fn h_int_large_static_bz(&self) -> NvResult<nd::Array2<C64>> {
        let n = self.spins();
        let z = self.nv.axes.z;
        let e_z = self.nv.e.S.dot_vec(&z);
        let mut H = self.zeros();
        for s in 0..self.cluster.len() {
            let spin = self.nucleus(s);
            let A = hyperfine(self.nv, spin);
            H += &act(&tp(&e_z, &spin.S.dot_vec(&A)), &[0, s + 1], n)?;
            for r in 0..s {
                H += &act(
                    &h_ss_large_static_bz(self.nucleus(r), spin, &z),
                    &[r + 1, s + 1],
                    n,
                )?;
            }
        }
        Ok(H)
    }

    /// Nuclear Zeeman Hamiltonian in the field `B`.
    pub fn h_nz(&self, B: &Vector3) -> NvResult<nd::Array2<C64>> {
        let n = self.spins();
        let mut H = self.zeros();
        for s in 0..self.cluster.len() {
            let spin = self.nucleus(s);
            H -= &act(&(spin.S.dot_vec(B) * spin.g), &[s + 1], n)?;
        }
        Ok(H)
    }

    /// NV zero-field splitting and electron Zeeman Hamiltonian on the NV
    /// qubit alone.
    pub fn h_nv_gs(&self, B: &Vector3) -> nd::Array2<C64> {
        let e_z = self.nv.e.S.dot_vec(&self.nv.axes.z);
        e_z.dot(&e_z) * NV_ZFS - self.nv.e.S.dot_vec(B) * self.nv.e.g
    }

    /// Full Zeeman Hamiltonian, including the NV zero-field splitting.
    pub fn h_z(&self, B: &Vector3) -> NvResult<nd::Array2<C64>> {
        Ok(self.h_nz(B)? + act(&self.h_nv_gs(B), &[0], self.spins())?)
    }

    /// Secular Zeeman shift of the NV qubit due to the component of a control
    /// field along the NV axis.
    pub fn h_nv_control(&self, B: &Vector3) -> nd::Array2<C64> {
        let z = self.nv.axes.z;
        self.nv.e.S.dot_vec(&z) * (-GE * B.dot(&z))
    }

    /// NV π-pulse about the qubit `x` axis.
    pub fn nv_pulse(&self) -> NvResult<nd::Array2<C64>> {
        act(&self.nv.ops.sx, &[0], self.spins())
    }

    /// Time-independent Hamiltonian used for closed-form evolution: the
    /// secular coupling plus the nuclear Zeeman term in the static field.
    pub fn gen_static(&self) -> NvResult<nd::Array2<C64>> {
        self.gen_static_in(&self.nv.static_field())
    }

    /// Like [`Self::gen_static`], but in an arbitrary total field.
    pub fn gen_static_in(&self, B: &Vector3) -> NvResult<nd::Array2<C64>> {
        Ok(self.h_int_large_static_bz()? + self.h_nz(B)?)
    }

    /// Time-dependent Hamiltonian at time `t` under `controls`, given the
    /// precomputed coupling term `H_int`.
    ///
    /// The control field acts on the nuclei through their Zeeman term and on
    /// the NV qubit through [`Self::h_nv_control`].
    pub fn gen_at(
        &self,
        H_int: &nd::Array2<C64>,
        controls: &ControlFields,
        t: f64,
    ) -> NvResult<nd::Array2<C64>>
    {
        let B_ctl = controls.at(t);
        let B = self.nv.static_field() + B_ctl;
        Ok(
            H_int
            + &self.h_nz(&B)?
            + &act(&self.h_nv_control(&B_ctl), &[0], self.spins())?
        )
    }
}
