//! NV coherence signals under AXY decoupling, and gate fidelities.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::prelude::*;
use tracing::debug;
use crate::{
    axy::{ Harmonic, axy_pulse_times },
    error::{ NvError, NvResult },
    hamiltonian::ClusterHamiltonian,
    linalg::{ HermitianExp, dagger, gate_fidelity, matrix_power, normalize, trace_product },
    qubits::{ act, complement, num_qubits, ptrace, submatrix, tp_all },
    spin::NvSystem,
};

fn check_scan(w_scan: f64, scan_time: f64) -> NvResult<()> {
    if !(w_scan.is_finite() && w_scan > 0.0) {
        return Err(NvError::InvalidParam(
            format!("scan frequency must be positive; got {}", w_scan)));
    }
    if !(scan_time.is_finite() && scan_time >= 0.0) {
        return Err(NvError::InvalidParam(
            format!("scan time must be non-negative; got {}", scan_time)));
    }
    Ok(())
}

/// Simulate the NV coherence signal after decoupling at the sequence
/// frequency `w_scan / k` for `scan_time`.
///
/// Each cluster contributes the overlap of the nuclear propagators
/// conditioned on the two NV states, `Re Tr(U_0^† U_m) / 2^n`; clusters are
/// independent and their contributions multiply.
pub fn coherence_measurement(
    nv: &NvSystem,
    w_scan: f64,
    k: Harmonic,
    f: f64,
    scan_time: f64,
) -> NvResult<f64>
{
    check_scan(w_scan, scan_time)?;
    let w_dd = w_scan / k.kf();
    let t_dd = 2.0 * PI / w_dd;
    let times = axy_pulse_times(k, f)?;
    let periods = (scan_time / t_dd).floor() as usize;

    let coherence
        = (0..nv.clusters().len()).into_par_iter()
        .map(|c| -> NvResult<f64> {
            let hb = ClusterHamiltonian::new(nv, c)?;
            let n = hb.spins();
            let H = hb.h_int()? + hb.h_z(&nv.static_field())?;
            let proj_m = act(&nv.ops.proj_up, &[0], n)?;
            let proj_0 = act(&nv.ops.proj_dn, &[0], n)?;
            let H_m = HermitianExp::new(&ptrace(&H.dot(&proj_m), &[0])?)?;
            let H_0 = HermitianExp::new(&ptrace(&H.dot(&proj_0), &[0])?)?;

            // first quarter-period segments, with the NV starting in |ms⟩ or |0⟩
            let segments = |first: &HermitianExp, second: &HermitianExp| {
                [
                    first.at(t_dd * (times[1] - times[0])),
                    second.at(t_dd * (times[2] - times[1])),
                    first.at(t_dd * (times[3] - times[2])),
                ]
            };
            let [U1m, U2m, U3m] = segments(&H_m, &H_0);
            let [U10, U20, U30] = segments(&H_0, &H_m);
            let forward_m = U1m.dot(&U2m).dot(&U3m);
            let forward_0 = U10.dot(&U20).dot(&U30);
            let backward_m = U3m.dot(&U2m).dot(&U1m);
            let backward_0 = U30.dot(&U20).dot(&U10);

            let U_m
                = forward_m.dot(&backward_0).dot(&forward_0).dot(&backward_m);
            let U_0
                = forward_0.dot(&backward_m).dot(&forward_m).dot(&backward_0);
            let mut U_m = matrix_power(&U_m, periods);
            let mut U_0 = matrix_power(&U_0, periods);
            normalize(&mut U_m);
            normalize(&mut U_0);
            Ok(trace_product(&dagger(&U_0), &U_m).re / U_m.nrows() as f64)
        })
        .collect::<NvResult<Vec<f64>>>()?
        .into_iter()
        .product();
    debug!("coherence at w_scan = {:.6e}: {:.6}", w_scan, coherence);
    Ok(coherence)
}

/// Like [`coherence_measurement`], but evolve the NV electron and each
/// cluster together under the full Hamiltonian, starting from the NV in
/// `|+⟩` with the cluster maximally mixed, and report the NV's overlap with
/// its initial state rescaled to `[-1, 1]`.
pub fn exact_coherence_measurement(
    nv: &NvSystem,
    w_scan: f64,
    k: Harmonic,
    f: f64,
    scan_time: f64,
) -> NvResult<f64>
{
    check_scan(w_scan, scan_time)?;
    let w_dd = w_scan / k.kf();
    let t_dd = 2.0 * PI / w_dd;
    let times = axy_pulse_times(k, f)?;
    let periods = (scan_time / t_dd).floor() as usize;
    let (t1, t2, t3) = (times[1] * t_dd, times[2] * t_dd, t_dd / 4.0);
    let plus: nd::Array2<C64> = nd::Array2::from_elem((2, 2), C64::from(0.5));

    let coherence
        = (0..nv.clusters().len()).into_par_iter()
        .map(|c| -> NvResult<f64> {
            let hb = ClusterHamiltonian::new(nv, c)?;
            let n = hb.spins();
            let H = hb.h_int()? + hb.h_z(&nv.static_field())?;
            let evol = HermitianExp::new(&H)?;
            let X = hb.nv_pulse()?;
            let U1 = evol.at(t1);
            let U2 = evol.at(t2 - t1);
            let U3 = evol.at(t3 - t2);

            // half a period
            let U
                = [&X, &U2, &X, &U3, &X, &U3, &X, &U2, &X, &U1]
                .into_iter()
                .fold(U1.clone(), |acc, op| acc.dot(op));
            let U = matrix_power(&U, 2 * periods);

            let rho_0
                = tp_all(
                    std::iter::once(&plus)
                    .chain(std::iter::repeat(&nv.ops.I).take(n - 1))
                );
            let rho = U.dot(&rho_0).dot(&dagger(&U));
            Ok(2.0 * trace_product(&rho, &rho_0).re / (1 << (n - 1)) as f64 - 1.0)
        })
        .collect::<NvResult<Vec<f64>>>()?
        .into_iter()
        .product();
    debug!("exact coherence at w_scan = {:.6e}: {:.6}", w_scan, coherence);
    Ok(coherence)
}

/// Average fidelity of `U` with respect to `G` on the qubits
/// `system_qubits` alone, disregarding whatever `U` does to the remaining
/// (environment) qubits as long as it factors out.
pub fn gate_fidelity_on(
    U: &nd::Array2<C64>,
    G: &nd::Array2<C64>,
    system_qubits: &[usize],
) -> NvResult<f64>
{
    if U.dim() != G.dim() {
        return Err(NvError::InvalidParam(
            format!("operator shapes differ: {:?} vs {:?}", U.dim(), G.dim())));
    }
    let n = num_qubits(G.nrows())?;
    let env = complement(system_qubits, n);
    if env.is_empty() { return Ok(gate_fidelity(U, G)); }
    let U_err = dagger(G).dot(U);
    let U_env = act(&submatrix(&U_err, &env)?, &env, n)?;
    Ok(gate_fidelity(&dagger(&U_env).dot(U), G))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{ GAUSS, G_C13, Lattice },
        qubits::tp,
    };
    use rand::{ Rng, SeedableRng, rngs::StdRng };

    fn system() -> NvSystem {
        let lat = Lattice::diamond();
        NvSystem::new(1, 140.0 * GAUSS, 10.0, 10.0, Harmonic::First)
            .unwrap()
            .with_c13([lat.site(1, 1, 0, 0), lat.site(0, 2, -1, 0), lat.site(1, 3, 1, -2)])
    }

    fn random_unitary(rng: &mut StdRng, dim: usize) -> nd::Array2<C64> {
        let A: nd::Array2<C64>
            = nd::Array2::from_shape_fn(
                (dim, dim), |_| C64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)));
        let H = &A + &dagger(&A);
        crate::linalg::expm_hermitian(&H, 1.0).unwrap()
    }

    #[test]
    fn no_decay_without_time() {
        let nv = system();
        let w = G_C13 * nv.static_bz;
        let c = coherence_measurement(&nv, 0.7 * w, Harmonic::First, 0.0, 0.0)
            .unwrap();
        assert!((c - 1.0).abs() < 1e-10);
        let c = exact_coherence_measurement(&nv, 0.7 * w, Harmonic::First, 0.0, 0.0)
            .unwrap();
        assert!((c - 1.0).abs() < 1e-10);
    }

    #[test]
    fn coherence_is_bounded() {
        let nv = system();
        let w_L = G_C13 * nv.static_bz;
        let t_dd = 2.0 * PI / w_L;
        for w in [0.5 * w_L, w_L, 1.3 * w_L] {
            let c = coherence_measurement(&nv, w, Harmonic::First, 0.0, 20.0 * t_dd)
                .unwrap();
            assert!(c.abs() <= 1.0 + 1e-9);
        }
        assert!(coherence_measurement(&nv, -1.0, Harmonic::First, 0.0, 1.0).is_err());
    }

    #[test]
    fn fidelity_ignores_environment() {
        let mut rng = StdRng::seed_from_u64(10546);
        let G = random_unitary(&mut rng, 2);
        let V = random_unitary(&mut rng, 4);
        // the target acts as G on qubit 0; the environment picks up V
        let U = tp(&G, &V);
        let G_full = act(&G, &[0], 3).unwrap();
        assert!(gate_fidelity(&U, &G_full) < 0.99);
        let fid = gate_fidelity_on(&U, &G_full, &[0]).unwrap();
        assert!((fid - 1.0).abs() < 1e-10);
        let fid = gate_fidelity_on(&G_full, &G_full, &[0, 1, 2]).unwrap();
        assert!((fid - 1.0).abs() < 1e-12);
    }
}
