//! Propagators of the NV electron and one cluster of nuclei under an AXY
//! dynamical decoupling sequence.
//!
//! Times are absolute, in the natural time unit; pulse schedules are in units
//! of the sequence period `t_dd = 2π / w_dd`. An `advance` shifts the point in
//! the sequence at which evolution starts, so that consecutive calls can be
//! stitched together.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    axy::{ Harmonic, advanced_pulse_times, axy_pulse_times, normed_advance, pulse_parity },
    control::ControlFields,
    error::{ NvError, NvResult },
    hamiltonian::ClusterHamiltonian,
    linalg::{ HermitianExp, dagger, expm_hermitian, matrix_power, normalize },
    qubits::act,
    spin::NvSystem,
    vector::Vector3,
};

/// Number of progress events emitted over one integration.
const PROGRESS_EVENTS: usize = 10;

fn check_sequence(w_dd: f64, time: f64, advance: f64) -> NvResult<()> {
    if !(w_dd.is_finite() && w_dd > 0.0) {
        return Err(NvError::InvalidParam(
            format!("decoupling frequency must be positive; got {}", w_dd)));
    }
    if !(time.is_finite() && time >= 0.0) {
        return Err(NvError::InvalidParam(
            format!("evolution time must be non-negative; got {}", time)));
    }
    if !advance.is_finite() {
        return Err(NvError::InvalidParam(
            format!("sequence advance must be finite; got {}", advance)));
    }
    Ok(())
}

/// Pulse schedule over one period, shifted so that it begins at the point
/// `advance` (in absolute time) into the sequence.
fn schedule(k: Harmonic, f: f64, t_dd: f64, advance: f64)
    -> NvResult<(usize, Vec<f64>)>
{
    let pulses = axy_pulse_times(k, f)?;
    let a = normed_advance(advance / t_dd);
    Ok((pulse_parity(&pulses, a), advanced_pulse_times(&pulses, a)))
}

/// Simulate the NV-plus-cluster propagator in the static field over `time`.
///
/// Whole sequence periods are computed once and raised to a power; the
/// remaining fraction of a period is applied pulse by pulse.
pub fn simulate_propagator(
    nv: &NvSystem,
    cluster: usize,
    w_dd: f64,
    k: Harmonic,
    f: f64,
    time: f64,
    advance: f64,
) -> NvResult<nd::Array2<C64>>
{
    check_sequence(w_dd, time, advance)?;
    let hb = ClusterHamiltonian::new(nv, cluster)?;
    static_propagator(&hb, &hb.gen_static()?, w_dd, k, f, time, advance)
}

fn static_propagator(
    hb: &ClusterHamiltonian,
    H: &nd::Array2<C64>,
    w_dd: f64,
    k: Harmonic,
    f: f64,
    time: f64,
    advance: f64,
) -> NvResult<nd::Array2<C64>>
{
    let t_dd = 2.0 * PI / w_dd;
    let (parity, adv) = schedule(k, f, t_dd, advance)?;
    let X = hb.nv_pulse()?;
    let evol = HermitianExp::new(H)?;

    let mut U: nd::Array2<C64>
        = if parity % 2 == 1 { X.clone() } else { nd::Array2::eye(hb.dim()) };
    let mut flips = parity;

    let periods = (time / t_dd).floor();
    if periods >= 1.0 {
        let U_axy
            = adv.windows(2)
            .fold(nd::Array2::eye(hb.dim()), |acc: nd::Array2<C64>, w| {
                X.dot(&evol.at((w[1] - w[0]) * t_dd).dot(&acc))
            });
        let U_axy = X.dot(&U_axy);
        U = matrix_power(&U_axy, periods as usize).dot(&U);
    }

    let remainder = time - periods * t_dd;
    for w in adv.windows(2) {
        if w[1] * t_dd < remainder {
            U = X.dot(&evol.at((w[1] - w[0]) * t_dd).dot(&U));
            flips += 1;
        } else {
            U = evol.at(remainder - w[0] * t_dd).dot(&U);
            break;
        }
    }
    if flips % 2 == 1 { U = X.dot(&U); }

    normalize(&mut U);
    Ok(U)
}

/// Angular frequency that sets the integration step size: the fastest of the
/// decoupling frequency, the control frequencies, and the largest nuclear
/// Larmor frequency attainable in the cluster.
pub fn frequency_scale(
    nv: &NvSystem,
    cluster: usize,
    w_dd: f64,
    controls: &ControlFields,
) -> NvResult<f64>
{
    let members = nv.clusters.get(cluster)
        .ok_or_else(|| NvError::InvalidParam(
            format!("no cluster with index {}", cluster)))?;
    let B_cap: Vector3
        = nv.axes.z * nv.static_bz.abs() + controls.amplitude_bound(&nv.axes);
    let g_max
        = members.iter()
        .map(|&s| nv.nucleus(s).map(|spin| spin.g.abs()))
        .try_fold(0.0_f64, |acc, g| g.map(|g| acc.max(g)))?;
    Ok(w_dd.max(controls.max_frequency()).max(g_max * B_cap.norm()))
}

/// Simulate the NV-plus-cluster propagator over `time` with additional
/// control fields.
///
/// Static controls are folded into the static field and handled in closed
/// form; otherwise see [`integrate_propagator`].
#[allow(clippy::too_many_arguments)]
pub fn simulate_propagator_controlled(
    nv: &NvSystem,
    cluster: usize,
    w_dd: f64,
    k: Harmonic,
    f: f64,
    controls: &ControlFields,
    time: f64,
    advance: f64,
) -> NvResult<nd::Array2<C64>>
{
    if controls.is_static() {
        check_sequence(w_dd, time, advance)?;
        let hb = ClusterHamiltonian::new(nv, cluster)?;
        let B = nv.static_field() + controls.at(0.0);
        static_propagator(&hb, &hb.gen_static_in(&B)?, w_dd, k, f, time, advance)
    } else {
        integrate_propagator(nv, cluster, w_dd, k, f, controls, time, advance)
    }
}

/// Integrate the NV-plus-cluster propagator under time-dependent controls.
///
/// The Hamiltonian is sampled at the midpoint of fixed steps of size
/// `1 / (frequency_scale * integration_factor)`, with steps split at every
/// pulse. Control fields are evaluated at absolute time `advance + t`.
///
/// A control component along the NV axis shifts the energy of the `|ms⟩`
/// state. That phase is tracked by a separate NV-only propagator driven
/// through the same pulses and removed from the result at the end.
#[allow(clippy::too_many_arguments)]
pub fn integrate_propagator(
    nv: &NvSystem,
    cluster: usize,
    w_dd: f64,
    k: Harmonic,
    f: f64,
    controls: &ControlFields,
    time: f64,
    advance: f64,
) -> NvResult<nd::Array2<C64>>
{
    check_sequence(w_dd, time, advance)?;
    let hb = ClusterHamiltonian::new(nv, cluster)?;
    let t_dd = 2.0 * PI / w_dd;
    let (parity, adv) = schedule(k, f, t_dd, advance)?;

    // pulse instants over the whole run, excluding the period boundary
    let periods = (time / t_dd).ceil() as usize;
    let instants: Vec<f64>
        = (0..=periods)
        .flat_map(|n| {
            adv[1..adv.len() - 1].iter()
                .map(move |a| (n as f64 + a) * t_dd)
        })
        .filter(|&s| s < time)
        .collect();

    let scale = frequency_scale(nv, cluster, w_dd, controls)?;
    let dt_max = 1.0 / (scale * nv.integration_factor);
    let steps = ((time / dt_max).round() as usize).max(1);
    let dt = time / steps as f64;
    debug!(
        "integrating cluster {} over {} steps with {} pulses",
        cluster, steps, instants.len(),
    );

    let H_int = hb.h_int_large_static_bz()?;
    let X = hb.nv_pulse()?;
    let sx = &nv.ops.sx;
    let mut U: nd::Array2<C64> = nd::Array2::eye(hb.dim());
    let mut U_nv: nd::Array2<C64> = nd::Array2::eye(2);
    let mut flips = parity;
    if parity % 2 == 1 {
        U = X.clone();
        U_nv = sx.clone();
    }

    let report = (steps / PROGRESS_EVENTS).max(1);
    let mut next_pulse: usize = 0;
    for m in 0..steps {
        let mut t0 = m as f64 * dt;
        let t1 = if m + 1 == steps { time } else { (m + 1) as f64 * dt };
        while next_pulse < instants.len() && instants[next_pulse] < t1 {
            let tp = instants[next_pulse];
            evolve_segment(&hb, &H_int, controls, advance, t0, tp, &mut U, &mut U_nv)?;
            U = X.dot(&U);
            U_nv = sx.dot(&U_nv);
            flips += 1;
            t0 = tp;
            next_pulse += 1;
        }
        evolve_segment(&hb, &H_int, controls, advance, t0, t1, &mut U, &mut U_nv)?;
        if (m + 1) % report == 0 {
            debug!("cluster {}: step {}/{}", cluster, m + 1, steps);
        }
    }
    if flips % 2 == 1 {
        U = X.dot(&U);
        U_nv = sx.dot(&U_nv);
    }

    let mut U = act(&dagger(&U_nv), &[0], hb.spins())?.dot(&U);
    normalize(&mut U);
    Ok(U)
}

#[allow(clippy::too_many_arguments)]
fn evolve_segment(
    hb: &ClusterHamiltonian,
    H_int: &nd::Array2<C64>,
    controls: &ControlFields,
    advance: f64,
    t0: f64,
    t1: f64,
    U: &mut nd::Array2<C64>,
    U_nv: &mut nd::Array2<C64>,
) -> NvResult<()>
{
    let dt = t1 - t0;
    if dt <= 0.0 { return Ok(()); }
    let t = advance + (t0 + t1) / 2.0;
    let H = hb.gen_at(H_int, controls, t)?;
    *U = expm_hermitian(&H, dt)?.dot(U);
    let H_nv = hb.h_nv_control(&controls.at(t));
    *U_nv = expm_hermitian(&H_nv, dt)?.dot(U_nv);
    Ok(())
}
