//! Pulse timing for AXY dynamical decoupling sequences.
//!
//! An AXY period contains ten instantaneous NV π-pulses, arranged as two
//! composite five-pulse blocks, that switch a modulation function `F(t)`
//! between `+1` and `-1`. The pulse times are chosen so that the `k`-th
//! Fourier cosine component of `F` takes a prescribed weight `f` while the
//! other of the first and third components vanishes.
//!
//! Times are normalized to one sequence period, so that every schedule starts
//! at 0 and ends at 1.

use std::f64::consts::PI;
use crate::error::{ NvError, NvResult };

/// Number of π-pulses in one AXY period.
pub const PULSES_PER_PERIOD: usize = 10;

/// Harmonic of the AXY sequence frequency used to address nuclear spins.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Harmonic {
    First,
    Third,
}

impl Harmonic {
    /// Return the harmonic number `k`.
    pub fn k(self) -> u32 {
        match self {
            Self::First => 1,
            Self::Third => 3,
        }
    }

    /// Return the harmonic number as a float.
    pub fn kf(self) -> f64 { f64::from(self.k()) }
}

impl TryFrom<u32> for Harmonic {
    type Error = NvError;

    fn try_from(k: u32) -> NvResult<Self> {
        match k {
            1 => Ok(Self::First),
            3 => Ok(Self::Third),
            _ => Err(NvError::BadHarmonic(k)),
        }
    }
}

impl std::fmt::Display for Harmonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Third => write!(f, "third"),
        }
    }
}

/// Upper bound on `|f|` for which pulse times exist.
pub fn axy_f_max(k: Harmonic) -> f64 {
    match k {
        Harmonic::First => (8.0 * (PI / 9.0).cos() - 4.0) / PI,
        Harmonic::Third => 4.0 / PI,
    }
}

/// Compute the normalized pulse times of one AXY period addressing harmonic
/// `k` with Fourier weight `f`.
///
/// The returned array holds the period start (0), the ten pulse times, and
/// the period end (1). Times are strictly increasing and symmetric about 1/2.
/// Fails if `|f|` is not below [`axy_f_max`].
pub fn axy_pulse_times(k: Harmonic, f: f64)
    -> NvResult<[f64; PULSES_PER_PERIOD + 2]>
{
    let max = axy_f_max(k);
    if !(f.abs() < max) {
        return Err(NvError::FourierWeight { harmonic: k, f, max });
    }
    let fp = f * PI;
    let (x1, x2): (f64, f64)
        = match k {
            Harmonic::First => {
                let w1 = 4.0 - fp;
                let w2 = w1 * (960.0 - 144.0 * fp - 12.0 * fp.powi(2)
                    + fp.powi(3));
                let r = (3.0 * w2).sqrt();
                let x1
                    = ((3.0 * fp - 12.0) * w1 + r)
                    .atan2(
                        6.0_f64.sqrt()
                        * (w2 - 96.0 * fp * w1 + w1 * w1 * r).sqrt()
                    ) / (2.0 * PI);
                let x2
                    = (-(3.0 * fp - 12.0) * w1 + r)
                    .atan2(
                        6.0_f64.sqrt()
                        * (w2 - 96.0 * fp * w1 - w1 * w1 * r).sqrt()
                    ) / (2.0 * PI);
                (x1, x2)
            },
            Harmonic::Third => {
                let q1 = 4.0 / ((5.0 + fp).sqrt() - 1.0);
                let q2 = 4.0 / ((5.0 + fp).sqrt() + 1.0);
                let x1 = 0.25 - (q1 * q1 - 1.0).sqrt().atan() / (2.0 * PI);
                let x2 = 0.25 - (q2 * q2 - 1.0).sqrt().atan() / (2.0 * PI);
                (x1, x2)
            },
        };
    Ok([
        0.0,
        x1, x2, 0.25, 0.5 - x2, 0.5 - x1,
        0.5 + x1, 0.5 + x2, 0.75, 1.0 - x2, 1.0 - x1,
        1.0,
    ])
}

/// Return the fractional part of `advance`, always in `[0, 1)`.
pub fn normed_advance(advance: f64) -> f64 { advance - advance.floor() }

/// Re-phase a normalized schedule so that it starts a fraction `advance`
/// (taken modulo 1) of the way into the sequence.
///
/// The result has the same layout as the input: a leading 0, the pulse times
/// of the next full period measured from the advanced start, and a trailing
/// 1. An advance of zero returns the input unchanged.
pub fn advanced_pulse_times(times: &[f64], advance: f64) -> Vec<f64> {
    let a = normed_advance(advance);
    if a == 0.0 || times.len() < 2 { return times.to_vec(); }
    let n = times.len() - 2;
    let mut advanced: Vec<f64> = Vec::with_capacity(n + 2);
    advanced.push(0.0);
    for p in 0..2 * n {
        let t = (p / n) as f64 + times[p % n + 1] - a;
        if t >= 0.0 { advanced.push(t); }
        if advanced.len() == n + 1 { break; }
    }
    advanced.push(1.0);
    advanced
}

/// Count the pulses of a normalized schedule that occur strictly before the
/// fractional part of `advance`.
///
/// An odd count means the NV spin starts the advanced sequence flipped.
pub fn pulse_parity(times: &[f64], advance: f64) -> usize {
    let a = normed_advance(advance);
    let n = times.len().saturating_sub(2);
    times.iter().skip(1).take(n)
        .take_while(|t| **t < a)
        .count()
}
