//! Qubit-indexed operator manipulation on composite two-level systems.
//!
//! A system of `N` qubits is enumerated by `N`-bit integers, where qubit `q`
//! is stored in bit `N - 1 - q` (i.e. qubit 0 is the most significant bit).
//! All functions here share this convention.

use itertools::Itertools;
use ndarray::{ self as nd, linalg::kron };
use num_complex::Complex64 as C64;
use num_traits::{ Zero, One };
use rustc_hash::FxHashSet as HashSet;
use crate::error::{ NvError, NvResult };

/// Threshold below which a matrix element is treated as zero when picking a
/// global phase.
pub const PHASE_THRESHOLD: f64 = 1e-12;

/// Threshold on the renormalization factor of [`submatrix`] below which the
/// extraction is rejected as ill-conditioned.
pub const SUBMATRIX_TOLERANCE: f64 = 1e-10;

/// Return the state of qubit `q` (of `n`) in the enumerated basis state `s`.
#[inline]
pub fn qubit_state(q: usize, n: usize, s: usize) -> bool {
    (s >> (n - 1 - q)) & 1 == 1
}

/// Return the integer corresponding to an "on" state of qubit `q` (of `n`).
#[inline]
pub fn bit_weight(q: usize, n: usize) -> usize { 1 << (n - 1 - q) }

/// Return the number of qubits spanned by a space of dimension `dim`.
///
/// Fails if `dim` is not a power of two.
pub fn num_qubits(dim: usize) -> NvResult<usize> {
    if dim.is_power_of_two() {
        Ok(dim.trailing_zeros() as usize)
    } else {
        Err(NvError::NotPowerOfTwo(dim))
    }
}

/// Return all qubits of an `n`-qubit system not in `qubits`, in ascending
/// order.
pub fn complement(qubits: &[usize], n: usize) -> Vec<usize> {
    (0..n).filter(|q| !qubits.contains(q)).collect()
}

/// Map the basis state `s` of the `qubits.len()`-qubit subsystem onto the
/// corresponding global index of an `n`-qubit system, with all other qubits
/// off.
fn scatter(s: usize, qubits: &[usize], n: usize) -> usize {
    let k = qubits.len();
    qubits.iter().enumerate()
        .filter(|(j, _)| qubit_state(*j, k, s))
        .map(|(_, q)| bit_weight(*q, n))
        .sum()
}

/// Global offsets of every basis configuration of `qubits`.
fn offsets(qubits: &[usize], n: usize) -> Vec<usize> {
    (0..1_usize << qubits.len())
        .map(|s| scatter(s, qubits, n))
        .collect()
}

fn check_square(a: &nd::Array2<C64>) -> NvResult<usize> {
    let (r, c) = a.dim();
    if r == c { Ok(r) } else { Err(NvError::NonSquare(r, c)) }
}

fn check_qubits(qubits: &[usize], n: usize) -> NvResult<()> {
    let mut seen: HashSet<usize> = HashSet::default();
    for &q in qubits.iter() {
        if q >= n { return Err(NvError::QubitOutOfRange(q, n)); }
        if !seen.insert(q) { return Err(NvError::DuplicateQubit(q)); }
    }
    Ok(())
}

/// Generate the operator that acts `a` on `qubits` out of a system of `n`
/// qubits, and as the identity on all others.
///
/// `a` must be square with dimension `2^qubits.len()`. Re-embedding a
/// full-size operator with the identity qubit map returns it unchanged.
pub fn act(a: &nd::Array2<C64>, qubits: &[usize], n: usize)
    -> NvResult<nd::Array2<C64>>
{
    let dim = check_square(a)?;
    check_qubits(qubits, n)?;
    let k = qubits.len();
    if dim != 1 << k {
        return Err(NvError::QubitMismatch { dim, qubits: k });
    }
    if k == n && qubits.iter().enumerate().all(|(i, q)| i == *q) {
        return Ok(a.clone());
    }

    let ignored = complement(qubits, n);
    let env = offsets(&ignored, n);
    let sub = offsets(qubits, n);
    let mut b: nd::Array2<C64> = nd::Array2::zeros((1 << n, 1 << n));
    for ((m, bm), (l, bl)) in
        sub.iter().enumerate().cartesian_product(sub.iter().enumerate())
    {
        let amn = a[[m, l]];
        if amn.is_zero() { continue; }
        env.iter().for_each(|e| { b[[bm + e, bl + e]] = amn; });
    }
    Ok(b)
}

/// Perform a partial trace over `traced`, returning the (unnormalized)
/// operator on the remaining qubits in ascending order.
pub fn ptrace(a: &nd::Array2<C64>, traced: &[usize])
    -> NvResult<nd::Array2<C64>>
{
    let dim = check_square(a)?;
    let n = num_qubits(dim)?;
    check_qubits(traced, n)?;
    let kept = complement(traced, n);
    let env = offsets(traced, n);
    let sub = offsets(&kept, n);
    let b: nd::Array2<C64>
        = nd::Array2::from_shape_fn(
            (sub.len(), sub.len()),
            |(m, l)| env.iter().map(|e| a[[sub[m] + e, sub[l] + e]]).sum(),
        );
    Ok(b)
}

/// Extract the operator that effectively acts on `qubits` when `a` is close
/// to a tensor product with some operator on the remaining qubits.
///
/// The block of `a` acting on `qubits` is taken for each basis configuration
/// of the ignored qubits, stripped of its global phase, and accumulated; the
/// sum is then renormalized so that `Tr(B^† B) / dim(B) = 1`. Configurations
/// whose block is numerically zero carry no phase information and are
/// skipped.
///
/// The result is an approximation. Fails with [`NvError::IllConditioned`]
/// when the accumulated block is too small to renormalize reliably, which
/// happens when `a` is far from a product operator.
pub fn submatrix(a: &nd::Array2<C64>, qubits: &[usize])
    -> NvResult<nd::Array2<C64>>
{
    let dim = check_square(a)?;
    let n = num_qubits(dim)?;
    check_qubits(qubits, n)?;
    let ignored = complement(qubits, n);
    let sub = offsets(qubits, n);
    let d = sub.len();

    let mut b: nd::Array2<C64> = nd::Array2::zeros((d, d));
    for start in offsets(&ignored, n).into_iter() {
        let block: nd::Array2<C64>
            = nd::Array2::from_shape_fn(
                (d, d), |(m, l)| a[[start + sub[m], start + sub[l]]]);
        if block.iter().all(|x| x.norm() <= PHASE_THRESHOLD) { continue; }
        b += &remove_phase(&block);
    }

    let norm = (frobenius_sqr(&b) / d as f64).sqrt();
    if norm < SUBMATRIX_TOLERANCE {
        return Err(NvError::IllConditioned(norm));
    }
    Ok(b / C64::from(norm))
}

/// Return `Tr(A^† A)`.
pub fn frobenius_sqr(a: &nd::Array2<C64>) -> f64 {
    a.iter().map(|x| x.norm_sqr()).sum()
}

/// Tensor (Kronecker) product of two operators.
pub fn tp(a: &nd::Array2<C64>, b: &nd::Array2<C64>) -> nd::Array2<C64> {
    kron(a, b)
}

/// Tensor product of many operators, in order.
///
/// An empty sequence gives the 1×1 identity.
pub fn tp_all<'a, I>(ops: I) -> nd::Array2<C64>
where I: IntoIterator<Item = &'a nd::Array2<C64>>
{
    ops.into_iter()
        .fold(nd::Array2::from_elem((1, 1), C64::one()), |acc, op| kron(&acc, op))
}

/// Return the phase of the first element of `a` whose magnitude exceeds
/// `threshold`, or 1 if there is none.
pub fn get_phase(a: &nd::Array2<C64>, threshold: f64) -> C64 {
    a.iter()
        .find(|x| x.norm() > threshold)
        .map(|x| *x / x.norm())
        .unwrap_or_else(C64::one)
}

/// Return a copy of `a` with its [global phase][get_phase] removed.
pub fn remove_phase(a: &nd::Array2<C64>) -> nd::Array2<C64> {
    a * get_phase(a, PHASE_THRESHOLD).conj()
}

/// Round the real and imaginary parts of every element of `a` to the nearest
/// multiple of `threshold`.
pub fn remove_artifacts(a: &nd::Array2<C64>, threshold: f64)
    -> nd::Array2<C64>
{
    a.mapv(|x| {
        C64::new(
            (x.re / threshold).round() * threshold,
            (x.im / threshold).round() * threshold,
        )
    })
}
