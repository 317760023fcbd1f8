//! Dense matrix helpers shared by the propagator and coherence code.

use ndarray as nd;
use ndarray_linalg::{ self as la, Eigh };
use num_complex::Complex64 as C64;
use crate::{
    error::NvResult,
    qubits::frobenius_sqr,
};

/// Return the conjugate transpose of `a`.
pub fn dagger(a: &nd::Array2<C64>) -> nd::Array2<C64> {
    a.t().mapv(|x| x.conj())
}

/// Diagonalized Hermitian generator, for evaluating `exp(-i H t)` at many
/// times.
#[derive(Clone, Debug)]
pub struct HermitianExp {
    E: nd::Array1<f64>,
    V: nd::Array2<C64>,
    Vh: nd::Array2<C64>,
}

impl HermitianExp {
    /// Diagonalize `H`.
    pub fn new(H: &nd::Array2<C64>) -> NvResult<Self> {
        let (E, V): (nd::Array1<f64>, nd::Array2<C64>)
            = H.eigh(la::UPLO::Lower)?;
        let Vh = dagger(&V);
        Ok(Self { E, V, Vh })
    }

    /// Compute `exp(-i H t)`.
    pub fn at(&self, t: f64) -> nd::Array2<C64> {
        let mut VL = self.V.clone();
        VL.columns_mut().into_iter().zip(self.E.iter())
            .for_each(|(mut col, e)| { col *= C64::from_polar(1.0, -e * t); });
        VL.dot(&self.Vh)
    }
}

/// Compute `exp(-i H t)` for Hermitian `H` by diagonalization.
pub fn expm_hermitian(H: &nd::Array2<C64>, t: f64)
    -> NvResult<nd::Array2<C64>>
{
    Ok(HermitianExp::new(H)?.at(t))
}

/// Raise a square matrix to a non-negative integer power by repeated
/// squaring.
pub fn matrix_power(U: &nd::Array2<C64>, n: usize) -> nd::Array2<C64> {
    let mut acc: nd::Array2<C64> = nd::Array2::eye(U.nrows());
    let mut base = U.clone();
    let mut k = n;
    while k > 0 {
        if k & 1 == 1 { acc = base.dot(&acc); }
        k >>= 1;
        if k > 0 { base = base.dot(&base); }
    }
    acc
}

/// Return the norm `sqrt(Re Tr(U^† U) / dim)`, which is 1 for a unitary.
pub fn unitary_norm(U: &nd::Array2<C64>) -> f64 {
    (frobenius_sqr(U) / U.nrows() as f64).sqrt()
}

/// Rescale `U` in place so that its [`unitary_norm`] is 1.
///
/// Zero matrices are left untouched.
pub fn normalize(U: &mut nd::Array2<C64>) {
    let norm = unitary_norm(U);
    if norm > 0.0 {
        U.mapv_inplace(|x| x / norm);
    }
}

/// Largest elementwise deviation of `U^† U` from the identity.
pub fn unitarity_error(U: &nd::Array2<C64>) -> f64 {
    let P = dagger(U).dot(U);
    P.indexed_iter()
        .map(|((i, j), x)| {
            if i == j { (*x - 1.0).norm() } else { x.norm() }
        })
        .fold(0.0, f64::max)
}

/// Return the trace of the product `A B` without forming it.
pub fn trace_product(A: &nd::Array2<C64>, B: &nd::Array2<C64>) -> C64 {
    A.outer_iter().enumerate()
        .map(|(i, row)| row.dot(&B.column(i)))
        .sum()
}

/// Average gate fidelity of the operation `U` with respect to the target
/// `G`: `(Tr(M^† M) + |Tr M|^2) / (D (D + 1))` for `M = G^† U`.
pub fn gate_fidelity(U: &nd::Array2<C64>, G: &nd::Array2<C64>) -> f64 {
    let D = U.nrows() as f64;
    let M = dagger(G).dot(U);
    let tr = M.diag().sum();
    (frobenius_sqr(&M) + tr.norm_sqr()) / (D * (D + 1.0))
}
