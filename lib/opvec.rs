//! Vectors of operators, e.g. the spin vector `S = (S_x, S_y, S_z)`.
//!
//! Components are indexed by the lattice-frame axes, so that `S · r` for a
//! real [`Vector3`] `r` is the spin projection onto `r`.

use std::ops::{ Add, AddAssign, Index };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ NvError, NvResult },
    qubits::tp,
    vector::Vector3,
};

/// A three-component vector of square operators of equal dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct OpVec {
    v: [nd::Array2<C64>; 3],
}

impl OpVec {
    /// Construct from three components.
    ///
    /// Fails if the components are not all square with the same dimension.
    pub fn new(vx: nd::Array2<C64>, vy: nd::Array2<C64>, vz: nd::Array2<C64>)
        -> NvResult<Self>
    {
        let dim = vx.dim();
        if dim.0 != dim.1 { return Err(NvError::NonSquare(dim.0, dim.1)); }
        for c in [&vy, &vz] {
            if c.dim() != dim {
                return Err(NvError::InvalidParam(format!(
                    "operator-vector components of mismatched shape {:?} and \
                    {:?}", dim, c.dim()
                )));
            }
        }
        Ok(Self { v: [vx, vy, vz] })
    }

    /// The operator-vector `op · v̂`, i.e. `op` pointing along the real
    /// vector `v`.
    pub fn from_axis(op: &nd::Array2<C64>, v: &Vector3) -> Self {
        Self { v: [op * v[0], op * v[1], op * v[2]] }
    }

    /// Dimension of each component.
    pub fn dim(&self) -> usize { self.v[0].nrows() }

    /// Iterate over the three components.
    pub fn iter(&self) -> std::slice::Iter<'_, nd::Array2<C64>> {
        self.v.iter()
    }

    /// Multiply every component by a scalar.
    pub fn scale(&self, a: f64) -> Self {
        Self { v: [&self.v[0] * a, &self.v[1] * a, &self.v[2] * a] }
    }

    /// Projection onto a real vector: `Σ_i r_i v_i`.
    pub fn dot_vec(&self, r: &Vector3) -> nd::Array2<C64> {
        &self.v[0] * r[0] + &self.v[1] * r[1] + &self.v[2] * r[2]
    }

    /// Inner product with another operator-vector, forming the sum of tensor
    /// products `Σ_i v_i ⊗ w_i` over the combined space.
    pub fn dot(&self, other: &Self) -> nd::Array2<C64> {
        self.v.iter().zip(other.v.iter())
            .map(|(a, b)| tp(a, b))
            .reduce(|acc, ab| acc + ab)
            .unwrap_or_else(|| nd::Array2::zeros((0, 0)))
    }

    /// Left-multiply every component by `G`.
    pub fn left_mul(&self, G: &nd::Array2<C64>) -> Self {
        Self { v: [G.dot(&self.v[0]), G.dot(&self.v[1]), G.dot(&self.v[2])] }
    }
}

impl Index<usize> for OpVec {
    type Output = nd::Array2<C64>;

    fn index(&self, k: usize) -> &Self::Output { &self.v[k] }
}

impl AddAssign<&OpVec> for OpVec {
    fn add_assign(&mut self, rhs: &OpVec) {
        self.v.iter_mut().zip(rhs.v.iter())
            .for_each(|(l, r)| { *l += r; });
    }
}

impl Add for OpVec {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += &rhs;
        self
    }
}
