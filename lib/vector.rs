//! Fixed-dimension real 3-vectors for positions, fields, and axes.

use std::ops::{
    Add, AddAssign,
    Sub, SubAssign,
    Mul, MulAssign,
    Div,
    Neg,
    Index, IndexMut,
};

/// A real vector in three dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Vector3(pub [f64; 3]);

impl AsRef<[f64; 3]> for Vector3 {
    fn as_ref(&self) -> &[f64; 3] { &self.0 }
}

impl From<[f64; 3]> for Vector3 {
    fn from(data: [f64; 3]) -> Self { Self(data) }
}

impl Vector3 {
    /// Create a new vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self { Self([x, y, z]) }

    /// Create a vector of all zeros.
    pub const fn zeros() -> Self { Self([0.0; 3]) }

    /// Create a vector with 1 at the `k`-th index and zeros elsewhere.
    ///
    /// This is equivalent to `zeros` if `k ≥ 3`.
    pub fn unit(k: usize) -> Self {
        let mut v = Self::zeros();
        if let Some(elem) = v.0.get_mut(k) {
            *elem = 1.0;
        }
        v
    }

    /// Return an iterator over all elements.
    pub fn iter(&self) -> std::slice::Iter<'_, f64> { self.0.iter() }

    /// Call a function on each element, returning results in a new vector.
    pub fn map<F>(&self, mut f: F) -> Self
    where F: FnMut(f64) -> f64
    {
        Self([f(self.0[0]), f(self.0[1]), f(self.0[2])])
    }

    /// Return the dot product of two vectors.
    pub fn dot(&self, rhs: &Self) -> f64 {
        self.0.iter().zip(rhs.0.iter()).map(|(l, r)| l * r).sum()
    }

    /// Return the cross product `self × rhs`.
    pub fn cross(&self, rhs: &Self) -> Self {
        let [a0, a1, a2] = self.0;
        let [b0, b1, b2] = rhs.0;
        Self([a1 * b2 - a2 * b1, a2 * b0 - a0 * b2, a0 * b1 - a1 * b0])
    }

    /// Return the squared Euclidean norm.
    pub fn norm_sqr(&self) -> f64 { self.dot(self) }

    /// Return the Euclidean norm.
    pub fn norm(&self) -> f64 { self.norm_sqr().sqrt() }

    /// Return the unit vector pointing along `self`.
    ///
    /// The zero vector is returned unchanged.
    pub fn hat(&self) -> Self {
        let n = self.norm();
        if n > 0.0 { *self / n } else { *self }
    }

    /// Return the component of `self` perpendicular to `axis`.
    pub fn perp(&self, axis: &Self) -> Self {
        let a = axis.hat();
        *self - a * self.dot(&a)
    }
}

impl Index<usize> for Vector3 {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output { &self.0[index] }
}

impl IndexMut<usize> for Vector3 {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Self) {
        self.0.iter_mut().zip(rhs.0)
            .for_each(|(l, r)| { *l += r; });
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self::Output {
        self -= rhs;
        self
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Self) {
        self.0.iter_mut().zip(rhs.0)
            .for_each(|(l, r)| { *l -= r; });
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self::Output { self.map(|x| -x) }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self::Output {
        self *= rhs;
        self
    }
}

impl Mul<Vector3> for f64 {
    type Output = Vector3;

    fn mul(self, rhs: Vector3) -> Self::Output { rhs * self }
}

impl MulAssign<f64> for Vector3 {
    fn mul_assign(&mut self, rhs: f64) {
        self.0.iter_mut().for_each(|l| { *l *= rhs; });
    }
}

impl Div<f64> for Vector3 {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output { self * (1.0 / rhs) }
}

impl std::iter::Sum for Vector3 {
    fn sum<I>(iter: I) -> Self
    where I: Iterator<Item = Self>
    {
        iter.fold(Self::zeros(), |acc, v| acc + v)
    }
}
