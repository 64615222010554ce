//! Fixed-dimension vector math.
//!
//! [`Vector`] wraps a `[f64; D]` and provides the component-wise arithmetic,
//! dot product and L2 norms the simulation needs. The dimension is a
//! compile-time constant, so the same code serves 2D and 3D layouts and also
//! selects the branching factor (`2^D`) of the spatial tree.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point or displacement in `D`-dimensional space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(transparent)]
pub struct Vector<const D: usize>(pub [f64; D]);

/// Two-dimensional vector.
pub type Vector2 = Vector<2>;

/// Three-dimensional vector.
pub type Vector3 = Vector<3>;

impl<const D: usize> Vector<D> {
    /// The zero vector.
    pub const ZERO: Self = Self([0.0; D]);

    /// Create a vector from its components.
    #[inline]
    pub const fn new(components: [f64; D]) -> Self {
        Self(components)
    }

    /// Create a vector with every component set to `value`.
    #[inline]
    pub const fn splat(value: f64) -> Self {
        Self([value; D])
    }

    /// Borrow the raw components.
    #[inline]
    pub fn as_array(&self) -> &[f64; D] {
        &self.0
    }

    /// Consume the vector and return its components.
    #[inline]
    pub fn into_array(self) -> [f64; D] {
        self.0
    }

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        let mut sum = 0.0;
        for k in 0..D {
            sum += self.0[k] * other.0[k];
        }
        sum
    }

    #[inline]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        self.zip_with(other, f64::min)
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        self.zip_with(other, f64::max)
    }

    /// Largest component.
    #[inline]
    pub fn max_element(self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }

    /// Apply `f` to each component.
    #[inline]
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        let mut out = self.0;
        for c in &mut out {
            *c = f(*c);
        }
        Self(out)
    }

    /// Combine two vectors component by component.
    #[inline]
    pub fn zip_with(self, other: Self, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        let mut out = self.0;
        for k in 0..D {
            out[k] = f(self.0[k], other.0[k]);
        }
        Self(out)
    }

    /// View a slice of vectors as interleaved components
    /// (`[x0, y0, x1, y1, ...]` in 2D).
    pub fn flatten(vectors: &[Self]) -> &[f64] {
        // SAFETY: `Vector<D>` is `repr(transparent)` over `[f64; D]`, so a
        // slice of `n` vectors is `n * D` contiguous, aligned f64s.
        unsafe { std::slice::from_raw_parts(vectors.as_ptr().cast::<f64>(), vectors.len() * D) }
    }
}

impl<const D: usize> Default for Vector<D> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const D: usize> From<[f64; D]> for Vector<D> {
    #[inline]
    fn from(components: [f64; D]) -> Self {
        Self(components)
    }
}

impl<const D: usize> From<Vector<D>> for [f64; D] {
    #[inline]
    fn from(v: Vector<D>) -> Self {
        v.0
    }
}

impl<const D: usize> fmt::Display for Vector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (k, c) in self.0.iter().enumerate() {
            if k > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

impl<const D: usize> Index<usize> for Vector<D> {
    type Output = f64;

    #[inline]
    fn index(&self, axis: usize) -> &f64 {
        &self.0[axis]
    }
}

impl<const D: usize> IndexMut<usize> for Vector<D> {
    #[inline]
    fn index_mut(&mut self, axis: usize) -> &mut f64 {
        &mut self.0[axis]
    }
}

impl<const D: usize> Add for Vector<D> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl<const D: usize> Sub for Vector<D> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl<const D: usize> Mul<f64> for Vector<D> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.map(|c| c * rhs)
    }
}

impl<const D: usize> Div<f64> for Vector<D> {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        self.map(|c| c / rhs)
    }
}

impl<const D: usize> Neg for Vector<D> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.map(|c| -c)
    }
}

impl<const D: usize> AddAssign for Vector<D> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const D: usize> SubAssign for Vector<D> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const D: usize> MulAssign<f64> for Vector<D> {
    #[inline]
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl<const D: usize> DivAssign<f64> for Vector<D> {
    #[inline]
    fn div_assign(&mut self, rhs: f64) {
        *self = *self / rhs;
    }
}

// serde only derives array impls up to a fixed length, so vectors are
// written as a D-tuple by hand.
impl<const D: usize> Serialize for Vector<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(D)?;
        for c in &self.0 {
            tuple.serialize_element(c)?;
        }
        tuple.end()
    }
}

struct VectorVisitor<const D: usize>(PhantomData<[f64; D]>);

impl<'de, const D: usize> Visitor<'de> for VectorVisitor<D> {
    type Value = Vector<D>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence of {D} numbers")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = [0.0; D];
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(k, &self))?;
        }
        if seq.next_element::<f64>()?.is_some() {
            return Err(de::Error::invalid_length(D + 1, &self));
        }
        Ok(Vector(out))
    }
}

impl<'de, const D: usize> Deserialize<'de> for Vector<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        deserializer.deserialize_tuple(D, VectorVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Vector([1.0, 2.0]);
        let b = Vector([3.0, -1.0]);

        assert_eq!(a + b, Vector([4.0, 1.0]));
        assert_eq!(a - b, Vector([-2.0, 3.0]));
        assert_eq!(a * 2.0, Vector([2.0, 4.0]));
        assert_eq!(b / 2.0, Vector([1.5, -0.5]));
        assert_eq!(-a, Vector([-1.0, -2.0]));
    }

    #[test]
    fn test_flatten_interleaves() {
        let points = [Vector([1.0, 2.0]), Vector([3.0, 4.0])];
        assert_eq!(Vector::flatten(&points[..]), &[1.0, 2.0, 3.0, 4.0]);
        assert!(Vector::<3>::flatten(&[]).is_empty());
    }

    #[test]
    fn test_norms() {
        let a = Vector([3.0, 4.0, 0.0]);
        assert_eq!(a.length_squared(), 25.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.dot(Vector([1.0, 1.0, 1.0])), 7.0);
        assert_eq!(a.distance(Vector::ZERO), 5.0);
        assert_eq!(Vector([1.0, 1.0]).distance_squared(Vector([4.0, 5.0])), 25.0);
    }

    #[test]
    fn test_min_max() {
        let a = Vector([1.0, 5.0]);
        let b = Vector([2.0, -5.0]);
        assert_eq!(a.min(b), Vector([1.0, -5.0]));
        assert_eq!(a.max(b), Vector([2.0, 5.0]));
        assert_eq!(a.max_element(), 5.0);
    }

    #[test]
    fn test_finite() {
        assert!(Vector([1.0, 2.0]).is_finite());
        assert!(!Vector([f64::NAN, 2.0]).is_finite());
        assert!(!Vector([1.0, f64::INFINITY]).is_finite());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Vector([1.0, 2.5])), "(1, 2.5)");
    }

    #[test]
    fn test_serde_tuple() {
        let v = Vector([1.0, 2.0, 3.0]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0]");

        let back: Vector3 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        assert!(serde_json::from_str::<Vector3>("[1.0,2.0]").is_err());
        assert!(serde_json::from_str::<Vector2>("[1.0,2.0,3.0]").is_err());
    }
}
