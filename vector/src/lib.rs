extern crate num;
extern crate serde;

use num::traits::Inv;
use num::Float;
use num::Num;
use std::fmt;
use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

mod serialization;

pub trait Field
where
    Self: Num,
    Self: Mul<Self, Output = Self>,
    Self: MulAssign<Self>,
    Self: AddAssign<Self>,
    Self: SubAssign<Self>,
    Self: Div<Self, Output = Self>,
    Self: Add<Self, Output = Self>,
    Self: Sub<Self, Output = Self>,
    Self: Neg<Output = Self>,
    Self: Inv<Output = Self>,
    Self: Sum<Self>,
    Self: PartialEq,
    Self: Copy,
    Self: Default,
    Self: Debug,
    Self: Display,
{
}

impl Field for f32 {}
impl Field for f64 {}

/// Raised when a boost is requested with a velocity at or beyond the speed of light.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum BoostError {
    #[error("invalid boost velocity |beta| = {beta}, it must be below 1")]
    InvalidBoostVelocity { beta: f64 },
}

/// An energy-momentum four-vector `(t, x, y, z)` in natural units, metric `(+,-,-,-)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LorentzVector<T: Field> {
    pub t: T,
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: Field> Default for LorentzVector<T> {
    #[inline]
    fn default() -> LorentzVector<T> {
        LorentzVector {
            t: T::default(),
            x: T::default(),
            y: T::default(),
            z: T::default(),
        }
    }
}

impl<T: Field> Display for LorentzVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(t:{}, x:{}, y:{}, z:{})",
            self.t, self.x, self.y, self.z
        )
    }
}

impl<T: Field + LowerExp> LowerExp for LorentzVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(t:{:e}, x:{:e}, y:{:e}, z:{:e})",
            self.t, self.x, self.y, self.z
        )
    }
}

impl<T: Field> LorentzVector<T> {
    #[inline]
    pub fn new() -> LorentzVector<T> {
        LorentzVector::default()
    }

    #[inline]
    pub fn from_args(t: T, x: T, y: T, z: T) -> LorentzVector<T> {
        LorentzVector { t, x, y, z }
    }

    #[inline]
    pub fn from_slice(v: &[T]) -> LorentzVector<T> {
        let (t, x, y, z) = (v[0], v[1], v[2], v[3]);
        LorentzVector { t, x, y, z }
    }

    /// The invariant `t^2 - |p|^2`, i.e. the squared mass.
    #[inline]
    pub fn square(&self) -> T {
        self.t * self.t - self.x * self.x - self.y * self.y - self.z * self.z
    }

    #[inline]
    pub fn dot(&self, other: &LorentzVector<T>) -> T {
        self.t * other.t - self.x * other.x - self.y * other.y - self.z * other.z
    }

    #[inline]
    pub fn spatial_squared(&self) -> T {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline]
    pub fn spatial_dot(&self, other: &LorentzVector<T>) -> T {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
}

impl<T: Float + Field> LorentzVector<T> {
    #[inline]
    pub fn spatial_distance(&self) -> T {
        self.spatial_squared().sqrt()
    }

    /// Invariant mass. Negative radicands coming from cancellation are clamped to zero,
    /// so this never returns NaN for finite input.
    #[inline]
    pub fn mass(&self) -> T {
        self.square().max(T::zero()).sqrt()
    }

    /// The velocity `p/E` stored in the spatial slots, the time slot is zero.
    #[inline]
    pub fn boost_vector(&self) -> LorentzVector<T> {
        let inv_t = self.t.inv();
        LorentzVector::from_args(T::zero(), self.x * inv_t, self.y * inv_t, self.z * inv_t)
    }

    /// Boost this vector by the velocity held in the spatial part of `boost_vector`.
    /// A vector at rest picks up the momentum `gamma * m * beta`.
    pub fn try_boost(&self, boost_vector: &LorentzVector<T>) -> Result<LorentzVector<T>, BoostError> {
        let b2 = boost_vector.spatial_squared();
        if !(b2 < T::one()) {
            return Err(BoostError::InvalidBoostVelocity {
                beta: b2.sqrt().to_f64().unwrap_or(std::f64::NAN),
            });
        }

        let gamma = (T::one() - b2).sqrt().inv();

        let bp = self.spatial_dot(boost_vector);
        let gamma2 = if b2 > T::zero() {
            (gamma - T::one()) / b2
        } else {
            T::zero()
        };
        let factor = gamma2 * bp + gamma * self.t;
        Ok(LorentzVector::from_args(
            gamma * (self.t + bp),
            boost_vector.x.mul_add(factor, self.x),
            boost_vector.y.mul_add(factor, self.y),
            boost_vector.z.mul_add(factor, self.z),
        ))
    }

    /// Like `try_boost`, but panics on `|beta| >= 1`.
    pub fn boost(&self, boost_vector: &LorentzVector<T>) -> LorentzVector<T> {
        match self.try_boost(boost_vector) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a, T: Field> Neg for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn neg(self) -> LorentzVector<T> {
        LorentzVector {
            t: -self.t,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl<T: Field> Neg for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn neg(self) -> LorentzVector<T> {
        -&self
    }
}

impl<'a, T: Field> Add<&'a LorentzVector<T>> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn add(self, other: &'a LorentzVector<T>) -> LorentzVector<T> {
        LorentzVector {
            t: self.t + other.t,
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl<'a, T: Field> Add<LorentzVector<T>> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn add(self, other: LorentzVector<T>) -> LorentzVector<T> {
        self.add(&other)
    }
}

impl<'a, T: Field> Add<&'a LorentzVector<T>> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn add(self, other: &'a LorentzVector<T>) -> LorentzVector<T> {
        &self + other
    }
}

impl<T: Field> Add<LorentzVector<T>> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn add(self, other: LorentzVector<T>) -> LorentzVector<T> {
        &self + &other
    }
}

impl<T: Field> AddAssign<LorentzVector<T>> for LorentzVector<T> {
    #[inline]
    fn add_assign(&mut self, other: LorentzVector<T>) {
        self.t += other.t;
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl<T: Field> SubAssign<LorentzVector<T>> for LorentzVector<T> {
    #[inline]
    fn sub_assign(&mut self, other: LorentzVector<T>) {
        self.t -= other.t;
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl<'a, T: Field> Sub<&'a LorentzVector<T>> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn sub(self, other: &'a LorentzVector<T>) -> LorentzVector<T> {
        LorentzVector {
            t: self.t - other.t,
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl<'a, T: Field> Sub<LorentzVector<T>> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn sub(self, other: LorentzVector<T>) -> LorentzVector<T> {
        self.sub(&other)
    }
}

impl<T: Field> Sub<LorentzVector<T>> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn sub(self, other: LorentzVector<T>) -> LorentzVector<T> {
        &self - &other
    }
}

impl<'a, T: Field> Sub<&'a LorentzVector<T>> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn sub(self, other: &'a LorentzVector<T>) -> LorentzVector<T> {
        &self - other
    }
}

impl<'a, T: Field> Mul<T> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn mul(self, other: T) -> LorentzVector<T> {
        LorentzVector {
            t: self.t * other,
            x: self.x * other,
            y: self.y * other,
            z: self.z * other,
        }
    }
}

impl<T: Field> Mul<T> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn mul(self, other: T) -> LorentzVector<T> {
        &self * other
    }
}

impl<'a, T: Field> Div<T> for &'a LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn div(self, other: T) -> LorentzVector<T> {
        let o = other.inv();
        self * o
    }
}

impl<T: Field> Div<T> for LorentzVector<T> {
    type Output = LorentzVector<T>;

    #[inline]
    fn div(self, other: T) -> LorentzVector<T> {
        let o = other.inv();
        self * o
    }
}

impl<T: Field> Sum for LorentzVector<T> {
    fn sum<I: Iterator<Item = LorentzVector<T>>>(iter: I) -> LorentzVector<T> {
        iter.fold(LorentzVector::default(), |acc, v| acc + v)
    }
}

impl<'a, T: Field> Sum<&'a LorentzVector<T>> for LorentzVector<T> {
    fn sum<I: Iterator<Item = &'a LorentzVector<T>>>(iter: I) -> LorentzVector<T> {
        iter.fold(LorentzVector::default(), |acc, v| acc + v)
    }
}

impl<T: Field> Index<usize> for LorentzVector<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match index {
            0 => &self.t,
            1 => &self.x,
            2 => &self.y,
            3 => &self.z,
            _ => panic!("Index is not between 0 and 3"),
        }
    }
}

impl<T: Field> IndexMut<usize> for LorentzVector<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        match index {
            0 => &mut self.t,
            1 => &mut self.x,
            2 => &mut self.y,
            3 => &mut self.z,
            _ => panic!("Index is not between 0 and 3"),
        }
    }
}
