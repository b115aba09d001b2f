//! 3D vector and quaternion types used by every part of the kite model.
//!
//! World frame convention: +Y is up, the pilot stands at the origin and the
//! kite flies downwind towards -Z. Body frame: +X is the kite's right wing,
//! +Y runs along the spine towards the nose and +Z points out of the sail
//! towards the pilot (the side the bridles hang on).

use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

/// Below this length a vector is treated as having no direction.
pub const NORMALIZE_EPSILON: f64 = 1e-12;

/// 3D vector in meters (positions), m/s (velocities) or newtons (forces).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Unit vector along +Y (world up).
    pub const fn up() -> Self {
        Self { x: 0.0, y: 1.0, z: 0.0 }
    }

    pub const fn unit_x() -> Self {
        Self { x: 1.0, y: 0.0, z: 0.0 }
    }

    pub const fn unit_z() -> Self {
        Self { x: 0.0, y: 0.0, z: 1.0 }
    }

    #[inline(always)]
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    /// Squared magnitude (avoids sqrt, cheaper for comparisons).
    #[inline(always)]
    pub fn magnitude_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Unit vector in the same direction, `None` for (near) zero vectors.
    pub fn normalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag < NORMALIZE_EPSILON || !mag.is_finite() {
            None
        } else {
            Some(*self * (1.0 / mag))
        }
    }

    /// Unit vector in the same direction, or `fallback` when there is none.
    pub fn normalized_or(&self, fallback: Self) -> Self {
        self.normalized().unwrap_or(fallback)
    }

    #[inline(always)]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product: self × other
    #[inline(always)]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).magnitude()
    }

    /// Scales the vector down so that its length does not exceed `max`.
    pub fn clamp_magnitude(&self, max: f64) -> Self {
        let mag_sq = self.magnitude_sq();
        if mag_sq > max * max && mag_sq > 0.0 {
            *self * (max / mag_sq.sqrt())
        } else {
            *self
        }
    }

    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t.clamp(0.0, 1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(arr: &[f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(&arr)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn div(self, scalar: f64) -> Self {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<f64> for Vec3 {
    fn mul_assign(&mut self, scalar: f64) {
        *self = *self * scalar;
    }
}

impl Sum for Vec3 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl AbsDiffEq for Vec3 {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon)
            && self.y.abs_diff_eq(&other.y, epsilon)
            && self.z.abs_diff_eq(&other.z, epsilon)
    }
}

impl RelativeEq for Vec3 {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.x.relative_eq(&other.x, epsilon, max_relative)
            && self.y.relative_eq(&other.y, epsilon, max_relative)
            && self.z.relative_eq(&other.z, epsilon, max_relative)
    }
}

/// Rotation quaternion (w + xi + yj + zk). Kept unit-length by every
/// operation that produces an orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Identity quaternion (no rotation).
    pub const fn identity() -> Self {
        Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Rotation of `theta` radians about `axis`. `None` if the axis has no
    /// direction.
    pub fn from_axis_angle(axis: &Vec3, theta: f64) -> Option<Self> {
        let axis_norm = axis.normalized()?;
        let (sin_half, cos_half) = (theta / 2.0).sin_cos();
        Some(Self::new(
            cos_half,
            axis_norm.x * sin_half,
            axis_norm.y * sin_half,
            axis_norm.z * sin_half,
        ))
    }

    /// Rotation described by a rotation vector (axis scaled by angle).
    /// Zero vectors map to the identity.
    pub fn from_rotation_vector(v: &Vec3) -> Self {
        let angle = v.magnitude();
        if angle < NORMALIZE_EPSILON {
            return Self::identity();
        }
        Self::from_axis_angle(v, angle).unwrap_or_else(Self::identity)
    }

    /// Hamilton product `self * other` (apply `other` first, then `self`).
    pub fn mul(&self, other: &Self) -> Self {
        Self::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }

    /// Rotates a vector by this (unit) quaternion.
    #[inline(always)]
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        // v' = v + 2w(u × v) + 2u × (u × v)
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        *v + t * self.w + u.cross(&t)
    }

    /// Rotates a world vector into the body frame.
    pub fn inverse_rotate(&self, v: &Vec3) -> Vec3 {
        self.conjugate().rotate(v)
    }

    /// Conjugate; the inverse rotation for unit quaternions.
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    pub fn magnitude_sq(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Unit quaternion, `None` when the magnitude is zero or not finite.
    pub fn normalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag < NORMALIZE_EPSILON || !mag.is_finite() {
            None
        } else {
            let inv = 1.0 / mag;
            Some(Self::new(self.w * inv, self.x * inv, self.y * inv, self.z * inv))
        }
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// First-order update by a small world-frame rotation vector, as used by
    /// position-based rigid body corrections: q += ½ (0, θ) q, renormalized.
    ///
    /// Returns `None` if the result cannot be normalized.
    pub fn perturbed(&self, theta: &Vec3) -> Option<Self> {
        let dq = Self::new(0.0, theta.x, theta.y, theta.z).mul(self);
        Self::new(
            self.w + 0.5 * dq.w,
            self.x + 0.5 * dq.x,
            self.y + 0.5 * dq.y,
            self.z + 0.5 * dq.z,
        )
        .normalized()
    }

    /// Integrates a world-frame angular velocity over `dt` using the exact
    /// exponential map, renormalized.
    pub fn integrated(&self, omega: &Vec3, dt: f64) -> Option<Self> {
        Self::from_rotation_vector(&(*omega * dt)).mul(self).normalized()
    }

    /// Angle in radians of the rotation taking `self` to `other`.
    pub fn angle_to(&self, other: &Self) -> f64 {
        let dot = (self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z).abs();
        2.0 * dot.clamp(0.0, 1.0).acos()
    }
}
