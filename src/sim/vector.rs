//! Fixed-point vectors and ellipse geometry
//!
//! `Vec2F` carries precise grid-space positions and velocities, `Vec3F`
//! adds the Storm depth axis. `Ellipse` precomputes inverse radii squared
//! so containment tests are two multiplies and an add.

use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::fixed::{Bam, Fixed, cos_bam, sin_bam};

/// 2D vector with Q32.32 components
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2F {
    pub x: Fixed,
    pub y: Fixed,
}

impl Vec2F {
    pub const ZERO: Self = Self::new(Fixed::ZERO, Fixed::ZERO);
    /// Fallback direction for normalizing a zero vector
    pub const X: Self = Self::new(Fixed::ONE, Fixed::ZERO);
    pub const Y: Self = Self::new(Fixed::ZERO, Fixed::ONE);

    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_int(x), Fixed::from_int(y))
    }

    /// Precise position at the centre of a grid cell
    #[inline]
    pub fn cell_center(x: i32, y: i32) -> Self {
        Self::new(
            Fixed::from_int(x) + Fixed::HALF,
            Fixed::from_int(y) + Fixed::HALF,
        )
    }

    /// Grid cell containing this point (floor of each axis)
    #[inline]
    pub const fn grid(self) -> (i32, i32) {
        (self.x.floor(), self.y.floor())
    }

    #[inline]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    /// Exact magnitude
    #[inline]
    pub fn length(self) -> Fixed {
        self.length_squared().sqrt()
    }

    /// Approximate magnitude (alpha-max plus beta-min, within ~4%)
    pub fn length_fast(self) -> Fixed {
        let ax = self.x.abs();
        let ay = self.y.abs();
        let (hi, lo) = if ax > ay { (ax, ay) } else { (ay, ax) };
        hi * Fixed::from_ratio(123, 128) + lo * Fixed::from_ratio(51, 128)
    }

    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        (self - other).length()
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> Fixed {
        (self - other).length_squared()
    }

    /// Unit vector in this direction; a zero vector yields `X`
    #[inline]
    pub fn normalize(self) -> Self {
        self.normalize_or(Self::X)
    }

    pub fn normalize_or(self, fallback: Self) -> Self {
        let len = self.length();
        if len.is_zero() {
            return fallback;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Scale down so the magnitude does not exceed `max`
    pub fn clamp_length(self, max: Fixed) -> Self {
        let len = self.length();
        if len <= max || len.is_zero() {
            return self;
        }
        self * (max / len)
    }

    /// Flip the X component and scale it by `restitution`
    #[inline]
    pub fn reflect_x(self, restitution: Fixed) -> Self {
        Self::new(-self.x * restitution, self.y)
    }

    /// Flip the Y component and scale it by `restitution`
    #[inline]
    pub fn reflect_y(self, restitution: Fixed) -> Self {
        Self::new(self.x, -self.y * restitution)
    }

    /// Rotate counter-clockwise by a binary angle
    pub fn rotate_bam(self, angle: Bam) -> Self {
        let (s, c) = (sin_bam(angle), cos_bam(angle));
        Self::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    /// Unit vector at a binary angle
    pub fn from_bam(angle: Bam) -> Self {
        Self::new(cos_bam(angle), sin_bam(angle))
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    #[inline]
    pub fn div_int(self, n: i64) -> Self {
        Self::new(self.x.div_int(n), self.y.div_int(n))
    }

    /// Float conversion for rendering/telemetry only
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x.to_f32(), self.y.to_f32())
    }
}

impl Add for Vec2F {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2F {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2F {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<Fixed> for Vec2F {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Fixed) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<Fixed> for Vec2F {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Fixed) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl AddAssign for Vec2F {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec2F {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<Fixed> for Vec2F {
    #[inline]
    fn mul_assign(&mut self, rhs: Fixed) {
        *self = *self * rhs;
    }
}

/// 3D vector with Q32.32 components (X/Y grid plane, Z depth)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3F {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
}

impl Vec3F {
    pub const ZERO: Self = Self::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO);
    pub const X: Self = Self::new(Fixed::ONE, Fixed::ZERO, Fixed::ZERO);

    #[inline]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn from_xy(xy: Vec2F, z: Fixed) -> Self {
        Self::new(xy.x, xy.y, z)
    }

    #[inline]
    pub const fn xy(self) -> Vec2F {
        Vec2F::new(self.x, self.y)
    }

    #[inline]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> Fixed {
        self.length_squared().sqrt()
    }

    /// Unit vector; a zero vector yields `X`
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len.is_zero() {
            return Self::X;
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    pub fn clamp_length(self, max: Fixed) -> Self {
        let len = self.length();
        if len <= max || len.is_zero() {
            return self;
        }
        self * (max / len)
    }
}

impl Add for Vec3F {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3F {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3F {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<Fixed> for Vec3F {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Fixed) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl AddAssign for Vec3F {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec3F {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Axis-aligned ellipse with precomputed inverse radii squared.
///
/// A default-constructed ellipse is *not* precomputed; using it is a
/// programming error caught by a debug assertion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ellipse {
    rx: Fixed,
    ry: Fixed,
    inv_rx2: Fixed,
    inv_ry2: Fixed,
}

impl Ellipse {
    pub fn new(rx: Fixed, ry: Fixed) -> Self {
        Self {
            rx,
            ry,
            inv_rx2: (rx * rx).recip(),
            inv_ry2: (ry * ry).recip(),
        }
    }

    pub fn from_cells(rx: i32, ry: i32) -> Self {
        Self::new(Fixed::from_int(rx), Fixed::from_int(ry))
    }

    #[inline]
    pub fn rx(&self) -> Fixed {
        self.rx
    }

    #[inline]
    pub fn ry(&self) -> Fixed {
        self.ry
    }

    #[inline]
    pub fn is_precomputed(&self) -> bool {
        self.inv_rx2.is_positive() && self.inv_ry2.is_positive()
    }

    /// `(dx/rx)^2 + (dy/ry)^2`; `<= 1` means inside
    #[inline]
    pub fn normalized_distance_squared(&self, offset: Vec2F) -> Fixed {
        debug_assert!(
            self.is_precomputed(),
            "ellipse used before its inverse radii were precomputed"
        );
        offset.x * offset.x * self.inv_rx2 + offset.y * offset.y * self.inv_ry2
    }

    #[inline]
    pub fn contains(&self, offset: Vec2F) -> bool {
        self.normalized_distance_squared(offset) <= Fixed::ONE
    }

    #[inline]
    pub fn contains_cell(&self, dx: i32, dy: i32) -> bool {
        self.contains(Vec2F::from_ints(dx, dy))
    }

    /// Half extents in whole cells, rounded up
    pub fn cell_extent(&self) -> (i32, i32) {
        (self.rx.ceil(), self.ry.ceil())
    }

    /// Every cell offset inside the ellipse, row-major from the top-left
    pub fn cells(&self) -> Vec<(i32, i32)> {
        let (ex, ey) = self.cell_extent();
        let mut out = Vec::new();
        for dy in -ey..=ey {
            for dx in -ex..=ex {
                if self.contains_cell(dx, dy) {
                    out.push((dx, dy));
                }
            }
        }
        out
    }

    /// Overlap test between two ellipses via the Minkowski-summed radii
    pub fn overlaps(a_center: Vec2F, a: &Ellipse, b_center: Vec2F, b: &Ellipse) -> bool {
        let combined = Ellipse::new(a.rx + b.rx, a.ry + b.ry);
        combined.contains(b_center - a_center)
    }
}
