//! Q32.32 fixed-point scalar
//!
//! All gameplay math runs on [`Fixed`] so a given input sequence produces
//! bit-identical results on every run. Floats only appear when tuning is
//! loaded and at the telemetry boundary.
//!
//! Angles use 256-step binary angle measurement (BAM): `0` points along +X,
//! `64` along +Y, and arithmetic wraps naturally on `u8`.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Number of fractional bits
pub const FRAC_BITS: u32 = 32;

/// One grid unit in raw representation
pub const SCALE: i64 = 1 << FRAC_BITS;

/// Q32.32 fixed-point number stored in an `i64`
///
/// Arithmetic wraps instead of panicking and widens to `i128` for products
/// and quotients. Division by zero yields zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed(i64);

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(SCALE);
    pub const HALF: Self = Self(SCALE / 2);
    pub const TWO: Self = Self(SCALE * 2);
    /// Smallest representable positive step
    pub const EPSILON: Self = Self(1);
    pub const MAX: Self = Self(i64::MAX);
    pub const MIN: Self = Self(i64::MIN);

    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self((value as i64) << FRAC_BITS)
    }

    /// Exact rational constant, e.g. `from_ratio(3, 8)` for 0.375
    #[inline]
    pub const fn from_ratio(num: i64, den: i64) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        Self((((num as i128) << FRAC_BITS) / den as i128) as i64)
    }

    /// Convert a float, rounding to the nearest representable value.
    ///
    /// Only used at the boundary (tuning load, the frame delta fed to `tick`).
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self((value * SCALE as f64).round() as i64)
    }

    /// Convert to float for display and telemetry
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }

    /// Largest integer not greater than the value (grid cell)
    #[inline]
    pub const fn floor(self) -> i32 {
        (self.0 >> FRAC_BITS) as i32
    }

    /// Nearest integer, halves rounding up
    #[inline]
    pub const fn round(self) -> i32 {
        (self.0.wrapping_add(SCALE / 2) >> FRAC_BITS) as i32
    }

    /// Smallest integer not less than the value
    #[inline]
    pub const fn ceil(self) -> i32 {
        (self.0.wrapping_add(SCALE - 1) >> FRAC_BITS) as i32
    }

    /// Fractional part in `[0, 1)`
    #[inline]
    pub const fn frac(self) -> Self {
        Self(self.0 & (SCALE - 1))
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.wrapping_abs())
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiply by a plain integer (no fractional rescale)
    #[inline]
    pub const fn mul_int(self, n: i64) -> Self {
        Self(self.0.wrapping_mul(n))
    }

    /// Divide by a plain integer; zero divisor yields zero
    #[inline]
    pub const fn div_int(self, n: i64) -> Self {
        if n == 0 {
            return Self::ZERO;
        }
        Self(self.0.wrapping_div(n))
    }

    /// Exact square root (floor of the true root in raw units).
    ///
    /// Non-positive inputs return zero.
    pub fn sqrt(self) -> Self {
        if self.0 <= 0 {
            return Self::ZERO;
        }
        Self(isqrt_u128((self.0 as u128) << FRAC_BITS) as i64)
    }

    #[inline]
    pub fn recip(self) -> Self {
        Self::ONE / self
    }

    /// Linear interpolation `a + (b - a) * t`
    #[inline]
    pub fn lerp(a: Self, b: Self, t: Self) -> Self {
        a + (b - a) * t
    }

    /// Saturating countdown helper for timers: subtract `dt`, never below zero
    #[inline]
    pub fn countdown(self, dt: Self) -> Self {
        let next = self - dt;
        if next.is_negative() { Self::ZERO } else { next }
    }
}

/// Integer square root by Newton iteration from above
fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

impl Add for Fixed {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl Mul for Fixed {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as i128 * rhs.0 as i128) >> FRAC_BITS) as i64)
    }
}

impl Div for Fixed {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            return Self::ZERO;
        }
        Self((((self.0 as i128) << FRAC_BITS) / rhs.0 as i128) as i64)
    }
}

impl Neg for Fixed {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Fixed {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({:.6})", self.to_f64())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}

/// Serde adapter writing a [`Fixed`] as a decimal number.
///
/// Used by tuning files so designers can write `1.5` instead of raw bits.
pub mod as_float {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Fixed;

    pub fn serialize<S: Serializer>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.to_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fixed, D::Error> {
        f64::deserialize(deserializer).map(Fixed::from_f64)
    }
}

// ---------------------------------------------------------------------------
// Angles
// ---------------------------------------------------------------------------

/// Binary angle: 256 steps per full turn
pub type Bam = u8;

/// Quarter-wave sine table, Q16. `SIN_QUARTER[i] = round(sin(i * 2pi / 256) * 65536)`
const SIN_QUARTER: [i64; 65] = [
    0, 1608, 3216, 4821, 6424, 8022, 9616, 11204, //
    12785, 14359, 15924, 17479, 19024, 20557, 22078, 23586, //
    25080, 26558, 28020, 29466, 30893, 32303, 33692, 35062, //
    36410, 37736, 39040, 40320, 41576, 42806, 44011, 45190, //
    46341, 47464, 48559, 49624, 50660, 51665, 52639, 53581, //
    54491, 55368, 56212, 57022, 57798, 58538, 59244, 59914, //
    60547, 61145, 61705, 62228, 62714, 63162, 63572, 63944, //
    64277, 64571, 64827, 65043, 65220, 65358, 65457, 65516, //
    65536,
];

/// `ATAN_OCTANT[i] = round(atan(i / 32) * 128 / pi)`
const ATAN_OCTANT: [u8; 33] = [
    0, 1, 3, 4, 5, 6, 8, 9, 10, 11, 12, 13, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 25, 26,
    27, 28, 29, 29, 30, 31, 31, 32,
];

/// Quarter turn in BAM
pub const BAM_QUARTER: Bam = 64;

pub fn sin_bam(angle: Bam) -> Fixed {
    let idx = angle as usize;
    let i = idx % 64;
    let q16 = match idx / 64 {
        0 => SIN_QUARTER[i],
        1 => SIN_QUARTER[64 - i],
        2 => -SIN_QUARTER[i],
        _ => -SIN_QUARTER[64 - i],
    };
    Fixed::from_raw(q16 << 16)
}

pub fn cos_bam(angle: Bam) -> Fixed {
    sin_bam(angle.wrapping_add(BAM_QUARTER))
}

/// Integer atan2 returning a binary angle.
///
/// Octant decomposition over a 33-entry table; `(0, 0)` maps to angle 0.
pub fn atan2_bam(dy: Fixed, dx: Fixed) -> Bam {
    if dx.is_zero() && dy.is_zero() {
        return 0;
    }
    let ax = dx.raw().unsigned_abs() as u128;
    let ay = dy.raw().unsigned_abs() as u128;

    let (ratio, swapped) = if ax >= ay {
        ((ay * 32 / ax) as usize, false)
    } else {
        ((ax * 32 / ay) as usize, true)
    };

    let mut angle = ATAN_OCTANT[ratio.min(32)] as i32;
    if swapped {
        angle = 64 - angle;
    }
    if dx.is_negative() {
        angle = 128 - angle;
    }
    if dy.is_negative() {
        angle = 256 - angle;
    }
    (angle & 0xFF) as Bam
}

/// Convert whole degrees to BAM (wraps)
pub fn degrees_to_bam(degrees: i32) -> Bam {
    (degrees * 256 / 360).rem_euclid(256) as Bam
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mul_div_basic() {
        let a = Fixed::from_int(3);
        let b = Fixed::from_ratio(1, 2);
        assert_eq!(a * b, Fixed::from_ratio(3, 2));
        assert_eq!(a / b, Fixed::from_int(6));
        assert_eq!(-a * b, Fixed::from_ratio(-3, 2));
    }

    #[test]
    fn test_div_by_zero_is_zero() {
        assert_eq!(Fixed::from_int(7) / Fixed::ZERO, Fixed::ZERO);
        assert_eq!(Fixed::from_int(7).div_int(0), Fixed::ZERO);
        assert_eq!(Fixed::from_ratio(1, 0), Fixed::ZERO);
    }

    #[test]
    fn test_floor_negative() {
        assert_eq!(Fixed::from_ratio(-1, 2).floor(), -1);
        assert_eq!(Fixed::from_ratio(5, 2).floor(), 2);
        assert_eq!(Fixed::from_int(-3).floor(), -3);
        assert_eq!(Fixed::from_ratio(-5, 2).ceil(), -2);
        assert_eq!(Fixed::from_ratio(5, 2).round(), 3);
    }

    #[test]
    fn test_sqrt_perfect_squares() {
        for n in [0, 1, 4, 9, 16, 144, 10_000] {
            let root = (n as f64).sqrt() as i32;
            assert_eq!(Fixed::from_int(n).sqrt(), Fixed::from_int(root));
        }
        assert_eq!(Fixed::from_int(-4).sqrt(), Fixed::ZERO);
    }

    #[test]
    fn test_sqrt_two() {
        let root = Fixed::TWO.sqrt().to_f64();
        assert!((root - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_countdown_saturates() {
        let t = Fixed::from_ratio(1, 10);
        assert_eq!(t.countdown(Fixed::ONE), Fixed::ZERO);
        assert_eq!(Fixed::ONE.countdown(Fixed::HALF), Fixed::HALF);
    }

    #[test]
    fn test_sin_cos_cardinals() {
        assert_eq!(sin_bam(0), Fixed::ZERO);
        assert_eq!(sin_bam(64), Fixed::ONE);
        assert_eq!(sin_bam(128), Fixed::ZERO);
        assert_eq!(sin_bam(192), -Fixed::ONE);
        assert_eq!(cos_bam(0), Fixed::ONE);
        assert_eq!(cos_bam(128), -Fixed::ONE);
    }

    #[test]
    fn test_atan2_cardinals() {
        let one = Fixed::ONE;
        assert_eq!(atan2_bam(Fixed::ZERO, one), 0);
        assert_eq!(atan2_bam(one, Fixed::ZERO), 64);
        assert_eq!(atan2_bam(Fixed::ZERO, -one), 128);
        assert_eq!(atan2_bam(-one, Fixed::ZERO), 192);
        assert_eq!(atan2_bam(one, one), 32);
        assert_eq!(atan2_bam(Fixed::ZERO, Fixed::ZERO), 0);
    }

    #[test]
    fn test_degrees_to_bam() {
        assert_eq!(degrees_to_bam(90), 64);
        assert_eq!(degrees_to_bam(-90), 192);
        assert_eq!(degrees_to_bam(360), 0);
    }

    #[test]
    fn test_float_serde_adapter() {
        #[derive(Serialize, Deserialize)]
        struct Knob {
            #[serde(with = "as_float")]
            value: Fixed,
        }
        let knob: Knob = serde_json::from_str(r#"{"value": 1.25}"#).unwrap();
        assert_eq!(knob.value, Fixed::from_ratio(5, 4));
        let knob: Knob = serde_json::from_str(r#"{"value": 3}"#).unwrap();
        assert_eq!(knob.value, Fixed::from_int(3));
    }

    proptest! {
        #[test]
        fn prop_raw_serde_is_bit_identical(raw in any::<i64>()) {
            let value = Fixed::from_raw(raw);
            let json = serde_json::to_string(&value).unwrap();
            let back: Fixed = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.raw(), raw);
        }

        #[test]
        fn prop_sqrt_squares_back(n in 0i32..1_000_000) {
            let x = Fixed::from_int(n);
            let r = x.sqrt();
            // floor root: r^2 <= x < (r + eps)^2
            prop_assert!(r * r <= x);
            let next = r + Fixed::EPSILON;
            prop_assert!((next.raw() as i128 * next.raw() as i128) >> FRAC_BITS >= x.raw() as i128);
        }

        #[test]
        fn prop_floor_matches_float(raw in -(1i64 << 50)..(1i64 << 50)) {
            let value = Fixed::from_raw(raw);
            prop_assert_eq!(value.floor() as f64, value.to_f64().floor());
        }

        #[test]
        fn prop_sin_cos_unit_length(angle in any::<u8>()) {
            let s = sin_bam(angle).to_f64();
            let c = cos_bam(angle).to_f64();
            prop_assert!((s * s + c * c - 1.0).abs() < 1e-3);
        }
    }
}
