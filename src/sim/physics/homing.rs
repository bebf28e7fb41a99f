//! Homing with arrival steering
//!
//! Accelerate toward a target, ramp drag up from 1x to 4x inside the
//! arrival radius, and report "settled" once both distance and speed are
//! under threshold. Settled entities are snapped exactly onto the target.

use serde::{Deserialize, Serialize};

use crate::sim::components::Kinetic;
use crate::sim::fixed::{Fixed, as_float};
use crate::sim::vector::Vec2F;

/// Drag multiplier reached at zero distance
const MAX_ARRIVAL_DRAG: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingProfile {
    /// Cells per second squared
    #[serde(with = "as_float")]
    pub acceleration: Fixed,
    /// Cells per second
    #[serde(with = "as_float")]
    pub max_speed: Fixed,
    /// Fraction of velocity removed per second at 1x drag
    #[serde(with = "as_float")]
    pub drag: Fixed,
    #[serde(with = "as_float")]
    pub arrival_radius: Fixed,
    #[serde(with = "as_float")]
    pub dead_zone: Fixed,
    #[serde(with = "as_float")]
    pub settle_speed: Fixed,
}

impl Default for HomingProfile {
    fn default() -> Self {
        Self {
            acceleration: Fixed::from_int(40),
            max_speed: Fixed::from_int(12),
            drag: Fixed::from_int(2),
            arrival_radius: Fixed::from_int(6),
            dead_zone: Fixed::from_ratio(1, 2),
            settle_speed: Fixed::from_int(2),
        }
    }
}

impl HomingProfile {
    /// Drag multiplier for a given distance to target
    pub fn drag_multiplier(&self, distance: Fixed) -> Fixed {
        if !self.arrival_radius.is_positive() || distance >= self.arrival_radius {
            return Fixed::ONE;
        }
        let closeness = Fixed::ONE - distance / self.arrival_radius;
        Fixed::ONE + closeness.mul_int(MAX_ARRIVAL_DRAG - 1)
    }

    pub fn settled(&self, kinetic: &Kinetic, target: Vec2F) -> bool {
        (target - kinetic.pos).length() <= self.dead_zone && kinetic.vel.length() <= self.settle_speed
    }
}

/// Home directly toward `target`. Returns true once settled.
pub fn apply_homing(kinetic: &mut Kinetic, target: Vec2F, profile: &HomingProfile, dt: Fixed) -> bool {
    apply_homing_scaled(kinetic, target, profile, Fixed::ONE, true, dt)
}

/// Homing with a speed multiplier. `apply_drag = false` suppresses damping
/// for callers steering along an indirect path.
pub fn apply_homing_scaled(
    kinetic: &mut Kinetic,
    target: Vec2F,
    profile: &HomingProfile,
    speed_mult: Fixed,
    apply_drag: bool,
    dt: Fixed,
) -> bool {
    if profile.settled(kinetic, target) {
        kinetic.snap_to(target);
        return true;
    }
    steer_toward(kinetic, target, profile, speed_mult, apply_drag, dt);
    kinetic.integrate(dt);

    if profile.settled(kinetic, target) {
        kinetic.snap_to(target);
        return true;
    }
    false
}

/// Velocity half of homing; the caller integrates (e.g. against walls)
pub fn steer_toward(
    kinetic: &mut Kinetic,
    target: Vec2F,
    profile: &HomingProfile,
    speed_mult: Fixed,
    apply_drag: bool,
    dt: Fixed,
) {
    let to_target = target - kinetic.pos;
    let distance = to_target.length();
    let dir = to_target.normalize_or(Vec2F::ZERO);
    kinetic.vel += dir * (profile.acceleration * speed_mult * dt);

    if apply_drag {
        let damping = profile.drag * profile.drag_multiplier(distance) * dt;
        let keep = (Fixed::ONE - damping).max(Fixed::ZERO);
        kinetic.vel *= keep;
    }
    kinetic.vel = kinetic.vel.clamp_length(profile.max_speed * speed_mult);
}
