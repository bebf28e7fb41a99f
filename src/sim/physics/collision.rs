//! Collision detection and impulse response
//!
//! Soft collisions push overlapping bosses apart with a mass-ratio impulse
//! and leave the pushed side briefly immune. Hard collisions between Storm
//! circles separate positionally and then exchange a 3D elastic impulse.

use crate::sim::fixed::Fixed;
use crate::sim::vector::{Ellipse, Vec2F};

use super::orbit::Body3;

/// Result of an overlap check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionResult {
    pub hit: bool,
    /// Unit vector from `b` toward `a`
    pub normal: Vec2F,
    /// Overlap depth in the combined ellipse's normalized space (0..1)
    pub penetration: Fixed,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2F::ZERO,
            penetration: Fixed::ZERO,
        }
    }
}

/// Overlap of two axis-aligned ellipses via their summed radii
pub fn ellipse_overlap(a_center: Vec2F, a: &Ellipse, b_center: Vec2F, b: &Ellipse) -> CollisionResult {
    let combined = Ellipse::new(a.rx() + b.rx(), a.ry() + b.ry());
    let offset = a_center - b_center;
    let nd2 = combined.normalized_distance_squared(offset);
    if nd2 >= Fixed::ONE {
        return CollisionResult::miss();
    }
    CollisionResult {
        hit: true,
        normal: offset.normalize(),
        penetration: Fixed::ONE - nd2.sqrt(),
    }
}

/// One side of a soft collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftCollider {
    pub center: Vec2F,
    pub extent: Ellipse,
    pub mass: Fixed,
    /// False while enraged or inside a kinetic immunity window
    pub accepts_impulse: bool,
}

/// Velocity changes `(for_a, for_b)` for two overlapping colliders, or
/// `None` when they do not overlap or neither side accepts an impulse.
/// Each side is pushed in proportion to the other's share of the total mass.
pub fn soft_collision(a: &SoftCollider, b: &SoftCollider, strength: Fixed) -> Option<(Vec2F, Vec2F)> {
    if !a.accepts_impulse && !b.accepts_impulse {
        return None;
    }
    let result = ellipse_overlap(a.center, &a.extent, b.center, &b.extent);
    if !result.hit {
        return None;
    }
    let total = a.mass + b.mass;
    if !total.is_positive() {
        return None;
    }
    let push = strength * (Fixed::ONE + result.penetration);
    let for_a = if a.accepts_impulse {
        result.normal * (push * b.mass.mul_int(2) / total)
    } else {
        Vec2F::ZERO
    };
    let for_b = if b.accepts_impulse {
        -result.normal * (push * a.mass.mul_int(2) / total)
    } else {
        Vec2F::ZERO
    };
    Some((for_a, for_b))
}

/// Velocity reflected about a surface normal: `v - 2(v.n)n`
pub fn reflect_velocity(velocity: Vec2F, normal: Vec2F) -> Vec2F {
    velocity - normal * velocity.dot(normal).mul_int(2)
}

/// Separate two spheres of equal `radius` and apply an elastic impulse.
/// Returns true if they were touching.
pub fn resolve_elastic_3d(a: &mut Body3, b: &mut Body3, radius: Fixed, restitution: Fixed) -> bool {
    let delta = b.pos - a.pos;
    let min_dist = radius.mul_int(2);
    if delta.length_squared() >= min_dist * min_dist {
        return false;
    }
    let total = a.mass + b.mass;
    if !total.is_positive() {
        return false;
    }
    let dist = delta.length();
    let normal = delta.normalize();
    let overlap = min_dist - dist;

    a.pos -= normal * (overlap * b.mass / total);
    b.pos += normal * (overlap * a.mass / total);

    let closing = (b.vel - a.vel).dot(normal);
    if closing.is_negative() {
        let inv_a = a.mass.recip();
        let inv_b = b.mass.recip();
        let j = -(Fixed::ONE + restitution) * closing / (inv_a + inv_b);
        a.vel -= normal * (j * inv_a);
        b.vel += normal * (j * inv_b);
    }
    true
}
