//! Map-bounds and wall reflection for footprint-carrying movers

use crate::sim::components::Kinetic;
use crate::sim::fixed::Fixed;

/// Cell extents of a composite around its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footprint {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Footprint {
    pub fn from_offsets(offsets: &[(i32, i32)]) -> Self {
        let mut fp = Self::default();
        for &(dx, dy) in offsets {
            fp.min_x = fp.min_x.min(dx);
            fp.max_x = fp.max_x.max(dx);
            fp.min_y = fp.min_y.min(dy);
            fp.max_y = fp.max_y.max(dy);
        }
        fp
    }

    /// Anchor range `[lo, hi]` on one axis that keeps every cell inside `0..size`
    fn anchor_range(min: i32, max: i32, size: i32) -> (Fixed, Fixed) {
        let lo = Fixed::from_int(-min);
        let hi = Fixed::from_int(size - max) - Fixed::EPSILON;
        (lo, hi.max(lo))
    }
}

/// Clamp the anchor so the footprint stays on the map; the velocity axis
/// that hit the edge is reflected and scaled by `restitution`.
/// Returns true if any axis bounced.
pub fn reflect_in_bounds(
    kinetic: &mut Kinetic,
    footprint: &Footprint,
    width: i32,
    height: i32,
    restitution: Fixed,
) -> bool {
    let mut bounced = false;

    let (lo, hi) = Footprint::anchor_range(footprint.min_x, footprint.max_x, width);
    if kinetic.pos.x < lo {
        kinetic.pos.x = lo;
        if kinetic.vel.x.is_negative() {
            kinetic.vel = kinetic.vel.reflect_x(restitution);
        }
        bounced = true;
    } else if kinetic.pos.x > hi {
        kinetic.pos.x = hi;
        if kinetic.vel.x.is_positive() {
            kinetic.vel = kinetic.vel.reflect_x(restitution);
        }
        bounced = true;
    }

    let (lo, hi) = Footprint::anchor_range(footprint.min_y, footprint.max_y, height);
    if kinetic.pos.y < lo {
        kinetic.pos.y = lo;
        if kinetic.vel.y.is_negative() {
            kinetic.vel = kinetic.vel.reflect_y(restitution);
        }
        bounced = true;
    } else if kinetic.pos.y > hi {
        kinetic.pos.y = hi;
        if kinetic.vel.y.is_positive() {
            kinetic.vel = kinetic.vel.reflect_y(restitution);
        }
        bounced = true;
    }

    bounced
}

/// Integrate one axis at a time. If the anchor would enter a cell for which
/// `blocked` is true, that axis is reverted and its velocity reflected.
/// Returns true on any wall bounce.
pub fn step_with_walls(
    kinetic: &mut Kinetic,
    dt: Fixed,
    restitution: Fixed,
    blocked: impl Fn(i32, i32) -> bool,
) -> bool {
    let mut bounced = false;
    let (gx, gy) = kinetic.grid();

    let prev_x = kinetic.pos.x;
    kinetic.pos.x += kinetic.vel.x * dt;
    let nx = kinetic.pos.x.floor();
    if nx != gx && blocked(nx, gy) {
        kinetic.pos.x = prev_x;
        kinetic.vel = kinetic.vel.reflect_x(restitution);
        bounced = true;
    }

    let cx = kinetic.pos.x.floor();
    let prev_y = kinetic.pos.y;
    kinetic.pos.y += kinetic.vel.y * dt;
    let ny = kinetic.pos.y.floor();
    if ny != gy && blocked(cx, ny) {
        kinetic.pos.y = prev_y;
        kinetic.vel = kinetic.vel.reflect_y(restitution);
        bounced = true;
    }

    bounced
}
