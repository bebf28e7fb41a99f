//! 3D gravitational orbit integration
//!
//! Bodies attract pairwise (softened inverse square), repel linearly inside
//! a short radius, and are pulled gently toward a shared centre. Velocity
//! is damped and clamped every step before the position update.

use serde::{Deserialize, Serialize};

use crate::sim::fixed::{Fixed, as_float};
use crate::sim::vector::Vec3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Body3 {
    pub pos: Vec3F,
    pub vel: Vec3F,
    pub mass: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    #[serde(with = "as_float")]
    pub gravity: Fixed,
    #[serde(with = "as_float")]
    pub repulsion: Fixed,
    #[serde(with = "as_float")]
    pub repulsion_radius: Fixed,
    /// Spring constant toward the orbit centre
    #[serde(with = "as_float")]
    pub center_pull: Fixed,
    /// Fraction of velocity removed per second
    #[serde(with = "as_float")]
    pub damping: Fixed,
    #[serde(with = "as_float")]
    pub max_speed: Fixed,
    /// Added to r^2 so close passes stay finite
    #[serde(with = "as_float")]
    pub softening: Fixed,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            gravity: Fixed::from_int(60),
            repulsion: Fixed::from_int(40),
            repulsion_radius: Fixed::from_int(8),
            center_pull: Fixed::from_ratio(1, 2),
            damping: Fixed::from_ratio(1, 10),
            max_speed: Fixed::from_int(14),
            softening: Fixed::from_int(4),
        }
    }
}

/// Acceleration on body `i` from every other body and the centre pull
fn acceleration(bodies: &[Body3], i: usize, center: Vec3F, params: &OrbitParams) -> Vec3F {
    let me = bodies[i];
    let mut acc = (center - me.pos) * params.center_pull;
    for (j, other) in bodies.iter().enumerate() {
        if j == i {
            continue;
        }
        let delta = other.pos - me.pos;
        let r2 = delta.length_squared() + params.softening;
        let r = r2.sqrt();
        let dir = delta.normalize();
        acc += dir * (params.gravity * other.mass / r2);
        if r < params.repulsion_radius && params.repulsion_radius.is_positive() {
            let strength = params.repulsion * (params.repulsion_radius - r) / params.repulsion_radius;
            acc -= dir * strength;
        }
    }
    acc
}

/// One integration step for all bodies. Accelerations are computed from the
/// positions at the start of the step so body order does not matter.
pub fn integrate_orbits(bodies: &mut [Body3], center: Vec3F, params: &OrbitParams, dt: Fixed) {
    let accels: Vec<Vec3F> = (0..bodies.len())
        .map(|i| acceleration(bodies, i, center, params))
        .collect();
    let keep = (Fixed::ONE - params.damping * dt).max(Fixed::ZERO);
    for (body, acc) in bodies.iter_mut().zip(accels) {
        body.vel += acc * dt;
        body.vel = (body.vel * keep).clamp_length(params.max_speed);
        body.pos += body.vel * dt;
    }
}

/// Keep `z` inside `[z_min, z_max]`, reflecting Z velocity. Returns true on a bounce.
pub fn reflect_depth(body: &mut Body3, z_min: Fixed, z_max: Fixed, restitution: Fixed) -> bool {
    if body.pos.z < z_min {
        body.pos.z = z_min;
        if body.vel.z.is_negative() {
            body.vel.z = -body.vel.z * restitution;
        }
        true
    } else if body.pos.z > z_max {
        body.pos.z = z_max;
        if body.vel.z.is_positive() {
            body.vel.z = -body.vel.z * restitution;
        }
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_int(n)
    }

    fn body(x: i32, y: i32, z: i32) -> Body3 {
        Body3 {
            pos: Vec3F::new(fx(x), fx(y), fx(z)),
            vel: Vec3F::ZERO,
            mass: Fixed::ONE,
        }
    }

    #[test]
    fn test_distant_bodies_attract() {
        let params = OrbitParams {
            center_pull: Fixed::ZERO,
            ..OrbitParams::default()
        };
        let mut bodies = [body(0, 0, 0), body(30, 0, 0)];
        integrate_orbits(&mut bodies, Vec3F::ZERO, &params, Fixed::from_ratio(1, 60));
        assert!(bodies[0].vel.x.is_positive());
        assert!(bodies[1].vel.x.is_negative());
    }

    #[test]
    fn test_close_bodies_repel() {
        let params = OrbitParams {
            gravity: Fixed::ZERO,
            center_pull: Fixed::ZERO,
            ..OrbitParams::default()
        };
        let mut bodies = [body(0, 0, 0), body(2, 0, 0)];
        integrate_orbits(&mut bodies, Vec3F::ZERO, &params, Fixed::from_ratio(1, 60));
        assert!(bodies[0].vel.x.is_negative());
        assert!(bodies[1].vel.x.is_positive());
    }

    #[test]
    fn test_symmetric_system_keeps_momentum_balanced() {
        let params = OrbitParams::default();
        let mut bodies = [body(-10, 0, 5), body(10, 0, 5)];
        let center = Vec3F::new(fx(0), fx(0), fx(5));
        for _ in 0..60 {
            integrate_orbits(&mut bodies, center, &params, Fixed::from_ratio(1, 60));
        }
        let drift = (bodies[0].pos.x + bodies[1].pos.x).abs().to_f64();
        assert!(drift < 1e-6, "drift {drift}");
        assert!(bodies[0].pos.x > fx(-10));
    }

    #[test]
    fn test_speed_clamped() {
        let params = OrbitParams {
            max_speed: fx(3),
            ..OrbitParams::default()
        };
        let mut bodies = [body(0, 0, 0)];
        bodies[0].vel = Vec3F::new(fx(50), fx(0), fx(0));
        integrate_orbits(&mut bodies, Vec3F::ZERO, &params, Fixed::from_ratio(1, 60));
        assert!(bodies[0].vel.length() <= fx(3));
    }

    #[test]
    fn test_reflect_depth() {
        let mut b = body(0, 0, 12);
        b.vel.z = fx(4);
        assert!(reflect_depth(&mut b, fx(0), fx(10), Fixed::HALF));
        assert_eq!(b.pos.z, fx(10));
        assert_eq!(b.vel.z, fx(-2));
        assert!(!reflect_depth(&mut b, fx(0), fx(10), Fixed::HALF));
    }
}
