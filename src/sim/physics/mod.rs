//! Fixed-point physics primitives shared by the boss systems

pub mod boundary;
pub mod collision;
pub mod flocking;
pub mod homing;
pub mod orbit;

pub use boundary::{Footprint, reflect_in_bounds, step_with_walls};
pub use collision::{CollisionResult, SoftCollider, ellipse_overlap, resolve_elastic_3d, soft_collision};
pub use flocking::{Neighbor, separation_force};
pub use homing::{HomingProfile, apply_homing, apply_homing_scaled, steer_toward};
pub use orbit::{Body3, OrbitParams, integrate_orbits, reflect_depth};
