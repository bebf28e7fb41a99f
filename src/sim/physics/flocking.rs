//! Flocking separation
//!
//! Each neighbour inside the separation ellipse pushes away with a weight
//! of `(max_dist - dist) / max_dist`, measured in the ellipse's normalized
//! space. Neighbours of another species are scaled by a multiplier.

use crate::sim::fixed::Fixed;
use crate::sim::vector::{Ellipse, Vec2F};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub pos: Vec2F,
    pub same_species: bool,
}

/// Accumulated repulsion for an entity at `pos`; add `force * dt` to velocity
pub fn separation_force(
    pos: Vec2F,
    neighbors: &[Neighbor],
    radius: &Ellipse,
    strength: Fixed,
    cross_species_mult: Fixed,
) -> Vec2F {
    let mut total = Vec2F::ZERO;
    for n in neighbors {
        let offset = pos - n.pos;
        let nd2 = radius.normalized_distance_squared(offset);
        if nd2 >= Fixed::ONE {
            continue;
        }
        let mut weight = Fixed::ONE - nd2.sqrt();
        if !n.same_species {
            weight = weight * cross_species_mult;
        }
        total += offset.normalize() * weight;
    }
    total * strength
}
