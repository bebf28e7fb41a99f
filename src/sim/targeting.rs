//! Target resolution
//!
//! Maps whatever occupies a cell to the entity that actually takes the hit,
//! groups area hits by composite, and hands out nearest-N target
//! assignments to the weapon groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::components::{EntityKind, HeaderKind};
use super::composite::is_composite_dead;
use super::vector::Ellipse;
use super::world::{Entity, World};

/// Combat owner (`target`) and the specific cell that was struck (`hit`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetHit {
    pub target: Entity,
    pub hit: Entity,
}

/// Resolve a spatial occupant to its combat-relevant owner.
///
/// - Unit composites: the header takes the hit, the member is the hit cell.
/// - Ablative composites: the header is the target, the living member is hit.
/// - Containers and ablative header cells are never targets.
/// - Plain combat entities resolve to themselves.
///
/// Anything owned by `self_entity` (directly or as its child) is skipped.
pub fn resolve_target_from_entity(world: &World, occupant: Entity, self_entity: Entity) -> Option<TargetHit> {
    if !world.is_alive(occupant) {
        return None;
    }

    let resolved = if let Some(header) = world.headers.get(occupant) {
        match header.kind {
            HeaderKind::Unit if world.combats.contains(occupant) => TargetHit {
                target: occupant,
                hit: occupant,
            },
            _ => return None,
        }
    } else if let Some(member) = world.members.get(occupant) {
        if world
            .protections
            .get(occupant)
            .is_some_and(|p| p.hitbox_disabled)
        {
            return None;
        }
        let header = world.headers.get(member.header)?;
        match header.kind {
            HeaderKind::Unit => TargetHit {
                target: member.header,
                hit: occupant,
            },
            HeaderKind::Ablative => {
                if !world.combats.get(occupant).is_some_and(|c| c.is_alive()) {
                    return None;
                }
                TargetHit {
                    target: member.header,
                    hit: occupant,
                }
            }
            HeaderKind::Container => return None,
        }
    } else if world.combats.contains(occupant) {
        TargetHit {
            target: occupant,
            hit: occupant,
        }
    } else {
        return None;
    };

    if owned_by(world, resolved.target, self_entity) {
        return None;
    }
    Some(resolved)
}

/// Whether `entity` is `owner` or a composite parented to it. Nothing is
/// owned by `Entity::NONE`.
fn owned_by(world: &World, entity: Entity, owner: Entity) -> bool {
    if owner.is_none() {
        return false;
    }
    if entity == owner {
        return true;
    }
    world.headers.get(entity).is_some_and(|h| h.parent == owner)
}

/// All hits belonging to one target inside an area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub target: Entity,
    pub hits: Vec<Entity>,
}

/// Group every resolvable occupant inside the ellipse by its target, in
/// row-major scan order of first appearance.
pub fn find_targets_in_ellipse(
    world: &World,
    cx: i32,
    cy: i32,
    area: &Ellipse,
    self_entity: Entity,
) -> Vec<TargetGroup> {
    let mut groups: Vec<TargetGroup> = Vec::new();
    for (dx, dy) in area.cells() {
        for &occupant in world.entities_at(cx + dx, cy + dy) {
            let Some(th) = resolve_target_from_entity(world, occupant, self_entity) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.target == th.target) {
                Some(group) => {
                    if !group.hits.contains(&th.hit) {
                        group.hits.push(th.hit);
                    }
                }
                None => groups.push(TargetGroup {
                    target: th.target,
                    hits: vec![th.hit],
                }),
            }
        }
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAssignment {
    pub target: Entity,
    pub composite: bool,
    pub x: i32,
    pub y: i32,
}

/// Up to `count` assignments: composites first, then single entities, each
/// sorted by distance (ties by entity). When fewer targets exist than
/// `count`, the list cycles so slot `i` repeats `results[i % len]`.
pub fn find_nearest_targets(world: &World, origin: (i32, i32), count: usize, self_entity: Entity) -> Vec<TargetAssignment> {
    let dist2 = |x: i32, y: i32| {
        let (dx, dy) = ((x - origin.0) as i64, (y - origin.1) as i64);
        dx * dx + dy * dy
    };

    let mut composites: Vec<(i64, TargetAssignment)> = Vec::new();
    for (entity, header) in world.headers.iter() {
        if header.kind == HeaderKind::Container || owned_by(world, entity, self_entity) {
            continue;
        }
        if is_composite_dead(world, entity) {
            continue;
        }
        let Some(pos) = world.position(entity) else {
            continue;
        };
        composites.push((
            dist2(pos.x, pos.y),
            TargetAssignment {
                target: entity,
                composite: true,
                x: pos.x,
                y: pos.y,
            },
        ));
    }

    let mut singles: Vec<(i64, TargetAssignment)> = Vec::new();
    for (entity, combat) in world.combats.iter() {
        if world.headers.contains(entity) || world.members.contains(entity) {
            continue;
        }
        if entity == self_entity || !combat.is_alive() {
            continue;
        }
        let Some(pos) = world.position(entity) else {
            continue;
        };
        singles.push((
            dist2(pos.x, pos.y),
            TargetAssignment {
                target: entity,
                composite: false,
                x: pos.x,
                y: pos.y,
            },
        ));
    }

    composites.sort_by_key(|(d, a)| (*d, a.target));
    singles.sort_by_key(|(d, a)| (*d, a.target));

    let results: Vec<TargetAssignment> = composites
        .into_iter()
        .chain(singles)
        .map(|(_, a)| a)
        .collect();
    if results.is_empty() {
        return results;
    }
    (0..count).map(|i| results[i % results.len()]).collect()
}

/// Cached state of one weapon target group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupState {
    pub valid: bool,
    pub kind: EntityKind,
    pub entity: Entity,
    pub x: i32,
    pub y: i32,
}

/// Group-id keyed target cache, refreshed once per tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroups {
    groups: BTreeMap<u8, TargetGroupState>,
}

impl TargetGroups {
    /// Replace all groups with fresh nearest-target assignments
    pub fn assign(&mut self, world: &World, origin: (i32, i32), count: usize) {
        self.groups.clear();
        let count = count.min(u8::MAX as usize + 1);
        for (i, a) in find_nearest_targets(world, origin, count, Entity::NONE)
            .into_iter()
            .enumerate()
        {
            let kind = world.kind(a.target).unwrap_or(EntityKind::Other);
            self.groups.insert(
                i as u8,
                TargetGroupState {
                    valid: true,
                    kind,
                    entity: a.target,
                    x: a.x,
                    y: a.y,
                },
            );
        }
    }

    /// Follow anchors that moved; invalidate anchors that died
    pub fn refresh(&mut self, world: &World) {
        for state in self.groups.values_mut() {
            if !state.valid {
                continue;
            }
            let dead = if world.headers.contains(state.entity) {
                is_composite_dead(world, state.entity)
            } else {
                !world.combats.get(state.entity).is_some_and(|c| c.is_alive())
            };
            match world.position(state.entity) {
                Some(pos) if world.is_alive(state.entity) && !dead => {
                    state.x = pos.x;
                    state.y = pos.y;
                }
                _ => state.valid = false,
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        for state in self.groups.values_mut() {
            state.valid = false;
        }
    }

    pub fn get(&self, group: u8) -> Option<&TargetGroupState> {
        self.groups.get(&group)
    }

    pub fn valid_count(&self) -> usize {
        self.groups.values().filter(|s| s.valid).count()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
