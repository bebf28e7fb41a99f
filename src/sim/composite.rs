//! Composite entities: a header plus ordered member cells
//!
//! Spawning validates the whole footprint first, falls back to a bounded
//! spiral search, and commits through a `SpawnBatch` that rolls every
//! created entity back if it is dropped uncommitted. This module is the
//! only place that removes a header together with its members.

use log::debug;

use super::components::{Combat, EntityKind, Header, HeaderKind, Member, MemberEntry, Protection};
use super::events::{EventQueue, GameEvent};
use super::walls::{WallGrid, mask};
use super::world::{Entity, World};
use crate::error::SpawnError;

/// One member cell of a blueprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberSpec {
    pub offset_x: i32,
    pub offset_y: i32,
    /// Own hit points (ablative composites)
    pub hp: Option<i32>,
    pub pattern: u8,
}

impl MemberSpec {
    pub const fn cell(offset_x: i32, offset_y: i32) -> Self {
        Self {
            offset_x,
            offset_y,
            hp: None,
            pattern: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeBlueprint {
    pub header_kind: HeaderKind,
    pub entity_kind: EntityKind,
    /// Hit pool on the header (unit composites)
    pub header_hp: Option<i32>,
    pub members: Vec<MemberSpec>,
}

impl CompositeBlueprint {
    /// Unit composite: one shared hit pool, members are hitbox cells
    pub fn unit(entity_kind: EntityKind, hp: i32, offsets: &[(i32, i32)]) -> Self {
        Self {
            header_kind: HeaderKind::Unit,
            entity_kind,
            header_hp: Some(hp),
            members: offsets.iter().map(|&(x, y)| MemberSpec::cell(x, y)).collect(),
        }
    }

    /// Ablative composite: every member carries `member_hp`
    pub fn ablative(entity_kind: EntityKind, member_hp: i32, offsets: &[(i32, i32)]) -> Self {
        Self {
            header_kind: HeaderKind::Ablative,
            entity_kind,
            header_hp: None,
            members: offsets
                .iter()
                .map(|&(x, y)| MemberSpec {
                    hp: Some(member_hp),
                    ..MemberSpec::cell(x, y)
                })
                .collect(),
        }
    }

    pub fn footprint(&self) -> Vec<(i32, i32)> {
        self.members.iter().map(|m| (m.offset_x, m.offset_y)).collect()
    }
}

/// Entities created during a multi-step spawn. Dropping the batch without
/// calling `commit` despawns all of them in reverse order.
pub struct SpawnBatch<'w> {
    world: &'w mut World,
    created: Vec<Entity>,
    committed: bool,
}

impl<'w> SpawnBatch<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            created: Vec::new(),
            committed: false,
        }
    }

    pub fn spawn(&mut self, kind: EntityKind) -> Entity {
        let entity = self.world.spawn(kind);
        self.created.push(entity);
        entity
    }

    pub fn world(&mut self) -> &mut World {
        &mut *self.world
    }

    pub fn created(&self) -> &[Entity] {
        &self.created
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SpawnBatch<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        debug!("rolling back spawn batch of {} entities", self.created.len());
        for entity in self.created.drain(..).rev() {
            self.world.despawn(entity);
        }
    }
}

/// Anchor where the footprint fits: the requested cell if valid, otherwise
/// the nearest spiral-searched free area.
pub fn resolve_spawn_site(
    walls: &WallGrid,
    x: i32,
    y: i32,
    footprint: &[(i32, i32)],
    search_radius: i32,
) -> Result<(i32, i32), SpawnError> {
    if footprint.is_empty() {
        return Err(SpawnError::EmptyFootprint);
    }
    if walls.footprint_fits(x, y, footprint, mask::ENEMY) {
        return Ok((x, y));
    }
    match walls.find_free_area_spiral(x, y, footprint, mask::ENEMY, search_radius) {
        Some(site) => Ok(site),
        None if !walls.in_bounds(x, y) => Err(SpawnError::OutOfBounds { x, y }),
        None => Err(SpawnError::NoFreeArea {
            x,
            y,
            radius: search_radius,
        }),
    }
}

/// Create header and members at an already validated anchor
pub fn spawn_composite_in(
    batch: &mut SpawnBatch<'_>,
    blueprint: &CompositeBlueprint,
    x: i32,
    y: i32,
) -> Entity {
    let header = batch.spawn(blueprint.entity_kind);
    let mut entries = Vec::with_capacity(blueprint.members.len());
    for spec in &blueprint.members {
        let member = batch.spawn(EntityKind::Member);
        let world = batch.world();
        world.set_position(member, x + spec.offset_x, y + spec.offset_y);
        world.members.insert(
            member,
            Member {
                header,
                pattern: spec.pattern,
            },
        );
        world.protections.insert(member, Protection::default());
        if let Some(hp) = spec.hp {
            world.combats.insert(member, Combat::new(header, hp));
        }
        entries.push(MemberEntry {
            entity: member,
            offset_x: spec.offset_x,
            offset_y: spec.offset_y,
        });
    }

    let world = batch.world();
    world.set_position(header, x, y);
    world.protections.insert(header, Protection::default());
    if let Some(hp) = blueprint.header_hp {
        world.combats.insert(header, Combat::new(header, hp));
    }
    world.headers.insert(
        header,
        Header {
            kind: blueprint.header_kind,
            members: entries,
            parent: Entity::NONE,
        },
    );
    header
}

/// Validate the site and spawn a whole composite, or nothing at all
pub fn spawn_composite(
    world: &mut World,
    blueprint: &CompositeBlueprint,
    x: i32,
    y: i32,
    search_radius: i32,
) -> Result<Entity, SpawnError> {
    let (sx, sy) = resolve_spawn_site(&world.walls, x, y, &blueprint.footprint(), search_radius)?;
    let mut batch = SpawnBatch::new(world);
    let header = spawn_composite_in(&mut batch, blueprint, sx, sy);
    batch.commit();
    Ok(header)
}

/// Single-cell combat entity (drains, simple enemies)
pub fn spawn_single(world: &mut World, kind: EntityKind, x: i32, y: i32, hp: i32) -> Entity {
    let entity = world.spawn(kind);
    world.set_position(entity, x, y);
    world.combats.insert(entity, Combat::new(entity, hp));
    entity
}

/// Logical container header with no cells of its own
pub fn spawn_container_in(batch: &mut SpawnBatch<'_>, kind: EntityKind, x: i32, y: i32) -> Entity {
    let header = batch.spawn(kind);
    let world = batch.world();
    world.set_position(header, x, y);
    world.headers.insert(header, Header::new(HeaderKind::Container));
    header
}

/// Register `child` (itself a header) as a member of `parent`
pub fn attach_child(world: &mut World, parent: Entity, child: Entity) {
    let (Some(p), Some(c)) = (world.position(parent), world.position(child)) else {
        return;
    };
    if let Some(child_header) = world.headers.get_mut(child) {
        child_header.parent = parent;
    }
    if let Some(header) = world.headers.get_mut(parent) {
        header.members.push(MemberEntry {
            entity: child,
            offset_x: c.x - p.x,
            offset_y: c.y - p.y,
        });
    }
}

/// A member counts as living while it exists and, if it has its own hit
/// points, they are above zero.
fn member_alive(world: &World, entity: Entity) -> bool {
    world.is_alive(entity) && world.combats.get(entity).is_none_or(Combat::is_alive)
}

pub fn living_members(world: &World, header: Entity) -> usize {
    world.headers.get(header).map_or(0, |h| {
        h.members
            .iter()
            .filter(|m| member_alive(world, m.entity))
            .count()
    })
}

/// Drop entries whose entity no longer exists; returns the remaining count
pub fn prune_members(world: &mut World, header: Entity) -> usize {
    let alive: Vec<bool> = match world.headers.get(header) {
        Some(h) => h.members.iter().map(|m| world.is_alive(m.entity)).collect(),
        None => return 0,
    };
    let Some(h) = world.headers.get_mut(header) else {
        return 0;
    };
    let mut flags = alive.into_iter();
    h.members.retain(|_| flags.next().unwrap_or(false));
    h.members.len()
}

/// Re-place every member at header position + offset
pub fn sync_members(world: &mut World, header: Entity) {
    let Some(anchor) = world.position(header) else {
        return;
    };
    let entries = match world.headers.get(header) {
        Some(h) if h.kind != HeaderKind::Container => h.members.clone(),
        _ => return,
    };
    for entry in entries {
        world.set_position(entry.entity, anchor.x + entry.offset_x, anchor.y + entry.offset_y);
    }
}

/// Move a composite's header to a cell and drag its members along
pub fn move_composite(world: &mut World, header: Entity, x: i32, y: i32) {
    world.set_position(header, x, y);
    sync_members(world, header);
}

/// Death test per header kind. Ablative: no living member. Unit: header
/// pool at zero. Container: every child composite is dead or gone.
pub fn is_composite_dead(world: &World, header: Entity) -> bool {
    let Some(h) = world.headers.get(header) else {
        return !world.is_alive(header);
    };
    match h.kind {
        HeaderKind::Ablative => living_members(world, header) == 0,
        HeaderKind::Unit => world.combats.get(header).is_some_and(|c| !c.is_alive()),
        HeaderKind::Container => h
            .members
            .iter()
            .all(|m| !world.is_alive(m.entity) || is_composite_dead(world, m.entity)),
    }
}

/// Remove one member cell from its composite
pub fn destroy_member(world: &mut World, member: Entity, events: &mut EventQueue<GameEvent>) {
    let Some(header) = world.members.get(member).map(|m| m.header) else {
        world.despawn(member);
        return;
    };
    if let Some(h) = world.headers.get_mut(header) {
        h.members.retain(|m| m.entity != member);
    }
    if world.despawn(member) {
        events.push(GameEvent::MemberDestroyed { header, member });
    }
}

/// Remove a header, every member, and any child composites.
/// Returns the number of entities despawned.
pub fn destroy_composite(world: &mut World, header: Entity, events: &mut EventQueue<GameEvent>) -> usize {
    if !world.is_alive(header) {
        return 0;
    }
    let (entries, parent) = match world.headers.get(header) {
        Some(h) => (h.members.clone(), h.parent),
        None => (Vec::new(), Entity::NONE),
    };

    let mut removed = 0;
    for entry in &entries {
        if world.headers.contains(entry.entity) {
            removed += destroy_composite(world, entry.entity, events);
        } else if world.despawn(entry.entity) {
            removed += 1;
        }
    }

    if let Some(p) = world.headers.get_mut(parent) {
        p.members.retain(|m| m.entity != header);
    }
    if world.despawn(header) {
        removed += 1;
    }
    debug!("destroyed composite {header} ({removed} entities)");
    events.push(GameEvent::CompositeDestroyed {
        header,
        members: entries.len(),
    });
    removed
}

/// Result of an integrity check against outside interference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    Intact,
    MembersLost(usize),
    HeaderLost,
}

/// Despawn what a vanished header left behind: child composites parented
/// to it and member cells pointing back at it. Returns the entity count.
pub fn reap_orphans(world: &mut World, header: Entity, events: &mut EventQueue<GameEvent>) -> usize {
    let children: Vec<Entity> = world
        .headers
        .iter()
        .filter(|(_, h)| h.parent == header)
        .map(|(e, _)| e)
        .collect();
    let cells: Vec<Entity> = world
        .members
        .iter()
        .filter(|(_, m)| m.header == header)
        .map(|(e, _)| e)
        .collect();

    let mut removed = 0;
    for child in children {
        removed += destroy_composite(world, child, events);
    }
    for cell in cells {
        if world.despawn(cell) {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("reaped {removed} entities orphaned by {header}");
    }
    removed
}

pub fn check_integrity(world: &World, header: Entity) -> Integrity {
    if !world.is_alive(header) {
        return Integrity::HeaderLost;
    }
    let lost = world.headers.get(header).map_or(0, |h| {
        h.members
            .iter()
            .filter(|m| !world.is_alive(m.entity))
            .count()
    });
    if lost == 0 {
        Integrity::Intact
    } else {
        Integrity::MembersLost(lost)
    }
}
