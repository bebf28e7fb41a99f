//! Entity arena, component stores and the spatial index
//!
//! Entities are generational indices into a dense arena with a free list.
//! Components live in per-type stores indexed by the entity slot, so
//! iteration is always in ascending slot order. Membership between
//! composite members and their header is a back-reference (`Member::header`)
//! plus an ordered entry list on the header; nothing owns anything else.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::boss::BossKind;
use super::boss::quasar::QuasarState;
use super::boss::storm::{CircleState, StormState};
use super::boss::swarm::SwarmState;
use super::components::{Combat, EntityKind, GridPos, Header, Member, Protection};
use super::walls::WallGrid;

/// Opaque entity identifier: generation in the high 32 bits, slot index in
/// the low 32. Generations start at 1, so the raw value 0 is never a live
/// entity and doubles as "no entity".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(u64);

impl Entity {
    pub const NONE: Self = Self(0);

    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index(), self.generation())
    }
}

/// Dense slot allocator with LIFO slot reuse
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
}

impl Arena {
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return Entity::new(index, self.generations[slot]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(1);
        self.alive.push(true);
        Entity::new(index, 1)
    }

    /// Release a slot; returns false for stale or unknown handles
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index() as usize;
        self.alive[slot] = false;
        let next = self.generations[slot].wrapping_add(1);
        self.generations[slot] = if next == 0 { 1 } else { next };
        self.free.push(entity.index());
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_none() {
            return false;
        }
        let slot = entity.index() as usize;
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == entity.generation()
    }

    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Live entities in ascending slot order
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Entity::new(i as u32, self.generations[i]))
    }
}

/// Sparse-by-slot component storage tagged with the owning generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store<T> {
    slots: Vec<Option<(u32, T)>>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Store<T> {
    pub fn insert(&mut self, entity: Entity, value: T) {
        let slot = entity.index() as usize;
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some((entity.generation(), value));
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        match self.slots.get(entity.index() as usize) {
            Some(Some((generation, value))) if *generation == entity.generation() => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        match self.slots.get_mut(entity.index() as usize) {
            Some(Some((generation, value))) if *generation == entity.generation() => Some(value),
            _ => None,
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slots.get_mut(entity.index() as usize)?;
        if slot
            .as_ref()
            .is_some_and(|(generation, _)| *generation == entity.generation())
        {
            slot.take().map(|(_, value)| value)
        } else {
            None
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .map(|(generation, value)| (Entity::new(i as u32, *generation), value))
        })
    }

    /// Snapshot of the keys, for loops that mutate the store while walking it
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().map(|(e, _)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Cell-keyed multi-occupancy index. Each cell's list is kept sorted by
/// slot index so a rebuilt index scans identically to the original.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    cells: HashMap<(i32, i32), Vec<Entity>>,
}

impl SpatialIndex {
    pub fn insert(&mut self, cell: (i32, i32), entity: Entity) {
        let list = self.cells.entry(cell).or_default();
        if let Err(at) = list.binary_search_by_key(&entity.index(), |e| e.index()) {
            list.insert(at, entity);
        }
    }

    pub fn remove(&mut self, cell: (i32, i32), entity: Entity) {
        if let Some(list) = self.cells.get_mut(&cell) {
            list.retain(|e| *e != entity);
            if list.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    pub fn at(&self, cell: (i32, i32)) -> &[Entity] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// All entities and components of one encounter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    arena: Arena,
    pub positions: Store<GridPos>,
    pub kinds: Store<EntityKind>,
    pub combats: Store<Combat>,
    pub headers: Store<Header>,
    pub members: Store<Member>,
    pub protections: Store<Protection>,
    pub quasars: Store<QuasarState>,
    pub swarms: Store<SwarmState>,
    pub storms: Store<StormState>,
    pub circles: Store<CircleState>,
    pub walls: WallGrid,
    /// Live boss headers in spawn order. Not touched by `despawn`, so a
    /// header removed from outside can still be found and cleaned up.
    pub roster: Vec<(Entity, BossKind)>,
    /// Derived from `positions`; rebuilt after deserialization
    #[serde(skip)]
    index: SpatialIndex,
}

impl World {
    pub fn new(walls: WallGrid) -> Self {
        Self {
            walls,
            ..Self::default()
        }
    }

    pub fn spawn(&mut self, kind: EntityKind) -> Entity {
        let entity = self.arena.allocate();
        self.kinds.insert(entity, kind);
        entity
    }

    /// Remove an entity and every component it carries.
    /// Does not touch composite links; see `composite::destroy_composite`.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.arena.is_alive(entity) {
            return false;
        }
        if let Some(pos) = self.positions.remove(entity) {
            self.index.remove(pos.cell(), entity);
        }
        self.kinds.remove(entity);
        self.combats.remove(entity);
        self.headers.remove(entity);
        self.members.remove(entity);
        self.protections.remove(entity);
        self.quasars.remove(entity);
        self.swarms.remove(entity);
        self.storms.remove(entity);
        self.circles.remove(entity);
        self.arena.free(entity)
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.arena.is_alive(entity)
    }

    pub fn kind(&self, entity: Entity) -> Option<EntityKind> {
        self.kinds.get(entity).copied()
    }

    pub fn position(&self, entity: Entity) -> Option<GridPos> {
        self.positions.get(entity).copied()
    }

    /// Place or move an entity, keeping the spatial index in sync
    pub fn set_position(&mut self, entity: Entity, x: i32, y: i32) {
        if !self.arena.is_alive(entity) {
            return;
        }
        let next = GridPos::new(x, y);
        if let Some(prev) = self.positions.get(entity).copied() {
            if prev == next {
                return;
            }
            self.index.remove(prev.cell(), entity);
        }
        self.positions.insert(entity, next);
        self.index.insert(next.cell(), entity);
    }

    pub fn entities_at(&self, x: i32, y: i32) -> &[Entity] {
        self.index.at((x, y))
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.walls.in_bounds(x, y)
    }

    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (entity, pos) in self.positions.iter() {
            self.index.insert(pos.cell(), entity);
        }
    }

    pub fn live_count(&self) -> usize {
        self.arena.live_count()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.arena.iter()
    }

    /// Drop every entity, keeping the wall layout
    pub fn clear(&mut self) {
        let walls = std::mem::take(&mut self.walls);
        *self = Self::new(walls);
    }
}
