//! Damage application and cursor/shield contact
//!
//! Damage always goes through a resolved `TargetHit`: unit composites lose
//! header hit points, ablative composites lose the struck member, plain
//! entities die outright at zero. Whole-composite destruction is left to
//! the owning boss system, which notices the death on its next update.

use log::debug;

use super::components::{Combat, Cursor, EntityKind, HeaderKind, Kinetic};
use super::composite::destroy_member;
use super::events::{EventQueue, GameEvent};
use super::fixed::Fixed;
use super::metrics::TickMetrics;
use super::targeting::TargetHit;
use super::vector::Vec2F;
use super::world::{Entity, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    Applied { remaining: i32 },
    /// Damage immunity (protection flag or timer) absorbed the hit
    Immune,
    /// A member cell of an ablative composite was destroyed
    MemberDestroyed,
    /// The target's hit points reached zero
    Killed,
    /// Nothing with hit points was found
    Missed,
}

/// Apply `amount` to a resolved hit, optionally stunning the target
pub fn apply_damage(
    world: &mut World,
    hit: TargetHit,
    amount: i32,
    stun: Fixed,
    events: &mut EventQueue<GameEvent>,
    metrics: &mut TickMetrics,
) -> DamageOutcome {
    if !world.is_alive(hit.target) || !world.is_alive(hit.hit) {
        return DamageOutcome::Missed;
    }
    if world.protections.get(hit.hit).is_some_and(|p| p.damage_immune) {
        return DamageOutcome::Immune;
    }

    let header_kind = world.headers.get(hit.target).map(|h| h.kind);
    match header_kind {
        Some(HeaderKind::Ablative) => {
            let Some(combat) = world.combats.get_mut(hit.hit) else {
                return DamageOutcome::Missed;
            };
            if combat.is_damage_immune() {
                return DamageOutcome::Immune;
            }
            combat.hp -= amount;
            let remaining = combat.hp;
            metrics.damage_dealt += amount as i64;
            events.push(GameEvent::Damaged {
                target: hit.target,
                hit: hit.hit,
                amount,
                remaining,
            });
            if remaining <= 0 {
                destroy_member(world, hit.hit, events);
                return DamageOutcome::MemberDestroyed;
            }
            DamageOutcome::Applied { remaining }
        }
        Some(HeaderKind::Container) => DamageOutcome::Missed,
        Some(HeaderKind::Unit) | None => {
            let Some(combat) = world.combats.get_mut(hit.target) else {
                return DamageOutcome::Missed;
            };
            if combat.is_damage_immune() {
                return DamageOutcome::Immune;
            }
            combat.hp -= amount;
            combat.apply_stun(stun);
            let remaining = combat.hp;
            metrics.damage_dealt += amount as i64;
            events.push(GameEvent::Damaged {
                target: hit.target,
                hit: hit.hit,
                amount,
                remaining,
            });
            if remaining > 0 {
                return DamageOutcome::Applied { remaining };
            }
            if header_kind.is_none() {
                let kind = world.kind(hit.target).unwrap_or(EntityKind::Other);
                world.despawn(hit.target);
                metrics.kills += 1;
                debug!("{} killed by damage", hit.target);
                events.push(GameEvent::EnemyKilled {
                    entity: hit.target,
                    kind,
                    by_player: true,
                });
            }
            DamageOutcome::Killed
        }
    }
}

/// How a composite's cells touch the cursor this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactReport {
    /// Hittable cells inside the active shield
    pub shield_cells: u32,
    /// Mean centre of those cells
    pub centroid: Vec2F,
    /// A hittable cell sits on the cursor itself
    pub direct: bool,
}

impl ContactReport {
    pub fn shield_overlap(&self) -> bool {
        self.shield_cells > 0
    }
}

/// Cells of a composite (header cell included) that may touch the cursor
pub fn hittable_cells(world: &World, header: Entity) -> Vec<(i32, i32)> {
    let mut cells = Vec::new();
    let Some(h) = world.headers.get(header) else {
        if let Some(p) = world.position(header) {
            cells.push(p.cell());
        }
        return cells;
    };
    if h.kind == HeaderKind::Unit {
        if let Some(p) = world.position(header) {
            cells.push(p.cell());
        }
    }
    for entry in &h.members {
        let disabled = world
            .protections
            .get(entry.entity)
            .is_some_and(|p| p.hitbox_disabled);
        if disabled {
            continue;
        }
        if let Some(p) = world.position(entry.entity) {
            if !cells.contains(&p.cell()) {
                cells.push(p.cell());
            }
        }
    }
    cells
}

pub fn cursor_contact(world: &World, header: Entity, cursor: &Cursor) -> ContactReport {
    let mut report = ContactReport::default();
    let mut sum = Vec2F::ZERO;
    for (x, y) in hittable_cells(world, header) {
        if cursor.shield_covers(x, y) {
            report.shield_cells += 1;
            sum += Vec2F::cell_center(x, y);
        }
        if (x, y) == (cursor.x, cursor.y) {
            report.direct = true;
        }
    }
    if report.shield_cells > 0 {
        report.centroid = sum.div_int(report.shield_cells as i64);
    }
    report
}

/// Push the boss away from the cursor along the cursor-to-centroid line.
/// Refused while enraged or inside the kinetic immunity window.
pub fn shield_knockback(
    kinetic: &mut Kinetic,
    combat: &mut Combat,
    cursor: &Cursor,
    centroid: Vec2F,
    impulse: Fixed,
    immunity: Fixed,
) -> bool {
    if !combat.accepts_knockback() {
        return false;
    }
    let away = (centroid - cursor.center()).normalize_or((kinetic.pos - cursor.center()).normalize());
    kinetic.vel += away * impulse;
    combat.kinetic_immunity = immunity;
    true
}
