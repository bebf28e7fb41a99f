//! Swarm: a flocking unit composite that periodically locks onto the
//! cursor and charges it, teleporting instead when walls are in the way.
//!
//! Phase cycle: `Chase -> Lock -> Charge | Teleport -> Decelerate -> Chase`.
//! The boss leaves after `max_charges` completed charges, when its
//! lifetime runs out, or when its hit points are gone.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{BossKind, DespawnReason, SystemContext, damping_keep, finish_boss};
use crate::consts::SPAWN_SEARCH_RADIUS;
use crate::error::SpawnError;
use crate::sim::components::{Combat, EntityKind, Kinetic};
use crate::sim::composite::{CompositeBlueprint, Integrity, check_integrity, move_composite, spawn_composite};
use crate::sim::damage::{cursor_contact, hittable_cells, shield_knockback};
use crate::sim::events::{GameEvent, SoundCue, SplashKind};
use crate::sim::fixed::Fixed;
use crate::sim::physics::{Footprint, Neighbor, reflect_in_bounds, separation_force, steer_toward, step_with_walls};
use crate::sim::vector::{Ellipse, Vec2F};
use crate::sim::walls::mask;
use crate::sim::world::{Entity, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmPhase {
    Chase,
    Lock,
    Charge,
    Teleport,
    Decelerate,
}

impl SwarmPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SwarmPhase::Chase => "chase",
            SwarmPhase::Lock => "lock",
            SwarmPhase::Charge => "charge",
            SwarmPhase::Teleport => "teleport",
            SwarmPhase::Decelerate => "decelerate",
        }
    }

    /// Phases during which the swarm ignores knockback and stun
    fn is_committed(&self) -> bool {
        matches!(self, SwarmPhase::Lock | SwarmPhase::Charge | SwarmPhase::Teleport)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmState {
    pub kinetic: Kinetic,
    pub phase: SwarmPhase,
    /// Countdown for Lock, Teleport and Decelerate
    pub phase_timer: Fixed,
    /// Chase time left before the next lock
    pub charge_timer: Fixed,
    pub lifetime: Fixed,
    pub charges: u32,
    pub lock_target: (i32, i32),
    pub charge_start: Vec2F,
    pub charge_end: Vec2F,
    pub charge_elapsed: Fixed,
    pub active_pattern: u8,
    pub pattern_timer: Fixed,
    pub contact_cooldown: Fixed,
}

impl SwarmState {
    pub fn new(x: i32, y: i32, charge_interval: Fixed, lifetime: Fixed, pattern_interval: Fixed) -> Self {
        let kinetic = Kinetic::at_cell(x, y);
        Self {
            kinetic,
            phase: SwarmPhase::Chase,
            phase_timer: Fixed::ZERO,
            charge_timer: charge_interval,
            lifetime,
            charges: 0,
            lock_target: (x, y),
            charge_start: kinetic.pos,
            charge_end: kinetic.pos,
            charge_elapsed: Fixed::ZERO,
            active_pattern: 0,
            pattern_timer: pattern_interval,
            contact_cooldown: Fixed::ZERO,
        }
    }
}

/// Member offsets: a 5x3 lozenge around the anchor
pub fn shape() -> Vec<(i32, i32)> {
    let mut cells = Vec::with_capacity(11);
    for dy in -1..=1 {
        let reach = if dy == 0 { 2 } else { 1 };
        for dx in -reach..=reach {
            cells.push((dx, dy));
        }
    }
    cells
}

/// Checkerboard animation pattern of a member offset
fn pattern_of(dx: i32, dy: i32) -> u8 {
    ((dx + dy).rem_euclid(2)) as u8
}

pub fn spawn(world: &mut World, x: i32, y: i32, ctx: &mut SystemContext<'_>) -> Result<Entity, SpawnError> {
    let tuning = ctx.tuning;
    let t = &tuning.swarm;
    let mut blueprint = CompositeBlueprint::unit(EntityKind::Swarm, t.hp, &shape());
    for spec in &mut blueprint.members {
        spec.pattern = pattern_of(spec.offset_x, spec.offset_y);
    }
    let header = spawn_composite(world, &blueprint, x, y, SPAWN_SEARCH_RADIUS)?;
    let (ax, ay) = world.position(header).map_or((x, y), |p| p.cell());
    let state = SwarmState::new(ax, ay, t.charge_interval, t.lifetime, t.pattern_interval);
    world.swarms.insert(header, state);
    apply_patterns(world, header, state.active_pattern);
    info!("swarm {header} spawned at ({ax}, {ay})");
    ctx.emit(GameEvent::EnemyCreated {
        entity: header,
        kind: BossKind::Swarm,
        x: ax,
        y: ay,
    });
    Ok(header)
}

pub fn cancel(world: &mut World, ctx: &mut SystemContext<'_>) {
    for header in world.swarms.entities() {
        finish_boss(world, header, BossKind::Swarm, DespawnReason::Cancelled, ctx);
    }
}

pub fn handle_breach(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) -> bool {
    if !world.swarms.contains(header) {
        return false;
    }
    finish_boss(world, header, BossKind::Swarm, DespawnReason::Breach, ctx);
    true
}

pub fn update(world: &mut World, ctx: &mut SystemContext<'_>) {
    for header in world.swarms.entities() {
        update_one(world, header, ctx);
    }
}

/// Disable the hitbox of every member outside the active pattern
fn apply_patterns(world: &mut World, header: Entity, active: u8) {
    let Some(h) = world.headers.get(header) else {
        return;
    };
    let entries: Vec<Entity> = h.members.iter().map(|m| m.entity).collect();
    for member in entries {
        let pattern = world.members.get(member).map_or(0, |m| m.pattern);
        if let Some(p) = world.protections.get_mut(member) {
            p.hitbox_disabled = pattern != active;
        }
    }
}

fn neighbors(world: &World, header: Entity) -> Vec<Neighbor> {
    let mut out: Vec<Neighbor> = world
        .swarms
        .iter()
        .filter(|(e, _)| *e != header)
        .map(|(_, s)| Neighbor {
            pos: s.kinetic.pos,
            same_species: true,
        })
        .collect();
    out.extend(world.quasars.iter().map(|(_, q)| Neighbor {
        pos: q.kinetic.pos,
        same_species: false,
    }));
    out
}

fn update_one(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) {
    let Some(mut s) = world.swarms.get(header).copied() else {
        return;
    };
    if let Integrity::MembersLost(n) = check_integrity(world, header) {
        warn!("swarm {header} lost {n} members outside its system");
        finish_boss(world, header, BossKind::Swarm, DespawnReason::Breach, ctx);
        return;
    }
    let Some(mut combat) = world.combats.get(header).copied() else {
        finish_boss(world, header, BossKind::Swarm, DespawnReason::External, ctx);
        return;
    };
    if !combat.is_alive() {
        finish_boss(world, header, BossKind::Swarm, DespawnReason::Killed, ctx);
        return;
    }

    let tuning = ctx.tuning;
    let t = &tuning.swarm;
    let dt = ctx.dt;

    s.lifetime = s.lifetime.countdown(dt);
    if s.lifetime.is_zero() {
        finish_boss(world, header, BossKind::Swarm, DespawnReason::Expired, ctx);
        return;
    }
    combat.tick_timers(dt);
    s.contact_cooldown = s.contact_cooldown.countdown(dt);

    s.pattern_timer = s.pattern_timer.countdown(dt);
    if s.pattern_timer.is_zero() {
        s.pattern_timer = t.pattern_interval;
        s.active_pattern ^= 1;
        apply_patterns(world, header, s.active_pattern);
    }

    let body = shape();
    let previous = s.phase;
    let restitution = tuning.collision.wall_restitution;

    match s.phase {
        SwarmPhase::Chase => {
            s.charge_timer = s.charge_timer.countdown(dt);
            if combat.is_stunned() {
                s.kinetic.vel = Vec2F::ZERO;
            } else {
                let profile = &tuning.homing.swarm;
                steer_toward(&mut s.kinetic, ctx.cursor.center(), profile, Fixed::ONE, true, dt);
                let spacing = Ellipse::from_cells(t.separation_radius_x, t.separation_radius_y);
                let push = separation_force(
                    s.kinetic.pos,
                    &neighbors(world, header),
                    &spacing,
                    t.separation_strength,
                    t.cross_species_mult,
                );
                s.kinetic.vel = (s.kinetic.vel + push * dt).clamp_length(profile.max_speed);
                let walls = &world.walls;
                step_with_walls(&mut s.kinetic, dt, restitution, |x, y| {
                    !walls.footprint_fits(x, y, &body, mask::ENEMY)
                });
            }
            if s.charge_timer.is_zero() {
                s.phase = SwarmPhase::Lock;
                s.phase_timer = t.lock_duration;
                s.lock_target = (ctx.cursor.x, ctx.cursor.y);
                s.kinetic.vel = Vec2F::ZERO;
                let (lx, ly) = s.lock_target;
                ctx.emit(GameEvent::Splash {
                    kind: SplashKind::Lock,
                    x: lx,
                    y: ly,
                });
                ctx.emit(GameEvent::Sound(SoundCue::SwarmLock));
            }
        }
        SwarmPhase::Lock => {
            s.kinetic.vel = Vec2F::ZERO;
            s.phase_timer = s.phase_timer.countdown(dt);
            if s.phase_timer.is_zero() {
                let from = s.kinetic.grid();
                let to = s.lock_target;
                let walls = &world.walls;
                let clear = walls.has_line_of_sight(from.0, from.1, to.0, to.1, mask::ENEMY)
                    && walls.footprint_path_clear(from, to, &body, mask::ENEMY);
                if clear {
                    s.phase = SwarmPhase::Charge;
                    s.charge_start = s.kinetic.pos;
                    s.charge_end = Vec2F::cell_center(to.0, to.1);
                    s.charge_elapsed = Fixed::ZERO;
                    s.kinetic.vel = (s.charge_end - s.charge_start) / t.charge_duration;
                } else {
                    begin_teleport(&mut s, t.teleport_delay, ctx);
                }
            }
        }
        SwarmPhase::Charge => {
            s.charge_elapsed += dt;
            let progress = (s.charge_elapsed / t.charge_duration).min(Fixed::ONE);
            let next = Vec2F::new(
                Fixed::lerp(s.charge_start.x, s.charge_end.x, progress),
                Fixed::lerp(s.charge_start.y, s.charge_end.y, progress),
            );
            let (nx, ny) = next.grid();
            if next.grid() != s.kinetic.grid() && !world.walls.footprint_fits(nx, ny, &body, mask::ENEMY) {
                debug!("swarm {header} charge blocked at ({nx}, {ny})");
                s.kinetic.vel = Vec2F::ZERO;
                begin_teleport(&mut s, t.teleport_delay, ctx);
            } else {
                s.kinetic.pos = next;
                if progress >= Fixed::ONE {
                    s.phase = SwarmPhase::Decelerate;
                    s.phase_timer = t.decelerate_duration;
                }
            }
        }
        SwarmPhase::Teleport => {
            s.kinetic.vel = Vec2F::ZERO;
            s.phase_timer = s.phase_timer.countdown(dt);
            if s.phase_timer.is_zero() {
                let (tx, ty) = s.lock_target;
                match world
                    .walls
                    .find_free_area_spiral(tx, ty, &body, mask::ENEMY, t.teleport_search_radius)
                {
                    Some((x, y)) => {
                        s.kinetic = Kinetic::at_cell(x, y);
                        ctx.metrics.teleports += 1;
                        ctx.emit(GameEvent::Splash {
                            kind: SplashKind::Teleport,
                            x,
                            y,
                        });
                        ctx.emit(GameEvent::Sound(SoundCue::Teleport));
                    }
                    None => debug!("swarm {header} found no landing near ({tx}, {ty})"),
                }
                s.phase = SwarmPhase::Decelerate;
                s.phase_timer = t.decelerate_duration;
            }
        }
        SwarmPhase::Decelerate => {
            s.kinetic.vel *= damping_keep(t.decelerate_drag, dt);
            let walls = &world.walls;
            step_with_walls(&mut s.kinetic, dt, restitution, |x, y| {
                !walls.footprint_fits(x, y, &body, mask::ENEMY)
            });
            s.phase_timer = s.phase_timer.countdown(dt);
            if s.phase_timer.is_zero() {
                s.charges += 1;
                if s.charges >= t.max_charges {
                    finish_boss(world, header, BossKind::Swarm, DespawnReason::ChargesExhausted, ctx);
                    return;
                }
                s.phase = SwarmPhase::Chase;
                s.charge_timer = t.charge_interval;
            }
        }
    }
    combat.enraged = s.phase.is_committed();
    if combat.enraged {
        combat.stun = Fixed::ZERO;
    }

    reflect_in_bounds(
        &mut s.kinetic,
        &Footprint::from_offsets(&body),
        world.walls.width(),
        world.walls.height(),
        restitution,
    );
    let (gx, gy) = s.kinetic.grid();
    if world.position(header).map(|p| p.cell()) != Some((gx, gy)) {
        move_composite(world, header, gx, gy);
    }

    absorb_drains(world, header, &mut combat, ctx);

    let report = cursor_contact(world, header, ctx.cursor);
    if report.shield_overlap() {
        ctx.emit(GameEvent::EnergyDrain {
            source: header,
            amount: report.shield_cells as i32 * tuning.shield.drain_per_cell,
        });
        let pushed = shield_knockback(
            &mut s.kinetic,
            &mut combat,
            ctx.cursor,
            report.centroid,
            tuning.shield.knockback_impulse,
            tuning.shield.knockback_immunity,
        );
        if pushed {
            ctx.metrics.knockbacks += 1;
            ctx.emit(GameEvent::Sound(SoundCue::ShieldHit));
        }
    } else if report.direct && s.contact_cooldown.is_zero() {
        s.contact_cooldown = t.contact_cooldown;
        ctx.emit(GameEvent::CursorDamage {
            source: header,
            amount: t.contact_damage,
        });
    }

    if s.phase != previous {
        debug!("swarm {header} {} -> {}", previous.label(), s.phase.label());
        ctx.emit(GameEvent::BossPhaseChanged {
            entity: header,
            kind: BossKind::Swarm,
            phase: s.phase.label(),
        });
    }

    if let Some(slot) = world.swarms.get_mut(header) {
        *slot = s;
    }
    if let Some(slot) = world.combats.get_mut(header) {
        *slot = combat;
    }
}

fn begin_teleport(s: &mut SwarmState, delay: Fixed, ctx: &mut SystemContext<'_>) {
    s.phase = SwarmPhase::Teleport;
    s.phase_timer = delay;
    let (x, y) = s.lock_target;
    ctx.emit(GameEvent::Splash {
        kind: SplashKind::Teleport,
        x,
        y,
    });
}

/// Drains touching an active member cell feed the boss's hit pool
fn absorb_drains(world: &mut World, header: Entity, combat: &mut Combat, ctx: &mut SystemContext<'_>) {
    let mut drains: Vec<Entity> = Vec::new();
    for (x, y) in hittable_cells(world, header) {
        for &e in world.entities_at(x, y) {
            if world.kind(e) == Some(EntityKind::Drain) && !drains.contains(&e) {
                drains.push(e);
            }
        }
    }
    for drain in drains {
        let hp = world.combats.get(drain).map_or(0, |c| c.hp.max(0));
        combat.hp += hp;
        world.despawn(drain);
        ctx.metrics.drains_absorbed += 1;
        debug!("swarm {header} absorbed drain {drain} (+{hp})");
        ctx.emit(GameEvent::DrainAbsorbed {
            boss: header,
            drain,
            hp,
        });
        ctx.emit(GameEvent::Sound(SoundCue::Absorb));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::testing::Harness;
    use crate::sim::composite::spawn_single;
    use crate::sim::walls::WallGrid;

    fn quick(h: &mut Harness) {
        h.tuning.swarm.charge_interval = Fixed::from_ratio(1, 10);
        h.tuning.swarm.lock_duration = Fixed::from_ratio(1, 10);
    }

    fn state(h: &Harness, e: Entity) -> SwarmState {
        *h.world.swarms.get(e).expect("swarm state")
    }

    #[test]
    fn test_shape_patterns_alternate() {
        let cells = shape();
        assert_eq!(cells.len(), 11);
        assert_eq!(pattern_of(0, 0), 0);
        assert_eq!(pattern_of(1, 0), 1);
        assert_eq!(pattern_of(-1, -1), 0);
    }

    #[test]
    fn test_clear_charge_lands_on_lock_target() {
        let mut h = Harness::open(80, 30);
        quick(&mut h);
        h.cursor.x = 40;
        h.cursor.y = 15;
        let e = h.spawn(BossKind::Swarm, 10, 15);
        let mut landed = None;
        for _ in 0..200 {
            h.step();
            let s = state(&h, e);
            if s.phase == SwarmPhase::Decelerate {
                landed = Some((s.kinetic.grid(), s.lock_target));
                break;
            }
        }
        let (grid, target) = landed.expect("charge finished");
        assert_eq!(grid, target);
        let phases = Harness::phases(&h.drain(), e);
        assert_eq!(phases, vec!["lock", "charge", "decelerate"]);
    }

    #[test]
    fn test_wall_blocked_charge_teleports() {
        let mut walls = WallGrid::open(60, 21);
        walls.fill_rect(30, 0, 30, 20, mask::ALL);
        let mut h = Harness::new(walls);
        quick(&mut h);
        h.cursor.x = 45;
        h.cursor.y = 10;
        let e = h.spawn(BossKind::Swarm, 20, 10);
        let mut seen = Vec::new();
        for _ in 0..240 {
            h.step();
            let s = state(&h, e);
            let (gx, gy) = s.kinetic.grid();
            assert!(h.world.walls.footprint_fits(gx, gy, &shape(), mask::ENEMY));
            seen.push(s.phase);
            if s.charges > 0 {
                break;
            }
        }
        assert!(seen.contains(&SwarmPhase::Teleport));
        assert!(!seen.contains(&SwarmPhase::Charge));
        assert!(h.world.position(e).expect("anchor").x > 30);
        assert_eq!(h.metrics.teleports, 1);
    }

    #[test]
    fn test_charges_exhausted_despawns() {
        let mut h = Harness::open(80, 30);
        quick(&mut h);
        h.tuning.swarm.max_charges = 1;
        h.cursor.x = 30;
        h.cursor.y = 15;
        let e = h.spawn(BossKind::Swarm, 10, 15);
        h.steps(200);
        assert!(!h.world.is_alive(e));
        let events = h.drain();
        assert!(events.iter().any(|ev| matches!(
            ev,
            GameEvent::BossDespawned { reason: DespawnReason::ChargesExhausted, .. }
        )));
        assert!(!events.iter().any(|ev| matches!(ev, GameEvent::EnemyKilled { .. })));
    }

    #[test]
    fn test_lifetime_expiry() {
        let mut h = Harness::open(80, 30);
        h.tuning.swarm.lifetime = Fixed::HALF;
        let e = h.spawn(BossKind::Swarm, 10, 15);
        h.steps(40);
        assert!(!h.world.is_alive(e));
        assert!(h.drain().iter().any(|ev| matches!(
            ev,
            GameEvent::BossDespawned { reason: DespawnReason::Expired, .. }
        )));
    }

    #[test]
    fn test_drain_absorbed_into_hit_pool() {
        let mut h = Harness::open(80, 30);
        h.cursor.x = 10;
        h.cursor.y = 15;
        let e = h.spawn(BossKind::Swarm, 10, 15);
        let drain = spawn_single(&mut h.world, EntityKind::Drain, 10, 15, 25);
        h.step();
        assert!(!h.world.is_alive(drain));
        assert_eq!(h.world.combats.get(e).map(|c| c.hp), Some(h.tuning.swarm.hp + 25));
        assert_eq!(h.metrics.drains_absorbed, 1);
        assert!(h.drain().iter().any(|ev| matches!(ev, GameEvent::DrainAbsorbed { hp: 25, .. })));
    }

    #[test]
    fn test_inactive_pattern_disables_hitbox() {
        let mut h = Harness::open(80, 30);
        h.cursor.x = 10;
        h.cursor.y = 15;
        let e = h.spawn(BossKind::Swarm, 10, 15);
        let centre = h
            .world
            .headers
            .get(e)
            .and_then(|hd| hd.members.iter().find(|m| (m.offset_x, m.offset_y) == (0, 0)))
            .map(|m| m.entity)
            .expect("centre member");
        assert!(!h.world.protections.get(centre).expect("protection").hitbox_disabled);
        h.steps(16);
        assert_eq!(state(&h, e).active_pattern, 1);
        assert!(h.world.protections.get(centre).expect("protection").hitbox_disabled);
    }

    #[test]
    fn test_contact_damage_respects_cooldown() {
        let mut h = Harness::open(80, 30);
        h.cursor.x = 10;
        h.cursor.y = 15;
        h.spawn(BossKind::Swarm, 10, 15);
        h.steps(10);
        let hits = h
            .drain()
            .iter()
            .filter(|ev| matches!(ev, GameEvent::CursorDamage { .. }))
            .count();
        assert_eq!(hits, 1);
    }
}
