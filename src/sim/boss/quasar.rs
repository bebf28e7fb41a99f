//! Quasar: a 5x3 unit composite that chases the cursor and fires a
//! tracking beam once the cursor has stayed out of zap range for the
//! full charge time.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{BossKind, DespawnReason, SystemContext, damping_keep, finish_boss};
use crate::consts::SPAWN_SEARCH_RADIUS;
use crate::error::SpawnError;
use crate::sim::components::{EntityKind, Kinetic};
use crate::sim::composite::{CompositeBlueprint, Integrity, check_integrity, move_composite, spawn_composite};
use crate::sim::damage::{cursor_contact, shield_knockback};
use crate::sim::events::{GameEvent, SoundCue, SplashKind};
use crate::sim::fixed::Fixed;
use crate::sim::physics::{Footprint, apply_homing_scaled, reflect_in_bounds};
use crate::sim::vector::{Ellipse, Vec2F};
use crate::sim::world::{Entity, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuasarPhase {
    InRange,
    Charging,
    Zapping,
}

impl QuasarPhase {
    pub fn label(&self) -> &'static str {
        match self {
            QuasarPhase::InRange => "in_range",
            QuasarPhase::Charging => "charging",
            QuasarPhase::Zapping => "zapping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuasarState {
    pub kinetic: Kinetic,
    pub phase: QuasarPhase,
    pub charge_timer: Fixed,
    /// Time until the next beam damage tick
    pub zap_timer: Fixed,
    pub escalation_timer: Fixed,
    pub speed_mult: Fixed,
    pub shielded: bool,
}

impl QuasarState {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            kinetic: Kinetic::at_cell(x, y),
            phase: QuasarPhase::InRange,
            charge_timer: Fixed::ZERO,
            zap_timer: Fixed::ZERO,
            escalation_timer: Fixed::ZERO,
            speed_mult: Fixed::ONE,
            shielded: false,
        }
    }
}

/// Member offsets: 5 wide, 3 tall, anchored on the centre cell
pub fn shape() -> Vec<(i32, i32)> {
    let mut cells = Vec::with_capacity(15);
    for dy in -1..=1 {
        for dx in -2..=2 {
            cells.push((dx, dy));
        }
    }
    cells
}

pub fn spawn(world: &mut World, x: i32, y: i32, ctx: &mut SystemContext<'_>) -> Result<Entity, SpawnError> {
    let blueprint = CompositeBlueprint::unit(EntityKind::Quasar, ctx.tuning.quasar.hp, &shape());
    let header = spawn_composite(world, &blueprint, x, y, SPAWN_SEARCH_RADIUS)?;
    let (ax, ay) = world.position(header).map_or((x, y), |p| p.cell());
    world.quasars.insert(header, QuasarState::new(ax, ay));
    info!("quasar {header} spawned at ({ax}, {ay})");
    ctx.emit(GameEvent::EnemyCreated {
        entity: header,
        kind: BossKind::Quasar,
        x: ax,
        y: ay,
    });
    Ok(header)
}

pub fn cancel(world: &mut World, ctx: &mut SystemContext<'_>) {
    for header in world.quasars.entities() {
        finish_boss(world, header, BossKind::Quasar, DespawnReason::Cancelled, ctx);
    }
}

pub fn handle_breach(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) -> bool {
    if !world.quasars.contains(header) {
        return false;
    }
    finish_boss(world, header, BossKind::Quasar, DespawnReason::Breach, ctx);
    true
}

pub fn update(world: &mut World, ctx: &mut SystemContext<'_>) {
    for header in world.quasars.entities() {
        update_one(world, header, ctx);
    }
}

fn update_one(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) {
    let Some(mut q) = world.quasars.get(header).copied() else {
        return;
    };
    if let Integrity::MembersLost(n) = check_integrity(world, header) {
        warn!("quasar {header} lost {n} members outside its system");
        finish_boss(world, header, BossKind::Quasar, DespawnReason::Breach, ctx);
        return;
    }
    let Some(mut combat) = world.combats.get(header).copied() else {
        finish_boss(world, header, BossKind::Quasar, DespawnReason::External, ctx);
        return;
    };
    if !combat.is_alive() {
        finish_boss(world, header, BossKind::Quasar, DespawnReason::Killed, ctx);
        return;
    }

    let tuning = ctx.tuning;
    let t = &tuning.quasar;
    let dt = ctx.dt;
    combat.tick_timers(dt);

    let range = Ellipse::from_cells(t.zap_radius_x, t.zap_radius_y);
    let (ax, ay) = q.kinetic.grid();
    let in_range = range.contains_cell(ctx.cursor.x - ax, ctx.cursor.y - ay);
    let previous = q.phase;

    match q.phase {
        QuasarPhase::InRange => {
            if !in_range {
                q.phase = QuasarPhase::Charging;
                q.charge_timer = t.charge_time;
                ctx.emit(GameEvent::Splash {
                    kind: SplashKind::Charge,
                    x: ax,
                    y: ay,
                });
                ctx.emit(GameEvent::Sound(SoundCue::ChargeUp));
            }
        }
        QuasarPhase::Charging => {
            if in_range {
                q.phase = QuasarPhase::InRange;
            } else {
                q.charge_timer = q.charge_timer.countdown(dt);
                if q.charge_timer.is_zero() {
                    q.phase = QuasarPhase::Zapping;
                    q.zap_timer = Fixed::ZERO;
                    q.shielded = true;
                    ctx.metrics.zaps += 1;
                }
            }
        }
        QuasarPhase::Zapping => {
            if in_range {
                q.phase = QuasarPhase::InRange;
                q.shielded = false;
            }
        }
    }
    combat.enraged = q.shielded;
    if q.shielded {
        combat.stun = Fixed::ZERO;
    }

    match q.phase {
        QuasarPhase::InRange | QuasarPhase::Charging => {
            if q.phase == QuasarPhase::InRange {
                q.escalation_timer += dt;
                if q.escalation_timer >= t.escalation_interval {
                    q.escalation_timer = Fixed::ZERO;
                    q.speed_mult = (q.speed_mult + t.escalation_step).min(t.max_speed_mult);
                    debug!("quasar {header} speed x{}", q.speed_mult);
                }
            }
            if combat.is_stunned() {
                q.kinetic.vel = Vec2F::ZERO;
            } else {
                apply_homing_scaled(&mut q.kinetic, ctx.cursor.center(), &tuning.homing.quasar, q.speed_mult, true, dt);
            }
        }
        QuasarPhase::Zapping => {
            q.kinetic.vel *= damping_keep(t.zap_hold_damping, dt);
            q.kinetic.integrate(dt);
            let (bx, by) = q.kinetic.grid();
            ctx.emit(GameEvent::Lightning {
                owner: header,
                from: (bx, by),
                to: (ctx.cursor.x, ctx.cursor.y),
            });
            q.zap_timer = q.zap_timer.countdown(dt);
            if q.zap_timer.is_zero() {
                q.zap_timer = t.zap_interval;
                ctx.emit(GameEvent::Sound(SoundCue::Zap));
                ctx.emit(GameEvent::CursorDamage {
                    source: header,
                    amount: t.zap_damage,
                });
            }
        }
    }

    let footprint = Footprint::from_offsets(&shape());
    reflect_in_bounds(
        &mut q.kinetic,
        &footprint,
        world.walls.width(),
        world.walls.height(),
        tuning.collision.wall_restitution,
    );

    let (gx, gy) = q.kinetic.grid();
    if world.position(header).map(|p| p.cell()) != Some((gx, gy)) {
        move_composite(world, header, gx, gy);
    }

    let report = cursor_contact(world, header, ctx.cursor);
    if report.shield_overlap() {
        ctx.emit(GameEvent::EnergyDrain {
            source: header,
            amount: report.shield_cells as i32 * tuning.shield.drain_per_cell,
        });
        let pushed = shield_knockback(
            &mut q.kinetic,
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
    } else if report.direct {
        ctx.emit(GameEvent::HeatReset { source: header });
    }

    if q.phase != previous {
        debug!("quasar {header} {} -> {}", previous.label(), q.phase.label());
        ctx.emit(GameEvent::BossPhaseChanged {
            entity: header,
            kind: BossKind::Quasar,
            phase: q.phase.label(),
        });
    }

    if let Some(slot) = world.quasars.get_mut(header) {
        *slot = q;
    }
    if let Some(slot) = world.combats.get_mut(header) {
        *slot = combat;
    }
}
