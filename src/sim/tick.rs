//! Fixed timestep simulation tick
//!
//! One call consumes the queued requests, runs every boss system once,
//! resolves boss-to-boss soft collisions and refreshes the target cache.

use log::{debug, info, warn};

use super::boss::{self, BossKind, DespawnReason, SystemContext};
use super::components::{EntityKind, HeaderKind};
use super::composite::spawn_single;
use super::damage::{DamageOutcome, apply_damage};
use super::events::Request;
use super::fixed::Fixed;
use super::metrics::TickMetrics;
use super::physics::{Footprint, SoftCollider, soft_collision};
use super::state::GameState;
use super::targeting::{TargetHit, find_targets_in_ellipse, resolve_target_from_entity};
use super::vector::Ellipse;
use super::walls::mask;
use super::world::{Entity, World};
use crate::consts::*;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Move the cursor to this cell
    pub cursor: Option<(i32, i32)>,
    /// Raise or drop the shield
    pub shield: Option<bool>,
}

/// Advance the game state by one timestep. `dt` is capped at `MAX_DT`.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f64) -> TickMetrics {
    let dt = Fixed::from_f64(dt.clamp(0.0, MAX_DT));
    let mut metrics = TickMetrics::default();
    let events_before = state.events.len();

    if let Some((x, y)) = input.cursor {
        let (w, h) = (state.world.walls.width(), state.world.walls.height());
        state.cursor.x = x.clamp(0, (w - 1).max(0));
        state.cursor.y = y.clamp(0, (h - 1).max(0));
    }
    if let Some(active) = input.shield {
        state.cursor.shield_active = active;
    }

    process_requests(state, &mut metrics, dt);

    {
        let (world, mut ctx) = state.systems(&mut metrics, dt);
        boss::update_all(world, &mut ctx);
        resolve_boss_collisions(world, &mut ctx);
    }

    state.target_groups.refresh(&state.world);
    metrics.events = state.events.len().saturating_sub(events_before) as u32;
    state.time_ticks += 1;
    metrics
}

/// Handle everything queued before this tick. Requests pushed while
/// processing (e.g. summons) wait for the next tick.
fn process_requests(state: &mut GameState, metrics: &mut TickMetrics, dt: Fixed) {
    for request in state.requests.take_all() {
        metrics.requests += 1;
        match request {
            Request::Reset => reset(state, metrics, dt),
            Request::AssignTargets { x, y, count } => {
                state.target_groups.assign(&state.world, (x, y), count);
                debug!("assigned {} target groups from ({x}, {y})", state.target_groups.len());
            }
            other => {
                let (world, mut ctx) = state.systems(metrics, dt);
                if !apply_request(world, &mut ctx, other) {
                    ctx.metrics.rejected_requests += 1;
                }
            }
        }
    }
}

fn reset(state: &mut GameState, metrics: &mut TickMetrics, dt: Fixed) {
    {
        let (world, mut ctx) = state.systems(metrics, dt);
        for (header, kind) in boss::live_bosses(world) {
            boss::finish_boss(world, header, kind, DespawnReason::Reset, &mut ctx);
        }
        world.clear();
    }
    state.target_groups.invalidate_all();
    info!("world reset at tick {}", state.time_ticks);
}

/// Apply one request; false if it had no effect
fn apply_request(world: &mut World, ctx: &mut SystemContext<'_>, request: Request) -> bool {
    match request {
        Request::Spawn { kind, x, y } => match boss::spawn(kind, world, x, y, ctx) {
            Ok(_) => true,
            Err(e) => {
                warn!("{} spawn at ({x}, {y}) failed: {e}", kind.as_str());
                ctx.metrics.spawn_failures += 1;
                false
            }
        },
        Request::Cancel { kind } => {
            boss::cancel(kind, world, ctx);
            true
        }
        Request::IntegrityBreach { header } => {
            let handled = boss::handle_breach(world, header, ctx);
            if !handled {
                debug!("breach for {header} matched no boss");
            }
            handled
        }
        Request::Damage { occupant, amount, stun } => {
            let Some(hit) = resolve_target_from_entity(world, occupant, Entity::NONE) else {
                return false;
            };
            let outcome = apply_damage(world, hit, amount, stun, ctx.events, ctx.metrics);
            !matches!(outcome, DamageOutcome::Missed)
        }
        Request::AreaDamage {
            x,
            y,
            radius_x,
            radius_y,
            amount,
        } => {
            if radius_x < 1 || radius_y < 1 {
                return false;
            }
            let area = Ellipse::from_cells(radius_x, radius_y);
            let groups = find_targets_in_ellipse(world, x, y, &area, Entity::NONE);
            for group in &groups {
                let ablative = world
                    .headers
                    .get(group.target)
                    .is_some_and(|h| h.kind == HeaderKind::Ablative);
                // a unit composite takes one hit however many cells overlap
                let hits = if ablative { &group.hits[..] } else { group.hits.get(..1).unwrap_or(&[]) };
                for &hit in hits {
                    let th = TargetHit {
                        target: group.target,
                        hit,
                    };
                    apply_damage(world, th, amount, Fixed::ZERO, ctx.events, ctx.metrics);
                }
            }
            !groups.is_empty()
        }
        Request::SpawnDrain { x, y, hp } => {
            if world.walls.is_blocked(x, y, mask::ENEMY) || hp <= 0 {
                return false;
            }
            spawn_single(world, EntityKind::Drain, x, y, hp);
            true
        }
        // handled by `process_requests`
        Request::Reset | Request::AssignTargets { .. } => false,
    }
}

/// Push overlapping Quasar and Swarm bodies apart
fn resolve_boss_collisions(world: &mut World, ctx: &mut SystemContext<'_>) {
    let tuning = ctx.tuning;
    let quasar_extent = extent_of(&boss::quasar::shape());
    let swarm_extent = extent_of(&boss::swarm::shape());

    let mut bodies: Vec<(Entity, BossKind)> = world
        .quasars
        .entities()
        .into_iter()
        .map(|e| (e, BossKind::Quasar))
        .collect();
    bodies.extend(world.swarms.entities().into_iter().map(|e| (e, BossKind::Swarm)));

    let collider = |world: &World, entity: Entity, kind: BossKind| -> Option<SoftCollider> {
        let combat = world.combats.get(entity)?;
        let (center, extent, mass) = match kind {
            BossKind::Quasar => (world.quasars.get(entity)?.kinetic.pos, quasar_extent, tuning.quasar.mass),
            BossKind::Swarm => (world.swarms.get(entity)?.kinetic.pos, swarm_extent, tuning.swarm.mass),
            BossKind::Storm => return None,
        };
        Some(SoftCollider {
            center,
            extent,
            mass,
            accepts_impulse: combat.accepts_knockback(),
        })
    };

    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (a, ak) = bodies[i];
            let (b, bk) = bodies[j];
            let (Some(ca), Some(cb)) = (collider(&*world, a, ak), collider(&*world, b, bk)) else {
                continue;
            };
            let Some((dva, dvb)) = soft_collision(&ca, &cb, tuning.collision.soft_strength) else {
                continue;
            };
            ctx.metrics.soft_collisions += 1;
            for (entity, kind, dv, accepts) in [(a, ak, dva, ca.accepts_impulse), (b, bk, dvb, cb.accepts_impulse)] {
                if !accepts {
                    continue;
                }
                match kind {
                    BossKind::Quasar => {
                        if let Some(q) = world.quasars.get_mut(entity) {
                            q.kinetic.vel += dv;
                        }
                    }
                    BossKind::Swarm => {
                        if let Some(s) = world.swarms.get_mut(entity) {
                            s.kinetic.vel += dv;
                        }
                    }
                    BossKind::Storm => {}
                }
                if let Some(c) = world.combats.get_mut(entity) {
                    c.kinetic_immunity = tuning.collision.immunity;
                }
            }
        }
    }
}

/// Bounding ellipse of a footprint, half a cell larger than its cells
fn extent_of(offsets: &[(i32, i32)]) -> Ellipse {
    let fp = Footprint::from_offsets(offsets);
    let rx = (fp.max_x - fp.min_x + 1).max(1);
    let ry = (fp.max_y - fp.min_y + 1).max(1);
    Ellipse::new(Fixed::from_int(rx).div_int(2) + Fixed::HALF, Fixed::from_int(ry).div_int(2) + Fixed::HALF)
}
