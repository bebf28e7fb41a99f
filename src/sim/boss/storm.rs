//! Storm: three ablative circles orbiting a shared centre in 3D
//!
//! The depth axis decides who may be hurt. A circle at or above the
//! midpoint is convex: its members are damage-immune and it may attack.
//! Below the midpoint it is concave and damageable. Each circle runs its
//! own `Idle -> Cooldown -> Active -> Cooldown` attack cycle keyed on its
//! colour. A container header owns the circles; the storm ends when none
//! are left.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{BossKind, DespawnReason, SystemContext, finish_boss};
use crate::consts::SPAWN_SEARCH_RADIUS;
use crate::error::SpawnError;
use crate::sim::components::{EntityKind, Kinetic};
use crate::sim::composite::{
    CompositeBlueprint, SpawnBatch, attach_child, destroy_composite, is_composite_dead, move_composite,
    prune_members, reap_orphans, resolve_spawn_site, spawn_composite_in, spawn_container_in,
};
use crate::sim::damage::cursor_contact;
use crate::sim::events::{GameEvent, Request, SoundCue, SplashKind};
use crate::sim::fixed::{Bam, Fixed, cos_bam, degrees_to_bam, sin_bam};
use crate::sim::physics::{Body3, Footprint, integrate_orbits, reflect_depth, reflect_in_bounds, resolve_elastic_3d};
use crate::sim::vector::{Ellipse, Vec2F, Vec3F};
use crate::sim::world::{Entity, World};
use crate::tuning::StormTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircleColor {
    /// Area pulse around the circle
    Green,
    /// Projectile spread toward the cursor
    Red,
    /// Summons a swarm
    Blue,
}

impl CircleColor {
    pub const ALL: [CircleColor; 3] = [CircleColor::Green, CircleColor::Red, CircleColor::Blue];

    pub fn as_str(&self) -> &'static str {
        match self {
            CircleColor::Green => "green",
            CircleColor::Red => "red",
            CircleColor::Blue => "blue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    Idle,
    Cooldown,
    Active,
}

impl AttackPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AttackPhase::Idle => "idle",
            AttackPhase::Cooldown => "cooldown",
            AttackPhase::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleState {
    /// Owning container
    pub storm: Entity,
    pub color: CircleColor,
    pub body: Body3,
    pub attack: AttackPhase,
    pub attack_timer: Fixed,
    pub pulse_timer: Fixed,
    /// Continuous convex time outside an attack
    pub convex_time: Fixed,
    pub convex: bool,
    /// Red volley direction, captured when the attack starts
    pub locked_dir: Vec2F,
    /// Blue summon site waiting for `spawn_timer`
    pub pending_spawn: Option<(i32, i32)>,
    pub spawn_timer: Fixed,
    pub contact_cooldown: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormState {
    pub circles: [Entity; 3],
    /// Orbit centre; `z` sits on the depth midpoint
    pub center: Vec3F,
}

impl StormState {
    pub fn live_circles(&self, world: &World) -> Vec<Entity> {
        self.circles
            .iter()
            .copied()
            .filter(|&c| world.circles.contains(c))
            .collect()
    }
}

fn midpoint(t: &StormTuning) -> Fixed {
    t.z_max.div_int(2)
}

/// Member offsets of one circle
pub fn circle_shape(t: &StormTuning) -> Vec<(i32, i32)> {
    Ellipse::from_cells(t.circle_radius_x, t.circle_radius_y).cells()
}

/// Initial anchor of circle `i`, spread around the centre
fn spawn_angle(i: usize) -> Bam {
    (i * 256 / 3) as Bam
}

fn initial_offset(angle: Bam, spread: i32) -> (i32, i32) {
    let r = Fixed::from_int(spread);
    ((r * cos_bam(angle)).round(), (r.div_int(2) * sin_bam(angle)).round())
}

pub fn spawn(world: &mut World, x: i32, y: i32, ctx: &mut SystemContext<'_>) -> Result<Entity, SpawnError> {
    let tuning = ctx.tuning;
    let t = &tuning.storm;
    if !world.in_bounds(x, y) {
        return Err(SpawnError::OutOfBounds { x, y });
    }
    let shape = circle_shape(t);
    let mut sites = [(0, 0); 3];
    for (i, site) in sites.iter_mut().enumerate() {
        let (dx, dy) = initial_offset(spawn_angle(i), t.spawn_spread);
        *site = resolve_spawn_site(&world.walls, x + dx, y + dy, &shape, SPAWN_SEARCH_RADIUS)?;
    }

    let mid = midpoint(t);
    let center = Vec3F::from_xy(Vec2F::cell_center(x, y), mid);
    let blueprint = CompositeBlueprint::ablative(EntityKind::StormCircle, t.member_hp, &shape);
    let depths = [
        mid + t.z_max.div_int(4),
        mid - t.z_max.div_int(4),
        mid,
    ];

    let mut batch = SpawnBatch::new(world);
    let root = spawn_container_in(&mut batch, EntityKind::StormRoot, x, y);
    let mut circles = [Entity::NONE; 3];
    for (i, color) in CircleColor::ALL.into_iter().enumerate() {
        let (cx, cy) = sites[i];
        let circle = spawn_composite_in(&mut batch, &blueprint, cx, cy);
        attach_child(batch.world(), root, circle);
        let tangent = Vec2F::from_bam(spawn_angle(i).wrapping_add(64));
        let state = CircleState {
            storm: root,
            color,
            body: Body3 {
                pos: Vec3F::from_xy(Vec2F::cell_center(cx, cy), depths[i]),
                vel: Vec3F::from_xy(tangent * t.initial_speed, Fixed::ZERO),
                mass: Fixed::ONE,
            },
            attack: AttackPhase::Idle,
            attack_timer: Fixed::ZERO,
            pulse_timer: Fixed::ZERO,
            convex_time: Fixed::ZERO,
            convex: false,
            locked_dir: Vec2F::X,
            pending_spawn: None,
            spawn_timer: Fixed::ZERO,
            contact_cooldown: Fixed::ZERO,
        };
        batch.world().circles.insert(circle, state);
        circles[i] = circle;
    }
    batch.world().storms.insert(root, StormState { circles, center });
    batch.commit();

    info!("storm {root} spawned at ({x}, {y})");
    ctx.emit(GameEvent::EnemyCreated {
        entity: root,
        kind: BossKind::Storm,
        x,
        y,
    });
    Ok(root)
}

pub fn cancel(world: &mut World, ctx: &mut SystemContext<'_>) {
    for root in world.storms.entities() {
        finish_boss(world, root, BossKind::Storm, DespawnReason::Cancelled, ctx);
    }
}

/// A breach on the container ends the storm; a breach on a single circle
/// removes just that circle.
pub fn handle_breach(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) -> bool {
    if world.storms.contains(header) {
        finish_boss(world, header, BossKind::Storm, DespawnReason::Breach, ctx);
        return true;
    }
    if world.circles.contains(header) {
        remove_circle(world, header, ctx);
        return true;
    }
    false
}

pub fn update(world: &mut World, ctx: &mut SystemContext<'_>) {
    for root in world.storms.entities() {
        update_one(world, root, ctx);
    }
}

fn remove_circle(world: &mut World, circle: Entity, ctx: &mut SystemContext<'_>) {
    let Some(state) = world.circles.get(circle).copied() else {
        return;
    };
    destroy_composite(world, circle, ctx.events);
    if let Some(storm) = world.storms.get_mut(state.storm) {
        for slot in storm.circles.iter_mut().filter(|slot| **slot == circle) {
            *slot = Entity::NONE;
        }
    }
    info!("storm {} lost its {} circle", state.storm, state.color.as_str());
    ctx.emit(GameEvent::StormCircleDestroyed {
        storm: state.storm,
        circle,
        color: state.color,
    });
}

/// Free the slots of circles whose header was despawned from outside,
/// clearing the cells they left behind
fn reap_lost_circles(world: &mut World, root: Entity, mut storm: StormState, ctx: &mut SystemContext<'_>) -> StormState {
    let mut changed = false;
    for (slot, color) in storm.circles.iter_mut().zip(CircleColor::ALL) {
        let circle = *slot;
        if circle.is_none() || world.is_alive(circle) {
            continue;
        }
        let removed = reap_orphans(world, circle, ctx.events);
        *slot = Entity::NONE;
        changed = true;
        info!("storm {root} lost its {} circle from outside ({removed} cells reaped)", color.as_str());
        ctx.emit(GameEvent::StormCircleDestroyed { storm: root, circle, color });
    }
    if changed {
        prune_members(world, root);
        world.storms.insert(root, storm);
    }
    storm
}

fn update_one(world: &mut World, root: Entity, ctx: &mut SystemContext<'_>) {
    let Some(storm) = world.storms.get(root).copied() else {
        return;
    };
    let storm = reap_lost_circles(world, root, storm, ctx);
    let tuning = ctx.tuning;
    let t = &tuning.storm;
    let dt = ctx.dt;

    for circle in storm.live_circles(world) {
        prune_members(world, circle);
        if is_composite_dead(world, circle) {
            remove_circle(world, circle, ctx);
        }
    }
    let live = storm.live_circles(world);
    if live.is_empty() {
        finish_boss(world, root, BossKind::Storm, DespawnReason::Killed, ctx);
        return;
    }

    let mut states: Vec<CircleState> = live.iter().filter_map(|&c| world.circles.get(c).copied()).collect();
    let mut bodies: Vec<Body3> = states.iter().map(|s| s.body).collect();
    integrate_orbits(&mut bodies, storm.center, &t.orbit, dt);

    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            if resolve_elastic_3d(&mut head[i], &mut tail[0], t.collision_radius, t.collision_restitution) {
                ctx.metrics.elastic_collisions += 1;
                let (dx, dy) = ((head[i].pos.xy() + tail[0].pos.xy()).div_int(2)).grid();
                ctx.emit(GameEvent::Dust { x: dx, y: dy });
            }
        }
    }

    let shape = circle_shape(t);
    let footprint = Footprint::from_offsets(&shape);
    let mid = midpoint(t);
    for ((&circle, state), body) in live.iter().zip(states.iter_mut()).zip(bodies) {
        state.body = body;
        let mut planar = Kinetic {
            pos: state.body.pos.xy(),
            vel: state.body.vel.xy(),
        };
        reflect_in_bounds(
            &mut planar,
            &footprint,
            world.walls.width(),
            world.walls.height(),
            t.bounds_restitution,
        );
        state.body.pos = Vec3F::from_xy(planar.pos, state.body.pos.z);
        state.body.vel = Vec3F::from_xy(planar.vel, state.body.vel.z);
        reflect_depth(&mut state.body, Fixed::ZERO, t.z_max, t.depth_restitution);

        if state.attack == AttackPhase::Active {
            pin_to_boundary(&mut state.body, mid);
        }
        let convex = state.body.pos.z >= mid;
        state.convex = convex;
        set_member_immunity(world, circle, convex);

        if track_convex(state, t, dt) {
            ctx.metrics.depth_nudges += 1;
            debug!("storm circle {circle} nudged out of convex");
            ctx.emit(GameEvent::DepthNudge { circle });
        }

        let (ax, ay) = state.body.pos.xy().grid();
        let previous = state.attack;
        step_attack(state, circle, (ax, ay), world.walls.width(), world.walls.height(), ctx);
        if state.attack != previous {
            ctx.emit(GameEvent::BossPhaseChanged {
                entity: circle,
                kind: BossKind::Storm,
                phase: state.attack.label(),
            });
        }

        if world.position(circle).map(|p| p.cell()) != Some((ax, ay)) {
            move_composite(world, circle, ax, ay);
        }

        state.contact_cooldown = state.contact_cooldown.countdown(dt);
        if convex {
            let report = cursor_contact(world, circle, ctx.cursor);
            if report.shield_overlap() {
                ctx.emit(GameEvent::EnergyDrain {
                    source: circle,
                    amount: report.shield_cells as i32 * tuning.shield.drain_per_cell,
                });
            } else if report.direct && state.contact_cooldown.is_zero() {
                state.contact_cooldown = t.contact_cooldown;
                ctx.emit(GameEvent::CursorDamage {
                    source: circle,
                    amount: t.contact_damage,
                });
            }
        }

        if let Some(slot) = world.circles.get_mut(circle) {
            *slot = *state;
        }
    }
}

/// Hold an attacking circle on the convex side of the midpoint
fn pin_to_boundary(body: &mut Body3, mid: Fixed) {
    if body.pos.z < mid {
        body.pos.z = mid;
    }
    if body.vel.z.is_negative() {
        body.vel.z = Fixed::ZERO;
    }
}

fn set_member_immunity(world: &mut World, circle: Entity, immune: bool) {
    let Some(h) = world.headers.get(circle) else {
        return;
    };
    let members: Vec<Entity> = h.members.iter().map(|m| m.entity).collect();
    for member in members {
        if let Some(p) = world.protections.get_mut(member) {
            p.damage_immune = immune;
        }
    }
}

/// Accumulate convex time outside attacks; after `max_convex_duration`
/// push the circle back toward concave. Returns true when it nudged.
pub fn track_convex(state: &mut CircleState, t: &StormTuning, dt: Fixed) -> bool {
    if !state.convex || state.attack == AttackPhase::Active {
        if !state.convex {
            state.convex_time = Fixed::ZERO;
        }
        return false;
    }
    state.convex_time += dt;
    if state.convex_time < t.max_convex_duration {
        return false;
    }
    state.convex_time = Fixed::ZERO;
    state.body.vel.z -= t.depth_nudge;
    true
}

/// Colour-specific attack cycle for one circle
fn step_attack(
    state: &mut CircleState,
    circle: Entity,
    anchor: (i32, i32),
    width: i32,
    height: i32,
    ctx: &mut SystemContext<'_>,
) {
    let tuning = ctx.tuning;
    let t = &tuning.storm;
    let dt = ctx.dt;
    match state.attack {
        AttackPhase::Idle => {
            // stagger the first attack by colour
            let order = CircleColor::ALL.iter().position(|c| *c == state.color).unwrap_or(0) as i64;
            state.attack = AttackPhase::Cooldown;
            state.attack_timer = t.attack_cooldown + t.attack_cooldown.mul_int(order).div_int(3);
        }
        AttackPhase::Cooldown => {
            state.attack_timer = state.attack_timer.countdown(dt);
            if state.attack_timer.is_zero() && state.convex {
                state.attack = AttackPhase::Active;
                state.attack_timer = t.attack_duration;
                begin_attack(state, circle, anchor, width, height, ctx);
            }
        }
        AttackPhase::Active => {
            state.attack_timer = state.attack_timer.countdown(dt);
            continue_attack(state, circle, anchor, ctx);
            if state.attack_timer.is_zero() {
                state.attack = AttackPhase::Cooldown;
                state.attack_timer = t.attack_cooldown;
                state.pending_spawn = None;
            }
        }
    }
}

fn begin_attack(
    state: &mut CircleState,
    circle: Entity,
    (ax, ay): (i32, i32),
    width: i32,
    height: i32,
    ctx: &mut SystemContext<'_>,
) {
    let tuning = ctx.tuning;
    let t = &tuning.storm;
    match state.color {
        CircleColor::Green => {
            state.pulse_timer = Fixed::ZERO;
        }
        CircleColor::Red => {
            let aim = ctx.cursor.center() - state.body.pos.xy();
            state.locked_dir = aim.normalize();
            let count = t.volley_count as i32;
            for k in 0..count {
                let spread = degrees_to_bam(t.volley_spread_degrees * (2 * k - (count - 1)) / 2);
                let vel = state.locked_dir.rotate_bam(spread) * t.projectile_speed;
                ctx.emit(GameEvent::ProjectileSpawned {
                    owner: circle,
                    x: ax,
                    y: ay,
                    vel,
                });
            }
            ctx.emit(GameEvent::Sound(SoundCue::Volley));
        }
        CircleColor::Blue => {
            let (ox, oy) = ctx.rng.offset_in_radius(t.spawn_offset_radius);
            let x = (ax + ox).clamp(0, width - 1);
            let y = (ay + oy).clamp(0, height - 1);
            state.pending_spawn = Some((x, y));
            state.spawn_timer = t.spawn_delay;
            ctx.emit(GameEvent::Splash {
                kind: SplashKind::SpawnWarning,
                x,
                y,
            });
        }
    }
}

fn continue_attack(state: &mut CircleState, circle: Entity, (ax, ay): (i32, i32), ctx: &mut SystemContext<'_>) {
    let tuning = ctx.tuning;
    let t = &tuning.storm;
    let dt = ctx.dt;
    match state.color {
        CircleColor::Green => {
            state.pulse_timer = state.pulse_timer.countdown(dt);
            if !state.pulse_timer.is_zero() {
                return;
            }
            state.pulse_timer = t.pulse_interval;
            ctx.emit(GameEvent::Splash {
                kind: SplashKind::Pulse,
                x: ax,
                y: ay,
            });
            ctx.emit(GameEvent::Sound(SoundCue::Pulse));
            let area = Ellipse::from_cells(t.pulse_radius_x, t.pulse_radius_y);
            if area.contains_cell(ctx.cursor.x - ax, ctx.cursor.y - ay) {
                let event = if ctx.cursor.shield_active {
                    GameEvent::EnergyDrain {
                        source: circle,
                        amount: t.pulse_damage,
                    }
                } else {
                    GameEvent::CursorDamage {
                        source: circle,
                        amount: t.pulse_damage,
                    }
                };
                ctx.emit(event);
            }
        }
        CircleColor::Red => {}
        CircleColor::Blue => {
            let Some((x, y)) = state.pending_spawn else {
                return;
            };
            state.spawn_timer = state.spawn_timer.countdown(dt);
            if state.spawn_timer.is_zero() {
                state.pending_spawn = None;
                debug!("storm circle {circle} summons a swarm at ({x}, {y})");
                ctx.requests.push(Request::Spawn {
                    kind: BossKind::Swarm,
                    x,
                    y,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::testing::Harness;
    use crate::sim::walls::{WallGrid, mask};

    fn circle(h: &Harness, e: Entity) -> CircleState {
        *h.world.circles.get(e).expect("circle state")
    }

    fn circles(h: &Harness, root: Entity) -> [Entity; 3] {
        h.world.storms.get(root).expect("storm").circles
    }

    fn idle_state(color: CircleColor) -> CircleState {
        CircleState {
            storm: Entity::NONE,
            color,
            body: Body3::default(),
            attack: AttackPhase::Cooldown,
            attack_timer: Fixed::ZERO,
            pulse_timer: Fixed::ZERO,
            convex_time: Fixed::ZERO,
            convex: true,
            locked_dir: Vec2F::X,
            pending_spawn: None,
            spawn_timer: Fixed::ZERO,
            contact_cooldown: Fixed::ZERO,
        }
    }

    #[test]
    fn test_spawn_builds_container_with_three_circles() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        let header = h.world.headers.get(root).expect("container");
        assert_eq!(header.members.len(), 3);
        for (i, c) in circles(&h, root).into_iter().enumerate() {
            let s = circle(&h, c);
            assert_eq!(s.color, CircleColor::ALL[i]);
            assert_eq!(s.storm, root);
            assert_eq!(h.world.headers.get(c).map(|hd| hd.parent), Some(root));
            assert!(h.world.headers.get(c).expect("circle").members.len() > 10);
        }
    }

    #[test]
    fn test_failed_circle_site_spawns_nothing() {
        let mut walls = WallGrid::open(120, 40);
        walls.fill_rect(0, 0, 119, 39, mask::ALL);
        walls.set(60, 20, 0);
        let mut h = Harness::new(walls);
        let result = h.with(|w, ctx| spawn(w, 60, 20, ctx));
        assert!(matches!(result, Err(SpawnError::NoFreeArea { .. })));
        assert_eq!(h.world.live_count(), 0);
        assert!(h.world.storms.is_empty());
    }

    #[test]
    fn test_convex_members_are_immune() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        h.steps(20);
        let mid = h.tuning.storm.z_max.div_int(2);
        for c in circles(&h, root) {
            let s = circle(&h, c);
            let members = &h.world.headers.get(c).expect("circle").members;
            for m in members {
                let immune = h.world.protections.get(m.entity).expect("protection").damage_immune;
                assert_eq!(immune, s.body.pos.z >= mid);
            }
        }
    }

    #[test]
    fn test_circle_dies_independently() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        let [green, red, blue] = circles(&h, root);
        let members: Vec<Entity> = h.world.headers.get(red).expect("red").members.iter().map(|m| m.entity).collect();
        for m in members {
            h.world.combats.get_mut(m).expect("member hp").hp = 0;
        }
        h.step();
        assert!(!h.world.is_alive(red));
        assert!(h.world.is_alive(green) && h.world.is_alive(blue));
        assert!(h.world.is_alive(root));
        let events = h.drain();
        assert!(events.iter().any(|ev| matches!(
            ev,
            GameEvent::StormCircleDestroyed { color: CircleColor::Red, .. }
        )));
        assert_eq!(h.world.headers.get(root).expect("container").members.len(), 2);
    }

    #[test]
    fn test_circle_removed_from_outside_is_reaped() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        let [green, red, blue] = circles(&h, root);
        let red_cells: Vec<Entity> = h.world.headers.get(red).expect("red").members.iter().map(|m| m.entity).collect();
        h.step();
        h.drain();

        h.world.despawn(red);
        h.steps(3);
        assert!(red_cells.iter().all(|&m| !h.world.is_alive(m)));
        assert!(h.world.is_alive(green) && h.world.is_alive(blue) && h.world.is_alive(root));
        assert_eq!(h.world.storms.get(root).expect("storm").circles, [green, Entity::NONE, blue]);
        assert_eq!(h.world.headers.get(root).expect("container").members.len(), 2);
        let events = h.drain();
        let destroyed = events
            .iter()
            .filter(|ev| matches!(ev, GameEvent::StormCircleDestroyed { color: CircleColor::Red, .. }))
            .count();
        assert_eq!(destroyed, 1);
        assert!(!events.iter().any(|ev| matches!(ev, GameEvent::BossDespawned { .. })));
    }

    #[test]
    fn test_all_circles_dead_kills_storm() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        for c in circles(&h, root) {
            let members: Vec<Entity> = h.world.headers.get(c).expect("circle").members.iter().map(|m| m.entity).collect();
            for m in members {
                h.world.despawn(m);
            }
        }
        h.step();
        assert_eq!(h.world.live_count(), 0);
        let events = h.drain();
        assert!(events.iter().any(|ev| matches!(
            ev,
            GameEvent::BossDespawned { kind: BossKind::Storm, reason: DespawnReason::Killed, .. }
        )));
    }

    #[test]
    fn test_nudge_once_per_window() {
        let t = StormTuning::default();
        let dt = Fixed::from_ratio(1, 60);
        let mut s = idle_state(CircleColor::Green);
        let mut nudge_ticks = Vec::new();
        for tick in 0..1500 {
            s.convex = true;
            if track_convex(&mut s, &t, dt) {
                nudge_ticks.push(tick);
            }
        }
        let window = (t.max_convex_duration / dt).ceil();
        assert_eq!(nudge_ticks.len() as i32, 1500 / window);
        for pair in nudge_ticks.windows(2) {
            assert!(pair[1] - pair[0] >= window - 1);
        }
        assert!(s.body.vel.z.is_negative());
    }

    #[test]
    fn test_no_nudge_while_attacking_or_concave() {
        let t = StormTuning::default();
        let dt = Fixed::from_ratio(1, 60);
        let mut s = idle_state(CircleColor::Red);
        s.attack = AttackPhase::Active;
        for _ in 0..1000 {
            assert!(!track_convex(&mut s, &t, dt));
        }
        s.attack = AttackPhase::Cooldown;
        s.convex = false;
        s.convex_time = Fixed::from_int(5);
        assert!(!track_convex(&mut s, &t, dt));
        assert_eq!(s.convex_time, Fixed::ZERO);
    }

    #[test]
    fn test_active_attack_pins_depth() {
        let mut body = Body3 {
            pos: Vec3F::new(Fixed::ZERO, Fixed::ZERO, Fixed::from_int(3)),
            vel: Vec3F::new(Fixed::ONE, Fixed::ZERO, Fixed::from_int(-4)),
            mass: Fixed::ONE,
        };
        pin_to_boundary(&mut body, Fixed::from_int(5));
        assert_eq!(body.pos.z, Fixed::from_int(5));
        assert_eq!(body.vel.z, Fixed::ZERO);
        assert_eq!(body.vel.x, Fixed::ONE);
    }

    #[test]
    fn test_red_volley_spreads_toward_cursor() {
        let mut h = Harness::open(120, 40);
        h.cursor.x = 90;
        h.cursor.y = 20;
        let mut s = idle_state(CircleColor::Red);
        s.body.pos = Vec3F::from_xy(Vec2F::cell_center(30, 20), Fixed::ZERO);
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (30, 20), 120, 40, ctx));
        assert_eq!(s.attack, AttackPhase::Active);
        let shots: Vec<Vec2F> = h
            .drain()
            .into_iter()
            .filter_map(|ev| match ev {
                GameEvent::ProjectileSpawned { vel, .. } => Some(vel),
                _ => None,
            })
            .collect();
        assert_eq!(shots.len(), h.tuning.storm.volley_count as usize);
        assert!(shots.iter().all(|v| v.x.is_positive()));
        let middle = shots[shots.len() / 2];
        assert!(middle.y.abs() < Fixed::from_ratio(1, 10));
    }

    #[test]
    fn test_green_pulse_hits_cursor_in_range() {
        let mut h = Harness::open(120, 40);
        h.cursor.x = 33;
        h.cursor.y = 20;
        let mut s = idle_state(CircleColor::Green);
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (30, 20), 120, 40, ctx));
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (30, 20), 120, 40, ctx));
        let events = h.drain();
        assert!(events.iter().any(|ev| matches!(ev, GameEvent::CursorDamage { .. })));
        assert!(events.iter().any(|ev| matches!(ev, GameEvent::Splash { kind: SplashKind::Pulse, .. })));
    }

    #[test]
    fn test_blue_summons_swarm_after_delay() {
        let mut h = Harness::open(120, 40);
        let mut s = idle_state(CircleColor::Blue);
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (60, 20), 120, 40, ctx));
        let (sx, sy) = s.pending_spawn.expect("pending summon");
        assert!((sx - 60).abs() <= h.tuning.storm.spawn_offset_radius);
        assert!((sy - 20).abs() <= h.tuning.storm.spawn_offset_radius);
        for _ in 0..70 {
            h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (60, 20), 120, 40, ctx));
        }
        let requests = h.requests.take_all();
        assert_eq!(
            requests,
            vec![Request::Spawn {
                kind: BossKind::Swarm,
                x: sx,
                y: sy
            }]
        );
    }

    #[test]
    fn test_cooldown_waits_for_convex() {
        let mut h = Harness::open(120, 40);
        let mut s = idle_state(CircleColor::Green);
        s.convex = false;
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (60, 20), 120, 40, ctx));
        assert_eq!(s.attack, AttackPhase::Cooldown);
        s.convex = true;
        h.with(|_, ctx| step_attack(&mut s, Entity::NONE, (60, 20), 120, 40, ctx));
        assert_eq!(s.attack, AttackPhase::Active);
    }

    #[test]
    fn test_breach_on_circle_removes_only_that_circle() {
        let mut h = Harness::open(120, 40);
        let root = h.spawn(BossKind::Storm, 60, 20);
        let [green, ..] = circles(&h, root);
        assert!(h.with(|w, ctx| handle_breach(w, green, ctx)));
        assert!(!h.world.is_alive(green));
        assert!(h.world.is_alive(root));
        assert!(h.with(|w, ctx| handle_breach(w, root, ctx)));
        assert_eq!(h.world.live_count(), 0);
    }
}
