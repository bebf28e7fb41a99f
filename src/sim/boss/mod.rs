//! Boss state machines
//!
//! Each boss module exposes `spawn`, `update`, `cancel` and `handle_breach`
//! over the shared `World`. Systems never assume they own an entity's
//! lifecycle: bosses whose header vanished are reaped from the world
//! roster before any system runs, and every update checks that its
//! members still exist. Either way the encounter ends through the same
//! destruction path as a kill.

pub mod quasar;
pub mod storm;
pub mod swarm;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::components::{Cursor, EntityKind};
use super::composite::{Integrity, check_integrity, destroy_composite, reap_orphans};
use super::events::{EventQueue, GameEvent, Request, SoundCue};
use super::fixed::Fixed;
use super::metrics::TickMetrics;
use super::rng::SimRng;
use super::world::{Entity, World};
use crate::error::SpawnError;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossKind {
    Quasar,
    Swarm,
    Storm,
}

impl BossKind {
    pub const ALL: [BossKind; 3] = [BossKind::Quasar, BossKind::Swarm, BossKind::Storm];

    pub fn as_str(&self) -> &'static str {
        match self {
            BossKind::Quasar => "quasar",
            BossKind::Swarm => "swarm",
            BossKind::Storm => "storm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quasar" => Some(BossKind::Quasar),
            "swarm" => Some(BossKind::Swarm),
            "storm" => Some(BossKind::Storm),
            _ => None,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            BossKind::Quasar => EntityKind::Quasar,
            BossKind::Swarm => EntityKind::Swarm,
            BossKind::Storm => EntityKind::StormRoot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DespawnReason {
    /// Hit points exhausted by the player
    Killed,
    Cancelled,
    /// Composite integrity breached by an outside system
    Breach,
    /// Swarm finished its last charge
    ChargesExhausted,
    /// Swarm lifetime ran out
    Expired,
    /// Header disappeared without going through this system
    External,
    Reset,
}

impl DespawnReason {
    pub fn by_player(&self) -> bool {
        matches!(self, DespawnReason::Killed)
    }
}

/// Everything a boss system touches besides the world, borrowed for one tick
pub struct SystemContext<'a> {
    pub cursor: &'a Cursor,
    pub tuning: &'a Tuning,
    pub events: &'a mut EventQueue<GameEvent>,
    pub requests: &'a mut EventQueue<Request>,
    pub rng: &'a mut SimRng,
    pub metrics: &'a mut TickMetrics,
    pub dt: Fixed,
}

impl SystemContext<'_> {
    #[inline]
    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

/// End an encounter: destroy the composite (if still present) and emit the
/// lifecycle events. Kills also emit `EnemyKilled`.
pub fn finish_boss(
    world: &mut World,
    header: Entity,
    kind: BossKind,
    reason: DespawnReason,
    ctx: &mut SystemContext<'_>,
) {
    destroy_composite(world, header, ctx.events);
    world.roster.retain(|(e, _)| *e != header);
    if reason.by_player() {
        ctx.metrics.kills += 1;
        ctx.emit(GameEvent::EnemyKilled {
            entity: header,
            kind: kind.entity_kind(),
            by_player: true,
        });
        ctx.emit(GameEvent::Sound(SoundCue::Explosion));
    }
    ctx.metrics.despawns += 1;
    info!("{} {header} despawned: {reason:?}", kind.as_str());
    ctx.emit(GameEvent::BossDespawned {
        entity: header,
        kind,
        reason,
    });
}

pub fn spawn(kind: BossKind, world: &mut World, x: i32, y: i32, ctx: &mut SystemContext<'_>) -> Result<Entity, SpawnError> {
    let header = match kind {
        BossKind::Quasar => quasar::spawn(world, x, y, ctx)?,
        BossKind::Swarm => swarm::spawn(world, x, y, ctx)?,
        BossKind::Storm => storm::spawn(world, x, y, ctx)?,
    };
    world.roster.push((header, kind));
    ctx.metrics.spawns += 1;
    ctx.emit(GameEvent::Sound(SoundCue::BossSpawn));
    Ok(header)
}

pub fn cancel(kind: BossKind, world: &mut World, ctx: &mut SystemContext<'_>) {
    match kind {
        BossKind::Quasar => quasar::cancel(world, ctx),
        BossKind::Swarm => swarm::cancel(world, ctx),
        BossKind::Storm => storm::cancel(world, ctx),
    }
}

/// Route a breach to whichever system owns `header`; false if none does
pub fn handle_breach(world: &mut World, header: Entity, ctx: &mut SystemContext<'_>) -> bool {
    quasar::handle_breach(world, header, ctx)
        || swarm::handle_breach(world, header, ctx)
        || storm::handle_breach(world, header, ctx)
}

/// Run every boss system once, in a fixed order
pub fn update_all(world: &mut World, ctx: &mut SystemContext<'_>) {
    reap_lost(world, ctx);
    quasar::update(world, ctx);
    swarm::update(world, ctx);
    storm::update(world, ctx);
}

/// End every boss whose header was despawned outside its own system,
/// taking its members and child composites with it
fn reap_lost(world: &mut World, ctx: &mut SystemContext<'_>) {
    let lost: Vec<(Entity, BossKind)> = world
        .roster
        .iter()
        .copied()
        .filter(|&(header, _)| check_integrity(world, header) == Integrity::HeaderLost)
        .collect();
    for (header, kind) in lost {
        let removed = reap_orphans(world, header, ctx.events);
        warn!("{} {header} removed from outside; reaped {removed} entities", kind.as_str());
        finish_boss(world, header, kind, DespawnReason::External, ctx);
    }
}

/// Every live boss header with its kind, in slot order per kind
pub fn live_bosses(world: &World) -> Vec<(Entity, BossKind)> {
    let mut out: Vec<(Entity, BossKind)> = world
        .quasars
        .iter()
        .map(|(e, _)| (e, BossKind::Quasar))
        .collect();
    out.extend(world.swarms.iter().map(|(e, _)| (e, BossKind::Swarm)));
    out.extend(world.storms.iter().map(|(e, _)| (e, BossKind::Storm)));
    out
}

/// Per-tick scaling of a timer-style damping factor: `max(0, 1 - rate * dt)`
pub(crate) fn damping_keep(rate: Fixed, dt: Fixed) -> Fixed {
    (Fixed::ONE - rate * dt).max(Fixed::ZERO)
}

/// Drives boss systems without the full tick loop
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::sim::vector::Ellipse;
    use crate::sim::walls::WallGrid;

    pub struct Harness {
        pub world: World,
        pub cursor: Cursor,
        pub tuning: Tuning,
        pub events: EventQueue<GameEvent>,
        pub requests: EventQueue<Request>,
        pub rng: SimRng,
        pub metrics: TickMetrics,
        pub dt: Fixed,
    }

    impl Harness {
        pub fn new(walls: WallGrid) -> Self {
            let tuning = Tuning::default();
            let shield = Ellipse::from_cells(tuning.shield.radius_x, tuning.shield.radius_y);
            Self {
                world: World::new(walls),
                cursor: Cursor::new(0, 0, shield),
                tuning,
                events: EventQueue::default(),
                requests: EventQueue::default(),
                rng: SimRng::new(1234),
                metrics: TickMetrics::default(),
                dt: Fixed::from_ratio(1, 60),
            }
        }

        pub fn open(width: i32, height: i32) -> Self {
            Self::new(WallGrid::open(width, height))
        }

        pub fn with<R>(&mut self, f: impl FnOnce(&mut World, &mut SystemContext<'_>) -> R) -> R {
            let mut ctx = SystemContext {
                cursor: &self.cursor,
                tuning: &self.tuning,
                events: &mut self.events,
                requests: &mut self.requests,
                rng: &mut self.rng,
                metrics: &mut self.metrics,
                dt: self.dt,
            };
            f(&mut self.world, &mut ctx)
        }

        pub fn spawn(&mut self, kind: BossKind, x: i32, y: i32) -> Entity {
            self.with(|w, ctx| spawn(kind, w, x, y, ctx)).expect("boss spawn")
        }

        pub fn step(&mut self) {
            self.with(update_all);
        }

        pub fn steps(&mut self, n: usize) {
            for _ in 0..n {
                self.step();
            }
        }

        pub fn drain(&mut self) -> Vec<GameEvent> {
            self.events.take_all()
        }

        /// Phase labels announced for `entity`, in order
        pub fn phases(events: &[GameEvent], entity: Entity) -> Vec<&'static str> {
            events
                .iter()
                .filter_map(|e| match e {
                    GameEvent::BossPhaseChanged { entity: e, phase, .. } if *e == entity => Some(*phase),
                    _ => None,
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;

    #[test]
    fn test_boss_kind_parse() {
        for kind in BossKind::ALL {
            assert_eq!(BossKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BossKind::parse("Storm"), Some(BossKind::Storm));
        assert_eq!(BossKind::parse("eye"), None);
    }

    #[test]
    fn test_outside_header_removal_ends_each_boss() {
        for kind in BossKind::ALL {
            let mut h = Harness::open(120, 40);
            let header = h.spawn(kind, 60, 20);
            h.step();
            h.drain();
            assert_eq!(h.world.roster, vec![(header, kind)]);

            h.world.despawn(header);
            h.steps(3);
            assert_eq!(h.world.live_count(), 0, "{kind:?} left entities behind");
            assert!(h.world.roster.is_empty());
            let despawns: Vec<DespawnReason> = h
                .drain()
                .into_iter()
                .filter_map(|e| match e {
                    GameEvent::BossDespawned { entity, reason, .. } if entity == header => Some(reason),
                    _ => None,
                })
                .collect();
            assert_eq!(despawns, vec![DespawnReason::External]);
        }
    }

    #[test]
    fn test_finished_bosses_leave_roster() {
        let mut h = Harness::open(120, 40);
        let q = h.spawn(BossKind::Quasar, 20, 20);
        let s = h.spawn(BossKind::Swarm, 60, 20);
        assert_eq!(h.world.roster, vec![(q, BossKind::Quasar), (s, BossKind::Swarm)]);
        h.with(|w, ctx| cancel(BossKind::Quasar, w, ctx));
        assert_eq!(h.world.roster, vec![(s, BossKind::Swarm)]);
    }

    #[test]
    fn test_only_kills_credit_player() {
        assert!(DespawnReason::Killed.by_player());
        assert!(!DespawnReason::Expired.by_player());
        assert!(!DespawnReason::ChargesExhausted.by_player());
    }
}
