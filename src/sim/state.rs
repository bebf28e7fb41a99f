//! Game state and telemetry snapshots
//!
//! All state that must be persisted for save/restore and determinism lives
//! here. Outbound events are transient; the spatial index is rebuilt on load.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::boss::{self, BossKind, SystemContext};
use super::components::Cursor;
use super::events::{EventQueue, GameEvent, Request};
use super::fixed::Fixed;
use super::metrics::TickMetrics;
use super::rng::SimRng;
use super::targeting::TargetGroups;
use super::vector::Ellipse;
use super::walls::WallGrid;
use super::world::{Entity, World};
use crate::consts::*;
use crate::tuning::Tuning;

/// Complete engine state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: SimRng,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub world: World,
    pub cursor: Cursor,
    pub tuning: Tuning,
    pub target_groups: TargetGroups,
    /// Inbound commands, consumed FIFO at the start of the next tick
    pub requests: EventQueue<Request>,
    /// Outbound events since the last `drain_events`
    #[serde(skip)]
    pub events: EventQueue<GameEvent>,
}

/// Read-only view of one boss for UI and telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BossSnapshot {
    pub entity: Entity,
    pub kind: BossKind,
    pub hp: i32,
    pub max_hp: i32,
    pub phase: &'static str,
    pub position: Vec2,
}

impl GameState {
    /// Create a new game state with the given seed, map and balance table
    pub fn new(seed: u64, walls: WallGrid, tuning: Tuning) -> Self {
        let shield = Ellipse::from_cells(tuning.shield.radius_x, tuning.shield.radius_y);
        let cursor = Cursor::new(walls.width() / 2, walls.height() / 2, shield);
        Self {
            seed,
            rng: SimRng::new(seed),
            time_ticks: 0,
            world: World::new(walls),
            cursor,
            tuning,
            target_groups: TargetGroups::default(),
            requests: EventQueue::default(),
            events: EventQueue::default(),
        }
    }

    /// Open default-sized map with default tuning
    pub fn with_defaults(seed: u64) -> Self {
        Self::new(
            seed,
            WallGrid::open(DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT),
            Tuning::default(),
        )
    }

    pub fn push_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.take_all()
    }

    /// Split into the world and a system context over the remaining fields
    pub fn systems<'a>(&'a mut self, metrics: &'a mut TickMetrics, dt: Fixed) -> (&'a mut World, SystemContext<'a>) {
        let ctx = SystemContext {
            cursor: &self.cursor,
            tuning: &self.tuning,
            events: &mut self.events,
            requests: &mut self.requests,
            rng: &mut self.rng,
            metrics,
            dt,
        };
        (&mut self.world, ctx)
    }

    pub fn boss_snapshots(&self) -> Vec<BossSnapshot> {
        let world = &self.world;
        boss::live_bosses(world)
            .into_iter()
            .filter_map(|(entity, kind)| match kind {
                BossKind::Quasar => {
                    let q = world.quasars.get(entity)?;
                    let c = world.combats.get(entity)?;
                    Some(BossSnapshot {
                        entity,
                        kind,
                        hp: c.hp,
                        max_hp: c.max_hp,
                        phase: q.phase.label(),
                        position: q.kinetic.pos.to_vec2(),
                    })
                }
                BossKind::Swarm => {
                    let s = world.swarms.get(entity)?;
                    let c = world.combats.get(entity)?;
                    Some(BossSnapshot {
                        entity,
                        kind,
                        hp: c.hp,
                        max_hp: c.max_hp,
                        phase: s.phase.label(),
                        position: s.kinetic.pos.to_vec2(),
                    })
                }
                BossKind::Storm => {
                    let storm = world.storms.get(entity)?;
                    let live = storm.live_circles(world);
                    let hp = live
                        .iter()
                        .filter_map(|&c| world.headers.get(c))
                        .flat_map(|h| h.members.iter())
                        .filter_map(|m| world.combats.get(m.entity))
                        .map(|c| c.hp.max(0))
                        .sum();
                    let per_circle = boss::storm::circle_shape(&self.tuning.storm).len() as i32;
                    let phase = match live.len() {
                        3 => "three_circles",
                        2 => "two_circles",
                        _ => "last_circle",
                    };
                    Some(BossSnapshot {
                        entity,
                        kind,
                        hp,
                        max_hp: per_circle * self.tuning.storm.member_hp * 3,
                        phase,
                        position: storm.center.xy().to_vec2(),
                    })
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a saved state; the spatial index is rebuilt from positions
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut state: Self = serde_json::from_str(json)?;
        state.world.rebuild_index();
        Ok(state)
    }
}
