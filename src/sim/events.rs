//! Typed inbound requests and outbound game events
//!
//! Both directions use closed enums and FIFO queues; consumers match
//! exhaustively. Requests are persisted with the game state, outbound
//! events are transient.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::boss::storm::CircleColor;
use super::boss::{BossKind, DespawnReason};
use super::components::EntityKind;
use super::fixed::Fixed;
use super::vector::Vec2F;
use super::world::Entity;

/// Commands consumed at the start of a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Spawn {
        kind: BossKind,
        x: i32,
        y: i32,
    },
    /// Remove every boss of this kind
    Cancel {
        kind: BossKind,
    },
    /// A composite lost cells to an outside system
    IntegrityBreach {
        header: Entity,
    },
    /// Drop every entity and invalidate target groups
    Reset,
    /// Damage whatever `occupant` resolves to
    Damage {
        occupant: Entity,
        amount: i32,
        #[serde(default)]
        stun: Fixed,
    },
    AreaDamage {
        x: i32,
        y: i32,
        radius_x: i32,
        radius_y: i32,
        amount: i32,
    },
    AssignTargets {
        x: i32,
        y: i32,
        count: usize,
    },
    SpawnDrain {
        x: i32,
        y: i32,
        hp: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    BossSpawn,
    ChargeUp,
    Zap,
    ShieldHit,
    SwarmLock,
    Teleport,
    Absorb,
    Pulse,
    Volley,
    Explosion,
}

/// Visual telegraph markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplashKind {
    Charge,
    Lock,
    Teleport,
    Pulse,
    SpawnWarning,
}

/// Outbound notifications for scoring, audio, rendering and telemetry
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EnemyCreated {
        entity: Entity,
        kind: BossKind,
        x: i32,
        y: i32,
    },
    EnemyKilled {
        entity: Entity,
        kind: EntityKind,
        by_player: bool,
    },
    BossDespawned {
        entity: Entity,
        kind: BossKind,
        reason: DespawnReason,
    },
    CompositeDestroyed {
        header: Entity,
        members: usize,
    },
    MemberDestroyed {
        header: Entity,
        member: Entity,
    },
    Damaged {
        target: Entity,
        hit: Entity,
        amount: i32,
        remaining: i32,
    },
    CursorDamage {
        source: Entity,
        amount: i32,
    },
    EnergyDrain {
        source: Entity,
        amount: i32,
    },
    /// Unshielded contact with the Quasar
    HeatReset {
        source: Entity,
    },
    Sound(SoundCue),
    Splash {
        kind: SplashKind,
        x: i32,
        y: i32,
    },
    Lightning {
        owner: Entity,
        from: (i32, i32),
        to: (i32, i32),
    },
    ProjectileSpawned {
        owner: Entity,
        x: i32,
        y: i32,
        vel: Vec2F,
    },
    Dust {
        x: i32,
        y: i32,
    },
    BossPhaseChanged {
        entity: Entity,
        kind: BossKind,
        phase: &'static str,
    },
    DrainAbsorbed {
        boss: Entity,
        drain: Entity,
        hp: i32,
    },
    StormCircleDestroyed {
        storm: Entity,
        circle: Entity,
        color: CircleColor,
    },
    DepthNudge {
        circle: Entity,
    },
}

/// FIFO queue; drain order equals push order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueue<E> {
    items: VecDeque<E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<E> EventQueue<E> {
    #[inline]
    pub fn push(&mut self, item: E) {
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<E> {
        self.items.pop_front()
    }

    /// Take everything queued so far; items pushed afterwards stay queued
    pub fn take_all(&mut self) -> Vec<E> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let mut q = EventQueue::default();
        q.push(GameEvent::Dust { x: 1, y: 0 });
        q.push(GameEvent::Sound(SoundCue::Zap));
        q.push(GameEvent::Dust { x: 2, y: 0 });
        assert_eq!(q.pop(), Some(GameEvent::Dust { x: 1, y: 0 }));
        let rest = q.take_all();
        assert_eq!(
            rest,
            vec![GameEvent::Sound(SoundCue::Zap), GameEvent::Dust { x: 2, y: 0 }]
        );
        assert!(q.is_empty());
    }

    #[test]
    fn test_request_json_round_trip() {
        let mut q = EventQueue::default();
        q.push(Request::Spawn {
            kind: BossKind::Storm,
            x: 4,
            y: 9,
        });
        q.push(Request::Damage {
            occupant: Entity::new(3, 2),
            amount: 7,
            stun: Fixed::from_ratio(1, 3),
        });
        let json = serde_json::to_string(&q).expect("serialize");
        let back: EventQueue<Request> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.iter().collect::<Vec<_>>(), q.iter().collect::<Vec<_>>());
    }
}
