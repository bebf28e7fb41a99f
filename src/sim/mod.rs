//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed-point arithmetic only (no floats in state)
//! - Seeded RNG only
//! - Stable iteration order (by entity slot)
//! - No terminal or platform dependencies

pub mod boss;
pub mod components;
pub mod composite;
pub mod damage;
pub mod events;
pub mod fixed;
pub mod metrics;
pub mod physics;
pub mod rng;
pub mod state;
pub mod targeting;
pub mod tick;
pub mod vector;
pub mod walls;
pub mod world;

pub use boss::{BossKind, DespawnReason};
pub use events::{EventQueue, GameEvent, Request, SoundCue};
pub use fixed::{Bam, Fixed};
pub use metrics::TickMetrics;
pub use state::{BossSnapshot, GameState};
pub use tick::{TickInput, tick};
pub use vector::{Ellipse, Vec2F, Vec3F};
pub use walls::WallGrid;
pub use world::{Entity, World};
