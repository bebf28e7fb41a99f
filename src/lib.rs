//! Boss Engine - composite-entity combat and physics for a terminal action game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (fixed-point physics, composites, boss state machines)
//! - `tuning`: Data-driven boss balance
//! - `error`: Spawn and tuning error types

pub mod error;
pub mod sim;
pub mod tuning;

pub use error::{SpawnError, TuningError};
pub use tuning::Tuning;

/// Engine configuration constants
pub mod consts {
    /// Fixed simulation timestep in seconds (60 Hz)
    pub const SIM_DT: f64 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Upper bound on the delta fed into one tick (bounds displacement, prevents tunneling)
    pub const MAX_DT: f64 = 0.1;

    /// Default map dimensions in cells
    pub const DEFAULT_MAP_WIDTH: i32 = 120;
    pub const DEFAULT_MAP_HEIGHT: i32 = 40;

    /// Spiral search radius used when a spawn site is blocked
    pub const SPAWN_SEARCH_RADIUS: i32 = 12;
}
