//! Error types
//!
//! Simulation paths never surface errors to the tick loop; these cover
//! spawn-site validation and loading tuning data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("spawn anchor ({x}, {y}) is outside the map and no free area was found")]
    OutOfBounds { x: i32, y: i32 },
    #[error("no free area within {radius} cells of ({x}, {y})")]
    NoFreeArea { x: i32, y: i32, radius: i32 },
    #[error("composite has no member cells")]
    EmptyFootprint,
}

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
