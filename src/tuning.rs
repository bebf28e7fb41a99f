//! Boss balance data
//!
//! Loaded from JSON (decimal numbers for fixed-point knobs, converted once
//! at load). Every field has a default, so a partial file only overrides
//! what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TuningError;
use crate::sim::fixed::{Fixed, as_float};
use crate::sim::physics::{HomingProfile, OrbitParams};

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "norm" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Boss hit point multiplier as (numerator, denominator)
    pub fn hp_scale(&self) -> (i32, i32) {
        match self {
            Difficulty::Easy => (3, 4),
            Difficulty::Normal => (1, 1),
            Difficulty::Hard => (3, 2),
        }
    }

    /// Cursor damage multiplier as (numerator, denominator)
    pub fn damage_scale(&self) -> (i32, i32) {
        match self {
            Difficulty::Easy => (1, 2),
            Difficulty::Normal => (1, 1),
            Difficulty::Hard => (2, 1),
        }
    }
}

/// Homing profiles per boss
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingTuning {
    pub quasar: HomingProfile,
    pub swarm: HomingProfile,
}

impl Default for HomingTuning {
    fn default() -> Self {
        Self {
            quasar: HomingProfile {
                acceleration: Fixed::from_int(30),
                max_speed: Fixed::from_int(8),
                ..HomingProfile::default()
            },
            swarm: HomingProfile {
                acceleration: Fixed::from_int(50),
                max_speed: Fixed::from_int(14),
                drag: Fixed::from_ratio(3, 2),
                ..HomingProfile::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuasarTuning {
    pub hp: i32,
    /// Zap-range ellipse radii in cells
    pub zap_radius_x: i32,
    pub zap_radius_y: i32,
    /// Seconds outside range before the beam fires
    #[serde(with = "as_float")]
    pub charge_time: Fixed,
    #[serde(with = "as_float")]
    pub zap_interval: Fixed,
    pub zap_damage: i32,
    /// Velocity fraction removed per second while zapping
    #[serde(with = "as_float")]
    pub zap_hold_damping: Fixed,
    #[serde(with = "as_float")]
    pub escalation_interval: Fixed,
    #[serde(with = "as_float")]
    pub escalation_step: Fixed,
    #[serde(with = "as_float")]
    pub max_speed_mult: Fixed,
    #[serde(with = "as_float")]
    pub mass: Fixed,
}

impl Default for QuasarTuning {
    fn default() -> Self {
        Self {
            hp: 600,
            zap_radius_x: 18,
            zap_radius_y: 9,
            charge_time: Fixed::from_int(2),
            zap_interval: Fixed::from_ratio(1, 2),
            zap_damage: 8,
            zap_hold_damping: Fixed::from_int(6),
            escalation_interval: Fixed::from_int(4),
            escalation_step: Fixed::from_ratio(1, 4),
            max_speed_mult: Fixed::from_ratio(5, 2),
            mass: Fixed::from_int(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmTuning {
    pub hp: i32,
    #[serde(with = "as_float")]
    pub charge_interval: Fixed,
    #[serde(with = "as_float")]
    pub lock_duration: Fixed,
    #[serde(with = "as_float")]
    pub charge_duration: Fixed,
    #[serde(with = "as_float")]
    pub teleport_delay: Fixed,
    #[serde(with = "as_float")]
    pub decelerate_duration: Fixed,
    /// Velocity fraction removed per second while decelerating
    #[serde(with = "as_float")]
    pub decelerate_drag: Fixed,
    pub max_charges: u32,
    #[serde(with = "as_float")]
    pub lifetime: Fixed,
    /// Seconds between animation pattern toggles
    #[serde(with = "as_float")]
    pub pattern_interval: Fixed,
    pub separation_radius_x: i32,
    pub separation_radius_y: i32,
    #[serde(with = "as_float")]
    pub separation_strength: Fixed,
    #[serde(with = "as_float")]
    pub cross_species_mult: Fixed,
    pub teleport_search_radius: i32,
    pub contact_damage: i32,
    #[serde(with = "as_float")]
    pub contact_cooldown: Fixed,
    #[serde(with = "as_float")]
    pub mass: Fixed,
}

impl Default for SwarmTuning {
    fn default() -> Self {
        Self {
            hp: 240,
            charge_interval: Fixed::from_int(4),
            lock_duration: Fixed::from_ratio(3, 4),
            charge_duration: Fixed::from_ratio(1, 2),
            teleport_delay: Fixed::from_ratio(1, 2),
            decelerate_duration: Fixed::from_ratio(3, 5),
            decelerate_drag: Fixed::from_int(10),
            max_charges: 6,
            lifetime: Fixed::from_int(60),
            pattern_interval: Fixed::from_ratio(1, 4),
            separation_radius_x: 8,
            separation_radius_y: 4,
            separation_strength: Fixed::from_int(10),
            cross_species_mult: Fixed::HALF,
            teleport_search_radius: 10,
            contact_damage: 6,
            contact_cooldown: Fixed::from_ratio(1, 2),
            mass: Fixed::from_int(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StormTuning {
    /// Hit points of each circle member cell
    pub member_hp: i32,
    pub circle_radius_x: i32,
    pub circle_radius_y: i32,
    /// Initial distance of each circle from the storm centre
    pub spawn_spread: i32,
    pub orbit: OrbitParams,
    #[serde(with = "as_float")]
    pub initial_speed: Fixed,
    /// Depth axis spans `0..=z_max`; the midpoint splits convex from concave
    #[serde(with = "as_float")]
    pub z_max: Fixed,
    #[serde(with = "as_float")]
    pub depth_restitution: Fixed,
    #[serde(with = "as_float")]
    pub bounds_restitution: Fixed,
    #[serde(with = "as_float")]
    pub collision_radius: Fixed,
    #[serde(with = "as_float")]
    pub collision_restitution: Fixed,
    /// Longest a circle may stay convex outside an attack before a nudge
    #[serde(with = "as_float")]
    pub max_convex_duration: Fixed,
    #[serde(with = "as_float")]
    pub depth_nudge: Fixed,
    #[serde(with = "as_float")]
    pub attack_cooldown: Fixed,
    #[serde(with = "as_float")]
    pub attack_duration: Fixed,
    #[serde(with = "as_float")]
    pub pulse_interval: Fixed,
    pub pulse_radius_x: i32,
    pub pulse_radius_y: i32,
    pub pulse_damage: i32,
    pub volley_count: u32,
    /// Spread between neighbouring projectiles, degrees
    pub volley_spread_degrees: i32,
    #[serde(with = "as_float")]
    pub projectile_speed: Fixed,
    pub spawn_offset_radius: i32,
    #[serde(with = "as_float")]
    pub spawn_delay: Fixed,
    pub contact_damage: i32,
    #[serde(with = "as_float")]
    pub contact_cooldown: Fixed,
}

impl Default for StormTuning {
    fn default() -> Self {
        Self {
            member_hp: 4,
            circle_radius_x: 4,
            circle_radius_y: 2,
            spawn_spread: 12,
            orbit: OrbitParams::default(),
            initial_speed: Fixed::from_int(6),
            z_max: Fixed::from_int(10),
            depth_restitution: Fixed::from_ratio(4, 5),
            bounds_restitution: Fixed::from_ratio(4, 5),
            collision_radius: Fixed::from_int(3),
            collision_restitution: Fixed::from_ratio(9, 10),
            max_convex_duration: Fixed::from_int(6),
            depth_nudge: Fixed::from_int(6),
            attack_cooldown: Fixed::from_int(3),
            attack_duration: Fixed::from_ratio(3, 2),
            pulse_interval: Fixed::from_ratio(1, 2),
            pulse_radius_x: 10,
            pulse_radius_y: 5,
            pulse_damage: 4,
            volley_count: 5,
            volley_spread_degrees: 12,
            projectile_speed: Fixed::from_int(20),
            spawn_offset_radius: 10,
            spawn_delay: Fixed::ONE,
            contact_damage: 5,
            contact_cooldown: Fixed::from_ratio(1, 2),
        }
    }
}

/// Soft collision between bosses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionTuning {
    #[serde(with = "as_float")]
    pub soft_strength: Fixed,
    #[serde(with = "as_float")]
    pub immunity: Fixed,
    /// Velocity kept when bouncing off a wall or the map edge
    #[serde(with = "as_float")]
    pub wall_restitution: Fixed,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            soft_strength: Fixed::from_int(6),
            immunity: Fixed::from_ratio(3, 10),
            wall_restitution: Fixed::from_ratio(3, 5),
        }
    }
}

/// The player's shield as seen by the bosses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldTuning {
    pub radius_x: i32,
    pub radius_y: i32,
    /// Energy drained per overlapping cell per tick
    pub drain_per_cell: i32,
    #[serde(with = "as_float")]
    pub knockback_impulse: Fixed,
    #[serde(with = "as_float")]
    pub knockback_immunity: Fixed,
}

impl Default for ShieldTuning {
    fn default() -> Self {
        Self {
            radius_x: 6,
            radius_y: 3,
            drain_per_cell: 1,
            knockback_impulse: Fixed::from_int(12),
            knockback_immunity: Fixed::from_ratio(2, 5),
        }
    }
}

/// Complete balance table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub homing: HomingTuning,
    pub quasar: QuasarTuning,
    pub swarm: SwarmTuning,
    pub storm: StormTuning,
    pub collision: CollisionTuning,
    pub shield: ShieldTuning,
}

fn invalid(field: &'static str, reason: impl Into<String>) -> TuningError {
    TuningError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require_positive(field: &'static str, value: Fixed) -> Result<(), TuningError> {
    if value.is_positive() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be > 0, got {value}")))
    }
}

fn require_cells(field: &'static str, value: i32) -> Result<(), TuningError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be at least 1 cell, got {value}")))
    }
}

impl Tuning {
    /// Defaults with hit points and cursor damage scaled for a difficulty
    pub fn from_preset(difficulty: Difficulty) -> Self {
        let mut tuning = Self::default();
        tuning.apply_preset(difficulty);
        tuning
    }

    pub fn apply_preset(&mut self, difficulty: Difficulty) {
        let (hn, hd) = difficulty.hp_scale();
        let (dn, dd) = difficulty.damage_scale();
        let hp = |v: i32| (v * hn / hd).max(1);
        let dmg = |v: i32| (v * dn / dd).max(1);
        self.quasar.hp = hp(self.quasar.hp);
        self.swarm.hp = hp(self.swarm.hp);
        self.storm.member_hp = hp(self.storm.member_hp);
        self.quasar.zap_damage = dmg(self.quasar.zap_damage);
        self.swarm.contact_damage = dmg(self.swarm.contact_damage);
        self.storm.pulse_damage = dmg(self.storm.pulse_damage);
        self.storm.contact_damage = dmg(self.storm.contact_damage);
    }

    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&text)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), TuningError> {
        require_cells("quasar.hp", self.quasar.hp)?;
        require_cells("quasar.zap_radius_x", self.quasar.zap_radius_x)?;
        require_cells("quasar.zap_radius_y", self.quasar.zap_radius_y)?;
        require_positive("quasar.zap_interval", self.quasar.zap_interval)?;
        require_positive("quasar.mass", self.quasar.mass)?;
        if self.quasar.max_speed_mult < Fixed::ONE {
            return Err(invalid("quasar.max_speed_mult", "must be >= 1"));
        }

        require_cells("swarm.hp", self.swarm.hp)?;
        require_positive("swarm.charge_duration", self.swarm.charge_duration)?;
        require_positive("swarm.pattern_interval", self.swarm.pattern_interval)?;
        require_positive("swarm.mass", self.swarm.mass)?;
        require_cells("swarm.separation_radius_x", self.swarm.separation_radius_x)?;
        require_cells("swarm.separation_radius_y", self.swarm.separation_radius_y)?;
        if self.swarm.max_charges == 0 {
            return Err(invalid("swarm.max_charges", "must be at least 1"));
        }

        require_cells("storm.member_hp", self.storm.member_hp)?;
        require_cells("storm.circle_radius_x", self.storm.circle_radius_x)?;
        require_cells("storm.circle_radius_y", self.storm.circle_radius_y)?;
        require_cells("storm.pulse_radius_x", self.storm.pulse_radius_x)?;
        require_cells("storm.pulse_radius_y", self.storm.pulse_radius_y)?;
        require_positive("storm.z_max", self.storm.z_max)?;
        require_positive("storm.max_convex_duration", self.storm.max_convex_duration)?;
        require_positive("storm.pulse_interval", self.storm.pulse_interval)?;
        require_positive("storm.collision_radius", self.storm.collision_radius)?;
        if self.storm.spawn_delay > self.storm.attack_duration {
            return Err(invalid("storm.spawn_delay", "must not exceed storm.attack_duration"));
        }

        require_cells("shield.radius_x", self.shield.radius_x)?;
        require_cells("shield.radius_y", self.shield.radius_y)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Tuning::default().validate().is_ok());
        for d in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
            assert!(Tuning::from_preset(d).validate().is_ok());
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let t = Tuning::from_json(r#"{ "quasar": { "zap_radius_x": 5, "charge_time": 1.25 } }"#).expect("parse");
        assert_eq!(t.quasar.zap_radius_x, 5);
        assert_eq!(t.quasar.charge_time, Fixed::from_ratio(5, 4));
        assert_eq!(t.quasar.zap_radius_y, QuasarTuning::default().zap_radius_y);
        assert_eq!(t.swarm, SwarmTuning::default());
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = Tuning::from_json(r#"{ "swarm": { "max_charges": 0 } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "swarm.max_charges", .. }));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(Tuning::from_json("{ nope"), Err(TuningError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            Tuning::load("/definitely/not/here.json"),
            Err(TuningError::Io(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let t = Tuning::from_preset(Difficulty::Hard);
        let back = Tuning::from_json(&t.to_json().expect("json")).expect("parse");
        assert_eq!(back.quasar.hp, t.quasar.hp);
        assert_eq!(back.storm.orbit, t.storm.orbit);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("HARD"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("norm"), Some(Difficulty::Normal));
        assert_eq!(Difficulty::parse("nightmare"), None);
        assert_eq!(Difficulty::Easy.as_str(), "Easy");
    }
}
