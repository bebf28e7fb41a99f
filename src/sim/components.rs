//! Shared component types
//!
//! Boss-specific state (Quasar/Swarm/Storm) lives with each boss system;
//! everything here is used by more than one of them.

use serde::{Deserialize, Serialize};

use super::fixed::Fixed;
use super::vector::{Ellipse, Vec2F};
use super::world::Entity;

/// Integer grid coordinate of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn cell(self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Quasar,
    Swarm,
    /// Storm container owning the three circles
    StormRoot,
    StormCircle,
    /// One cell of a composite
    Member,
    /// Energy drain pickup absorbed by the Swarm
    Drain,
    /// Simple single-cell combat entity
    Other,
}

/// Hit points, enrage and the immunity/stun timers (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combat {
    pub owner: Entity,
    pub hp: i32,
    pub max_hp: i32,
    /// Blocks knockback and stun
    pub enraged: bool,
    pub damage_immunity: Fixed,
    pub kinetic_immunity: Fixed,
    pub stun: Fixed,
}

impl Combat {
    pub fn new(owner: Entity, hp: i32) -> Self {
        Self {
            owner,
            hp,
            max_hp: hp,
            enraged: false,
            damage_immunity: Fixed::ZERO,
            kinetic_immunity: Fixed::ZERO,
            stun: Fixed::ZERO,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    #[inline]
    pub fn is_damage_immune(&self) -> bool {
        self.damage_immunity.is_positive()
    }

    /// Knockback is refused while enraged or inside the immunity window
    #[inline]
    pub fn accepts_knockback(&self) -> bool {
        !self.enraged && !self.kinetic_immunity.is_positive()
    }

    #[inline]
    pub fn is_stunned(&self) -> bool {
        self.stun.is_positive()
    }

    /// Extend the stun timer; returns false when enraged
    pub fn apply_stun(&mut self, duration: Fixed) -> bool {
        if self.enraged || !duration.is_positive() {
            return false;
        }
        self.stun = self.stun.max(duration);
        true
    }

    pub fn tick_timers(&mut self, dt: Fixed) {
        self.damage_immunity = self.damage_immunity.countdown(dt);
        self.kinetic_immunity = self.kinetic_immunity.countdown(dt);
        self.stun = self.stun.countdown(dt);
    }
}

/// Per-cell protection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Protection {
    pub damage_immune: bool,
    /// Cell exists but is not hittable (inactive animation pattern)
    pub hitbox_disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderKind {
    /// One hit pool on the header; members are hitbox cells
    Unit,
    /// Each member carries its own hit points
    Ablative,
    /// Logical grouping only; never targetable
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub entity: Entity,
    pub offset_x: i32,
    pub offset_y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub kind: HeaderKind,
    /// Ordered member list (spawn order)
    pub members: Vec<MemberEntry>,
    /// Owning container, or `Entity::NONE`
    pub parent: Entity,
}

impl Header {
    pub fn new(kind: HeaderKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
            parent: Entity::NONE,
        }
    }
}

/// Back-reference from a member cell to its header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub header: Entity,
    /// Animation pattern id (Swarm); 0 elsewhere
    pub pattern: u8,
}

/// Precise position and velocity in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Kinetic {
    pub pos: Vec2F,
    pub vel: Vec2F,
}

impl Kinetic {
    pub fn at_cell(x: i32, y: i32) -> Self {
        Self {
            pos: Vec2F::cell_center(x, y),
            vel: Vec2F::ZERO,
        }
    }

    #[inline]
    pub fn grid(&self) -> (i32, i32) {
        self.pos.grid()
    }

    /// Advance by velocity; returns true if the grid cell changed
    pub fn integrate(&mut self, dt: Fixed) -> bool {
        let before = self.grid();
        self.pos += self.vel * dt;
        self.grid() != before
    }

    pub fn snap_to(&mut self, target: Vec2F) {
        self.pos = target;
        self.vel = Vec2F::ZERO;
    }
}

/// The player cursor and its shield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: i32,
    pub y: i32,
    pub shield_active: bool,
    pub shield: Ellipse,
}

impl Cursor {
    pub fn new(x: i32, y: i32, shield: Ellipse) -> Self {
        Self {
            x,
            y,
            shield_active: false,
            shield,
        }
    }

    pub fn center(&self) -> Vec2F {
        Vec2F::cell_center(self.x, self.y)
    }

    /// Whether a cell lies inside the active shield
    pub fn shield_covers(&self, x: i32, y: i32) -> bool {
        self.shield_active && self.shield.contains_cell(x - self.x, y - self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combat_timers_saturate() {
        let mut c = Combat::new(Entity::NONE, 10);
        c.kinetic_immunity = Fixed::from_ratio(1, 10);
        c.stun = Fixed::ONE;
        c.tick_timers(Fixed::HALF);
        assert!(c.accepts_knockback());
        assert_eq!(c.stun, Fixed::HALF);
        c.tick_timers(Fixed::ONE);
        assert!(!c.is_stunned());
    }

    #[test]
    fn test_enraged_refuses_stun_and_knockback() {
        let mut c = Combat::new(Entity::NONE, 10);
        c.enraged = true;
        assert!(!c.apply_stun(Fixed::ONE));
        assert!(!c.accepts_knockback());
        c.enraged = false;
        assert!(c.apply_stun(Fixed::ONE));
        assert!(c.apply_stun(Fixed::HALF));
        assert_eq!(c.stun, Fixed::ONE);
    }

    #[test]
    fn test_kinetic_reports_cell_crossing() {
        let mut k = Kinetic::at_cell(2, 2);
        k.vel = Vec2F::from_ints(1, 0);
        assert!(!k.integrate(Fixed::from_ratio(1, 4)));
        assert!(k.integrate(Fixed::from_ratio(1, 2)));
        assert_eq!(k.grid(), (3, 2));
    }

    #[test]
    fn test_shield_requires_active() {
        let mut cursor = Cursor::new(5, 5, Ellipse::from_cells(3, 2));
        assert!(!cursor.shield_covers(5, 5));
        cursor.shield_active = true;
        assert!(cursor.shield_covers(7, 5));
        assert!(!cursor.shield_covers(5, 8));
    }
}
