//! Wall grid queries
//!
//! Maze generation happens elsewhere; the engine only asks whether a cell
//! is blocked for a given movement mask, where the nearest free area is,
//! and whether a straight line is clear.

use serde::{Deserialize, Serialize};

/// Blocking masks: which movers a wall cell stops
pub mod mask {
    pub const ENEMY: u8 = 1;
    pub const CURSOR: u8 = 1 << 1;
    pub const ALL: u8 = ENEMY | CURSOR;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallGrid {
    width: i32,
    height: i32,
    cells: Vec<u8>,
}

impl WallGrid {
    /// Map with no walls
    pub fn open(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![0; (width * height) as usize],
        }
    }

    /// Parse rows where `#` blocks everything and `~` blocks enemies only
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut grid = Self::open(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let bits = match ch {
                    '#' => mask::ALL,
                    '~' => mask::ENEMY,
                    _ => 0,
                };
                grid.set(x as i32, y as i32, bits);
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn slot(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y).then(|| (y * self.width + x) as usize)
    }

    pub fn set(&mut self, x: i32, y: i32, bits: u8) {
        if let Some(i) = self.slot(x, y) {
            self.cells[i] = bits;
        }
    }

    /// Fill a rectangle (inclusive corners) with wall bits
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, bits: u8) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.set(x, y, bits);
            }
        }
    }

    /// Whether a mover with `mask` may not enter the cell. Out of bounds is blocked.
    #[inline]
    pub fn is_blocked(&self, x: i32, y: i32, mask: u8) -> bool {
        match self.slot(x, y) {
            Some(i) => self.cells[i] & mask != 0,
            None => true,
        }
    }

    /// Whether the cell holds any wall at all
    pub fn has_blocking_wall_at(&self, x: i32, y: i32) -> bool {
        self.slot(x, y).is_some_and(|i| self.cells[i] != 0)
    }

    /// Every footprint cell (anchor + offset) is in bounds and unblocked
    pub fn footprint_fits(&self, x: i32, y: i32, footprint: &[(i32, i32)], mask: u8) -> bool {
        footprint
            .iter()
            .all(|&(dx, dy)| !self.is_blocked(x + dx, y + dy, mask))
    }

    /// Nearest anchor (Chebyshev rings, row-major within a ring) where the
    /// footprint fits, searching out to `max_radius`.
    pub fn find_free_area_spiral(
        &self,
        x: i32,
        y: i32,
        footprint: &[(i32, i32)],
        mask: u8,
        max_radius: i32,
    ) -> Option<(i32, i32)> {
        for r in 0..=max_radius.max(0) {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs().max(dy.abs()) != r {
                        continue;
                    }
                    let (cx, cy) = (x + dx, y + dy);
                    if self.footprint_fits(cx, cy, footprint, mask) {
                        return Some((cx, cy));
                    }
                }
            }
        }
        None
    }

    /// Bresenham walk from start to end; the start cell is not checked,
    /// the end cell is.
    pub fn has_line_of_sight(&self, x0: i32, y0: i32, x1: i32, y1: i32, mask: u8) -> bool {
        line_cells(x0, y0, x1, y1)
            .skip(1)
            .all(|(x, y)| !self.is_blocked(x, y, mask))
    }

    /// Like `has_line_of_sight` but the whole footprint must fit at every step
    pub fn footprint_path_clear(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        footprint: &[(i32, i32)],
        mask: u8,
    ) -> bool {
        line_cells(from.0, from.1, to.0, to.1)
            .skip(1)
            .all(|(x, y)| self.footprint_fits(x, y, footprint, mask))
    }
}

/// Cells on the Bresenham line between two points, inclusive of both ends
pub fn line_cells(x0: i32, y0: i32, x1: i32, y1: i32) -> impl Iterator<Item = (i32, i32)> {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    let mut done = false;

    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let cell = (x, y);
        if x == x1 && y == y1 {
            done = true;
            return Some(cell);
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        Some(cell)
    })
}
