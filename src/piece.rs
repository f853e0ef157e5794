//! Active falling piece logic
//!
//! The piece is a 3-cell right-angle tromino: a pivot plus a vertical and a
//! horizontal tail whose offsets are fixed per rotation state.

use crate::field::{Cell, Field, LEFT, TOP};

/// Horizontal tail offset per rotation state
pub const TAIL_X: [i32; 4] = [1, 1, -1, -1];
/// Vertical tail offset per rotation state
pub const TAIL_Y: [i32; 4] = [-1, 1, 1, -1];

/// Spawn column for the pivot
const SPAWN_X: i32 = LEFT + 3;

/// Lock counter value that forces a lock on the next tick
const LOCK_NOW: i32 = 99;

/// Direction for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Left,
    Right,
}

impl Spin {
    /// Rotation-state delta, added modulo 4
    fn delta(self) -> usize {
        match self {
            Spin::Left => 3,
            Spin::Right => 1,
        }
    }
}

/// An active falling piece
#[derive(Debug, Clone)]
pub struct Piece {
    /// Pivot position
    pub x: i32,
    pub y: i32,
    /// Rotation state 0..=3
    pub rotate: usize,
    /// Rotation state on the previous tick, for render interpolation
    pub last_rotate: usize,
    /// Color slots; 0 means the slot is vacant (piece already placed)
    pub colors: [u8; 3],
    /// Fall accumulator in 1/60-row units; >= 60 triggers a row drop
    pub fall_time: i32,
    /// Ticks spent grounded; locking triggers at the player's lock timeout
    pub lock_time: i32,
}

impl Piece {
    /// Spawn a piece with the given colors at the fixed spawn cell.
    ///
    /// A held rotate control at spawn is applied immediately; when the cell
    /// left of the spawn pivot is blocked and the hint is rotate-left, the
    /// spawn shifts one column left first so the rotated piece stays clear of
    /// the stack. Returns the piece and whether both spawn cells were free;
    /// `false` means game over (the piece is still placed by the caller).
    pub fn spawn(field: &Field, colors: [u8; 3], hint: Option<Spin>) -> (Self, bool) {
        let mut piece = Self {
            x: SPAWN_X,
            y: TOP,
            rotate: 0,
            last_rotate: 0,
            colors,
            fall_time: 0,
            lock_time: 0,
        };
        if !field.get(SPAWN_X - 1, TOP).is_empty() && hint == Some(Spin::Left) {
            piece.x -= 1;
        }
        if let Some(spin) = hint {
            piece.try_rotate(field, spin);
        }
        let ok = field.get(piece.x, piece.y).is_empty() && field.get(piece.x + 1, piece.y).is_empty();
        (piece, ok)
    }

    /// An inert, invisible piece for the countdown before the first spawn
    pub fn idle() -> Self {
        Self {
            x: SPAWN_X,
            y: TOP,
            rotate: 0,
            last_rotate: 0,
            colors: [0; 3],
            fall_time: 0,
            lock_time: 0,
        }
    }

    /// True while the piece holds colors (not yet committed to the field)
    pub fn is_visible(&self) -> bool {
        self.colors[0] != 0
    }

    /// Would moving the pivot by (dx, dy) under rotation `rot` overlap
    /// anything? Row 0 is the ceiling and always collides; everything else is
    /// answered by the wall ring, no bounds checks needed.
    pub fn collides(&self, field: &Field, dx: i32, dy: i32, rot: usize) -> bool {
        let x = self.x + dx;
        let y = self.y + dy;
        if y == 0 {
            return true;
        }
        !field.get(x, y).is_empty()
            || !field.get(x + TAIL_X[rot], y).is_empty()
            || !field.get(x, y + TAIL_Y[rot]).is_empty()
    }

    /// Shift the piece one column left (-1) or right (+1) if nothing blocks it
    pub fn try_move(&mut self, field: &Field, dir: i32) {
        if !self.collides(field, dir, 0, self.rotate) {
            self.x += dir;
        }
    }

    /// Rotate with kicks: in place first, then a vertical kick away from the
    /// new tail, then a horizontal one. A vertical kick forces the fall
    /// accumulator to 59 so the regained row is not immediately re-fallen.
    /// If nothing fits the rotation is dropped silently.
    pub fn try_rotate(&mut self, field: &Field, spin: Spin) {
        let rot = (self.rotate + spin.delta()) % 4;
        if !self.collides(field, 0, 0, rot) {
            self.rotate = rot;
        } else if !self.collides(field, 0, -TAIL_Y[rot], rot) {
            self.y -= TAIL_Y[rot];
            self.rotate = rot;
            self.fall_time = 59;
        } else if !self.collides(field, -TAIL_X[rot], 0, rot) {
            self.x -= TAIL_X[rot];
            self.rotate = rot;
        }
    }

    /// Natural gravity for one tick. `speed` is in 1/60-row units; at high
    /// levels a single tick can drop several rows. While grounded the lock
    /// counter advances instead.
    pub fn advance_fall(&mut self, field: &Field, speed: i32) {
        self.fall_time += speed;
        while self.fall_time >= 60 {
            if !self.collides(field, 0, 1, self.rotate) {
                self.y += 1;
                self.fall_time = (self.fall_time - 60).max(0);
            } else {
                self.fall_time = 59;
                self.lock_time += 1;
            }
        }
    }

    /// Player-held drop: one immediate row per tick. Returns true if the
    /// piece moved (the round awards a drop point); on the ground it forces
    /// near-lock instead so the piece commits on the next tick.
    pub fn soft_drop(&mut self, field: &Field) -> bool {
        if !self.collides(field, 0, 1, self.rotate) {
            self.y += 1;
            self.fall_time = 0;
            true
        } else {
            self.fall_time = 59;
            self.lock_time = LOCK_NOW;
            false
        }
    }

    /// Commit the piece to the field and vacate the color slots.
    ///
    /// Slot-to-cell assignment follows rotation parity: the pivot always
    /// carries slot 0, the vertical tail slot `1 + r%2`, the horizontal tail
    /// slot `2 - r%2`.
    pub fn place(&mut self, field: &mut Field) {
        field.put(self.x, self.y, Cell::Block(self.colors[0]));
        field.put(
            self.x,
            self.y + TAIL_Y[self.rotate],
            Cell::Block(self.colors[1 + self.rotate % 2]),
        );
        field.put(
            self.x + TAIL_X[self.rotate],
            self.y,
            Cell::Block(self.colors[2 - self.rotate % 2]),
        );
        self.colors = [0; 3];
    }

    /// The three occupied cells with their colors, for rendering and tests
    pub fn cells(&self) -> [(i32, i32, u8); 3] {
        self.cells_at(self.rotate)
    }

    /// Occupied cells under an arbitrary rotation state (render interpolation
    /// draws the previous rotation's cells as a fading trail)
    pub fn cells_at(&self, rot: usize) -> [(i32, i32, u8); 3] {
        [
            (self.x, self.y, self.colors[0]),
            (self.x, self.y + TAIL_Y[rot], self.colors[1 + rot % 2]),
            (self.x + TAIL_X[rot], self.y, self.colors[2 - rot % 2]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{BOTTOM, RIGHT};

    fn spawned(field: &Field) -> Piece {
        let (piece, ok) = Piece::spawn(field, [1, 2, 3], None);
        assert!(ok);
        piece
    }

    #[test]
    fn test_spawn_position() {
        let field = Field::new();
        let piece = spawned(&field);
        assert_eq!((piece.x, piece.y), (SPAWN_X, TOP));
        assert_eq!(piece.rotate, 0);
        assert!(piece.is_visible());
    }

    #[test]
    fn test_spawn_blocked_reports_game_over() {
        let mut field = Field::new();
        field.put(SPAWN_X, TOP, Cell::Block(1));
        field.put(SPAWN_X + 1, TOP, Cell::Block(1));
        let (_, ok) = Piece::spawn(&field, [1, 1, 1], None);
        assert!(!ok);
    }

    #[test]
    fn test_spawn_rotate_hint_applied() {
        let field = Field::new();
        let (piece, ok) = Piece::spawn(&field, [1, 2, 3], Some(Spin::Left));
        assert!(ok);
        // Rotates in place; the up-left tail reaches into the hidden row 1
        assert_eq!(piece.rotate, 3);
        assert_eq!(piece.y, TOP);
    }

    #[test]
    fn test_spawn_shift_left_for_rotate_hint() {
        let mut field = Field::new();
        field.put(SPAWN_X - 1, TOP, Cell::Block(2));
        let (piece, ok) = Piece::spawn(&field, [1, 2, 3], Some(Spin::Left));
        // The shifted pivot lands on the blocked column, every kick fails,
        // and the spawn check reports the blockage
        assert_eq!(piece.x, SPAWN_X - 1);
        assert_eq!(piece.rotate, 0);
        assert!(!ok);
    }

    #[test]
    fn test_move_blocked_by_wall() {
        let field = Field::new();
        let mut piece = spawned(&field);
        // Rotation 0 has its horizontal tail at x+1, so RIGHT-1 is the limit
        for _ in 0..10 {
            piece.try_move(&field, 1);
        }
        assert_eq!(piece.x, RIGHT - 1);
        for _ in 0..10 {
            piece.try_move(&field, -1);
        }
        assert_eq!(piece.x, LEFT);
    }

    #[test]
    fn test_rotate_in_place() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.y = 8;
        piece.try_rotate(&field, Spin::Right);
        assert_eq!(piece.rotate, 1);
        piece.try_rotate(&field, Spin::Left);
        assert_eq!(piece.rotate, 0);
    }

    #[test]
    fn test_rotate_vertical_kick_resets_fall_time() {
        let field = Field::new();
        // Sitting on the floor, rotating right points the tail down
        // (TAIL_Y[1] = 1) into the wall; the vertical kick lifts one row.
        let mut piece = spawned(&field);
        piece.y = BOTTOM;
        piece.try_rotate(&field, Spin::Right);
        assert_eq!(piece.rotate, 1);
        assert_eq!(piece.y, BOTTOM - 1);
        assert_eq!(piece.fall_time, 59);
    }

    #[test]
    fn test_rotation_rejected_silently() {
        let mut field = Field::new();
        let mut piece = spawned(&field);
        piece.y = BOTTOM;
        // Box the target cells in so no kick resolves a right rotation:
        // in-place wants (x, y+1) [wall], vertical kick wants y-1 clear around
        // the pivot, horizontal kick wants x-1.
        field.put(piece.x, BOTTOM - 1, Cell::Block(1));
        field.put(piece.x - 1, BOTTOM, Cell::Block(1));
        field.put(piece.x - 1, BOTTOM - 1, Cell::Block(1));
        field.put(piece.x + 1, BOTTOM - 1, Cell::Block(1));
        let before = piece.clone();
        piece.try_rotate(&field, Spin::Right);
        assert_eq!(piece.rotate, before.rotate);
        assert_eq!((piece.x, piece.y), (before.x, before.y));
    }

    #[test]
    fn test_advance_fall_accumulates() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.advance_fall(&field, 30);
        assert_eq!(piece.y, TOP);
        piece.advance_fall(&field, 30);
        assert_eq!(piece.y, TOP + 1);
        assert_eq!(piece.fall_time, 0);
    }

    #[test]
    fn test_advance_fall_multiple_rows_per_tick() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.advance_fall(&field, 120);
        assert_eq!(piece.y, TOP + 2);
    }

    #[test]
    fn test_advance_fall_grounded_counts_lock() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.y = BOTTOM;
        piece.advance_fall(&field, 60);
        assert_eq!(piece.y, BOTTOM);
        assert_eq!(piece.fall_time, 59);
        assert_eq!(piece.lock_time, 1);
        piece.advance_fall(&field, 1);
        assert_eq!(piece.lock_time, 2);
    }

    #[test]
    fn test_soft_drop() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.fall_time = 30;
        assert!(piece.soft_drop(&field));
        assert_eq!(piece.y, TOP + 1);
        assert_eq!(piece.fall_time, 0);
    }

    #[test]
    fn test_soft_drop_on_ground_forces_lock() {
        let field = Field::new();
        let mut piece = spawned(&field);
        piece.y = BOTTOM;
        assert!(!piece.soft_drop(&field));
        assert_eq!(piece.fall_time, 59);
        assert!(piece.lock_time >= LOCK_NOW);
    }

    #[test]
    fn test_place_roundtrip_colors() {
        for rot in 0..4 {
            let mut field = Field::new();
            let mut piece = spawned(&field);
            piece.x = 4;
            piece.y = 8;
            piece.rotate = rot;
            let expected = piece.cells();
            piece.place(&mut field);
            for (x, y, color) in expected {
                assert_eq!(field.get(x, y), Cell::Block(color), "rotation {}", rot);
            }
            assert!(!piece.is_visible());
        }
    }

    #[test]
    fn test_collides_agrees_with_place() {
        let mut field = Field::new();
        field.put(4, BOTTOM, Cell::Block(1));
        let mut piece = spawned(&field);
        piece.x = 4;
        piece.y = 10;
        // Any probe that reports no collision must place into empty cells only
        for dy in 0..5 {
            if !piece.collides(&field, 0, dy, piece.rotate) {
                let mut probe = piece.clone();
                probe.y += dy;
                for (x, y, _) in probe.cells() {
                    assert!(field.get(x, y).is_empty());
                }
            }
        }
    }
}
