//! One round of play: the per-tick state machine
//!
//! Exactly one state's logic runs per logical tick. The driver owns the
//! field, the player and the active piece, and sequences
//! spawn -> fall -> lock -> compact -> erase -> respawn, looping the
//! compact/erase pair until the field stabilizes, plus the three-stage
//! game-over cascade.

use crate::field::{Field, BOTTOM};
use crate::input::{fires, Controls, HeldKeys};
use crate::lines::{self, EraseLine};
use crate::piece::{Piece, Spin};
use crate::player::Player;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Logical tick rate; all speeds and timers count in these units
pub const TICKS_PER_SECOND: u32 = 60;
/// Hard cap on catch-up ticks per frame after a stall
pub const MAX_TICKS_PER_FRAME: u32 = 5;

const COUNTDOWN_TICKS: i32 = 150;
const LOCK_TICKS: i32 = 5;
const DROP_INTERVAL: i32 = 2;
const ERASE_TICKS: i32 = 41;
const ERASE_CLEAR_AT: i32 = 15;
const RESPAWN_DELAY: i32 = 17;

/// Round phases; see the transition table in the per-state methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// READY / SET / GO countdown
    Start,
    /// Waiting to deal the next piece
    Spawn,
    /// Piece is falling under player control
    Main,
    /// Piece is committing; brief tint before it joins the field
    Lock,
    /// Compaction: floating blocks settle one row per cycle
    Dropping,
    /// Field is stable; look for lines
    Dropped,
    /// Marked blocks flash, then vanish
    Erase,
    /// Game over: gray wash, one row per 3 ticks
    Over1,
    /// Game over: bottom rows flushed out, one per 4 ticks
    Over2,
    /// Game over: message shown, waiting for confirm
    Over3,
}

/// Result handed to the frontend when the player confirms game over
#[derive(Debug, Clone, Copy)]
pub struct RoundOutcome {
    pub score: u64,
    pub level: u32,
    pub erase: u32,
}

/// A single round of play
pub struct Round {
    pub field: Field,
    pub player: Player,
    pub piece: Piece,
    pub state: RoundState,
    pub timer: i32,
    pub held: HeldKeys,
    /// Runs found by the last detection, kept while their flash is on screen
    pub erase_lines: Vec<EraseLine>,
    /// Scored base of the last erase event, for the multiplier readout
    pub last_base: u64,
    rng: ChaCha8Rng,
}

impl Round {
    pub fn new(start_level: u32, top_score: u64) -> Self {
        Self::with_seed(start_level, top_score, rand::random())
    }

    pub fn with_seed(start_level: u32, top_score: u64, seed: u64) -> Self {
        let mut round = Self {
            field: Field::new(),
            player: Player::new(start_level, top_score),
            piece: Piece::idle(),
            state: RoundState::Start,
            timer: COUNTDOWN_TICKS,
            held: HeldKeys::default(),
            erase_lines: Vec::new(),
            last_base: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        // Seed the preview buffer; the first spawn promotes it
        round.player.draw_triple(&mut round.rng);
        round
    }

    /// Run one logical tick. Returns the round outcome once the player
    /// confirms the game-over screen; the caller then discards the round.
    pub fn tick(&mut self, controls: Controls) -> Option<RoundOutcome> {
        self.held.update(controls);
        let mut next_state = self.state;
        let mut next_timer = (self.timer - 1).max(0);
        let mut outcome = None;

        match self.state {
            RoundState::Start => {
                if self.timer == 0 {
                    next_state = RoundState::Spawn;
                    next_timer = 0;
                }
            }
            RoundState::Spawn => {
                if self.timer == 0 {
                    let hint = if self.held.rotate_left != 0 {
                        Some(Spin::Left)
                    } else if self.held.rotate_right != 0 {
                        Some(Spin::Right)
                    } else {
                        None
                    };
                    self.player.reset_chain();
                    let colors = self.player.draw_triple(&mut self.rng);
                    let (piece, ok) = Piece::spawn(&self.field, colors, hint);
                    self.piece = piece;
                    if ok {
                        next_state = RoundState::Main;
                    } else {
                        // No room: the piece is committed where it stands and
                        // the cascade begins
                        tracing::info!(score = self.player.score, "spawn blocked, game over");
                        self.piece.place(&mut self.field);
                        next_state = RoundState::Over1;
                        next_timer = BOTTOM * 3 + 2;
                    }
                }
            }
            RoundState::Main => {
                self.piece.last_rotate = self.piece.rotate;
                if self.held.rotate_left == 1 {
                    self.piece.try_rotate(&self.field, Spin::Left);
                }
                if self.held.rotate_right == 1 {
                    self.piece.try_rotate(&self.field, Spin::Right);
                }
                if fires(self.held.left) {
                    self.piece.try_move(&self.field, -1);
                }
                if fires(self.held.right) {
                    self.piece.try_move(&self.field, 1);
                }
                self.piece.advance_fall(&self.field, self.player.timing.speed);
                if controls.drop && self.piece.soft_drop(&self.field) {
                    self.player.increase_score(1);
                }
                if self.piece.lock_time >= self.player.timing.lock_max {
                    self.piece.last_rotate = self.piece.rotate;
                    next_state = RoundState::Lock;
                    next_timer = LOCK_TICKS;
                }
            }
            RoundState::Lock => {
                // Timers 5..3 show the tint, 2..1 clear it; the frontend
                // reads that straight off state and timer
                if self.timer == 0 {
                    self.piece.place(&mut self.field);
                    next_state = RoundState::Dropping;
                    next_timer = DROP_INTERVAL;
                }
            }
            RoundState::Dropping => {
                if self.timer == DROP_INTERVAL {
                    next_state = if self.field.drop_once() {
                        RoundState::Dropping
                    } else {
                        RoundState::Dropped
                    };
                } else if self.timer == 0 {
                    next_timer = DROP_INTERVAL;
                }
            }
            RoundState::Dropped => {
                if self.timer == 0 {
                    if self.check_erase() {
                        next_state = RoundState::Erase;
                        next_timer = ERASE_TICKS;
                    } else {
                        next_state = RoundState::Spawn;
                        next_timer = RESPAWN_DELAY;
                    }
                }
            }
            RoundState::Erase => {
                if self.timer == ERASE_CLEAR_AT {
                    self.field.clear_marked();
                } else if self.timer == 0 {
                    self.erase_lines.clear();
                    next_state = RoundState::Dropping;
                    next_timer = DROP_INTERVAL;
                }
            }
            RoundState::Over1 => {
                if self.timer % 3 == 2 {
                    self.field.gray_row(BOTTOM - self.timer / 3);
                } else if self.timer == 0 {
                    next_state = RoundState::Over2;
                    next_timer = BOTTOM * 4 + 3;
                }
            }
            RoundState::Over2 => {
                if self.timer % 4 == 3 {
                    self.field.clear_bottom_row();
                    self.field.drop_once();
                } else if self.timer == 0 {
                    next_state = RoundState::Over3;
                    next_timer = 40;
                }
            }
            RoundState::Over3 => {
                if self.timer == 0 && self.held.rotate_left == 1 {
                    outcome = Some(RoundOutcome {
                        score: self.player.score,
                        level: self.player.level,
                        erase: self.player.erase,
                    });
                }
            }
        }

        if next_state != self.state {
            tracing::debug!(from = ?self.state, to = ?next_state, "round state");
        }
        self.state = next_state;
        self.timer = next_timer;
        outcome
    }

    /// Scan the stable field; on a find, mark the cells and settle the score.
    /// A scan with no qualifying run changes nothing.
    fn check_erase(&mut self) -> bool {
        let scan = lines::scan(&self.field);
        if !scan.found() {
            return false;
        }
        self.field.mark_cells(scan.marked_cells());
        self.last_base = self.player.apply_erase(&scan);
        tracing::debug!(
            base = self.last_base,
            chain = self.player.chain,
            lines = scan.diag_lines + scan.hv_lines,
            "erase"
        );
        self.erase_lines = scan.lines;
        true
    }

    /// Countdown / game-over message for the frontend, if any
    pub fn message(&self) -> Option<&'static str> {
        match self.state {
            RoundState::Start => Some(if self.timer > 100 {
                "READY"
            } else if self.timer > 50 {
                " SET "
            } else if self.timer > 0 {
                " GO! "
            } else {
                ""
            }),
            RoundState::Over3 => Some("GAME OVER!"),
            _ => None,
        }
    }

    /// True while the lock tint is on (first ticks of the lock pause)
    pub fn lock_tint(&self) -> bool {
        self.state == RoundState::Lock && self.timer > 2
    }
}

/// Wall-clock to logical-tick conversion with catch-up cap and carry
#[derive(Debug, Default)]
pub struct TickClock {
    carry: Duration,
}

impl TickClock {
    const TICK: Duration = Duration::from_micros(1_000_000 / TICKS_PER_SECOND as u64);

    pub fn new() -> Self {
        Self::default()
    }

    /// Convert elapsed wall-clock time into whole ticks. At most
    /// `MAX_TICKS_PER_FRAME` are returned; a longer stall is forgiven rather
    /// than replayed, and sub-tick leftover carries to the next frame.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let total = self.carry + elapsed;
        let ticks = (total.as_micros() / Self::TICK.as_micros()) as u32;
        if ticks >= MAX_TICKS_PER_FRAME {
            self.carry = Duration::ZERO;
            MAX_TICKS_PER_FRAME
        } else {
            self.carry = total - Self::TICK * ticks;
            ticks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Cell, LEFT, RIGHT, TOP};

    fn idle() -> Controls {
        Controls::default()
    }

    fn new_round() -> Round {
        Round::with_seed(0, 5000, 42)
    }

    /// Tick until the given state is reached (with a safety bound)
    fn tick_until(round: &mut Round, state: RoundState, max: u32) {
        for _ in 0..max {
            if round.state == state {
                return;
            }
            round.tick(idle());
        }
        panic!("state {:?} not reached within {} ticks", state, max);
    }

    #[test]
    fn test_countdown_to_spawn_to_main() {
        let mut round = new_round();
        assert_eq!(round.state, RoundState::Start);
        assert!(round.message().is_some());
        tick_until(&mut round, RoundState::Main, 160);
        assert!(round.piece.is_visible());
        assert_eq!(round.player.score, 0);
    }

    #[test]
    fn test_no_line_placement_respawns() {
        let mut round = new_round();
        tick_until(&mut round, RoundState::Main, 160);
        // Slam the piece down and let it lock
        let mut drop = idle();
        drop.drop = true;
        for _ in 0..2000 {
            round.tick(drop);
            if round.state != RoundState::Main {
                break;
            }
        }
        assert_eq!(round.state, RoundState::Lock);
        tick_until(&mut round, RoundState::Dropped, 60);
        // Not enough blocks for a line: straight back to spawn
        tick_until(&mut round, RoundState::Main, 60);
        // The placed colors are now field cells
        let placed: Vec<Cell> = (LEFT..=RIGHT).map(|x| round.field.get(x, BOTTOM)).collect();
        assert!(placed.iter().any(|c| c.color().is_some()));
    }

    #[test]
    fn test_erase_loop_on_triple() {
        let mut round = new_round();
        // Hand-build a stable field with one horizontal triple and jump
        // straight to detection
        for x in 3..=5 {
            round.field.put(x, BOTTOM, Cell::Block(2));
        }
        round.state = RoundState::Dropped;
        round.timer = 0;
        round.tick(idle());
        assert_eq!(round.state, RoundState::Erase);
        assert_eq!(round.timer, ERASE_TICKS);
        assert_eq!(round.erase_lines.len(), 1);
        assert_eq!(round.player.score, 50);
        assert_eq!(round.player.chain, 1);
        // Marked cells flash until the clear tick
        assert_eq!(round.field.get(3, BOTTOM), Cell::Marked);
        for _ in 0..=(ERASE_TICKS - ERASE_CLEAR_AT) {
            round.tick(idle());
        }
        assert_eq!(round.field.get(3, BOTTOM), Cell::Empty);
        // Erase flows back into compaction, then respawn
        tick_until(&mut round, RoundState::Dropping, 60);
        tick_until(&mut round, RoundState::Spawn, 60);
    }

    #[test]
    fn test_detection_without_lines_changes_nothing() {
        let mut round = new_round();
        round.field.put(4, BOTTOM, Cell::Block(1));
        round.field.put(5, BOTTOM, Cell::Block(2));
        round.state = RoundState::Dropped;
        round.timer = 0;
        let score = round.player.score;
        let chain = round.player.chain;
        let diag = round.player.diag_multi;
        let field_before = round.field.clone();
        round.tick(idle());
        assert_eq!(round.state, RoundState::Spawn);
        assert_eq!(round.timer, RESPAWN_DELAY);
        assert_eq!(round.player.score, score);
        assert_eq!(round.player.chain, chain);
        assert_eq!(round.player.diag_multi, diag);
        for y in TOP..=BOTTOM {
            for x in LEFT..=RIGHT {
                assert_eq!(round.field.get(x, y), field_before.get(x, y));
            }
        }
    }

    #[test]
    fn test_chain_resets_at_spawn() {
        let mut round = new_round();
        round.player.chain = 3;
        round.state = RoundState::Spawn;
        round.timer = 0;
        round.tick(idle());
        assert_eq!(round.player.chain, 0);
        assert_eq!(round.state, RoundState::Main);
    }

    #[test]
    fn test_blocked_spawn_starts_cascade() {
        let mut round = new_round();
        // Wall off the spawn row
        for x in LEFT..=RIGHT {
            round.field.put(x, TOP, Cell::Block(1));
            round.field.put(x, TOP + 1, Cell::Block(2));
        }
        round.state = RoundState::Spawn;
        round.timer = 0;
        round.tick(idle());
        assert_eq!(round.state, RoundState::Over1);
        assert_eq!(round.timer, BOTTOM * 3 + 2);
        // The blocked piece was still committed to the field
        assert!(!round.piece.is_visible());
    }

    #[test]
    fn test_cascade_grays_then_flushes_then_waits() {
        let mut round = new_round();
        for x in LEFT..=RIGHT {
            round.field.put(x, BOTTOM, Cell::Block(3));
        }
        round.state = RoundState::Over1;
        round.timer = BOTTOM * 3 + 2;
        tick_until(&mut round, RoundState::Over2, 100);
        // Every surviving block is gray by now
        assert_eq!(round.field.get(LEFT, BOTTOM), Cell::Gray);
        tick_until(&mut round, RoundState::Over3, 100);
        assert!(round.field.is_empty());
        assert_eq!(round.message(), Some("GAME OVER!"));
    }

    #[test]
    fn test_game_over_confirm_yields_outcome() {
        let mut round = new_round();
        round.player.score = 1234;
        round.player.level = 2;
        round.player.erase = 40;
        round.state = RoundState::Over3;
        round.timer = 3;
        let mut confirm = idle();
        confirm.rotate_left = true;
        // Confirm is ignored until the message has settled
        assert!(round.tick(confirm).is_none());
        for _ in 0..3 {
            assert!(round.tick(idle()).is_none());
        }
        let outcome = round.tick(confirm).expect("confirm should end the round");
        assert_eq!(outcome.score, 1234);
        assert_eq!(outcome.level, 2);
        assert_eq!(outcome.erase, 40);
    }

    #[test]
    fn test_lock_tint_window() {
        let mut round = new_round();
        round.state = RoundState::Lock;
        round.timer = LOCK_TICKS;
        assert!(round.lock_tint());
        round.timer = 2;
        assert!(!round.lock_tint());
    }

    #[test]
    fn test_soft_drop_scores_through_multiplier() {
        let mut round = new_round();
        tick_until(&mut round, RoundState::Main, 160);
        round.player.diag_multi = 3;
        let mut drop = idle();
        drop.drop = true;
        let y = round.piece.y;
        round.tick(drop);
        assert_eq!(round.piece.y, y + 1);
        assert_eq!(round.player.score, crate::player::DIAG_TABLE[3] as u64);
    }

    #[test]
    fn test_tick_clock_whole_ticks_and_carry() {
        let mut clock = TickClock::new();
        assert_eq!(clock.advance(Duration::from_micros(16_000)), 0);
        // Carry pushes the next frame over one tick
        assert_eq!(clock.advance(Duration::from_micros(16_000)), 1);
        assert_eq!(clock.advance(Duration::from_millis(50)), 3);
    }

    #[test]
    fn test_tick_clock_caps_catch_up() {
        let mut clock = TickClock::new();
        assert_eq!(clock.advance(Duration::from_secs(2)), MAX_TICKS_PER_FRAME);
        // The stall is forgiven, not replayed
        assert_eq!(clock.advance(Duration::from_micros(10)), 0);
    }
}
