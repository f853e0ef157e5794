//! Session state: score, level, derived timing, and the color generator
//!
//! The generator is not a uniform draw: each color carries a weight that
//! drops when the color is dealt and is replenished across the board once the
//! pool runs low. Streaks of one color get rarer the longer they run, without
//! ever becoming impossible.

use crate::lines::LineScan;
use rand::Rng;

/// Chain multiplier per consecutive erase event
pub const CHAIN_MULTI: [u32; 20] = [
    1, 4, 8, 16, 24, 32, 48, 64, 80, 100, 120, 140, 160, 180, 200, 240, 280, 320, 360, 400,
];
/// Dalaigon score multiplier per diagonal-multiplier index
pub const DIAG_TABLE: [u32; 10] = [1, 2, 3, 4, 6, 8, 10, 12, 15, 20];

const SPEED_BASE: [i32; 10] = [1, 2, 3, 5, 10, 2, 4, 6, 10, 20];
const SPEED_MULT: [i32; 10] = [1, 1, 2, 3, 4, 4, 4, 6, 6, 6];

const MAX_SCORE: u64 = 999_999_999;
const MAX_ERASE: u32 = 999_999;
const MAX_LEVEL: u32 = 99;
const MAX_CHAIN: usize = 20;

/// Per-level fall and lock parameters, a pure function of the level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Fall speed in 1/60-row units per tick
    pub speed: i32,
    /// Colors in play: 4, or 5 from level 10 up
    pub max_color: usize,
    /// Grounded ticks before the piece locks
    pub lock_max: i32,
}

impl Timing {
    pub fn for_level(level: u32) -> Self {
        Self {
            speed: SPEED_BASE[(level % 10) as usize] * SPEED_MULT[(level / 10) as usize],
            max_color: if level >= 10 { 5 } else { 4 },
            lock_max: 45.min(70 - (level / 2) as i32),
        }
    }
}

/// Score and progression state for one round
#[derive(Debug, Clone)]
pub struct Player {
    pub score: u64,
    pub top_score: u64,
    /// Last increment after the dalaigon multiplier, for the score readout
    pub increased_score: u64,
    pub level: u32,
    /// Total erased cells
    pub erase: u32,
    /// Consecutive erase events since the last spawn
    pub chain: usize,
    /// Dalaigon multiplier index, fed by diagonal erases
    pub diag_multi: usize,
    pub timing: Timing,
    start_level: u32,
    /// Draw weights per color; only the first `max_color` take part
    weights: [u32; 5],
    /// Preview triple, promoted to the piece at the next spawn
    pub next_colors: [u8; 3],
}

impl Player {
    pub fn new(start_level: u32, top_score: u64) -> Self {
        Self {
            score: 0,
            top_score,
            increased_score: 0,
            level: start_level,
            erase: 0,
            chain: 0,
            diag_multi: 0,
            timing: Timing::for_level(start_level),
            start_level,
            weights: [5; 5],
            next_colors: [0; 3],
        }
    }

    /// Current dalaigon multiplier value
    pub fn diag_value(&self) -> u32 {
        DIAG_TABLE[self.diag_multi]
    }

    /// Deal the next triple: the preview buffer becomes the current colors
    /// and a fresh preview is drawn.
    ///
    /// Each draw walks the weight vector with a uniform roll over the weight
    /// total, decrements the winner, and replenishes every active weight once
    /// the total sinks to `4 * max_color + 1`. The three draws of one call
    /// share the weight state, so a color dealt in slot 0 is immediately less
    /// likely (not impossible) in slots 1 and 2.
    pub fn draw_triple(&mut self, rng: &mut impl Rng) -> [u8; 3] {
        let max_color = self.timing.max_color;
        let mut current = [0u8; 3];
        for i in 0..3 {
            let total: u32 = self.weights[..max_color].iter().sum();
            let mut roll = rng.gen_range(0..total) as i64;
            let mut color = 0;
            for (idx, weight) in self.weights[..max_color].iter().enumerate() {
                color = idx;
                roll -= *weight as i64;
                if roll < 0 {
                    break;
                }
            }
            self.weights[color] -= 1;
            current[i] = self.next_colors[i];
            self.next_colors[i] = color as u8 + 1;
            if total <= 4 * max_color as u32 + 1 {
                for weight in &mut self.weights[..max_color] {
                    *weight += 1;
                }
            }
        }
        current
    }

    /// Add `n` points through the dalaigon multiplier, saturating at the
    /// score cap and pushing the top score along
    pub fn increase_score(&mut self, n: u64) {
        self.increased_score = n * self.diag_value() as u64;
        self.score = (self.score + self.increased_score).min(MAX_SCORE);
        self.top_score = self.top_score.max(self.score);
    }

    /// Apply one erase event: multiplier drift, score, erase tally, level and
    /// timing recalculation, chain advance. Returns the scored base (before
    /// the dalaigon multiplier) for the multiplier readout.
    pub fn apply_erase(&mut self, scan: &LineScan) -> u64 {
        let drift = scan.diag_lines as i32 - scan.hv_lines as i32;
        self.diag_multi = (self.diag_multi as i32 + drift).clamp(0, 9) as usize;
        self.erase = (self.erase + scan.marked_count()).min(MAX_ERASE);

        let mut base = scan.base as u64;
        base *= CHAIN_MULTI[self.chain.min(CHAIN_MULTI.len() - 1)] as u64;
        base *= (self.level + 10) as u64;
        base *= (scan.diag_lines + scan.hv_lines) as u64;
        self.increase_score(base);

        self.level = (self.erase / 16 + self.start_level).min(MAX_LEVEL);
        self.chain = (self.chain + 1).min(MAX_CHAIN);
        self.timing = Timing::for_level(self.level);
        base
    }

    /// The chain survives across the compact/erase loop and dies at spawn
    pub fn reset_chain(&mut self) {
        self.chain = 0;
    }

    #[cfg(test)]
    pub(crate) fn weight_total(&self) -> u32 {
        self.weights[..self.timing.max_color].iter().sum()
    }
}
