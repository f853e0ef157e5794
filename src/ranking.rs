//! Top-7 ranking table
//!
//! Held by the frontend and updated exactly once per round, when the player
//! confirms the game-over screen. Persisted with the settings file.

use serde::{Deserialize, Serialize};

pub const RANK_COUNT: usize = 7;

/// One ranking row
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankEntry {
    pub score: u64,
    pub level: u32,
    pub erase: u32,
}

/// The ranked list, best first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankingTable {
    entries: Vec<RankEntry>,
    /// Rank earned by the last finished round, for the flashing row
    #[serde(skip)]
    pub last_rank: Option<usize>,
}

impl Default for RankingTable {
    fn default() -> Self {
        let scores = [5000, 4000, 3000, 2500, 2000, 1500, 1000];
        let levels = [10, 8, 6, 4, 3, 2, 1];
        let erases = [80, 60, 50, 40, 30, 25, 20];
        Self {
            entries: (0..RANK_COUNT)
                .map(|i| RankEntry {
                    score: scores[i],
                    level: levels[i],
                    erase: erases[i],
                })
                .collect(),
            last_rank: None,
        }
    }
}

impl RankingTable {
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// Best score on record, shown as the top score during play
    pub fn top_score(&self) -> u64 {
        self.entries.first().map_or(0, |e| e.score)
    }

    /// Insert a round result, shifting lower ranks down. Returns the earned
    /// rank, or None if the score did not make the list.
    pub fn record_result(&mut self, score: u64, level: u32, erase: u32) -> Option<usize> {
        let rank = self.entries.iter().position(|e| score > e.score);
        self.last_rank = rank;
        if let Some(rank) = rank {
            self.entries.insert(rank, RankEntry { score, level, erase });
            self.entries.truncate(RANK_COUNT);
        }
        rank
    }

    /// Drop the flash marker once the ranking screen is left
    pub fn clear_last_rank(&mut self) {
        self.last_rank = None;
    }

    /// Restore the fixed length after deserializing a hand-edited file
    pub fn normalize(&mut self) {
        let default = Self::default();
        self.entries.truncate(RANK_COUNT);
        while self.entries.len() < RANK_COUNT {
            self.entries.push(default.entries[self.entries.len()]);
        }
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
    }
}
