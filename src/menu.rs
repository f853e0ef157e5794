//! Title, help and ranking screens
//!
//! Each screen runs on the same 60 Hz logical tick as the game and reads the
//! same seven held controls; rotate-left doubles as the confirm button
//! everywhere, like in the original cabinet layout.

use crate::input::{Controls, HeldKeys};

const START_LEVEL_STEP: u32 = 10;
const START_LEVEL_MAX: u32 = 50;

/// Where a screen wants the app to go next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    StartRound,
    ShowHelp,
    ShowRanking,
    BackToTitle,
}

/// Title screen: start-level select and dispatch to the other screens
pub struct TitleScreen {
    pub start_level: u32,
    /// Drives the blinking +/- level indicator
    pub indicator_flag: u32,
    held: HeldKeys,
}

impl TitleScreen {
    pub fn new(start_level: u32) -> Self {
        Self {
            start_level,
            indicator_flag: 0,
            held: HeldKeys::default(),
        }
    }

    pub fn tick(&mut self, controls: Controls) -> Option<ScreenAction> {
        self.held.update(controls);
        if self.held.left == 1 {
            self.start_level = self.start_level.saturating_sub(START_LEVEL_STEP);
        }
        if self.held.right == 1 {
            self.start_level = (self.start_level + START_LEVEL_STEP).min(START_LEVEL_MAX);
        }
        self.indicator_flag = (self.indicator_flag + 1) % 10;

        if self.held.rank == 1 {
            Some(ScreenAction::ShowRanking)
        } else if self.held.help == 1 {
            Some(ScreenAction::ShowHelp)
        } else if self.held.rotate_left == 1 {
            Some(ScreenAction::StartRound)
        } else {
            None
        }
    }

    /// Indicator text: one glyph per 10 start levels, blinking between + and -
    pub fn indicator(&self) -> String {
        let glyph = if self.indicator_flag >= 5 { "-" } else { "+" };
        glyph.repeat(1 + (self.start_level / START_LEVEL_STEP) as usize)
    }
}

/// Help screen: static text, confirm returns to the title
pub struct HelpScreen {
    held: HeldKeys,
}

impl HelpScreen {
    pub fn new() -> Self {
        Self { held: HeldKeys::default() }
    }

    pub fn tick(&mut self, controls: Controls) -> Option<ScreenAction> {
        self.held.update(controls);
        (self.held.rotate_left == 1).then_some(ScreenAction::BackToTitle)
    }
}

/// Ranking screen: top-7 table with the freshly earned row flashing
pub struct RankingScreen {
    /// Flash phase counter for the highlighted row, 51 -> 0 and wraps
    pub flash_time: u32,
    held: HeldKeys,
}

impl RankingScreen {
    pub fn new() -> Self {
        Self {
            flash_time: 0,
            held: HeldKeys::default(),
        }
    }

    pub fn tick(&mut self, controls: Controls) -> Option<ScreenAction> {
        self.held.update(controls);
        self.flash_time = if self.flash_time == 0 { 51 } else { self.flash_time - 1 };
        (self.held.rotate_left == 1).then_some(ScreenAction::BackToTitle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(f: impl Fn(&mut Controls)) -> Controls {
        let mut c = Controls::default();
        f(&mut c);
        c
    }

    #[test]
    fn test_start_level_select_steps_and_clamps() {
        let mut title = TitleScreen::new(0);
        let right = held(|c| c.right = true);
        for _ in 0..8 {
            title.tick(right);
            title.tick(Controls::default());
        }
        assert_eq!(title.start_level, START_LEVEL_MAX);
        let left = held(|c| c.left = true);
        for _ in 0..8 {
            title.tick(left);
            title.tick(Controls::default());
        }
        assert_eq!(title.start_level, 0);
    }

    #[test]
    fn test_start_level_edge_only() {
        // Holding the control must not race through the levels
        let mut title = TitleScreen::new(0);
        let right = held(|c| c.right = true);
        for _ in 0..7 {
            title.tick(right);
        }
        assert_eq!(title.start_level, START_LEVEL_STEP);
    }

    #[test]
    fn test_title_dispatch() {
        let mut title = TitleScreen::new(0);
        assert_eq!(title.tick(held(|c| c.rank = true)), Some(ScreenAction::ShowRanking));
        let mut title = TitleScreen::new(0);
        assert_eq!(title.tick(held(|c| c.help = true)), Some(ScreenAction::ShowHelp));
        let mut title = TitleScreen::new(0);
        assert_eq!(
            title.tick(held(|c| c.rotate_left = true)),
            Some(ScreenAction::StartRound)
        );
    }

    #[test]
    fn test_indicator_blinks_and_scales() {
        let mut title = TitleScreen::new(30);
        title.indicator_flag = 0;
        assert_eq!(title.indicator(), "++++");
        title.indicator_flag = 7;
        assert_eq!(title.indicator(), "----");
    }

    #[test]
    fn test_ranking_flash_wraps() {
        let mut screen = RankingScreen::new();
        screen.tick(Controls::default());
        assert_eq!(screen.flash_time, 51);
        for _ in 0..51 {
            screen.tick(Controls::default());
        }
        assert_eq!(screen.flash_time, 0);
    }
}
