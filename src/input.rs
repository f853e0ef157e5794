//! Logical controls and key handling
//!
//! The game core only ever sees seven boolean "is held" controls, sampled
//! once per frame. Held-duration counting, edge detection, and auto-repeat
//! live here in the core; the crossterm adapter at the bottom turns raw key
//! events into the held booleans using a polling timeout, since key release
//! events are unreliable on Linux terminals.

use crate::settings::KeyConfig;
use crossterm::event::{KeyCode, KeyEvent};
use std::time::{Duration, Instant};

/// Time after which a key counts as released if no repeat event arrived
const KEY_TIMEOUT: Duration = Duration::from_millis(100);

/// Held duration at which auto-repeat starts firing on even ticks
const REPEAT_AFTER: u32 = 8;

/// The seven logical controls, true while held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub left: bool,
    pub right: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub drop: bool,
    pub help: bool,
    pub rank: bool,
}

/// Per-control held-duration counters, advanced once per logical tick
#[derive(Debug, Clone, Copy, Default)]
pub struct HeldKeys {
    pub left: u32,
    pub right: u32,
    pub rotate_left: u32,
    pub rotate_right: u32,
    pub drop: u32,
    pub help: u32,
    pub rank: u32,
}

/// True on the press edge or on the auto-repeat cadence
pub fn fires(held: u32) -> bool {
    held == 1 || (held > REPEAT_AFTER && held % 2 == 0)
}

impl HeldKeys {
    pub fn update(&mut self, c: Controls) {
        self.left = if c.left { self.left + 1 } else { 0 };
        self.right = if c.right { self.right + 1 } else { 0 };
        self.rotate_left = if c.rotate_left { self.rotate_left + 1 } else { 0 };
        self.rotate_right = if c.rotate_right { self.rotate_right + 1 } else { 0 };
        self.drop = if c.drop { self.drop + 1 } else { 0 };
        self.help = if c.help { self.help + 1 } else { 0 };
        self.rank = if c.rank { self.rank + 1 } else { 0 };
    }
}

/// Crossterm-to-controls adapter with timeout-based release detection
pub struct KeySet {
    bindings: Bindings,
    /// Last-seen press time per control, in `Controls` field order
    pressed: [Option<Instant>; 7],
}

struct Bindings {
    left: Vec<KeyCode>,
    right: Vec<KeyCode>,
    rotate_left: Vec<KeyCode>,
    rotate_right: Vec<KeyCode>,
    drop: Vec<KeyCode>,
    help: Vec<KeyCode>,
    rank: Vec<KeyCode>,
}

impl Bindings {
    fn from_config(keys: &KeyConfig) -> Self {
        Self {
            left: parse_keys(&keys.move_left),
            right: parse_keys(&keys.move_right),
            rotate_left: parse_keys(&keys.rotate_left),
            rotate_right: parse_keys(&keys.rotate_right),
            drop: parse_keys(&keys.drop),
            help: parse_keys(&keys.help),
            rank: parse_keys(&keys.rank),
        }
    }

    fn control_index(&self, code: KeyCode) -> Option<usize> {
        [
            &self.left,
            &self.right,
            &self.rotate_left,
            &self.rotate_right,
            &self.drop,
            &self.help,
            &self.rank,
        ]
        .iter()
        .position(|keys| keys.contains(&code))
    }
}

/// Parse a key name into a KeyCode
fn parse_key(s: &str) -> KeyCode {
    match s.to_lowercase().as_str() {
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "space" => KeyCode::Char(' '),
        "enter" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        s if s.len() == 1 => KeyCode::Char(s.chars().next().unwrap()),
        _ => KeyCode::Null,
    }
}

fn parse_keys(keys: &[String]) -> Vec<KeyCode> {
    keys.iter().map(|s| parse_key(s)).collect()
}

/// Normalize key codes for consistent handling
fn normalize_key(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

impl KeySet {
    pub fn from_config(keys: &KeyConfig) -> Self {
        Self {
            bindings: Bindings::from_config(keys),
            pressed: [None; 7],
        }
    }

    /// Record a key press (or terminal auto-repeat, which refreshes it)
    pub fn key_down(&mut self, key: KeyEvent) {
        if let Some(i) = self.bindings.control_index(normalize_key(key.code)) {
            self.pressed[i] = Some(Instant::now());
        }
    }

    /// Record a key release (may never arrive on some terminals)
    pub fn key_up(&mut self, key: KeyEvent) {
        if let Some(i) = self.bindings.control_index(normalize_key(key.code)) {
            self.pressed[i] = None;
        }
    }

    /// Sample the held controls, expiring keys not seen recently
    pub fn snapshot(&mut self) -> Controls {
        let now = Instant::now();
        for slot in &mut self.pressed {
            if slot.is_some_and(|t| now.duration_since(t) > KEY_TIMEOUT) {
                *slot = None;
            }
        }
        Controls {
            left: self.pressed[0].is_some(),
            right: self.pressed[1].is_some(),
            rotate_left: self.pressed[2].is_some(),
            rotate_right: self.pressed[3].is_some(),
            drop: self.pressed[4].is_some(),
            help: self.pressed[5].is_some(),
            rank: self.pressed[6].is_some(),
        }
    }

    /// Forget all held keys (screen changes)
    pub fn clear(&mut self) {
        self.pressed = [None; 7];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_fires_once() {
        let mut held = HeldKeys::default();
        let mut pressed = Controls::default();
        pressed.left = true;

        held.update(pressed);
        assert_eq!(held.left, 1);
        assert!(fires(held.left));
        held.update(pressed);
        assert!(!fires(held.left));
    }

    #[test]
    fn test_release_resets_counter() {
        let mut held = HeldKeys::default();
        let mut pressed = Controls::default();
        pressed.rotate_right = true;
        held.update(pressed);
        held.update(Controls::default());
        assert_eq!(held.rotate_right, 0);
        held.update(pressed);
        assert_eq!(held.rotate_right, 1);
    }

    #[test]
    fn test_auto_repeat_cadence() {
        // Ticks 2..=8 are silent, then every even tick fires
        let expected: Vec<u32> = vec![1, 10, 12, 14, 16, 18, 20];
        let mut held = HeldKeys::default();
        let mut pressed = Controls::default();
        pressed.right = true;
        let mut fired = Vec::new();
        for _ in 0..20 {
            held.update(pressed);
            if fires(held.right) {
                fired.push(held.right);
            }
        }
        assert_eq!(fired, expected);
    }

    #[test]
    fn test_counters_are_independent() {
        let mut held = HeldKeys::default();
        let mut pressed = Controls::default();
        pressed.left = true;
        pressed.drop = true;
        held.update(pressed);
        held.update(pressed);
        assert_eq!(held.left, 2);
        assert_eq!(held.drop, 2);
        assert_eq!(held.right, 0);
    }

    #[test]
    fn test_parse_key_names() {
        assert_eq!(parse_key("a"), KeyCode::Char('a'));
        assert_eq!(parse_key("Left"), KeyCode::Left);
        assert_eq!(parse_key("Space"), KeyCode::Char(' '));
        assert_eq!(parse_key("unknown"), KeyCode::Null);
    }
}
