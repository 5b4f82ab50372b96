//! 16-key hexadecimal keypad
//!
//! The core only sees logical keys `0x0-0xF`. Binding host input to them is
//! the frontend's job; [`DEFAULT_KEYMAP`] is the conventional layout on the
//! left-hand side of a QWERTY keyboard:
//!
//! ```text
//!  1 2 3 C      1 2 3 4
//!  4 5 6 D  <-  q w e r
//!  7 8 9 E      a s d f
//!  A 0 B F      z x c v
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KEY_COUNT: usize = 16;

pub const DEFAULT_KEYMAP: [(char, u8); KEY_COUNT] = [
    ('x', 0x0),
    ('1', 0x1),
    ('2', 0x2),
    ('3', 0x3),
    ('q', 0x4),
    ('w', 0x5),
    ('e', 0x6),
    ('a', 0x7),
    ('s', 0x8),
    ('d', 0x9),
    ('z', 0xA),
    ('c', 0xB),
    ('4', 0xC),
    ('r', 0xD),
    ('f', 0xE),
    ('v', 0xF),
];

/// Logical key bound to `c` in [`DEFAULT_KEYMAP`], ignoring case.
pub fn key_for_char(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    DEFAULT_KEYMAP
        .iter()
        .find(|(host, _)| *host == c)
        .map(|&(_, key)| key)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeypadError {
    #[error("invalid key {0:#X}, keys are 0x0-0xF")]
    InvalidKey(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    keys: [bool; KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys outside `0x0-0xF` are never pressed.
    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    pub fn set_pressed(&mut self, key: u8, pressed: bool) -> Result<(), KeypadError> {
        let slot = self
            .keys
            .get_mut(key as usize)
            .ok_or(KeypadError::InvalidKey(key))?;
        *slot = pressed;
        Ok(())
    }

    pub fn release_all(&mut self) {
        self.keys = [false; KEY_COUNT];
    }

    /// Lowest-numbered key currently held.
    pub fn lowest_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|&down| down).map(|k| k as u8)
    }
}
