//! Player Input
//!
//! One [`InputState`] per player per tick. The same six buttons pack into a
//! single byte for replay recording, so a replay frame is exactly one byte
//! per roster player.

use serde::{Deserialize, Serialize};

/// Button state for one player on one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    /// Move up.
    #[serde(default)]
    pub up: bool,
    /// Move down.
    #[serde(default)]
    pub down: bool,
    /// Move left.
    #[serde(default)]
    pub left: bool,
    /// Move right.
    #[serde(default)]
    pub right: bool,
    /// Primary action (drop bomb) was pressed this tick. The client sends
    /// press edges, not held state.
    #[serde(default)]
    pub drop: bool,
    /// Secondary action (throw / trigger / punch / stop) was pressed this
    /// tick.
    #[serde(default)]
    pub secondary: bool,
}

impl InputState {
    /// Pack into a replay byte, bit 0 = up through bit 5 = secondary.
    pub fn pack(self) -> u8 {
        (self.up as u8)
            | (self.down as u8) << 1
            | (self.left as u8) << 2
            | (self.right as u8) << 3
            | (self.drop as u8) << 4
            | (self.secondary as u8) << 5
    }

    /// Inverse of [`InputState::pack`]; bits 6 and 7 are ignored.
    pub fn unpack(byte: u8) -> InputState {
        InputState {
            up: byte & 0x01 != 0,
            down: byte & 0x02 != 0,
            left: byte & 0x04 != 0,
            right: byte & 0x08 != 0,
            drop: byte & 0x10 != 0,
            secondary: byte & 0x20 != 0,
        }
    }

    /// Raw movement intent on each axis, -1/0/+1. Opposing buttons cancel.
    pub fn axes(self) -> (i32, i32) {
        let dx = (self.right as i32) - (self.left as i32);
        let dy = (self.down as i32) - (self.up as i32);
        (dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_all_combinations() {
        for byte in 0u8..64 {
            assert_eq!(InputState::unpack(byte).pack(), byte);
        }
    }

    #[test]
    fn test_high_bits_ignored() {
        assert_eq!(InputState::unpack(0xFF).pack(), 0x3F);
    }

    #[test]
    fn test_opposing_axes_cancel() {
        let input = InputState {
            left: true,
            right: true,
            up: true,
            ..Default::default()
        };
        assert_eq!(input.axes(), (0, -1));
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(InputState::default().pack(), 0);
    }
}
