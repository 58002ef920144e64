//! Direction tags for neighbor entries.
//!
//! Bit `2 * axis` marks the lower side of `axis`, bit `2 * axis + 1` the upper
//! side. A corner neighbor carries one bit per axis it touches.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Direction(u32);

impl Direction {
    pub const EMPTY: Direction = Direction(0);
    /// Axes a `u32` tag can describe, two bits each.
    pub const MAX_AXES: usize = 16;

    /// Single-axis direction; `upper` selects the `+` side.
    #[inline]
    pub fn new(axis: usize, upper: bool) -> Self {
        debug_assert!(axis < Self::MAX_AXES, "direction bits cover 16 axes");
        Direction(1 << (2 * axis + upper as usize))
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Direction(bits)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(self, axis: usize, upper: bool) -> bool {
        self.0 & Direction::new(axis, upper).0 != 0
    }

    /// `-1`, `0` or `+1` along `axis`.
    pub fn offset(self, axis: usize) -> i32 {
        match (self.contains(axis, false), self.contains(axis, true)) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }

    /// The same direction seen from the neighbor.
    pub fn opposite(self) -> Self {
        let lower = self.0 & 0x5555_5555;
        let upper = self.0 & 0xAAAA_AAAA;
        Direction((lower << 1) | (upper >> 1))
    }
}

impl BitOr for Direction {
    type Output = Direction;
    fn bitor(self, rhs: Self) -> Self {
        Direction(self.0 | rhs.0)
    }
}

impl BitOrAssign for Direction {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
