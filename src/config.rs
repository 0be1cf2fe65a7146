//! Limits applied when building trees.

use serde::{Deserialize, Serialize};

/// Smallest number of levels a tree can have: one root over two leaves.
pub const MIN_LEVELS: u32 = 2;

/// Builder limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest accepted `levels`, a tree holds `2^(levels - 1)` leaves
    pub max_levels: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_levels: 20 }
    }
}

/// Number of leaves of a full tree with `levels` levels, saturating at `usize::MAX`
pub fn leaf_count(levels: u32) -> usize {
    1usize
        .checked_shl(levels.saturating_sub(1))
        .unwrap_or(usize::MAX)
}

impl Config {
    /// Number of leaves a tree with `levels` levels must be built from, or `None`
    /// if `levels` is outside of the configured range.
    pub fn expected_leaves(&self, levels: u32) -> Option<usize> {
        if !(MIN_LEVELS..=self.max_levels).contains(&levels) {
            return None;
        }
        1usize.checked_shl(levels - 1)
    }
}
