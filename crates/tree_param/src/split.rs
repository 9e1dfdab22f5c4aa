//! Best-split record
//!
//! [`SplitEntry`] keeps the best candidate seen for a node. Workers update a
//! private entry while scanning, then entries are merged with
//! [`SplitEntry::reduce`].
//!
//! Ties on `loss_chg` go to the lower feature index no matter which record
//! arrives first, so a parallel search picks the same split as a sequential
//! one.
//!
//! The feature index and the default-left flag share one `u32`: bits 0-30
//! hold the index and bit 31 the flag. Model files persist that layout.

use serde::{Deserialize, Serialize};

use crate::stats::GradStats;

/// Bit flagging that missing values go to the left child
pub const DEFAULT_LEFT_BIT: u32 = 1 << 31;

/// Largest feature index representable in the packed field
pub const MAX_SPLIT_INDEX: u32 = DEFAULT_LEFT_BIT - 1;

/// Pack a feature index and default direction into one field
#[inline]
pub const fn pack_split_index(split_index: u32, default_left: bool) -> u32 {
    if default_left {
        split_index | DEFAULT_LEFT_BIT
    } else {
        split_index
    }
}

/// Best split found so far for a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Loss reduction of the split
    pub loss_chg: f32,
    /// Packed feature index and default-left flag
    sindex: u32,
    /// Threshold; values below go left
    pub split_value: f32,
    pub left_sum: GradStats,
    pub right_sum: GradStats,
}

impl SplitEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a candidate should displace this entry.
    ///
    /// The lower feature index wins on equal loss change, regardless of
    /// which side is the incumbent.
    #[inline]
    pub fn need_replace(&self, new_loss_chg: f32, split_index: u32) -> bool {
        if self.split_index() <= split_index {
            new_loss_chg > self.loss_chg
        } else {
            !(self.loss_chg > new_loss_chg)
        }
    }

    /// Replace with `e` if it is better; returns whether it was
    #[inline]
    pub fn update(&mut self, e: &SplitEntry) -> bool {
        if self.need_replace(e.loss_chg, e.split_index()) {
            *self = *e;
            true
        } else {
            false
        }
    }

    /// Replace with the given candidate if it is better; returns whether it was.
    ///
    /// # Panics
    ///
    /// Panics if `split_index` exceeds [`MAX_SPLIT_INDEX`].
    #[inline]
    pub fn update_with(
        &mut self,
        new_loss_chg: f32,
        split_index: u32,
        new_split_value: f32,
        default_left: bool,
        left_sum: GradStats,
        right_sum: GradStats,
    ) -> bool {
        assert!(
            split_index <= MAX_SPLIT_INDEX,
            "feature index {split_index} overflows 31 bits"
        );
        if self.need_replace(new_loss_chg, split_index) {
            self.loss_chg = new_loss_chg;
            self.sindex = pack_split_index(split_index, default_left);
            self.split_value = new_split_value;
            self.left_sum = left_sum;
            self.right_sum = right_sum;
            true
        } else {
            false
        }
    }

    /// All-reduce step, same as `dst.update(src)`
    #[inline]
    pub fn reduce(dst: &mut SplitEntry, src: &SplitEntry) {
        dst.update(src);
    }

    /// Feature index to split on
    #[inline]
    pub fn split_index(&self) -> u32 {
        self.sindex & MAX_SPLIT_INDEX
    }

    /// Whether missing values go to the left child
    #[inline]
    pub fn default_left(&self) -> bool {
        (self.sindex >> 31) != 0
    }

    /// Raw packed field as stored in model files
    #[inline]
    pub fn packed_index(&self) -> u32 {
        self.sindex
    }

    /// Whether the entry holds a split worth making
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.loss_chg > 0.0
    }

    /// BLAKE3 digest of the entry's little-endian byte image.
    ///
    /// Equal digests mean bit-identical records.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.loss_chg.to_le_bytes());
        hasher.update(&self.sindex.to_le_bytes());
        hasher.update(&self.split_value.to_le_bytes());
        for stats in [&self.left_sum, &self.right_sum] {
            hasher.update(&stats.sum_grad.to_le_bytes());
            hasher.update(&stats.sum_hess.to_le_bytes());
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}
