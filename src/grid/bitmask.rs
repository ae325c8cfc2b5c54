//! Bit-packed per-voxel occupancy and the secondary class byte
//!
//! One bit per voxel in 64-bit words, `words_per_block` words per block,
//! contiguous by block id. Built once during construction.

use super::core::BlockId;
use crate::constants::core::MASK_WORD_BITS;
use bytemuck::{Pod, Zeroable};

/// Words needed to hold one bit per voxel of a block
#[inline]
pub fn words_for(voxels_per_block: usize) -> usize {
    voxels_per_block.div_ceil(MASK_WORD_BITS as usize)
}

#[inline]
pub fn set_bit(words: &mut [u64], offset: u32) {
    words[(offset / MASK_WORD_BITS) as usize] |= 1u64 << (offset % MASK_WORD_BITS);
}

#[inline]
pub fn test_bit(words: &[u64], offset: u32) -> bool {
    (words[(offset / MASK_WORD_BITS) as usize] >> (offset % MASK_WORD_BITS)) & 1 == 1
}

/// Offsets of every set bit, ascending
pub fn iter_set_bits(words: &[u64]) -> impl Iterator<Item = u32> + '_ {
    words.iter().enumerate().flat_map(|(w, &word)| {
        let mut bits = word;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let tz = bits.trailing_zeros();
            bits &= bits - 1;
            Some(w as u32 * MASK_WORD_BITS + tz)
        })
    })
}

/// Occupancy table for every materialized block of one level
#[derive(Debug, Clone, Default)]
pub struct ActiveBitmask {
    words_per_block: usize,
    words: Vec<u64>,
}

impl ActiveBitmask {
    pub fn new(voxels_per_block: usize) -> Self {
        Self {
            words_per_block: words_for(voxels_per_block),
            words: Vec::new(),
        }
    }

    /// Append the next block's words; `None` appends an empty block
    pub fn push_block(&mut self, words: Option<&[u64]>) {
        match words {
            Some(w) => {
                debug_assert_eq!(w.len(), self.words_per_block);
                self.words.extend_from_slice(w);
            }
            None => {
                let len = self.words.len() + self.words_per_block;
                self.words.resize(len, 0);
            }
        }
    }

    pub fn block_count(&self) -> usize {
        if self.words_per_block == 0 {
            0
        } else {
            self.words.len() / self.words_per_block
        }
    }

    pub fn words_per_block(&self) -> usize {
        self.words_per_block
    }

    /// O(1): word = offset / 64, bit = offset % 64
    #[inline]
    pub fn is_active(&self, block: BlockId, offset: u32) -> bool {
        if !block.is_valid() || block.index() >= self.block_count() {
            return false;
        }
        test_bit(self.block_words(block), offset)
    }

    #[inline]
    pub fn block_words(&self, block: BlockId) -> &[u64] {
        let start = block.index() * self.words_per_block;
        &self.words[start..start + self.words_per_block]
    }

    pub fn count_active(&self, block: BlockId) -> u32 {
        self.block_words(block).iter().map(|w| w.count_ones()).sum()
    }

    pub fn any(&self, block: BlockId) -> bool {
        self.block_words(block).iter().any(|&w| w != 0)
    }

    pub fn iter_active(&self, block: BlockId) -> impl Iterator<Item = u32> + '_ {
        iter_set_bits(self.block_words(block))
    }
}

/// Per-voxel classification byte; bits are user-extensible above the reserved ones
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct ClassMask(pub u8);

impl ClassMask {
    /// Inactive voxels, and nothing else by default
    pub const NONE: Self = Self(0);
    pub const INTERIOR: Self = Self(1);
    /// Active voxel with a face neighbor not covered by any level
    pub const BOUNDARY: Self = Self(1 << 1);
    /// Active voxel refined on a finer level; not a leaf
    pub const REFINED: Self = Self(1 << 2);
    /// First bit free for application classes (inlet, wall, ...)
    pub const USER_SHIFT: u8 = 3;

    pub fn user(bit: u8) -> Self {
        Self(1u8 << Self::USER_SHIFT.saturating_add(bit).min(7))
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_and_bit_addressing() {
        let mut mask = ActiveBitmask::new(512);
        assert_eq!(mask.words_per_block(), 8);

        let mut words = vec![0u64; 8];
        set_bit(&mut words, 0);
        set_bit(&mut words, 63);
        set_bit(&mut words, 64);
        set_bit(&mut words, 511);
        mask.push_block(None);
        mask.push_block(Some(&words));

        assert_eq!(mask.block_count(), 2);
        assert!(!mask.any(BlockId(0)));
        assert!(mask.is_active(BlockId(1), 63));
        assert!(mask.is_active(BlockId(1), 64));
        assert!(!mask.is_active(BlockId(1), 65));
        assert_eq!(mask.count_active(BlockId(1)), 4);
        assert_eq!(
            mask.iter_active(BlockId(1)).collect::<Vec<_>>(),
            vec![0, 63, 64, 511]
        );
    }

    #[test]
    fn test_invalid_block_is_inactive() {
        let mut mask = ActiveBitmask::new(8);
        mask.push_block(Some(&[0xFF]));
        assert!(!mask.is_active(BlockId::INVALID, 0));
        assert!(!mask.is_active(BlockId(5), 0));
    }

    #[test]
    fn test_small_block_single_word() {
        assert_eq!(words_for(8), 1);
        assert_eq!(words_for(27), 1);
        assert_eq!(words_for(65), 2);
    }

    #[test]
    fn test_class_mask_bits() {
        let c = ClassMask::BOUNDARY.union(ClassMask::user(0));
        assert!(c.contains(ClassMask::BOUNDARY));
        assert!(!c.contains(ClassMask::INTERIOR));
        assert_eq!(ClassMask::user(0).0, 8);
        assert!(ClassMask::default().is_none());
    }
}
