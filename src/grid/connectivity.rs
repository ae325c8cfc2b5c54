//! Block connectivity
//!
//! 27 neighbor handles per materialized block, flat by block id. Entries are
//! looked up by block coordinate, so the table is symmetric regardless of
//! which device owns either side.

use super::core::{BlockId, Direction};
use crate::constants::connectivity::NEIGHBOR_COUNT;
use glam::IVec3;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct BlockConnectivity {
    table: Vec<BlockId>,
}

impl BlockConnectivity {
    /// Build from block coordinates indexed by id and the coordinate index
    pub fn build(coords: &[IVec3], index: &FxHashMap<IVec3, BlockId>) -> Self {
        let table = coords
            .par_iter()
            .flat_map_iter(|&coord| {
                Direction::all().map(move |d| {
                    index
                        .get(&(coord + d.offset()))
                        .copied()
                        .unwrap_or(BlockId::INVALID)
                })
            })
            .collect();
        Self { table }
    }

    pub fn block_count(&self) -> usize {
        self.table.len() / NEIGHBOR_COUNT
    }

    #[inline]
    pub fn neighbor(&self, block: BlockId, dir: Direction) -> BlockId {
        self.table
            .get(block.index() * NEIGHBOR_COUNT + dir.slot())
            .copied()
            .unwrap_or(BlockId::INVALID)
    }

    pub fn neighbors(&self, block: BlockId) -> &[BlockId] {
        let start = block.index() * NEIGHBOR_COUNT;
        &self.table[start..start + NEIGHBOR_COUNT]
    }

    /// First `(block, direction)` whose reverse entry disagrees
    pub fn find_asymmetry(&self) -> Option<(BlockId, Direction)> {
        (0..self.block_count() as u32).map(BlockId).find_map(|b| {
            Direction::all().find_map(|d| {
                let n = self.neighbor(b, d);
                (n.is_valid() && self.neighbor(n, d.opposite()) != b).then_some((b, d))
            })
        })
    }
}
