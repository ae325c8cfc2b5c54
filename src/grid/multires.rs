//! Multi-resolution descriptor and cross-level linkage
//!
//! Level 0 is the finest. `factor(l)` is the edge ratio between level `l` and
//! level `l - 1`; `spacing(l)` is the cumulative product and maps level-local
//! coordinates into the base (level 0) index space.
//!
//! Linkage rule, applied bottom-up:
//! - a coarse voxel with any active child is active and flagged refined
//! - every in-domain child of a refined voxel is active
//!
//! so each covered location has exactly one leaf, at the finest level that
//! reached it.

use super::bitmask::{iter_set_bits, set_bit};
use super::core::{div_floor, local_coord, local_offset, split_coord};
use crate::constants::limits::{MAX_LEVELS, MAX_REFINEMENT_FACTOR};
use crate::error::{GridError, GridResult};
use glam::IVec3;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementDescriptor {
    /// `factors[i]` is the ratio between level `i + 1` and level `i`
    factors: Vec<u32>,
}

impl Default for RefinementDescriptor {
    fn default() -> Self {
        Self::single_level()
    }
}

impl RefinementDescriptor {
    pub fn single_level() -> Self {
        Self { factors: Vec::new() }
    }

    /// `depth` levels, each `factor` times coarser than the previous
    pub fn uniform(depth: usize, factor: u32) -> Self {
        Self {
            factors: vec![factor; depth.saturating_sub(1)],
        }
    }

    /// Ratios between consecutive levels, finest first
    pub fn from_factors(factors: Vec<u32>) -> Self {
        Self { factors }
    }

    pub fn depth(&self) -> usize {
        self.factors.len() + 1
    }

    pub fn factors(&self) -> &[u32] {
        &self.factors
    }

    /// Ratio to the next finer level; 1 on level 0
    pub fn factor(&self, level: usize) -> u32 {
        if level == 0 {
            1
        } else {
            self.factors.get(level - 1).copied().unwrap_or(1)
        }
    }

    /// Base-space size of one voxel of `level`
    pub fn spacing(&self, level: usize) -> i32 {
        (1..=level).map(|l| self.factor(l) as i32).product()
    }

    /// Level-local extent covering the base domain
    pub fn level_dim(&self, domain: IVec3, level: usize) -> IVec3 {
        let s = self.spacing(level);
        IVec3::new(
            (domain.x + s - 1) / s,
            (domain.y + s - 1) / s,
            (domain.z + s - 1) / s,
        )
    }

    pub fn validate(&self, block_size: u32) -> GridResult<()> {
        if self.depth() > MAX_LEVELS {
            return Err(GridError::InvalidRefinement {
                level: self.depth() - 1,
                factor: 0,
                reason: format!("depth {} exceeds maximum of {}", self.depth(), MAX_LEVELS),
            });
        }

        for (i, &factor) in self.factors.iter().enumerate() {
            let level = i + 1;
            if !(2..=MAX_REFINEMENT_FACTOR).contains(&factor) {
                return Err(GridError::InvalidRefinement {
                    level,
                    factor,
                    reason: format!("factor must be in 2..={}", MAX_REFINEMENT_FACTOR),
                });
            }
            if block_size % factor != 0 {
                return Err(GridError::InvalidRefinement {
                    level,
                    factor,
                    reason: format!("block size {} is not a multiple of the factor", block_size),
                });
            }
        }
        Ok(())
    }

    /// Level-local coordinate to base index space
    pub fn to_base_index_space(&self, local: IVec3, level: usize) -> IVec3 {
        local * self.spacing(level)
    }

    /// Base index space to the level-local voxel containing it
    pub fn from_base_index_space(&self, base: IVec3, level: usize) -> IVec3 {
        div_floor(base, self.spacing(level))
    }
}

// ============================================================================
// Sparse per-level masks used during construction
// ============================================================================

/// Occupancy of one level keyed by block coordinate, before ids exist
#[derive(Debug, Clone, Default)]
pub struct SparseLevelMask {
    pub active: FxHashMap<IVec3, Vec<u64>>,
    pub refined: FxHashMap<IVec3, Vec<u64>>,
}

impl SparseLevelMask {
    pub fn from_active(active: FxHashMap<IVec3, Vec<u64>>) -> Self {
        Self {
            active,
            refined: FxHashMap::default(),
        }
    }

    pub fn active_voxels(&self) -> usize {
        self.active
            .values()
            .map(|w| w.iter().map(|x| x.count_ones() as usize).sum::<usize>())
            .sum()
    }
}

fn mark(map: &mut FxHashMap<IVec3, Vec<u64>>, coord: IVec3, block_size: u32, words: usize) {
    let (block, local) = split_coord(coord, block_size);
    let entry = map.entry(block).or_insert_with(|| vec![0u64; words]);
    set_bit(entry, local_offset(local, block_size));
}

/// Apply the bottom-up linkage rule to all levels in place
pub fn link_levels(
    masks: &mut [SparseLevelMask],
    refinement: &RefinementDescriptor,
    domain: IVec3,
    block_size: u32,
    words: usize,
) {
    let b = block_size as i32;
    for level in 1..masks.len() {
        let r = refinement.factor(level) as i32;
        let fine_dim = refinement.level_dim(domain, level - 1);
        let (lower, upper) = masks.split_at_mut(level);
        let fine = &mut lower[level - 1];
        let coarse = &mut upper[0];

        // Parents of active fine voxels
        let mut parents = Vec::new();
        for (block, w) in &fine.active {
            for off in iter_set_bits(w) {
                let voxel = *block * b + local_coord(off, block_size);
                parents.push(div_floor(voxel, r));
            }
        }
        for p in parents {
            mark(&mut coarse.active, p, block_size, words);
            mark(&mut coarse.refined, p, block_size, words);
        }

        // Refinement closure on the finer level
        let mut children = Vec::new();
        for (block, w) in &coarse.refined {
            for off in iter_set_bits(w) {
                let voxel = *block * b + local_coord(off, block_size);
                for cz in 0..r {
                    for cy in 0..r {
                        for cx in 0..r {
                            let child = voxel * r + IVec3::new(cx, cy, cz);
                            if child.cmplt(fine_dim).all() {
                                children.push(child);
                            }
                        }
                    }
                }
            }
        }
        let before = fine.active_voxels();
        for c in children {
            mark(&mut fine.active, c, block_size, words);
        }
        log::debug!(
            "[Linkage] Level {} -> {}: closure added {} voxels on level {}",
            level - 1,
            level,
            fine.active_voxels() - before,
            level - 1
        );
    }
}
