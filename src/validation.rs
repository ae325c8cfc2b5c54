//! Grid statistics and structural validation
//!
//! `validate_grid` checks partition totality, connectivity symmetry and
//! multi-resolution leaf uniqueness. It runs after every debug build and is
//! available to callers in release builds.

use crate::error::{GridError, GridResult};
use crate::grid::{BlockId, DeviceId, Direction, Grid, LevelGrid};
use bit_vec::BitVec;
use glam::IVec3;

/// Per-level counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub level: usize,
    pub active_blocks: u32,
    pub shell_blocks: u32,
    pub active_voxels: u64,
    pub refined_voxels: u64,
    /// Blocks per device
    pub device_blocks: Vec<u32>,
    /// Ghost blocks per device
    pub ghost_blocks: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridStats {
    pub levels: Vec<LevelStats>,
}

impl GridStats {
    pub fn active_voxels(&self) -> u64 {
        self.levels.iter().map(|l| l.active_voxels).sum()
    }

    /// Active voxels without children, one per covered location
    pub fn leaf_voxels(&self) -> u64 {
        self.levels
            .iter()
            .map(|l| l.active_voxels - l.refined_voxels)
            .sum()
    }
}

pub fn compute_grid_stats(grid: &Grid) -> GridStats {
    let levels = grid
        .levels()
        .iter()
        .map(|level| LevelStats {
            level: level.level,
            active_blocks: level.active_blocks,
            shell_blocks: level.materialized_blocks() as u32 - level.active_blocks,
            active_voxels: level.total_active_voxels(),
            refined_voxels: (0..level.active_blocks)
                .map(|b| level.refined.count_active(BlockId(b)) as u64)
                .sum(),
            device_blocks: level.spans.iter().map(|(_, s)| s.all().len() as u32).collect(),
            ghost_blocks: level.halo.iter().map(|h| h.ghost_count() as u32).collect(),
        })
        .collect();
    GridStats { levels }
}

pub fn log_grid_stats(stats: &GridStats) {
    log::info!("[Grid] Statistics:");
    for level in &stats.levels {
        log::info!(
            "  Level {}: {} active blocks, {} shell blocks, {} active voxels ({} refined)",
            level.level,
            level.active_blocks,
            level.shell_blocks,
            level.active_voxels,
            level.refined_voxels
        );
        log::debug!(
            "  Level {}: blocks per device {:?}, ghosts per device {:?}",
            level.level,
            level.device_blocks,
            level.ghost_blocks
        );
    }
    log::info!("  Leaf voxels: {}", stats.leaf_voxels());
}

// ============================================================================
// Checks
// ============================================================================

/// Every active block is owned by exactly one device
pub fn check_partition_totality(level: &LevelGrid) -> GridResult<()> {
    let mut owned = BitVec::from_elem(level.active_blocks as usize, false);
    for (device, spans) in level.spans.iter() {
        for block in spans.all().iter() {
            if block.0 >= level.active_blocks {
                return Err(GridError::Consistency(format!(
                    "level {}: device {} span includes non-active block {}",
                    level.level, device.0, block
                )));
            }
            if owned.get(block.index()).unwrap_or(false) {
                return Err(GridError::Consistency(format!(
                    "level {}: block {} owned twice",
                    level.level, block
                )));
            }
            owned.set(block.index(), true);
            if level.owner(block) != Some(device) {
                return Err(GridError::Consistency(format!(
                    "level {}: owner table disagrees with spans for block {}",
                    level.level, block
                )));
            }
        }
    }
    if !owned.all() {
        return Err(GridError::Consistency(format!(
            "level {}: {} active blocks have no owner",
            level.level,
            owned.iter().filter(|b| !b).count()
        )));
    }
    Ok(())
}

/// `B.n[d] == C` iff `C.n[-d] == B`
pub fn check_connectivity_symmetry(level: &LevelGrid) -> GridResult<()> {
    match level.connectivity.find_asymmetry() {
        None => Ok(()),
        Some((block, dir)) => Err(GridError::Consistency(format!(
            "level {}: neighbor {:?} of block {} is not symmetric",
            level.level,
            dir.offset(),
            block
        ))),
    }
}

/// Refined voxels have every in-domain child active, and every active voxel
/// below the coarsest level has a refined parent
pub fn check_leaf_uniqueness(grid: &Grid) -> GridResult<()> {
    let depth = grid.depth();
    for l in 0..depth {
        let level = grid.level(l)?;
        for b in 0..level.active_blocks {
            let block = BlockId(b);
            for offset in level.active.iter_active(block) {
                let coord = level.voxel_coord(block, offset);

                if l + 1 < depth {
                    let coarse = grid.level(l + 1)?;
                    let r = coarse.child_factor as i32;
                    let parent = crate::grid::div_floor(coord, r);
                    let refined = coarse
                        .resolve(parent)
                        .is_some_and(|p| coarse.has_children(p.block, p.offset));
                    if !refined {
                        return Err(GridError::Consistency(format!(
                            "level {}: voxel {:?} has no refined parent",
                            l, coord
                        )));
                    }
                }

                if l > 0 && level.has_children(block, offset) {
                    let fine = grid.level(l - 1)?;
                    let r = level.child_factor as i32;
                    for cz in 0..r {
                        for cy in 0..r {
                            for cx in 0..r {
                                let child = coord * r + IVec3::new(cx, cy, cz);
                                if fine.contains_coord(child) && fine.resolve(child).is_none() {
                                    return Err(GridError::Consistency(format!(
                                        "level {}: refined voxel {:?} is missing child {:?}",
                                        l, coord, child
                                    )));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Inactive voxels carry no class
pub fn check_class_mask(level: &LevelGrid) -> GridResult<()> {
    let vpb = level.voxels_per_block() as u32;
    for b in 0..level.materialized_blocks() as u32 {
        let block = BlockId(b);
        for offset in 0..vpb {
            if !level.is_voxel_active(block, offset) && !level.class_of(block, offset).is_none() {
                return Err(GridError::Consistency(format!(
                    "level {}: inactive voxel {} of block {} carries a class",
                    level.level, offset, block
                )));
            }
        }
    }
    Ok(())
}

/// Run every structural check
pub fn validate_grid(grid: &Grid) -> GridResult<()> {
    for level in grid.levels() {
        check_partition_totality(level)?;
        check_connectivity_symmetry(level)?;
        check_class_mask(level)?;
    }
    check_leaf_uniqueness(grid)?;
    log::debug!("[Grid] Validation passed for {} level(s)", grid.depth());
    Ok(())
}

/// Devices that own at least one block on some level
pub fn occupied_devices(grid: &Grid) -> Vec<DeviceId> {
    grid.backend()
        .device_ids()
        .filter(|d| {
            grid.levels()
                .iter()
                .any(|l| l.spans.device(*d).is_some_and(|s| !s.all().is_empty()))
        })
        .collect()
}
