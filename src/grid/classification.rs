//! Class-mask post-pass
//!
//! Runs once after linkage, over active voxels only. Refined voxels are
//! always `REFINED`; leaves are handed to the classifier with their
//! 26-neighborhood coverage. Inactive voxels keep `ClassMask::NONE`.

use super::bitmask::ClassMask;
use super::core::{div_floor, BlockId, Direction};
use super::level_data::LevelGrid;
use crate::backend::Backend;
use glam::IVec3;
use rayon::prelude::*;
use std::sync::Arc;

/// User hook deciding the class of an active leaf voxel
pub type Classifier = Arc<dyn Fn(&VoxelNeighborhood) -> ClassMask + Send + Sync>;

/// What a classifier sees of one leaf voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelNeighborhood {
    pub level: usize,
    /// Level-local coordinate
    pub coord: IVec3,
    /// Base-space coordinate of the voxel corner
    pub base: IVec3,
    /// Bit `d.slot()` set when the neighbor location is covered by an active voxel
    pub covered: u32,
}

impl VoxelNeighborhood {
    pub fn is_covered(&self, dir: Direction) -> bool {
        (self.covered >> dir.slot()) & 1 == 1
    }

    /// At least one face neighbor lies outside every level's active set
    pub fn on_surface(&self) -> bool {
        Direction::faces().any(|d| !self.is_covered(d))
    }

    pub fn covered_count(&self) -> u32 {
        self.covered.count_ones()
    }
}

/// Surface voxels are `BOUNDARY`, the rest `INTERIOR`
pub fn surface_classifier() -> Classifier {
    Arc::new(|n: &VoxelNeighborhood| {
        if n.on_surface() {
            ClassMask::BOUNDARY
        } else {
            ClassMask::INTERIOR
        }
    })
}

/// A location of `level` is covered by its own level or by a coarser leaf
pub fn is_covered(levels: &[LevelGrid], level: usize, coord: IVec3) -> bool {
    let grid = &levels[level];
    if !grid.contains_coord(coord) {
        return false;
    }
    if grid.resolve(coord).is_some() {
        return true;
    }
    let base = coord * grid.spacing;
    levels[level + 1..]
        .iter()
        .any(|coarse| coarse.resolve(div_floor(base, coarse.spacing)).is_some())
}

fn neighborhood(levels: &[LevelGrid], level: usize, coord: IVec3) -> VoxelNeighborhood {
    let covered = Direction::all().fold(0u32, |acc, d| {
        if is_covered(levels, level, coord + d.offset()) {
            acc | (1 << d.slot())
        } else {
            acc
        }
    });
    VoxelNeighborhood {
        level,
        coord,
        base: coord * levels[level].spacing,
        covered,
    }
}

/// Class arrays for every level, in level order
pub fn classify_levels(
    levels: &[LevelGrid],
    classifier: &Classifier,
    backend: &Backend,
) -> Vec<Vec<ClassMask>> {
    levels
        .iter()
        .map(|grid| {
            let vpb = grid.voxels_per_block();
            let mut classes: Vec<ClassMask> = backend.install(|| {
                (0..grid.active_blocks)
                    .into_par_iter()
                    .flat_map_iter(|b| {
                        let block = BlockId(b);
                        (0..vpb as u32).map(move |off| {
                            if !grid.is_voxel_active(block, off) {
                                ClassMask::NONE
                            } else if grid.has_children(block, off) {
                                ClassMask::REFINED
                            } else {
                                let coord = grid.voxel_coord(block, off);
                                classifier(&neighborhood(levels, grid.level, coord))
                            }
                        })
                    })
                    .collect()
            });
            classes.resize(grid.materialized_blocks() * vpb, ClassMask::NONE);
            classes
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_detection() {
        let all = VoxelNeighborhood {
            level: 0,
            coord: IVec3::ZERO,
            base: IVec3::ZERO,
            covered: (1 << 27) - 1,
        };
        assert!(!all.on_surface());
        assert_eq!(all.covered_count(), 27);

        let missing_face = VoxelNeighborhood {
            covered: all.covered & !(1 << 22),
            ..all
        };
        assert!(missing_face.on_surface());

        // Corner neighbors do not make a surface
        let missing_corner = VoxelNeighborhood {
            covered: all.covered & !1,
            ..all
        };
        assert!(!missing_corner.on_surface());
    }

    #[test]
    fn test_default_classifier() {
        let c = surface_classifier();
        let n = VoxelNeighborhood {
            level: 0,
            coord: IVec3::ZERO,
            base: IVec3::ZERO,
            covered: 1 << 13,
        };
        assert_eq!(c(&n), ClassMask::BOUNDARY);
    }
}
