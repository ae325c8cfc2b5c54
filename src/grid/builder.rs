//! Grid construction
//!
//! Levels are evaluated independently, linked bottom-up, then assembled into
//! id-indexed arrays. Any failure aborts the whole build.

use super::bitmask::{set_bit, words_for, ClassMask};
use super::classification::{classify_levels, surface_classifier, Classifier, VoxelNeighborhood};
use super::core::{div_floor, local_coord, voxels_per_block, BlockId};
use super::level_data::LevelGrid;
use super::level_operations::{assemble_level, LevelLayout};
use super::multires::{link_levels, RefinementDescriptor, SparseLevelMask};
use super::stencil::Stencil;
use super::topology::{Grid, GridData};
use crate::backend::{create_backend, Backend};
use crate::config::GridConfig;
use crate::constants::core::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::constants::limits::MAX_DOMAIN_EXTENT;
use crate::error::{GridError, GridResult};
use crate::validation::{compute_grid_stats, log_grid_stats, validate_grid};
use glam::IVec3;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;

/// Activity predicate, evaluated at base-space voxel corners
pub type ActivityPredicate = Arc<dyn Fn(IVec3) -> bool + Send + Sync>;

pub struct GridBuilder {
    backend: Backend,
    domain: IVec3,
    block_size: u32,
    refinement: RefinementDescriptor,
    predicates: FxHashMap<usize, ActivityPredicate>,
    stencil: Option<Stencil>,
    classifier: Option<Classifier>,
}

impl GridBuilder {
    /// Single-level builder over `domain` with 8³ blocks and the 27-point stencil.
    /// Without any predicate the whole finest level is active.
    pub fn new(backend: &Backend, domain: IVec3) -> Self {
        Self {
            backend: backend.clone(),
            domain,
            block_size: DEFAULT_BLOCK_SIZE,
            refinement: RefinementDescriptor::single_level(),
            predicates: FxHashMap::default(),
            stencil: Some(Stencil::s27()),
            classifier: None,
        }
    }

    /// Builder and backend from a validated configuration
    pub fn from_config(config: &GridConfig) -> GridResult<Self> {
        config.check()?;
        let backend = create_backend(&config.backend)?;
        let mut builder = Self::new(&backend, IVec3::from_array(config.domain))
            .block_size(config.block_size)
            .refinement(RefinementDescriptor::from_factors(
                config.refinement_factors.clone(),
            ));
        builder.stencil = config.stencil.build();
        Ok(builder)
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn refinement(mut self, refinement: RefinementDescriptor) -> Self {
        self.refinement = refinement;
        self
    }

    /// `depth` levels, each `factor` times coarser
    pub fn levels(self, depth: usize, factor: u32) -> Self {
        self.refinement(RefinementDescriptor::uniform(depth, factor))
    }

    /// Activity predicate of the finest level
    pub fn predicate(self, f: impl Fn(IVec3) -> bool + Send + Sync + 'static) -> Self {
        self.level_predicate(0, f)
    }

    /// Activity predicate of one level; levels without one only gain voxels through linkage
    pub fn level_predicate(
        mut self,
        level: usize,
        f: impl Fn(IVec3) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.insert(level, Arc::new(f));
        self
    }

    pub fn stencil(mut self, stencil: Stencil) -> Self {
        self.stencil = Some(stencil);
        self
    }

    pub fn without_stencil(mut self) -> Self {
        self.stencil = None;
        self
    }

    pub fn classifier(
        mut self,
        f: impl Fn(&VoxelNeighborhood) -> ClassMask + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Some(Arc::new(f));
        self
    }

    fn validate(&self) -> GridResult<()> {
        let d = self.domain;
        if d.cmple(IVec3::ZERO).any() || d.cmpgt(IVec3::splat(MAX_DOMAIN_EXTENT)).any() {
            return Err(GridError::InvalidDomain {
                dim: (d.x, d.y, d.z),
                reason: format!("every extent must be in 1..={}", MAX_DOMAIN_EXTENT),
            });
        }

        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(GridError::InvalidBlockSize {
                size: self.block_size,
                reason: format!("must be in 1..={}", MAX_BLOCK_SIZE),
            });
        }

        self.refinement.validate(self.block_size)?;

        if let Some(&level) = self
            .predicates
            .keys()
            .find(|&&l| l >= self.refinement.depth())
        {
            return Err(GridError::InvalidLevel {
                level,
                depth: self.refinement.depth(),
            });
        }

        if let Some(stencil) = &self.stencil {
            if stencil.radius() > self.block_size {
                return Err(GridError::StencilTooWide {
                    radius: stencil.radius(),
                    block_size: self.block_size,
                });
            }
        }

        Ok(())
    }

    /// Occupancy of every candidate block of one level
    fn evaluate_level(&self, level: usize) -> FxHashMap<IVec3, Vec<u64>> {
        let Some(predicate) = self.predicates.get(&level) else {
            return FxHashMap::default();
        };

        let b = self.block_size as i32;
        let vpb = voxels_per_block(self.block_size) as u32;
        let words = words_for(vpb as usize);
        let dim = self.refinement.level_dim(self.domain, level);
        let spacing = self.refinement.spacing(level);
        let blocks = IVec3::new((dim.x + b - 1) / b, (dim.y + b - 1) / b, (dim.z + b - 1) / b);
        let count = blocks.x as usize * blocks.y as usize * blocks.z as usize;

        self.backend.install(|| {
            (0..count)
                .into_par_iter()
                .filter_map(|i| {
                    let coord = IVec3::new(
                        (i % blocks.x as usize) as i32,
                        ((i / blocks.x as usize) % blocks.y as usize) as i32,
                        (i / (blocks.x as usize * blocks.y as usize)) as i32,
                    );
                    let mut mask = vec![0u64; words];
                    let mut any = false;
                    for off in 0..vpb {
                        let voxel = coord * b + local_coord(off, self.block_size);
                        if voxel.cmplt(dim).all() && predicate(voxel * spacing) {
                            set_bit(&mut mask, off);
                            any = true;
                        }
                    }
                    any.then_some((coord, mask))
                })
                .collect()
        })
    }

    pub fn build(mut self) -> GridResult<Grid> {
        let start = Instant::now();
        self.validate()?;

        if self.predicates.is_empty() {
            log::debug!("[GridBuilder] No predicate set, activating the full finest level");
            self.predicates.insert(0, Arc::new(|_: IVec3| true));
        }

        let depth = self.refinement.depth();
        let words = words_for(voxels_per_block(self.block_size));

        let mut masks: Vec<SparseLevelMask> = (0..depth)
            .map(|l| SparseLevelMask::from_active(self.evaluate_level(l)))
            .collect();

        link_levels(
            &mut masks,
            &self.refinement,
            self.domain,
            self.block_size,
            words,
        );

        let total: usize = masks.iter().map(|m| m.active_voxels()).sum();
        if total == 0 {
            log::error!("[GridBuilder] No active voxels on any of {} level(s)", depth);
            return Err(GridError::NoActiveVoxels);
        }

        let layout = LevelLayout {
            domain: self.domain,
            block_size: self.block_size,
            device_count: self.backend.device_count(),
            refinement: &self.refinement,
        };
        let mut levels: Vec<LevelGrid> = self.backend.install(|| {
            masks
                .par_iter()
                .enumerate()
                .map(|(l, m)| assemble_level(l, m, &layout))
                .collect()
        });

        link_parents_and_children(&mut levels, &self.refinement);

        let classifier = self.classifier.unwrap_or_else(surface_classifier);
        let classes = classify_levels(&levels, &classifier, &self.backend);
        for (level, class) in levels.iter_mut().zip(classes) {
            level.class = class;
        }

        let grid = Grid::from_data(GridData {
            domain: self.domain,
            block_size: self.block_size,
            refinement: self.refinement,
            levels,
            stencil: self.stencil,
            backend: self.backend,
        });

        if cfg!(debug_assertions) {
            validate_grid(&grid)?;
        }

        log::info!(
            "[GridBuilder] Built {} level(s), {} active voxels in {:.2?}",
            depth,
            total,
            start.elapsed()
        );
        log_grid_stats(&compute_grid_stats(&grid));

        Ok(grid)
    }
}

/// Fill parent handles of each finer level and child handles of each coarser one
fn link_parents_and_children(levels: &mut [LevelGrid], refinement: &RefinementDescriptor) {
    for level in 1..levels.len() {
        let r = refinement.factor(level) as i32;
        let (lower, upper) = levels.split_at_mut(level);
        let fine = &mut lower[level - 1];
        let coarse = &mut upper[0];

        for (i, coord) in fine.block_coords.iter().enumerate() {
            fine.parents[i] = coarse.block_at(div_floor(*coord, r));
        }

        let mut children = Vec::with_capacity(coarse.materialized_blocks() * (r as usize).pow(3));
        for coord in &coarse.block_coords {
            for cz in 0..r {
                for cy in 0..r {
                    for cx in 0..r {
                        children.push(fine.block_at(*coord * r + IVec3::new(cx, cy, cz)));
                    }
                }
            }
        }
        coarse.children = children;
        coarse.child_factor = r as u32;

        let linked = fine
            .parents
            .iter()
            .take(fine.active_blocks as usize)
            .filter(|p| p.is_valid())
            .count();
        log::debug!(
            "[GridBuilder] Level {}: {}/{} active blocks linked to a parent",
            level - 1,
            linked,
            fine.active_blocks
        );
        debug_assert!(fine.parents[..fine.active_blocks as usize]
            .iter()
            .all(|p: &BlockId| p.is_valid()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(devices: u32) -> Backend {
        Backend::host(devices).unwrap()
    }

    #[test]
    fn test_full_domain_single_level() {
        let grid = GridBuilder::new(&backend(1), IVec3::splat(16))
            .predicate(|_| true)
            .build()
            .unwrap();
        assert_eq!(grid.depth(), 1);
        assert_eq!(grid.level(0).unwrap().active_blocks, 8);
        assert!(grid.is_inside_domain(IVec3::splat(15), 0));
        assert!(!grid.is_inside_domain(IVec3::splat(16), 0));
    }

    #[test]
    fn test_partial_block_at_domain_edge() {
        let grid = GridBuilder::new(&backend(1), IVec3::new(10, 8, 8))
            .predicate(|_| true)
            .build()
            .unwrap();
        let level = grid.level(0).unwrap();
        assert_eq!(level.active_blocks, 2);
        assert_eq!(level.total_active_voxels(), 640);
    }

    #[test]
    fn test_no_active_voxels_fails() {
        let err = GridBuilder::new(&backend(1), IVec3::splat(8))
            .predicate(|_| false)
            .build()
            .unwrap_err();
        assert!(matches!(err, GridError::NoActiveVoxels));
    }

    #[test]
    fn test_invalid_parameters() {
        let b = backend(1);
        assert!(matches!(
            GridBuilder::new(&b, IVec3::new(0, 8, 8)).predicate(|_| true).build(),
            Err(GridError::InvalidDomain { .. })
        ));
        assert!(matches!(
            GridBuilder::new(&b, IVec3::splat(8)).block_size(0).predicate(|_| true).build(),
            Err(GridError::InvalidBlockSize { .. })
        ));
        assert!(matches!(
            GridBuilder::new(&b, IVec3::splat(8))
                .block_size(2)
                .stencil(Stencil::new([IVec3::new(3, 0, 0)]))
                .predicate(|_| true)
                .build(),
            Err(GridError::StencilTooWide { .. })
        ));
        assert!(matches!(
            GridBuilder::new(&b, IVec3::splat(8))
                .level_predicate(2, |_| true)
                .build(),
            Err(GridError::InvalidLevel { .. })
        ));
        assert!(matches!(
            GridBuilder::new(&b, IVec3::splat(8))
                .levels(2, 3)
                .predicate(|_| true)
                .build(),
            Err(GridError::InvalidRefinement { .. })
        ));
    }

    #[test]
    fn test_coarse_predicate_evaluated_in_base_space() {
        // Level 1 voxel (x, y, z) is active when its base corner has x >= 8
        let grid = GridBuilder::new(&backend(1), IVec3::splat(16))
            .block_size(4)
            .levels(2, 2)
            .level_predicate(1, |p| p.x >= 8)
            .build()
            .unwrap();
        assert!(grid.resolve(IVec3::new(4, 0, 0), 1).is_some());
        assert!(grid.resolve(IVec3::new(3, 0, 0), 1).is_none());
        assert!(grid.resolve_base(IVec3::new(9, 1, 1), 1).is_some());
        assert_eq!(grid.level(0).unwrap().active_blocks, 0);
    }

    #[test]
    fn test_parent_child_handles() {
        let grid = GridBuilder::new(&backend(1), IVec3::splat(16))
            .block_size(4)
            .levels(2, 2)
            .predicate(|p| p.x < 4 && p.y < 4 && p.z < 4)
            .build()
            .unwrap();
        let fine = grid.resolve(IVec3::new(3, 2, 1), 0).unwrap();
        let parent = grid.parent(&fine).unwrap();
        assert_eq!(grid.voxel_coord(&parent), IVec3::new(1, 1, 0));
        assert!(grid.has_children(&parent));
        let back = grid.child(&parent, IVec3::new(1, 0, 1)).unwrap();
        assert_eq!(back, fine);
        assert!(grid.child(&parent, IVec3::splat(2)).is_none());

        let coarse = grid.level(1).unwrap();
        assert_eq!(coarse.child_block(parent.block, 0), fine.block);
    }
}
