//! Grid handle
//!
//! `Grid` is a cheap-to-clone, read-only view of the whole multi-level
//! topology. Fields hold a clone, so the topology outlives every field built
//! on it.

use super::bitmask::ClassMask;
use super::core::{div_floor, local_coord, BlockId, DataView, DeviceId, Direction, VoxelIdx};
use super::halo_plan::HaloPlan;
use super::level_data::LevelGrid;
use super::multires::RefinementDescriptor;
use super::node_mask::NodeToVoxelMask;
use super::partition::Span;
use super::stencil::Stencil;
use crate::backend::Backend;
use crate::error::{GridError, GridResult, OptionExt};
use glam::IVec3;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

pub(crate) struct GridData {
    pub domain: IVec3,
    pub block_size: u32,
    pub refinement: RefinementDescriptor,
    pub levels: Vec<LevelGrid>,
    pub stencil: Option<Stencil>,
    pub backend: Backend,
}

#[derive(Clone)]
pub struct Grid {
    pub(crate) data: Arc<GridData>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("domain", &self.data.domain)
            .field("block_size", &self.data.block_size)
            .field("depth", &self.depth())
            .field("devices", &self.device_count())
            .field("stencil_points", &self.data.stencil.as_ref().map(|s| s.len()))
            .finish()
    }
}

impl Grid {
    pub(crate) fn from_data(data: GridData) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    /// Both handles refer to the same topology
    pub fn same_grid(&self, other: &Grid) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    // ========================================================================
    // Shape
    // ========================================================================

    /// Base (level 0) domain extent
    pub fn domain(&self) -> IVec3 {
        self.data.domain
    }

    pub fn block_size(&self) -> u32 {
        self.data.block_size
    }

    pub fn voxels_per_block(&self) -> usize {
        (self.data.block_size as usize).pow(3)
    }

    pub fn depth(&self) -> usize {
        self.data.levels.len()
    }

    pub fn device_count(&self) -> u32 {
        self.data.backend.device_count()
    }

    pub fn backend(&self) -> &Backend {
        &self.data.backend
    }

    pub fn stencil(&self) -> Option<&Stencil> {
        self.data.stencil.as_ref()
    }

    pub fn refinement(&self) -> &RefinementDescriptor {
        &self.data.refinement
    }

    pub fn level(&self, level: usize) -> GridResult<&LevelGrid> {
        self.data.levels.get(level).ok_or_grid(|| GridError::InvalidLevel {
            level,
            depth: self.depth(),
        })
    }

    pub fn levels(&self) -> &[LevelGrid] {
        &self.data.levels
    }

    pub fn spacing(&self, level: usize) -> i32 {
        self.data.refinement.spacing(level)
    }

    /// Level-local extent of `level`
    pub fn level_dim(&self, level: usize) -> IVec3 {
        self.data.refinement.level_dim(self.data.domain, level)
    }

    pub fn to_base_index_space(&self, local: IVec3, level: usize) -> IVec3 {
        self.data.refinement.to_base_index_space(local, level)
    }

    pub fn from_base_index_space(&self, base: IVec3, level: usize) -> IVec3 {
        self.data.refinement.from_base_index_space(base, level)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Level-local coordinate to voxel handle; `None` is outside the domain
    pub fn resolve(&self, coord: IVec3, level: usize) -> Option<VoxelIdx> {
        self.data.levels.get(level)?.resolve(coord)
    }

    /// Base-space coordinate to the voxel of `level` containing it
    pub fn resolve_base(&self, base: IVec3, level: usize) -> Option<VoxelIdx> {
        self.resolve(self.from_base_index_space(base, level), level)
    }

    pub fn is_inside_domain(&self, coord: IVec3, level: usize) -> bool {
        self.resolve(coord, level).is_some()
    }

    /// Level-local coordinate of a voxel handle issued by this grid
    pub fn voxel_coord(&self, idx: &VoxelIdx) -> IVec3 {
        self.data.levels[idx.level].voxel_coord(idx.block, idx.offset)
    }

    pub fn base_coord(&self, idx: &VoxelIdx) -> IVec3 {
        self.to_base_index_space(self.voxel_coord(idx), idx.level)
    }

    pub fn class_of(&self, idx: &VoxelIdx) -> ClassMask {
        self.data
            .levels
            .get(idx.level)
            .map(|g| g.class_of(idx.block, idx.offset))
            .unwrap_or(ClassMask::NONE)
    }

    /// The unique leaf covering a base-space location, finest level first
    pub fn leaf_at(&self, base: IVec3) -> Option<VoxelIdx> {
        (0..self.depth())
            .filter_map(|l| self.resolve_base(base, l))
            .find(|idx| !self.has_children(idx))
    }

    /// Class of the leaf covering a base-space location
    pub fn leaf_class(&self, base: IVec3) -> ClassMask {
        self.leaf_at(base)
            .map(|idx| self.class_of(&idx))
            .unwrap_or(ClassMask::NONE)
    }

    // ========================================================================
    // Spans
    // ========================================================================

    pub fn span(&self, device: DeviceId, level: usize, view: DataView) -> GridResult<Span> {
        self.data.backend.check_device(device)?;
        self.level(level)?
            .spans
            .span(device, view)
            .ok_or_grid(|| GridError::InvalidDevice {
                device: device.0,
                count: self.device_count(),
            })
    }

    /// Every (device, span) of one level and view, for executor dispatch
    pub fn spans(&self, level: usize, view: DataView) -> GridResult<Vec<(DeviceId, Span)>> {
        let grid = self.level(level)?;
        Ok(grid
            .spans
            .iter()
            .map(|(d, s)| (d, s.view(view)))
            .collect())
    }

    pub fn halo_plan(&self, device: DeviceId, level: usize) -> GridResult<&HaloPlan> {
        self.data.backend.check_device(device)?;
        self.level(level)?
            .halo
            .get(device.index())
            .ok_or_grid(|| GridError::InvalidDevice {
                device: device.0,
                count: self.device_count(),
            })
    }

    // ========================================================================
    // Neighbors and linkage
    // ========================================================================

    pub fn neighbor_block(&self, level: usize, block: BlockId, dir: Direction) -> BlockId {
        self.data
            .levels
            .get(level)
            .map(|g| g.connectivity.neighbor(block, dir))
            .unwrap_or(BlockId::INVALID)
    }

    /// Active voxel `offset` away on the same level
    pub fn neighbor(&self, idx: &VoxelIdx, offset: IVec3) -> Option<VoxelIdx> {
        let grid = self.data.levels.get(idx.level)?;
        let (block, off) = grid.locate(idx.block, idx.offset, offset)?;
        grid.is_voxel_active(block, off).then(|| VoxelIdx {
            level: idx.level,
            device: grid.owners[block.index()],
            block,
            offset: off,
        })
    }

    pub fn has_children(&self, idx: &VoxelIdx) -> bool {
        self.data
            .levels
            .get(idx.level)
            .is_some_and(|g| g.has_children(idx.block, idx.offset))
    }

    pub fn is_leaf(&self, idx: &VoxelIdx) -> bool {
        self.data
            .levels
            .get(idx.level)
            .is_some_and(|g| g.is_voxel_active(idx.block, idx.offset))
            && !self.has_children(idx)
    }

    /// Covering voxel one level coarser
    pub fn parent(&self, idx: &VoxelIdx) -> Option<VoxelIdx> {
        let fine = self.data.levels.get(idx.level)?;
        let coarse = self.data.levels.get(idx.level + 1)?;
        let parent_block = fine.parent_block(idx.block);
        if !parent_block.is_valid() {
            return None;
        }
        let r = coarse.child_factor as i32;
        let coarse_coord = div_floor(fine.voxel_coord(idx.block, idx.offset), r);
        let idx = coarse.resolve(coarse_coord)?;
        debug_assert_eq!(idx.block, parent_block);
        Some(idx)
    }

    /// Child `child ∈ [0, r)³` one level finer
    pub fn child(&self, idx: &VoxelIdx, child: IVec3) -> Option<VoxelIdx> {
        if idx.level == 0 || !self.has_children(idx) {
            return None;
        }
        let coarse = self.data.levels.get(idx.level)?;
        let fine = self.data.levels.get(idx.level - 1)?;
        let r = coarse.child_factor as i32;
        if child.cmplt(IVec3::ZERO).any() || child.cmpge(IVec3::splat(r)).any() {
            return None;
        }
        let coord = coarse.voxel_coord(idx.block, idx.offset) * r + child;
        fine.resolve(coord)
    }

    /// Corner-node mask of a level-local node position
    pub fn node_to_voxel_mask(&self, node: IVec3, level: usize) -> NodeToVoxelMask {
        NodeToVoxelMask::from_fn(node, |voxel| self.is_inside_domain(voxel, level))
    }

    // ========================================================================
    // Sizing and iteration
    // ========================================================================

    /// Bytes to stage one block plus a stencil-radius apron of `T × cardinality`
    pub fn shared_memory_bytes<T>(&self, cardinality: u32) -> usize {
        let r = self.data.stencil.as_ref().map_or(0, |s| s.radius());
        let side = (self.data.block_size + 2 * r) as usize;
        std::mem::size_of::<T>() * cardinality as usize * side * side * side
    }

    fn level_voxels(grid: &LevelGrid, block: BlockId) -> impl Iterator<Item = VoxelIdx> + '_ {
        let device = grid.owners[block.index()];
        grid.active.iter_active(block).map(move |offset| VoxelIdx {
            level: grid.level,
            device,
            block,
            offset,
        })
    }

    /// Visit every active voxel of every level, finest level first
    pub fn for_each_active(&self, mut f: impl FnMut(&VoxelIdx)) {
        for grid in &self.data.levels {
            for b in 0..grid.active_blocks {
                for idx in Self::level_voxels(grid, BlockId(b)) {
                    f(&idx);
                }
            }
        }
    }

    /// Parallel `for_each_active` inside the backend pool
    pub fn for_each_active_par(&self, f: impl Fn(&VoxelIdx) + Send + Sync) {
        self.data.backend.install(|| {
            for grid in &self.data.levels {
                (0..grid.active_blocks).into_par_iter().for_each(|b| {
                    for idx in Self::level_voxels(grid, BlockId(b)) {
                        f(&idx);
                    }
                });
            }
        });
    }

    /// Local coordinate of an in-block offset
    pub fn local_coord(&self, offset: u32) -> IVec3 {
        local_coord(offset, self.data.block_size)
    }
}
