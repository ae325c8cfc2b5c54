//! Level Operations - assembly and lookups on `LevelGrid`
//!
//! Assembly is a pure transformation from the sparse construction masks to the
//! id-indexed arrays. Lookups never allocate.

use super::bitmask::{ActiveBitmask, ClassMask};
use super::connectivity::BlockConnectivity;
use super::core::{
    local_coord, local_offset, split_coord, voxels_per_block, BlockId, DeviceId, Direction,
    VoxelIdx,
};
use super::halo_plan::build_halo_plans;
use super::level_data::LevelGrid;
use super::multires::{RefinementDescriptor, SparseLevelMask};
use super::partition::{partition_blocks, shell_blocks};
use glam::IVec3;
use rustc_hash::FxHashMap;

/// Inputs shared by every level of one build
pub struct LevelLayout<'a> {
    pub domain: IVec3,
    pub block_size: u32,
    pub device_count: u32,
    pub refinement: &'a RefinementDescriptor,
}

/// Number, partition and connect the blocks of one level
pub fn assemble_level(level: usize, mask: &SparseLevelMask, layout: &LevelLayout) -> LevelGrid {
    let b = layout.block_size as i32;
    let vpb = voxels_per_block(layout.block_size);
    let dim = layout.refinement.level_dim(layout.domain, level);
    let block_dim = IVec3::new((dim.x + b - 1) / b, (dim.y + b - 1) / b, (dim.z + b - 1) / b);

    let active_coords: Vec<IVec3> = mask
        .active
        .iter()
        .filter(|(_, w)| w.iter().any(|&x| x != 0))
        .map(|(c, _)| *c)
        .collect();

    let plan = partition_blocks(active_coords, layout.device_count);
    let shells = shell_blocks(&plan.ordered, block_dim);
    let active_blocks = plan.ordered.len() as u32;

    let mut block_coords = plan.ordered;
    block_coords.extend(shells);

    let origin_index: FxHashMap<IVec3, BlockId> = block_coords
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, BlockId(i as u32)))
        .collect();

    let mut active = ActiveBitmask::new(vpb);
    let mut refined = ActiveBitmask::new(vpb);
    for coord in &block_coords {
        active.push_block(mask.active.get(coord).map(|w| w.as_slice()));
        refined.push_block(mask.refined.get(coord).map(|w| w.as_slice()));
    }

    let active_voxels = (0..active_blocks)
        .map(|i| active.count_active(BlockId(i)))
        .collect();

    let connectivity = BlockConnectivity::build(&block_coords, &origin_index);
    let halo = build_halo_plans(&plan.spans, &connectivity, active_blocks);
    let materialized = block_coords.len();

    log::debug!(
        "[Level {}] dim {:?}, {} active blocks, {} shell blocks",
        level,
        dim,
        active_blocks,
        materialized - active_blocks as usize
    );

    LevelGrid {
        level,
        spacing: layout.refinement.spacing(level),
        dim,
        block_dim,
        block_size: layout.block_size,
        active_blocks,
        block_coords,
        active,
        refined,
        connectivity,
        parents: vec![BlockId::INVALID; materialized],
        children: Vec::new(),
        child_factor: layout.refinement.factor(level),
        owners: plan.owners,
        active_voxels,
        class: vec![ClassMask::NONE; materialized * vpb],
        origin_index,
        spans: plan.spans,
        halo,
    }
}

impl LevelGrid {
    pub fn voxels_per_block(&self) -> usize {
        voxels_per_block(self.block_size)
    }

    pub fn materialized_blocks(&self) -> usize {
        self.block_coords.len()
    }

    pub fn is_active_block(&self, block: BlockId) -> bool {
        block.0 < self.active_blocks
    }

    pub fn is_shell(&self, block: BlockId) -> bool {
        block.0 >= self.active_blocks && block.index() < self.block_coords.len()
    }

    /// Handle of the block at a block coordinate, or the sentinel
    pub fn block_at(&self, block_coord: IVec3) -> BlockId {
        self.origin_index
            .get(&block_coord)
            .copied()
            .unwrap_or(BlockId::INVALID)
    }

    /// Level-local coordinate of the block's first voxel
    pub fn block_origin(&self, block: BlockId) -> IVec3 {
        self.block_coords[block.index()] * self.block_size as i32
    }

    pub fn owner(&self, block: BlockId) -> Option<DeviceId> {
        self.owners.get(block.index()).copied()
    }

    pub fn contains_coord(&self, coord: IVec3) -> bool {
        coord.cmpge(IVec3::ZERO).all() && coord.cmplt(self.dim).all()
    }

    #[inline]
    pub fn is_voxel_active(&self, block: BlockId, offset: u32) -> bool {
        self.is_active_block(block) && self.active.is_active(block, offset)
    }

    #[inline]
    pub fn has_children(&self, block: BlockId, offset: u32) -> bool {
        self.is_active_block(block) && self.refined.is_active(block, offset)
    }

    pub fn voxel_coord(&self, block: BlockId, offset: u32) -> IVec3 {
        self.block_origin(block) + local_coord(offset, self.block_size)
    }

    /// `voxel_coord` for handles that may not belong to this level
    pub fn try_voxel_coord(&self, block: BlockId, offset: u32) -> Option<IVec3> {
        let coord = self.block_coords.get(block.index())?;
        Some(*coord * self.block_size as i32 + local_coord(offset, self.block_size))
    }

    /// Level-local coordinate to the addressed active voxel
    pub fn resolve(&self, coord: IVec3) -> Option<VoxelIdx> {
        if !self.contains_coord(coord) {
            return None;
        }
        let (block_coord, local) = split_coord(coord, self.block_size);
        let block = self.block_at(block_coord);
        let offset = local_offset(local, self.block_size);
        if !self.is_voxel_active(block, offset) {
            return None;
        }
        Some(VoxelIdx {
            level: self.level,
            device: self.owners[block.index()],
            block,
            offset,
        })
    }

    /// Block and offset of `delta` away from a voxel, through the neighbor table.
    /// `delta` must stay within one block of the source block.
    pub fn locate(&self, block: BlockId, offset: u32, delta: IVec3) -> Option<(BlockId, u32)> {
        let target = local_coord(offset, self.block_size) + delta;
        let (block_delta, local) = split_coord(target, self.block_size);
        let dir = Direction::from_offset(block_delta)?;
        let neighbor = self.connectivity.neighbor(block, dir);
        neighbor
            .is_valid()
            .then(|| (neighbor, local_offset(local, self.block_size)))
    }

    pub fn class_of(&self, block: BlockId, offset: u32) -> ClassMask {
        self.class
            .get(block.index() * self.voxels_per_block() + offset as usize)
            .copied()
            .unwrap_or(ClassMask::NONE)
    }

    pub fn child_block(&self, block: BlockId, child: usize) -> BlockId {
        let r3 = (self.child_factor as usize).pow(3);
        self.children
            .get(block.index() * r3 + child)
            .copied()
            .unwrap_or(BlockId::INVALID)
    }

    pub fn parent_block(&self, block: BlockId) -> BlockId {
        self.parents
            .get(block.index())
            .copied()
            .unwrap_or(BlockId::INVALID)
    }

    pub fn total_active_voxels(&self) -> u64 {
        self.active_voxels.iter().map(|&v| v as u64).sum()
    }
}
