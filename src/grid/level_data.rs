//! Level Data - struct-of-arrays topology of one refinement level
//!
//! Block ids `[0, active_blocks)` are active and owned by exactly one device.
//! Ids `[active_blocks, block_coords.len())` are shell blocks: inactive,
//! in-domain, adjacent to an active block, materialized so neighbor tables can
//! point at them, never allocated in fields.

use super::bitmask::{ActiveBitmask, ClassMask};
use super::connectivity::BlockConnectivity;
use super::core::{BlockId, DeviceId};
use super::halo_plan::HaloPlan;
use super::partition::SpanTable;
use glam::IVec3;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct LevelGrid {
    pub level: usize,
    /// Base-space size of one voxel
    pub spacing: i32,
    /// Level-local voxel extent
    pub dim: IVec3,
    /// Blocks per axis covering `dim`
    pub block_dim: IVec3,
    pub block_size: u32,
    pub active_blocks: u32,

    // Per materialized block
    pub block_coords: Vec<IVec3>,
    pub active: ActiveBitmask,
    pub refined: ActiveBitmask,
    pub connectivity: BlockConnectivity,
    /// Coarser block containing this one; invalid on the coarsest level
    pub parents: Vec<BlockId>,
    /// `child_factor³` finer blocks per block, x fastest; empty on level 0
    pub children: Vec<BlockId>,
    pub child_factor: u32,

    // Per active block
    pub owners: Vec<DeviceId>,
    pub active_voxels: Vec<u32>,

    // Per voxel of every materialized block
    pub class: Vec<ClassMask>,

    pub origin_index: FxHashMap<IVec3, BlockId>,
    pub spans: SpanTable,
    pub halo: Vec<HaloPlan>,
}
