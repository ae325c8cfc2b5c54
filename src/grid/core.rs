//! Core handles and addressing math
//!
//! Every topological entity is an integer handle into per-level arrays.

use crate::constants::connectivity::{FACE_SLOTS, NEIGHBOR_COUNT, SELF_SLOT};
use crate::constants::core::INVALID_ID;
use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a materialized block within one level
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const INVALID: Self = Self(INVALID_ID);

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != INVALID_ID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "B{}", self.0)
        } else {
            write!(f, "B<invalid>")
        }
    }
}

/// Handle of a device within the backend
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub const INVALID: Self = Self(INVALID_ID);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

static_assertions::assert_eq_size!(BlockId, u32);
static_assertions::assert_eq_size!(DeviceId, u32);

/// Fully resolved address of one active voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelIdx {
    pub level: usize,
    pub device: DeviceId,
    pub block: BlockId,
    /// Linear offset inside the block, `x + y·B + z·B²`
    pub offset: u32,
}

/// Which subset of a device's blocks to iterate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataView {
    /// Blocks with no 26-neighbor owned by another device
    Internal,
    /// Blocks with at least one 26-neighbor on another device
    Boundary,
    All,
}

impl DataView {
    pub const ALL_VIEWS: [DataView; 3] = [DataView::Internal, DataView::Boundary, DataView::All];
}

// ============================================================================
// 27-neighborhood directions
// ============================================================================

/// One of the 27 block-neighborhood directions, slot `(dx+1) + 3(dy+1) + 9(dz+1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Direction(u8);

impl Direction {
    pub const SELF: Self = Self(SELF_SLOT as u8);

    pub fn from_offset(d: IVec3) -> Option<Self> {
        if d.abs().max_element() > 1 {
            return None;
        }
        Some(Self(((d.x + 1) + 3 * (d.y + 1) + 9 * (d.z + 1)) as u8))
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        (slot < NEIGHBOR_COUNT).then_some(Self(slot as u8))
    }

    #[inline]
    pub fn slot(self) -> usize {
        self.0 as usize
    }

    pub fn offset(self) -> IVec3 {
        let i = self.0 as i32;
        IVec3::new(i % 3 - 1, (i / 3) % 3 - 1, i / 9 - 1)
    }

    /// Slot of `-d`
    #[inline]
    pub fn opposite(self) -> Self {
        Self(26 - self.0)
    }

    pub fn all() -> impl Iterator<Item = Direction> {
        (0..NEIGHBOR_COUNT as u8).map(Direction)
    }

    /// The 26 directions excluding self
    pub fn around() -> impl Iterator<Item = Direction> {
        Self::all().filter(|d| *d != Self::SELF)
    }

    pub fn faces() -> impl Iterator<Item = Direction> {
        FACE_SLOTS.iter().map(|&s| Direction(s as u8))
    }
}

// ============================================================================
// In-block addressing
// ============================================================================

/// Linear in-block offset of a local coordinate
#[inline]
pub fn local_offset(local: IVec3, block_size: u32) -> u32 {
    let b = block_size as i32;
    (local.x + local.y * b + local.z * b * b) as u32
}

/// Local coordinate of a linear in-block offset
#[inline]
pub fn local_coord(offset: u32, block_size: u32) -> IVec3 {
    let b = block_size;
    IVec3::new(
        (offset % b) as i32,
        ((offset / b) % b) as i32,
        (offset / (b * b)) as i32,
    )
}

/// Split a level-local voxel coordinate into (block coordinate, local coordinate)
#[inline]
pub fn split_coord(coord: IVec3, block_size: u32) -> (IVec3, IVec3) {
    let b = block_size as i32;
    (div_floor(coord, b), rem_floor(coord, b))
}

/// Component-wise floor division
#[inline]
pub fn div_floor(v: IVec3, d: i32) -> IVec3 {
    IVec3::new(v.x.div_euclid(d), v.y.div_euclid(d), v.z.div_euclid(d))
}

/// Component-wise euclidean remainder
#[inline]
pub fn rem_floor(v: IVec3, d: i32) -> IVec3 {
    IVec3::new(v.x.rem_euclid(d), v.y.rem_euclid(d), v.z.rem_euclid(d))
}

/// Voxels in one cubic block
#[inline]
pub fn voxels_per_block(block_size: u32) -> usize {
    (block_size as usize).pow(3)
}
