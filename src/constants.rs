//! Lattice-wide constants
//!
//! Grouped the same way the rest of the crate consumes them: block layout,
//! connectivity, and hard limits checked during construction.

/// Block layout
pub mod core {
    /// Default edge length of a dense block, in voxels
    pub const DEFAULT_BLOCK_SIZE: u32 = 8;

    /// Largest supported block edge (32³ voxels per block)
    pub const MAX_BLOCK_SIZE: u32 = 32;

    /// Bits per occupancy word
    pub const MASK_WORD_BITS: u32 = 64;

    /// Sentinel for every integer handle (block, device)
    pub const INVALID_ID: u32 = u32::MAX;
}

/// 3×3×3 block neighborhood
pub mod connectivity {
    /// Entries in a block neighbor table
    pub const NEIGHBOR_COUNT: usize = 27;

    /// Slot of the block itself, direction (0, 0, 0)
    pub const SELF_SLOT: usize = 13;

    /// The six face-adjacent slots: -x, +x, -y, +y, -z, +z
    pub const FACE_SLOTS: [usize; 6] = [12, 14, 10, 16, 4, 22];
}

/// Hard construction limits
pub mod limits {
    /// Maximum devices a backend may expose
    pub const MAX_DEVICES: u32 = 64;

    /// Maximum refinement levels
    pub const MAX_LEVELS: usize = 8;

    /// Maximum ratio between two adjacent levels
    pub const MAX_REFINEMENT_FACTOR: u32 = 8;

    /// Largest extent along one axis; block coordinates must fit 21 Morton bits
    pub const MAX_DOMAIN_EXTENT: i32 = 1 << 20;
}
