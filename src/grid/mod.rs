//! Block-sparse multi-resolution grid topology
//!
//! Construction flows leaves first: per-level predicates produce occupancy
//! masks, linkage closes them across levels, partitioning assigns blocks to
//! devices, and connectivity plus halo plans are derived from the result.
//! The finished topology is immutable and shared through `Grid`.

pub mod bitmask;
pub mod builder;
pub mod classification;
pub mod connectivity;
pub mod core;
pub mod halo_plan;
pub mod level_data;
pub mod level_operations;
pub mod multires;
pub mod node_mask;
pub mod partition;
pub mod stencil;
pub mod topology;

pub use bitmask::{ActiveBitmask, ClassMask};
pub use builder::{ActivityPredicate, GridBuilder};
pub use classification::{surface_classifier, Classifier, VoxelNeighborhood};
pub use connectivity::BlockConnectivity;
pub use self::core::{
    div_floor, local_coord, local_offset, split_coord, BlockId, DataView, DeviceId, Direction,
    VoxelIdx,
};
pub use halo_plan::HaloPlan;
pub use level_data::LevelGrid;
pub use multires::RefinementDescriptor;
pub use node_mask::NodeToVoxelMask;
pub use partition::{DeviceSpans, Span, SpanTable};
pub use stencil::{Stencil, StencilKind};
pub use topology::Grid;
