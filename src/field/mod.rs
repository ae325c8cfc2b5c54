//! Per-voxel field storage
//!
//! A field is bound to one grid snapshot, owns its data exclusively and keeps
//! the grid alive through a shared handle.

pub mod field_data;
pub mod field_operations;
pub mod halo;
pub mod writer;

pub use field_data::{Field, FieldAccess, FieldElement, FieldId, LevelStorage, NeighborData};
pub use writer::VoxelWriter;
