// Voxel Lattice - block-sparse multi-resolution grid topology
//
// Data-oriented layout throughout:
// - Topology lives in id-indexed arrays owned by `LevelGrid`, shared through `Grid`
// - Fields are flat per-device arrays addressed by (block, channel, voxel)
// - Behaviour is split into *_data and *_operations modules
//
// Typical flow:
// - backend::Backend::host(devices) or GridConfig::load(path)
// - grid::GridBuilder -> Grid
// - Grid::new_field -> Field<T>
// - task::TaskBuilder -> Task::run(kernel)

// Constants module
pub mod constants;

// Core modules
pub mod error;
pub mod morton;

// Execution backend
pub mod backend;

// Topology and storage
pub mod field;
pub mod grid;
pub mod task;

// Configuration and integrity checks
pub mod config;
pub mod validation;

pub use backend::{create_backend, Backend, BackendConfig, BackendKind};
pub use config::GridConfig;
pub use error::{GridError, GridResult, OptionExt};
pub use field::{Field, FieldAccess, FieldElement, FieldId, NeighborData, VoxelWriter};
pub use grid::{
    surface_classifier, ActivityPredicate, BlockId, ClassMask, Classifier, DataView, DeviceId,
    Direction, Grid, GridBuilder, LevelGrid, NodeToVoxelMask, RefinementDescriptor, Span, Stencil,
    StencilKind, VoxelIdx, VoxelNeighborhood,
};
pub use task::{AccessPattern, DispatchStats, Task, TaskBuilder};
pub use validation::{compute_grid_stats, log_grid_stats, validate_grid, GridStats, LevelStats};

// Re-export glam so callers name coordinates with the same type
pub use glam;
