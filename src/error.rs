//! Error handling for the lattice
//!
//! Construction problems are fatal and surface as `GridError`; runtime lookups
//! that fall outside the active set return explicit absence instead.

use thiserror::Error;

/// Main error type for grid construction, field access and task launch
#[derive(Debug, Error)]
pub enum GridError {
    // Construction Errors
    #[error("Grid has no active voxels on any level")]
    NoActiveVoxels,

    #[error("Invalid domain {dim:?}: {reason}")]
    InvalidDomain { dim: (i32, i32, i32), reason: String },

    #[error("Invalid block size {size}: {reason}")]
    InvalidBlockSize { size: u32, reason: String },

    #[error("Invalid refinement at level {level} (factor {factor}): {reason}")]
    InvalidRefinement {
        level: usize,
        factor: u32,
        reason: String,
    },

    #[error("Stencil radius {radius} exceeds block size {block_size}")]
    StencilTooWide { radius: u32, block_size: u32 },

    // Backend Errors
    #[error("Invalid backend configuration: {reason}")]
    InvalidBackend { reason: String },

    #[error("Backend {kind} is not supported on this build")]
    UnsupportedBackend { kind: String },

    #[error("Device {device} out of range (backend has {count})")]
    InvalidDevice { device: u32, count: u32 },

    // Lookup Errors
    #[error("Level {level} out of range (grid has {depth})")]
    InvalidLevel { level: usize, depth: usize },

    #[error("Voxel {coord:?} on level {level} is outside the active domain")]
    OutsideDomain { coord: (i32, i32, i32), level: usize },

    #[error("Channel {channel} out of range for cardinality {cardinality}")]
    ChannelOutOfRange { channel: u32, cardinality: u32 },

    // Field / Task Errors
    #[error("Invalid field '{name}': {reason}")]
    InvalidField { name: String, reason: String },

    #[error("Task '{task}' reads '{field}' with a stencil but the grid has no stencil")]
    MissingStencil { task: String, field: String },

    #[error("Task '{task}' reads '{field}' with a stencil but its halo is stale")]
    HaloStale { task: String, field: String },

    #[error("Task '{task}' does not declare a write to '{field}'")]
    UndeclaredWrite { task: String, field: String },

    #[error("Field '{field}' belongs to a different grid than task '{task}'")]
    GridMismatch { task: String, field: String },

    // Configuration Errors
    #[error("Invalid config field '{field}' = {value}: {reason}")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    // Integrity Errors
    #[error("Grid consistency violated: {0}")]
    Consistency(String),
}

/// Result type alias for lattice operations
pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    /// Outside-domain error for a coordinate on a level
    pub fn outside(coord: glam::IVec3, level: usize) -> Self {
        GridError::OutsideDomain {
            coord: (coord.x, coord.y, coord.z),
            level,
        }
    }

    /// True for failures raised while building topology
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            GridError::NoActiveVoxels
                | GridError::InvalidDomain { .. }
                | GridError::InvalidBlockSize { .. }
                | GridError::InvalidRefinement { .. }
                | GridError::StencilTooWide { .. }
                | GridError::InvalidBackend { .. }
                | GridError::UnsupportedBackend { .. }
        )
    }
}

// Helper functions for common error patterns

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_grid<F>(self, f: F) -> GridResult<T>
    where
        F: FnOnce() -> GridError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_grid<F>(self, f: F) -> GridResult<T>
    where
        F: FnOnce() -> GridError,
    {
        self.ok_or_else(f)
    }
}
