//! Task Data - declared accesses and dispatch results
//!
//! A task names the fields it reads (and how), the single field it writes, the
//! data view and the levels it covers. Declarations are checked once in
//! `TaskBuilder::build`; halo staleness is checked at every launch.

use crate::error::{GridError, GridResult};
use crate::field::{FieldAccess, FieldId};
use crate::grid::{DataView, Grid};

/// How a task reads a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// Only the voxel being computed
    Map,
    /// The voxel and its stencil neighbors
    Stencil,
}

/// One declared read
pub struct ReadAccess<'a> {
    pub field: &'a dyn FieldAccess,
    pub pattern: AccessPattern,
}

/// The declared write target, recorded by identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub id: FieldId,
    pub name: String,
}

/// A validated, reusable unit of per-voxel work
pub struct Task<'a> {
    pub(crate) name: String,
    pub(crate) reads: Vec<ReadAccess<'a>>,
    pub(crate) write: WriteTarget,
    pub(crate) view: DataView,
    pub(crate) levels: Vec<usize>,
    pub(crate) grid: Grid,
}

impl<'a> Task<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> DataView {
        self.view
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn write_target(&self) -> &WriteTarget {
        &self.write
    }

    pub fn read_count(&self) -> usize {
        self.reads.len()
    }

    /// Task needs current ghost storage for its stencil reads
    pub fn needs_halo(&self) -> bool {
        self.view != DataView::Internal
            && self
                .reads
                .iter()
                .any(|r| r.pattern == AccessPattern::Stencil)
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct TaskBuilder<'a> {
    name: String,
    reads: Vec<ReadAccess<'a>>,
    write: Option<(WriteTarget, Grid)>,
    view: DataView,
    levels: Option<Vec<usize>>,
}

impl<'a> TaskBuilder<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Vec::new(),
            write: None,
            view: DataView::All,
            levels: None,
        }
    }

    /// Declare a same-voxel read
    pub fn read(mut self, field: &'a dyn FieldAccess) -> Self {
        self.reads.push(ReadAccess {
            field,
            pattern: AccessPattern::Map,
        });
        self
    }

    /// Declare a read through the grid stencil
    pub fn stencil(mut self, field: &'a dyn FieldAccess) -> Self {
        self.reads.push(ReadAccess {
            field,
            pattern: AccessPattern::Stencil,
        });
        self
    }

    /// Declare the field the kernel writes
    pub fn write(mut self, field: &dyn FieldAccess) -> Self {
        self.write = Some((
            WriteTarget {
                id: field.field_id(),
                name: field.field_name().to_string(),
            },
            field.field_grid().clone(),
        ));
        self
    }

    pub fn view(mut self, view: DataView) -> Self {
        self.view = view;
        self
    }

    /// Restrict the task to one level; may be called repeatedly
    pub fn level(mut self, level: usize) -> Self {
        let levels = self.levels.get_or_insert_with(Vec::new);
        if !levels.contains(&level) {
            levels.push(level);
        }
        self
    }

    pub fn build(self) -> GridResult<Task<'a>> {
        let (write, grid) = self.write.ok_or_else(|| GridError::UndeclaredWrite {
            task: self.name.clone(),
            field: "<none>".to_string(),
        })?;

        for read in &self.reads {
            if !read.field.field_grid().same_grid(&grid) {
                return Err(GridError::GridMismatch {
                    task: self.name.clone(),
                    field: read.field.field_name().to_string(),
                });
            }
            if read.pattern == AccessPattern::Stencil && grid.stencil().is_none() {
                return Err(GridError::MissingStencil {
                    task: self.name.clone(),
                    field: read.field.field_name().to_string(),
                });
            }
        }

        let mut levels = self
            .levels
            .unwrap_or_else(|| (0..grid.depth()).collect());
        levels.sort_unstable();
        if let Some(&level) = levels.iter().find(|&&l| l >= grid.depth()) {
            return Err(GridError::InvalidLevel {
                level,
                depth: grid.depth(),
            });
        }

        log::debug!(
            "[Task] Built '{}': {} read(s), writes '{}', view {:?}, levels {:?}",
            self.name,
            self.reads.len(),
            write.name,
            self.view,
            levels
        );

        Ok(Task {
            name: self.name,
            reads: self.reads,
            write,
            view: self.view,
            levels,
            grid,
        })
    }
}

// ============================================================================
// Dispatch statistics
// ============================================================================

/// Work done on one device during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceDispatch {
    pub blocks: usize,
    pub voxels: u64,
}

/// Per-device counts of one task run, summed over its levels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub per_device: Vec<DeviceDispatch>,
}

impl DispatchStats {
    pub fn new(device_count: usize) -> Self {
        Self {
            per_device: vec![DeviceDispatch::default(); device_count],
        }
    }

    pub fn total_blocks(&self) -> usize {
        self.per_device.iter().map(|d| d.blocks).sum()
    }

    pub fn total_voxels(&self) -> u64 {
        self.per_device.iter().map(|d| d.voxels).sum()
    }
}
