//! Field Data - per-voxel storage bound to one grid
//!
//! Layout per level and device: `[local block][channel][voxel]`, so values of
//! one channel in one block are contiguous. Ghost storage mirrors the foreign
//! blocks named by the device's halo plan with the same layout.

use crate::grid::Grid;
use bytemuck::Pod;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Element types a field can hold
pub trait FieldElement: Pod + Send + Sync {}

impl<T: Pod + Send + Sync> FieldElement for T {}

/// Process-unique field identity used by task declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

impl FieldId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Storage of one level, indexed by device
#[derive(Debug, Clone)]
pub struct LevelStorage<T> {
    pub owned: Vec<Vec<T>>,
    pub ghosts: Vec<Vec<T>>,
}

pub struct Field<T: FieldElement> {
    pub(crate) id: FieldId,
    pub(crate) name: String,
    pub(crate) cardinality: u32,
    pub(crate) outside_value: T,
    pub(crate) grid: Grid,
    pub(crate) levels: Vec<LevelStorage<T>>,
    pub(crate) halo_current: bool,
}

impl<T: FieldElement + fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("outside_value", &self.outside_value)
            .field("levels", &self.levels.len())
            .field("halo_current", &self.halo_current)
            .finish()
    }
}

/// Result of a neighbor, parent or child read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborData<T> {
    pub is_valid: bool,
    /// The stored value, or the field's outside value when invalid
    pub value: T,
}

impl<T: Copy> NeighborData<T> {
    pub fn valid(value: T) -> Self {
        Self {
            is_valid: true,
            value,
        }
    }

    pub fn invalid(outside: T) -> Self {
        Self {
            is_valid: false,
            value: outside,
        }
    }

    pub fn get(&self) -> Option<T> {
        self.is_valid.then_some(self.value)
    }

    pub fn unwrap_or(&self, default: T) -> T {
        if self.is_valid {
            self.value
        } else {
            default
        }
    }
}

/// Type-erased view of a field used when declaring task accesses
pub trait FieldAccess: Send + Sync {
    fn field_id(&self) -> FieldId;
    fn field_name(&self) -> &str;
    fn field_grid(&self) -> &Grid;
    /// Ghost storage matches owner storage
    fn is_halo_current(&self) -> bool;
}

impl<T: FieldElement> FieldAccess for Field<T> {
    fn field_id(&self) -> FieldId {
        self.id
    }

    fn field_name(&self) -> &str {
        &self.name
    }

    fn field_grid(&self) -> &Grid {
        &self.grid
    }

    fn is_halo_current(&self) -> bool {
        Field::is_halo_current(self)
    }
}
