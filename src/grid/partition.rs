//! Block partitioning and span tables
//!
//! Active blocks are ordered along the Morton curve of their block coordinates
//! and split into contiguous count-balanced runs, one per device. Ids are then
//! assigned per device as internal blocks first, boundary blocks second, so
//! every data view is a plain id range.

use super::core::{BlockId, DataView, DeviceId, Direction};
use crate::morton::block_key;
use glam::IVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;

/// Half-open range of block ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, block: BlockId) -> bool {
        block.0 >= self.start && block.0 < self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockId> {
        (self.start..self.end).map(BlockId)
    }
}

/// Per-device internal and boundary ranges; `all` is their concatenation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSpans {
    pub internal: Span,
    pub boundary: Span,
}

impl DeviceSpans {
    pub fn all(&self) -> Span {
        Span::new(self.internal.start, self.boundary.end)
    }

    pub fn view(&self, view: DataView) -> Span {
        match view {
            DataView::Internal => self.internal,
            DataView::Boundary => self.boundary,
            DataView::All => self.all(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanTable {
    devices: Vec<DeviceSpans>,
}

impl SpanTable {
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, device: DeviceId) -> Option<&DeviceSpans> {
        self.devices.get(device.index())
    }

    pub fn span(&self, device: DeviceId, view: DataView) -> Option<Span> {
        self.device(device).map(|d| d.view(view))
    }

    /// Owner of an active block id; `None` for shells and invalid ids
    pub fn owner_of(&self, block: BlockId) -> Option<DeviceId> {
        let idx = self
            .devices
            .partition_point(|d| d.boundary.end <= block.0);
        self.devices
            .get(idx)
            .filter(|d| d.all().contains(block))
            .map(|_| DeviceId(idx as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &DeviceSpans)> {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, d)| (DeviceId(i as u32), d))
    }
}

/// Result of partitioning one level
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    /// Block coordinate of every active block, indexed by final id
    pub ordered: Vec<IVec3>,
    /// Owner of every active block, indexed by final id
    pub owners: Vec<DeviceId>,
    pub spans: SpanTable,
}

/// Sort block coordinates along the Z-order curve
pub fn morton_order(coords: &mut [IVec3]) {
    coords.sort_unstable_by_key(|c| block_key(*c));
}

/// `n / d` items per device, the first `n % d` devices take one extra
pub fn balanced_split(n: usize, devices: u32) -> Vec<Range<usize>> {
    let d = devices.max(1) as usize;
    let base = n / d;
    let extra = n % d;
    let mut start = 0;
    (0..d)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Assign active blocks to devices and number them
pub fn partition_blocks(mut active: Vec<IVec3>, device_count: u32) -> PartitionPlan {
    morton_order(&mut active);

    let runs = balanced_split(active.len(), device_count);
    let mut owner_of: FxHashMap<IVec3, u32> = FxHashMap::default();
    owner_of.reserve(active.len());
    for (device, run) in runs.iter().enumerate() {
        for coord in &active[run.clone()] {
            owner_of.insert(*coord, device as u32);
        }
    }

    let is_boundary = |coord: IVec3, device: u32| {
        Direction::around().any(|d| {
            owner_of
                .get(&(coord + d.offset()))
                .is_some_and(|&o| o != device)
        })
    };

    let mut ordered = Vec::with_capacity(active.len());
    let mut owners = Vec::with_capacity(active.len());
    let mut devices = Vec::with_capacity(runs.len());

    for (device, run) in runs.iter().enumerate() {
        let device = device as u32;
        let (boundary, internal): (Vec<IVec3>, Vec<IVec3>) = active[run.clone()]
            .iter()
            .partition(|c| is_boundary(**c, device));

        let start = ordered.len() as u32;
        ordered.extend(internal);
        let mid = ordered.len() as u32;
        ordered.extend(boundary);
        let end = ordered.len() as u32;
        owners.extend(std::iter::repeat(DeviceId(device)).take((end - start) as usize));

        if start == end {
            log::warn!("[Partitioner] Device {} received no blocks", device);
        }

        devices.push(DeviceSpans {
            internal: Span::new(start, mid),
            boundary: Span::new(mid, end),
        });
    }

    PartitionPlan {
        ordered,
        owners,
        spans: SpanTable { devices },
    }
}

/// Inactive in-domain blocks 26-adjacent to an active block, in Morton order
pub fn shell_blocks(active: &[IVec3], block_dim: IVec3) -> Vec<IVec3> {
    let active_set: FxHashSet<IVec3> = active.iter().copied().collect();
    let mut shells: FxHashSet<IVec3> = FxHashSet::default();

    for &coord in active {
        for d in Direction::around() {
            let n = coord + d.offset();
            let inside = n.cmpge(IVec3::ZERO).all() && n.cmplt(block_dim).all();
            if inside && !active_set.contains(&n) {
                shells.insert(n);
            }
        }
    }

    let mut shells: Vec<IVec3> = shells.into_iter().collect();
    morton_order(&mut shells);
    shells
}
