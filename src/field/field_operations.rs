//! Field Operations - allocation, addressing and host-side access
//!
//! Reads never fail: anything outside the active set yields the outside
//! value. Writes outside the active set are rejected with
//! `GridError::OutsideDomain`.

use super::field_data::{Field, FieldElement, FieldId, LevelStorage, NeighborData};
use crate::error::{GridError, GridResult};
use crate::grid::{BlockId, DeviceId, Grid, LevelGrid, VoxelIdx};
use glam::IVec3;
use rayon::prelude::*;

impl Grid {
    /// Allocate a field of `cardinality` channels initialised to `outside_value`
    pub fn new_field<T: FieldElement>(
        &self,
        name: &str,
        cardinality: u32,
        outside_value: T,
    ) -> GridResult<Field<T>> {
        Field::new(self, name, cardinality, outside_value)
    }
}

impl<T: FieldElement> Field<T> {
    pub fn new(grid: &Grid, name: &str, cardinality: u32, outside_value: T) -> GridResult<Self> {
        if cardinality == 0 {
            return Err(GridError::InvalidField {
                name: name.to_string(),
                reason: "cardinality cannot be 0".to_string(),
            });
        }

        let chunk = cardinality as usize * grid.voxels_per_block();
        let levels: Vec<LevelStorage<T>> = grid
            .levels()
            .iter()
            .map(|level| LevelStorage {
                owned: level
                    .spans
                    .iter()
                    .map(|(_, s)| vec![outside_value; s.all().len() * chunk])
                    .collect(),
                ghosts: level
                    .halo
                    .iter()
                    .map(|h| vec![outside_value; h.ghost_count() * chunk])
                    .collect(),
            })
            .collect();

        let field = Self {
            id: FieldId::next(),
            name: name.to_string(),
            cardinality,
            outside_value,
            grid: grid.clone(),
            levels,
            halo_current: true,
        };

        log::info!(
            "[Field] Allocated '{}': {} channel(s), {} KB across {} level(s)",
            field.name,
            cardinality,
            field.allocated_bytes() / 1024,
            field.levels.len()
        );

        Ok(field)
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cardinality(&self) -> u32 {
        self.cardinality
    }

    pub fn outside_value(&self) -> T {
        self.outside_value
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Owned plus ghost bytes over every level and device
    pub fn allocated_bytes(&self) -> usize {
        let elements: usize = self
            .levels
            .iter()
            .map(|l| {
                l.owned.iter().map(Vec::len).sum::<usize>()
                    + l.ghosts.iter().map(Vec::len).sum::<usize>()
            })
            .sum();
        elements * std::mem::size_of::<T>()
    }

    // ========================================================================
    // Addressing
    // ========================================================================

    #[inline]
    fn block_chunk(&self) -> usize {
        self.cardinality as usize * self.grid.voxels_per_block()
    }

    /// (owner device, index into its owned array) of an active voxel
    fn locate_owned(
        &self,
        level: &LevelGrid,
        block: BlockId,
        offset: u32,
        channel: u32,
    ) -> Option<(usize, usize)> {
        if channel >= self.cardinality || !level.is_voxel_active(block, offset) {
            return None;
        }
        let owner = level.owners[block.index()];
        let start = level.spans.device(owner)?.all().start;
        let local = (block.0 - start) as usize;
        let vpb = self.grid.voxels_per_block();
        Some((
            owner.index(),
            local * self.block_chunk() + channel as usize * vpb + offset as usize,
        ))
    }

    fn owned_value(&self, level: &LevelGrid, block: BlockId, offset: u32, channel: u32) -> T {
        match self.locate_owned(level, block, offset, channel) {
            Some((device, i)) => self.levels[level.level].owned[device][i],
            None => self.outside_value,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, idx: &VoxelIdx, channel: u32) -> T {
        match self.grid.level(idx.level) {
            Ok(level) => self.owned_value(level, idx.block, idx.offset, channel),
            Err(_) => self.outside_value,
        }
    }

    /// Read by level-local coordinate
    pub fn get_at(&self, coord: IVec3, level: usize, channel: u32) -> T {
        match self.grid.resolve(coord, level) {
            Some(idx) => self.get(&idx, channel),
            None => self.outside_value,
        }
    }

    /// Same-level neighbor `offset` away, read from owned or ghost storage of `idx.device`
    ///
    /// Neighbors owned by another device come from ghost storage, which holds
    /// the values copied by the last `halo_update`. Writes made since then are
    /// not visible across devices until the next update.
    pub fn neighbor(&self, idx: &VoxelIdx, offset: IVec3, channel: u32) -> NeighborData<T> {
        let invalid = NeighborData::invalid(self.outside_value);
        if channel >= self.cardinality {
            return invalid;
        }
        let Ok(level) = self.grid.level(idx.level) else {
            return invalid;
        };
        let Some((block, voxel)) = level.locate(idx.block, idx.offset, offset) else {
            return invalid;
        };
        if !level.is_voxel_active(block, voxel) {
            return invalid;
        }

        let owner = level.owners[block.index()];
        if owner != idx.device {
            let slot = level
                .halo
                .get(idx.device.index())
                .and_then(|plan| plan.ghost_slot(block));
            if let Some(slot) = slot {
                let vpb = self.grid.voxels_per_block();
                let i = slot * self.block_chunk() + channel as usize * vpb + voxel as usize;
                return NeighborData::valid(self.levels[idx.level].ghosts[idx.device.index()][i]);
            }
        }
        NeighborData::valid(self.owned_value(level, block, voxel, channel))
    }

    /// Neighbor through the grid stencil's `slot`-th offset
    pub fn stencil_neighbor(&self, idx: &VoxelIdx, slot: usize, channel: u32) -> NeighborData<T> {
        match self.grid.stencil().and_then(|s| s.points().get(slot)) {
            Some(&offset) => self.neighbor(idx, offset, channel),
            None => NeighborData::invalid(self.outside_value),
        }
    }

    /// Value of the covering voxel one level coarser
    pub fn parent_value(&self, idx: &VoxelIdx, channel: u32) -> NeighborData<T> {
        match self.grid.parent(idx) {
            Some(parent) => NeighborData::valid(self.get(&parent, channel)),
            None => NeighborData::invalid(self.outside_value),
        }
    }

    /// Value of child `child ∈ [0, r)³` one level finer
    pub fn child_value(&self, idx: &VoxelIdx, child: IVec3, channel: u32) -> NeighborData<T> {
        match self.grid.child(idx, child) {
            Some(c) => NeighborData::valid(self.get(&c, channel)),
            None => NeighborData::invalid(self.outside_value),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn set(&mut self, idx: &VoxelIdx, channel: u32, value: T) -> GridResult<()> {
        if channel >= self.cardinality {
            return Err(GridError::ChannelOutOfRange {
                channel,
                cardinality: self.cardinality,
            });
        }
        let level = self.grid.level(idx.level)?;
        let (device, i) = self
            .locate_owned(level, idx.block, idx.offset, channel)
            .ok_or_else(|| {
                let coord = level
                    .try_voxel_coord(idx.block, idx.offset)
                    .unwrap_or(IVec3::splat(-1));
                GridError::outside(coord, idx.level)
            })?;
        self.levels[idx.level].owned[device][i] = value;
        self.halo_current = false;
        Ok(())
    }

    /// Write by level-local coordinate
    pub fn set_at(&mut self, coord: IVec3, level: usize, channel: u32, value: T) -> GridResult<()> {
        self.grid.level(level)?;
        let idx = self
            .grid
            .resolve(coord, level)
            .ok_or_else(|| GridError::outside(coord, level))?;
        self.set(&idx, channel, value)
    }

    /// Set every channel of every active voxel
    pub fn fill(&mut self, value: T) {
        self.fill_with(|_, _| value);
    }

    /// Initialise every active voxel from `f(voxel, channel)`, devices in parallel
    pub fn fill_with(&mut self, f: impl Fn(&VoxelIdx, u32) -> T + Send + Sync) {
        let grid = self.grid.clone();
        let vpb = grid.voxels_per_block();
        let card = self.cardinality as usize;
        let chunk = self.block_chunk();
        let levels = &mut self.levels;

        grid.backend().install(|| {
            for (l, storage) in levels.iter_mut().enumerate() {
                let level = &grid.levels()[l];
                storage
                    .owned
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(d, owned)| {
                        let device = DeviceId(d as u32);
                        let Some(spans) = level.spans.device(device) else {
                            return;
                        };
                        let all = spans.all();
                        for block in all.iter() {
                            let base = (block.0 - all.start) as usize * chunk;
                            for offset in level.active.iter_active(block) {
                                let idx = VoxelIdx {
                                    level: l,
                                    device,
                                    block,
                                    offset,
                                };
                                for c in 0..card {
                                    owned[base + c * vpb + offset as usize] = f(&idx, c as u32);
                                }
                            }
                        }
                    });
            }
        });
        self.halo_current = false;
    }

    /// Copy all owned values from a field on the same grid
    pub fn copy_from(&mut self, other: &Field<T>) -> GridResult<()> {
        if !self.grid.same_grid(&other.grid) || self.cardinality != other.cardinality {
            return Err(GridError::InvalidField {
                name: self.name.clone(),
                reason: format!("cannot copy from '{}': grid or cardinality differs", other.name),
            });
        }
        for (dst, src) in self.levels.iter_mut().zip(&other.levels) {
            for (d, s) in dst.owned.iter_mut().zip(&src.owned) {
                d.copy_from_slice(s);
            }
        }
        self.halo_current = false;
        Ok(())
    }

    // ========================================================================
    // Raw views
    // ========================================================================

    /// Owned values of one device on one level
    pub fn partition_data(&self, level: usize, device: DeviceId) -> GridResult<&[T]> {
        self.grid.level(level)?;
        self.grid.backend().check_device(device)?;
        Ok(&self.levels[level].owned[device.index()])
    }

    /// Byte view of `partition_data`, for external I/O
    pub fn partition_bytes(&self, level: usize, device: DeviceId) -> GridResult<&[u8]> {
        Ok(bytemuck::cast_slice(self.partition_data(level, device)?))
    }

    /// Sum of `f` over every active voxel and channel
    pub fn reduce_sum(&self, f: impl Fn(T) -> f64 + Sync) -> f64 {
        let mut total = 0.0;
        self.grid.for_each_active(|idx| {
            for c in 0..self.cardinality {
                total += f(self.get(idx, c));
            }
        });
        total
    }

    pub(crate) fn mark_written(&mut self) {
        self.halo_current = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::field::FieldAccess;
    use crate::grid::GridBuilder;

    fn grid(devices: u32) -> Grid {
        GridBuilder::new(&Backend::host(devices).unwrap(), IVec3::splat(16))
            .predicate(|p| p.x < 12)
            .build()
            .unwrap()
    }

    #[test]
    fn test_allocation_size() {
        let g = grid(2);
        let f: Field<f32> = g.new_field("rho", 3, -1.0).unwrap();
        // 8 blocks are active (x < 12 spans both block columns)
        let owned: usize = (0..2)
            .map(|d| f.partition_data(0, DeviceId(d)).unwrap().len())
            .sum();
        assert_eq!(owned, 8 * 512 * 3);
        assert!(f.allocated_bytes() >= owned * 4);
    }

    #[test]
    fn test_zero_cardinality_rejected() {
        let g = grid(1);
        assert!(g.new_field::<f32>("bad", 0, 0.0).is_err());
    }

    #[test]
    fn test_outside_value_reads() {
        let g = grid(1);
        let mut f: Field<f32> = g.new_field("u", 1, -7.0).unwrap();
        f.fill(1.0);
        assert_eq!(f.get_at(IVec3::new(3, 3, 3), 0, 0), 1.0);
        assert_eq!(f.get_at(IVec3::new(13, 3, 3), 0, 0), -7.0);
        assert_eq!(f.get_at(IVec3::new(-1, 3, 3), 0, 0), -7.0);
        assert_eq!(f.get_at(IVec3::new(3, 3, 3), 0, 5), -7.0);
        assert_eq!(f.get_at(IVec3::new(3, 3, 3), 4, 0), -7.0);
    }

    #[test]
    fn test_write_outside_is_error() {
        let g = grid(1);
        let mut f: Field<f32> = g.new_field("u", 1, 0.0).unwrap();
        assert!(matches!(
            f.set_at(IVec3::new(14, 0, 0), 0, 0, 1.0),
            Err(GridError::OutsideDomain { .. })
        ));
        assert!(matches!(
            f.set_at(IVec3::new(1, 0, 0), 0, 1, 1.0),
            Err(GridError::ChannelOutOfRange { .. })
        ));
        f.set_at(IVec3::new(1, 0, 0), 0, 0, 4.0).unwrap();
        assert_eq!(f.get_at(IVec3::new(1, 0, 0), 0, 0), 4.0);
    }

    #[test]
    fn test_neighbor_reads_cross_block() {
        let g = grid(1);
        let mut f: Field<i32> = g.new_field("id", 1, -1).unwrap();
        f.fill_with(|idx, _| g.voxel_coord(idx).x);
        let idx = g.resolve(IVec3::new(7, 0, 0), 0).unwrap();
        let right = f.neighbor(&idx, IVec3::X, 0);
        assert!(right.is_valid);
        assert_eq!(right.value, 8);
        let left_edge = g.resolve(IVec3::new(0, 0, 0), 0).unwrap();
        let nb = f.neighbor(&left_edge, IVec3::NEG_X, 0);
        assert!(!nb.is_valid);
        assert_eq!(nb.value, -1);
        // x = 12 is inactive
        let edge = g.resolve(IVec3::new(11, 0, 0), 0).unwrap();
        assert_eq!(f.neighbor(&edge, IVec3::X, 0).get(), None);
    }

    #[test]
    fn test_ghost_reads_need_halo_update() {
        let g = grid(2);
        let mut f: Field<f32> = g.new_field("u", 1, 0.0).unwrap();
        f.fill(3.0);
        assert!(!f.is_halo_current());

        // Find a voxel whose +z neighbor lives on the other device
        let mut pair = None;
        g.for_each_active(|idx| {
            if pair.is_none() {
                if let Some(n) = g.neighbor(idx, IVec3::Z) {
                    if n.device != idx.device {
                        pair = Some(*idx);
                    }
                }
            }
        });
        let idx = pair.unwrap();

        // Ghost still holds the allocation value
        assert_eq!(f.neighbor(&idx, IVec3::Z, 0).value, 0.0);
        f.halo_update();
        assert!(f.is_halo_current());
        assert_eq!(f.neighbor(&idx, IVec3::Z, 0).value, 3.0);
    }

    #[test]
    fn test_copy_and_bytes() {
        let g = grid(1);
        let mut a: Field<f32> = g.new_field("a", 1, 0.0).unwrap();
        let mut b: Field<f32> = g.new_field("b", 1, 0.0).unwrap();
        a.fill(2.0);
        b.copy_from(&a).unwrap();
        assert_eq!(b.get_at(IVec3::ONE, 0, 0), 2.0);
        let bytes = b.partition_bytes(0, DeviceId(0)).unwrap();
        assert_eq!(bytes.len(), b.partition_data(0, DeviceId(0)).unwrap().len() * 4);
        assert!((a.reduce_sum(|v| v as f64) - 2.0 * (12 * 16 * 16) as f64).abs() < 1e-9);
    }
}
