//! Per-voxel write handle passed to task kernels

/// Mutable view of one voxel's channels inside its block
///
/// Channels at or past the field's cardinality are never touched: `get`
/// returns `None` and `set` drops the value, remembering the first rejected
/// channel so the launch can report it.
pub struct VoxelWriter<'a, T> {
    block: &'a mut [T],
    voxel: usize,
    voxels_per_block: usize,
    cardinality: usize,
    rejected: Option<u32>,
}

impl<'a, T: Copy> VoxelWriter<'a, T> {
    pub(crate) fn new(
        block: &'a mut [T],
        voxel: usize,
        voxels_per_block: usize,
        cardinality: usize,
    ) -> Self {
        debug_assert_eq!(block.len(), voxels_per_block * cardinality);
        Self {
            block,
            voxel,
            voxels_per_block,
            cardinality,
            rejected: None,
        }
    }

    #[inline]
    fn index(&self, channel: u32) -> Option<usize> {
        ((channel as usize) < self.cardinality)
            .then(|| channel as usize * self.voxels_per_block + self.voxel)
    }

    /// Current value of a channel
    #[inline]
    pub fn get(&self, channel: u32) -> Option<T> {
        self.index(channel).map(|i| self.block[i])
    }

    #[inline]
    pub fn set(&mut self, channel: u32, value: T) {
        match self.index(channel) {
            Some(i) => self.block[i] = value,
            None => {
                self.rejected.get_or_insert(channel);
            }
        }
    }

    pub fn cardinality(&self) -> u32 {
        self.cardinality as u32
    }

    /// First out-of-range channel passed to `set`
    pub(crate) fn rejected(&self) -> Option<u32> {
        self.rejected
    }
}
