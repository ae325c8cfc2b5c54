//! Halo exchange
//!
//! Copies every ghost block from its owner's storage. Devices are updated in
//! parallel; each writes only its own ghost array.

use super::field_data::{Field, FieldElement, LevelStorage};
use rayon::prelude::*;

impl<T: FieldElement> Field<T> {
    /// Ghost storage matches owner storage; always true with a single device
    pub fn is_halo_current(&self) -> bool {
        self.halo_current || self.grid.device_count() == 1
    }

    /// Refresh ghost storage on every level
    pub fn halo_update(&mut self) {
        let grid = self.grid.clone();
        let chunk = self.cardinality as usize * grid.voxels_per_block();
        let levels = &mut self.levels;

        let copied: usize = grid.backend().install(|| {
            levels
                .iter_mut()
                .enumerate()
                .map(|(l, storage)| {
                    let level = &grid.levels()[l];
                    let LevelStorage { owned, ghosts } = storage;
                    let owned = &*owned;

                    ghosts
                        .par_iter_mut()
                        .enumerate()
                        .map(|(d, ghost)| {
                            let plan = &level.halo[d];
                            for (slot, &block) in plan.ghost_blocks.iter().enumerate() {
                                let owner = level.owners[block.index()];
                                let start = level
                                    .spans
                                    .device(owner)
                                    .map_or(0, |s| s.all().start);
                                let local = (block.0 - start) as usize;
                                ghost[slot * chunk..(slot + 1) * chunk].copy_from_slice(
                                    &owned[owner.index()][local * chunk..(local + 1) * chunk],
                                );
                            }
                            plan.ghost_count()
                        })
                        .sum::<usize>()
                })
                .sum()
        });

        self.halo_current = true;
        log::debug!(
            "[Field] Halo update of '{}': {} ghost blocks refreshed",
            self.name,
            copied
        );
    }
}
