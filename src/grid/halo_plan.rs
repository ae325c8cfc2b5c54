//! Halo plans
//!
//! For every device, the foreign blocks its boundary blocks can reach through
//! the 27-neighborhood. Fields mirror these blocks into per-device ghost
//! storage during a halo update.

use super::connectivity::BlockConnectivity;
use super::core::BlockId;
use super::partition::SpanTable;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct HaloPlan {
    /// Foreign active blocks mirrored on this device, ascending id
    pub ghost_blocks: Vec<BlockId>,
    slots: FxHashMap<BlockId, u32>,
}

impl HaloPlan {
    pub fn ghost_slot(&self, block: BlockId) -> Option<usize> {
        self.slots.get(&block).map(|&s| s as usize)
    }

    pub fn ghost_count(&self) -> usize {
        self.ghost_blocks.len()
    }
}

/// One plan per device of a level
pub fn build_halo_plans(
    spans: &SpanTable,
    connectivity: &BlockConnectivity,
    active_blocks: u32,
) -> Vec<HaloPlan> {
    spans
        .iter()
        .map(|(device, dspans)| {
            let mut ghosts: Vec<BlockId> = dspans
                .boundary
                .iter()
                .flat_map(|b| connectivity.neighbors(b).iter().copied())
                .filter(|n| n.is_valid() && n.0 < active_blocks && !dspans.all().contains(*n))
                .collect();
            ghosts.sort_unstable();
            ghosts.dedup();

            let slots = ghosts
                .iter()
                .enumerate()
                .map(|(i, b)| (*b, i as u32))
                .collect();

            log::debug!(
                "[HaloPlan] Device {}: {} boundary blocks, {} ghost blocks",
                device.0,
                dspans.boundary.len(),
                ghosts.len()
            );

            HaloPlan {
                ghost_blocks: ghosts,
                slots,
            }
        })
        .collect()
}
