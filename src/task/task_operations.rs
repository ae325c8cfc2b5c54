//! Task Operations - launch checks and per-device dispatch
//!
//! Every device runs its span of the task's view concurrently inside the
//! backend pool. Each device writes only its own owned array, so the kernel
//! gets exclusive access to one voxel at a time without locking.

use super::task_data::{AccessPattern, DeviceDispatch, DispatchStats, Task};
use crate::error::{GridError, GridResult};
use crate::field::{Field, FieldElement, VoxelWriter};
use crate::grid::{DeviceId, VoxelIdx};
use parking_lot::Mutex;
use rayon::prelude::*;

/// Check that `target` and the declared reads can be used by this launch
pub fn check_launch<T: FieldElement>(task: &Task<'_>, target: &Field<T>) -> GridResult<()> {
    if target.id() != task.write.id {
        return Err(GridError::UndeclaredWrite {
            task: task.name.clone(),
            field: target.name().to_string(),
        });
    }

    if !target.grid().same_grid(&task.grid) {
        return Err(GridError::GridMismatch {
            task: task.name.clone(),
            field: target.name().to_string(),
        });
    }

    if task.needs_halo() {
        if let Some(stale) = task
            .reads
            .iter()
            .find(|r| r.pattern == AccessPattern::Stencil && !r.field.is_halo_current())
        {
            return Err(GridError::HaloStale {
                task: task.name.clone(),
                field: stale.field.field_name().to_string(),
            });
        }
    }

    Ok(())
}

/// Run `kernel` over every active voxel of the task's view and levels
pub fn run_task<T, K>(task: &Task<'_>, target: &mut Field<T>, kernel: K) -> GridResult<DispatchStats>
where
    T: FieldElement,
    K: Fn(&VoxelIdx, &mut VoxelWriter<'_, T>) + Send + Sync,
{
    check_launch(task, target)?;

    let grid = task.grid.clone();
    let vpb = grid.voxels_per_block();
    let card = target.cardinality() as usize;
    let chunk = card * vpb;
    let view = task.view;
    let stats = Mutex::new(DispatchStats::new(grid.device_count() as usize));
    let rejected: Mutex<Option<u32>> = Mutex::new(None);

    {
        let levels = &mut target.levels;
        let kernel = &kernel;
        let stats = &stats;
        let rejected = &rejected;

        grid.backend().install(|| {
            for &l in &task.levels {
                let level = &grid.levels()[l];
                levels[l]
                    .owned
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(d, owned)| {
                        let device = DeviceId(d as u32);
                        let Some(spans) = level.spans.device(device) else {
                            return;
                        };
                        let all = spans.all();
                        let mut local = DeviceDispatch::default();

                        for block in spans.view(view).iter() {
                            let base = (block.0 - all.start) as usize * chunk;
                            let data = &mut owned[base..base + chunk];
                            for offset in level.active.iter_active(block) {
                                let idx = VoxelIdx {
                                    level: l,
                                    device,
                                    block,
                                    offset,
                                };
                                let mut writer =
                                    VoxelWriter::new(&mut *data, offset as usize, vpb, card);
                                kernel(&idx, &mut writer);
                                if let Some(channel) = writer.rejected() {
                                    rejected.lock().get_or_insert(channel);
                                }
                                local.voxels += 1;
                            }
                            local.blocks += 1;
                        }

                        let mut stats = stats.lock();
                        stats.per_device[d].blocks += local.blocks;
                        stats.per_device[d].voxels += local.voxels;
                    });
            }
        });
    }

    target.mark_written();

    if let Some(channel) = rejected.into_inner() {
        log::warn!(
            "[Task] '{}' wrote channel {} of '{}' with cardinality {}",
            task.name,
            channel,
            target.name(),
            card
        );
        return Err(GridError::ChannelOutOfRange {
            channel,
            cardinality: card as u32,
        });
    }

    let stats = stats.into_inner();

    log::debug!(
        "[Task] '{}' dispatched {} blocks / {} voxels over {} device(s)",
        task.name,
        stats.total_blocks(),
        stats.total_voxels(),
        stats.per_device.len()
    );

    Ok(stats)
}

impl<'a> Task<'a> {
    /// Launch on `target`, which must be the declared write field
    pub fn run<T, K>(&self, target: &mut Field<T>, kernel: K) -> GridResult<DispatchStats>
    where
        T: FieldElement,
        K: Fn(&VoxelIdx, &mut VoxelWriter<'_, T>) + Send + Sync,
    {
        run_task(self, target, kernel)
    }
}
