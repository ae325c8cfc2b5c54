//! Explicit heat diffusion on a sparse two-device grid
//!
//! Demonstrates field allocation, halo exchange and stencil tasks on a
//! domain whose active set is a thick spherical shell.

use voxel_lattice::glam::IVec3;
use voxel_lattice::{
    compute_grid_stats, Backend, DataView, Field, GridBuilder, Stencil, TaskBuilder,
};

const DOMAIN: i32 = 48;
const STEPS: usize = 20;
const ALPHA: f32 = 0.15;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Heat diffusion on a spherical shell...");

    let backend = Backend::host(2)?;
    let center = IVec3::splat(DOMAIN / 2);
    let grid = GridBuilder::new(&backend, IVec3::splat(DOMAIN))
        .stencil(Stencil::s7())
        .predicate(move |p| {
            let d = p - center;
            let r2 = d.dot(d);
            (8 * 8..=20 * 20).contains(&r2)
        })
        .build()?;

    let stats = compute_grid_stats(&grid);
    println!(
        "Grid: {} active voxels in {} blocks",
        stats.active_voxels(),
        stats.levels[0].active_blocks
    );

    // Slot 0 of the S7 stencil is the voxel itself
    let stencil_len = grid.stencil().map_or(1, |s| s.len());

    let mut temp: Field<f32> = grid.new_field("temperature", 1, 0.0)?;
    let mut next: Field<f32> = grid.new_field("temperature_next", 1, 0.0)?;
    let g = grid.clone();
    temp.fill_with(|idx, _| if g.voxel_coord(idx).z < center.z { 100.0 } else { 0.0 });

    for step in 0..STEPS {
        temp.halo_update();
        {
            let src = &temp;
            let task = TaskBuilder::new("diffuse")
                .stencil(src)
                .write(&next)
                .view(DataView::All)
                .build()?;
            task.run(&mut next, |idx, w| {
                let here = src.get(idx, 0);
                // Insulated walls: missing neighbors mirror the center value
                let laplacian: f32 = (1..stencil_len)
                    .map(|slot| src.stencil_neighbor(idx, slot, 0).unwrap_or(here) - here)
                    .sum();
                w.set(0, here + ALPHA * laplacian);
            })?;
        }
        std::mem::swap(&mut temp, &mut next);

        if step % 5 == 0 {
            let total = temp.reduce_sum(|v| v as f64);
            println!("step {:>3}: total heat {:.3}", step, total);
        }
    }

    let north = temp.get_at(center + IVec3::new(0, 0, 15), 0, 0);
    let south = temp.get_at(center - IVec3::new(0, 0, 15), 0, 0);
    println!("Final: north pole {:.3}, south pole {:.3}", north, south);

    Ok(())
}
