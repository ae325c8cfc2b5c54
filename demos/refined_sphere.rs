//! Multi-resolution walkthrough
//!
//! Builds a three-level grid refined around a sphere, prints per-level
//! statistics, then samples leaves and parent links along one axis.

use voxel_lattice::glam::IVec3;
use voxel_lattice::{
    compute_grid_stats, validate_grid, Backend, ClassMask, Field, GridBuilder,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Refining a 32³ domain around a sphere...");

    let center = IVec3::splat(16);
    let grid = GridBuilder::new(&Backend::host(2)?, IVec3::splat(32))
        .block_size(4)
        .levels(3, 2)
        .predicate(move |p| {
            let d = p - center;
            d.dot(d) <= 36
        })
        .build()?;
    validate_grid(&grid)?;

    for level in compute_grid_stats(&grid).levels {
        println!(
            "level {} (spacing {}): {} blocks, {} shell, {} voxels, {} refined",
            level.level,
            grid.spacing(level.level),
            level.active_blocks,
            level.shell_blocks,
            level.active_voxels,
            level.refined_voxels
        );
    }

    let mut level_of: Field<u32> = grid.new_field("level", 1, u32::MAX)?;
    level_of.fill_with(|idx, _| idx.level as u32);

    println!("Leaves along +x through the center:");
    for x in (0..32).step_by(2) {
        let base = IVec3::new(x, center.y, center.z);
        let Some(leaf) = grid.leaf_at(base) else {
            println!("  x={:>2}: outside", x);
            continue;
        };
        let class = match grid.class_of(&leaf) {
            c if c.contains(ClassMask::BOUNDARY) => "boundary",
            c if c.contains(ClassMask::INTERIOR) => "interior",
            _ => "other",
        };
        let parent = level_of.parent_value(&leaf, 0);
        println!(
            "  x={:>2}: level {} {} (parent level {:?})",
            x,
            level_of.get(&leaf, 0),
            class,
            parent.get()
        );
    }

    Ok(())
}
