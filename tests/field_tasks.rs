//! Field storage and task dispatch across devices and levels.

mod common;

use common::{coords, dense_grid, host, init_logging, sphere};
use voxel_lattice::glam::IVec3;
use voxel_lattice::{DataView, DeviceId, Field, GridBuilder, GridError, Stencil, TaskBuilder};

#[test]
fn test_layout_groups_channels_per_block() {
    init_logging();
    let grid = dense_grid(8, 4, 1);
    let mut f: Field<u32> = grid.new_field("pair", 2, 0).unwrap();
    f.set_at(IVec3::new(1, 0, 0), 0, 0, 10).unwrap();
    f.set_at(IVec3::new(1, 0, 0), 0, 1, 20).unwrap();

    let idx = grid.resolve(IVec3::new(1, 0, 0), 0).unwrap();
    let data = f.partition_data(0, DeviceId(0)).unwrap();
    let local = (idx.block.0 - grid.span(DeviceId(0), 0, DataView::All).unwrap().start) as usize;
    let vpb = grid.voxels_per_block();
    let base = local * 2 * vpb + idx.offset as usize;
    assert_eq!(data[base], 10);
    assert_eq!(data[base + vpb], 20);
}

#[test]
fn test_jacobi_sweep_matches_single_device() {
    init_logging();
    let run = |devices: u32| -> Vec<f32> {
        let grid = dense_grid(16, 4, devices);
        let mut a: Field<f32> = grid.new_field("a", 1, 0.0).unwrap();
        let mut b: Field<f32> = grid.new_field("b", 1, 0.0).unwrap();
        let g = grid.clone();
        a.fill_with(|idx, _| g.voxel_coord(idx).x as f32);

        for _ in 0..3 {
            a.halo_update();
            {
                let task = TaskBuilder::new("jacobi").stencil(&a).write(&b).build().unwrap();
                let src = &a;
                task.run(&mut b, |idx, w| {
                    let sum: f32 = voxel_lattice::Direction::faces()
                        .map(|d| src.neighbor(idx, d.offset(), 0).unwrap_or(src.get(idx, 0)))
                        .sum();
                    w.set(0, sum / 6.0);
                })
                .unwrap();
            }
            std::mem::swap(&mut a, &mut b);
        }

        let mut out = Vec::new();
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    out.push(a.get_at(IVec3::new(x, y, z), 0, 0));
                }
            }
        }
        out
    };

    let single = run(1);
    let split = run(3);
    assert_eq!(single, split);
}

#[test]
fn test_stale_halo_blocks_boundary_launch() {
    let grid = dense_grid(16, 8, 2);
    let mut src: Field<f64> = grid.new_field("src", 1, 0.0).unwrap();
    let mut dst: Field<f64> = grid.new_field("dst", 1, 0.0).unwrap();
    src.fill(1.0);
    src.halo_update();
    src.set_at(IVec3::ZERO, 0, 0, 2.0).unwrap();

    let task = TaskBuilder::new("stencil")
        .stencil(&src)
        .write(&dst)
        .view(DataView::Boundary)
        .build()
        .unwrap();
    let err = task.run(&mut dst, |_, _| {}).unwrap_err();
    assert!(matches!(err, GridError::HaloStale { ref field, .. } if field == "src"));
}

#[test]
fn test_task_per_level_counts() {
    let grid = GridBuilder::new(&host(2), IVec3::splat(16))
        .block_size(4)
        .levels(2, 2)
        .predicate(sphere(IVec3::splat(8), 4))
        .build()
        .unwrap();
    let mut level_id: Field<u8> = grid.new_field("level", 1, u8::MAX).unwrap();

    let task = TaskBuilder::new("tag").write(&level_id).level(1).build().unwrap();
    let stats = task.run(&mut level_id, |idx, w| w.set(0, idx.level as u8)).unwrap();
    let coarse = grid.level(1).unwrap();
    assert_eq!(stats.total_voxels(), coarse.total_active_voxels());
    assert_eq!(stats.per_device.len(), 2);

    let center = grid.resolve_base(IVec3::splat(8), 1).unwrap();
    assert_eq!(level_id.get(&center, 0), 1);
    let fine = grid.resolve(IVec3::splat(8), 0).unwrap();
    assert_eq!(level_id.get(&fine, 0), u8::MAX);
}

#[test]
fn test_parent_and_child_values() {
    let grid = GridBuilder::new(&host(1), IVec3::splat(8))
        .block_size(2)
        .levels(2, 2)
        .build()
        .unwrap();
    let mut f: Field<i32> = grid.new_field("lvl", 1, -1).unwrap();
    let g = grid.clone();
    f.fill_with(|idx, _| (idx.level as i32 + 1) * 100 + g.voxel_coord(idx).x);

    let fine = grid.resolve(IVec3::new(5, 2, 2), 0).unwrap();
    let parent = f.parent_value(&fine, 0);
    assert!(parent.is_valid);
    assert_eq!(parent.value, 200 + 2);

    let coarse = grid.resolve(IVec3::new(2, 1, 1), 1).unwrap();
    assert_eq!(f.child_value(&coarse, IVec3::new(1, 0, 0), 0).get(), Some(105));
    assert!(!f.child_value(&fine, IVec3::ZERO, 0).is_valid);
    assert!(!f.parent_value(&coarse, 0).is_valid);
}

#[test]
fn test_stencil_slots_read_every_s19_neighbor() {
    init_logging();
    let grid = GridBuilder::new(&host(2), IVec3::splat(8))
        .block_size(4)
        .stencil(Stencil::s19())
        .build()
        .unwrap();
    let mut f: Field<i32> = grid.new_field("code", 1, -1).unwrap();
    let g = grid.clone();
    f.fill_with(|idx, _| {
        let c = g.voxel_coord(idx);
        c.x + 8 * c.y + 64 * c.z
    });
    f.halo_update();

    let points = grid.stencil().unwrap().points().to_vec();
    assert_eq!(points.len(), 19);
    for c in coords(IVec3::splat(8)) {
        let idx = grid.resolve(c, 0).unwrap();
        for (slot, offset) in points.iter().enumerate() {
            let n = c + *offset;
            let read = f.stencil_neighbor(&idx, slot, 0);
            if n.cmplt(IVec3::ZERO).any() || n.cmpge(IVec3::splat(8)).any() {
                assert!(!read.is_valid);
                assert_eq!(read.value, -1);
            } else {
                assert_eq!(read.get(), Some(n.x + 8 * n.y + 64 * n.z));
            }
        }
        assert!(!f.stencil_neighbor(&idx, points.len(), 0).is_valid);
    }
}

#[test]
fn test_direct_neighbor_reads_ghosts_until_halo_update() {
    let grid = dense_grid(16, 4, 2);
    let mut f: Field<f32> = grid.new_field("u", 1, 0.0).unwrap();
    f.fill(1.0);
    f.halo_update();

    // Find a voxel whose +x/-x/... neighbor lives on the other device
    let (idx, offset) = coords(IVec3::splat(16))
        .filter_map(|c| grid.resolve(c, 0))
        .find_map(|idx| {
            voxel_lattice::Direction::faces()
                .map(|d| d.offset())
                .find(|&o| grid.neighbor(&idx, o).is_some_and(|n| n.device != idx.device))
                .map(|o| (idx, o))
        })
        .unwrap();
    let target = grid.voxel_coord(&idx) + offset;

    f.set_at(target, 0, 0, 5.0).unwrap();
    assert!(!f.is_halo_current());
    assert_eq!(f.neighbor(&idx, offset, 0).get(), Some(1.0));

    f.halo_update();
    assert_eq!(f.neighbor(&idx, offset, 0).get(), Some(5.0));
}
