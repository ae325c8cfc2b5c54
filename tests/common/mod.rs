//! Shared helpers for the integration tests.

#![allow(dead_code)] // Not every test file uses every helper

use voxel_lattice::glam::IVec3;
use voxel_lattice::{Backend, Grid, GridBuilder};

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn host(devices: u32) -> Backend {
    Backend::host(devices).expect("host backend")
}

/// Closed ball test at base-space voxel corners
pub fn sphere(center: IVec3, radius: i32) -> impl Fn(IVec3) -> bool + Send + Sync + Clone + 'static {
    move |p: IVec3| {
        let d = p - center;
        d.dot(d) <= radius * radius
    }
}

/// Fully active single-level grid
pub fn dense_grid(domain: i32, block_size: u32, devices: u32) -> Grid {
    GridBuilder::new(&host(devices), IVec3::splat(domain))
        .block_size(block_size)
        .build()
        .expect("dense grid")
}

/// Every level-local coordinate of an extent
pub fn coords(dim: IVec3) -> impl Iterator<Item = IVec3> {
    (0..dim.z).flat_map(move |z| {
        (0..dim.y).flat_map(move |y| (0..dim.x).map(move |x| IVec3::new(x, y, z)))
    })
}
