//! Property-based tests for grid topology invariants.

mod common;

use common::{coords, host, sphere};
use proptest::prelude::*;
use voxel_lattice::glam::IVec3;
use voxel_lattice::validation::{
    check_connectivity_symmetry, check_leaf_uniqueness, check_partition_totality,
};
use voxel_lattice::{BlockId, DataView, DeviceId, Field, Grid, GridBuilder, RefinementDescriptor};

fn sphere_grid(dim: IVec3, block_size: u32, devices: u32, radius: i32, depth: usize) -> Grid {
    GridBuilder::new(&host(devices), dim)
        .block_size(block_size)
        .levels(depth, 2)
        .predicate(sphere(dim / 2, radius))
        .build()
        .expect("grid")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every active block is owned by exactly one device, views tile `All`
    #[test]
    fn prop_partition_totality(
        x in 4i32..24, y in 4i32..24, z in 4i32..24,
        bs in prop::sample::select(vec![2u32, 4, 8]),
        devices in 1u32..5,
    ) {
        let grid = sphere_grid(IVec3::new(x, y, z), bs, devices, 2, 1);
        let level = grid.level(0).unwrap();
        prop_assert!(check_partition_totality(level).is_ok());

        let mut owned = vec![0u32; level.active_blocks as usize];
        for d in 0..devices {
            let device = DeviceId(d);
            let all = grid.span(device, 0, DataView::All).unwrap();
            let internal = grid.span(device, 0, DataView::Internal).unwrap();
            let boundary = grid.span(device, 0, DataView::Boundary).unwrap();
            prop_assert_eq!(internal.start, all.start);
            prop_assert_eq!(internal.end, boundary.start);
            prop_assert_eq!(boundary.end, all.end);
            for block in all.iter() {
                owned[block.index()] += 1;
                prop_assert_eq!(level.owner(block), Some(device));
            }
        }
        prop_assert!(owned.iter().all(|&n| n == 1));
    }

    /// Neighbor tables agree in both directions
    #[test]
    fn prop_connectivity_symmetry(
        x in 4i32..20, y in 4i32..20, z in 4i32..20,
        radius in 1i32..8,
        devices in 1u32..4,
    ) {
        let grid = sphere_grid(IVec3::new(x, y, z), 2, devices, radius, 1);
        let level = grid.level(0).unwrap();
        prop_assert!(check_connectivity_symmetry(level).is_ok());
        for b in 0..level.materialized_blocks() as u32 {
            for dir in voxel_lattice::Direction::all() {
                let n = level.connectivity.neighbor(BlockId(b), dir);
                if n.is_valid() {
                    prop_assert_eq!(level.connectivity.neighbor(n, dir.opposite()), BlockId(b));
                }
            }
        }
    }

    /// Single-level active set equals the predicate set
    #[test]
    fn prop_domain_containment(
        x in 3i32..14, y in 3i32..14, z in 3i32..14,
        radius in 1i32..6,
        bs in prop::sample::select(vec![2u32, 3, 4]),
    ) {
        let dim = IVec3::new(x, y, z);
        let ball = sphere(dim / 2, radius);
        let grid = sphere_grid(dim, bs, 1, radius, 1);
        for p in coords(dim) {
            prop_assert_eq!(grid.is_inside_domain(p, 0), ball(p));
        }
        prop_assert!(!grid.is_inside_domain(dim, 0));
        prop_assert!(!grid.is_inside_domain(IVec3::splat(-1), 0));
    }

    /// resolve and voxel_coord are inverse on active voxels
    #[test]
    fn prop_resolve_round_trip(
        px in 0i32..16, py in 0i32..16, pz in 0i32..16,
        devices in 1u32..4,
        depth in 1usize..3,
    ) {
        let grid = sphere_grid(IVec3::splat(16), 4, devices, 7, depth);
        for level in 0..depth {
            let p = grid.from_base_index_space(IVec3::new(px, py, pz), level);
            if let Some(idx) = grid.resolve(p, level) {
                prop_assert_eq!(grid.voxel_coord(&idx), p);
                prop_assert_eq!(idx.level, level);
                prop_assert_eq!(grid.level(level).unwrap().owner(idx.block), Some(idx.device));
            }
        }
    }

    /// Base index space mapping is inverted by its level-local counterpart
    #[test]
    fn prop_base_index_space_round_trip(
        factors in prop::collection::vec(prop::sample::select(vec![2u32, 3, 4]), 0..4),
        level_pick in 0usize..4,
        cx in -40i32..40, cy in -40i32..40, cz in -40i32..40,
        within in 0i32..64,
    ) {
        let refinement = RefinementDescriptor::from_factors(factors);
        let level = level_pick % refinement.depth();
        let local = IVec3::new(cx, cy, cz);
        let spacing = refinement.spacing(level);

        let base = refinement.to_base_index_space(local, level);
        prop_assert_eq!(refinement.from_base_index_space(base, level), local);

        // Every base location inside the voxel maps back to it
        let inside = base + IVec3::splat(within % spacing);
        prop_assert_eq!(refinement.from_base_index_space(inside, level), local);
    }

    /// At most one leaf covers any base-space location
    #[test]
    fn prop_leaf_uniqueness(
        radius in 1i32..7,
        depth in 2usize..4,
    ) {
        let grid = sphere_grid(IVec3::splat(16), 4, 1, radius, depth);
        prop_assert!(check_leaf_uniqueness(&grid).is_ok());
        for p in coords(IVec3::splat(16)) {
            let leaves = (0..depth)
                .filter_map(|l| grid.resolve_base(p, l))
                .filter(|idx| grid.is_leaf(idx))
                .count();
            prop_assert!(leaves <= 1);
            if sphere(IVec3::splat(8), radius)(p) {
                prop_assert_eq!(leaves, 1);
            }
        }
    }

    /// Reads outside the active set always return the outside value
    #[test]
    fn prop_outside_value_stability(
        qx in -4i32..20, qy in -4i32..20, qz in -4i32..20,
        outside in -100i32..100,
    ) {
        let grid = sphere_grid(IVec3::splat(16), 4, 2, 5, 1);
        let mut f: Field<i32> = grid.new_field("u", 1, outside).unwrap();
        f.fill(outside + 1);
        let q = IVec3::new(qx, qy, qz);
        let expected = if grid.is_inside_domain(q, 0) { outside + 1 } else { outside };
        prop_assert_eq!(f.get_at(q, 0, 0), expected);
        prop_assert_eq!(f.get_at(q, 0, 1), outside);
        prop_assert_eq!(f.get_at(q, 3, 0), outside);
    }
}
