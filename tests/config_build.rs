//! Building grids from TOML configuration files.

mod common;

use common::{init_logging, sphere};
use std::io::Write;
use voxel_lattice::glam::IVec3;
use voxel_lattice::{GridBuilder, GridConfig, GridError, StencilKind};

#[test]
fn test_build_from_config_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
domain = [16, 16, 16]
block_size = 4
refinement_factors = [2]
stencil = "s7"

[backend]
device_count = 2
worker_threads = 2
"#
    )
    .unwrap();

    let config = GridConfig::load(file.path()).unwrap();
    assert_eq!(config.stencil, StencilKind::S7);

    let grid = GridBuilder::from_config(&config)
        .unwrap()
        .predicate(sphere(IVec3::splat(8), 5))
        .build()
        .unwrap();
    assert_eq!(grid.depth(), 2);
    assert_eq!(grid.device_count(), 2);
    assert_eq!(grid.backend().worker_threads(), 2);
    assert_eq!(grid.stencil().map(|s| s.len()), Some(7));
    assert_eq!(grid.level_dim(1), IVec3::splat(8));
}

#[test]
fn test_invalid_config_rejected_before_build() {
    let config = GridConfig {
        block_size: 6,
        refinement_factors: vec![4],
        ..GridConfig::default()
    };
    assert!(matches!(
        GridBuilder::from_config(&config),
        Err(GridError::InvalidConfig { .. })
    ));

    let config = GridConfig {
        stencil: StencilKind::None,
        ..GridConfig::default()
    };
    let grid = GridBuilder::from_config(&config).unwrap().build().unwrap();
    assert!(grid.stencil().is_none());
}
