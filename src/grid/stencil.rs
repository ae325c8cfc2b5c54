//! Stencil shapes
//!
//! A stencil is a flat list of signed voxel offsets plus a dense
//! offset-to-slot table, computed once per grid and shared by all kernels.

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Named stencil shapes for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StencilKind {
    /// No neighbor reads; stencil tasks are rejected
    None,
    /// Self plus the six face neighbors
    S7,
    /// D3Q19 lattice
    S19,
    #[default]
    S27,
}

impl StencilKind {
    pub fn build(self) -> Option<Stencil> {
        match self {
            StencilKind::None => None,
            StencilKind::S7 => Some(Stencil::s7()),
            StencilKind::S19 => Some(Stencil::s19()),
            StencilKind::S27 => Some(Stencil::s27()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stencil {
    points: Vec<IVec3>,
    radius: u32,
    /// (2r+1)³ table, `u32::MAX` where the offset is not part of the stencil
    slots: Vec<u32>,
}

impl Stencil {
    /// Custom stencil; duplicate offsets are dropped, order is kept
    pub fn new(points: impl IntoIterator<Item = IVec3>) -> Self {
        let mut unique: Vec<IVec3> = Vec::new();
        for p in points {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }

        let radius = unique
            .iter()
            .map(|p| p.abs().max_element() as u32)
            .max()
            .unwrap_or(0);

        let side = (2 * radius + 1) as usize;
        let mut slots = vec![u32::MAX; side * side * side];
        for (i, p) in unique.iter().enumerate() {
            slots[Self::table_index(*p, radius)] = i as u32;
        }

        Self {
            points: unique,
            radius,
            slots,
        }
    }

    pub fn s7() -> Self {
        Self::new([
            IVec3::ZERO,
            IVec3::NEG_X,
            IVec3::X,
            IVec3::NEG_Y,
            IVec3::Y,
            IVec3::NEG_Z,
            IVec3::Z,
        ])
    }

    /// Self, 6 faces and 12 edges
    pub fn s19() -> Self {
        Self::new(
            Self::cube(1).filter(|p| p.x.abs() + p.y.abs() + p.z.abs() <= 2),
        )
    }

    pub fn s27() -> Self {
        Self::new(Self::cube(1))
    }

    fn cube(r: i32) -> impl Iterator<Item = IVec3> {
        (-r..=r).flat_map(move |z| (-r..=r).flat_map(move |y| (-r..=r).map(move |x| IVec3::new(x, y, z))))
    }

    fn table_index(p: IVec3, radius: u32) -> usize {
        let r = radius as i32;
        let side = 2 * r + 1;
        ((p.x + r) + side * (p.y + r) + side * side * (p.z + r)) as usize
    }

    pub fn points(&self) -> &[IVec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest |component| over all offsets
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Position of `offset` in `points()`, if part of the stencil
    pub fn slot(&self, offset: IVec3) -> Option<usize> {
        if offset.abs().max_element() as u32 > self.radius {
            return None;
        }
        match self.slots[Self::table_index(offset, self.radius)] {
            u32::MAX => None,
            s => Some(s as usize),
        }
    }

    pub fn contains(&self, offset: IVec3) -> bool {
        self.slot(offset).is_some()
    }
}
