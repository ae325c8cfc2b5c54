//! Node-to-voxel mask
//!
//! A lattice node sits on the shared corner of eight voxels. The mask has one
//! bit per corner direction `(a, b, c) ∈ {-1, 1}³`, set when the voxel on that
//! side of the node is active.

use glam::IVec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeToVoxelMask(pub u8);

impl NodeToVoxelMask {
    /// Bit of corner direction `(a, b, c)`: `(a+1)·2 + (b+1) + (c+1)/2`
    pub const fn bit_jump(a: i32, b: i32, c: i32) -> u32 {
        ((a + 1) * 2 + (b + 1) + (c + 1) / 2) as u32
    }

    /// Voxel offset from the node for a corner direction
    pub fn voxel_offset(dir: IVec3) -> IVec3 {
        IVec3::new(dir.x.min(0), dir.y.min(0), dir.z.min(0))
    }

    /// Evaluate `is_active` on the eight voxels around `node`
    pub fn from_fn(node: IVec3, mut is_active: impl FnMut(IVec3) -> bool) -> Self {
        let mut bits = 0u8;
        for &a in &[-1, 1] {
            for &b in &[-1, 1] {
                for &c in &[-1, 1] {
                    let voxel = node + Self::voxel_offset(IVec3::new(a, b, c));
                    if is_active(voxel) {
                        bits |= 1 << Self::bit_jump(a, b, c);
                    }
                }
            }
        }
        Self(bits)
    }

    pub fn is_active(self, a: i32, b: i32, c: i32) -> bool {
        (self.0 >> Self::bit_jump(a, b, c)) & 1 == 1
    }

    /// Compile-time direction variant of `is_active`
    pub fn is_active_const<const A: i32, const B: i32, const C: i32>(self) -> bool {
        (self.0 >> Self::bit_jump(A, B, C)) & 1 == 1
    }

    pub fn active_count(self) -> u32 {
        self.0.count_ones()
    }

    /// Node touches no active voxel
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All eight surrounding voxels active
    pub fn is_full(self) -> bool {
        self.0 == u8::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_jump_covers_eight_bits() {
        let mut seen = 0u8;
        for &a in &[-1, 1] {
            for &b in &[-1, 1] {
                for &c in &[-1, 1] {
                    seen |= 1 << NodeToVoxelMask::bit_jump(a, b, c);
                }
            }
        }
        assert_eq!(seen, u8::MAX);
        assert_eq!(NodeToVoxelMask::bit_jump(-1, -1, -1), 0);
        assert_eq!(NodeToVoxelMask::bit_jump(1, 1, 1), 7);
    }

    #[test]
    fn test_single_active_voxel() {
        // Only the voxel at (0,0,0) is active; node (1,1,1) sees it on its (-,-,-) side
        let mask = NodeToVoxelMask::from_fn(IVec3::ONE, |v| v == IVec3::ZERO);
        assert_eq!(mask.active_count(), 1);
        assert!(mask.is_active(-1, -1, -1));
        assert!(mask.is_active_const::<-1, -1, -1>());
        assert!(!mask.is_active(1, -1, -1));
    }

    #[test]
    fn test_full_node() {
        let mask = NodeToVoxelMask::from_fn(IVec3::new(4, 4, 4), |_| true);
        assert!(mask.is_full());
        assert!(!NodeToVoxelMask::default().is_full());
    }
}
