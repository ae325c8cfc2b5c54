// =============================================================================
// Morton Encoding/Decoding (Z-order curve)
// =============================================================================
//
// Block coordinates are interleaved into 63-bit codes so that blocks handed to
// one device stay spatially compact. 21 bits per axis.

// =============================================================================
// Bit Spreading/Compacting (SWAR operations)
// =============================================================================

/// Spread the lower 21 bits of `x` into every third bit position.
#[inline(always)]
pub fn spread_bits_3d(x: u32) -> u64 {
    let mut x = (x as u64) & 0x1F_FFFF;
    x = (x | (x << 32)) & 0x001F_0000_0000_FFFF;
    x = (x | (x << 16)) & 0x001F_0000_FF00_00FF;
    x = (x | (x << 8)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x << 4)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Compact every third bit position back into the lower 21 bits.
#[inline(always)]
pub fn compact_bits_3d(x: u64) -> u32 {
    let mut x = x & 0x1249_2492_4924_9249;
    x = (x | (x >> 2)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x >> 4)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x >> 8)) & 0x001F_0000_FF00_00FF;
    x = (x | (x >> 16)) & 0x001F_0000_0000_FFFF;
    x = (x | (x >> 32)) & 0x1F_FFFF;
    x as u32
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode 3D coordinates into a Morton code. X occupies the lowest bit.
#[inline(always)]
pub fn morton_encode_3d(x: u32, y: u32, z: u32) -> u64 {
    spread_bits_3d(x) | (spread_bits_3d(y) << 1) | (spread_bits_3d(z) << 2)
}

/// Decode a Morton code back to (x, y, z).
#[inline(always)]
pub fn morton_decode_3d(code: u64) -> (u32, u32, u32) {
    (
        compact_bits_3d(code),
        compact_bits_3d(code >> 1),
        compact_bits_3d(code >> 2),
    )
}

/// Morton key of a non-negative block coordinate.
#[inline]
pub fn block_key(coord: glam::IVec3) -> u64 {
    morton_encode_3d(coord.x as u32, coord.y as u32, coord.z as u32)
}
