//! Per-vertex ambient occlusion.
//!
//! Each face corner looks at the three voxels that touch it in the layer in front
//! of the face: two orthogonal side neighbours and the diagonal between them.
//! The result is one of four discrete levels, 0 (darkest) to 3 (unoccluded).

/// Brightness weight per occlusion level.
pub const AO_WEIGHTS: [f32; 4] = [0.4, 0.6, 0.8, 1.0];

/// Occlusion level of one corner.
///
/// Two solid sides fully occlude the corner regardless of the diagonal.
#[inline]
pub fn vertex_ao(side1: bool, side2: bool, corner: bool) -> u8 {
    if side1 && side2 {
        0
    } else {
        3 - (side1 as u8 + side2 as u8 + corner as u8)
    }
}

/// Packs four 2-bit corner levels into one key, for merge comparisons.
#[inline]
pub fn pack(levels: [u8; 4]) -> u8 {
    levels[0] | levels[1] << 2 | levels[2] << 4 | levels[3] << 6
}

#[inline]
pub fn unpack(key: u8) -> [u8; 4] {
    [key & 3, (key >> 2) & 3, (key >> 4) & 3, (key >> 6) & 3]
}

#[inline]
pub fn weight(level: u8) -> f32 {
    AO_WEIGHTS[(level & 3) as usize]
}

/// Whether a quad with corner levels `[a0, a1, a2, a3]` (in winding order) should
/// be split along the 0-2 diagonal. The split runs through the brighter pair.
#[inline]
pub fn split_along_0_2(levels: [u8; 4]) -> bool {
    levels[0] as u16 + levels[2] as u16 > levels[1] as u16 + levels[3] as u16
}
