//! Final conversion to 16-bit depth: mask unreliable pixels, scale the rest.

use crate::{DepthImage, RawImage, FRAME_PIXELS, INVALID_DEPTH};

/// Depth scaling table, one 256-entry row per step value 1..=9.
///
/// Entries are in quarter-millimetres: a raw count of `p` at step `u` is a
/// depth of `u * p` mm, i.e. `4 * u * p` quarter-mm (max 9180, fits u16).
pub struct ScaleLut {
    rows: [[u16; 256]; 9],
}

impl ScaleLut {
    pub fn new() -> Self {
        let mut rows = [[0u16; 256]; 9];
        for (u, row) in rows.iter_mut().enumerate() {
            for (pel, out) in row.iter_mut().enumerate() {
                *out = (4 * (u + 1) * pel) as u16;
            }
        }
        Self { rows }
    }

    /// Scaling row for a step in 1..=9 (out-of-range steps clamp).
    pub fn row(&self, unit: u8) -> &[u16; 256] {
        let idx = (unit.clamp(1, 9) - 1) as usize;
        &self.rows[idx]
    }
}

impl Default for ScaleLut {
    fn default() -> Self {
        Self::new()
    }
}

/// Produce the output frame: saturated sensor pixels, railed means, and
/// flickery pixels (variance above `flicker_limit`) become the invalid
/// sentinel; everything else is the scaled running mean. A limit of 255
/// disables the variance mask.
pub fn reformat(
    raw: &RawImage,
    avg: &RawImage,
    var: &RawImage,
    lut: &ScaleLut,
    unit: u8,
    flicker_limit: u8,
    out: &mut DepthImage,
) {
    let sc = lut.row(unit);
    for i in 0..FRAME_PIXELS {
        out[i] = if raw[i] == 255 || avg[i] == 255 || var[i] > flicker_limit {
            INVALID_DEPTH
        } else {
            sc[avg[i] as usize]
        };
    }
}
