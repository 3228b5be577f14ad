//! Auto-ranging: pick the depth step that spreads the central scene over the
//! useful part of the 8-bit range.
//!
//! The controller histograms a central region of the raw frame, finds the
//! percentile depth among non-saturated pixels, and asks for the step that
//! would place that depth near the `ihi` count. Heavy saturation instead
//! forces a coarser step: losing fine resolution beats clipping the scene.

use crate::util::div_round_nearest_u32;
use crate::{RangeCfg, RawImage, FRAME_DIM};

pub struct AutoRange {
    cfg: RangeCfg,
    hist: [u32; 256],
}

impl AutoRange {
    pub fn new(cfg: RangeCfg) -> Self {
        Self {
            cfg,
            hist: [0u32; 256],
        }
    }

    /// Depth step (1..=9) that would best span the central scene, given the
    /// step currently in effect. Returns the current step when no change is
    /// warranted.
    pub fn preferred_step(&mut self, raw: &RawImage, unit: u8) -> u8 {
        let cfg = &self.cfg;
        let area = (cfg.roi_w * cfg.roi_h) as u32;

        self.hist = [0u32; 256];
        for y in cfg.roi_y..cfg.roi_y + cfg.roi_h {
            let row = y * FRAME_DIM;
            for x in cfg.roi_x..cfg.roi_x + cfg.roi_w {
                self.hist[raw[row + x] as usize] += 1;
            }
        }

        // Percent saturated, and the rank of the requested percentile among
        // the non-saturated pixels.
        let sat_count = self.hist[255];
        let miss = div_round_nearest_u32(100 * sat_count, area);
        let stop = div_round_nearest_u32(cfg.pct * (area - sat_count), 100);

        let mut bulk = 254u32;
        let mut sum = 0u32;
        for (bin, &n) in self.hist.iter().take(255).enumerate() {
            sum += n;
            if sum >= stop {
                bulk = bin as u32;
                break;
            }
        }

        // Step that would put the percentile depth at about ihi counts.
        let mut goal = div_round_nearest_u32(u32::from(unit) * bulk, cfg.ihi).clamp(1, 9) as u8;
        if miss > cfg.sat && goal <= unit && unit < 9 {
            goal = unit + 1;
        }
        goal
    }
}
