//! Per-pixel temporal smoothing with an adaptive, Kalman-like gain.
//!
//! The scene is modelled as a per-pixel random walk in intensity. Each pixel
//! keeps an 8-bit running mean and an 8-bit running variance; the blend gain
//! is driven by the observed squared residual, so a stable pixel converges to
//! near-zero gain (freezing flicker) while a genuinely changing pixel tracks
//! the measurement. All arithmetic is signed fixed point with an 8.8 scale.

use crate::util::clamp8;
use crate::{RawImage, FRAME_PIXELS};

pub struct TemporalFilter {
    avg: Box<RawImage>,
    var: Box<RawImage>,
    /// round(256 * time constant), precomputed at construction.
    fi: i32,
    /// round(256 * measurement-noise floor).
    mn: i32,
    primed: bool,
}

impl TemporalFilter {
    /// `time_constant` in (0, 1]; `noise_floor` >= 0 (both validated by the
    /// driver builder before construction).
    pub fn new(time_constant: f32, noise_floor: f32) -> Self {
        Self {
            avg: Box::new([0u8; FRAME_PIXELS]),
            var: Box::new([0u8; FRAME_PIXELS]),
            fi: (256.0 * time_constant + 0.5) as i32,
            mn: (256.0 * noise_floor + 0.5) as i32,
            primed: false,
        }
    }

    /// Fold one median-filtered frame into the running estimates.
    ///
    /// The very first frame seeds the mean directly and zeroes the variance;
    /// every later frame blends with the adaptive gain.
    pub fn update(&mut self, med: &RawImage) {
        if !self.primed {
            self.avg.copy_from_slice(med);
            self.var.fill(0);
            self.primed = true;
            return;
        }

        let cfi = 256 - self.fi;
        let mn = self.mn as i64;
        for i in 0..FRAME_PIXELS {
            let m = med[i] as i32;
            let p = self.avg[i] as i32;
            let v = self.var[i] as i32;

            // Projected variance blends the stored estimate with the squared
            // residual. Worst case fits in 25 bits, but the gain computation
            // shifts it by 8 more, so that step uses a 64-bit intermediate.
            let diff = m - p;
            let vm = cfi * v + self.fi * diff * diff;
            let k = (((vm as i64) << 8) / ((vm as i64) + mn).max(1)) as i32;

            let val = ((p << 8) + k * diff + 128) >> 8;
            self.avg[i] = clamp8(val);
            // (256-k) * (vm >> 1) peaks just under i32::MAX; keep the order.
            let val = ((256 - k) * (vm >> 1) + 16384) >> 15;
            self.var[i] = clamp8(val);
        }
    }

    /// Remap the stored estimates when the sensor's depth step changes from
    /// `unit` to `pend`, so that `avg * unit` keeps its physical meaning and
    /// the filter does not have to reconverge. Means scale by unit/pend,
    /// variances by the square.
    pub fn rescale(&mut self, unit: u8, pend: u8) {
        let pend = pend.max(1) as i32;
        let unit = unit as i32;

        let f = (unit << 8) / pend;
        let mut sc = [0u8; 256];
        for (i, s) in sc.iter_mut().enumerate() {
            *s = clamp8((f * i as i32 + 128) >> 8);
        }
        for p in self.avg.iter_mut() {
            *p = sc[*p as usize];
        }

        let f = ((unit * unit) << 8) / (pend * pend);
        for (i, s) in sc.iter_mut().enumerate() {
            *s = clamp8((f * i as i32 + 128) >> 8);
        }
        for v in self.var.iter_mut() {
            *v = sc[*v as usize];
        }
    }

    pub fn avg(&self) -> &RawImage {
        &self.avg
    }

    pub fn var(&self) -> &RawImage {
        &self.var
    }
}
