#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Acquisition engine for a compact USB-serial time-of-flight camera
//! (100x100 eight-bit depth frames at roughly 15 Hz).
//!
//! All hardware access goes through `tofcam_traits::Transport`; everything in
//! this crate is transport-agnostic.
//!
//! ## Pipeline
//!
//! A background worker drives the full per-frame chain:
//!
//! - **Framing**: locate packet boundaries in the byte stream (`framer`)
//! - **Auto-ranging**: retune the sensor's depth step to the scene (`range`)
//! - **Spatial filtering**: 5x5 median with an incremental histogram (`median`)
//! - **Temporal filtering**: adaptive-gain per-pixel smoothing (`temporal`)
//! - **Reformatting**: mask unreliable pixels, scale to 16-bit quarter-mm
//!   depth (`reformat`)
//! - **Publication**: triple-buffered hand-off to the consumer (`driver`)
//!
//! ## Fixed-Point Arithmetic
//!
//! The filter kernels run in signed integer fixed point (8.8 scale) for
//! deterministic behavior; floating point appears only at configuration
//! boundaries.

pub mod error;
pub mod framer;
pub mod median;
pub mod mocks;
pub mod range;
pub mod reformat;
pub mod ring;
pub mod temporal;
pub mod util;

mod driver;

pub use driver::{DriverState, TofCam};
pub use error::{BuildError, CamError, Report, Result};

use std::marker::PhantomData;
use std::sync::Arc;

use tofcam_traits::{Clock, MonotonicClock, Transport};

/// Frame edge length in pixels.
pub const FRAME_DIM: usize = 100;
/// Pixels per frame.
pub const FRAME_PIXELS: usize = FRAME_DIM * FRAME_DIM;
/// Whole wire packet: 4-byte prefix, 12 opaque header bytes, the pixel
/// payload, and a 2-byte trailer.
pub const PACKET_LEN: usize = 10_018;
/// Offset of the pixel payload from the packet's first sync byte.
pub const PAYLOAD_OFFSET: usize = 16;
/// Output sentinel: this pixel must not be used.
pub const INVALID_DEPTH: u16 = 0xFFFF;

/// One raw or filtered 8-bit frame, row-major, scanning right-to-left
/// top-down (USB connector on the left).
pub type RawImage = [u8; FRAME_PIXELS];
/// One output frame: 16-bit depth in quarter-millimetres, same scan order.
pub type DepthImage = [u16; FRAME_PIXELS];

/// Auto-ranging parameters.
#[derive(Debug, Clone)]
pub struct RangeCfg {
    /// Percent of saturated ROI pixels above which a coarser step is forced.
    pub sat: u32,
    /// Percentile of non-saturated ROI pixels used as the scene depth.
    pub pct: u32,
    /// Raw count the percentile depth is steered toward (out of 255).
    pub ihi: u32,
    /// Central region of interest analyzed each frame.
    pub roi_x: usize,
    pub roi_y: usize,
    pub roi_w: usize,
    pub roi_h: usize,
}

impl Default for RangeCfg {
    fn default() -> Self {
        Self {
            sat: 80,
            pct: 50,
            ihi: 150,
            roi_x: 25,
            roi_y: 25,
            roi_w: 50,
            roi_h: 50,
        }
    }
}

/// Temporal-smoothing parameters. Fixed once the driver is built.
#[derive(Debug, Clone)]
pub struct SmoothCfg {
    /// Process time constant in (0, 1]; higher tracks changes faster.
    pub time_constant: f32,
    /// Expected measurement-noise floor (64 = three bits of sensor noise).
    pub noise_floor: f32,
    /// Pixels whose running variance exceeds this are reported invalid;
    /// 255 disables the mask for intentionally dynamic scenes.
    pub flicker_limit: u8,
}

impl Default for SmoothCfg {
    fn default() -> Self {
        Self {
            time_constant: 0.1,
            noise_floor: 64.0,
            flicker_limit: 32,
        }
    }
}

/// Transport and latch timing.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Blocking-read timeout at the transport (ms).
    pub read_ms: u64,
    /// Budget for a blocking `latest` call (ms, polled at 1 ms).
    pub latch_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_ms: 1000,
            latch_ms: 500,
        }
    }
}

// Type-state markers for the builder.
pub struct Missing;
pub struct Set;

/// Builder for [`TofCam`]. The transport is mandatory and tracked in the
/// type state; everything else has sensible defaults and is validated on
/// `build()`.
pub struct TofCamBuilder<L> {
    link: Option<Box<dyn Transport + Send>>,
    range: Option<RangeCfg>,
    smooth: Option<SmoothCfg>,
    timeouts: Option<Timeouts>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _l: PhantomData<L>,
}

impl TofCam {
    pub fn builder() -> TofCamBuilder<Missing> {
        TofCamBuilder {
            link: None,
            range: None,
            smooth: None,
            timeouts: None,
            clock: None,
            _l: PhantomData,
        }
    }
}

impl<L> TofCamBuilder<L> {
    pub fn with_range(mut self, range: RangeCfg) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_smoothing(mut self, smooth: SmoothCfg) -> Self {
        self.smooth = Some(smooth);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Provide a custom clock; defaults to the real monotonic clock.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fallible build available in any type-state; reports missing pieces as
    /// typed errors.
    pub fn try_build(self) -> Result<TofCam> {
        let TofCamBuilder {
            link,
            range,
            smooth,
            timeouts,
            clock,
            _l: _,
        } = self;

        let link = link.ok_or_else(|| Report::new(BuildError::MissingTransport))?;
        let range = range.unwrap_or_default();
        let smooth = smooth.unwrap_or_default();
        let timeouts = timeouts.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        if !smooth.time_constant.is_finite()
            || smooth.time_constant <= 0.0
            || smooth.time_constant > 1.0
        {
            return Err(Report::new(BuildError::InvalidConfig(
                "time_constant must be in (0, 1]",
            )));
        }
        if !smooth.noise_floor.is_finite() || smooth.noise_floor < 0.0 {
            return Err(Report::new(BuildError::InvalidConfig(
                "noise_floor must be >= 0",
            )));
        }
        if range.roi_w == 0 || range.roi_h == 0 {
            return Err(Report::new(BuildError::InvalidConfig(
                "ROI must have non-zero area",
            )));
        }
        if range.roi_x + range.roi_w > FRAME_DIM || range.roi_y + range.roi_h > FRAME_DIM {
            return Err(Report::new(BuildError::InvalidConfig(
                "ROI must lie within the frame",
            )));
        }
        if range.ihi == 0 || range.ihi > 255 {
            return Err(Report::new(BuildError::InvalidConfig(
                "ihi must be in 1..=255",
            )));
        }
        if range.pct > 100 || range.sat > 100 {
            return Err(Report::new(BuildError::InvalidConfig(
                "pct and sat are percentages",
            )));
        }
        if timeouts.read_ms == 0 {
            return Err(Report::new(BuildError::InvalidConfig(
                "read_ms must be >= 1",
            )));
        }

        Ok(driver::assemble(link, range, smooth, timeouts, clock))
    }
}

impl TofCamBuilder<Missing> {
    pub fn with_transport(self, link: impl Transport + Send + 'static) -> TofCamBuilder<Set> {
        let TofCamBuilder {
            link: _,
            range,
            smooth,
            timeouts,
            clock,
            _l: _,
        } = self;
        TofCamBuilder {
            link: Some(Box::new(link)),
            range,
            smooth,
            timeouts,
            clock,
            _l: PhantomData,
        }
    }
}

impl TofCamBuilder<Set> {
    /// Validate and build. Only available once a transport is set.
    pub fn build(self) -> Result<TofCam> {
        self.try_build()
    }
}
