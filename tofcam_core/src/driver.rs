//! Acquisition driver: sensor bring-up, the background worker that runs the
//! full per-frame pipeline, and the consumer-facing latch API.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tofcam_traits::{Clock, Transport};

use crate::error::{CamError, Result};
use crate::framer::Framer;
use crate::median::median5x5;
use crate::range::AutoRange;
use crate::reformat::{reformat, ScaleLut};
use crate::ring::OutputRing;
use crate::temporal::TemporalFilter;
use crate::{DepthImage, RangeCfg, RawImage, SmoothCfg, Timeouts, FRAME_PIXELS};

type Link = Box<dyn Transport + Send>;

const CMD_STREAM_ON: &[u8; 10] = b"AT+DISP=3\r";
const CMD_STREAM_OFF: &[u8; 10] = b"AT+DISP=1\r";
/// Minimum gap the sensor needs between consecutive commands.
const CMD_GAP: Duration = Duration::from_millis(50);
/// Depth step commanded at start; 2 mm per count suits indoor scenes.
const START_STEP: u8 = 2;

fn unit_command(step: u8) -> [u8; 10] {
    let mut cmd = *b"AT+UNIT=0\r";
    cmd[8] = b'0' + step.min(9);
    cmd
}

/// Lifecycle of an acquisition session. `Opening` and `Stopping` are only
/// observable from inside `start`/`stop`; `Broken` is entered by the worker
/// when the stream dies and is terminal until the driver is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninit,
    Opening,
    Running,
    Broken,
    Stopping,
    Closed,
}

/// State shared between the worker thread and the consumer handle.
struct Shared {
    ring: OutputRing,
    run: AtomicBool,
    healthy: AtomicBool,
    unit: AtomicU8,
    taps: Mutex<DebugTaps>,
}

/// Best-effort snapshots of the worker's intermediate buffers, refreshed
/// once per frame when no observer holds them.
struct DebugTaps {
    raw: Box<RawImage>,
    median: Box<RawImage>,
    smoothed: Box<RawImage>,
}

/// Driver handle for one camera.
///
/// `start` configures the sensor and spawns the worker; `latest` hands out
/// the most recent cleaned frame; `stop` (also run on drop) shuts the sensor
/// down and reclaims the transport. A broken stream is terminal for the
/// session; restarting is the caller's job.
pub struct TofCam {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock + Send + Sync>,
    range: RangeCfg,
    smooth: SmoothCfg,
    timeouts: Timeouts,
    state: DriverState,
    link: Option<Link>,
    worker: Option<JoinHandle<()>>,
    link_back: Option<mpsc::Receiver<Link>>,
}

impl std::fmt::Debug for TofCam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TofCam")
            .field("state", &self.state)
            .field("range", &self.range)
            .field("smooth", &self.smooth)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

pub(crate) fn assemble(
    link: Link,
    range: RangeCfg,
    smooth: SmoothCfg,
    timeouts: Timeouts,
    clock: Arc<dyn Clock + Send + Sync>,
) -> TofCam {
    TofCam {
        shared: Arc::new(Shared {
            ring: OutputRing::new(),
            run: AtomicBool::new(false),
            healthy: AtomicBool::new(false),
            unit: AtomicU8::new(START_STEP),
            taps: Mutex::new(DebugTaps {
                raw: Box::new([0u8; FRAME_PIXELS]),
                median: Box::new([0u8; FRAME_PIXELS]),
                smoothed: Box::new([0u8; FRAME_PIXELS]),
            }),
        }),
        clock,
        range,
        smooth,
        timeouts,
        state: DriverState::Uninit,
        link: Some(link),
        worker: None,
        link_back: None,
    }
}

impl TofCam {
    /// Configure the sensor and launch the acquisition worker.
    ///
    /// On any failure the driver stays `Uninit` and can be started again.
    pub fn start(&mut self) -> Result<()> {
        if self.state != DriverState::Uninit {
            return Err(eyre::Report::new(CamError::State(
                "driver already started or closed",
            )));
        }
        let mut link = match self.link.take() {
            Some(link) => link,
            None => {
                return Err(eyre::Report::new(CamError::Unavailable(
                    "transport already consumed".into(),
                )))
            }
        };
        self.state = DriverState::Opening;

        if let Err(e) = configure_sensor(&mut link, &*self.clock) {
            self.link = Some(link);
            self.state = DriverState::Uninit;
            return Err(eyre::Report::new(e));
        }

        self.shared.run.store(true, Ordering::Release);
        self.shared.healthy.store(true, Ordering::Release);
        self.shared.unit.store(START_STEP, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let range = self.range.clone();
        let smooth = self.smooth.clone();
        let read_timeout = Duration::from_millis(self.timeouts.read_ms);
        let spawned = std::thread::Builder::new()
            .name("tofcam-rx".into())
            .spawn(move || {
                let mut worker = Worker::new(link, shared, clock, range, smooth, read_timeout);
                worker.run();
                // Hand the transport back so `stop` can send the shutdown
                // command sequence.
                let _ = tx.send(worker.link);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.state = DriverState::Uninit;
                return Err(eyre::Report::new(CamError::Unavailable(format!(
                    "spawn worker: {e}"
                ))));
            }
        };

        self.worker = Some(handle);
        self.link_back = Some(rx);
        self.state = DriverState::Running;
        tracing::info!("acquisition started");
        Ok(())
    }

    /// Most recent cleaned frame: 100x100 little-endian 16-bit pixels in
    /// quarter-millimetres, `0xFFFF` marking unusable pixels.
    ///
    /// Non-blocking mode returns `None` when nothing new has been published.
    /// Blocking mode polls at 1 ms granularity up to the configured latch
    /// budget. The returned borrow stays byte-stable until the next call;
    /// intermediate frames are dropped when the caller is slow, by design.
    pub fn latest(&mut self, block: bool) -> Option<&DepthImage> {
        if self.state != DriverState::Running || !self.shared.healthy.load(Ordering::Acquire) {
            return None;
        }
        let mut waited = 0u64;
        while self.shared.ring.fresh() <= 0 {
            if !block || waited >= self.timeouts.latch_ms {
                return None;
            }
            if !self.shared.healthy.load(Ordering::Acquire) {
                return None;
            }
            self.clock.sleep(Duration::from_millis(1));
            waited += 1;
        }
        // SAFETY: the borrow is tied to `&mut self`, so it is retired before
        // the next `latest` call; the ring never rewrites a locked slot.
        unsafe { self.shared.ring.latch() }
    }

    /// Shut the sensor down and release the transport. Idempotent; also run
    /// on drop. Failures during the shutdown sequence are logged, not
    /// returned.
    pub fn stop(&mut self) {
        if matches!(self.state, DriverState::Uninit | DriverState::Closed) {
            return;
        }
        self.state = DriverState::Stopping;
        self.shared.run.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            // The worker unblocks within the transport read timeout.
            if handle.join().is_err() {
                tracing::warn!("acquisition worker panicked during shutdown");
            }
        }
        let link = self
            .link_back
            .take()
            .and_then(|rx| rx.recv_timeout(Duration::from_secs(1)).ok())
            .or_else(|| self.link.take());
        if let Some(mut link) = link {
            if link.write(&unit_command(0)).is_err() {
                tracing::warn!("failed to restore depth step during shutdown");
            }
            self.clock.sleep(CMD_GAP);
            if link.write(CMD_STREAM_OFF).is_err() {
                tracing::warn!("failed to stop streaming during shutdown");
            }
            if link.close().is_err() {
                tracing::warn!("transport close failed");
            }
        }
        self.state = DriverState::Closed;
        tracing::info!("acquisition stopped");
    }

    /// Current lifecycle state; a dead stream reports `Broken`.
    pub fn state(&self) -> DriverState {
        if self.state == DriverState::Running && !self.shared.healthy.load(Ordering::Acquire) {
            DriverState::Broken
        } else {
            self.state
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == DriverState::Running
    }

    /// Depth step currently in effect (mm per count). Best-effort: read
    /// without synchronizing with the pipeline.
    pub fn step(&self) -> u8 {
        self.shared.unit.load(Ordering::Relaxed)
    }

    /// Snapshot of the last raw sensor frame (best-effort debug tap).
    pub fn raw_frame(&self) -> Box<RawImage> {
        self.tap(|t| &t.raw)
    }

    /// Snapshot of the last median-filtered frame (best-effort debug tap).
    pub fn median_frame(&self) -> Box<RawImage> {
        self.tap(|t| &t.median)
    }

    /// Snapshot of the temporal filter's running mean (best-effort debug tap).
    pub fn smoothed_frame(&self) -> Box<RawImage> {
        self.tap(|t| &t.smoothed)
    }

    fn tap(&self, pick: impl Fn(&DebugTaps) -> &RawImage) -> Box<RawImage> {
        let taps = self
            .shared
            .taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Box::new(*pick(&taps))
    }
}

impl Drop for TofCam {
    fn drop(&mut self) {
        self.stop();
    }
}

fn configure_sensor(
    link: &mut Link,
    clock: &dyn Clock,
) -> std::result::Result<(), CamError> {
    // The sensor only emits frames with the live display enabled.
    link.write(CMD_STREAM_ON)
        .map_err(|e| CamError::Unavailable(e.to_string()))?;
    clock.sleep(CMD_GAP);
    link.write(&unit_command(START_STEP))
        .map_err(|e| CamError::Unavailable(e.to_string()))?;
    Ok(())
}

/// Per-session pipeline state, owned by the worker thread.
struct Worker {
    link: Link,
    shared: Arc<Shared>,
    clock: Arc<dyn Clock + Send + Sync>,
    framer: Framer,
    ranger: AutoRange,
    temporal: TemporalFilter,
    lut: ScaleLut,
    med: Box<RawImage>,
    flicker_limit: u8,
    /// Depth step in effect (mm per count).
    unit: u8,
    /// Step most recently requested; equals `unit` when nothing is in flight.
    pend: u8,
    /// Frames published this session.
    frame: u64,
    read_timeout: Duration,
}

impl Worker {
    fn new(
        link: Link,
        shared: Arc<Shared>,
        clock: Arc<dyn Clock + Send + Sync>,
        range: RangeCfg,
        smooth: SmoothCfg,
        read_timeout: Duration,
    ) -> Self {
        Self {
            link,
            shared,
            clock,
            framer: Framer::new(),
            ranger: AutoRange::new(range),
            temporal: TemporalFilter::new(smooth.time_constant, smooth.noise_floor),
            lut: ScaleLut::new(),
            med: Box::new([0u8; FRAME_PIXELS]),
            flicker_limit: smooth.flicker_limit,
            unit: START_STEP,
            pend: START_STEP,
            frame: 0,
            read_timeout,
        }
    }

    fn run(&mut self) {
        while self.shared.run.load(Ordering::Acquire) {
            if let Err(e) = self.step() {
                tracing::warn!(error = %e, "acquisition stream ended");
                self.shared.healthy.store(false, Ordering::Release);
                return;
            }
        }
    }

    fn step(&mut self) -> std::result::Result<(), CamError> {
        let report = self.framer.sync(&mut self.link, self.read_timeout)?;
        // Bytes ahead of the prefix after warm-up can only be the sensor
        // acknowledging a step command.
        if report.skipped > 0 && self.frame > 2 {
            self.commit_step();
        }
        self.framer
            .fill(&mut self.link, self.read_timeout, &*self.clock)?;

        self.adjust_range()?;

        median5x5(self.framer.payload(), &mut self.med);
        self.temporal.update(&self.med);

        let raw = self.framer.payload();
        let avg = self.temporal.avg();
        let var = self.temporal.var();
        let lut = &self.lut;
        let unit = self.unit;
        let vlim = self.flicker_limit;
        self.shared
            .ring
            .with_fill(|out| reformat(raw, avg, var, lut, unit, vlim, out));
        self.shared.ring.publish();
        self.frame += 1;

        self.publish_taps();
        Ok(())
    }

    /// Decide whether the scene wants a different depth step and, with no
    /// request already in flight, command it.
    fn adjust_range(&mut self) -> std::result::Result<(), CamError> {
        // The first couple of frames carry vendor-stale data.
        if self.frame < 2 {
            return Ok(());
        }
        let goal = self.ranger.preferred_step(self.framer.payload(), self.unit);
        if goal != self.unit && self.pend == self.unit {
            self.link
                .write(&unit_command(goal))
                .map_err(|e| CamError::Io(e.to_string()))?;
            self.pend = goal;
            tracing::info!(from = self.unit, to = goal, "depth step change requested");
        }
        Ok(())
    }

    /// The sensor acknowledged a step command: remap the temporal filter's
    /// state into the new quantization and adopt the pending step.
    fn commit_step(&mut self) {
        if self.pend != self.unit {
            self.temporal.rescale(self.unit, self.pend);
            tracing::info!(from = self.unit, to = self.pend, "depth step acknowledged");
            self.unit = self.pend;
            self.shared.unit.store(self.unit, Ordering::Relaxed);
        }
    }

    fn publish_taps(&mut self) {
        // try_lock: an observer mid-copy must not stall the pipeline.
        if let Ok(mut taps) = self.shared.taps.try_lock() {
            taps.raw.copy_from_slice(self.framer.payload());
            taps.median.copy_from_slice(&*self.med);
            taps.smoothed.copy_from_slice(self.temporal.avg());
        }
    }
}
