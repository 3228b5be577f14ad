use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod cli;
mod error_fmt;

use cli::{Cli, Commands};
use error_fmt::humanize;

use tofcam_config::Config;
use tofcam_core::error::Result as CoreResult;
use tofcam_core::{
    CamError, DepthImage, RangeCfg, SmoothCfg, TofCam, Timeouts, FRAME_DIM, INVALID_DEPTH,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Build a file sink with optional rotation, parking the non-blocking guard
/// in a OnceLock so it lives for the whole process.
fn file_layer(
    file: Option<&str>,
    rotation: Option<&str>,
) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let path = file?;
    let p = Path::new(path);
    if let Some(parent) = p.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let appender = match rotation.unwrap_or("never") {
        "daily" => tracing_appender::rolling::daily(".", path),
        "hourly" => tracing_appender::rolling::hourly(".", path),
        _ => tracing_appender::rolling::never(".", path),
    };
    let (nb_writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(nb_writer)
}

/// Initialize tracing once for the whole app. RUST_LOG wins over the config
/// level, which wins over the CLI flag.
fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = if json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };
    let file = file_layer(file, rotation)
        .map(|w| fmt::layer().json().with_ansi(false).with_writer(w).boxed());
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        // No file: run on the sensor's shipped defaults.
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = tofcam_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate().map_err(|e| eyre::eyre!(e))?;
    Ok(cfg)
}

#[cfg(feature = "hardware")]
fn open_transport(device: &str) -> eyre::Result<Box<dyn tofcam_traits::Transport + Send>> {
    let link = tofcam_hardware::UsbTransport::open(device).map_err(|e| eyre::eyre!("{e:#}"))?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "hardware"))]
fn open_transport(_device: &str) -> eyre::Result<Box<dyn tofcam_traits::Transport + Send>> {
    // Built without hardware support: a simulated 1.2 m scene stands in.
    Ok(Box::new(
        tofcam_hardware::SimulatedSensor::new(1200)
            .with_noise(2)
            .paced(std::time::Duration::from_millis(66)),
    ))
}

fn build_cam(cfg: &Config, device_override: Option<&str>) -> eyre::Result<TofCam> {
    let device = device_override.unwrap_or(&cfg.device.path);
    let link = open_transport(device)?;
    TofCam::builder()
        .with_transport(link)
        .with_range(RangeCfg {
            sat: cfg.range.sat,
            pct: cfg.range.pct,
            ihi: cfg.range.ihi,
            roi_x: cfg.range.roi_x,
            roi_y: cfg.range.roi_y,
            roi_w: cfg.range.roi_w,
            roi_h: cfg.range.roi_h,
        })
        .with_smoothing(SmoothCfg {
            time_constant: cfg.smooth.time_constant,
            noise_floor: cfg.smooth.noise_floor,
            flicker_limit: cfg.smooth.flicker_limit,
        })
        .with_timeouts(Timeouts {
            read_ms: cfg.device.read_timeout_ms,
            latch_ms: cfg.latch.budget_ms,
        })
        .build()
}

fn frame_bytes(frame: &DepthImage) -> Vec<u8> {
    frame.iter().flat_map(|d| d.to_le_bytes()).collect()
}

fn frame_stats(frame: &DepthImage) -> (usize, Option<f64>) {
    let valid = frame.iter().filter(|&&d| d != INVALID_DEPTH).count();
    let centre = frame[50 * FRAME_DIM + 50];
    let centre_mm = (centre != INVALID_DEPTH).then(|| f64::from(centre) / 4.0);
    (valid, centre_mm)
}

/// Consecutive empty blocking latches tolerated before giving up.
const MAX_MISSES: u32 = 20;

fn run_stream(cfg: &Config, device: Option<&str>, frames: u32, dump: Option<&Path>) -> CoreResult<()> {
    let mut cam = build_cam(cfg, device)?;
    cam.start()?;

    let mut sink = match dump {
        Some(path) => Some(
            fs::File::create(path).map_err(|e| eyre::eyre!("create {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let t0 = Instant::now();
    let mut got = 0u32;
    let mut misses = 0u32;
    while got < frames {
        match cam.latest(true) {
            Some(frame) => {
                misses = 0;
                got += 1;
                let (valid, centre_mm) = frame_stats(frame);
                let bytes = sink.is_some().then(|| frame_bytes(frame));
                // The frame borrow ends here, freeing the handle again.
                let step = cam.step();
                match centre_mm {
                    Some(mm) => tracing::info!(frame = got, centre_mm = mm, valid, step, "frame"),
                    None => tracing::info!(frame = got, valid, step, "frame (centre invalid)"),
                }
                if let (Some(f), Some(bytes)) = (sink.as_mut(), bytes) {
                    f.write_all(&bytes)
                        .map_err(|e| eyre::eyre!("write dump: {e}"))?;
                }
            }
            None => {
                if !cam.is_healthy() {
                    cam.stop();
                    return Err(eyre::Report::new(CamError::StreamLost("stream died mid-run")));
                }
                misses += 1;
                if misses >= MAX_MISSES {
                    cam.stop();
                    return Err(eyre::Report::new(CamError::Timeout));
                }
            }
        }
    }

    let elapsed = t0.elapsed().as_secs_f64();
    let fps = f64::from(got) / elapsed.max(1e-9);
    println!("latched {got} frames in {elapsed:.2} s ({fps:.1} fps)");
    cam.stop();
    Ok(())
}

fn run_snapshot(cfg: &Config, device: Option<&str>, output: &Path) -> CoreResult<()> {
    let mut cam = build_cam(cfg, device)?;
    cam.start()?;
    let frame = match cam.latest(true) {
        Some(frame) => frame_bytes(frame),
        None => {
            cam.stop();
            return Err(eyre::Report::new(CamError::Timeout));
        }
    };
    fs::write(output, frame).map_err(|e| eyre::eyre!("write {}: {e}", output.display()))?;
    println!("wrote {}", output.display());
    cam.stop();
    Ok(())
}

fn run_self_check(cfg: &Config, device: Option<&str>) -> CoreResult<()> {
    let mut cam = build_cam(cfg, device)?;
    cam.start()?;
    let mut last = None;
    for _ in 0..5 {
        if let Some(frame) = cam.latest(true) {
            last = Some(frame_stats(frame));
        }
    }
    let healthy = cam.is_healthy();
    cam.stop();
    match (healthy, last) {
        (true, Some((valid, centre_mm))) => {
            match centre_mm {
                Some(mm) => println!("self-check: OK ({valid} valid pixels, centre {mm:.1} mm)"),
                None => println!("self-check: OK ({valid} valid pixels, centre masked)"),
            }
            Ok(())
        }
        (true, None) => Err(eyre::Report::new(CamError::Timeout)),
        (false, _) => Err(eyre::Report::new(CamError::StreamLost(
            "stream died during self-check",
        ))),
    }
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", humanize(&e));
            std::process::exit(2);
        }
    };

    let level = cfg
        .logging
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    init_tracing(
        cli.json,
        &level,
        cfg.logging.file.as_deref(),
        cfg.logging.rotation.as_deref(),
    );

    let device = cli.device.as_deref();
    let result = match &cli.cmd {
        Commands::Stream { frames, dump } => run_stream(&cfg, device, *frames, dump.as_deref()),
        Commands::Snapshot { output } => run_snapshot(&cfg, device, output),
        Commands::SelfCheck => run_self_check(&cfg, device),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("{}", humanize(&e));
        std::process::exit(1);
    }
}
