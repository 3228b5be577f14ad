//! End-to-end pipeline scenarios over a channel-fed transport: cold start,
//! masking, auto-range commands, step-ack rescaling, and broken streams.

use std::time::{Duration, Instant};

use tofcam_core::mocks::{channel_transport, flat_frame, TransportHarness};
use tofcam_core::{DriverState, TofCam, Timeouts, FRAME_DIM, INVALID_DEPTH};

fn built_cam() -> (TofCam, TransportHarness) {
    let (link, harness) = channel_transport();
    let cam = TofCam::builder()
        .with_transport(link)
        .with_timeouts(Timeouts {
            read_ms: 200,
            latch_ms: 500,
        })
        .build()
        .expect("build driver");
    (cam, harness)
}

fn expect_command(harness: &TransportHarness, want: &[u8]) {
    let got = harness
        .commands
        .recv_timeout(Duration::from_secs(1))
        .expect("command on the wire");
    assert_eq!(got, want);
}

#[test]
fn start_configures_the_sensor() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    expect_command(&harness, b"AT+DISP=3\r");
    expect_command(&harness, b"AT+UNIT=2\r");
    assert_eq!(cam.state(), DriverState::Running);
    cam.stop();
}

#[test]
fn cold_start_discards_two_stale_frames_then_publishes() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    for _ in 0..5 {
        harness.send_packet(&flat_frame(80));
    }
    let frame = cam.latest(true).expect("frame after the two stale ones");
    // Constant 80-count scene at the startup step of 2 mm: 4 * 2 * 80.
    assert!(frame.iter().all(|&d| d == 640));
    cam.stop();
    assert_eq!(cam.state(), DriverState::Closed);
}

#[test]
fn latest_is_null_before_start_and_when_not_ready() {
    let (mut cam, harness) = built_cam();
    assert!(cam.latest(true).is_none());
    cam.start().expect("start");
    // Nothing published yet: non-blocking latch returns immediately.
    assert!(cam.latest(false).is_none());
    drop(harness);
    cam.stop();
}

#[test]
fn saturated_pixel_is_masked_neighbours_survive() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    let mut pixels = flat_frame(80);
    pixels[50 * FRAME_DIM + 50] = 255;
    for _ in 0..5 {
        harness.send_packet(&pixels);
    }
    let frame = cam.latest(true).expect("frame");
    assert_eq!(frame[50 * FRAME_DIM + 50], INVALID_DEPTH);
    assert_eq!(frame[10 * FRAME_DIM + 10], 640);
    assert_eq!(frame[50 * FRAME_DIM + 52], 640);
    cam.stop();
}

#[test]
fn near_scene_commands_exactly_one_step_change() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    expect_command(&harness, b"AT+DISP=3\r");
    expect_command(&harness, b"AT+UNIT=2\r");

    // Percentile depth of 30 counts at step 2 with ihi 150 wants step 1.
    for _ in 0..10 {
        harness.send_packet(&flat_frame(30));
    }
    assert!(cam.latest(true).is_some());
    expect_command(&harness, b"AT+UNIT=1\r");
    // The request stays in flight unacknowledged: no repeats for the
    // remaining frames.
    assert!(harness
        .commands
        .recv_timeout(Duration::from_millis(300))
        .is_err());
    cam.stop();
}

#[test]
fn step_ack_rescales_filter_state_and_commits_the_unit() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    expect_command(&harness, b"AT+DISP=3\r");
    expect_command(&harness, b"AT+UNIT=2\r");

    // 30 counts at step 2 = 60 mm; the controller requests step 1.
    for _ in 0..5 {
        harness.send_packet(&flat_frame(30));
    }
    let before = cam.latest(true).expect("pre-change frame");
    assert!(before.iter().all(|&d| d == 240)); // 60 mm in quarter-mm
    expect_command(&harness, b"AT+UNIT=1\r");

    // The sensor acknowledges with stray ASCII ahead of the next packet and
    // re-emits the same scene at the finer step: 60 counts of 1 mm.
    let _ = harness.bytes.send(b"OK\r".to_vec());
    for _ in 0..5 {
        harness.send_packet(&flat_frame(60));
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while cam.step() != 1 {
        assert!(Instant::now() < deadline, "step ack never committed");
        std::thread::sleep(Duration::from_millis(5));
    }
    harness.send_packet(&flat_frame(60));
    harness.send_packet(&flat_frame(60));
    let after = cam.latest(true).expect("post-change frame");
    // Rescaling keeps the reported depth put: still 60 mm.
    assert!(after.iter().all(|&d| d == 240));
    cam.stop();
}

#[test]
fn broken_stream_goes_null_within_budget_and_stop_does_not_deadlock() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    for _ in 0..3 {
        harness.send_packet(&flat_frame(80));
    }
    assert!(cam.latest(true).is_some());

    // Hang up mid-session.
    drop(harness);

    let t0 = Instant::now();
    assert!(cam.latest(true).is_none());
    assert!(
        t0.elapsed() < Duration::from_millis(600),
        "blocking latch must give up within its budget"
    );

    let deadline = Instant::now() + Duration::from_secs(2);
    while cam.state() != DriverState::Broken {
        assert!(Instant::now() < deadline, "worker never noticed the hangup");
        std::thread::sleep(Duration::from_millis(5));
    }

    cam.stop();
    assert_eq!(cam.state(), DriverState::Closed);
}

#[test]
fn stop_is_idempotent_and_start_after_stop_fails() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    harness.send_packet(&flat_frame(80));
    cam.stop();
    cam.stop();
    assert_eq!(cam.state(), DriverState::Closed);
    assert!(cam.start().is_err());
    assert!(cam.latest(true).is_none());
}

#[test]
fn stop_sends_the_shutdown_sequence() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    expect_command(&harness, b"AT+DISP=3\r");
    expect_command(&harness, b"AT+UNIT=2\r");
    cam.stop();
    expect_command(&harness, b"AT+UNIT=0\r");
    expect_command(&harness, b"AT+DISP=1\r");
}

#[test]
fn dropping_the_driver_stops_the_worker() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    harness.send_packet(&flat_frame(80));
    let t0 = Instant::now();
    drop(cam);
    // Drop joins the worker; bounded by the read timeout plus slack.
    assert!(t0.elapsed() < Duration::from_secs(2));
}

#[test]
fn debug_taps_expose_the_pipeline_stages() {
    let (mut cam, harness) = built_cam();
    cam.start().expect("start");
    for _ in 0..5 {
        harness.send_packet(&flat_frame(80));
    }
    assert!(cam.latest(true).is_some());
    assert_eq!(cam.step(), 2);
    assert!(cam.raw_frame().iter().all(|&p| p == 80));
    assert!(cam.median_frame().iter().all(|&p| p == 80));
    assert!(cam.smoothed_frame().iter().all(|&p| p == 80));
    cam.stop();
}
