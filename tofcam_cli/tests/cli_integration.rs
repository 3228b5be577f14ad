//! End-to-end CLI runs. Without the `hardware` feature the binary drives the
//! simulated sensor, so these are hermetic.

use assert_cmd::Command;
use predicates::prelude::*;

fn tofcam() -> Command {
    Command::cargo_bin("tofcam").expect("binary built")
}

#[test]
fn self_check_succeeds_against_the_simulator() {
    tofcam()
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check: OK"));
}

#[test]
fn stream_latches_the_requested_frames() {
    tofcam()
        .args(["stream", "--frames", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latched 3 frames"));
}

#[test]
fn snapshot_writes_a_full_16_bit_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("frame.raw");
    tofcam()
        .arg("snapshot")
        .arg("--output")
        .arg(&out)
        .assert()
        .success();
    let bytes = std::fs::read(&out).expect("snapshot file");
    assert_eq!(bytes.len(), 20_000, "100x100 little-endian u16 pixels");
}

#[test]
fn invalid_config_exits_with_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("bad.toml");
    std::fs::write(&cfg, "[range]\nihi = 0\n").expect("write config");
    tofcam()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn unparseable_config_exits_with_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("broken.toml");
    std::fs::write(&cfg, "not toml at all [[[").expect("write config");
    tofcam()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .failure();
}
