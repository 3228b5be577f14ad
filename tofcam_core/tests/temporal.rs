//! Temporal filter: seeding, fixed points, convergence, and step rescaling.

use tofcam_core::temporal::TemporalFilter;
use tofcam_core::{RawImage, FRAME_PIXELS};

fn flat(v: u8) -> Box<RawImage> {
    Box::new([v; FRAME_PIXELS])
}

#[test]
fn first_frame_seeds_estimates() {
    let mut f = TemporalFilter::new(0.1, 64.0);
    f.update(&flat(80));
    assert!(f.avg().iter().all(|&p| p == 80));
    assert!(f.var().iter().all(|&v| v == 0));
}

#[test]
fn constant_input_is_a_fixed_point() {
    let mut f = TemporalFilter::new(0.1, 64.0);
    for _ in 0..5 {
        f.update(&flat(80));
    }
    assert!(f.avg().iter().all(|&p| p == 80));
    assert!(f.var().iter().all(|&v| v == 0));
}

#[test]
fn converges_toward_a_step_change() {
    let mut f = TemporalFilter::new(0.1, 64.0);
    f.update(&flat(40));
    let mut last = 40i32;
    for _ in 0..200 {
        f.update(&flat(120));
        let now = f.avg()[0] as i32;
        assert!(now >= last, "mean must move monotonically toward input");
        last = now;
    }
    // The fixed-point gain stalls once gain*residual rounds to zero, so the
    // mean settles within a couple of counts of the input.
    assert!((117..=120).contains(&last), "settled at {last}");
    assert!(f.var()[0] <= 8, "variance decays once the scene settles");
}

#[test]
fn rescale_halves_means_for_doubled_step() {
    let mut f = TemporalFilter::new(0.1, 64.0);
    f.update(&flat(100));
    f.update(&flat(100));
    f.rescale(2, 4);
    assert!(f.avg().iter().all(|&p| p == 50));
}

#[test]
fn rescale_squares_the_step_ratio_for_variances() {
    let mut f = TemporalFilter::new(0.1, 64.0);
    // Alternate inputs to build up a non-zero variance estimate.
    f.update(&flat(40));
    for _ in 0..4 {
        f.update(&flat(120));
        f.update(&flat(40));
    }
    let before = f.var()[0] as i32;
    assert!(before > 0, "alternating input must leave residual variance");
    f.rescale(2, 4);
    // unit^2/pend^2 = 1/4 in 8.8 fixed point.
    let scale = ((2 * 2) << 8) / (4 * 4);
    let expect = ((scale * before + 128) >> 8).clamp(0, 255) as u8;
    assert_eq!(f.var()[0], expect);
}
