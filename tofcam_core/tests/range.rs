//! Auto-range control law: percentile steering, clamping, saturation bump.

use tofcam_core::range::AutoRange;
use tofcam_core::{RangeCfg, RawImage, FRAME_PIXELS};

fn flat(v: u8) -> Box<RawImage> {
    Box::new([v; FRAME_PIXELS])
}

#[test]
fn well_spanned_scene_keeps_the_step() {
    let mut ar = AutoRange::new(RangeCfg::default());
    // Percentile depth at exactly ihi counts: goal = unit.
    assert_eq!(ar.preferred_step(&flat(150), 2), 2);
}

#[test]
fn near_scene_requests_a_finer_step() {
    let mut ar = AutoRange::new(RangeCfg::default());
    // round(2 * 30 / 150) = 0, clamped up to 1.
    assert_eq!(ar.preferred_step(&flat(30), 2), 1);
}

#[test]
fn far_scene_requests_a_coarser_step() {
    let mut ar = AutoRange::new(RangeCfg::default());
    // round(2 * 240 / 150) = 3.
    assert_eq!(ar.preferred_step(&flat(240), 2), 3);
}

#[test]
fn saturation_bumps_the_step_up() {
    let mut ar = AutoRange::new(RangeCfg::default());
    // Fully saturated centre: percentile scan sees no mass, goal clamps to
    // 1, and the saturation override bumps one step coarser instead.
    assert_eq!(ar.preferred_step(&flat(255), 2), 3);
}

#[test]
fn saturation_override_does_not_apply_at_the_coarsest_step() {
    let mut ar = AutoRange::new(RangeCfg::default());
    // At step 9 the bump is unavailable; the empty percentile falls through
    // to the clamped goal of 1.
    assert_eq!(ar.preferred_step(&flat(255), 9), 1);
}
