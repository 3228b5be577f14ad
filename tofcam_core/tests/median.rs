//! The incremental-histogram median must agree everywhere with a plain
//! sort-the-window reference, including the replicated borders.

use proptest::prelude::*;
use tofcam_core::median::median5x5;
use tofcam_core::{RawImage, FRAME_DIM, FRAME_PIXELS};

/// Sort the clamped 5x5 window and take the 13th of 25 samples.
fn reference(src: &RawImage, x: usize, y: usize) -> u8 {
    let mut win = [0u8; 25];
    let mut n = 0;
    for dy in -2..=2isize {
        for dx in -2..=2isize {
            let yy = (y as isize + dy).clamp(0, FRAME_DIM as isize - 1) as usize;
            let xx = (x as isize + dx).clamp(0, FRAME_DIM as isize - 1) as usize;
            win[n] = src[yy * FRAME_DIM + xx];
            n += 1;
        }
    }
    win.sort_unstable();
    win[12]
}

fn image_from(bytes: &[u8]) -> Box<RawImage> {
    let mut img = Box::new([0u8; FRAME_PIXELS]);
    img.copy_from_slice(bytes);
    img
}

#[test]
fn constant_image_is_fixed_point() {
    let src = Box::new([80u8; FRAME_PIXELS]);
    let mut dst = Box::new([0u8; FRAME_PIXELS]);
    median5x5(&src, &mut dst);
    assert!(dst.iter().all(|&p| p == 80));
}

#[test]
fn matches_reference_on_gradient() {
    let mut src = Box::new([0u8; FRAME_PIXELS]);
    for y in 0..FRAME_DIM {
        for x in 0..FRAME_DIM {
            src[y * FRAME_DIM + x] = ((x * 2 + y) % 256) as u8;
        }
    }
    let mut dst = Box::new([0u8; FRAME_PIXELS]);
    median5x5(&src, &mut dst);
    for y in 0..FRAME_DIM {
        for x in 0..FRAME_DIM {
            assert_eq!(
                dst[y * FRAME_DIM + x],
                reference(&src, x, y),
                "mismatch at ({x},{y})"
            );
        }
    }
}

#[test]
fn corners_replicate_the_edge() {
    // A bright block in the top-left corner: replication triples the corner
    // column and row, so the corner median follows the block.
    let mut src = Box::new([0u8; FRAME_PIXELS]);
    for y in 0..3 {
        for x in 0..3 {
            src[y * FRAME_DIM + x] = 200;
        }
    }
    let mut dst = Box::new([0u8; FRAME_PIXELS]);
    median5x5(&src, &mut dst);
    for &(x, y) in &[(0usize, 0usize), (0, 99), (99, 0), (99, 99), (0, 50), (99, 50)] {
        assert_eq!(
            dst[y * FRAME_DIM + x],
            reference(&src, x, y),
            "corner/edge ({x},{y})"
        );
    }
}

#[test]
fn single_outlier_is_rejected() {
    let mut src = Box::new([80u8; FRAME_PIXELS]);
    src[50 * FRAME_DIM + 50] = 255;
    let mut dst = Box::new([0u8; FRAME_PIXELS]);
    median5x5(&src, &mut dst);
    assert!(dst.iter().all(|&p| p == 80));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn agrees_with_the_reference_everywhere(
        bytes in prop::collection::vec(any::<u8>(), FRAME_PIXELS),
    ) {
        let src = image_from(&bytes);
        let mut dst = Box::new([0u8; FRAME_PIXELS]);
        median5x5(&src, &mut dst);
        for y in 0..FRAME_DIM {
            for x in 0..FRAME_DIM {
                prop_assert_eq!(
                    dst[y * FRAME_DIM + x],
                    reference(&src, x, y),
                    "mismatch at ({}, {})", x, y
                );
            }
        }
    }

    /// Low-cardinality images stress the bot/lowest-cache bookkeeping.
    #[test]
    fn agrees_with_the_reference_on_sparse_levels(
        bytes in prop::collection::vec(prop_oneof![Just(0u8), Just(1u8), Just(254u8), Just(255u8)], FRAME_PIXELS),
    ) {
        let src = image_from(&bytes);
        let mut dst = Box::new([0u8; FRAME_PIXELS]);
        median5x5(&src, &mut dst);
        for y in 0..FRAME_DIM {
            for x in 0..FRAME_DIM {
                prop_assert_eq!(
                    dst[y * FRAME_DIM + x],
                    reference(&src, x, y),
                    "mismatch at ({}, {})", x, y
                );
            }
        }
    }
}
