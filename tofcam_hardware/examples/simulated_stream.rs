//! Stream a few frames from the simulated sensor.
//!
//! Run with `cargo run -p tofcam_hardware --example simulated_stream`.
//! Demonstrates the minimal wiring: build a transport, hand it to the
//! driver, latch frames, stop.

#[cfg(feature = "hardware")]
fn main() {
    println!("built with the hardware feature; point the CLI at a real device instead");
}

#[cfg(not(feature = "hardware"))]
fn main() -> Result<(), eyre::Report> {
    use std::time::Duration;

    use tofcam_core::{TofCam, FRAME_DIM, INVALID_DEPTH};
    use tofcam_hardware::SimulatedSensor;

    // A wall 1.2 m away with a little sensor noise, paced like the device.
    let sensor = SimulatedSensor::new(1200)
        .with_noise(2)
        .paced(Duration::from_millis(66));

    let mut cam = TofCam::builder().with_transport(sensor).build()?;
    cam.start()?;

    for n in 0..10 {
        match cam.latest(true) {
            Some(frame) => {
                let centre = frame[50 * FRAME_DIM + 50];
                let valid = frame.iter().filter(|&&d| d != INVALID_DEPTH).count();
                if centre == INVALID_DEPTH {
                    println!("frame {n}: centre invalid, {valid} valid pixels");
                } else {
                    println!(
                        "frame {n}: centre {:.2} mm, step {} mm, {valid} valid pixels",
                        f64::from(centre) / 4.0,
                        cam.step()
                    );
                }
            }
            None => println!("frame {n}: not ready"),
        }
    }

    cam.stop();
    Ok(())
}
