//! tofcam_hardware: transport backends behind `tofcam_traits::Transport`.
//!
//! Features:
//! - `hardware`: enable the `serialport`-backed USB link to a real camera.
//! - (default) no `hardware` feature: use the in-process sensor simulator,
//!   so the whole stack builds and runs on machines without the device.

pub mod error;

#[cfg(feature = "hardware")]
mod serial;

#[cfg(not(feature = "hardware"))]
pub mod sim {
    use std::collections::VecDeque;
    use std::time::Duration;

    use tofcam_traits::Transport;

    // The simulator plays the device side of the wire, so it mirrors the
    // packet layout independently of the driver crate.
    const FRAME_PIXELS: usize = 10_000;
    const PREFIX: [u8; 4] = [0x00, 0xFF, 0x20, 0x27];
    const HEADER_PAD: usize = 12;
    const TRAILER: usize = 2;

    /// In-process model of the camera: emits well-formed packets for a
    /// constant-depth scene, honors `AT+DISP` (streams only in display mode
    /// 3) and `AT+UNIT` (requantizes the emitted counts and acknowledges in
    /// text before the next frame).
    pub struct SimulatedSensor {
        depth_mm: u32,
        noise: u32,
        unit: u8,
        streaming: bool,
        queue: VecDeque<u8>,
        ack: Option<Vec<u8>>,
        frame_gap: Duration,
        rng: u32,
    }

    impl SimulatedSensor {
        /// Scene at a fixed distance, noise-free, emitting as fast as the
        /// driver reads.
        pub fn new(depth_mm: u32) -> Self {
            Self {
                depth_mm,
                noise: 0,
                unit: 0,
                streaming: false,
                queue: VecDeque::new(),
                ack: None,
                frame_gap: Duration::ZERO,
                rng: 0x2F6E_2B1D,
            }
        }

        /// Add +/- `amp` counts of white noise to every pixel.
        pub fn with_noise(mut self, amp: u32) -> Self {
            self.noise = amp;
            self
        }

        /// Pace frame emission (66 ms approximates the real ~15 Hz device).
        pub fn paced(mut self, gap: Duration) -> Self {
            self.frame_gap = gap;
            self
        }

        /// Move the simulated scene; takes effect from the next frame.
        pub fn set_depth_mm(&mut self, depth_mm: u32) {
            self.depth_mm = depth_mm;
        }

        fn next_noise(&mut self) -> i32 {
            if self.noise == 0 {
                return 0;
            }
            let mut x = self.rng;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.rng = x;
            (x % (2 * self.noise + 1)) as i32 - self.noise as i32
        }

        fn emit_frame(&mut self) {
            if let Some(ack) = self.ack.take() {
                self.queue.extend(ack);
            }
            self.queue.extend(PREFIX);
            self.queue.extend(std::iter::repeat(0u8).take(HEADER_PAD));
            let base = self.depth_mm / u32::from(self.unit.max(1));
            for _ in 0..FRAME_PIXELS {
                let pel = if base >= 255 {
                    // Scene beyond the current range: the device rails.
                    255u8
                } else {
                    (base as i32 + self.next_noise()).clamp(0, 254) as u8
                };
                self.queue.push_back(pel);
            }
            self.queue.extend(std::iter::repeat(0u8).take(TRAILER));
        }
    }

    impl Transport for SimulatedSensor {
        fn read(
            &mut self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
            if self.queue.is_empty() {
                if !self.streaming || self.unit == 0 {
                    return Ok(0);
                }
                if !self.frame_gap.is_zero() {
                    std::thread::sleep(self.frame_gap);
                }
                self.emit_frame();
            }
            let n = buf.len().min(self.queue.len());
            for slot in buf[..n].iter_mut() {
                // emit_frame guarantees the queue is non-empty here
                *slot = self.queue.pop_front().unwrap_or(0);
            }
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            match buf {
                b"AT+DISP=3\r" => {
                    self.streaming = true;
                    tracing::debug!("simulated sensor: streaming on");
                }
                b"AT+DISP=1\r" => {
                    self.streaming = false;
                    tracing::debug!("simulated sensor: streaming off");
                }
                [b'A', b'T', b'+', b'U', b'N', b'I', b'T', b'=', digit @ b'0'..=b'9', b'\r'] => {
                    self.unit = digit - b'0';
                    self.ack = Some(b"OK\r\n".to_vec());
                    tracing::debug!(unit = self.unit, "simulated sensor: step set");
                }
                other => {
                    tracing::debug!(?other, "simulated sensor: ignored command");
                }
            }
            Ok(())
        }
    }
}

// Re-exports for callers (CLI/tests) to pick the right backend easily.
#[cfg(not(feature = "hardware"))]
pub use sim::SimulatedSensor;

#[cfg(feature = "hardware")]
pub use serial::UsbTransport;
