pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Full-duplex byte link to the sensor (USB serial in production).
///
/// The device end is 8-N-1 at 115200 baud, but implementations only need the
/// byte-stream semantics below:
///
/// - `read` blocks up to `timeout` and returns whatever bytes are available;
///   `Ok(0)` means the timeout expired with nothing received.
/// - `write` pushes the whole buffer (device commands are 10 ASCII bytes).
/// - `close` releases the device; dropping the transport must do the same.
pub trait Transport {
    fn read(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(buf)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).close()
    }
}
