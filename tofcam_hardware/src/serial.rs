//! USB serial link to the real camera.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;
use tofcam_traits::Transport;

use crate::error::HwError;

const BAUD: u32 = 115_200;
const OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Serial transport over the camera's USB CDC port (8-N-1; the baud rate is
/// nominal, the link runs at USB speed).
pub struct UsbTransport {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the camera at an explicit device path, e.g. `/dev/ttyUSB0` on
    /// Linux or `COM3` on Windows.
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(OPEN_TIMEOUT)
            .open()
            .with_context(|| format!("open ToF camera at {path}"))?;
        tracing::info!(path, "serial transport opened");
        Ok(Self {
            port,
            timeout: OPEN_TIMEOUT,
        })
    }
}

impl Transport for UsbTransport {
    fn read(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        if timeout != self.timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    Box::new(HwError::Serial(e.to_string()))
                })?;
            self.timeout = timeout;
        }
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // A timed-out read is "no bytes yet", not a fault.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .write_all(buf)
            .and_then(|()| self.port.flush())
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(HwError::Io(e)) })
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Dropping the port releases it; nothing device-specific to do.
        Ok(())
    }
}
