//! Packet framing over the raw byte stream.
//!
//! The sensor interleaves 10 018-byte binary image packets with short ASCII
//! acknowledgements of `AT+` commands. The framer scans for the four-byte
//! packet prefix `00 FF 20 27` (sync word plus little-endian length 10 016),
//! then reads the rest of the packet. Any bytes discarded before the prefix
//! are reported to the caller: after startup they can only be a command
//! acknowledgement, which the driver uses to commit a pending step change.

use std::time::Duration;

use tofcam_traits::{Clock, Transport};

use crate::error::CamError;
use crate::{RawImage, FRAME_PIXELS, PACKET_LEN, PAYLOAD_OFFSET};

/// Sync word plus packet length (10 016, little-endian).
const PREFIX: [u8; 4] = [0x00, 0xFF, 0x20, 0x27];

/// Stray-byte search budget before the stream is declared lost.
pub const SYNC_BUDGET: usize = 20_000;

/// Pause between short reads while a packet body accumulates.
const ACCUMULATE: Duration = Duration::from_micros(17_500);

/// Outcome of a successful prefix search.
#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    /// Candidate start positions consumed before the prefix matched; zero
    /// when the prefix was the very next thing on the wire.
    pub skipped: usize,
}

pub struct Framer {
    pkt: Box<[u8; PACKET_LEN]>,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            pkt: Box::new([0u8; PACKET_LEN]),
        }
    }

    /// Scan forward to the next packet prefix.
    ///
    /// A read timeout or an exhausted search budget means the stream is gone;
    /// there is no recovery at this layer.
    pub fn sync<T: Transport>(
        &mut self,
        link: &mut T,
        timeout: Duration,
    ) -> Result<SyncReport, CamError> {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            if attempts > SYNC_BUDGET {
                return Err(CamError::StreamLost("no packet prefix within budget"));
            }
            if read_byte(link, timeout)? != PREFIX[0] {
                continue;
            }
            if read_byte(link, timeout)? != PREFIX[1] {
                continue;
            }
            if read_byte(link, timeout)? != PREFIX[2] {
                continue;
            }
            if read_byte(link, timeout)? == PREFIX[3] {
                break;
            }
        }
        self.pkt[..4].copy_from_slice(&PREFIX);
        Ok(SyncReport {
            skipped: attempts - 1,
        })
    }

    /// Read the remainder of the packet located by [`Framer::sync`].
    ///
    /// Bytes arrive in bursts much smaller than a packet; between short reads
    /// the worker naps briefly so the transport can accumulate more.
    pub fn fill<T: Transport, C: Clock + ?Sized>(
        &mut self,
        link: &mut T,
        timeout: Duration,
        clock: &C,
    ) -> Result<(), CamError> {
        let mut n = PREFIX.len();
        while n < PACKET_LEN {
            let rc = link
                .read(&mut self.pkt[n..], timeout)
                .map_err(|e| CamError::Io(e.to_string()))?;
            if rc == 0 {
                return Err(CamError::StreamLost("timed out inside a packet"));
            }
            n += rc;
            if n < PACKET_LEN {
                clock.sleep(ACCUMULATE);
            }
        }
        Ok(())
    }

    /// The 10 000 pixel bytes of the last completed packet.
    pub fn payload(&self) -> &RawImage {
        let bytes = &self.pkt[PAYLOAD_OFFSET..PAYLOAD_OFFSET + FRAME_PIXELS];
        match bytes.try_into() {
            Ok(arr) => arr,
            Err(_) => unreachable!("payload slice length is fixed"),
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn read_byte<T: Transport>(link: &mut T, timeout: Duration) -> Result<u8, CamError> {
    let mut b = [0u8; 1];
    match link.read(&mut b, timeout) {
        Ok(0) => Err(CamError::StreamLost("read timed out between packets")),
        Ok(_) => Ok(b[0]),
        Err(e) => Err(CamError::Io(e.to_string())),
    }
}
