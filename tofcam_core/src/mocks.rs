//! Test doubles for the byte transport, plus wire-format helpers.
//!
//! Used by this crate's tests, the fuzz targets, and downstream crates that
//! want to exercise the full pipeline without a camera attached.

use std::time::Duration;

use crossbeam_channel as xch;
use tofcam_traits::Transport;

use crate::{RawImage, FRAME_PIXELS, PACKET_LEN};

/// Build one well-formed wire packet around a 10 000-byte pixel payload:
/// sync word, little-endian length 10 016, 12 opaque header bytes, pixels,
/// and a 2-byte trailer.
pub fn wire_packet(pixels: &RawImage) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(PACKET_LEN);
    pkt.extend_from_slice(&[0x00, 0xFF, 0x20, 0x27]);
    pkt.extend_from_slice(&[0u8; 12]);
    pkt.extend_from_slice(pixels);
    pkt.extend_from_slice(&[0u8; 2]);
    pkt
}

/// A full frame of one constant pixel value.
pub fn flat_frame(v: u8) -> Box<RawImage> {
    Box::new([v; FRAME_PIXELS])
}

/// Transport that replays a preloaded byte script and records every write.
///
/// Reads return at most `chunk` bytes at a time (the default hands over as
/// much as the caller asks for). Once the script runs dry, reads behave like
/// a dead line: `Ok(0)`, i.e. a timeout.
pub struct ScriptedTransport {
    script: Vec<u8>,
    pos: usize,
    chunk: usize,
    pub writes: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<u8>) -> Self {
        Self {
            script,
            pos: 0,
            chunk: usize::MAX,
            writes: Vec::new(),
        }
    }

    /// Same, but deliver reads in bursts of at most `chunk` bytes, the way a
    /// UART would.
    pub fn chunked(script: Vec<u8>, chunk: usize) -> Self {
        Self {
            chunk: chunk.max(1),
            ..Self::new(script)
        }
    }
}

impl Transport for ScriptedTransport {
    fn read(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let left = self.script.len() - self.pos;
        if left == 0 {
            return Ok(0);
        }
        let n = buf.len().min(self.chunk).min(left);
        buf[..n].copy_from_slice(&self.script[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.writes.push(buf.to_vec());
        Ok(())
    }
}

/// Far end of a [`ChannelTransport`]: feed byte chunks in, observe commands
/// written by the driver.
pub struct TransportHarness {
    pub bytes: xch::Sender<Vec<u8>>,
    pub commands: xch::Receiver<Vec<u8>>,
}

impl TransportHarness {
    /// Queue one whole wire packet for the driver to read.
    pub fn send_packet(&self, pixels: &RawImage) {
        let _ = self.bytes.send(wire_packet(pixels));
    }
}

/// Transport fed from a channel, modelling the blocking serial read: a read
/// with nothing pending parks on `recv_timeout`, and a disconnected feeder
/// looks exactly like a dead line.
pub struct ChannelTransport {
    rx: xch::Receiver<Vec<u8>>,
    tx: xch::Sender<Vec<u8>>,
    pending: Vec<u8>,
    off: usize,
}

/// Create a connected [`ChannelTransport`] / [`TransportHarness`] pair.
pub fn channel_transport() -> (ChannelTransport, TransportHarness) {
    let (bytes_tx, bytes_rx) = xch::unbounded();
    let (cmd_tx, cmd_rx) = xch::unbounded();
    (
        ChannelTransport {
            rx: bytes_rx,
            tx: cmd_tx,
            pending: Vec::new(),
            off: 0,
        },
        TransportHarness {
            bytes: bytes_tx,
            commands: cmd_rx,
        },
    )
}

impl Transport for ChannelTransport {
    fn read(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        if self.off >= self.pending.len() {
            match self.rx.recv_timeout(timeout) {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.off = 0;
                }
                // Timeout and hang-up both read as "no bytes arrived".
                Err(_) => return Ok(0),
            }
        }
        let left = self.pending.len() - self.off;
        let n = buf.len().min(left);
        buf[..n].copy_from_slice(&self.pending[self.off..self.off + n]);
        self.off += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = self.tx.send(buf.to_vec());
        Ok(())
    }
}
