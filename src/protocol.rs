//! Wire protocols of the two supported rotating lidars.
//!
//! Both decoders are free of I/O policy: they read from anything implementing `std::io::Read` and
//! report frame-level faults as a `DecodeError`. Callers decide whether a fault is recoverable
//! with `DecodeError::is_fatal`, and resynchronize on the next frame when it is not.

pub mod a2m8;
pub mod stl27l;

use std::io::{ErrorKind, Read};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The byte source stopped delivering before a complete frame was read
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    /// No frame marker was found where one was required
    #[error("frame sync not found")]
    BadSync,

    /// Frame integrity check failed
    #[error("checksum error: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// The underlying byte source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Short reads, lost sync and bad checksums only cost the current frame. Anything reported by
    /// the byte source itself means the link is gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::Io(_))
    }
}

/// Fills `buffer` from `reader`, treating a timeout or end of stream as a short read rather than
/// an I/O failure.
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> Result<(), DecodeError> {
    let mut offset = 0;
    while offset < buffer.len() {
        match reader.read(&mut buffer[offset..]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => return Err(e.into()),
        }
    }

    if offset < buffer.len() {
        Err(DecodeError::ShortRead {
            expected: buffer.len(),
            got: offset,
        })
    } else {
        Ok(())
    }
}

/// XOR of every byte in `bytes`, the checksum used by the A2M8 command and packet framing.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}
