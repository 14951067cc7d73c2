//! Decoder for the STL27L fixed-length frame protocol.
//!
//! Every frame starts with the two byte marker `0x54 0x2C` and is followed by a 45 byte payload:
//!
//! | offset | size | content                                   |
//! |--------|------|-------------------------------------------|
//! | 0      | 2    | rotation speed (unused)                   |
//! | 2      | 2    | start angle, little endian, 1/100 degree  |
//! | 4      | 36   | 12 × (distance lo, distance hi, intensity)|
//! | 40     | 2    | end angle, little endian, 1/100 degree    |
//! | 42     | 3    | timestamp and crc (unused)                |

use crate::PolarSample;
use crate::protocol::{DecodeError, read_fully};
use std::io::Read;

pub const SYNC: [u8; 2] = [0x54, 0x2C];
pub const PAYLOAD_LEN: usize = 45;
pub const SAMPLES_PER_FRAME: usize = 12;

/// Upper bound on bytes inspected while hunting for the frame marker before giving up with
/// `DecodeError::BadSync`, so a stream of garbage can't hold the caller forever.
const MAX_SYNC_SEARCH: usize = 4096;

/// The fields of one frame which carry range information, still in raw wire units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stl27lFrame {
    pub start_angle: u16,
    pub end_angle: u16,
    pub distances: [u16; SAMPLES_PER_FRAME],
}

impl Stl27lFrame {
    /// Extracts the angle and range fields from a payload (the 45 bytes after the marker).
    pub fn parse(payload: &[u8; PAYLOAD_LEN]) -> Self {
        let start_angle = u16::from_le_bytes([payload[2], payload[3]]);
        let end_angle = u16::from_le_bytes([payload[40], payload[41]]);

        let mut distances = [0u16; SAMPLES_PER_FRAME];
        for (i, d) in distances.iter_mut().enumerate() {
            let o = 4 + i * 3;
            *d = u16::from_le_bytes([payload[o], payload[o + 1]]);
        }

        Self {
            start_angle,
            end_angle,
            distances,
        }
    }

    /// Produces the 12 polar samples of the frame. Sample angles are spread linearly from the
    /// start angle toward the end angle, with the last sample landing on the end angle.
    pub fn samples(&self) -> [PolarSample; SAMPLES_PER_FRAME] {
        let start = self.start_angle as f64;
        let step = (self.end_angle as f64 - start) / (100.0 * (SAMPLES_PER_FRAME - 1) as f64);

        let mut samples = [PolarSample::new(0.0, 0.0); SAMPLES_PER_FRAME];
        for (j, s) in samples.iter_mut().enumerate() {
            *s = PolarSample::new(self.distances[j] as f64, start / 100.0 + step * j as f64);
        }
        samples
    }
}

/// Reads bytes until the frame marker is found, then reads and parses the payload that follows.
/// A marker split by a stray `0x54` (e.g. `54 54 2C`) is still recognized.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Stl27lFrame, DecodeError> {
    let mut byte = [0u8; 1];
    let mut previous_was_head = false;

    for _ in 0..MAX_SYNC_SEARCH {
        read_fully(reader, &mut byte)?;
        match (previous_was_head, byte[0]) {
            (true, b) if b == SYNC[1] => {
                let mut payload = [0u8; PAYLOAD_LEN];
                read_fully(reader, &mut payload)?;
                return Ok(Stl27lFrame::parse(&payload));
            }
            (_, b) => previous_was_head = b == SYNC[0],
        }
    }

    Err(DecodeError::BadSync)
}

/// Builds the bytes of a complete frame, marker included. Used by tests and by the mock
/// transport to replay synthetic sensor output.
pub fn encode_frame(frame: &Stl27lFrame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(SYNC.len() + PAYLOAD_LEN);
    bytes.extend_from_slice(&SYNC);

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[2..4].copy_from_slice(&frame.start_angle.to_le_bytes());
    for (i, d) in frame.distances.iter().enumerate() {
        let o = 4 + i * 3;
        payload[o..o + 2].copy_from_slice(&d.to_le_bytes());
        payload[o + 2] = 200;
    }
    payload[40..42].copy_from_slice(&frame.end_angle.to_le_bytes());

    bytes.extend_from_slice(&payload);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point2;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn sample_frame() -> Stl27lFrame {
        let mut distances = [0u16; SAMPLES_PER_FRAME];
        for (i, d) in distances.iter_mut().enumerate() {
            *d = 1000 + 100 * i as u16;
        }
        Stl27lFrame {
            start_angle: 1000,
            end_angle: 2100,
            distances,
        }
    }

    #[test]
    fn decodes_every_sample_of_a_frame() {
        let bytes = encode_frame(&sample_frame());
        let frame = read_frame(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(frame, sample_frame());

        // start 10.00°, end 21.00°, so each sample advances by exactly one degree
        for (j, s) in frame.samples().iter().enumerate() {
            let d = 1000.0 + 100.0 * j as f64;
            let a = (10.0 + j as f64).to_radians();
            assert_relative_eq!(s.angle, 10.0 + j as f64, epsilon = 1e-12);
            assert_relative_eq!(
                s.to_point(),
                Point2::new(d * a.sin(), d * a.cos()),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn resynchronizes_after_garbage() {
        let mut bytes = vec![0x00, 0x54, 0x11, 0x54, 0x54];
        bytes.extend(encode_frame(&sample_frame())[1..].iter());
        let frame = read_frame(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(frame.start_angle, 1000);
    }

    #[test]
    fn truncated_payload_is_a_short_read() {
        let bytes = encode_frame(&sample_frame());
        let err = read_frame(&mut Cursor::new(bytes[..20].to_vec())).unwrap_err();
        assert!(matches!(err, DecodeError::ShortRead { .. }));
    }

    #[test]
    fn endless_garbage_gives_up() {
        let bytes = vec![0x13u8; MAX_SYNC_SEARCH + 10];
        let err = read_frame(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, DecodeError::BadSync));
    }
}
