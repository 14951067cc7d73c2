//! Decoder and command framing for the A2M8 express scan protocol.
//!
//! An express scan packet is 84 bytes with no marker the decoder relies on. Bytes 2 and 3 hold
//! the packet's start angle as a 15 bit value in 1/64 degree, and bytes 4..84 hold sixteen 5 byte
//! "cabins", each carrying two range readings:
//!
//! ```text
//!  byte  0: d1[5:0] << 2 | sign1 << 1 | dθ1[4]
//!  byte  1: d1[13:6]
//!  byte  2: d2[5:0] << 2 | sign2 << 1 | dθ2[4]
//!  byte  3: d2[13:6]
//!  byte  4: dθ2[3:0] << 4 | dθ1[3:0]
//! ```
//!
//! The angle correction dθ is a 5 bit value in 1/8 degree. Absolute sample angles are
//! interpolated between the previous packet's start angle and this packet's start angle, so the
//! decoder carries the previous start angle from one packet to the next.
//!
//! Device control uses a separate request framing: `A5 cmd` for bare commands, and
//! `A5 cmd len payload xor` for commands which carry a payload.

use crate::PolarSample;
use crate::protocol::{DecodeError, read_fully, xor_checksum};
use std::io::Read;

pub const PACKET_LEN: usize = 84;
pub const CABIN_COUNT: usize = 16;
pub const SAMPLES_PER_PACKET: usize = CABIN_COUNT * 2;
pub const DESCRIPTOR_LEN: usize = 7;

/// Mounting offset between the sensor's zero bearing and the rig's forward axis, in degrees.
/// This is a calibration constant of the physical installation.
pub const MOUNT_OFFSET_DEG: f64 = 24.0;

const REQUEST_SYNC: u8 = 0xA5;
const RESPONSE_SYNC: [u8; 2] = [0xA5, 0x5A];

/// Selects the sign of an angle correction from its sign bit.
const SIGN: [f64; 2] = [1.0, -1.0];

/// Requests understood by the A2M8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Stop,
    SetMotorPwm(u16),
    ExpressScan,
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::Reset => 0x40,
            Command::Stop => 0x25,
            Command::SetMotorPwm(_) => 0xF0,
            Command::ExpressScan => 0x82,
        }
    }

    fn payload(&self) -> Option<Vec<u8>> {
        match self {
            Command::Reset | Command::Stop => None,
            Command::SetMotorPwm(pwm) => Some(pwm.to_le_bytes().to_vec()),
            Command::ExpressScan => Some(vec![0u8; 5]),
        }
    }

    /// Serializes the request. Bare commands are just the sync byte and the command code, while
    /// commands with a payload get a length byte and a trailing XOR checksum over every byte
    /// before it.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![REQUEST_SYNC, self.code()];
        if let Some(payload) = self.payload() {
            bytes.push(payload.len() as u8);
            bytes.extend_from_slice(&payload);
            bytes.push(xor_checksum(&bytes));
        }
        bytes
    }
}

/// The header the device sends in answer to a request which produces data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub length: u32,
    pub send_mode: u8,
    pub data_type: u8,
}

impl ResponseDescriptor {
    pub fn parse(bytes: &[u8; DESCRIPTOR_LEN]) -> Result<Self, DecodeError> {
        if bytes[..2] != RESPONSE_SYNC {
            return Err(DecodeError::BadSync);
        }
        let word = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Ok(Self {
            length: word & 0x3FFF_FFFF,
            send_mode: (word >> 30) as u8,
            data_type: bytes[6],
        })
    }

    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; DESCRIPTOR_LEN];
        read_fully(reader, &mut bytes)?;
        Self::parse(&bytes)
    }
}

/// A single range reading before its absolute angle has been resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cabin {
    pub distance: u16,
    pub angle_delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressPacket {
    pub start_angle: f64,
    pub cabins: [Cabin; SAMPLES_PER_PACKET],
}

impl ExpressPacket {
    pub fn parse(bytes: &[u8; PACKET_LEN]) -> Self {
        let start_angle = (bytes[2] as u16 + (((bytes[3] & 0x7F) as u16) << 8)) as f64 / 64.0;

        let mut cabins = [Cabin {
            distance: 0,
            angle_delta: 0.0,
        }; SAMPLES_PER_PACKET];

        for g in 0..CABIN_COUNT {
            let i = 4 + g * 5;
            let deltas = bytes[i + 4];
            cabins[g * 2] = decode_cabin(bytes[i], bytes[i + 1], deltas & 0x0F);
            cabins[g * 2 + 1] = decode_cabin(bytes[i + 2], bytes[i + 3], deltas >> 4);
        }

        Self {
            start_angle,
            cabins,
        }
    }

    /// Checks the sync nibbles in bytes 0 and 1 and the XOR checksum over the payload which they
    /// also carry. The stock decoding path does not require this.
    pub fn validate(bytes: &[u8; PACKET_LEN]) -> Result<(), DecodeError> {
        if bytes[0] >> 4 != 0xA || bytes[1] >> 4 != 0x5 {
            return Err(DecodeError::BadSync);
        }
        let expected = (bytes[0] & 0x0F) | ((bytes[1] & 0x0F) << 4);
        let actual = xor_checksum(&bytes[2..]);
        if expected != actual {
            return Err(DecodeError::Checksum { expected, actual });
        }
        Ok(())
    }
}

fn decode_cabin(lo: u8, hi: u8, delta_lo: u8) -> Cabin {
    let distance = (lo >> 2) as u16 + ((hi as u16) << 6);
    let magnitude = (delta_lo as u16 + (((lo & 0b01) as u16) << 4)) as f64 / 8.0;
    Cabin {
        distance,
        angle_delta: magnitude * SIGN[((lo & 0b10) >> 1) as usize],
    }
}

/// Reads one packet. Packets of the wrong length are reported as short reads, and when
/// `verify` is set a packet failing the sync/checksum test is rejected.
pub fn read_packet<R: Read + ?Sized>(
    reader: &mut R,
    verify: bool,
) -> Result<ExpressPacket, DecodeError> {
    let mut bytes = [0u8; PACKET_LEN];
    read_fully(reader, &mut bytes)?;
    if verify {
        ExpressPacket::validate(&bytes)?;
    }
    Ok(ExpressPacket::parse(&bytes))
}

/// Resolves absolute angles for the samples of consecutive express packets.
#[derive(Debug, Clone, Default)]
pub struct A2m8Decoder {
    previous_start_angle: f64,
}

impl A2m8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_start_angle(&self) -> f64 {
        self.previous_start_angle
    }

    /// Converts the cabins of `packet` into polar samples. The i-th sample (1 based) lies
    /// i/32 of the way from the previous packet's start angle to this one's, less its angle
    /// correction, wrapped to [0, 360) and then shifted by the mount offset.
    pub fn decode(&mut self, packet: &ExpressPacket) -> Vec<PolarSample> {
        let previous = self.previous_start_angle;
        let span = (packet.start_angle - previous).rem_euclid(360.0);

        let samples = packet
            .cabins
            .iter()
            .enumerate()
            .map(|(k, c)| {
                let j = (k + 1) as f64;
                let angle = (previous + span / SAMPLES_PER_PACKET as f64 * j - c.angle_delta)
                    .rem_euclid(360.0)
                    + MOUNT_OFFSET_DEG;
                PolarSample::new(c.distance as f64, angle)
            })
            .collect();

        self.previous_start_angle = packet.start_angle;
        samples
    }

    pub fn reset(&mut self) {
        self.previous_start_angle = 0.0;
    }
}

/// Builds the bytes of a packet from a start angle (1/64 degree units) and 32 raw
/// `(distance, signed angle correction in 1/8 degree)` readings, filling in valid sync nibbles
/// and checksum.
pub fn encode_packet(start_angle_q6: u16, readings: &[(u16, i8); SAMPLES_PER_PACKET]) -> Vec<u8> {
    let mut bytes = vec![0u8; PACKET_LEN];
    bytes[2] = (start_angle_q6 & 0xFF) as u8;
    bytes[3] = ((start_angle_q6 >> 8) & 0x7F) as u8;

    let encode = |(d, a): (u16, i8)| -> (u8, u8, u8) {
        let sign = if a < 0 { 0b10 } else { 0 };
        let m = a.unsigned_abs() & 0x1F;
        let lo = (((d & 0x3F) as u8) << 2) | sign | (m >> 4);
        let hi = (d >> 6) as u8;
        (lo, hi, m & 0x0F)
    };

    for g in 0..CABIN_COUNT {
        let i = 4 + g * 5;
        let (lo1, hi1, n1) = encode(readings[g * 2]);
        let (lo2, hi2, n2) = encode(readings[g * 2 + 1]);
        bytes[i] = lo1;
        bytes[i + 1] = hi1;
        bytes[i + 2] = lo2;
        bytes[i + 3] = hi2;
        bytes[i + 4] = (n2 << 4) | n1;
    }

    let checksum = xor_checksum(&bytes[2..]);
    bytes[0] = 0xA0 | (checksum & 0x0F);
    bytes[1] = 0x50 | (checksum >> 4);
    bytes
}
