//! Fixed-size frames exchanged with the device.
//!
//! A frame is one header byte followed by a body whose length is one of four
//! length classes. There is no delimiter and no length prefix on the wire: the
//! receiver learns the body length from the two low bits of the header, so
//! both sides must agree on the class of every frame.
//!
//! ```text
//!   7     6   5     4   3      2        1   0
//! +-----+-------+--------+---------+--------+
//! | ver |  id   |endpoint| not ok  | length |   body[0] = code, body[1..] payload
//! +-----+-------+--------+---------+--------+
//! ```
//!
//! This module does no I/O.

use std::convert::TryFrom;
use std::fmt;

use crate::error::FrameError;

/// The exchange identifier used for every frame. Only one session is ever
/// open, so there is never a second logical stream to tell apart.
pub const EXCHANGE_ID: u8 = 2;

const VERSION_BIT: u8 = 0x80;
const NOT_OK_BIT: u8 = 0x04;

/// Body length of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LengthClass {
    Len1,
    Len4,
    Len32,
    Len128,
}
impl LengthClass {
    /// All classes, smallest first.
    pub const ALL: [LengthClass; 4] = [
        LengthClass::Len1,
        LengthClass::Len4,
        LengthClass::Len32,
        LengthClass::Len128,
    ];

    /// Number of body bytes, code byte included.
    pub fn byte_len(self) -> usize {
        match self {
            LengthClass::Len1 => 1,
            LengthClass::Len4 => 4,
            LengthClass::Len32 => 32,
            LengthClass::Len128 => 128,
        }
    }

    /// Number of payload bytes that fit after the code byte.
    pub fn payload_capacity(self) -> usize {
        self.byte_len() - 1
    }

    /// The smallest class whose body holds `body_len` bytes.
    pub fn smallest_for(body_len: usize) -> Option<LengthClass> {
        Self::ALL.iter().copied().find(|c| c.byte_len() >= body_len)
    }

    fn bits(self) -> u8 {
        match self {
            LengthClass::Len1 => 0,
            LengthClass::Len4 => 1,
            LengthClass::Len32 => 2,
            LengthClass::Len128 => 3,
        }
    }

    fn from_bits(bits: u8) -> LengthClass {
        match bits & 0x03 {
            0 => LengthClass::Len1,
            1 => LengthClass::Len4,
            2 => LengthClass::Len32,
            _ => LengthClass::Len128,
        }
    }
}
impl TryFrom<usize> for LengthClass {
    type Error = FrameError;

    fn try_from(byte_len: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.byte_len() == byte_len)
            .ok_or(FrameError::InvalidLengthClass(byte_len))
    }
}
impl fmt::Display for LengthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.byte_len())
    }
}

/// Destination of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    HardwareInterface,
    HardwareApplication,
    /// The device firmware, which handles app loading.
    Firmware,
    /// An app running on the device, only reachable after hand-off.
    App,
}
impl Endpoint {
    fn bits(self) -> u8 {
        match self {
            Endpoint::HardwareInterface => 0,
            Endpoint::HardwareApplication => 1,
            Endpoint::Firmware => 2,
            Endpoint::App => 3,
        }
    }

    fn from_bits(bits: u8) -> Endpoint {
        match bits & 0x03 {
            0 => Endpoint::HardwareInterface,
            1 => Endpoint::HardwareApplication,
            2 => Endpoint::Firmware,
            _ => Endpoint::App,
        }
    }
}

/// The decoded header byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u8,
    pub endpoint: Endpoint,
    /// Set by the device on a response it could not process.
    pub not_ok: bool,
    pub length: LengthClass,
}
impl FrameHeader {
    pub fn new(id: u8, endpoint: Endpoint, length: LengthClass) -> Self {
        FrameHeader {
            id,
            endpoint,
            not_ok: false,
            length,
        }
    }

    pub fn to_byte(&self) -> u8 {
        let not_ok = if self.not_ok { NOT_OK_BIT } else { 0 };
        ((self.id & 0x03) << 5) | (self.endpoint.bits() << 3) | not_ok | self.length.bits()
    }

    pub fn parse(byte: u8) -> Result<Self, FrameError> {
        if byte & VERSION_BIT != 0 {
            return Err(FrameError::BadVersion(byte));
        }
        Ok(FrameHeader {
            id: (byte >> 5) & 0x03,
            endpoint: Endpoint::from_bits(byte >> 3),
            not_ok: byte & NOT_OK_BIT != 0,
            length: LengthClass::from_bits(byte),
        })
    }
}

/// Allocate a zeroed frame for `length` with its header set. The caller fills
/// in the code byte at index 1 and the payload after it.
pub fn encode(id: u8, endpoint: Endpoint, length: LengthClass) -> Vec<u8> {
    let mut frame = vec![0; 1 + length.byte_len()];
    frame[0] = FrameHeader::new(id, endpoint, length).to_byte();
    frame
}

/// Split a received frame into its header and body, checking that it is what
/// the caller asked for.
pub fn decode(
    frame: &[u8],
    endpoint: Endpoint,
    length: LengthClass,
) -> Result<(FrameHeader, &[u8]), FrameError> {
    let expected = 1 + length.byte_len();
    if frame.len() != expected {
        return Err(FrameError::Truncated {
            expected,
            actual: frame.len(),
        });
    }

    let header = FrameHeader::parse(frame[0])?;
    if header.endpoint != endpoint {
        return Err(FrameError::UnexpectedEndpoint {
            expected: endpoint,
            actual: header.endpoint,
        });
    }
    if header.length != length {
        return Err(FrameError::UnexpectedLength {
            expected: length,
            actual: header.length,
        });
    }

    Ok((header, &frame[1..]))
}

// =============================================================================
// Unit Tests
// =============================================================================
