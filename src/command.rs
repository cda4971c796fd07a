//! Firmware commands and their responses.
//!
//! Every command has exactly one response. The code of a response is always
//! the code of its command plus one.

use std::convert::TryInto;
use std::fmt;

use crate::frame::LengthClass;

/// Status byte of an accepted operation.
pub const STATUS_OK: u8 = 0x00;
/// Status byte of a rejected operation.
pub const STATUS_BAD: u8 = 0x01;

/// Commands understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetNameVersion,
    LoadAppSize,
    LoadAppData,
    RunApp,
    GetAppDigest,
}
impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::GetNameVersion => 0x01,
            Command::LoadAppSize => 0x03,
            Command::LoadAppData => 0x05,
            Command::RunApp => 0x07,
            Command::GetAppDigest => 0x09,
        }
    }

    /// The response the firmware sends back for this command.
    pub fn response(self) -> Response {
        match self {
            Command::GetNameVersion => Response::GetNameVersion,
            Command::LoadAppSize => Response::LoadAppSize,
            Command::LoadAppData => Response::LoadAppData,
            Command::RunApp => Response::RunApp,
            Command::GetAppDigest => Response::GetAppDigest,
        }
    }

    /// The length class used for this command when the caller has no reason to
    /// pick another one. `LoadAppSize` grows to `Len128` when it also carries a
    /// user-supplied secret.
    pub fn length_class(self) -> LengthClass {
        match self {
            Command::GetNameVersion => LengthClass::Len1,
            Command::LoadAppSize => LengthClass::Len32,
            Command::LoadAppData => LengthClass::Len128,
            Command::RunApp => LengthClass::Len1,
            Command::GetAppDigest => LengthClass::Len1,
        }
    }

    pub fn from_code(code: u8) -> Option<Command> {
        match code {
            0x01 => Some(Command::GetNameVersion),
            0x03 => Some(Command::LoadAppSize),
            0x05 => Some(Command::LoadAppData),
            0x07 => Some(Command::RunApp),
            0x09 => Some(Command::GetAppDigest),
            _ => None,
        }
    }
}

/// Responses sent by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    GetNameVersion,
    LoadAppSize,
    LoadAppData,
    RunApp,
    GetAppDigest,
}
impl Response {
    pub fn code(self) -> u8 {
        match self {
            Response::GetNameVersion => 0x02,
            Response::LoadAppSize => 0x04,
            Response::LoadAppData => 0x06,
            Response::RunApp => 0x08,
            Response::GetAppDigest => 0x0a,
        }
    }

    /// The command this is the response to.
    pub fn command(self) -> Command {
        match self {
            Response::GetNameVersion => Command::GetNameVersion,
            Response::LoadAppSize => Command::LoadAppSize,
            Response::LoadAppData => Command::LoadAppData,
            Response::RunApp => Command::RunApp,
            Response::GetAppDigest => Command::GetAppDigest,
        }
    }

    pub fn length_class(self) -> LengthClass {
        match self {
            Response::GetNameVersion => LengthClass::Len32,
            Response::LoadAppSize => LengthClass::Len4,
            Response::LoadAppData => LengthClass::Len4,
            Response::RunApp => LengthClass::Len4,
            Response::GetAppDigest => LengthClass::Len128,
        }
    }

    /// Whether the byte after the code is an accept/reject status.
    pub fn has_status(self) -> bool {
        matches!(
            self,
            Response::LoadAppSize | Response::LoadAppData | Response::RunApp
        )
    }
}

/// Name and version reported by the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameVersion {
    pub name0: String,
    pub name1: String,
    pub version: u32,
}
impl NameVersion {
    /// Number of payload bytes needed to unpack a `NameVersion`.
    pub const PACKED_LEN: usize = 12;

    /// Unpack from a response payload. Both names are stored byte-reversed.
    /// Returns `None` when `raw` is too short.
    pub fn unpack(raw: &[u8]) -> Option<NameVersion> {
        if raw.len() < Self::PACKED_LEN {
            return None;
        }
        let name = |field: &[u8]| field.iter().rev().map(|b| *b as char).collect::<String>();
        Some(NameVersion {
            name0: name(&raw[0..4]),
            name1: name(&raw[4..8]),
            version: u32::from_le_bytes(raw[8..12].try_into().ok()?),
        })
    }
}
impl fmt::Display for NameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name0:{} name1:{} version:{}",
            self.name0, self.name1, self.version
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Command; 5] = [
        Command::GetNameVersion,
        Command::LoadAppSize,
        Command::LoadAppData,
        Command::RunApp,
        Command::GetAppDigest,
    ];

    #[test]
    fn response_code_follows_command_code() {
        for cmd in ALL.iter() {
            assert_eq!(cmd.response().code(), cmd.code() + 1, "{:?}", cmd);
            assert_eq!(cmd.response().command(), *cmd);
            assert_eq!(Command::from_code(cmd.code()), Some(*cmd));
        }
    }

    #[test]
    fn status_responses() {
        assert!(!Response::GetNameVersion.has_status());
        assert!(Response::LoadAppSize.has_status());
        assert!(Response::LoadAppData.has_status());
        assert!(!Response::GetAppDigest.has_status());
        assert!(Response::RunApp.has_status());
    }

    #[test]
    fn digest_fits_its_response() {
        assert!(Response::GetAppDigest.length_class().payload_capacity() >= 32);
    }

    #[test]
    fn unpack_name_version() {
        let mut raw = b"fdkmngis".to_vec();
        raw.extend_from_slice(&4u32.to_le_bytes());
        let nv = NameVersion::unpack(&raw).unwrap();
        assert_eq!(nv.name0, "mkdf");
        assert_eq!(nv.name1, "sign");
        assert_eq!(nv.version, 4);
        assert_eq!(nv.to_string(), "name0:mkdf name1:sign version:4");
    }

    #[test]
    fn unpack_short_payload() {
        assert_eq!(NameVersion::unpack(&[0; 11]), None);
    }
}
