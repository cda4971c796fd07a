//! Error types for the `tkload` protocol stack.
//!
//! Each layer has its own error kind. They all fold into [`Error`], and the app
//! loader state machine wraps the one that aborted a session in a
//! [`LoadError`] naming the step at which it happened.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::command::{Command, Response};
use crate::digest::Digest;
use crate::frame::{Endpoint, LengthClass};

/// Failures at the byte-stream level.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The serial port could not be opened or configured.
    #[error("could not open `{path}`: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// No port path was configured.
    #[error("no serial port path was provided")]
    NoPath,

    /// The device did not answer within the read timeout.
    #[error("timed out waiting for {expected} bytes from the device")]
    Timeout { expected: usize },

    /// Any other read or write failure, including a closed connection.
    #[error("i/o error on the serial connection: {0}")]
    Io(#[from] io::Error),

    /// A port setting was refused by the driver.
    #[error("serial port configuration failed: {0}")]
    Config(#[from] serialport::Error),
}

/// A frame that does not have the shape the caller expected. Accepting it would
/// desynchronize every read that follows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A body length that is not one of the four length classes.
    #[error("invalid length class: {0} bytes")]
    InvalidLengthClass(usize),

    /// The buffer does not hold exactly one header and one body.
    #[error("frame has {actual} bytes, expected {expected}")]
    Truncated { expected: usize, actual: usize },

    /// The protocol version bit of the header is set.
    #[error("unsupported protocol version in header 0x{0:02x}")]
    BadVersion(u8),

    #[error("frame for endpoint {actual:?}, expected {expected:?}")]
    UnexpectedEndpoint { expected: Endpoint, actual: Endpoint },

    #[error("frame of length class {actual}, expected {expected}")]
    UnexpectedLength {
        expected: LengthClass,
        actual: LengthClass,
    },

    /// The payload does not fit in the body of the requested length class.
    #[error("payload of {actual} bytes does not fit in {capacity} bytes")]
    PayloadTooLarge { capacity: usize, actual: usize },
}

/// The device answered, but not with what the command just sent called for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("expected {expected:?} (0x{:02x}) in reply to {command:?}, got 0x{actual:02x}", .expected.code())]
    UnexpectedResponse {
        command: Command,
        expected: Response,
        actual: u8,
    },

    /// The status byte of the response was BAD.
    #[error("device rejected {command:?} with status 0x{status:02x}")]
    Rejected { command: Command, status: u8 },

    /// The response header carried the not-OK flag.
    #[error("device flagged the response to {command:?} as not OK")]
    NotOk { command: Command },
}

/// Size constraints on the app binary and on the transfer accounting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("app binary is empty")]
    Empty,

    #[error("app binary is {size} bytes, the maximum is {max}")]
    TooLarge { size: usize, max: usize },

    /// More bytes were accounted for than were declared. This is a chunking bug
    /// on the host side, never a device problem.
    #[error("transferred {offset} bytes of a {size} bytes app")]
    Overrun { offset: usize, size: usize },
}

/// Any error that can abort a session.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Size(#[from] SizeError),

    /// Host and device disagree on the digest of the uploaded app.
    #[error("digest mismatch: host {host}, device {device}")]
    Verification { host: Digest, device: Digest },

    /// The app file could not be read.
    #[error("could not read `{path}`: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// The step of the app loading sequence at which a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DeclareSize,
    Transfer,
    Digest,
    Run,
}
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::DeclareSize => "declare size",
            Step::Transfer => "transfer",
            Step::Digest => "digest",
            Step::Run => "run",
        };
        f.write_str(name)
    }
}

/// A failed app loading session.
#[derive(Error, Debug)]
#[error("{step} step failed: {source}")]
pub struct LoadError {
    pub step: Step,
    #[source]
    pub source: Error,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
