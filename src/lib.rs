//! `tkload` uploads an app to a security token over its serial connection,
//! verifies that the device received exactly what was sent, and starts it.
//!
//! The device firmware speaks a small request/response protocol made of
//! fixed-size frames: one header byte followed by a body of 1, 4, 32 or 128
//! bytes. Loading an app goes through a fixed sequence of firmware commands:
//!
//! * declare the app size (optionally with the digest of a user-supplied
//!   secret),
//! * stream the app in chunks of up to 127 bytes, the last one zero padded,
//! * fetch the BLAKE2s-256 digest the device computed over what it received
//!   and compare it with the digest of the app on the host,
//! * and only when both match, tell the firmware to run the app.
//!
//! The layers are kept apart: [`frame`] encodes and decodes frames and does no
//! I/O, [`Transport`] is the byte stream, [`CommandChannel`] pairs each command
//! with exactly one response, and the app loader drives the channel one step
//! at a time.
//!
//! The app loader is implemented as a state machine with the following
//! characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Transitions between states are triggered via typed **events** and only
//!   explicitly defined transitions are permitted. A transition is a `From`
//!   implementation converting an `event` into the next `state`, so a
//!   transition that was not defined is a compile-time error.
//! * Transitioning from one state to another consumes the original state.
//! * Any error moves the machine to a terminal `Failed` state. There is no
//!   retry and no resumption; loading again starts over from the size
//!   declaration.
//!
//! Progress is reported through an injected [`SessionObserver`] rather than a
//! global logger. The default observer discards everything.

pub mod app_loader;
mod channel;
mod command;
mod digest;
mod error;
pub mod frame;
mod observer;
mod session;
mod settings;
mod transport;
pub mod utils;

pub use app_loader::{AppLoader, MAX_APP_SIZE};
pub use channel::CommandChannel;
pub use command::{Command, NameVersion, Response, STATUS_BAD, STATUS_OK};
pub use digest::{Digest, DIGEST_LEN};
pub use error::{Error, FrameError, LoadError, ProtocolError, SizeError, Step, TransportError};
pub use observer::{LogObserver, NoopObserver, ProgressObserver, SessionEvent, SessionObserver};
pub use session::Session;
pub use settings::{Settings, SettingsBuilder};
pub use transport::{SerialTransport, Transport};
