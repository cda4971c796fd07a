//! Helpers for the edges of `tkload`: picking the serial port and reading the
//! user-supplied secret. Nothing in here speaks the device protocol.

mod ports;
mod secret;

pub use ports::select_port;
pub use secret::{input_secret, read_secret_file};
