//! One command frame out, exactly one response frame back.
//!
//! The protocol has no per-frame identifier to pair a response with its
//! request, only strict alternation. The channel therefore never reads ahead,
//! never buffers a second frame and never treats silence as success.

use std::time::Duration;

use log::trace;

use crate::command::{Command, Response, STATUS_OK};
use crate::error::{FrameError, ProtocolError, Result};
use crate::frame::{self, Endpoint, LengthClass, EXCHANGE_ID};
use crate::observer::{NoopObserver, SessionEvent, SessionObserver};
use crate::transport::Transport;

/// Synchronous request/response channel to the device firmware.
pub struct CommandChannel<T: Transport> {
    transport: T,
    observer: Box<dyn SessionObserver>,
    /// Read timeout for the first exchange only, consumed by the first `send`.
    probe_timeout: Option<Duration>,
    /// The probe timeout is in effect and must be lifted after the next read.
    probing: bool,
}
impl<T: Transport> CommandChannel<T> {
    pub fn new(transport: T) -> Self {
        CommandChannel {
            transport,
            observer: Box::new(NoopObserver),
            probe_timeout: None,
            probing: false,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fail the first exchange if the device does not answer within `timeout`.
    /// Every later read blocks.
    pub fn with_probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn observer(&self) -> &dyn SessionObserver {
        self.observer.as_ref()
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Encode and write one command frame of the given length class. A payload
    /// shorter than the class is zero padded.
    pub fn send(&mut self, command: Command, class: LengthClass, payload: &[u8]) -> Result<()> {
        let capacity = class.payload_capacity();
        if payload.len() > capacity {
            return Err(FrameError::PayloadTooLarge {
                capacity,
                actual: payload.len(),
            }
            .into());
        }

        let mut tx = frame::encode(EXCHANGE_ID, Endpoint::Firmware, class);
        tx[1] = command.code();
        tx[2..2 + payload.len()].copy_from_slice(payload);

        if let Some(timeout) = self.probe_timeout.take() {
            trace!("probe timeout {:?}", timeout);
            self.transport.set_read_timeout(Some(timeout))?;
            self.probing = true;
        }

        self.observer.notify(&SessionEvent::FrameSent {
            command,
            frame: &tx,
        });
        self.transport.write(&tx)?;
        Ok(())
    }

    /// Read one response frame and check that it answers the command just sent.
    /// Returns the body after the code byte, and after the status byte for
    /// responses that carry one.
    pub fn receive(&mut self, expected: Response, class: LengthClass) -> Result<Vec<u8>> {
        let read = self.transport.read_exactly(1 + class.byte_len());
        if self.probing {
            self.probing = false;
            self.transport.set_read_timeout(None)?;
        }
        let rx = read?;

        self.observer.notify(&SessionEvent::FrameReceived {
            response: expected,
            frame: &rx,
        });

        let command = expected.command();
        let (header, body) = frame::decode(&rx, Endpoint::Firmware, class)?;

        if body[0] != expected.code() {
            return Err(ProtocolError::UnexpectedResponse {
                command,
                expected,
                actual: body[0],
            }
            .into());
        }
        if header.not_ok {
            return Err(ProtocolError::NotOk { command }.into());
        }
        if expected.has_status() {
            let status = *body.get(1).ok_or(FrameError::Truncated {
                expected: 2,
                actual: body.len(),
            })?;
            if status != STATUS_OK {
                return Err(ProtocolError::Rejected { command, status }.into());
            }
            return Ok(body[2..].to_vec());
        }

        Ok(body[1..].to_vec())
    }

    /// Send `command` in its usual length class and wait for its response.
    pub fn exchange(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>> {
        self.exchange_with_class(command, command.length_class(), payload)
    }

    /// Like [`exchange`](Self::exchange) with an explicit command length class.
    pub fn exchange_with_class(
        &mut self,
        command: Command,
        class: LengthClass,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        self.send(command, class, payload)?;
        let response = command.response();
        self.receive(response, response.length_class())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
