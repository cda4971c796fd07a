//! The byte stream to the device.
//!
//! The protocol only needs three primitives from the link: write a buffer,
//! read exactly `n` bytes, and bound how long a read may block. [`Transport`]
//! captures them so the protocol can run over the serial port as well as over a
//! simulated device in tests.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::error::TransportError;
use crate::settings::Settings;

/// Stand-in for "no timeout": `serialport` always needs a finite one, and some
/// platforms keep it in a signed 32-bit count of milliseconds.
const BLOCKING_READ_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// A duplex byte stream owned by exactly one session.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block until exactly `n` bytes are read or the read timeout elapses.
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    /// Bound how long reads may block. `None` blocks until data arrives.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError>;
}

/// The serial connection to the device. The port is closed when this value is
/// dropped.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}
impl SerialTransport {
    /// Open the port at `settings.path` and configure it.
    pub fn open(settings: &Settings) -> Result<Self, TransportError> {
        let path = settings.path.as_ref().ok_or(TransportError::NoPath)?;

        let port = serialport::new(path, settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control)
            .timeout(BLOCKING_READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        info!("Connected to {} at {} baud", path, settings.baud_rate);
        debug!("data_bits    : {:#?}", settings.data_bits);
        debug!("stop_bits    : {:#?}", settings.stop_bits);
        debug!("parity       : {:#?}", settings.parity);
        debug!("flow control : {:#?}", settings.flow_control);

        Ok(SerialTransport { port })
    }
}
impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0; n];
        match self.port.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                Err(TransportError::Timeout { expected: n })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.port
            .set_timeout(timeout.unwrap_or(BLOCKING_READ_TIMEOUT))?;
        Ok(())
    }
}

/// Lets a session run over a borrowed transport, e.g. a simulated device that
/// the caller wants to inspect afterwards.
impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read_exactly(n)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        (**self).set_read_timeout(timeout)
    }
}
