//! A connection to the device firmware.
//!
//! **Example** - Identify the firmware, then load and start an app:
//! ```no_run
//! use tkload::{LogObserver, Session, SettingsBuilder};
//!
//! let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
//! let mut session = Session::open(&settings, Box::new(LogObserver))?;
//! println!("{}", session.get_name_version()?);
//! let digest = session.load_app_from_file("app.bin", None)?;
//! println!("running app with digest {}", digest);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The session owns the transport. Dropping it, on success or on any error
//! path, closes the serial port.

use std::fs;
use std::path::Path;

use log::info;

use crate::app_loader;
use crate::channel::CommandChannel;
use crate::command::{Command, NameVersion};
use crate::digest::Digest;
use crate::error::{Error, FrameError, LoadError, Result, Step};
use crate::observer::{SessionEvent, SessionObserver};
use crate::settings::Settings;
use crate::transport::{SerialTransport, Transport};

pub struct Session<T: Transport> {
    channel: CommandChannel<T>,
}
impl Session<SerialTransport> {
    /// Open the serial port described by `settings`. The first exchange of the
    /// session runs with `settings.probe_timeout`.
    pub fn open(settings: &Settings, observer: Box<dyn SessionObserver>) -> Result<Self> {
        let transport = SerialTransport::open(settings)?;
        Ok(Session::new(transport, observer, settings.probe_timeout))
    }
}
impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        observer: Box<dyn SessionObserver>,
        probe_timeout: Option<std::time::Duration>,
    ) -> Self {
        Session {
            channel: CommandChannel::new(transport)
                .with_observer(observer)
                .with_probe_timeout(probe_timeout),
        }
    }

    /// Ask the firmware for its name and version. Usually the first exchange of
    /// a session, which makes it the one that detects a device that is not in
    /// firmware mode.
    pub fn get_name_version(&mut self) -> Result<NameVersion> {
        let payload = self.channel.exchange(Command::GetNameVersion, &[])?;
        let name_version = NameVersion::unpack(&payload).ok_or(FrameError::Truncated {
            expected: NameVersion::PACKED_LEN,
            actual: payload.len(),
        })?;
        self.channel
            .observer()
            .notify(&SessionEvent::Identified(&name_version));
        Ok(name_version)
    }

    /// Upload `app`, verify its digest and start it. `secret` is the optional
    /// user-supplied secret the firmware mixes into the secrets it derives for
    /// the app.
    pub fn load_app(&mut self, app: &[u8], secret: Option<&[u8]>) -> Result<Digest, LoadError> {
        app_loader::factory(&mut self.channel, app, secret).run()
    }

    /// Read the app binary from `path` and [`load_app`](Self::load_app) it.
    pub fn load_app_from_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        secret: Option<&[u8]>,
    ) -> Result<Digest, LoadError> {
        let path = path.as_ref();
        info!("Loading app from {}", path.display());
        let app = fs::read(path).map_err(|source| LoadError {
            step: Step::DeclareSize,
            source: Error::File {
                path: path.display().to_string(),
                source,
            },
        })?;
        self.load_app(&app, secret)
    }

    /// Close the session and hand back the transport.
    pub fn into_transport(self) -> T {
        self.channel.into_transport()
    }
}
