//! Structured session events and the sinks that consume them.
//!
//! The command channel and the app loader report what they do to a
//! [`SessionObserver`] supplied by the caller. Nothing is reported unless the
//! caller asks for it: the default sink is [`NoopObserver`].

use hexplay::HexViewBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, log_enabled, trace, warn, Level::Trace};

use crate::command::{Command, NameVersion, Response};
use crate::digest::Digest;
use crate::error::{Error, Step};

/// Something that happened during a session.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// A raw command frame was written to the device.
    FrameSent { command: Command, frame: &'a [u8] },
    /// A raw response frame was read from the device.
    FrameReceived { response: Response, frame: &'a [u8] },
    /// The firmware identified itself.
    Identified(&'a NameVersion),
    /// The device accepted the app size.
    SizeDeclared { size: usize, with_secret: bool },
    /// The device accepted a chunk. `offset` counts the real app bytes sent so
    /// far, this chunk included.
    ChunkSent {
        offset: usize,
        len: usize,
        size: usize,
    },
    /// Both digests are known.
    DigestsCompared {
        host: &'a Digest,
        device: &'a Digest,
    },
    /// The device accepted the run command.
    AppStarted,
    /// The session was aborted.
    Failed { step: Step, error: &'a Error },
}

pub trait SessionObserver {
    fn notify(&self, event: &SessionEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;
impl SessionObserver for NoopObserver {
    #[inline]
    fn notify(&self, _event: &SessionEvent<'_>) {}
}

/// Forwards events to the `log` facade. Frames are hex dumped at `trace` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;
impl SessionObserver for LogObserver {
    fn notify(&self, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::FrameSent { command, frame } => {
                if log_enabled!(Trace) {
                    trace!("{:?} tx\n{}", command, hex_view(frame));
                }
            }
            SessionEvent::FrameReceived { response, frame } => {
                if log_enabled!(Trace) {
                    trace!("{:?} rx\n{}", response, hex_view(frame));
                }
            }
            SessionEvent::Identified(name_version) => {
                info!("firmware {}", name_version);
            }
            SessionEvent::SizeDeclared { size, with_secret } => {
                info!(
                    "app size: {}, 0x{:x}, 0b{:b} (user supplied secret: {})",
                    size, size, size, with_secret
                );
            }
            SessionEvent::ChunkSent { offset, len, size } => {
                debug!("sent {} bytes, {}/{}", len, offset, size);
            }
            SessionEvent::DigestsCompared { host, device } => {
                info!("digest from host:   {}", host);
                info!("digest from device: {}", device);
                if host == device {
                    info!("same digests");
                }
            }
            SessionEvent::AppStarted => info!("app started"),
            SessionEvent::Failed { step, error } => {
                warn!("{} step failed: {}", step, error);
            }
        }
    }
}

fn hex_view(frame: &[u8]) -> String {
    HexViewBuilder::new(frame)
        .address_offset(0)
        .row_width(16)
        .finish()
        .to_string()
}

/// Shows the upload as a progress bar on the terminal and logs like
/// [`LogObserver`].
pub struct ProgressObserver {
    pb: ProgressBar,
}
impl ProgressObserver {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(ProgressStyle::default_bar()
            .template("[TK] ⏩ Loading [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .progress_chars("=>-"));
        ProgressObserver { pb }
    }
}
impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}
impl SessionObserver for ProgressObserver {
    fn notify(&self, event: &SessionEvent<'_>) {
        LogObserver.notify(event);
        match event {
            SessionEvent::SizeDeclared { size, .. } => {
                self.pb.set_length(*size as u64);
                self.pb.set_position(0);
            }
            SessionEvent::ChunkSent { offset, .. } => self.pb.set_position(*offset as u64),
            SessionEvent::AppStarted => self.pb.finish_with_message("app started"),
            SessionEvent::Failed { .. } => self.pb.abandon(),
            _ => {}
        }
    }
}
