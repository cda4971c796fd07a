//! States for the app loader state machine.
//!
//! This modules is private and restricted to the
//! [`app_loader`](crate::app_loader) scope. The public interface of the state
//! machine is provided by [`app_loader`](crate::app_loader).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::cmp;

use log::{info, trace};

use super::events::*;
use super::LoadContext;

use crate::command::Command;
use crate::digest::{Digest, DIGEST_LEN};
use crate::error::{Error, FrameError, LoadError, Result, SizeError, Step};
use crate::frame::LengthClass;
use crate::observer::SessionEvent;
use crate::transport::Transport;

/// The largest app the firmware accepts.
pub const MAX_APP_SIZE: usize = 65536;

/// Length class of `LoadAppData` frames.
const DATA_CLASS: LengthClass = LengthClass::Len128;

/// Flag byte following the size when a user-supplied secret is attached.
const SECRET_PRESENT: u8 = 1;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// Do the work of the state, then request a transition by returning the
    /// next `event`. `size` is the declared size of the app.
    fn run<T: Transport>(&mut self, size: usize, ctx: &mut LoadContext<'_, T>) -> Event;
}

/// Report the failure and build the event leading to the `Failed` state.
fn fail<T: Transport>(ctx: &LoadContext<'_, T>, size: usize, step: Step, error: Error) -> Event {
    ctx.channel.observer().notify(&SessionEvent::Failed {
        step,
        error: &error,
    });
    Event::Fail(FailEvent {
        size,
        error: LoadError {
            step,
            source: error,
        },
    })
}

// Idle State ==================================================================

/// The initial state. Nothing has been sent to the device yet.
///
///  * **[`SizeDeclaredEvent`] => [`SizeDeclaredState`]** when the device
///    accepted the size,
///  * **[`FailEvent`] => [`FailedState`]** when the app is empty or too large
///    (in which case nothing is written at all), or the device rejected it.
#[derive(Debug)]
pub(crate) struct IdleState {}
impl IdleState {
    fn declare_size<T: Transport>(&self, size: usize, ctx: &mut LoadContext<'_, T>) -> Result<()> {
        if size == 0 {
            return Err(SizeError::Empty.into());
        }
        if size > MAX_APP_SIZE {
            return Err(SizeError::TooLarge {
                size,
                max: MAX_APP_SIZE,
            }
            .into());
        }

        // Size as 4 bytes, lowest order first, optionally followed by the digest
        // of the user-supplied secret.
        let mut payload = (size as u32).to_le_bytes().to_vec();
        if let Some(secret) = ctx.secret {
            payload.push(SECRET_PRESENT);
            payload.extend_from_slice(Digest::compute(secret).as_bytes());
        }
        let class = LengthClass::smallest_for(1 + payload.len()).unwrap_or(LengthClass::Len128);

        ctx.channel
            .exchange_with_class(Command::LoadAppSize, class, &payload)?;
        ctx.channel.observer().notify(&SessionEvent::SizeDeclared {
            size,
            with_secret: ctx.secret.is_some(),
        });
        Ok(())
    }
}
impl Runnable for IdleState {
    fn run<T: Transport>(&mut self, size: usize, ctx: &mut LoadContext<'_, T>) -> Event {
        info!("=> Idle");
        match self.declare_size(size, ctx) {
            Ok(()) => Event::SizeDeclared(SizeDeclaredEvent { size }),
            Err(e) => fail(ctx, size, Step::DeclareSize, e),
        }
    }
}

// SizeDeclared State ==========================================================

/// The device knows how many bytes to expect.
///
///  * **[`TransferEvent`] => [`TransferringState`]** starting at offset `0`.
#[derive(Debug)]
pub(crate) struct SizeDeclaredState {}
impl Runnable for SizeDeclaredState {
    fn run<T: Transport>(&mut self, size: usize, _ctx: &mut LoadContext<'_, T>) -> Event {
        info!("=> SizeDeclared ({} bytes)", size);
        Event::Transfer(TransferEvent { size, offset: 0 })
    }
}

// Transferring State ==========================================================

/// Sends one `LoadAppData` chunk per run.
///
/// A chunk carries up to 127 bytes of the app; the last one is zero padded to
/// the full frame. Only the real app bytes count towards the offset.
///
///  * **[`TransferEvent`] => [`TransferringState`]** while `offset < size`,
///  * **[`TransferCompleteEvent`] => [`DigestPendingState`]** when
///    `offset == size`,
///  * **[`FailEvent`] => [`FailedState`]** on any error.
#[derive(Debug)]
pub(crate) struct TransferringState {
    pub offset: usize,
}
impl TransferringState {
    fn send_chunk<T: Transport>(&self, size: usize, ctx: &mut LoadContext<'_, T>) -> Result<usize> {
        let end = cmp::min(self.offset + DATA_CLASS.payload_capacity(), ctx.app.len());
        let chunk = &ctx.app[self.offset..end];
        ctx.channel
            .exchange_with_class(Command::LoadAppData, DATA_CLASS, chunk)?;

        let offset = self.offset + chunk.len();
        ctx.channel.observer().notify(&SessionEvent::ChunkSent {
            offset,
            len: chunk.len(),
            size,
        });
        if offset > size {
            return Err(SizeError::Overrun { offset, size }.into());
        }
        Ok(offset)
    }
}
impl Runnable for TransferringState {
    fn run<T: Transport>(&mut self, size: usize, ctx: &mut LoadContext<'_, T>) -> Event {
        trace!("=> Transferring ({}/{})", self.offset, size);
        match self.send_chunk(size, ctx) {
            Ok(offset) if offset < size => Event::Transfer(TransferEvent { size, offset }),
            Ok(_) => Event::TransferComplete(TransferCompleteEvent { size }),
            Err(e) => fail(ctx, size, Step::Transfer, e),
        }
    }
}

// DigestPending State =========================================================

/// All bytes are on the device. Fetch its digest of the app and compare it with
/// the one computed on the host.
///
///  * **[`VerifiedEvent`] => [`VerifiedState`]** when both digests are equal,
///  * **[`FailEvent`] => [`FailedState`]** otherwise.
#[derive(Debug)]
pub(crate) struct DigestPendingState {}
impl DigestPendingState {
    fn verify<T: Transport>(&self, ctx: &mut LoadContext<'_, T>) -> Result<Digest> {
        let payload = ctx.channel.exchange(Command::GetAppDigest, &[])?;
        let device = Digest::from_slice(&payload).ok_or(FrameError::Truncated {
            expected: DIGEST_LEN,
            actual: payload.len(),
        })?;
        let host = Digest::compute(ctx.app);

        ctx.channel
            .observer()
            .notify(&SessionEvent::DigestsCompared {
                host: &host,
                device: &device,
            });
        Digest::verify(&host, &device)?;
        Ok(host)
    }
}
impl Runnable for DigestPendingState {
    fn run<T: Transport>(&mut self, size: usize, ctx: &mut LoadContext<'_, T>) -> Event {
        info!("=> DigestPending");
        match self.verify(ctx) {
            Ok(digest) => Event::Verified(VerifiedEvent { size, digest }),
            Err(e) => fail(ctx, size, Step::Digest, e),
        }
    }
}

// Verified State ==============================================================

/// The device holds exactly the app that was sent.
///
///  * **[`RunEvent`] => [`RunningState`]**.
#[derive(Debug)]
pub(crate) struct VerifiedState {
    pub digest: Digest,
}
impl Runnable for VerifiedState {
    fn run<T: Transport>(&mut self, size: usize, _ctx: &mut LoadContext<'_, T>) -> Event {
        info!("=> Verified");
        Event::Run(RunEvent {
            size,
            digest: self.digest,
        })
    }
}

// Running State ===============================================================

/// Tell the firmware to start the app.
///
///  * **[`DoneEvent`] => [`DoneState`]** when the device accepted,
///  * **[`FailEvent`] => [`FailedState`]** otherwise.
#[derive(Debug)]
pub(crate) struct RunningState {
    pub digest: Digest,
}
impl Runnable for RunningState {
    fn run<T: Transport>(&mut self, size: usize, ctx: &mut LoadContext<'_, T>) -> Event {
        info!("=> Running");
        match ctx.channel.exchange(Command::RunApp, &[]) {
            Ok(_) => {
                ctx.channel.observer().notify(&SessionEvent::AppStarted);
                Event::Done(DoneEvent {
                    size,
                    digest: self.digest,
                })
            }
            Err(e) => fail(ctx, size, Step::Run, e),
        }
    }
}

// Done State ==================================================================

/// Terminal. The app was verified and is running on the device.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    pub digest: Digest,
}

// Failed State ================================================================

/// Terminal. The session was aborted; the device is not running the new app.
#[derive(Debug)]
pub(crate) struct FailedState {
    pub error: LoadError,
}
