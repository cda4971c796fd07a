//! Events for the app loader state machine.
//!
//! This modules is private and restricted to the
//! [`app_loader`](crate::app_loader) scope. The public interface of the state
//! machine is provided by [`app_loader`](crate::app_loader).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::digest::Digest;
use crate::error::LoadError;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// SizeDeclaredEvent ===========================================================

/// Event fired when the device accepted the app size. Triggers the transition
/// from [`IdleState`](super::states::IdleState) to
/// [`SizeDeclaredState`](super::states::SizeDeclaredState).
#[derive(Debug)]
pub(crate) struct SizeDeclaredEvent {
    /// The declared size of the app, in bytes.
    pub size: usize,
}

// TransferEvent ===============================================================

/// Event fired when a chunk must be sent, starting at `offset`.
///
/// This event can happen under one of the following circumstances:
///
///  1. While at the `SizeDeclared` state, with an `offset` of `0`.
///  2. While at the `Transferring` state after the device accepted a chunk and
///     there are bytes left to send.
#[derive(Debug)]
pub(crate) struct TransferEvent {
    pub size: usize,
    /// Number of app bytes already accepted by the device.
    pub offset: usize,
}

// TransferCompleteEvent =======================================================

/// Event fired when the last chunk was accepted and `offset == size`.
#[derive(Debug)]
pub(crate) struct TransferCompleteEvent {
    pub size: usize,
}

// VerifiedEvent ===============================================================

/// Event fired when the digest reported by the device matched the digest
/// computed on the host.
#[derive(Debug)]
pub(crate) struct VerifiedEvent {
    pub size: usize,
    pub digest: Digest,
}

// RunEvent ====================================================================

/// Event fired to start the verified app.
#[derive(Debug)]
pub(crate) struct RunEvent {
    pub size: usize,
    pub digest: Digest,
}

// DoneEvent ===================================================================

/// Event fired when the device accepted the run command. The app is running.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub size: usize,
    pub digest: Digest,
}

// FailEvent ===================================================================

/// Event fired from any state when a step fails. There is no recovery: the
/// session moves to the absorbing `Failed` state.
#[derive(Debug)]
pub(crate) struct FailEvent {
    pub size: usize,
    pub error: LoadError,
}

// Events enum ==================================================================

/// Events that can be triggered within the app loader state machine.
///
/// Each possible value holds an `event`, which in turn may hold additional data
/// for the state transition.
#[derive(Debug)]
pub(crate) enum Event {
    SizeDeclared(SizeDeclaredEvent),
    Transfer(TransferEvent),
    TransferComplete(TransferCompleteEvent),
    Verified(VerifiedEvent),
    Run(RunEvent),
    Done(DoneEvent),
    Fail(FailEvent),
}
