//! App loader state machine.
//!
//! Loading an app is a fixed sequence of firmware commands. Each state issues
//! at most one of them and the answer decides the next transition. Any error
//! leads to the absorbing `Failed` state; there is no retry of a single step
//! and no resumption of a partial transfer.
//!
//! ```text
//!                  START
//!                    |
//!                    v
//!               .---------.
//!               |  Idle   |-------------------------.
//!               '---------'  empty, too large,       |
//!                    |       BAD status, errors      |
//!              size accepted                         |
//!                    v                               |
//!            .--------------.                        |
//!            | SizeDeclared |                        |
//!            '--------------'                        |
//!                    |                               |
//!                    v                               |
//!            .--------------.  offset < size         |
//!       .--->| Transferring |-----.                  |
//!       |    '--------------'     |                  |
//!       '-------------------------'                  |
//!                    |  offset == size               v
//!                    v                          .--------.
//!           .---------------.    mismatch       |        |
//!           | DigestPending |------------------>| Failed |
//!           '---------------'                   |        |
//!                    |  digests match           '--------'
//!                    v                               ^
//!              .----------.                          |
//!              | Verified |                          |
//!              '----------'                          |
//!                    |                               |
//!                    v                               |
//!              .---------.    BAD status, errors     |
//!              | Running |---------------------------'
//!              '---------'
//!                    |  run accepted
//!                    v
//!               .--------.
//!               |  Done  |
//!               '--------'
//! ```

use super::events::*;
use super::states::*;
use super::LoadContext;

use crate::digest::Digest;
use crate::error::LoadError;
use crate::transport::Transport;

// =============================================================================
// Public Interface
// =============================================================================

/// Runs the app loading sequence over a command channel. Use the `factory()`
/// function to get an instance then run it by calling its `run()` method.
pub struct AppLoader<'a, T: Transport> {
    ctx: LoadContext<'a, T>,
    sm: LoaderStates,
}
impl<'a, T: Transport> AppLoader<'a, T> {
    /// The event loop runs until the `Done` or the `Failed` state is reached.
    /// On success, returns the verified digest of the app now running on the
    /// device.
    pub fn run(self) -> Result<Digest, LoadError> {
        let AppLoader { mut ctx, mut sm } = self;
        loop {
            sm = sm.step(&mut ctx);
            match sm {
                LoaderStates::Done(done) => return Ok(done.state.digest),
                LoaderStates::Failed(failed) => return Err(failed.state.error),
                other => sm = other,
            }
        }
    }
}

/// Factory function for the app loader state machine. The machine starts in
/// the `Idle` state with nothing sent yet.
pub fn factory<'a, T: Transport>(
    channel: &'a mut crate::channel::CommandChannel<T>,
    app: &'a [u8],
    secret: Option<&'a [u8]>,
) -> AppLoader<'a, T> {
    AppLoader {
        ctx: LoadContext {
            channel,
            app,
            secret,
        },
        sm: LoaderStates::Idle(LoaderSM::new(app.len())),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine. `size`, the declared size of the app, is shared by
/// all states; `state` holds the current one.
#[derive(Debug)]
struct LoaderSM<S> {
    size: usize,
    state: S,
}
impl<S: Runnable> LoaderSM<S> {
    fn run<T: Transport>(&mut self, ctx: &mut LoadContext<'_, T>) -> Event {
        self.state.run(self.size, ctx)
    }
}

impl LoaderSM<IdleState> {
    fn new(size: usize) -> Self {
        LoaderSM {
            size,
            state: IdleState {},
        }
    }
}

/// Wraps the states of the machine into a simple enum, which can also be used
/// for pattern matching during state transitions.
#[derive(Debug)]
enum LoaderStates {
    Idle(LoaderSM<IdleState>),
    SizeDeclared(LoaderSM<SizeDeclaredState>),
    Transferring(LoaderSM<TransferringState>),
    DigestPending(LoaderSM<DigestPendingState>),
    Verified(LoaderSM<VerifiedState>),
    Running(LoaderSM<RunningState>),
    Done(LoaderSM<DoneState>),
    Failed(LoaderSM<FailedState>),
}
impl LoaderStates {
    /// The unit of work in the event loop: run the current state and convert
    /// the event it fires into the next state. Transitions are implemented with
    /// `From`, so an event that has no `From` implementation for a given
    /// target state cannot be wired in by mistake.
    fn step<T: Transport>(self, ctx: &mut LoadContext<'_, T>) -> Self {
        match self {
            LoaderStates::Idle(mut sm) => match sm.run(ctx) {
                Event::SizeDeclared(ev) => LoaderStates::SizeDeclared(ev.into()),
                Event::Fail(ev) => LoaderStates::Failed(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            LoaderStates::SizeDeclared(mut sm) => match sm.run(ctx) {
                Event::Transfer(ev) => LoaderStates::Transferring(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            LoaderStates::Transferring(mut sm) => match sm.run(ctx) {
                Event::Transfer(ev) => LoaderStates::Transferring(ev.into()),
                Event::TransferComplete(ev) => LoaderStates::DigestPending(ev.into()),
                Event::Fail(ev) => LoaderStates::Failed(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            LoaderStates::DigestPending(mut sm) => match sm.run(ctx) {
                Event::Verified(ev) => LoaderStates::Verified(ev.into()),
                Event::Fail(ev) => LoaderStates::Failed(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            LoaderStates::Verified(mut sm) => match sm.run(ctx) {
                Event::Run(ev) => LoaderStates::Running(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            LoaderStates::Running(mut sm) => match sm.run(ctx) {
                Event::Done(ev) => LoaderStates::Done(ev.into()),
                Event::Fail(ev) => LoaderStates::Failed(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            // Terminal states absorb any further step.
            LoaderStates::Done(sm) => LoaderStates::Done(sm),
            LoaderStates::Failed(sm) => LoaderStates::Failed(sm),
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<SizeDeclaredEvent> for LoaderSM<SizeDeclaredState> {
    fn from(event: SizeDeclaredEvent) -> LoaderSM<SizeDeclaredState> {
        LoaderSM {
            size: event.size,
            state: SizeDeclaredState {},
        }
    }
}

impl From<TransferEvent> for LoaderSM<TransferringState> {
    fn from(event: TransferEvent) -> LoaderSM<TransferringState> {
        LoaderSM {
            size: event.size,
            state: TransferringState {
                offset: event.offset,
            },
        }
    }
}

impl From<TransferCompleteEvent> for LoaderSM<DigestPendingState> {
    fn from(event: TransferCompleteEvent) -> LoaderSM<DigestPendingState> {
        LoaderSM {
            size: event.size,
            state: DigestPendingState {},
        }
    }
}

impl From<VerifiedEvent> for LoaderSM<VerifiedState> {
    fn from(event: VerifiedEvent) -> LoaderSM<VerifiedState> {
        LoaderSM {
            size: event.size,
            state: VerifiedState {
                digest: event.digest,
            },
        }
    }
}

impl From<RunEvent> for LoaderSM<RunningState> {
    fn from(event: RunEvent) -> LoaderSM<RunningState> {
        LoaderSM {
            size: event.size,
            state: RunningState {
                digest: event.digest,
            },
        }
    }
}

impl From<DoneEvent> for LoaderSM<DoneState> {
    fn from(event: DoneEvent) -> LoaderSM<DoneState> {
        LoaderSM {
            size: event.size,
            state: DoneState {
                digest: event.digest,
            },
        }
    }
}

impl From<FailEvent> for LoaderSM<FailedState> {
    fn from(event: FailEvent) -> LoaderSM<FailedState> {
        LoaderSM {
            size: event.size,
            state: FailedState { error: event.error },
        }
    }
}
