//! Upload, verify and start an app on the device.
//!
//! **Example** - Loading an app over an open command channel:
//! ```ignore
//! use tkload::app_loader;
//!
//! let digest = app_loader::factory(&mut channel, &app, None).run()?;
//! ```

mod events;
mod state_machine;
mod states;

use crate::channel::CommandChannel;
use crate::transport::Transport;

pub use state_machine::{factory, AppLoader};
pub use states::MAX_APP_SIZE;

/// What every state of the loader works with: the channel to the device, the
/// app being loaded and the optional user-supplied secret.
pub(crate) struct LoadContext<'a, T: Transport> {
    pub channel: &'a mut CommandChannel<T>,
    pub app: &'a [u8],
    pub secret: Option<&'a [u8]>,
}
