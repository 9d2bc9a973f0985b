//! User-facing text for the update, sync and manifest commands.
//!
//! Every string printed by the CLI is a [`Message`] variant; the `msg_*`
//! macros decide whether it goes to the terminal or to `tracing`.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
