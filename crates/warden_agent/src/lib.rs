//! The turn controller: routes model tool calls to auto tools, host actions
//! or the human confirmation gate, and checkpoints every step.

mod controller;
pub mod error;
pub mod host;
pub mod prompt;

pub use controller::{CANCEL, CONFIRM, TurnController, TurnOutcome, TurnStatus};
pub use error::Error;
pub use host::{ContextEntry, HostContext};
