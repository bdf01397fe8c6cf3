//! Command execution infrastructure for the pump
//!
//! This module handles:
//! - Validating commands before the pump is touched
//! - Serializing execution under the global execution lock
//! - Supervising attempts with dynamic and absolute timeouts
//! - Restarting attempts after a mid-command link loss

mod executor;
pub mod handlers;
mod traits;

pub use executor::CommandExecutor;
pub use traits::{Command, CommandKind};
