//! Command orchestration engine for the Accu-Chek Combo insulin pump
//!
//! The pump is driven through its remote-control display: every command is
//! a sequence of key presses, verified against the menu snapshots the driver
//! decodes. [`PumpScripter`] is the entry point.

pub mod command;
pub mod config;
pub mod connection;
pub mod menu;
pub mod pump;
pub mod safety;
pub mod scripter;
pub mod state;

#[cfg(test)]
mod test_support;

pub use combo_shared::{CommandError, CommandResult, PumpState};
pub use config::ScripterConfig;
pub use scripter::PumpScripter;
