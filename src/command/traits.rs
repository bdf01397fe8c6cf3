//! Command contract

use async_trait::async_trait;
use combo_shared::{CommandError, CommandResult};
use std::fmt;

use crate::pump::PumpOps;

/// Tag used for link-loss alarm lookup and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ReadPumpState,
    Bolus,
    SetTbr,
    CancelTbr,
    ReadBasalProfile,
    SetBasalProfile,
    ReadHistory,
    TakeOverAlarms,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A unit of work executed against the pump display.
///
/// `Display` renders the request as it appears in the result and the logs.
#[async_trait]
pub trait Command: Send + Sync + fmt::Display {
    fn kind(&self) -> CommandKind;

    /// Human-readable violations; empty if the command may run
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    /// False for commands that are meaningful while the pump is suspended
    fn needs_run_mode(&self) -> bool {
        true
    }

    /// Run the command. Called once per attempt; an attempt that lost the
    /// link is restarted from scratch after reconnecting.
    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError>;

    /// Ask a running command to stop; false if it has no cancellation support
    fn request_cancellation(&self) -> bool {
        false
    }
}
