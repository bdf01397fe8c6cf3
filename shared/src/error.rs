//! Failure taxonomy for command execution
//!
//! Everything that can go wrong while talking to the pump ends up as a
//! [`CommandError`]. The executor converts each of them into a
//! [`CommandResult`]; none is ever handed to a caller as an error.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::result::CommandResult;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Command arguments rejected before the pump was contacted
    #[error("{}", .violations.join("\n"))]
    Validation { violations: Vec<String> },

    #[error("Timeout connecting to pump")]
    ConnectionTimeout { waited: Duration },

    /// No progress observed within the dynamic timeout
    #[error("Command stalled, check pump!")]
    Stalled,

    #[error("Command {command} timed out after {} min, check pump!", .limit.as_secs() / 60)]
    TimedOut { command: String, limit: Duration },

    #[error("An alert other than the expected {expected} was raised by the pump: {actual}. Please check the pump.")]
    AlarmMismatch { expected: String, actual: String },

    #[error("{message}")]
    MenuNotReached { message: String },

    /// Refuses every further command until the process restarts
    #[error("{reason}")]
    Unrecoverable { reason: String },

    #[error("{context}: {cause}")]
    Unexpected { context: String, cause: String },

    /// The running attempt observed its cancellation token
    #[error("Command interrupted")]
    Interrupted,

    /// A command gave up; `enacted` records whether the pump was changed anyway
    #[error("{message}")]
    Failed { message: String, enacted: bool },
}

impl CommandError {
    pub fn menu_not_reached(message: impl Into<String>) -> Self {
        Self::MenuNotReached {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            enacted: false,
        }
    }

    pub fn failed_enacted(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            enacted: true,
        }
    }

    pub fn unexpected(context: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Unexpected {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    pub fn enacted(&self) -> bool {
        matches!(self, CommandError::Failed { enacted: true, .. })
    }

    /// Convert into the failure result handed to callers
    pub fn into_result(self) -> CommandResult {
        let result = CommandResult::failed(self.to_string()).enacted(self.enacted());
        match self {
            CommandError::Unexpected { cause, .. } => result.with_exception(cause),
            _ => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_joins_violations() {
        let err = CommandError::Validation {
            violations: vec!["percent out of range".into(), "bad duration".into()],
        };
        assert_eq!(err.to_string(), "percent out of range\nbad duration");
    }

    #[test]
    fn test_timed_out_message() {
        let err = CommandError::TimedOut {
            command: "SetTbrCommand{percent=150, duration=30}".into(),
            limit: Duration::from_secs(240),
        };
        assert_eq!(
            err.to_string(),
            "Command SetTbrCommand{percent=150, duration=30} timed out after 4 min, check pump!"
        );
    }

    #[test]
    fn test_into_result_keeps_enacted_flag() {
        let result = CommandError::failed_enacted("Bolus cancelled").into_result();
        assert!(!result.success);
        assert!(result.enacted);

        let result = CommandError::unexpected("Error while pressing buttons", "link down").into_result();
        assert!(!result.enacted);
        assert_eq!(result.exception.as_deref(), Some("link down"));
        assert_eq!(result.message, "Error while pressing buttons: link down");
    }
}
