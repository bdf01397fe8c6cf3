//! Command results returned to callers

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

use crate::history::{BasalProfile, PumpHistory};
use crate::state::PumpState;

/// How long connecting and executing a command took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTiming {
    pub connect: Duration,
    pub execution: Duration,
}

impl fmt::Display for CommandTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connect: {}s, execution: {}s",
            self.connect.as_secs(),
            self.execution.as_secs()
        )
    }
}

/// Outcome of a command.
///
/// `success` says whether the command did what it was asked to; `enacted`
/// says whether something actually changed on the pump. A failed command can
/// still be enacted (e.g. a bolus cancelled half-way through).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub enacted: bool,
    pub message: String,
    pub state: Option<PumpState>,
    pub timing: Option<CommandTiming>,
    /// Description of the command that produced this result
    pub request: Option<String>,
    pub completed_at: Option<DateTime<Local>>,
    /// Internal fault that was converted into this result
    pub exception: Option<String>,
    pub history: Option<PumpHistory>,
    pub basal_profile: Option<BasalProfile>,
}

impl CommandResult {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            enacted: false,
            message: message.into(),
            state: None,
            timing: None,
            request: None,
            completed_at: None,
            exception: None,
            history: None,
            basal_profile: None,
        }
    }

    /// Create a successful, not yet enacted result
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    /// Create a failed, not enacted result
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    pub fn enacted(mut self, enacted: bool) -> Self {
        self.enacted = enacted;
        self
    }

    pub fn with_state(mut self, state: PumpState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_history(mut self, history: PumpHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_basal_profile(mut self, profile: BasalProfile) -> Self {
        self.basal_profile = Some(profile);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandResult{{success={}, enacted={}, message={:?}",
            self.success, self.enacted, self.message
        )?;
        if let Some(request) = &self.request {
            write!(f, ", request={request}")?;
        }
        if let Some(timing) = &self.timing {
            write!(f, ", {timing}")?;
        }
        if let Some(state) = &self.state {
            write!(f, ", state={state}")?;
        }
        f.write_str("}")
    }
}
