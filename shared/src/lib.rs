//! Combo Scripter Shared Types
//!
//! This crate provides the types exchanged between the pump display driver
//! and the command engine: the decoded menu model, the normalized pump state,
//! command results and the failure taxonomy.

pub mod error;
pub mod history;
pub mod menu;
pub mod result;
pub mod state;

pub use error::CommandError;
pub use history::{
    BasalProfile, Bolus, HistoryRange, HistoryRecord, HistoryRequest, PumpError, PumpHistory, Tbr,
    Tdd,
};
pub use menu::{BolusType, Key, Menu, MenuAttribute, MenuDate, MenuTime, MenuType, MenuValue};
pub use result::{CommandResult, CommandTiming};
pub use state::PumpState;

/// Timing parameters of the pump link and command execution
pub mod timing {
    use std::time::Duration;

    /// Display refresh interval of the pump
    pub const MENU_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

    /// A snapshot younger than this means the link is up
    pub const CONNECTED_FRESHNESS: Duration = Duration::from_secs(1);

    /// Overall budget for bringing up a connection
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(90);

    /// Reissue the connect request if no snapshot arrived within this interval
    pub const CONNECT_REISSUE_INTERVAL: Duration = Duration::from_secs(30);

    /// Pause between the disconnect and connect of a reissued request
    pub const CONNECT_REISSUE_SETTLE: Duration = Duration::from_secs(2);

    /// Initial dynamic command timeout
    pub const COMMAND_DYNAMIC_TIMEOUT: Duration = Duration::from_secs(90);

    /// Extension granted while a command still shows progress
    pub const COMMAND_TIMEOUT_EXTENSION: Duration = Duration::from_secs(30);

    /// A snapshot update within this window counts as progress
    pub const COMMAND_PROGRESS_WINDOW: Duration = Duration::from_secs(5);

    /// Hard ceiling on a single execution attempt
    pub const COMMAND_ABSOLUTE_TIMEOUT: Duration = Duration::from_secs(4 * 60);

    /// How long an interrupted attempt gets to unwind
    pub const COMMAND_INTERRUPT_GRACE: Duration = Duration::from_secs(5);

    /// Restarts after a mid-command link loss
    pub const COMMAND_MAX_RECONNECTS: u32 = 3;

    /// Link status poll while a command runs
    pub const LINK_CHECK_INTERVAL: Duration = Duration::from_millis(500);

    /// Quiet period after the last command before the link is dropped
    pub const IDLE_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Minimum spacing of idle disconnects
    pub const IDLE_DISCONNECT_DEBOUNCE: Duration = Duration::from_secs(15);

    /// Hold-off after an idle disconnect to let the pump settle
    pub const IDLE_DISCONNECT_SETTLE: Duration = Duration::from_secs(10);

    pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

    /// How long a key stays pressed
    pub const KEY_PRESS_HOLD: Duration = Duration::from_millis(200);

    /// Default wait for a menu update inside a command
    pub const MENU_UPDATE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Wait for a menu to appear when none is displayed
    pub const CURRENT_MENU_TIMEOUT: Duration = Duration::from_secs(5);

    /// Menu key presses before giving up on navigation
    pub const NAVIGATION_MAX_PRESSES: u32 = 20;
}

#[cfg(test)]
mod tests {
    use super::timing;

    #[test]
    fn test_timeouts_are_ordered() {
        assert!(timing::COMMAND_DYNAMIC_TIMEOUT < timing::COMMAND_ABSOLUTE_TIMEOUT);
        assert!(timing::CONNECT_REISSUE_INTERVAL < timing::CONNECT_TIMEOUT);
        assert!(timing::IDLE_DISCONNECT_TIMEOUT < timing::IDLE_DISCONNECT_DEBOUNCE);
        assert!(timing::COMMAND_PROGRESS_WINDOW > timing::MENU_UPDATE_INTERVAL);
    }
}
