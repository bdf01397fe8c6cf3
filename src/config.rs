//! Scripter configuration

use combo_shared::timing;
use std::time::Duration;

/// Timeouts and retry budgets of the scripter
#[derive(Debug, Clone)]
pub struct ScripterConfig {
    /// Snapshot age below which the link counts as connected
    pub connected_freshness: Duration,
    /// Overall connect budget
    pub connect_timeout: Duration,
    /// Reissue the connect request after this long without a snapshot
    pub connect_reissue_interval: Duration,
    /// Pause between disconnect and connect when reissuing
    pub connect_reissue_settle: Duration,
    /// Initial dynamic timeout of an execution attempt
    pub dynamic_timeout: Duration,
    /// Extension granted while the pump shows progress
    pub timeout_extension: Duration,
    /// A snapshot within this window counts as progress
    pub progress_window: Duration,
    /// Hard limit of an execution attempt
    pub absolute_timeout: Duration,
    /// Time an interrupted attempt gets to stop
    pub interrupt_grace: Duration,
    /// Attempt restarts after a mid-command link loss
    pub max_reconnects: u32,
    pub link_check_interval: Duration,
    pub idle_disconnect_timeout: Duration,
    pub idle_disconnect_debounce: Duration,
    pub idle_disconnect_settle: Duration,
    pub idle_check_interval: Duration,
    pub key_press_hold: Duration,
    pub menu_update_timeout: Duration,
    pub current_menu_timeout: Duration,
    pub navigation_max_presses: u32,
}

impl Default for ScripterConfig {
    fn default() -> Self {
        Self {
            connected_freshness: timing::CONNECTED_FRESHNESS,
            connect_timeout: timing::CONNECT_TIMEOUT,
            connect_reissue_interval: timing::CONNECT_REISSUE_INTERVAL,
            connect_reissue_settle: timing::CONNECT_REISSUE_SETTLE,
            dynamic_timeout: timing::COMMAND_DYNAMIC_TIMEOUT,
            timeout_extension: timing::COMMAND_TIMEOUT_EXTENSION,
            progress_window: timing::COMMAND_PROGRESS_WINDOW,
            absolute_timeout: timing::COMMAND_ABSOLUTE_TIMEOUT,
            interrupt_grace: timing::COMMAND_INTERRUPT_GRACE,
            max_reconnects: timing::COMMAND_MAX_RECONNECTS,
            link_check_interval: timing::LINK_CHECK_INTERVAL,
            idle_disconnect_timeout: timing::IDLE_DISCONNECT_TIMEOUT,
            idle_disconnect_debounce: timing::IDLE_DISCONNECT_DEBOUNCE,
            idle_disconnect_settle: timing::IDLE_DISCONNECT_SETTLE,
            idle_check_interval: timing::IDLE_CHECK_INTERVAL,
            key_press_hold: timing::KEY_PRESS_HOLD,
            menu_update_timeout: timing::MENU_UPDATE_TIMEOUT,
            current_menu_timeout: timing::CURRENT_MENU_TIMEOUT,
            navigation_max_presses: timing::NAVIGATION_MAX_PRESSES,
        }
    }
}
