//! Normalized pump state
//!
//! A point-in-time record of what the pump display told us. It is rebuilt
//! from scratch for every command result; nothing is carried over between
//! snapshots.

use chrono::{DateTime, Local};
use std::fmt;

use crate::menu::MenuType;

/// Message used when no menu snapshot is available at all
pub const MENU_UNAVAILABLE: &str = "Menu is not available";

#[derive(Debug, Clone, PartialEq)]
pub struct PumpState {
    pub timestamp: DateTime<Local>,
    /// Screen the state was read from, `None` if nothing was displayed
    pub menu: Option<MenuType>,
    pub tbr_active: bool,
    pub tbr_percent: Option<u32>,
    /// Remaining TBR runtime in minutes
    pub tbr_remaining_duration: Option<u32>,
    /// Effective rate while a TBR runs
    pub tbr_rate: Option<f64>,
    /// Programmed basal rate, shown while no TBR runs
    pub base_basal_rate: Option<f64>,
    pub suspended: bool,
    pub battery_state: Option<i64>,
    pub insulin_state: Option<i64>,
    /// Text of the warning or error currently on screen
    pub alert_message: Option<String>,
    pub warning_code: Option<i64>,
    pub error_code: Option<i64>,
    pub error_msg: Option<String>,
}

impl PumpState {
    /// Create an empty state stamped with the current time
    pub fn new(menu: Option<MenuType>) -> Self {
        Self {
            timestamp: Local::now(),
            menu,
            tbr_active: false,
            tbr_percent: None,
            tbr_remaining_duration: None,
            tbr_rate: None,
            base_basal_rate: None,
            suspended: false,
            battery_state: None,
            insulin_state: None,
            alert_message: None,
            warning_code: None,
            error_code: None,
            error_msg: None,
        }
    }

    /// State for when the pump is not sending menu updates
    pub fn unavailable() -> Self {
        Self {
            error_msg: Some(MENU_UNAVAILABLE.into()),
            ..Self::new(None)
        }
    }

    pub fn is_error_or_warning(&self) -> bool {
        self.alert_message.is_some()
    }

    pub fn is_available(&self) -> bool {
        self.menu.is_some()
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.menu {
            Some(menu) => write!(f, "PumpState{{menu={menu}")?,
            None => f.write_str("PumpState{menu=none")?,
        }
        if self.suspended {
            f.write_str(", suspended")?;
        }
        if self.tbr_active {
            write!(
                f,
                ", tbr={}% for {}min",
                self.tbr_percent.unwrap_or_default(),
                self.tbr_remaining_duration.unwrap_or_default()
            )?;
        }
        if let Some(rate) = self.base_basal_rate {
            write!(f, ", basal={rate:.2}U/h")?;
        }
        if let Some(alert) = &self.alert_message {
            write!(f, ", alert={alert}")?;
        }
        if let Some(msg) = &self.error_msg {
            write!(f, ", error={msg}")?;
        }
        write!(f, ", at={}}}", self.timestamp.format("%H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_state() {
        let state = PumpState::unavailable();
        assert!(!state.is_available());
        assert_eq!(state.error_msg.as_deref(), Some(MENU_UNAVAILABLE));
        assert!(!state.tbr_active);
    }

    #[test]
    fn test_display_mentions_tbr() {
        let state = PumpState {
            tbr_active: true,
            tbr_percent: Some(150),
            tbr_remaining_duration: Some(30),
            ..PumpState::new(Some(MenuType::MainMenu))
        };
        assert!(state.to_string().contains("tbr=150% for 30min"));
    }
}
