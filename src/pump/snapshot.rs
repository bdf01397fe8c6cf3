//! Pump state snapshotter
//!
//! Converts the latest menu snapshot into a [`PumpState`]. Reads only the
//! current snapshot and never waits.

use combo_shared::{Menu, MenuAttribute, MenuType, PumpState};
use std::fmt::Write;
use std::sync::Arc;

use crate::state::ScripterState;

/// Builds [`PumpState`]s from the shared menu stream
#[derive(Clone)]
pub struct PumpStateSnapshotter {
    state: Arc<ScripterState>,
}

impl PumpStateSnapshotter {
    pub fn new(state: Arc<ScripterState>) -> Self {
        Self { state }
    }

    pub fn read(&self) -> PumpState {
        let latest = self.state.menu.latest();
        pump_state_from(latest.as_deref().map(|s| &s.menu))
    }
}

/// Map one decoded screen onto the normalized state
pub fn pump_state_from(menu: Option<&Menu>) -> PumpState {
    let Some(menu) = menu else {
        return PumpState::unavailable();
    };

    let mut state = PumpState::new(Some(menu.menu_type));
    match menu.menu_type {
        MenuType::MainMenu => {
            let percent = menu.decimal(MenuAttribute::Tbr).unwrap_or(100.0);
            let rate = menu.decimal(MenuAttribute::BasalRate);
            if (percent - 100.0).abs() > f64::EPSILON {
                state.tbr_active = true;
                state.tbr_percent = Some(percent.round() as u32);
                state.tbr_remaining_duration =
                    menu.time(MenuAttribute::Runtime).map(|t| t.total_minutes());
                state.tbr_rate = rate;
                if percent > 0.0 {
                    state.base_basal_rate = rate.map(|r| (r * 100.0 / percent * 100.0).round() / 100.0);
                }
            } else {
                state.base_basal_rate = rate;
            }
            read_gauges(menu, &mut state);
        }
        MenuType::StopMenu => {
            state.suspended = true;
            read_gauges(menu, &mut state);
        }
        MenuType::WarningOrError => {
            state.alert_message = menu.message().map(str::to_owned);
            state.warning_code = menu.integer(MenuAttribute::WarningCode);
            state.error_code = menu.integer(MenuAttribute::ErrorCode);
        }
        other => {
            let mut dump = format!("Pump is on menu {other}, listing attributes: \n");
            for (attribute, value) in menu.attributes() {
                let _ = writeln!(dump, "{attribute}: {value}");
            }
            state.error_msg = Some(dump);
        }
    }
    state
}

fn read_gauges(menu: &Menu, state: &mut PumpState) {
    state.battery_state = menu.integer(MenuAttribute::BatteryState);
    state.insulin_state = menu.integer(MenuAttribute::InsulinState);
}
