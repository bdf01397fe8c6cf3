//! Take over alarms command

use async_trait::async_trait;
use combo_shared::{CommandError, CommandResult, MenuType};
use std::fmt;
use tracing::info;

use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;
use crate::safety::AlertReconciler;

/// Confirm whatever alarm the pump is showing and report it.
///
/// The returned state is the one read while the alarm was displayed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TakeOverAlarmsCommand {
    alerts: AlertReconciler,
}

impl TakeOverAlarmsCommand {
    pub fn new(alerts: AlertReconciler) -> Self {
        Self { alerts }
    }
}

impl fmt::Display for TakeOverAlarmsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TakeOverAlarmsCommand{}")
    }
}

#[async_trait]
impl Command for TakeOverAlarmsCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::TakeOverAlarms
    }

    fn needs_run_mode(&self) -> bool {
        false
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let snapshot = ops.current_menu().await?;
        if snapshot.menu_type() != MenuType::WarningOrError {
            return Err(CommandError::failed("No alarm active on the pump"));
        }

        let state = ops.pump_state();
        let message = snapshot.menu.message().unwrap_or_default().to_string();
        info!("Taking over alarm {}", message);
        self.alerts
            .confirm_alert(ops, &message, ops.config().current_menu_timeout)
            .await?;

        Ok(CommandResult::succeeded(format!("Alarm {message} confirmed")).with_state(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SimHarness;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_takes_over_active_alarm() {
        let harness = SimHarness::connected().await;
        harness.pump.raise_alert("OCCLUSION", 1);
        harness
            .state
            .menu
            .wait_for_menu_type(MenuType::WarningOrError, Duration::from_secs(2))
            .await
            .unwrap();

        let result = TakeOverAlarmsCommand::default().execute(&harness.ops()).await.unwrap();
        assert!(result.success);
        assert!(!result.enacted);
        assert_eq!(result.message, "Alarm OCCLUSION confirmed");
        assert_eq!(result.state.unwrap().alert_message.as_deref(), Some("OCCLUSION"));
        assert!(harness.state.menu.latest_type().unwrap().is_root());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alarm() {
        let harness = SimHarness::connected().await;
        let err = TakeOverAlarmsCommand::default().execute(&harness.ops()).await.unwrap_err();
        assert_eq!(err.to_string(), "No alarm active on the pump");
    }
}
