//! Temporary basal rate commands

use async_trait::async_trait;
use combo_shared::{CommandError, CommandResult, Menu, MenuAttribute, MenuType};
use std::fmt;
use tracing::{debug, info};

use super::adjust_value;
use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;
use crate::safety::AlertReconciler;

pub const MAX_TBR_PERCENT: u32 = 500;
pub const MIN_TBR_DURATION: u32 = 15;
pub const MAX_TBR_DURATION: u32 = 24 * 60;

fn read_percent(menu: &Menu) -> Option<f64> {
    menu.decimal(MenuAttribute::Tbr)
}

fn read_duration(menu: &Menu) -> Option<f64> {
    menu.time(MenuAttribute::Runtime).map(|t| f64::from(t.total_minutes()))
}

/// Set a TBR; 100% cancels a running one
#[derive(Debug, Clone, Copy)]
pub struct SetTbrCommand {
    percent: u32,
    duration: u32,
    alerts: AlertReconciler,
}

impl SetTbrCommand {
    pub fn new(percent: u32, duration: u32) -> Self {
        Self {
            percent,
            duration,
            alerts: AlertReconciler::default(),
        }
    }

    /// Confirm the cancellation alarm with `alerts` instead of the default vocabulary
    pub fn with_alerts(mut self, alerts: AlertReconciler) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    fn cancels(&self) -> bool {
        self.percent == 100
    }

    async fn enter_tbr(&self, ops: &PumpOps) -> Result<(), CommandError> {
        ops.navigate_to_menu(MenuType::TbrMenu).await?;
        ops.verify_menu_is_displayed(MenuType::TbrMenu).await?;
        ops.press_check().await?;

        ops.verify_menu_is_displayed(MenuType::TbrSet).await?;
        adjust_value(ops, MenuAttribute::Tbr, read_percent, f64::from(self.percent), 10.0).await?;
        if self.cancels() {
            return Ok(());
        }

        ops.press_check().await?;
        ops.verify_menu_is_displayed(MenuType::TbrDuration).await?;
        adjust_value(ops, MenuAttribute::Runtime, read_duration, f64::from(self.duration), 15.0).await
    }
}

impl fmt::Display for SetTbrCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetTbrCommand{{percent={}, duration={}}}",
            self.percent, self.duration
        )
    }
}

#[async_trait]
impl Command for SetTbrCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::SetTbr
    }

    fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.percent % 10 != 0 {
            violations.push("TBR percentage must be set in 10% steps".to_string());
        }
        if self.percent > MAX_TBR_PERCENT {
            violations.push(format!("TBR percentage must not be greater than {MAX_TBR_PERCENT}%"));
        }
        if !self.cancels() {
            if self.duration % 15 != 0 {
                violations.push("TBR duration must be set in 15 minute steps".to_string());
            }
            if !(MIN_TBR_DURATION..=MAX_TBR_DURATION).contains(&self.duration) {
                violations.push(format!(
                    "TBR duration must be within {MIN_TBR_DURATION} and {MAX_TBR_DURATION} minutes"
                ));
            }
        }
        violations
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let was_active = ops.pump_state().tbr_active;
        self.enter_tbr(ops).await?;
        ops.press_check().await?;

        let alarm = self.alerts.vocabulary().cancel_alarm(CommandKind::SetTbr);
        if let (true, true, Some(alarm)) = (self.cancels(), was_active, alarm) {
            self.alerts
                .confirm_alert(ops, alarm, ops.config().current_menu_timeout)
                .await?;
        }
        ops.verify_menu_is_displayed(MenuType::MainMenu).await?;
        ops.wait_for_screen_update(ops.config().progress_window).await?;

        let state = ops.pump_state();
        debug!("State after setting TBR: {}", state);
        if self.cancels() {
            if state.tbr_active {
                return Err(CommandError::failed_enacted(
                    "Cancelling the TBR failed, a TBR is still active",
                ));
            }
            info!("TBR cancelled");
            return Ok(CommandResult::succeeded("TBR cancelled")
                .enacted(was_active)
                .with_state(state));
        }

        let duration_matches = state
            .tbr_remaining_duration
            .is_some_and(|remaining| remaining + 1 >= self.duration && remaining <= self.duration);
        if !state.tbr_active || state.tbr_percent != Some(self.percent) || !duration_matches {
            return Err(CommandError::failed_enacted(format!(
                "Verifying the TBR failed, expected {}% for {} min but pump shows {}",
                self.percent, self.duration, state
            )));
        }

        info!("TBR set to {}% for {} min", self.percent, self.duration);
        Ok(CommandResult::succeeded(format!(
            "TBR set to {}% for {} min",
            self.percent, self.duration
        ))
        .enacted(true)
        .with_state(state))
    }
}

/// Cancel the running TBR, if any
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelTbrCommand {
    alerts: AlertReconciler,
}

impl CancelTbrCommand {
    pub fn new(alerts: AlertReconciler) -> Self {
        Self { alerts }
    }
}

impl fmt::Display for CancelTbrCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelTbrCommand{}")
    }
}

#[async_trait]
impl Command for CancelTbrCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::CancelTbr
    }

    fn needs_run_mode(&self) -> bool {
        false
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let state = ops.pump_state();
        if !state.tbr_active {
            debug!("No TBR active, nothing to cancel");
            return Ok(CommandResult::succeeded("No TBR active").with_state(state));
        }
        SetTbrCommand::new(100, 0)
            .with_alerts(self.alerts)
            .execute(ops)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SimHarness;

    #[test]
    fn test_validation() {
        assert!(SetTbrCommand::new(150, 30).validate().is_empty());
        assert!(SetTbrCommand::new(100, 0).validate().is_empty());
        assert!(SetTbrCommand::new(0, 1440).validate().is_empty());

        let violations = SetTbrCommand::new(155, 20).validate();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0], "TBR percentage must be set in 10% steps");

        let violations = SetTbrCommand::new(510, 30).validate();
        assert_eq!(violations, vec!["TBR percentage must not be greater than 500%"]);

        let violations = SetTbrCommand::new(50, 1455).validate();
        assert_eq!(violations, vec!["TBR duration must be within 15 and 1440 minutes"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_tbr() {
        let harness = SimHarness::connected().await;
        let result = SetTbrCommand::new(150, 30).execute(&harness.ops()).await.unwrap();

        assert!(result.success);
        assert!(result.enacted);
        let state = result.state.unwrap();
        assert!(state.tbr_active);
        assert_eq!(state.tbr_percent, Some(150));
        assert_eq!(state.tbr_remaining_duration, Some(30));
        assert_eq!(harness.pump.tbr(), Some((150, 30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrolls_to_large_values() {
        let harness = SimHarness::connected().await;
        let result = SetTbrCommand::new(0, 240).execute(&harness.ops()).await.unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(harness.pump.tbr(), Some((0, 240)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tbr_confirms_alert() {
        let harness = SimHarness::connected().await;
        harness.pump.start_tbr(70, 60);
        harness.ops().wait_for_screen_update(std::time::Duration::from_secs(1)).await.unwrap();

        let result = CancelTbrCommand::default().execute(&harness.ops()).await.unwrap();
        assert!(result.success, "{}", result.message);
        assert!(result.enacted);
        assert!(!result.state.unwrap().tbr_active);
        assert!(harness.pump.tbr().is_none());
        assert_eq!(harness.pump.history().tbr_history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tbr_uses_injected_vocabulary() {
        use crate::safety::AlarmVocabulary;

        let harness = SimHarness::connected().await;
        harness.pump.start_tbr(70, 60);
        harness.ops().wait_for_screen_update(std::time::Duration::from_secs(1)).await.unwrap();

        let vocabulary = AlarmVocabulary::new("combo-test", &[(CommandKind::SetTbr, "TBR ENDED")]);
        let err = CancelTbrCommand::new(AlertReconciler::new(vocabulary))
            .execute(&harness.ops())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::AlarmMismatch {
                expected: "TBR ENDED".into(),
                actual: "TBR CANCELLED".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_tbr_is_noop() {
        let harness = SimHarness::connected().await;
        let result = CancelTbrCommand::default().execute(&harness.ops()).await.unwrap();
        assert!(result.success);
        assert!(!result.enacted);
        assert_eq!(result.message, "No TBR active");
        assert!(harness.pump.presses().is_empty());
    }
}
