//! Alert reconciliation
//!
//! Warning screens are only confirmed when they carry the alarm the caller
//! expects. Anything else is reported as [`CommandError::AlarmMismatch`] and
//! left on the display for the user.

use combo_shared::{CommandError, MenuType};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::alarms::AlarmVocabulary;
use crate::command::CommandKind;
use crate::pump::PumpOps;

/// Poll step while waiting for a warning screen to appear
const ALERT_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct AlertReconciler {
    vocabulary: AlarmVocabulary,
}

impl AlertReconciler {
    pub fn new(vocabulary: AlarmVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &AlarmVocabulary {
        &self.vocabulary
    }

    /// Wait up to `max_wait` for a warning screen showing `expected` and
    /// dismiss it. Returns false if no warning appeared in time.
    pub async fn confirm_alert(
        &self,
        ops: &PumpOps,
        expected: &str,
        max_wait: Duration,
    ) -> Result<bool, CommandError> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(snapshot) = ops.menu_stream().latest() {
                if snapshot.menu_type() == MenuType::WarningOrError {
                    let actual = snapshot.menu.message().unwrap_or_default();
                    if actual != expected {
                        return Err(CommandError::AlarmMismatch {
                            expected: expected.to_string(),
                            actual: actual.to_string(),
                        });
                    }

                    info!("Confirming expected alert {}", expected);
                    ops.press_check().await?;
                    ops.verify_menu_is_displayed(MenuType::WarningOrError).await?;
                    ops.press_check().await?;
                    ops.wait_for_menu_to_be_left(MenuType::WarningOrError).await?;
                    return Ok(true);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            ops.wait_for_screen_update(remaining.min(ALERT_POLL)).await?;
        }
    }

    /// Dismiss the alarm a link loss during a `kind` command leaves behind.
    ///
    /// Only the alarm `kind` is known to cause is touched; any other warning
    /// stays on screen.
    pub async fn clear_expected_alarm(&self, ops: &PumpOps, kind: CommandKind) -> Result<bool, CommandError> {
        let Some(expected) = self.vocabulary.link_loss_alarm(kind) else {
            return Ok(false);
        };
        let Some(snapshot) = ops.menu_stream().latest() else {
            return Ok(false);
        };
        if snapshot.menu_type() != MenuType::WarningOrError || snapshot.menu.message() != Some(expected) {
            return Ok(false);
        }

        warn!(
            "Pump shows {} after the link dropped during {}, confirming it",
            expected, kind
        );
        self.confirm_alert(ops, expected, ops.config().current_menu_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::alarms::BOLUS_CANCELLED;
    use crate::test_support::SimHarness;
    use combo_shared::Key;

    async fn harness_with_alert(message: &str) -> SimHarness {
        let harness = SimHarness::connected().await;
        harness.pump.raise_alert(message, 8);
        harness
            .state
            .menu
            .wait_for_menu_type(MenuType::WarningOrError, Duration::from_secs(2))
            .await
            .unwrap();
        harness
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_expected_alert() {
        let harness = harness_with_alert(BOLUS_CANCELLED).await;
        let confirmed = AlertReconciler::default()
            .confirm_alert(&harness.ops(), BOLUS_CANCELLED, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(confirmed);
        assert_eq!(harness.pump.presses(), vec![Key::Check, Key::Check]);
        assert!(harness.state.menu.latest_type().unwrap().is_root());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_alert_is_not_dismissed() {
        let harness = harness_with_alert("OCCLUSION").await;
        let err = AlertReconciler::default()
            .confirm_alert(&harness.ops(), BOLUS_CANCELLED, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::AlarmMismatch {
                expected: BOLUS_CANCELLED.into(),
                actual: "OCCLUSION".into()
            }
        );
        assert!(harness.pump.presses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alert_within_window() {
        let harness = SimHarness::connected().await;
        let confirmed = AlertReconciler::default()
            .confirm_alert(&harness.ops(), BOLUS_CANCELLED, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(!confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_only_the_expected_alarm() {
        let harness = harness_with_alert("OCCLUSION").await;
        let reconciler = AlertReconciler::default();
        let ops = harness.ops();

        assert!(!reconciler.clear_expected_alarm(&ops, CommandKind::Bolus).await.unwrap());
        assert!(harness.pump.presses().is_empty());

        let harness = harness_with_alert("TBR CANCELLED").await;
        let ops = harness.ops();
        assert!(!reconciler.clear_expected_alarm(&ops, CommandKind::ReadPumpState).await.unwrap());
        assert!(reconciler.clear_expected_alarm(&ops, CommandKind::SetTbr).await.unwrap());
    }
}
