//! Bolus command

use async_trait::async_trait;
use combo_shared::{CommandError, CommandResult, Key, Menu, MenuAttribute, MenuType};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::adjust_value;
use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;
use crate::safety::AlertReconciler;

pub const MAX_BOLUS: f64 = 25.0;

/// Delivery milestones reported while a bolus runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BolusProgress {
    Programming,
    Delivering { delivered: f64 },
    Delivered,
    Stopping,
    Stopped,
}

fn read_amount(menu: &Menu) -> Option<f64> {
    menu.decimal(MenuAttribute::Bolus)
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub struct BolusCommand {
    amount: f64,
    progress: Option<mpsc::UnboundedSender<BolusProgress>>,
    alerts: AlertReconciler,
    cancel_requested: AtomicBool,
    /// Set once the pump started delivering; a restarted attempt must not
    /// deliver again
    delivery_started: AtomicBool,
}

impl BolusCommand {
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            progress: None,
            alerts: AlertReconciler::default(),
            cancel_requested: AtomicBool::new(false),
            delivery_started: AtomicBool::new(false),
        }
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<BolusProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Confirm the cancellation alarm with `alerts` instead of the default vocabulary
    pub fn with_alerts(mut self, alerts: AlertReconciler) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    fn report(&self, progress: BolusProgress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(progress);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    async fn enter_amount(&self, ops: &PumpOps) -> Result<(), CommandError> {
        ops.navigate_to_menu(MenuType::BolusMenu).await?;
        ops.verify_menu_is_displayed(MenuType::BolusMenu).await?;
        ops.press_check().await?;
        ops.verify_menu_is_displayed(MenuType::BolusEnter).await?;
        adjust_value(ops, MenuAttribute::Bolus, read_amount, self.amount, 0.1).await?;

        let entered = ops.read_blinking_value(MenuAttribute::Bolus, read_amount).await?;
        if (entered - self.amount).abs() > 0.01 {
            return Err(CommandError::failed(format!(
                "Failed to set correct bolus. Expected: {}, actual: {}",
                self.amount, entered
            )));
        }
        Ok(())
    }

    /// Follow the delivery on the main menu until the remaining amount is gone
    async fn follow_delivery(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let mut delivered = 0.0;
        loop {
            if self.cancelled() {
                return self.stop_delivery(ops, delivered).await;
            }

            let snapshot = ops.current_menu().await?;
            match snapshot.menu_type() {
                MenuType::MainMenu => match snapshot.menu.decimal(MenuAttribute::BolusRemaining) {
                    Some(remaining) => {
                        let now_delivered = round_tenths(self.amount - remaining);
                        if now_delivered > delivered {
                            delivered = now_delivered;
                            debug!("Delivered {} of {} U", delivered, self.amount);
                            self.report(BolusProgress::Delivering { delivered });
                        }
                    }
                    None => break,
                },
                MenuType::WarningOrError => {
                    let message = snapshot.menu.message().unwrap_or_default();
                    warn!("Pump raised {} during bolus delivery", message);
                    return Err(CommandError::failed_enacted(format!(
                        "Pump raised {message} during bolus delivery, check the pump"
                    )));
                }
                other => {
                    return Err(CommandError::failed_enacted(format!(
                        "Unexpected menu {other} during bolus delivery, check the pump"
                    )));
                }
            }
            ops.wait_for_screen_update(Duration::from_secs(1)).await?;
        }

        self.report(BolusProgress::Delivered);
        info!("Bolus of {} U delivered", self.amount);
        Ok(CommandResult::succeeded(format!("Bolus delivered: {} U", self.amount))
            .enacted(true)
            .with_state(ops.pump_state()))
    }

    async fn stop_delivery(&self, ops: &PumpOps, delivered: f64) -> Result<CommandResult, CommandError> {
        info!("Cancelling bolus after {} U", delivered);
        self.report(BolusProgress::Stopping);
        ops.press_key(Key::Up).await?;
        if let Some(alarm) = self.alerts.vocabulary().cancel_alarm(CommandKind::Bolus) {
            self.alerts
                .confirm_alert(ops, alarm, ops.config().current_menu_timeout)
                .await?;
        }
        ops.verify_root_menu_is_displayed().await?;
        self.report(BolusProgress::Stopped);

        Ok(CommandResult::succeeded(format!(
            "Bolus cancelled, delivered {} of {} U",
            delivered, self.amount
        ))
        .enacted(delivered > 0.0)
        .with_state(ops.pump_state()))
    }
}

impl fmt::Display for BolusCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BolusCommand{{bolus={}}}", self.amount)
    }
}

#[async_trait]
impl Command for BolusCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Bolus
    }

    fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if !(self.amount > 0.0 && self.amount <= MAX_BOLUS) {
            violations.push(format!("Requested bolus must be above 0 and at most {MAX_BOLUS} U"));
        }
        if (self.amount * 10.0 - (self.amount * 10.0).round()).abs() > 1e-6 {
            violations.push("Requested bolus must be a multiple of 0.1 U".to_string());
        }
        violations
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        if self.delivery_started.load(Ordering::SeqCst) {
            return Err(CommandError::failed_enacted(
                "Connection to the pump was lost during bolus delivery, check the pump history",
            ));
        }

        self.report(BolusProgress::Programming);
        self.enter_amount(ops).await?;
        if self.cancelled() {
            info!("Bolus cancelled before delivery started");
            ops.return_to_root_menu().await?;
            self.report(BolusProgress::Stopped);
            return Ok(CommandResult::succeeded("Bolus cancelled before delivery")
                .with_state(ops.pump_state()));
        }

        ops.press_check().await?;
        self.delivery_started.store(true, Ordering::SeqCst);
        self.report(BolusProgress::Delivering { delivered: 0.0 });
        ops.verify_menu_is_displayed(MenuType::MainMenu).await?;
        self.follow_delivery(ops).await
    }

    fn request_cancellation(&self) -> bool {
        info!("Bolus cancellation requested");
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }
}
