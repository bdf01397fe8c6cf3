//! Basal profile commands
//!
//! Only profile 1 can be reached through the menus. The rate editor shows
//! one hourly slot at a time; the menu key moves to the next hour.

use async_trait::async_trait;
use combo_shared::history::BASAL_SLOTS;
use combo_shared::{BasalProfile, CommandError, CommandResult, Key, Menu, MenuAttribute, MenuType};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::adjust_value;
use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;

pub const MAX_BASAL_RATE: f64 = 25.0;

/// Refreshes to wait for the editor to show the next slot
const SLOT_WAIT_ATTEMPTS: u32 = 5;

fn read_rate(menu: &Menu) -> Option<f64> {
    menu.decimal(MenuAttribute::BasalRate)
}

fn validate_profile_number(number: u8) -> Option<String> {
    (number != 1).then(|| format!("Basal profile {number} is not supported, only profile 1 is"))
}

/// Open the rate editor of profile 1 at the first slot
async fn open_rate_editor(ops: &PumpOps) -> Result<(), CommandError> {
    ops.navigate_to_menu(MenuType::Basal1Menu).await?;
    ops.verify_menu_is_displayed(MenuType::Basal1Menu).await?;
    ops.press_check().await?;
    ops.verify_menu_is_displayed(MenuType::BasalTotal).await?;
    ops.press_check().await?;
    ops.verify_menu_is_displayed(MenuType::BasalSet).await?;
    Ok(())
}

async fn wait_for_slot(ops: &PumpOps, hour: usize) -> Result<(), CommandError> {
    for _ in 0..SLOT_WAIT_ATTEMPTS {
        let snapshot = ops.current_menu().await?;
        let start = snapshot.menu.time(MenuAttribute::BasalStart);
        if snapshot.menu_type() == MenuType::BasalSet && start.is_some_and(|t| t.hour as usize == hour) {
            return Ok(());
        }
        ops.wait_for_screen_update(Duration::from_secs(1)).await?;
    }
    Err(CommandError::menu_not_reached(format!(
        "Basal rate for hour {hour} not displayed"
    )))
}

async fn next_slot(ops: &PumpOps, hour: usize) -> Result<(), CommandError> {
    if hour + 1 < BASAL_SLOTS {
        ops.press_and_wait(Key::Menu).await?;
    }
    Ok(())
}

async fn read_rates(ops: &PumpOps) -> Result<Vec<f64>, CommandError> {
    open_rate_editor(ops).await?;
    let mut rates = Vec::with_capacity(BASAL_SLOTS);
    for hour in 0..BASAL_SLOTS {
        wait_for_slot(ops, hour).await?;
        let rate = ops.read_blinking_value(MenuAttribute::BasalRate, read_rate).await?;
        debug!("Basal rate {:02}:00: {} U/h", hour, rate);
        rates.push(rate);
        next_slot(ops, hour).await?;
    }
    ops.return_to_root_menu().await?;
    Ok(rates)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBasalProfileCommand {
    number: u8,
}

impl ReadBasalProfileCommand {
    pub fn new(number: u8) -> Self {
        Self { number }
    }
}

impl fmt::Display for ReadBasalProfileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadBasalProfileCommand{{number={}}}", self.number)
    }
}

#[async_trait]
impl Command for ReadBasalProfileCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ReadBasalProfile
    }

    fn validate(&self) -> Vec<String> {
        validate_profile_number(self.number).into_iter().collect()
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let profile = BasalProfile::new(self.number, read_rates(ops).await?);
        info!("Read basal profile {}, total {:.2} U", profile.number, profile.total());
        Ok(CommandResult::succeeded("Basal profile read")
            .with_basal_profile(profile)
            .with_state(ops.pump_state()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetBasalProfileCommand {
    profile: BasalProfile,
}

impl SetBasalProfileCommand {
    pub fn new(profile: BasalProfile) -> Self {
        Self { profile }
    }
}

impl fmt::Display for SetBasalProfileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetBasalProfileCommand{{number={}, total={:.2}}}",
            self.profile.number,
            self.profile.total()
        )
    }
}

#[async_trait]
impl Command for SetBasalProfileCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::SetBasalProfile
    }

    fn validate(&self) -> Vec<String> {
        let mut violations: Vec<String> = validate_profile_number(self.profile.number).into_iter().collect();
        if self.profile.hourly_rates.len() != BASAL_SLOTS {
            violations.push(format!(
                "Basal profile must have {BASAL_SLOTS} hourly rates, got {}",
                self.profile.hourly_rates.len()
            ));
        }
        for (hour, rate) in self.profile.hourly_rates.iter().enumerate() {
            if !(0.0..=MAX_BASAL_RATE).contains(rate) {
                violations.push(format!(
                    "Basal rate for hour {hour} must be between 0 and {MAX_BASAL_RATE} U/h"
                ));
            } else if (rate * 100.0 - (rate * 100.0).round()).abs() > 1e-6 {
                violations.push(format!("Basal rate for hour {hour} must be a multiple of 0.01 U/h"));
            }
        }
        violations
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        open_rate_editor(ops).await?;
        for (hour, rate) in self.profile.hourly_rates.iter().enumerate() {
            wait_for_slot(ops, hour).await?;
            adjust_value(ops, MenuAttribute::BasalRate, read_rate, *rate, 0.01).await?;
            next_slot(ops, hour).await?;
        }
        ops.press_check().await?;
        ops.verify_menu_is_displayed(MenuType::BasalTotal).await?;
        ops.return_to_root_menu().await?;

        let stored = read_rates(ops).await?;
        let mismatch = stored
            .iter()
            .zip(&self.profile.hourly_rates)
            .position(|(stored, requested)| (stored - requested).abs() > 0.005);
        if let Some(hour) = mismatch {
            return Err(CommandError::failed_enacted(format!(
                "Verifying the basal profile failed at hour {hour}: expected {}, pump has {}",
                self.profile.hourly_rates[hour], stored[hour]
            )));
        }

        info!("Basal profile {} set, total {:.2} U", self.profile.number, self.profile.total());
        Ok(CommandResult::succeeded("Basal profile set")
            .enacted(true)
            .with_basal_profile(BasalProfile::new(self.profile.number, stored))
            .with_state(ops.pump_state()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SimHarness;

    #[test]
    fn test_validation() {
        assert!(SetBasalProfileCommand::new(BasalProfile::new(1, vec![0.5; 24])).validate().is_empty());
        assert_eq!(ReadBasalProfileCommand::new(2).validate().len(), 1);

        let mut rates = vec![0.5; 24];
        rates[3] = 0.125;
        rates[7] = 30.0;
        let violations = SetBasalProfileCommand::new(BasalProfile::new(1, rates)).validate();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("hour 3"));

        let violations = SetBasalProfileCommand::new(BasalProfile::new(1, vec![0.5; 12])).validate();
        assert_eq!(violations, vec!["Basal profile must have 24 hourly rates, got 12"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_profile() {
        let harness = SimHarness::connected().await;
        let result = ReadBasalProfileCommand::new(1).execute(&harness.ops()).await.unwrap();

        let profile = result.basal_profile.unwrap();
        assert_eq!(profile.hourly_rates.len(), 24);
        assert!(profile.hourly_rates.iter().all(|r| (r - 0.8).abs() < 1e-9));
        assert_eq!(harness.state.menu.latest_type(), Some(MenuType::MainMenu));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_profile() {
        let harness = SimHarness::connected().await;
        let mut rates = vec![0.8; 24];
        rates[0] = 0.85;
        rates[6] = 1.2;
        rates[23] = 0.7;

        let result = SetBasalProfileCommand::new(BasalProfile::new(1, rates.clone()))
            .execute(&harness.ops())
            .await
            .unwrap();
        assert!(result.success, "{}", result.message);
        assert!(result.enacted);

        let stored = harness.pump.basal_rates();
        for (stored, requested) in stored.iter().zip(&rates) {
            assert!((stored - requested).abs() < 1e-9);
        }
    }
}
