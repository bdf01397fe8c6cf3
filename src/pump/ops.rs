//! Key and navigation primitives used by commands
//!
//! Every wait observes the attempt's cancellation token and fails with
//! [`CommandError::Interrupted`] once it fires. Key presses are never cut
//! short; the token is checked before each press instead.

use combo_shared::{CommandError, Key, Menu, MenuAttribute, MenuType, PumpState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::driver::PumpDriver;
use super::snapshot::pump_state_from;
use crate::config::ScripterConfig;
use crate::menu::{MenuSnapshot, MenuStateStream};
use crate::state::ScripterState;

/// Attempts at reading a value that blinks while being edited
const BLINK_READ_ATTEMPTS: u32 = 5;

/// Handle a command uses to drive the pump during one attempt
#[derive(Clone)]
pub struct PumpOps {
    driver: Arc<dyn PumpDriver>,
    state: Arc<ScripterState>,
    config: Arc<ScripterConfig>,
    cancel: CancellationToken,
}

impl PumpOps {
    pub fn new(
        driver: Arc<dyn PumpDriver>,
        state: Arc<ScripterState>,
        config: Arc<ScripterConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            state,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &ScripterConfig {
        &self.config
    }

    pub fn menu_stream(&self) -> &MenuStateStream {
        &self.state.menu
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Normalized state of the current snapshot
    pub fn pump_state(&self) -> PumpState {
        let latest = self.state.menu.latest();
        pump_state_from(latest.as_deref().map(|s| &s.menu))
    }

    async fn interruptible<T>(&self, fut: impl Future<Output = T>) -> Result<T, CommandError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CommandError::Interrupted),
            out = fut => Ok(out),
        }
    }

    /// Sleep unless interrupted
    pub async fn sleep(&self, duration: Duration) -> Result<(), CommandError> {
        self.interruptible(tokio::time::sleep(duration)).await
    }

    /// The displayed menu, waiting briefly if none is shown yet
    pub async fn current_menu(&self) -> Result<Arc<MenuSnapshot>, CommandError> {
        if let Some(snapshot) = self.state.menu.latest() {
            return Ok(snapshot);
        }
        debug!("No menu displayed, waiting for one");
        self.interruptible(self.state.menu.wait_for_menu(self.config.current_menu_timeout))
            .await?
            .ok_or_else(|| CommandError::failed("Unable to read current menu"))
    }

    pub async fn current_menu_type(&self) -> Result<MenuType, CommandError> {
        Ok(self.current_menu().await?.menu_type())
    }

    pub async fn press_key(&self, key: Key) -> Result<(), CommandError> {
        self.press_key_for(key, self.config.key_press_hold).await
    }

    /// Hold `key` for `hold`; holding up or down scrolls
    pub async fn press_key_for(&self, key: Key, hold: Duration) -> Result<(), CommandError> {
        if self.cancel.is_cancelled() {
            return Err(CommandError::Interrupted);
        }
        debug!("Pressing {:?} key for {}ms", key, hold.as_millis());
        self.driver
            .press(key, hold)
            .await
            .map_err(|e| CommandError::unexpected("Error while pressing buttons", format!("{e:#}")))
    }

    pub async fn press_up(&self) -> Result<(), CommandError> {
        self.press_key(Key::Up).await
    }

    pub async fn press_down(&self) -> Result<(), CommandError> {
        self.press_key(Key::Down).await
    }

    pub async fn press_check(&self) -> Result<(), CommandError> {
        self.press_key(Key::Check).await
    }

    pub async fn press_menu(&self) -> Result<(), CommandError> {
        self.press_key(Key::Menu).await
    }

    pub async fn press_back(&self) -> Result<(), CommandError> {
        self.press_key(Key::Back).await
    }

    /// Press `key` and wait for the display to refresh afterwards
    pub async fn press_and_wait(&self, key: Key) -> Result<bool, CommandError> {
        let seen = self.state.menu.update_count();
        self.press_key(key).await?;
        self.interruptible(
            self.state
                .menu
                .wait_for_update_since(seen, self.config.current_menu_timeout),
        )
        .await
    }

    /// Wait for the next snapshot, failing after the menu update timeout
    pub async fn wait_for_menu_update(&self) -> Result<(), CommandError> {
        if self.wait_for_screen_update(self.config.menu_update_timeout).await? {
            Ok(())
        } else {
            Err(CommandError::failed("Timeout waiting for menu update"))
        }
    }

    /// Wait up to `wait` for the next snapshot
    pub async fn wait_for_screen_update(&self, wait: Duration) -> Result<bool, CommandError> {
        self.interruptible(self.state.menu.wait_for_update(wait)).await
    }

    /// Press the menu key until `desired` is displayed
    pub async fn navigate_to_menu(&self, desired: MenuType) -> Result<(), CommandError> {
        let mut presses = 0;
        loop {
            let current = self.current_menu_type().await?;
            if current == desired {
                return Ok(());
            }
            if presses >= self.config.navigation_max_presses {
                return Err(CommandError::menu_not_reached(format!(
                    "Menu not found searching for {desired}. Check menu settings on your pump to ensure it's not hidden."
                )));
            }
            debug!("Navigating to menu {}, current menu: {}", desired, current);
            self.press_and_wait(Key::Menu).await?;
            presses += 1;
        }
    }

    /// Wait until `expected` is displayed
    pub async fn verify_menu_is_displayed(&self, expected: MenuType) -> Result<Arc<MenuSnapshot>, CommandError> {
        let found = self
            .interruptible(
                self.state
                    .menu
                    .wait_for_menu_type(expected, self.config.menu_update_timeout),
            )
            .await?;
        found.map_err(|_| {
            let current = self
                .state
                .menu
                .latest_type()
                .map_or_else(|| "none".to_string(), |t| t.to_string());
            CommandError::menu_not_reached(format!(
                "Invalid pump state, expected to be in menu {expected}, but current menu is {current}"
            ))
        })
    }

    /// Wait until the main or stop menu is displayed
    pub async fn verify_root_menu_is_displayed(&self) -> Result<Arc<MenuSnapshot>, CommandError> {
        self.interruptible(
            self.state
                .menu
                .wait_for_matching(self.config.menu_update_timeout, |s| s.menu_type().is_root()),
        )
        .await?
        .ok_or_else(|| {
            CommandError::menu_not_reached("Invalid pump state, expected to be in the main or stop menu")
        })
    }

    pub async fn wait_for_menu_to_be_left(&self, menu_type: MenuType) -> Result<(), CommandError> {
        self.interruptible(
            self.state
                .menu
                .wait_until_menu_type_left(menu_type, self.config.menu_update_timeout),
        )
        .await??;
        Ok(())
    }

    /// Press back until the main or stop menu is displayed
    pub async fn return_to_root_menu(&self) -> Result<(), CommandError> {
        let mut presses = 0;
        loop {
            let snapshot = self.current_menu().await?;
            let current = snapshot.menu_type();
            if current.is_root() {
                return Ok(());
            }
            if current == MenuType::WarningOrError {
                return Err(CommandError::failed(format!(
                    "Alert {} is displayed, check the pump",
                    snapshot.menu.message().unwrap_or("<unreadable>")
                )));
            }
            if presses >= self.config.navigation_max_presses {
                return Err(CommandError::menu_not_reached(format!(
                    "Unable to return to the main menu, current menu is {current}"
                )));
            }
            debug!("Going back to main menu, currently at {}", current);
            self.press_and_wait(Key::Back).await?;
            presses += 1;
        }
    }

    /// Read a value that may be blanked by blinking, retrying on the next refreshes
    pub async fn read_blinking_value<T>(
        &self,
        attribute: MenuAttribute,
        read: impl Fn(&Menu) -> Option<T>,
    ) -> Result<T, CommandError> {
        for _ in 0..BLINK_READ_ATTEMPTS {
            let snapshot = self.current_menu().await?;
            if let Some(value) = read(&snapshot.menu) {
                return Ok(value);
            }
            self.wait_for_screen_update(Duration::from_secs(1)).await?;
        }
        Err(CommandError::failed(format!("Failed to read blinking value: {attribute}")))
    }
}
