//! Latest-snapshot slot backed by a watch channel

use combo_shared::{CommandError, Menu, MenuType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

/// A decoded screen together with its arrival time
#[derive(Debug, Clone)]
pub struct MenuSnapshot {
    pub menu: Menu,
    pub received_at: Instant,
    /// Position in the stream, strictly increasing
    pub sequence: u64,
}

impl MenuSnapshot {
    pub fn menu_type(&self) -> MenuType {
        self.menu.menu_type
    }
}

#[derive(Debug, Clone, Default)]
struct StreamState {
    snapshot: Option<Arc<MenuSnapshot>>,
    /// Number of snapshots published so far; clearing does not count
    updates: u64,
    last_updated: Option<Instant>,
}

/// Single-producer, multi-consumer holder of the current pump display.
///
/// The driver event task is the only producer. Snapshots are swapped in
/// whole; readers see either a complete snapshot or none. Waits compare
/// against the update counter, so an update that lands between reading the
/// counter and starting to wait is never missed.
pub struct MenuStateStream {
    state: watch::Sender<StreamState>,
}

impl MenuStateStream {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StreamState::default());
        Self { state }
    }

    /// Replace the current snapshot with a freshly received menu
    pub fn publish(&self, menu: Menu) {
        let now = Instant::now();
        self.state.send_modify(|state| {
            state.updates += 1;
            state.snapshot = Some(Arc::new(MenuSnapshot {
                menu,
                received_at: now,
                sequence: state.updates,
            }));
            state.last_updated = Some(now);
        });
    }

    /// Drop the current snapshot, e.g. after the link went down
    pub fn clear(&self) {
        self.state.send_modify(|state| state.snapshot = None);
    }

    /// Current snapshot, `None` if the pump is not sending updates
    pub fn latest(&self) -> Option<Arc<MenuSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn latest_type(&self) -> Option<MenuType> {
        self.state.borrow().snapshot.as_ref().map(|s| s.menu_type())
    }

    pub fn update_count(&self) -> u64 {
        self.state.borrow().updates
    }

    /// Arrival time of the last snapshot, kept across [`clear`](Self::clear)
    pub fn last_updated(&self) -> Option<Instant> {
        self.state.borrow().last_updated
    }

    /// True if a snapshot is present and arrived within `window`
    pub fn updated_within(&self, window: Duration) -> bool {
        let state = self.state.borrow();
        state.snapshot.is_some() && state.last_updated.is_some_and(|t| t.elapsed() < window)
    }

    /// Wait for any snapshot newer than the current one
    pub async fn wait_for_update(&self, wait: Duration) -> bool {
        let seen = self.update_count();
        self.wait_for_update_since(seen, wait).await
    }

    /// Wait until more than `seen` snapshots have been published
    pub async fn wait_for_update_since(&self, seen: u64, wait: Duration) -> bool {
        let mut rx = self.state.subscribe();
        timeout(wait, rx.wait_for(|state| state.updates > seen))
            .await
            .is_ok_and(|changed| changed.is_ok())
    }

    /// Wait until any snapshot is present
    pub async fn wait_for_menu(&self, wait: Duration) -> Option<Arc<MenuSnapshot>> {
        self.wait_for_matching(wait, |_| true).await
    }

    /// Wait until the pump displays `menu_type`
    pub async fn wait_for_menu_type(
        &self,
        menu_type: MenuType,
        wait: Duration,
    ) -> Result<Arc<MenuSnapshot>, CommandError> {
        match self.wait_for_matching(wait, |s| s.menu_type() == menu_type).await {
            Some(snapshot) => Ok(snapshot),
            None => Err(CommandError::menu_not_reached(format!(
                "Timeout waiting for menu {menu_type}, current menu is {}",
                self.describe_current()
            ))),
        }
    }

    /// Wait until the pump displays anything other than `menu_type`
    pub async fn wait_until_menu_type_left(
        &self,
        menu_type: MenuType,
        wait: Duration,
    ) -> Result<Arc<MenuSnapshot>, CommandError> {
        match self.wait_for_matching(wait, |s| s.menu_type() != menu_type).await {
            Some(snapshot) => Ok(snapshot),
            None => Err(CommandError::menu_not_reached(format!(
                "Timeout waiting for menu {menu_type} to be left"
            ))),
        }
    }

    /// Wait until the displayed snapshot satisfies `matches`
    pub async fn wait_for_matching(
        &self,
        wait: Duration,
        mut matches: impl FnMut(&MenuSnapshot) -> bool,
    ) -> Option<Arc<MenuSnapshot>> {
        let mut rx = self.state.subscribe();
        timeout(
            wait,
            rx.wait_for(|state| state.snapshot.as_deref().is_some_and(&mut matches)),
        )
        .await
        .ok()
        .and_then(|found| found.ok())
        .and_then(|state| state.snapshot.clone())
    }

    fn describe_current(&self) -> String {
        self.latest_type()
            .map_or_else(|| "none".to_string(), |t| t.to_string())
    }
}

impl Default for MenuStateStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combo_shared::{MenuAttribute, MenuValue};

    fn main_menu() -> Menu {
        Menu::new(MenuType::MainMenu).with(MenuAttribute::Tbr, MenuValue::Decimal(100.0))
    }

    #[tokio::test]
    async fn test_publish_replaces_snapshot() {
        let stream = MenuStateStream::new();
        assert!(stream.latest().is_none());

        stream.publish(main_menu());
        stream.publish(Menu::new(MenuType::StopMenu));

        let latest = stream.latest().unwrap();
        assert_eq!(latest.menu_type(), MenuType::StopMenu);
        assert_eq!(latest.sequence, 2);
        assert_eq!(stream.update_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_update_from_other_task() {
        let stream = Arc::new(MenuStateStream::new());
        let producer = stream.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            producer.publish(main_menu());
        });

        assert!(stream.wait_for_update(Duration::from_secs(2)).await);
        assert!(!stream.wait_for_update(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_update_before_wait_is_not_lost() {
        let stream = MenuStateStream::new();
        let seen = stream.update_count();
        stream.publish(main_menu());

        assert!(stream.wait_for_update_since(seen, Duration::ZERO).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_menu_type_times_out() {
        let stream = MenuStateStream::new();
        stream.publish(main_menu());

        let err = stream
            .wait_for_menu_type(MenuType::TbrMenu, Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MenuNotReached { .. }));
        assert!(err.to_string().contains("current menu is MAIN_MENU"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_menu_left() {
        let stream = Arc::new(MenuStateStream::new());
        stream.publish(Menu::new(MenuType::WarningOrError));
        let producer = stream.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer.publish(main_menu());
        });

        let left = stream
            .wait_until_menu_type_left(MenuType::WarningOrError, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(left.menu_type(), MenuType::MainMenu);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_is_not_an_update() {
        let stream = MenuStateStream::new();
        stream.publish(main_menu());
        assert!(stream.updated_within(Duration::from_secs(1)));

        stream.clear();
        assert!(stream.latest().is_none());
        assert!(stream.last_updated().is_some());
        assert!(!stream.updated_within(Duration::from_secs(1)));
        assert_eq!(stream.update_count(), 1);
    }
}
