//! Connection supervisor
//!
//! Brings the pump link up on demand and tracks its state. The link counts
//! as up only while menu snapshots keep arriving; a successful connect call
//! alone proves nothing.

use combo_shared::CommandError;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::command::CommandKind;
use crate::config::ScripterConfig;
use crate::pump::{PumpDriver, PumpOps};
use crate::safety::AlertReconciler;
use crate::state::ScripterState;

/// Link state as seen by the scripter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

pub struct ConnectionSupervisor {
    driver: Arc<dyn PumpDriver>,
    state: Arc<ScripterState>,
    config: Arc<ScripterConfig>,
    alerts: AlertReconciler,
    status: watch::Sender<ConnectionState>,
    last_disconnect: RwLock<Option<Instant>>,
}

impl ConnectionSupervisor {
    pub fn new(
        driver: Arc<dyn PumpDriver>,
        state: Arc<ScripterState>,
        config: Arc<ScripterConfig>,
        alerts: AlertReconciler,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            driver,
            state,
            config,
            alerts,
            status,
            last_disconnect: RwLock::new(None),
        }
    }

    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.status.subscribe()
    }

    /// Link status as reported by the driver
    pub fn link_up(&self) -> bool {
        self.driver.is_connected()
    }

    pub async fn last_disconnect(&self) -> Option<Instant> {
        *self.last_disconnect.read().await
    }

    fn set_status(&self, new: ConnectionState) {
        let changed = self.status.send_if_modified(|current| {
            if *current == new {
                return false;
            }
            *current = new;
            true
        });
        if changed {
            debug!("Pump link {}", new);
        }
    }

    async fn request_connect(&self) {
        if let Err(e) = self.driver.connect().await {
            warn!("Connect request to {} failed: {:#}", self.driver.name(), e);
        }
    }

    /// Return once menu snapshots are arriving, connecting if needed.
    ///
    /// The connect request is reissued every reissue interval without
    /// resetting the overall budget.
    pub async fn ensure_connected(&self) -> Result<(), CommandError> {
        if self.link_up() && self.state.menu.updated_within(self.config.connected_freshness) {
            self.set_status(ConnectionState::Connected);
            return Ok(());
        }

        let started = Instant::now();
        let deadline = started + self.config.connect_timeout;
        info!("Connecting to pump via {}", self.driver.name());
        self.set_status(ConnectionState::Connecting);

        let mut seen = self.state.menu.update_count();
        self.request_connect().await;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.set_status(ConnectionState::Disconnected);
                warn!(
                    "No menu update from the pump within {}s, giving up",
                    self.config.connect_timeout.as_secs()
                );
                return Err(CommandError::ConnectionTimeout {
                    waited: started.elapsed(),
                });
            }

            let wait = remaining.min(self.config.connect_reissue_interval);
            if self.state.menu.wait_for_update_since(seen, wait).await {
                self.set_status(ConnectionState::Connected);
                info!("Connected to pump after {:.1}s", started.elapsed().as_secs_f64());
                return Ok(());
            }
            if Instant::now() >= deadline {
                continue;
            }

            warn!(
                "No menu update after {}s, reissuing connect request",
                started.elapsed().as_secs()
            );
            seen = self.state.menu.update_count();
            if let Err(e) = self.driver.disconnect().await {
                warn!("Disconnect before reconnecting failed: {:#}", e);
            }
            sleep(self.config.connect_reissue_settle).await;
            self.request_connect().await;
        }
    }

    /// Restore the link after it dropped while a `kind` command was running
    /// and bring the pump back to its root menu.
    pub async fn reconnect(&self, kind: CommandKind, ops: &PumpOps) -> Result<(), CommandError> {
        info!("Reconnecting to resume {}", kind);
        self.ensure_connected().await?;
        self.alerts.clear_expected_alarm(ops, kind).await?;
        ops.return_to_root_menu().await
    }

    /// Drop the link. Callers must hold the execution lock.
    pub async fn disconnect(&self) {
        debug!("Disconnecting from pump");
        if let Err(e) = self.driver.disconnect().await {
            warn!("Disconnect from {} failed: {:#}", self.driver.name(), e);
        }
        *self.last_disconnect.write().await = Some(Instant::now());
        self.state.menu.clear();
        self.set_status(ConnectionState::Disconnected);
    }

    pub(crate) fn on_menu_update(&self) {
        if self.status() != ConnectionState::Connecting {
            self.set_status(ConnectionState::Connected);
        }
    }

    pub(crate) fn on_link_stopped(&self) {
        self.state.menu.clear();
        self.set_status(ConnectionState::Disconnected);
    }
}
