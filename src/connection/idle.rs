//! Idle Disconnect Monitor
//!
//! Runs a background task that drops the pump link once no command has run
//! for a while, so the pump can save battery.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::supervisor::ConnectionSupervisor;
use crate::config::ScripterConfig;
use crate::state::ScripterState;

pub struct IdleDisconnectMonitor {
    supervisor: Arc<ConnectionSupervisor>,
    state: Arc<ScripterState>,
    config: Arc<ScripterConfig>,
}

impl IdleDisconnectMonitor {
    pub fn new(
        supervisor: Arc<ConnectionSupervisor>,
        state: Arc<ScripterState>,
        config: Arc<ScripterConfig>,
    ) -> Self {
        Self {
            supervisor,
            state,
            config,
        }
    }

    /// Start the monitoring background task
    pub fn start_monitoring(self: Arc<Self>) -> IdleMonitorHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let task = tokio::spawn(async move {
            self.run(stop).await;
        });
        IdleMonitorHandle { cancel, task }
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.idle_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.state.is_healthy().await {
                break;
            }

            if self.check_once().await {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.config.idle_disconnect_settle) => {}
                }
            }
        }

        info!("[IDLE] Monitoring stopped");
    }

    /// Disconnect if the link has been idle long enough; true if it did
    pub async fn check_once(&self) -> bool {
        if !self.supervisor.link_up() {
            return false;
        }
        // A command holding the lock is about to use the link
        let Ok(_guard) = self.state.execution_lock().try_lock() else {
            return false;
        };
        if self.state.active.is_busy() {
            return false;
        }

        let now = Instant::now();
        let idle_for = self
            .state
            .active
            .last_finished()
            .map_or(Duration::MAX, |t| now.duration_since(t));
        if idle_for < self.config.idle_disconnect_timeout {
            return false;
        }
        if let Some(last) = self.supervisor.last_disconnect().await {
            if now.duration_since(last) < self.config.idle_disconnect_debounce {
                debug!("[IDLE] Disconnected recently, holding off");
                return false;
            }
        }

        info!("[IDLE] Link idle, disconnecting from pump");
        self.supervisor.disconnect().await;
        true
    }
}

/// Handle to stop idle monitoring
pub struct IdleMonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl IdleMonitorHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
