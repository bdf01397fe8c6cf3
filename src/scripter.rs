//! Pump scripter facade
//!
//! Wires the shared state, the connection supervisor, the idle monitor, the
//! executor and the driver event task together and exposes the caller API.

use combo_shared::{BasalProfile, CommandResult, HistoryRequest, MenuType, PumpState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::handlers::{
    BolusCommand, BolusProgress, CancelTbrCommand, ReadBasalProfileCommand, ReadHistoryCommand,
    ReadPumpStateCommand, SetBasalProfileCommand, SetTbrCommand, TakeOverAlarmsCommand,
};
use crate::command::{Command, CommandExecutor, CommandKind};
use crate::config::ScripterConfig;
use crate::connection::{ConnectionState, ConnectionSupervisor, IdleDisconnectMonitor, IdleMonitorHandle};
use crate::pump::{DriverEvent, DriverEventReceiver, PumpDriver, PumpStateSnapshotter};
use crate::safety::{AlarmVocabulary, AlertReconciler};
use crate::state::ScripterState;

/// Remote control for one pump. Clones share the same pump.
#[derive(Clone)]
pub struct PumpScripter {
    inner: Arc<Inner>,
}

struct Inner {
    state: Arc<ScripterState>,
    supervisor: Arc<ConnectionSupervisor>,
    executor: CommandExecutor,
    snapshotter: PumpStateSnapshotter,
    alerts: AlertReconciler,
    started: AtomicBool,
    idle: Mutex<Option<IdleMonitorHandle>>,
    events: Mutex<Option<JoinHandle<()>>>,
}

impl PumpScripter {
    /// Start the scripter on top of `driver`, consuming the driver's events
    pub fn start(driver: Arc<dyn PumpDriver>, events: DriverEventReceiver, config: ScripterConfig) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(ScripterState::new());
        let alerts = AlertReconciler::new(AlarmVocabulary::COMBO_V1);
        let supervisor = Arc::new(ConnectionSupervisor::new(
            driver.clone(),
            state.clone(),
            config.clone(),
            alerts,
        ));
        let executor = CommandExecutor::new(
            driver.clone(),
            state.clone(),
            config.clone(),
            supervisor.clone(),
            alerts,
        );

        let idle = Arc::new(IdleDisconnectMonitor::new(supervisor.clone(), state.clone(), config))
            .start_monitoring();
        let inner = Arc::new(Inner {
            snapshotter: PumpStateSnapshotter::new(state.clone()),
            state,
            supervisor,
            executor,
            alerts,
            started: AtomicBool::new(true),
            idle: Mutex::new(Some(idle)),
            events: Mutex::new(None),
        });

        let event_task = tokio::spawn(handle_driver_events(events, inner.clone()));
        if let Ok(mut slot) = inner.events.try_lock() {
            *slot = Some(event_task);
        }

        info!("Pump scripter started on {}", driver.name());
        Self { inner }
    }

    /// Stop the background tasks and drop the link
    pub async fn shutdown(&self) {
        info!("Shutting down pump scripter");
        self.inner.started.store(false, Ordering::SeqCst);
        if let Some(idle) = self.inner.idle.lock().await.take() {
            idle.stop().await;
        }
        let _guard = self.inner.state.execution_lock().lock().await;
        self.inner.supervisor.disconnect().await;
        if let Some(task) = self.inner.events.lock().await.take() {
            task.abort();
        }
    }

    /// Execute `command`, waiting for any running command to finish first
    pub async fn run_command(&self, command: Arc<dyn Command>) -> CommandResult {
        self.inner.executor.run(command).await
    }

    /// True while the scripter is started and has not hit an unrecoverable error
    pub async fn is_pump_available(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && self.inner.state.is_healthy().await
    }

    pub async fn is_pump_busy(&self) -> bool {
        self.inner.state.active.is_busy()
    }

    /// Ask the running command to stop. False if nothing runs or the
    /// command cannot be cancelled.
    pub async fn request_cancellation(&self) -> bool {
        match self.inner.state.active.get() {
            Some(command) => {
                info!("Cancellation requested for {}", command);
                command.request_cancellation()
            }
            None => false,
        }
    }

    /// Stop the running bolus, if the running command is one
    pub async fn cancel_bolus(&self) -> bool {
        match self.inner.state.active.get() {
            Some(command) if command.kind() == CommandKind::Bolus => command.request_cancellation(),
            _ => {
                debug!("No bolus running, nothing to cancel");
                false
            }
        }
    }

    /// Pump state derived from the latest snapshot, without touching the pump
    pub fn current_state(&self) -> PumpState {
        self.inner.snapshotter.read()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.supervisor.status()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.supervisor.subscribe()
    }

    /// Reason every command is refused, if the scripter is unrecoverable
    pub async fn unrecoverable_error(&self) -> Option<String> {
        self.inner.state.unrecoverable_error().await
    }

    pub async fn read_pump_state(&self) -> CommandResult {
        self.run_command(Arc::new(ReadPumpStateCommand)).await
    }

    pub async fn deliver_bolus(
        &self,
        amount: f64,
        progress: Option<mpsc::UnboundedSender<BolusProgress>>,
    ) -> CommandResult {
        let mut command = BolusCommand::new(amount).with_alerts(self.inner.alerts);
        if let Some(progress) = progress {
            command = command.with_progress(progress);
        }
        self.run_command(Arc::new(command)).await
    }

    pub async fn set_tbr(&self, percent: u32, duration: u32) -> CommandResult {
        self.run_command(Arc::new(SetTbrCommand::new(percent, duration).with_alerts(self.inner.alerts))).await
    }

    pub async fn cancel_tbr(&self) -> CommandResult {
        self.run_command(Arc::new(CancelTbrCommand::new(self.inner.alerts))).await
    }

    pub async fn read_basal_profile(&self, number: u8) -> CommandResult {
        self.run_command(Arc::new(ReadBasalProfileCommand::new(number))).await
    }

    pub async fn set_basal_profile(&self, profile: BasalProfile) -> CommandResult {
        self.run_command(Arc::new(SetBasalProfileCommand::new(profile))).await
    }

    pub async fn read_history(&self, request: HistoryRequest) -> CommandResult {
        self.run_command(Arc::new(ReadHistoryCommand::new(request))).await
    }

    pub async fn take_over_alarms(&self) -> CommandResult {
        self.run_command(Arc::new(TakeOverAlarmsCommand::new(self.inner.alerts))).await
    }
}

/// Feed driver events into the menu stream until the driver goes away
async fn handle_driver_events(mut events: DriverEventReceiver, inner: Arc<Inner>) {
    let mut last_type: Option<MenuType> = None;
    while let Some(event) = events.recv().await {
        match event {
            DriverEvent::MenuUpdated(menu) => {
                let menu_type = menu.menu_type;
                let raised = menu_type == MenuType::WarningOrError && last_type != Some(menu_type);
                if raised && !inner.state.active.is_busy() {
                    warn!(
                        "Pump raised {} while no command is running",
                        menu.message().unwrap_or("an alert")
                    );
                }
                last_type = Some(menu_type);
                inner.state.menu.publish(menu);
                inner.supervisor.on_menu_update();
            }
            DriverEvent::NoMenu => {
                last_type = None;
                inner.state.menu.clear();
            }
            DriverEvent::LinkStarted => debug!("Pump link started"),
            DriverEvent::LinkStopped => {
                last_type = None;
                info!("Pump link stopped");
                inner.supervisor.on_link_stopped();
            }
            DriverEvent::Log(line) => debug!("[DRIVER] {}", line),
            DriverEvent::Fail(message) => warn!("[DRIVER] failure reported: {}", message),
            DriverEvent::BluetoothRequested => warn!("[DRIVER] Bluetooth must be enabled to reach the pump"),
        }
    }

    if inner.started.load(Ordering::SeqCst) {
        error!("Driver event channel closed");
        inner.state.menu.clear();
        inner.state.mark_unrecoverable("Pump driver went away").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::{SimConfig, SimulatedPump};
    use std::time::Duration;
    use tokio::time::sleep;

    fn scripter() -> (PumpScripter, Arc<SimulatedPump>) {
        let (pump, events) = SimulatedPump::new(SimConfig::default());
        (PumpScripter::start(pump.clone(), events, ScripterConfig::default()), pump)
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_state_connects_on_demand() {
        let (scripter, pump) = scripter();
        assert!(scripter.is_pump_available().await);
        assert!(!scripter.current_state().is_available());

        let result = scripter.read_pump_state().await;
        assert!(result.success, "{}", result.message);
        assert_eq!(pump.connect_count(), 1);
        assert_eq!(scripter.connection_state(), ConnectionState::Connected);
        assert!(scripter.current_state().is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_link_is_dropped() {
        let (scripter, pump) = scripter();
        scripter.read_pump_state().await;

        sleep(Duration::from_secs(10)).await;
        assert_eq!(pump.disconnect_count(), 1);
        assert_eq!(scripter.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_without_command() {
        let (scripter, _pump) = scripter();
        assert!(!scripter.request_cancellation().await);
        assert!(!scripter.cancel_bolus().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disconnects() {
        let (scripter, pump) = scripter();
        scripter.read_pump_state().await;

        scripter.shutdown().await;
        assert!(!scripter.is_pump_available().await);
        assert!(!pump.is_connected());
        assert!(scripter.unrecoverable_error().await.is_none());
    }
}
