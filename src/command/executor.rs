//! Command executor - serializes, supervises and reports commands
//!
//! Every command runs under the global execution lock in its own task. The
//! executor watches that task with a dynamic and an absolute timeout and
//! restarts it after a mid-command link loss. Whatever happens, the caller
//! gets a populated [`CommandResult`].

use chrono::Local;
use combo_shared::{CommandError, CommandResult, CommandTiming, MenuType};
use std::sync::Arc;
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use super::traits::Command;
use crate::config::ScripterConfig;
use crate::connection::ConnectionSupervisor;
use crate::pump::{PumpDriver, PumpOps, PumpStateSnapshotter};
use crate::safety::AlertReconciler;
use crate::state::ScripterState;

/// Aborted when dropped, so an abandoned `run` leaves no attempt behind
type Attempt = AbortOnDropHandle<Result<CommandResult, CommandError>>;

/// Executes commands against the pump, one at a time
pub struct CommandExecutor {
    driver: Arc<dyn PumpDriver>,
    state: Arc<ScripterState>,
    config: Arc<ScripterConfig>,
    supervisor: Arc<ConnectionSupervisor>,
    alerts: AlertReconciler,
    snapshotter: PumpStateSnapshotter,
}

impl CommandExecutor {
    pub fn new(
        driver: Arc<dyn PumpDriver>,
        state: Arc<ScripterState>,
        config: Arc<ScripterConfig>,
        supervisor: Arc<ConnectionSupervisor>,
        alerts: AlertReconciler,
    ) -> Self {
        Self {
            snapshotter: PumpStateSnapshotter::new(state.clone()),
            driver,
            state,
            config,
            supervisor,
            alerts,
        }
    }

    fn ops(&self, cancel: CancellationToken) -> PumpOps {
        PumpOps::new(
            self.driver.clone(),
            self.state.clone(),
            self.config.clone(),
            cancel,
        )
    }

    /// Run a command to completion. Never fails; errors become failed results.
    pub async fn run(&self, command: Arc<dyn Command>) -> CommandResult {
        let request = command.to_string();

        if let Some(reason) = self.state.unrecoverable_error().await {
            warn!("Refusing {}, scripter is in an unrecoverable state", request);
            return self.finish(CommandError::Unrecoverable { reason }.into_result(), &request, None);
        }

        let violations = command.validate();
        if !violations.is_empty() {
            warn!("Rejecting {}: {}", request, violations.join(", "));
            return self.finish(CommandError::Validation { violations }.into_result(), &request, None);
        }

        let _guard = self.state.execution_lock().lock().await;
        let active = self.state.active.set(command.clone());
        info!("Executing {}", request);

        let mut timing = CommandTiming {
            connect: Default::default(),
            execution: Default::default(),
        };
        let result = match self.run_locked(&command, &mut timing).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} failed: {}", request, e);
                e.into_result()
            }
        };
        let result = self.finish(result, &request, Some(timing));

        drop(active);
        info!("{} finished: {}", request, result);
        result
    }

    fn finish(&self, mut result: CommandResult, request: &str, timing: Option<CommandTiming>) -> CommandResult {
        if result.state.is_none() {
            result.state = Some(self.snapshotter.read());
        }
        result.timing = timing;
        result.request = Some(request.to_string());
        result.completed_at = Some(Local::now());
        result
    }

    async fn run_locked(
        &self,
        command: &Arc<dyn Command>,
        timing: &mut CommandTiming,
    ) -> Result<CommandResult, CommandError> {
        let connect_started = Instant::now();
        let connected = self.supervisor.ensure_connected().await;
        timing.connect = connect_started.elapsed();
        connected?;

        let execution_started = Instant::now();
        let result = self.prepare_and_supervise(command).await;
        timing.execution = execution_started.elapsed();
        result
    }

    async fn prepare_and_supervise(&self, command: &Arc<dyn Command>) -> Result<CommandResult, CommandError> {
        let ops = self.ops(CancellationToken::new());
        self.alerts.clear_expected_alarm(&ops, command.kind()).await?;

        if command.needs_run_mode() {
            let menu = self.state.menu.latest_type();
            if matches!(menu, None | Some(MenuType::StopMenu)) {
                return Ok(CommandResult::failed("Pump is suspended"));
            }
        }

        self.supervise(command).await
    }

    async fn supervise(&self, command: &Arc<dyn Command>) -> Result<CommandResult, CommandError> {
        let mut reconnects = 0;
        loop {
            let cancel = CancellationToken::new();
            let ops = self.ops(cancel.clone());
            let attempt_command = command.clone();
            let mut task: Attempt =
                AbortOnDropHandle::new(tokio::spawn(async move { attempt_command.execute(&ops).await }));

            let started = Instant::now();
            let absolute = started + self.config.absolute_timeout;
            let mut dynamic = started + self.config.dynamic_timeout;
            let mut link_check = interval(self.config.link_check_interval);
            link_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut finished = false;
            loop {
                tokio::select! {
                    biased;
                    joined = &mut task => {
                        let outcome = joined.unwrap_or_else(|e| {
                            Err(CommandError::unexpected("Command task failed", e))
                        });
                        // A failed press is usually the first sign of a dropped link
                        if outcome.is_err() && !self.supervisor.link_up() {
                            finished = true;
                            break;
                        }
                        return outcome;
                    }
                    _ = sleep_until(absolute) => {
                        error!("{} exceeded {}s, interrupting", command, self.config.absolute_timeout.as_secs());
                        self.interrupt(task, &cancel).await;
                        return Err(CommandError::TimedOut {
                            command: command.to_string(),
                            limit: self.config.absolute_timeout,
                        });
                    }
                    _ = sleep_until(dynamic) => {
                        let progressing = self.state.menu.updated_within(self.config.progress_window);
                        // A blank display is no sign of progress
                        let off_main = matches!(
                            self.state.menu.latest_type(),
                            Some(menu) if menu != MenuType::MainMenu
                        );
                        if progressing || off_main {
                            debug!("{} still in progress, extending timeout", command);
                            dynamic = Instant::now() + self.config.timeout_extension;
                        } else {
                            error!("{} made no progress, interrupting", command);
                            self.interrupt(task, &cancel).await;
                            return Err(CommandError::Stalled);
                        }
                    }
                    _ = link_check.tick() => {
                        if !self.supervisor.link_up() {
                            break;
                        }
                    }
                }
            }

            warn!("Link to pump lost while running {}", command);
            if !finished {
                self.interrupt(task, &cancel).await;
            }
            if reconnects >= self.config.max_reconnects {
                return Err(CommandError::failed(format!(
                    "Connection to pump lost {} times while running the command, check pump!",
                    reconnects + 1
                )));
            }
            reconnects += 1;

            let reconnect_ops = self.ops(CancellationToken::new());
            self.supervisor.reconnect(command.kind(), &reconnect_ops).await?;
            info!("Restarting {} ({} of {})", command, reconnects, self.config.max_reconnects);
        }
    }

    /// Cancel an attempt and give it the grace period to unwind
    async fn interrupt(&self, mut task: Attempt, cancel: &CancellationToken) {
        cancel.cancel();
        match timeout(self.config.interrupt_grace, &mut task).await {
            Ok(_) => debug!("Interrupted attempt stopped"),
            Err(_) => {
                warn!(
                    "Attempt did not stop within {}s of being interrupted, aborting it",
                    self.config.interrupt_grace.as_secs()
                );
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::test_support::SimHarness;
    use async_trait::async_trait;
    use combo_shared::Key;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Waits on the pump for a while, optionally ignoring interrupts
    struct Wait {
        duration: Duration,
        cooperative: bool,
        attempts: AtomicU32,
        completions: AtomicU32,
        kind: CommandKind,
    }

    impl Wait {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                cooperative: true,
                attempts: AtomicU32::new(0),
                completions: AtomicU32::new(0),
                kind: CommandKind::ReadPumpState,
            }
        }
    }

    impl fmt::Display for Wait {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "WaitCommand{{duration={}s}}", self.duration.as_secs())
        }
    }

    #[async_trait]
    impl Command for Wait {
        fn kind(&self) -> CommandKind {
            self.kind
        }

        fn validate(&self) -> Vec<String> {
            if self.duration.is_zero() {
                vec!["Duration must be positive".into()]
            } else {
                Vec::new()
            }
        }

        async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            ops.press_key(Key::NoKey).await?;
            if self.cooperative {
                ops.sleep(self.duration).await?;
            } else {
                tokio::time::sleep(self.duration).await;
            }
            self.completions.fetch_add(1, Ordering::SeqCst);
            Ok(CommandResult::succeeded("Done"))
        }
    }

    fn executor(harness: &SimHarness) -> CommandExecutor {
        let supervisor = Arc::new(ConnectionSupervisor::new(
            harness.pump.clone(),
            harness.state.clone(),
            harness.config.clone(),
            AlertReconciler::default(),
        ));
        CommandExecutor::new(
            harness.pump.clone(),
            harness.state.clone(),
            harness.config.clone(),
            supervisor,
            AlertReconciler::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_command_carries_metadata() {
        let harness = SimHarness::new();
        let executor = executor(&harness);

        let result = executor.run(Arc::new(Wait::new(Duration::from_secs(10)))).await;
        assert!(result.success);
        assert_eq!(result.request.as_deref(), Some("WaitCommand{duration=10s}"));
        assert!(result.state.unwrap().is_available());
        let timing = result.timing.unwrap();
        assert_eq!(timing.execution.as_secs(), 10);
        assert!(!harness.state.active.is_busy());
        assert!(harness.state.active.last_finished().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_skips_pump() {
        let harness = SimHarness::new();
        let executor = executor(&harness);

        let result = executor.run(Arc::new(Wait::new(Duration::ZERO))).await;
        assert!(!result.success);
        assert!(!result.enacted);
        assert_eq!(result.message, "Duration must be positive");
        assert!(result.state.is_some());
        assert!(result.timing.is_none());
        assert_eq!(harness.pump.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecoverable_state_short_circuits() {
        let harness = SimHarness::new();
        let executor = executor(&harness);
        harness.state.mark_unrecoverable("Pump driver went away").await;

        let result = executor.run(Arc::new(Wait::new(Duration::from_secs(1)))).await;
        assert!(!result.success);
        assert_eq!(result.message, "Pump driver went away");
        assert_eq!(harness.pump.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_command_is_interrupted() {
        let harness = SimHarness::connected().await;
        let executor = executor(&harness);
        harness.pump.set_frozen(true);
        let started = Instant::now();

        let mut command = Wait::new(Duration::from_secs(600));
        command.cooperative = false;
        let result = executor.run(Arc::new(command)).await;

        assert!(!result.success);
        assert_eq!(result.message, "Command stalled, check pump!");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(90));
        assert!(elapsed <= Duration::from_secs(96));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_display_does_not_extend_timeout() {
        let harness = SimHarness::connected().await;
        let executor = executor(&harness);
        harness.pump.set_frozen(true);
        let state = harness.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            state.menu.clear();
        });
        let started = Instant::now();

        let mut command = Wait::new(Duration::from_secs(600));
        command.cooperative = false;
        let result = executor.run(Arc::new(command)).await;

        assert!(!result.success);
        assert_eq!(result.message, "Command stalled, check pump!");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(90));
        assert!(elapsed <= Duration::from_secs(96));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_extends_up_to_absolute_timeout() {
        let harness = SimHarness::new();
        let executor = executor(&harness);

        let result = executor.run(Arc::new(Wait::new(Duration::from_secs(200)))).await;
        assert!(result.success, "{}", result.message);

        let result = executor.run(Arc::new(Wait::new(Duration::from_secs(300)))).await;
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Command WaitCommand{duration=300s} timed out after 4 min, check pump!"
        );
        assert_eq!(result.timing.unwrap().execution.as_secs(), 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_restarts_attempt() {
        let harness = SimHarness::new();
        let executor = executor(&harness);
        let pump = harness.pump.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            pump.drop_link().await;
        });

        let command = Arc::new(Wait::new(Duration::from_secs(10)));
        let result = executor.run(command.clone()).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(command.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(harness.pump.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_link_loss_gives_up() {
        let harness = SimHarness::new();
        let executor = executor(&harness);
        let pump = harness.pump.clone();
        tokio::spawn(async move {
            for _ in 0..4 {
                while !pump.is_connected() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
                pump.drop_link().await;
            }
        });

        let command = Arc::new(Wait::new(Duration::from_secs(30)));
        let result = executor.run(command.clone()).await;
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Connection to pump lost 4 times while running the command, check pump!"
        );
        assert_eq!(command.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(command.completions.load(Ordering::SeqCst), 0);
        assert!(result.state.is_some());
        assert!(!harness.state.active.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_run_frees_slot() {
        let harness = SimHarness::new();
        harness.pump.set_reachable(false);
        let executor = executor(&harness);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(5),
            executor.run(Arc::new(Wait::new(Duration::from_secs(1)))),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!harness.state.active.is_busy());
        assert!(harness.state.active.last_finished().is_some());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!harness.state.active.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_run_aborts_attempt() {
        let harness = SimHarness::new();
        let executor = executor(&harness);
        let mut command = Wait::new(Duration::from_secs(10));
        command.cooperative = false;
        let command = Arc::new(command);

        let abandoned = tokio::time::timeout(Duration::from_secs(3), executor.run(command.clone())).await;
        assert!(abandoned.is_err());
        assert_eq!(command.attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(command.completions.load(Ordering::SeqCst), 0);
        assert!(!harness.state.active.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_pump_is_refused() {
        let harness = SimHarness::new();
        harness.pump.suspend();
        let executor = executor(&harness);

        let command = Arc::new(Wait::new(Duration::from_secs(1)));
        let result = executor.run(command.clone()).await;
        assert!(!result.success);
        assert!(!result.enacted);
        assert_eq!(result.message, "Pump is suspended");
        assert!(result.state.unwrap().suspended);
        assert_eq!(command.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_pump_still_reports_state() {
        let harness = SimHarness::new();
        harness.pump.set_reachable(false);
        let executor = executor(&harness);

        let result = executor.run(Arc::new(Wait::new(Duration::from_secs(1)))).await;
        assert!(!result.success);
        assert_eq!(result.message, "Timeout connecting to pump");
        assert!(result.state.is_some());
        assert!(result.timing.unwrap().connect >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_serialized() {
        let harness = SimHarness::new();
        let executor = Arc::new(executor(&harness));
        let first = Arc::new(Wait::new(Duration::from_secs(10)));
        let second = Arc::new(Wait::new(Duration::from_secs(10)));

        let running = {
            let executor = executor.clone();
            let first = first.clone();
            tokio::spawn(async move { executor.run(first).await })
        };
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(harness.state.active.is_busy());

        let started = Instant::now();
        let result = executor.run(second.clone()).await;
        assert!(result.success);
        assert!(running.await.unwrap().success);
        // The second command waited for the first one to finish
        assert!(started.elapsed() >= Duration::from_secs(17));
    }
}
