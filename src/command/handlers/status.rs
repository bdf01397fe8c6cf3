//! Read pump state command

use async_trait::async_trait;
use combo_shared::{CommandError, CommandResult};
use std::fmt;

use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;

/// Report the pump state without touching any key
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadPumpStateCommand;

impl fmt::Display for ReadPumpStateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadPumpStateCommand{}")
    }
}

#[async_trait]
impl Command for ReadPumpStateCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ReadPumpState
    }

    fn needs_run_mode(&self) -> bool {
        false
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        Ok(CommandResult::succeeded("Pump state read").with_state(ops.pump_state()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::PumpDriver;
    use crate::test_support::SimHarness;

    #[tokio::test(start_paused = true)]
    async fn test_reads_suspended_pump() {
        let harness = SimHarness::new();
        harness.pump.suspend();
        harness.pump.connect().await.unwrap();
        harness.state.menu.wait_for_menu(std::time::Duration::from_secs(2)).await.unwrap();

        let result = ReadPumpStateCommand.execute(&harness.ops()).await.unwrap();
        assert!(result.success);
        assert!(!result.enacted);
        assert!(result.state.unwrap().suspended);
        assert!(harness.pump.presses().is_empty());
    }
}
