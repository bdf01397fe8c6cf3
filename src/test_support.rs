//! Helpers shared by the unit tests

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ScripterConfig;
use crate::pump::{DriverEvent, DriverEventReceiver, PumpDriver, PumpOps, SimConfig, SimulatedPump};
use crate::state::ScripterState;

pub struct SimHarness {
    pub pump: Arc<SimulatedPump>,
    pub state: Arc<ScripterState>,
    pub config: Arc<ScripterConfig>,
    pub cancel: CancellationToken,
}

impl SimHarness {
    /// Simulator feeding a fresh menu stream, not yet connected
    pub fn new() -> Self {
        let (pump, rx) = SimulatedPump::new(SimConfig::default());
        let state = Arc::new(ScripterState::new());
        tokio::spawn(forward(rx, state.clone()));
        Self {
            pump,
            state,
            config: Arc::new(ScripterConfig::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn connected() -> Self {
        let harness = Self::new();
        harness.pump.connect().await.unwrap();
        harness.state.menu.wait_for_menu(std::time::Duration::from_secs(5)).await.unwrap();
        harness
    }

    pub fn ops(&self) -> PumpOps {
        PumpOps::new(
            self.pump.clone(),
            self.state.clone(),
            self.config.clone(),
            self.cancel.clone(),
        )
    }
}

async fn forward(mut rx: DriverEventReceiver, state: Arc<ScripterState>) {
    while let Some(event) = rx.recv().await {
        match event {
            DriverEvent::MenuUpdated(menu) => state.menu.publish(menu),
            DriverEvent::LinkStopped => state.menu.clear(),
            _ => {}
        }
    }
}
