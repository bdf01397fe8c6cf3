//! End-to-end tests of the scripter facade against the simulated pump

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use combo_scripter::pump::{driver_event_channel, PumpDriver, SimConfig, SimulatedPump};
use combo_scripter::{PumpScripter, ScripterConfig};
use combo_shared::{Key, MenuType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn start() -> (PumpScripter, Arc<SimulatedPump>) {
    let (pump, events) = SimulatedPump::new(SimConfig::default());
    let scripter = PumpScripter::start(pump.clone(), events, ScripterConfig::default());
    (scripter, pump)
}

#[tokio::test(start_paused = true)]
async fn test_set_tbr_150_for_30_minutes() {
    let (scripter, pump) = start();

    let result = scripter.set_tbr(150, 30).await;
    assert!(result.success, "{}", result.message);
    assert!(result.enacted);
    assert_eq!(result.request.as_deref(), Some("SetTbrCommand{percent=150, duration=30}"));
    assert!(result.completed_at.is_some());
    assert!(result.timing.is_some());

    let state = result.state.unwrap();
    assert!(state.tbr_active);
    assert_eq!(state.tbr_percent, Some(150));
    assert!(matches!(state.tbr_remaining_duration, Some(29..=30)));
    assert_eq!(pump.tbr(), Some((150, 30)));
    assert_eq!(pump.current_menu().menu_type, MenuType::MainMenu);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_command_never_reaches_pump() {
    let (scripter, pump) = start();

    let result = scripter.set_tbr(155, 20).await;
    assert!(!result.success);
    assert!(!result.enacted);
    assert!(result.message.contains("TBR percentage must be set in 10% steps"));
    assert!(result.message.contains("TBR duration must be set in 15 minute steps"));
    assert!(result.state.is_some());
    assert!(result.timing.is_none());
    assert_eq!(pump.connect_count(), 0);
    assert!(pump.presses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_commands_run_one_at_a_time() {
    let (scripter, _pump) = start();

    let busy_check = async {
        sleep(Duration::from_secs(3)).await;
        scripter.is_pump_busy().await
    };
    let (tbr, state, busy) = futures::join!(scripter.set_tbr(120, 60), scripter.read_pump_state(), busy_check);

    assert!(busy);
    assert!(tbr.success, "{}", tbr.message);
    assert!(state.success, "{}", state.message);
    // The state read queued behind the TBR and sees its effect
    assert_eq!(state.state.unwrap().tbr_percent, Some(120));
    assert!(state.completed_at.unwrap() >= tbr.completed_at.unwrap());
    assert!(!scripter.is_pump_busy().await);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_bolus_while_delivering() {
    let (scripter, pump) = start();

    let cancel = async {
        sleep(Duration::from_secs(15)).await;
        scripter.cancel_bolus().await
    };
    let (result, cancelled) = futures::join!(scripter.deliver_bolus(5.0, None), cancel);

    assert!(cancelled);
    assert!(result.success, "{}", result.message);
    assert!(result.message.starts_with("Bolus cancelled"));
    assert!(pump.presses().contains(&Key::Up));
    let delivered = pump.history().bolus_history[0].amount;
    assert!(delivered < 5.0);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_during_tbr_is_recovered() {
    let (scripter, pump) = start();

    let dropper = async {
        sleep(Duration::from_secs(3)).await;
        pump.drop_link().await;
    };
    let (result, ()) = futures::join!(scripter.set_tbr(50, 90), dropper);

    assert!(result.success, "{}", result.message);
    assert_eq!(pump.tbr(), Some((50, 90)));
    assert!(pump.connect_count() >= 2);
}

struct GoneDriver;

#[async_trait]
impl PumpDriver for GoneDriver {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn press(&self, _key: Key, _hold: Duration) -> Result<()> {
        Err(anyhow!("no pump"))
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "gone"
    }
}

#[tokio::test(start_paused = true)]
async fn test_driver_gone_is_unrecoverable() {
    let (events_tx, events) = driver_event_channel();
    drop(events_tx);
    let scripter = PumpScripter::start(Arc::new(GoneDriver), events, ScripterConfig::default());
    sleep(Duration::from_millis(100)).await;

    assert!(!scripter.is_pump_available().await);
    let result = scripter.read_pump_state().await;
    assert!(!result.success);
    assert_eq!(result.message, "Pump driver went away");
    assert!(result.state.is_some());

    let again = scripter.set_tbr(150, 30).await;
    assert_eq!(again.message, "Pump driver went away");
}
