use combo_scripter::command::handlers::BolusProgress;
use combo_scripter::pump::{SimConfig, SimulatedPump};
use combo_scripter::{PumpScripter, ScripterConfig};
use combo_shared::{HistoryRange, HistoryRequest};
use std::time::Duration;
use tokio::sync::mpsc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ScripterConfig {
        idle_disconnect_timeout: Duration::from_secs(10),
        ..Default::default()
    };

    let (pump, events) = SimulatedPump::new(SimConfig::default());
    let scripter = PumpScripter::start(pump.clone(), events, config);

    // Spawn connection state logger
    let mut connection = scripter.subscribe_connection();
    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let state = *connection.borrow_and_update();
            info!("[MAIN] Pump link {}", state);
        }
    });

    let result = scripter.read_pump_state().await;
    info!("[MAIN] {}", result);

    let result = scripter.set_tbr(150, 30).await;
    info!("[MAIN] {}", result);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            match progress {
                BolusProgress::Delivering { delivered } => info!("[BOLUS] {:.1} U delivered", delivered),
                other => info!("[BOLUS] {:?}", other),
            }
        }
    });
    let result = scripter.deliver_bolus(1.5, Some(progress_tx)).await;
    if !result.success {
        warn!("[MAIN] Bolus failed: {}", result.message);
    }

    let request = HistoryRequest::default()
        .bolus(HistoryRange::Last)
        .tbr(HistoryRange::Full);
    let result = scripter.read_history(request).await;
    if let Some(history) = &result.history {
        for bolus in &history.bolus_history {
            info!("[MAIN] Last bolus: {} U at {}", bolus.amount, bolus.timestamp);
        }
    }

    let result = scripter.cancel_tbr().await;
    info!("[MAIN] {}", result);

    info!("[MAIN] Final state: {}", scripter.current_state());
    scripter.shutdown().await;
    info!("Pump scripter demo finished after {} key presses", pump.presses().len());
    Ok(())
}
