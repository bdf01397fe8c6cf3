//! Pump driver abstraction
//!
//! The driver owns the radio link and the display decoder. The scripter only
//! asks it to connect, disconnect and press keys; everything it learns about
//! the pump arrives as [`DriverEvent`]s.

use anyhow::Result;
use async_trait::async_trait;
use combo_shared::{Key, Menu};
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the driver event channel
pub const DRIVER_EVENT_CHANNEL_SIZE: usize = 100;

/// Callbacks from the driver
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A display refresh was decoded, roughly every 500ms while connected
    MenuUpdated(Menu),
    /// The display is blank
    NoMenu,
    LinkStarted,
    LinkStopped,
    /// Advisory driver log line
    Log(String),
    /// Advisory driver failure report
    Fail(String),
    /// The driver wants Bluetooth to be enabled
    BluetoothRequested,
}

pub type DriverEventSender = mpsc::Sender<DriverEvent>;
pub type DriverEventReceiver = mpsc::Receiver<DriverEvent>;

/// Create the channel a driver publishes its events on
pub fn driver_event_channel() -> (DriverEventSender, DriverEventReceiver) {
    mpsc::channel(DRIVER_EVENT_CHANNEL_SIZE)
}

/// Remote-control primitives offered by the driver
#[async_trait]
pub trait PumpDriver: Send + Sync {
    /// Request the link to come up; success only means the request was accepted
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Press `key`, hold it for `hold`, then release
    async fn press(&self, key: Key, hold: Duration) -> Result<()>;

    /// Link status as reported by the driver
    fn is_connected(&self) -> bool;

    /// Human-readable name for this driver
    fn name(&self) -> &'static str;
}
