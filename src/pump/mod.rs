//! Pump access: the driver seam, the simulator and the primitives
//! commands are written against.

pub mod driver;
mod ops;
pub mod sim;
mod snapshot;

pub use driver::{driver_event_channel, DriverEvent, DriverEventReceiver, DriverEventSender, PumpDriver};
pub use ops::PumpOps;
pub use sim::{SimConfig, SimulatedPump};
pub use snapshot::{pump_state_from, PumpStateSnapshotter};
