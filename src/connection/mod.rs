//! Connection management for the pump link
//!
//! This module handles:
//! - Bringing the link up on demand, with reissued connect requests
//! - Reconnecting mid-command and clearing link-loss alarms
//! - Dropping the link once it has been idle

mod idle;
mod supervisor;

pub use idle::{IdleDisconnectMonitor, IdleMonitorHandle};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
