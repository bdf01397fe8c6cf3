//! Safety Module
//!
//! Reconciles warning screens raised by the pump against the alarms the
//! running command is known to cause.

pub mod alarms;
mod alerts;

pub use alarms::AlarmVocabulary;
pub use alerts::AlertReconciler;
