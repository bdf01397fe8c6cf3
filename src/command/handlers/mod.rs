//! Built-in commands

mod alarms;
mod basal;
mod bolus;
mod history;
mod status;
mod tbr;

pub use alarms::TakeOverAlarmsCommand;
pub use basal::{ReadBasalProfileCommand, SetBasalProfileCommand};
pub use bolus::{BolusCommand, BolusProgress};
pub use history::ReadHistoryCommand;
pub use status::ReadPumpStateCommand;
pub use tbr::{CancelTbrCommand, SetTbrCommand};

use combo_shared::{CommandError, Key, Menu, MenuAttribute};
use std::time::Duration;

use crate::pump::PumpOps;

/// Rounds of read-and-correct before giving up on entering a value
const MAX_ADJUSTMENTS: u32 = 10;

/// Beyond this many steps a key is held to scroll instead of pressed
const SCROLL_THRESHOLD: u64 = 5;

/// Approximate auto-repeat rate of a held key
const SCROLL_STEP: Duration = Duration::from_millis(100);

/// Bring the value shown for `attribute` to `target` with the up and down
/// keys, `step` per press. Large distances are scrolled, then corrected.
pub(crate) async fn adjust_value(
    ops: &PumpOps,
    attribute: MenuAttribute,
    read: impl Fn(&Menu) -> Option<f64>,
    target: f64,
    step: f64,
) -> Result<(), CommandError> {
    for _ in 0..MAX_ADJUSTMENTS {
        let current = ops.read_blinking_value(attribute, &read).await?;
        let steps = ((target - current) / step).round() as i64;
        if steps == 0 {
            return Ok(());
        }

        let key = if steps > 0 { Key::Up } else { Key::Down };
        let count = steps.unsigned_abs();
        if count > SCROLL_THRESHOLD {
            // Stop one short of the target, the next round corrects
            let repeats = u32::try_from(count - 2).unwrap_or(u32::MAX);
            let hold = ops.config().key_press_hold + SCROLL_STEP * repeats;
            ops.press_key_for(key, hold).await?;
        } else {
            for _ in 0..count {
                ops.press_key(key).await?;
            }
        }
        ops.wait_for_screen_update(Duration::from_secs(1)).await?;
    }

    Err(CommandError::failed(format!(
        "Failed to set {attribute} to {target}"
    )))
}
