//! Alarm vocabulary
//!
//! The pump only reports alarms as display text, so matching them is tied to
//! the firmware. All literal alarm strings live here, keyed by firmware
//! generation.

use crate::command::CommandKind;

pub const BOLUS_CANCELLED: &str = "BOLUS CANCELLED";
pub const TBR_CANCELLED: &str = "TBR CANCELLED";

/// Alarm texts of one firmware generation
#[derive(Debug, Clone, Copy)]
pub struct AlarmVocabulary {
    pub firmware: &'static str,
    /// Alarm raised when the link drops while a command of this kind runs
    link_loss: &'static [(CommandKind, &'static str)],
}

impl AlarmVocabulary {
    /// Accu-Chek Combo firmware as found in the field
    pub const COMBO_V1: AlarmVocabulary = AlarmVocabulary::new(
        "combo-v1",
        &[
            (CommandKind::Bolus, BOLUS_CANCELLED),
            (CommandKind::SetTbr, TBR_CANCELLED),
            (CommandKind::CancelTbr, TBR_CANCELLED),
        ],
    );

    pub const fn new(firmware: &'static str, link_loss: &'static [(CommandKind, &'static str)]) -> Self {
        Self { firmware, link_loss }
    }

    /// Alarm the pump raises when a command of `kind` loses the link mid-action
    pub fn link_loss_alarm(&self, kind: CommandKind) -> Option<&'static str> {
        self.link_loss
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, alarm)| *alarm)
    }

    /// Alarm the pump raises when the action of a `kind` command is stopped
    /// on purpose. The firmware shows the same text as for a dropped link.
    pub fn cancel_alarm(&self, kind: CommandKind) -> Option<&'static str> {
        self.link_loss_alarm(kind)
    }
}

impl Default for AlarmVocabulary {
    fn default() -> Self {
        Self::COMBO_V1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_loss_alarms() {
        let vocabulary = AlarmVocabulary::default();
        assert_eq!(vocabulary.link_loss_alarm(CommandKind::Bolus), Some(BOLUS_CANCELLED));
        assert_eq!(vocabulary.link_loss_alarm(CommandKind::CancelTbr), Some(TBR_CANCELLED));
        assert_eq!(vocabulary.link_loss_alarm(CommandKind::ReadPumpState), None);
    }
}
