// ── Bit-field registers ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Decoded view of the `adaptation_runstatus` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptationRunStatus(pub u32);

impl AdaptationRunStatus {
    /// Bit 0.
    pub fn is_running(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Bit 1 set and bit 2 clear.
    pub fn valve_characteristic_found(self) -> bool {
        self.0 & 0x02 != 0 && self.0 & 0x04 == 0
    }
}

/// Heating control scaling: the lower nibble of `ctrl_alg`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HeatingControlScaling {
    /// About 5 minutes.
    Quick,
    /// About 30 minutes.
    Moderate,
    /// About 80 minutes.
    Slow,
}

impl HeatingControlScaling {
    pub fn threshold(self) -> u8 {
        match self {
            Self::Quick => 1,
            Self::Moderate => 5,
            Self::Slow => 10,
        }
    }

    /// Current option for a register value: the highest option whose
    /// threshold does not exceed the lower nibble. `None` below Quick.
    pub fn from_register(ctrl_alg: u8) -> Option<Self> {
        let nibble = ctrl_alg & 0x0F;
        Self::iter().rev().find(|option| option.threshold() <= nibble)
    }
}

/// Read-modify-write for `ctrl_alg`: take bits 0-3 from `selection`, keep
/// bits 4-7 of `current`.
pub fn merge_ctrl_alg(current: u8, selection: u8) -> u8 {
    (selection & 0x0F) | (current & 0xF0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runstatus_bits() {
        assert!(AdaptationRunStatus(0b001).is_running());
        assert!(!AdaptationRunStatus(0b110).is_running());
        assert!(AdaptationRunStatus(0b010).valve_characteristic_found());
        assert!(!AdaptationRunStatus(0b110).valve_characteristic_found());
        assert!(!AdaptationRunStatus(0b001).valve_characteristic_found());
    }

    #[test]
    fn masking_preserves_upper_nibble_exhaustively() {
        for current in 0..=u8::MAX {
            for selection in 0..=0x0F_u8 {
                let merged = merge_ctrl_alg(current, selection);
                assert_eq!(merged & 0xF0, current & 0xF0);
                assert_eq!(merged & 0x0F, selection);
            }
        }
    }

    #[test]
    fn masking_drops_high_bits_of_selection() {
        assert_eq!(merge_ctrl_alg(0xA3, 0xF5), 0xA5);
    }

    #[test]
    fn scaling_picks_highest_threshold_at_or_below_nibble() {
        assert_eq!(HeatingControlScaling::from_register(0x00), None);
        assert_eq!(
            HeatingControlScaling::from_register(0x01),
            Some(HeatingControlScaling::Quick)
        );
        assert_eq!(
            HeatingControlScaling::from_register(0x04),
            Some(HeatingControlScaling::Quick)
        );
        assert_eq!(
            HeatingControlScaling::from_register(0x35),
            Some(HeatingControlScaling::Moderate)
        );
        assert_eq!(
            HeatingControlScaling::from_register(0xFF),
            Some(HeatingControlScaling::Slow)
        );
    }

    #[test]
    fn scaling_parses_case_insensitively() {
        assert_eq!(
            "Moderate".parse::<HeatingControlScaling>().ok(),
            Some(HeatingControlScaling::Moderate)
        );
    }
}
