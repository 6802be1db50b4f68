//! Buzzer Service bridge (`12345678-abcd-efab-cdef-123456789abc`).
//!
//! One write-only characteristic: a single byte, `0x01` starts the
//! intermittent alarm and `0x00` stops it.

use crate::error::AttError;

pub const ALARM_OFF: u8 = 0x00;
pub const ALARM_ON: u8 = 0x01;

/// User Description of the alarm characteristic.
pub const ALARM_USER_DESCRIPTION: &[u8] = b"Intermittent buzzer";

/// Presentation Format: boolean, exponent 0, unitless (0x2700), SIG
/// namespace, no description.
pub const ALARM_PRESENTATION_FORMAT: [u8; 7] = [0x01, 0x00, 0x00, 0x27, 0x01, 0x00, 0x00];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuzzerBridge {
    last_command: Option<bool>,
}

impl BuzzerBridge {
    pub const fn new() -> Self {
        Self { last_command: None }
    }

    /// Validate a write to the alarm characteristic.
    ///
    /// Returns the requested alarm state, or the ATT error to send back.
    pub fn on_write(&mut self, offset: u16, data: &[u8]) -> Result<bool, AttError> {
        if data.len() != 1 {
            warn!("alarm write with {} bytes rejected", data.len());
            return Err(AttError::InvalidAttributeLength);
        }
        if offset != 0 {
            warn!("alarm write at offset {} rejected", offset);
            return Err(AttError::InvalidOffset);
        }
        let on = match data[0] {
            ALARM_OFF => false,
            ALARM_ON => true,
            other => {
                warn!("alarm value {} not allowed", other);
                return Err(AttError::ValueNotAllowed);
            }
        };
        self.last_command = Some(on);
        Ok(on)
    }

    /// Last accepted command, if any.
    pub fn last_command(&self) -> Option<bool> {
        self.last_command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_on_and_off() {
        let mut bridge = BuzzerBridge::new();
        assert_eq!(bridge.on_write(0, &[0x01]), Ok(true));
        assert_eq!(bridge.on_write(0, &[0x00]), Ok(false));
        assert_eq!(bridge.last_command(), Some(false));
    }

    #[test]
    fn length_checked_before_offset() {
        let mut bridge = BuzzerBridge::new();
        assert_eq!(bridge.on_write(0, &[]), Err(AttError::InvalidAttributeLength));
        assert_eq!(
            bridge.on_write(3, &[0x01, 0x00]),
            Err(AttError::InvalidAttributeLength)
        );
        assert_eq!(bridge.on_write(1, &[0x01]), Err(AttError::InvalidOffset));
    }

    #[test]
    fn other_values_not_allowed() {
        let mut bridge = BuzzerBridge::new();
        assert_eq!(bridge.on_write(0, &[0x02]), Err(AttError::ValueNotAllowed));
        assert_eq!(bridge.on_write(0, &[0xFF]), Err(AttError::ValueNotAllowed));
        assert_eq!(bridge.last_command(), None);
    }

    #[test]
    fn att_codes_match_wire_values() {
        assert_eq!(AttError::InvalidOffset.code(), 0x07);
        assert_eq!(AttError::InvalidAttributeLength.code(), 0x0D);
        assert_eq!(AttError::ValueNotAllowed.code(), 0x13);
    }

    #[test]
    fn presentation_format_is_unitless_boolean() {
        let [format, exponent, unit_lo, unit_hi, namespace, ..] = ALARM_PRESENTATION_FORMAT;
        assert_eq!(format, 0x01);
        assert_eq!(exponent, 0);
        assert_eq!(u16::from_le_bytes([unit_lo, unit_hi]), 0x2700);
        assert_eq!(namespace, 0x01);
    }
}
