//! Service and characteristic identifiers.
//!
//! 128-bit UUIDs are stored as `u128` in their textual (big-endian) order;
//! use `to_le_bytes()` for the over-the-air layout.

/// Battery Service (SIG assigned).
pub const BATTERY_SERVICE_UUID16: u16 = 0x180F;

/// Battery Level characteristic (SIG assigned).
pub const BATTERY_LEVEL_UUID16: u16 = 0x2A19;

/// Battery voltage in mV, `00001001-8e22-4541-9d4c-21edae82ed19`.
pub const BATTERY_VOLTAGE_UUID: u128 = 0x00001001_8e22_4541_9d4c_21edae82ed19;

/// Battery state enum, `00001002-8e22-4541-9d4c-21edae82ed19`.
pub const BATTERY_STATE_UUID: u128 = 0x00001002_8e22_4541_9d4c_21edae82ed19;

/// Buzzer Service, `12345678-abcd-efab-cdef-123456789abc`.
pub const BUZZER_SERVICE_UUID: u128 = 0x12345678_abcd_efab_cdef_123456789abc;

/// Buzzer alarm characteristic, `12345679-abcd-efab-cdef-123456789abc`.
pub const BUZZER_ALARM_UUID: u128 = 0x12345679_abcd_efab_cdef_123456789abc;

/// Characteristic User Description descriptor.
pub const USER_DESCRIPTION_UUID16: u16 = 0x2901;

/// Characteristic Presentation Format descriptor.
pub const PRESENTATION_FORMAT_UUID16: u16 = 0x2904;

/// Client Characteristic Configuration value enabling notifications.
pub const CCC_NOTIFY: u16 = 0x0001;
