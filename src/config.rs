//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

use crate::buzzer::Intensity;

// Device

/// Name placed in the advertising payload.
pub const DEVICE_NAME: &str = "ProxTag";

/// Longest accepted device name (bytes).
pub const DEVICE_NAME_MAX_LEN: usize = 29;

// BLE advertising

/// Default advertising interval range (ms) used when no config is given.
pub const ADV_INTERVAL_DEFAULT_MIN_MS: u16 = 500;
pub const ADV_INTERVAL_DEFAULT_MAX_MS: u16 = 500;

/// Advertising interval bounds allowed by the Core specification (ms).
pub const ADV_INTERVAL_LOWER_MS: u16 = 20;
pub const ADV_INTERVAL_UPPER_MS: u16 = 10240;

/// Legacy advertising / scan-response payload size (bytes).
pub const ADV_PAYLOAD_MAX_LEN: usize = 31;

// Battery (CR2032 coin cell on VDD)

/// SAADC full-scale voltage: 0.6 V internal reference with 1/6 gain.
pub const ADC_VREF_MV: u32 = 3600;

/// SAADC resolution (bits).
pub const ADC_RESOLUTION_BITS: u8 = 12;

/// Samples averaged per reading.
pub const ADC_SAMPLES: usize = 4;

/// Pause between two samples of the same reading (ms).
pub const ADC_SAMPLE_SPACING_MS: u32 = 1;

/// Resistive divider ratio as a fraction. 1/1 = no divider.
/// Example: R1 = R2 = 1 MΩ → 2/1.
pub const BATTERY_DIVIDER_NUM: u32 = 1;
pub const BATTERY_DIVIDER_DEN: u32 = 1;

/// Interval between periodic battery refresh / notification (ms).
pub const BATTERY_REPORT_INTERVAL_MS: u64 = 60_000;

// Buzzer

/// PWM period (ns). 20 ms = 50 Hz.
pub const PWM_PERIOD_NS: u32 = 20_000_000;

/// On/off half-period of the intermittent alarm (ms).
pub const BUZZER_TOGGLE_PERIOD_MS: u64 = 500;

/// Intensity used for remote alarm writes (percent).
pub const BUZZER_DEFAULT_INTENSITY: u8 = Intensity::Medium as u8;

// Scheduling

/// Maximum pending work items. One slot per `Work` variant is enough.
pub const WORK_QUEUE_CAPACITY: usize = 4;

/// Event channel depth between the radio task and the application task.
pub const EVENT_QUEUE_DEPTH: usize = 8;

// GPIO pin assignments (custom board, nRF52840)
//
// These are logical names; the actual `embassy_nrf::peripherals::*` pins
// are selected in `main.rs`.  Adjust for your PCB.
//
//   Buzzer PWM     → P0.13
//   LED green      → P0.30  (connection)
//   LED blue       → P0.06  (advertising)
//   Battery sense  → VDD (internal SAADC input)
