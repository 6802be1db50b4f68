//! Host-testable core of the proxtag firmware.
//!
//! Everything that decides *what* the device does lives here: the
//! advertising/connection state machine, the battery gauge, the buzzer
//! pattern engine, the GATT bridges and the coordinator tying them
//! together. Hardware and radio are reached only through traits, so the
//! whole crate builds and tests on the host.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary (main.rs, `--features embedded`) supplies the
//! SoftDevice link layer, SAADC sampler, PWM output and LEDs.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod app;
pub mod battery;
pub mod ble;
pub mod buzzer;
pub mod config;
pub mod error;
pub mod gatt;
pub mod indicators;
pub mod work;

#[cfg(test)]
mod testing;

pub use app::{Coordinator, Event};
pub use battery::{AnalogSampler, BatteryGauge, BatteryReading, BatteryState, SampleError};
pub use ble::{AdvertisingConfig, ConnInfo, ConnectivityManager, LinkLayer, LinkObserver, LinkState};
pub use buzzer::{BuzzerEngine, BuzzerPattern, Intensity};
pub use error::{AttError, BleError, Error};
pub use indicators::StatusLeds;
pub use work::{Millis, Scheduler, Work, WorkQueue};
