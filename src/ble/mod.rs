//! Bluetooth Low Energy subsystem.
//!
//! This module drives the radio in **Peripheral** role:
//!
//! 1. **Advertising data** - builds the legacy advertising and scan
//!    response payloads (flags, device name, Buzzer service UUID).
//! 2. **Connectivity manager** - owns the advertising/connection state
//!    machine, the single active connection handle and the automatic
//!    re-advertising after a link is released.
//!
//! The radio itself sits behind [`LinkLayer`], so the state machine can be
//! exercised on the host. Lifecycle notifications go to a [`LinkObserver`]
//! supplied when the manager is built.

pub mod adv_data;
pub mod manager;

use crate::config::{
    ADV_INTERVAL_DEFAULT_MAX_MS, ADV_INTERVAL_DEFAULT_MIN_MS, ADV_INTERVAL_LOWER_MS,
    ADV_INTERVAL_UPPER_MS,
};
use crate::error::{BleError, Error};
use crate::gatt::battery_service::BatteryAttr;

pub use manager::ConnectivityManager;

/// Lifecycle state of the peripheral link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Uninitialized,
    Ready,
    Advertising,
    Connected,
}

/// Caller-facing advertising parameters, intervals in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingConfig {
    pub interval_min_ms: u16,
    pub interval_max_ms: u16,
    pub connectable: bool,
    pub use_identity: bool,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            interval_min_ms: ADV_INTERVAL_DEFAULT_MIN_MS,
            interval_max_ms: ADV_INTERVAL_DEFAULT_MAX_MS,
            connectable: true,
            use_identity: true,
        }
    }
}

impl AdvertisingConfig {
    /// Check interval bounds and ordering.
    pub fn validate(&self) -> Result<(), Error> {
        let range = ADV_INTERVAL_LOWER_MS..=ADV_INTERVAL_UPPER_MS;
        if !range.contains(&self.interval_min_ms) || !range.contains(&self.interval_max_ms) {
            return Err(Error::InvalidArgument);
        }
        if self.interval_min_ms > self.interval_max_ms {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Convert to radio units.
    pub fn params(&self) -> AdvParams {
        AdvParams {
            interval_min: ms_to_units(self.interval_min_ms),
            interval_max: ms_to_units(self.interval_max_ms),
            connectable: self.connectable,
            use_identity: self.use_identity,
        }
    }
}

/// Advertising parameters in 0.625 ms radio units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvParams {
    pub interval_min: u32,
    pub interval_max: u32,
    pub connectable: bool,
    pub use_identity: bool,
}

/// Milliseconds to 0.625 ms units (x * 8 / 5).
pub fn ms_to_units(ms: u16) -> u32 {
    u32::from(ms) * 8 / 5
}

/// Parameters negotiated for an established connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnInfo {
    pub interval_ms: u16,
    /// Peripheral latency, in connection events.
    pub latency: u16,
    pub timeout_ms: u16,
}

impl ConnInfo {
    /// From controller units: interval in 1.25 ms steps, supervision
    /// timeout in 10 ms steps.
    pub fn from_units(interval: u16, latency: u16, timeout: u16) -> Self {
        Self {
            interval_ms: (u32::from(interval) * 1250 / 1000) as u16,
            latency,
            timeout_ms: (u32::from(timeout) * 10).min(u32::from(u16::MAX)) as u16,
        }
    }
}

/// Radio-side operations the connectivity manager needs.
pub trait LinkLayer {
    /// Handle to an established connection. Dropping it releases the
    /// stack's reference.
    type Connection;

    /// Bring up the stack and register services.
    fn enable(&mut self) -> Result<(), BleError>;

    fn start_advertising(
        &mut self,
        params: &AdvParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<(), BleError>;

    fn stop_advertising(&mut self) -> Result<(), BleError>;

    /// Request termination of `conn`. Completion arrives as a disconnect
    /// event.
    fn disconnect(&mut self, conn: &Self::Connection) -> Result<(), BleError>;

    fn notify_battery_level(&mut self, conn: &Self::Connection, level: u8)
        -> Result<(), BleError>;

    /// Answer the pending client read of `attr` with `value`.
    fn reply_battery_read(&mut self, attr: BatteryAttr, value: &[u8]) -> Result<(), BleError>;
}

/// Link lifecycle notifications.
///
/// Every method has an empty default so observers pick only what they
/// need.
pub trait LinkObserver {
    fn on_connected(&mut self, _info: &ConnInfo) {}
    fn on_disconnected(&mut self, _reason: u8) {}
    fn on_recycled(&mut self) {}
    fn on_adv_started(&mut self) {}
    fn on_adv_stopped(&mut self) {}
}

/// Observer that ignores everything.
impl LinkObserver for () {}
