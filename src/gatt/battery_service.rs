//! Battery Service bridge (0x180F).
//!
//! Battery Level (0x2A19, read + notify, 1 byte percent) plus two custom
//! read-only characteristics: voltage (u16 LE, mV) and state (u8).

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::battery::{AnalogSampler, BatteryGauge, BatteryReading};
use crate::ble::LinkLayer;
use crate::error::Error;
use crate::gatt::uuids::CCC_NOTIFY;

/// The readable characteristics of the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryAttr {
    Level,
    Voltage,
    State,
}

/// Encoded characteristic value, at most two bytes.
pub type BatteryValue = Vec<u8, 2>;

pub struct BatteryBridge {
    cached: BatteryReading,
    subscribed: bool,
}

impl BatteryBridge {
    pub const fn new() -> Self {
        Self {
            cached: BatteryReading::UNKNOWN,
            subscribed: false,
        }
    }

    /// Take a fresh reading; on failure keep serving the last good one.
    pub fn refresh<A: AnalogSampler, D: DelayNs>(
        &mut self,
        gauge: &mut BatteryGauge<A, D>,
    ) -> BatteryReading {
        match gauge.reading() {
            Ok(reading) => self.cached = reading,
            Err(e) => warn!("battery read failed ({}), serving cached value", e),
        }
        self.cached
    }

    pub fn read_level<A: AnalogSampler, D: DelayNs>(
        &mut self,
        gauge: &mut BatteryGauge<A, D>,
    ) -> u8 {
        self.refresh(gauge).percentage
    }

    /// Voltage in mV, little-endian.
    pub fn read_voltage<A: AnalogSampler, D: DelayNs>(
        &mut self,
        gauge: &mut BatteryGauge<A, D>,
    ) -> [u8; 2] {
        self.refresh(gauge).voltage_mv.to_le_bytes()
    }

    pub fn read_state<A: AnalogSampler, D: DelayNs>(
        &mut self,
        gauge: &mut BatteryGauge<A, D>,
    ) -> u8 {
        self.refresh(gauge).state.as_u8()
    }

    /// Fresh value of `attr` in its wire format.
    pub fn read<A: AnalogSampler, D: DelayNs>(
        &mut self,
        attr: BatteryAttr,
        gauge: &mut BatteryGauge<A, D>,
    ) -> BatteryValue {
        let bytes = match attr {
            BatteryAttr::Level => Vec::from_slice(&[self.read_level(gauge)]),
            BatteryAttr::Voltage => Vec::from_slice(&self.read_voltage(gauge)),
            BatteryAttr::State => Vec::from_slice(&[self.read_state(gauge)]),
        };
        bytes.unwrap_or_default()
    }

    pub fn cached(&self) -> BatteryReading {
        self.cached
    }

    /// CCC descriptor write on Battery Level. Anything but "notify"
    /// unsubscribes.
    pub fn on_ccc_write(&mut self, value: u16) {
        self.subscribed = value == CCC_NOTIFY;
        info!("battery level notifications {}", if self.subscribed { "enabled" } else { "disabled" });
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Forget the subscription; called when the link goes away.
    pub fn reset(&mut self) {
        self.subscribed = false;
    }

    /// Push a Battery Level notification.
    pub fn notify<L: LinkLayer>(
        &self,
        link: &mut L,
        conn: Option<&L::Connection>,
        percentage: u8,
    ) -> Result<(), Error> {
        let conn = conn.ok_or(Error::NotConnected)?;
        if !self.subscribed {
            return Err(Error::AccessDenied);
        }
        link.notify_battery_level(conn, percentage)?;
        debug!("battery level notified: {}%", percentage);
        Ok(())
    }
}

impl Default for BatteryBridge {
    fn default() -> Self {
        Self::new()
    }
}
