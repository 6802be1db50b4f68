//! Battery gauge - CR2032 coin-cell monitoring through the ADC.
//!
//! A reading averages a short burst of raw samples, converts the average to
//! millivolts and maps it onto a percentage and a coarse [`BatteryState`].
//!
//! Discharge curve (piecewise linear, mV → %):
//! ```text
//! 2000 → 0   2200 → 10   2500 → 30   2800 → 70   3000 → 100
//! ```

use crate::config;
use crate::error::Error;
use embedded_hal::delay::DelayNs;

/// Failure acquiring a single raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleError;

/// Raw analog acquisition for the battery channel.
pub trait AnalogSampler {
    /// Prepare the channel (calibration, gain, reference).
    fn setup(&mut self) -> Result<(), SampleError> {
        Ok(())
    }

    /// Take one raw conversion.
    fn sample(&mut self) -> Result<i16, SampleError>;
}

/// Charge level tier. Discriminants are the GATT wire values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BatteryState {
    Critical = 0,
    Low = 1,
    Medium = 2,
    Good = 3,
    Unknown = 4,
}

impl BatteryState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One derived battery measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub voltage_mv: u16,
    pub percentage: u8,
    pub state: BatteryState,
}

impl BatteryReading {
    pub const UNKNOWN: Self = Self {
        voltage_mv: 0,
        percentage: 0,
        state: BatteryState::Unknown,
    };

    /// Build a reading from a voltage using the discharge curve.
    pub fn from_voltage(voltage_mv: u16) -> Self {
        let percentage = voltage_to_percentage(voltage_mv);
        Self {
            voltage_mv,
            percentage,
            state: percentage_to_state(percentage),
        }
    }
}

/// Conversion parameters of the sensing chain.
#[derive(Clone, Copy, Debug)]
pub struct GaugeConfig {
    pub vref_mv: u32,
    pub resolution_bits: u8,
    pub samples: usize,
    pub divider_num: u32,
    pub divider_den: u32,
}

impl GaugeConfig {
    /// Largest valid raw value (`2^resolution - 1`).
    pub fn raw_max(&self) -> u32 {
        (1u32 << self.resolution_bits) - 1
    }

    /// `round(avg_raw * vref / raw_max) * divider_ratio`, saturated to u16.
    pub fn raw_to_mv(&self, avg_raw: u32) -> u16 {
        let max = self.raw_max();
        let at_pin = (avg_raw * self.vref_mv + max / 2) / max;
        let scaled = at_pin * self.divider_num / self.divider_den;
        u16::try_from(scaled).unwrap_or(u16::MAX)
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            vref_mv: config::ADC_VREF_MV,
            resolution_bits: config::ADC_RESOLUTION_BITS,
            samples: config::ADC_SAMPLES,
            divider_num: config::BATTERY_DIVIDER_NUM,
            divider_den: config::BATTERY_DIVIDER_DEN,
        }
    }
}

/// (mV, %) breakpoints of the coin-cell discharge curve, ascending.
const CURVE: [(i32, i32); 5] = [(2000, 0), (2200, 10), (2500, 30), (2800, 70), (3000, 100)];

fn interpolate(x: i32, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) -> i32 {
    if x <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Map a cell voltage onto 0..=100 %.
pub fn voltage_to_percentage(voltage_mv: u16) -> u8 {
    let x = i32::from(voltage_mv);
    let (first, last) = (CURVE[0], CURVE[CURVE.len() - 1]);

    let pct = if x < first.0 {
        first.1
    } else if x >= last.0 {
        last.1
    } else {
        CURVE
            .windows(2)
            .find(|seg| x < seg[1].0)
            .map(|seg| interpolate(x, seg[0], seg[1]))
            .unwrap_or(last.1)
    };

    pct.clamp(0, 100) as u8
}

/// Coarse tier of a percentage. Boundary values fall to the lower tier.
pub fn percentage_to_state(percentage: u8) -> BatteryState {
    if percentage > 70 {
        BatteryState::Good
    } else if percentage > 30 {
        BatteryState::Medium
    } else if percentage > 10 {
        BatteryState::Low
    } else {
        BatteryState::Critical
    }
}

/// Battery gauge over an analog sampler and a blocking delay.
pub struct BatteryGauge<A, D> {
    sampler: A,
    delay: D,
    config: GaugeConfig,
    initialized: bool,
    last: BatteryReading,
}

impl<A: AnalogSampler, D: DelayNs> BatteryGauge<A, D> {
    pub fn new(sampler: A, delay: D) -> Self {
        Self::with_config(sampler, delay, GaugeConfig::default())
    }

    pub fn with_config(sampler: A, delay: D, config: GaugeConfig) -> Self {
        Self {
            sampler,
            delay,
            config,
            initialized: false,
            last: BatteryReading::UNKNOWN,
        }
    }

    /// Bring up the sampler and take a first (best-effort) reading.
    pub fn init(&mut self) -> Result<(), Error> {
        if self.initialized {
            warn!("battery gauge already initialized");
            return Ok(());
        }

        self.sampler.setup().map_err(|_| {
            error!("ADC channel setup failed");
            Error::InitError
        })?;
        self.initialized = true;

        match self.reading() {
            Ok(r) => info!(
                "battery gauge ready: {} mV ({}%, {})",
                r.voltage_mv,
                r.percentage,
                r.state
            ),
            Err(_) => warn!("battery gauge ready, but first reading failed"),
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Average a burst of samples and convert to millivolts.
    pub fn read_voltage(&mut self) -> Result<u16, Error> {
        if !self.initialized {
            error!("battery gauge not initialized");
            return Err(Error::NotInitialized);
        }

        let raw_max = self.config.raw_max();
        let mut sum: u32 = 0;
        let mut valid: u32 = 0;

        for i in 0..self.config.samples {
            match self.sampler.sample() {
                Ok(raw) if raw >= 0 && (raw as u32) <= raw_max => {
                    sum += raw as u32;
                    valid += 1;
                }
                Ok(raw) => debug!("discarding out-of-range sample {}", raw),
                Err(_) => error!("ADC sample {} failed", i),
            }
            self.delay.delay_ms(config::ADC_SAMPLE_SPACING_MS);
        }

        if valid == 0 {
            error!("no valid ADC sample");
            return Err(Error::ReadError);
        }

        let avg = sum / valid;
        let mv = self.config.raw_to_mv(avg);
        debug!("ADC avg {} -> {} mV ({} samples)", avg, mv, valid);
        Ok(mv)
    }

    /// Fresh voltage / percentage / state triple.
    pub fn reading(&mut self) -> Result<BatteryReading, Error> {
        let reading = BatteryReading::from_voltage(self.read_voltage()?);
        self.last = reading;
        debug!(
            "battery: {} mV, {}%, {}",
            reading.voltage_mv,
            reading.percentage,
            reading.state
        );
        Ok(reading)
    }

    /// Most recent successful reading (`Unknown` until one succeeds).
    pub fn last_reading(&self) -> BatteryReading {
        self.last
    }

    /// Fresh reading says Critical. False when uninitialized or unreadable.
    pub fn is_critical(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        matches!(self.reading(), Ok(r) if r.state == BatteryState::Critical)
    }
}
