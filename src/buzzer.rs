//! Buzzer pattern engine.
//!
//! Drives a PWM output with an intermittent pattern: `intensity` percent
//! duty for half a period, silence for the other half. Timing comes from
//! [`Work::BuzzerToggle`] items on the scheduler, so the engine itself
//! never blocks.

use crate::config::{BUZZER_DEFAULT_INTENSITY, BUZZER_TOGGLE_PERIOD_MS};
use crate::error::Error;
use crate::work::{Scheduler, Work};
use embedded_hal::pwm::SetDutyCycle;

/// Intensity presets (percent of the PWM period).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Intensity {
    Off = 0,
    Low = 25,
    Medium = 50,
    High = 75,
    Max = 100,
}

impl From<Intensity> for u8 {
    fn from(value: Intensity) -> Self {
        value as u8
    }
}

/// Current alarm pattern as seen from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuzzerPattern {
    pub active: bool,
    pub intensity: u8,
}

pub struct BuzzerEngine<P> {
    output: P,
    initialized: bool,
    active: bool,
    intensity: u8,
    /// Phase of the toggle cycle; `true` while sounding.
    phase_on: bool,
}

impl<P: SetDutyCycle> BuzzerEngine<P> {
    pub fn new(output: P) -> Self {
        Self {
            output,
            initialized: false,
            active: false,
            intensity: BUZZER_DEFAULT_INTENSITY,
            phase_on: false,
        }
    }

    /// Silence the output and mark the engine ready.
    pub fn init(&mut self) -> Result<(), Error> {
        if self.initialized {
            warn!("buzzer already initialized");
            return Ok(());
        }

        self.output.set_duty_cycle_fully_off().map_err(|_| {
            error!("PWM output could not be silenced");
            Error::InitError
        })?;

        self.intensity = BUZZER_DEFAULT_INTENSITY;
        self.active = false;
        self.phase_on = false;
        self.initialized = true;
        info!("buzzer ready");
        Ok(())
    }

    /// Start or stop the intermittent pattern.
    ///
    /// Starting while already active restarts the cycle from the "on"
    /// phase at the new intensity.
    pub fn set_intermittent(
        &mut self,
        active: bool,
        intensity: u8,
        sched: &mut impl Scheduler,
    ) -> Result<(), Error> {
        if !self.initialized {
            error!("buzzer not initialized");
            return Err(Error::NotInitialized);
        }
        if intensity > 100 {
            error!("invalid intensity {} (max 100)", intensity);
            return Err(Error::InvalidArgument);
        }

        if active {
            self.intensity = intensity;
            self.active = true;
            self.phase_on = false;
            sched.cancel(Work::BuzzerToggle);
            sched.submit(Work::BuzzerToggle);
            info!("intermittent alarm ON ({}%)", intensity);
        } else {
            self.stop(sched);
            info!("intermittent alarm OFF");
        }
        Ok(())
    }

    /// Handler for [`Work::BuzzerToggle`].
    pub fn on_toggle(&mut self, sched: &mut impl Scheduler) {
        if !self.active {
            self.drive(0);
            return;
        }

        self.phase_on = !self.phase_on;
        let duty = if self.phase_on { self.intensity } else { 0 };
        self.drive(duty);
        sched.submit_after(Work::BuzzerToggle, BUZZER_TOGGLE_PERIOD_MS);
    }

    pub fn pattern(&self) -> BuzzerPattern {
        BuzzerPattern {
            active: self.active,
            intensity: self.intensity,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    fn stop(&mut self, sched: &mut impl Scheduler) {
        self.active = false;
        self.phase_on = false;
        sched.cancel(Work::BuzzerToggle);
        self.drive(0);
    }

    fn drive(&mut self, percent: u8) {
        if self.output.set_duty_cycle_percent(percent).is_err() {
            error!("PWM set to {}% failed", percent);
        }
    }
}
