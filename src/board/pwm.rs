//! Buzzer output on PWM0.
//!
//! 16 MHz / 128 = 125 kHz counter; 2500 counts give the 20 ms period.

use core::convert::Infallible;

use embassy_nrf::peripherals::PWM0;
use embassy_nrf::pwm::{Prescaler, SimplePwm};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use proxtag::config::PWM_PERIOD_NS;

/// One counter tick at 125 kHz.
const TICK_NS: u32 = 8_000;
const MAX_DUTY: u16 = (PWM_PERIOD_NS / TICK_NS) as u16;

pub struct PwmBuzzer {
    pwm: SimplePwm<'static, PWM0>,
}

impl PwmBuzzer {
    pub fn new(mut pwm: SimplePwm<'static, PWM0>) -> Self {
        pwm.set_prescaler(Prescaler::Div128);
        pwm.set_max_duty(MAX_DUTY);
        pwm.set_duty(0, 0);
        Self { pwm }
    }
}

impl ErrorType for PwmBuzzer {
    type Error = Infallible;
}

impl SetDutyCycle for PwmBuzzer {
    fn max_duty_cycle(&self) -> u16 {
        MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.pwm.set_duty(0, duty.min(MAX_DUTY));
        Ok(())
    }
}
