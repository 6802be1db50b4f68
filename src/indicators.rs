//! Status LEDs.
//!
//! - Green: lit while a central is connected.
//! - Blue: lit while advertising.
//!
//! GPIO errors are ignored; a dead LED must not take the link down.

use embedded_hal::digital::OutputPin;

use crate::ble::{ConnInfo, LinkObserver};

pub struct StatusLeds<G, B> {
    green: G,
    blue: B,
}

impl<G: OutputPin, B: OutputPin> StatusLeds<G, B> {
    /// Take both pins and switch them off.
    pub fn new(mut green: G, mut blue: B) -> Self {
        let _ = green.set_low();
        let _ = blue.set_low();
        Self { green, blue }
    }

    pub fn green(&self) -> &G {
        &self.green
    }

    pub fn blue(&self) -> &B {
        &self.blue
    }
}

impl<G: OutputPin, B: OutputPin> LinkObserver for StatusLeds<G, B> {
    fn on_connected(&mut self, _info: &ConnInfo) {
        let _ = self.blue.set_low();
        let _ = self.green.set_high();
    }

    fn on_disconnected(&mut self, _reason: u8) {
        let _ = self.green.set_low();
    }

    fn on_adv_started(&mut self) {
        let _ = self.blue.set_high();
    }

    fn on_adv_stopped(&mut self) {
        let _ = self.blue.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLed;

    fn leds() -> StatusLeds<MockLed, MockLed> {
        StatusLeds::new(MockLed::lit(), MockLed::lit())
    }

    #[test]
    fn both_off_at_start() {
        let l = leds();
        assert!(!l.green().on);
        assert!(!l.blue().on);
    }

    #[test]
    fn advertising_then_connected() {
        let mut l = leds();
        l.on_adv_started();
        assert!(l.blue().on);
        assert!(!l.green().on);

        l.on_connected(&ConnInfo::default());
        assert!(!l.blue().on);
        assert!(l.green().on);
    }

    #[test]
    fn disconnect_turns_green_off() {
        let mut l = leds();
        l.on_connected(&ConnInfo::default());
        l.on_disconnected(0x13);
        assert!(!l.green().on);
        // Recycle alone changes nothing; the next advertising start does.
        l.on_recycled();
        assert!(!l.blue().on);
        l.on_adv_started();
        assert!(l.blue().on);
    }

    #[test]
    fn stop_advertising_turns_blue_off() {
        let mut l = leds();
        l.on_adv_started();
        l.on_adv_stopped();
        assert!(!l.blue().on);
    }
}
