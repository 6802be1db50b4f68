//! Host-side doubles for the hardware and radio traits.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::battery::{AnalogSampler, SampleError};
use crate::ble::{AdvParams, ConnInfo, LinkLayer, LinkObserver};
use crate::error::BleError;
use crate::gatt::battery_service::BatteryAttr;

// ═══════════════════════════════════════════════════════════════════════════
// Hardware
// ═══════════════════════════════════════════════════════════════════════════

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Returns the scripted samples in order, then fails forever.
pub struct ScriptedSampler {
    script: Vec<Result<i16, SampleError>>,
    pos: usize,
    pub fail_setup: bool,
}

impl ScriptedSampler {
    pub fn new(script: &[Result<i16, SampleError>]) -> Self {
        Self {
            script: script.to_vec(),
            pos: 0,
            fail_setup: false,
        }
    }
}

impl AnalogSampler for ScriptedSampler {
    fn setup(&mut self) -> Result<(), SampleError> {
        if self.fail_setup {
            Err(SampleError)
        } else {
            Ok(())
        }
    }

    fn sample(&mut self) -> Result<i16, SampleError> {
        let result = self.script.get(self.pos).copied().unwrap_or(Err(SampleError));
        self.pos += 1;
        result
    }
}

#[derive(Debug)]
pub struct MockPwmError;

impl pwm::Error for MockPwmError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// PWM channel whose max duty is 100, so duty == percent.
#[derive(Default)]
pub struct MockPwm {
    pub duty: u16,
    pub writes: usize,
    pub fail: bool,
}

impl MockPwm {
    pub fn percent(&self) -> u16 {
        self.duty
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = MockPwmError;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockPwmError);
        }
        self.duty = duty;
        self.writes += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockLed {
    pub on: bool,
}

impl MockLed {
    pub fn lit() -> Self {
        Self { on: true }
    }
}

impl digital::ErrorType for MockLed {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.on = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.on = true;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Radio
// ═══════════════════════════════════════════════════════════════════════════

/// Connection handle that can count how often it is released.
pub struct MockConn {
    pub id: u32,
    drops: Option<Rc<Cell<u32>>>,
}

impl MockConn {
    pub fn new(id: u32) -> Self {
        Self { id, drops: None }
    }

    pub fn counted(id: u32, drops: &Rc<Cell<u32>>) -> Self {
        Self {
            id,
            drops: Some(drops.clone()),
        }
    }
}

impl Drop for MockConn {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.set(drops.get() + 1);
        }
    }
}

#[derive(Default)]
pub struct MockLink {
    pub enables: u32,
    pub adv_starts: u32,
    pub adv_stops: u32,
    pub disconnects: u32,
    pub notified: Vec<u8>,
    pub replies: Vec<(BatteryAttr, Vec<u8>)>,
    pub last_params: Option<AdvParams>,
    pub last_adv: Vec<u8>,
    pub last_scan: Vec<u8>,
    pub fail_enable: bool,
    pub fail_advertise: bool,
    pub fail_stop: bool,
    pub fail_disconnect: bool,
    pub fail_notify: bool,
    pub fail_reply: bool,
}

impl LinkLayer for MockLink {
    type Connection = MockConn;

    fn enable(&mut self) -> Result<(), BleError> {
        if self.fail_enable {
            return Err(BleError::RegisterFailed);
        }
        self.enables += 1;
        Ok(())
    }

    fn start_advertising(
        &mut self,
        params: &AdvParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<(), BleError> {
        if self.fail_advertise {
            return Err(BleError::AdvertiseFailed);
        }
        self.adv_starts += 1;
        self.last_params = Some(*params);
        self.last_adv = adv_data.to_vec();
        self.last_scan = scan_data.to_vec();
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), BleError> {
        if self.fail_stop {
            return Err(BleError::AdvertiseFailed);
        }
        self.adv_stops += 1;
        Ok(())
    }

    fn disconnect(&mut self, _conn: &MockConn) -> Result<(), BleError> {
        if self.fail_disconnect {
            return Err(BleError::DisconnectFailed);
        }
        self.disconnects += 1;
        Ok(())
    }

    fn notify_battery_level(&mut self, _conn: &MockConn, level: u8) -> Result<(), BleError> {
        if self.fail_notify {
            return Err(BleError::NotifyFailed);
        }
        self.notified.push(level);
        Ok(())
    }

    fn reply_battery_read(&mut self, attr: BatteryAttr, value: &[u8]) -> Result<(), BleError> {
        if self.fail_reply {
            return Err(BleError::ReplyFailed);
        }
        self.replies.push((attr, value.to_vec()));
        Ok(())
    }
}

/// Counts every lifecycle callback.
#[derive(Default)]
pub struct Recorder {
    pub connected: u32,
    pub last_info: Option<ConnInfo>,
    pub disconnected: u32,
    pub last_reason: Option<u8>,
    pub recycled: u32,
    pub adv_started: u32,
    pub adv_stopped: u32,
}

impl LinkObserver for Recorder {
    fn on_connected(&mut self, info: &ConnInfo) {
        self.connected += 1;
        self.last_info = Some(*info);
    }

    fn on_disconnected(&mut self, reason: u8) {
        self.disconnected += 1;
        self.last_reason = Some(reason);
    }

    fn on_recycled(&mut self) {
        self.recycled += 1;
    }

    fn on_adv_started(&mut self) {
        self.adv_started += 1;
    }

    fn on_adv_stopped(&mut self) {
        self.adv_stopped += 1;
    }
}
