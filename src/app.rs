//! Application coordinator.
//!
//! One owner for every piece of mutable state: the connectivity manager,
//! the battery gauge, the buzzer engine, both GATT bridges and the work
//! queue. Hardware-origin events arrive through [`Coordinator::handle`] in
//! the order they happened; deferred work runs from [`Coordinator::poll`].
//! Nothing here is shared, so nothing needs a lock.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;

use crate::battery::{AnalogSampler, BatteryGauge};
use crate::ble::{
    AdvertisingConfig, ConnInfo, ConnectivityManager, LinkLayer, LinkObserver, LinkState,
};
use crate::buzzer::{BuzzerEngine, BuzzerPattern};
use crate::config::{BATTERY_REPORT_INTERVAL_MS, BUZZER_DEFAULT_INTENSITY, WORK_QUEUE_CAPACITY};
use crate::error::{AttError, Error};
use crate::gatt::battery_service::{BatteryAttr, BatteryValue};
use crate::gatt::{BatteryBridge, BuzzerBridge};
use crate::work::{Millis, Scheduler, Work, WorkQueue};

/// Largest alarm write we bother to carry; anything longer is rejected
/// on length anyway.
pub const MAX_WRITE_LEN: usize = 4;

/// Events produced by the radio side.
pub enum Event<C> {
    /// Connection attempt finished. `Err` carries the HCI status.
    Connected(Result<(C, ConnInfo), u8>),
    Disconnected { reason: u8 },
    /// The stack released its connection object.
    Recycled,
    /// CCC descriptor of Battery Level written.
    BatteryCccWrite(u16),
    /// Client read of a battery characteristic, held until answered.
    BatteryRead(BatteryAttr),
    /// Write to the alarm characteristic.
    BuzzerWrite {
        offset: u16,
        data: Vec<u8, MAX_WRITE_LEN>,
    },
}

pub struct Coordinator<L: LinkLayer, O, A, D, P> {
    manager: ConnectivityManager<L, O>,
    gauge: BatteryGauge<A, D>,
    buzzer: BuzzerEngine<P>,
    battery: BatteryBridge,
    alarm: BuzzerBridge,
    work: WorkQueue<WORK_QUEUE_CAPACITY>,
}

impl<L, O, A, D, P> Coordinator<L, O, A, D, P>
where
    L: LinkLayer,
    O: LinkObserver,
    A: AnalogSampler,
    D: DelayNs,
    P: SetDutyCycle,
{
    pub fn new(
        manager: ConnectivityManager<L, O>,
        gauge: BatteryGauge<A, D>,
        buzzer: BuzzerEngine<P>,
    ) -> Self {
        Self {
            manager,
            gauge,
            buzzer,
            battery: BatteryBridge::new(),
            alarm: BuzzerBridge::new(),
            work: WorkQueue::new(),
        }
    }

    /// Bring every component up and start advertising.
    ///
    /// Any error here is fatal: the device never runs half initialized.
    pub fn start(
        &mut self,
        name: &str,
        adv_config: Option<AdvertisingConfig>,
        now: Millis,
    ) -> Result<(), Error> {
        self.work.set_now(now);

        self.buzzer.init()?;
        self.gauge.init()?;
        if self.gauge.is_critical() {
            warn!("battery critical at boot");
        }
        self.manager.init(name)?;

        // Seeds the value served if a later read fails.
        self.battery.refresh(&mut self.gauge);

        self.manager.start_advertising(adv_config, &mut self.work)?;
        self.work
            .submit_after(Work::BatteryReport, BATTERY_REPORT_INTERVAL_MS);
        info!("proxtag started");
        Ok(())
    }

    /// Process one radio event.
    ///
    /// Only alarm writes can be refused; the error is the ATT code to
    /// return to the client.
    pub fn handle(&mut self, event: Event<L::Connection>, now: Millis) -> Result<(), AttError> {
        self.work.set_now(now);
        match event {
            Event::Connected(result) => self.manager.on_connected(result, &mut self.work),
            Event::Disconnected { reason } => self.on_disconnected(reason),
            Event::Recycled => self.manager.on_recycled(&mut self.work),
            Event::BatteryCccWrite(value) => self.battery.on_ccc_write(value),
            Event::BatteryRead(attr) => self.answer_read(attr),
            Event::BuzzerWrite { offset, data } => {
                let on = self.alarm.on_write(offset, &data)?;
                if let Err(e) =
                    self.buzzer
                        .set_intermittent(on, BUZZER_DEFAULT_INTENSITY, &mut self.work)
                {
                    error!("alarm command failed: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Run all work due at `now`.
    pub fn poll(&mut self, now: Millis) {
        while let Some(work) = self.work.pop_due(now) {
            match work {
                Work::StartAdvertising => self.manager.on_advertise_work(),
                Work::BuzzerToggle => self.buzzer.on_toggle(&mut self.work),
                Work::BatteryReport => self.report_battery(),
            }
        }
    }

    /// When `poll` next has something to do.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.work.next_deadline()
    }

    /// Fresh value of `attr`, encoded as sent to the client.
    pub fn read_battery(&mut self, attr: BatteryAttr) -> BatteryValue {
        self.battery.read(attr, &mut self.gauge)
    }

    pub fn read_battery_level(&mut self) -> u8 {
        self.battery.read_level(&mut self.gauge)
    }

    pub fn read_battery_voltage(&mut self) -> [u8; 2] {
        self.battery.read_voltage(&mut self.gauge)
    }

    pub fn read_battery_state(&mut self) -> u8 {
        self.battery.read_state(&mut self.gauge)
    }

    pub fn stop_advertising(&mut self) -> Result<(), Error> {
        self.manager.stop_advertising()
    }

    pub fn start_advertising(&mut self, config: Option<AdvertisingConfig>) -> Result<(), Error> {
        self.manager.start_advertising(config, &mut self.work)
    }

    pub fn disconnect(&mut self) -> Result<(), Error> {
        self.manager.disconnect()
    }

    pub fn link_state(&self) -> LinkState {
        self.manager.state()
    }

    pub fn buzzer_pattern(&self) -> BuzzerPattern {
        self.buzzer.pattern()
    }

    pub fn battery_subscribed(&self) -> bool {
        self.battery.is_subscribed()
    }

    pub fn manager(&self) -> &ConnectivityManager<L, O> {
        &self.manager
    }

    pub fn buzzer(&self) -> &BuzzerEngine<P> {
        &self.buzzer
    }

    pub fn work(&self) -> &WorkQueue<WORK_QUEUE_CAPACITY> {
        &self.work
    }

    fn on_disconnected(&mut self, reason: u8) {
        self.manager.on_disconnected(reason);
        self.battery.reset();
        if let Err(e) = self.buzzer.set_intermittent(false, 0, &mut self.work) {
            error!("buzzer shutdown on disconnect failed: {}", e);
        }
    }

    fn answer_read(&mut self, attr: BatteryAttr) {
        info!("battery read via BLE ({})", attr);
        let value = self.read_battery(attr);
        let (link, _) = self.manager.link_and_connection();
        if let Err(e) = link.reply_battery_read(attr, &value) {
            warn!("battery read reply failed: {}", e);
        }
    }

    fn report_battery(&mut self) {
        let reading = self.battery.refresh(&mut self.gauge);

        let (link, conn) = self.manager.link_and_connection();
        match self.battery.notify(link, conn, reading.percentage) {
            Ok(()) => {}
            Err(Error::NotConnected) | Err(Error::AccessDenied) => {
                debug!("battery report not sent (no subscriber)")
            }
            Err(e) => warn!("battery notification failed: {}", e),
        }

        self.work
            .submit_after(Work::BatteryReport, BATTERY_REPORT_INTERVAL_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::SampleError;
    use crate::testing::{MockConn, MockLink, MockPwm, NoDelay, Recorder, ScriptedSampler};

    type App = Coordinator<MockLink, Recorder, ScriptedSampler, NoDelay, MockPwm>;

    fn app_with(samples: &[Result<i16, SampleError>]) -> App {
        Coordinator::new(
            ConnectivityManager::new(MockLink::default(), Recorder::default()),
            BatteryGauge::new(ScriptedSampler::new(samples), NoDelay),
            BuzzerEngine::new(MockPwm::default()),
        )
    }

    /// Started, advertising, plenty of good samples.
    fn advertising() -> App {
        let mut app = app_with(&[Ok(3412); 64]);
        app.start("ProxTag", None, 0).unwrap();
        app.poll(0);
        assert_eq!(app.link_state(), LinkState::Advertising);
        app
    }

    fn connected(id: u32) -> Event<MockConn> {
        Event::Connected(Ok((MockConn::new(id), ConnInfo::from_units(24, 0, 400))))
    }

    fn write(byte: &[u8]) -> Event<MockConn> {
        Event::BuzzerWrite {
            offset: 0,
            data: Vec::from_slice(byte).unwrap(),
        }
    }

    #[test]
    fn start_brings_everything_up() {
        let app = advertising();
        assert_eq!(app.manager().link().enables, 1);
        assert_eq!(app.manager().observer().adv_started, 1);
        assert_eq!(app.buzzer().output().percent(), 0);
        assert_eq!(app.next_deadline(), Some(BATTERY_REPORT_INTERVAL_MS));
    }

    #[test]
    fn start_fails_on_bad_name() {
        let mut app = app_with(&[Ok(3412); 8]);
        assert_eq!(app.start("", None, 0), Err(Error::InvalidArgument));
        assert!(app.work().is_empty());
    }

    #[test]
    fn start_fails_when_pwm_dead() {
        let mut app = Coordinator::new(
            ConnectivityManager::new(MockLink::default(), Recorder::default()),
            BatteryGauge::new(ScriptedSampler::new(&[]), NoDelay),
            BuzzerEngine::new(MockPwm {
                fail: true,
                ..Default::default()
            }),
        );
        assert_eq!(app.start("ProxTag", None, 0), Err(Error::InitError));
    }

    #[test]
    fn alarm_write_drives_buzzer() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        app.handle(write(&[0x01]), 20).unwrap();
        assert!(app.buzzer_pattern().active);
        assert_eq!(app.buzzer_pattern().intensity, BUZZER_DEFAULT_INTENSITY);

        app.poll(20);
        assert_eq!(app.buzzer().output().percent(), 50);
        app.poll(520);
        assert_eq!(app.buzzer().output().percent(), 0);

        app.handle(write(&[0x00]), 600).unwrap();
        assert_eq!(app.buzzer().output().percent(), 0);
        assert!(!app.work().is_pending(Work::BuzzerToggle));
    }

    #[test]
    fn bad_alarm_write_returns_att_error() {
        let mut app = advertising();
        assert_eq!(
            app.handle(write(&[0x01, 0x01]), 0),
            Err(AttError::InvalidAttributeLength)
        );
        assert_eq!(
            app.handle(
                Event::BuzzerWrite {
                    offset: 1,
                    data: Vec::from_slice(&[0x01]).unwrap(),
                },
                0
            ),
            Err(AttError::InvalidOffset)
        );
        assert_eq!(app.handle(write(&[0x02]), 0), Err(AttError::ValueNotAllowed));
        assert!(!app.buzzer_pattern().active);
    }

    #[test]
    fn disconnect_resets_subscription_and_buzzer() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        app.handle(Event::BatteryCccWrite(0x0001), 11).unwrap();
        app.handle(write(&[0x01]), 12).unwrap();
        app.poll(12);
        assert!(app.battery_subscribed());
        assert_eq!(app.buzzer().output().percent(), 50);

        app.handle(Event::Disconnected { reason: 0x13 }, 13).unwrap();
        assert!(!app.battery_subscribed());
        assert!(!app.buzzer_pattern().active);
        assert_eq!(app.buzzer().output().percent(), 0);
        assert_eq!(app.link_state(), LinkState::Ready);
    }

    #[test]
    fn disconnect_without_connection_is_harmless() {
        let mut app = advertising();
        app.handle(Event::Disconnected { reason: 0x08 }, 5).unwrap();
        assert!(!app.battery_subscribed());
        assert!(!app.buzzer_pattern().active);
        assert_eq!(app.manager().observer().disconnected, 1);
    }

    #[test]
    fn recycle_readvertises() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        app.handle(Event::Disconnected { reason: 0x13 }, 20).unwrap();
        app.handle(Event::Recycled, 21).unwrap();
        app.poll(21);
        assert_eq!(app.link_state(), LinkState::Advertising);
        assert_eq!(app.manager().link().adv_starts, 2);
    }

    #[test]
    fn failed_connection_retries_advertising() {
        let mut app = advertising();
        app.handle(Event::Connected(Err(0x3E)), 10).unwrap();
        assert_eq!(app.link_state(), LinkState::Ready);
        assert!(app.work().is_pending(Work::StartAdvertising));
        app.poll(10);
        assert_eq!(app.link_state(), LinkState::Advertising);
    }

    #[test]
    fn periodic_report_notifies_subscriber() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        app.handle(Event::BatteryCccWrite(0x0001), 11).unwrap();

        app.poll(BATTERY_REPORT_INTERVAL_MS);
        assert_eq!(app.manager().link().notified, vec![100]);
        assert_eq!(
            app.next_deadline(),
            Some(2 * BATTERY_REPORT_INTERVAL_MS)
        );
    }

    #[test]
    fn periodic_report_without_subscriber_stays_quiet() {
        let mut app = advertising();
        app.poll(BATTERY_REPORT_INTERVAL_MS);
        assert!(app.manager().link().notified.is_empty());
        assert!(app.work().is_pending(Work::BatteryReport));
    }

    #[test]
    fn client_read_samples_the_gauge() {
        // init, boot check and cache seed use three bursts; the battery
        // then sags before the client reads.
        let mut script = vec![Ok(3412); 12];
        script.extend_from_slice(&[Ok(2503); 8]);
        let mut app = app_with(&script);
        app.start("ProxTag", None, 0).unwrap();
        app.handle(connected(1), 1_000).unwrap();

        app.handle(Event::BatteryRead(BatteryAttr::Voltage), 50_000).unwrap();
        app.handle(Event::BatteryRead(BatteryAttr::State), 50_001).unwrap();
        assert_eq!(
            app.manager().link().replies,
            vec![
                (BatteryAttr::Voltage, 2200u16.to_le_bytes().to_vec()),
                (BatteryAttr::State, vec![0]),
            ]
        );
    }

    #[test]
    fn failed_read_reply_is_only_logged() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        app.manager.link_and_connection().0.fail_reply = true;
        assert_eq!(app.handle(Event::BatteryRead(BatteryAttr::Level), 11), Ok(()));
        assert!(app.manager().link().replies.is_empty());
    }

    #[test]
    fn battery_reads_are_fresh() {
        let mut app = advertising();
        assert_eq!(app.read_battery_level(), 100);
        assert_eq!(app.read_battery_voltage(), 3000u16.to_le_bytes());
        assert_eq!(app.read_battery_state(), 3);
    }

    #[test]
    fn start_advertising_while_connected_is_invalid() {
        let mut app = advertising();
        app.handle(connected(1), 10).unwrap();
        assert_eq!(app.start_advertising(None), Err(Error::InvalidState));
        assert_eq!(app.disconnect(), Ok(()));
        assert_eq!(app.manager().link().disconnects, 1);
    }

    #[test]
    fn stop_then_restart_advertising() {
        let mut app = advertising();
        assert_eq!(app.stop_advertising(), Ok(()));
        assert_eq!(app.link_state(), LinkState::Ready);
        assert_eq!(app.start_advertising(None), Ok(()));
        app.poll(1);
        assert_eq!(app.link_state(), LinkState::Advertising);
    }
}
