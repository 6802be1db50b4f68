//! proxtag firmware entry point (nRF52840 + S140).
//!
//! Boot order: peripherals, SoftDevice, GATT table, radio tasks, then the
//! application task that owns the coordinator. Any startup failure halts
//! the device.

#![no_std]
#![no_main]

mod board;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::pwm::SimplePwm;
use embassy_nrf::saadc::{self, ChannelConfig, Saadc, VddInput};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_time::{Delay, Instant, Timer};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::Softdevice;
use panic_probe as _;
use static_cell::StaticCell;

use board::link::{self, Server, SoftdeviceLink, EVENTS};
use board::pwm::PwmBuzzer;
use board::saadc::SaadcSampler;
use proxtag::config::DEVICE_NAME;
use proxtag::{
    BatteryGauge, BuzzerEngine, ConnectivityManager, Coordinator, Event, StatusLeds,
};

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
});

type App = Coordinator<
    SoftdeviceLink,
    StatusLeds<Output<'static>, Output<'static>>,
    SaadcSampler,
    Delay,
    PwmBuzzer,
>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("proxtag booting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SAADC.set_priority(Priority::P3);

    // Battery on VDD
    let mut channel = ChannelConfig::single_ended(VddInput);
    channel.gain = saadc::Gain::GAIN1_6;
    channel.reference = saadc::Reference::INTERNAL;
    let mut adc_config = saadc::Config::default();
    adc_config.resolution = saadc::Resolution::_12BIT;
    let adc = Saadc::new(p.SAADC, Irqs, adc_config, [channel]);

    // Buzzer on P0.13, LEDs on P0.30 (green) / P0.06 (blue)
    let pwm = SimplePwm::new_1ch(p.PWM0, p.P0_13);
    let green = Output::new(p.P0_30, Level::Low, OutputDrive::Standard);
    let blue = Output::new(p.P0_06, Level::Low, OutputDrive::Standard);

    let sd = Softdevice::enable(&board::softdevice_config());
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server: Option<&'static Server> = link::register(sd).map(|s| &*SERVER.init(s));
    link::spawn(&spawner, sd, server);

    let manager = ConnectivityManager::new(SoftdeviceLink::new(server), StatusLeds::new(green, blue));
    let gauge = BatteryGauge::new(SaadcSampler::new(adc), Delay);
    let buzzer = BuzzerEngine::new(PwmBuzzer::new(pwm));
    let mut app: App = Coordinator::new(manager, gauge, buzzer);

    if let Err(e) = app.start(DEVICE_NAME, None, Instant::now().as_millis()) {
        defmt::panic!("startup failed: {}", e);
    }

    unwrap!(spawner.spawn(app_task(app)));
}

/// Owns the coordinator: feeds it radio events and runs due work.
#[embassy_executor::task]
async fn app_task(mut app: App) -> ! {
    loop {
        let event: Option<Event<Connection>> = match app.next_deadline() {
            Some(deadline) => {
                match select(EVENTS.receive(), Timer::at(Instant::from_millis(deadline))).await {
                    Either::First(event) => Some(event),
                    Either::Second(()) => None,
                }
            }
            None => Some(EVENTS.receive().await),
        };

        let now = Instant::now().as_millis();
        if let Some(event) = event {
            if let Err(att) = app.handle(event, now) {
                warn!("alarm write rejected (ATT {=u8:#x})", att.code());
            }
        }
        app.poll(now);
    }
}
