//! SoftDevice link layer.
//!
//! The core drives the radio synchronously through [`LinkLayer`]; the
//! SoftDevice API is async. The two meet through:
//!
//! - `ADV_CONTROL` - start/stop requests from the core to the radio task
//! - `EVENTS` - connect, disconnect, recycle and GATT requests back to the
//!   application task, in the order they happen
//! - `PENDING_READ` - the reply token of a battery read the application
//!   task has not answered yet
//!
//! Advertising failures are reported as a failed connection attempt so the
//! core's retry path handles them.

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{
    self, CharacteristicHandles, DeferredReadReply, RegisterError, WriteOp,
};
use nrf_softdevice::ble::{peripheral, Connection, Uuid};
use nrf_softdevice::Softdevice;

use proxtag::app::MAX_WRITE_LEN;
use proxtag::ble::adv_data::AdvPayload;
use proxtag::ble::{AdvParams, ConnInfo, LinkLayer};
use proxtag::config::EVENT_QUEUE_DEPTH;
use proxtag::gatt::battery_service::BatteryAttr;
use proxtag::gatt::buzzer_service::{ALARM_PRESENTATION_FORMAT, ALARM_USER_DESCRIPTION};
use proxtag::gatt::uuids::{
    BATTERY_LEVEL_UUID16, BATTERY_SERVICE_UUID16, BATTERY_STATE_UUID, BATTERY_VOLTAGE_UUID,
    BUZZER_ALARM_UUID, BUZZER_SERVICE_UUID, CCC_NOTIFY, PRESENTATION_FORMAT_UUID16,
    USER_DESCRIPTION_UUID16,
};
use proxtag::{BleError, Event};

// ═══════════════════════════════════════════════════════════════════════════
// GATT attribute table
// ═══════════════════════════════════════════════════════════════════════════

/// Battery values are never stored in the table: every read is deferred to
/// the application task, which samples the gauge and answers.
pub struct Server {
    battery_level: CharacteristicHandles,
    voltage: CharacteristicHandles,
    state: CharacteristicHandles,
    alarm: CharacteristicHandles,
}

impl Server {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut bas = ServiceBuilder::new(sd, Uuid::new_16(BATTERY_SERVICE_UUID16))?;
        let battery_level = bas
            .add_characteristic(
                Uuid::new_16(BATTERY_LEVEL_UUID16),
                Attribute::new([0u8]).deferred_read(),
                Metadata::new(Properties::new().read().notify()),
            )?
            .build();
        let voltage = bas
            .add_characteristic(
                Uuid::new_128(&BATTERY_VOLTAGE_UUID.to_le_bytes()),
                Attribute::new([0u8; 2]).deferred_read(),
                Metadata::new(Properties::new().read()),
            )?
            .build();
        let state = bas
            .add_characteristic(
                Uuid::new_128(&BATTERY_STATE_UUID.to_le_bytes()),
                Attribute::new([0u8]).deferred_read(),
                Metadata::new(Properties::new().read()),
            )?
            .build();
        bas.build();

        let mut buzzer = ServiceBuilder::new(sd, Uuid::new_128(&BUZZER_SERVICE_UUID.to_le_bytes()))?;
        let mut alarm = buzzer.add_characteristic(
            Uuid::new_128(&BUZZER_ALARM_UUID.to_le_bytes()),
            // Oversized writes reach the bridge so it can log the length.
            Attribute::new([0u8]).variable_len(MAX_WRITE_LEN as u16),
            Metadata::new(Properties::new().write_without_response()),
        )?;
        alarm.add_descriptor(
            Uuid::new_16(USER_DESCRIPTION_UUID16),
            Attribute::new(ALARM_USER_DESCRIPTION),
        )?;
        alarm.add_descriptor(
            Uuid::new_16(PRESENTATION_FORMAT_UUID16),
            Attribute::new(ALARM_PRESENTATION_FORMAT),
        )?;
        let alarm = alarm.build();
        buzzer.build();

        Ok(Self {
            battery_level,
            voltage,
            state,
            alarm,
        })
    }

    fn battery_attr(&self, handle: u16) -> Option<BatteryAttr> {
        if handle == self.battery_level.value_handle {
            Some(BatteryAttr::Level)
        } else if handle == self.voltage.value_handle {
            Some(BatteryAttr::Voltage)
        } else if handle == self.state.value_handle {
            Some(BatteryAttr::State)
        } else {
            None
        }
    }
}

impl gatt_server::Server for Server {
    type Event = Event<Connection>;

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        if handle == self.battery_level.cccd_handle {
            let notify = data.first().is_some_and(|b| b & 0x01 != 0);
            return Some(Event::BatteryCccWrite(if notify { CCC_NOTIFY } else { 0 }));
        }
        if handle == self.alarm.value_handle {
            let kept = &data[..data.len().min(MAX_WRITE_LEN)];
            return Some(Event::BuzzerWrite {
                offset: offset.min(usize::from(u16::MAX)) as u16,
                data: Vec::from_slice(kept).unwrap_or_default(),
            });
        }
        None
    }

    fn on_deferred_read(
        &self,
        handle: u16,
        offset: usize,
        reply: DeferredReadReply,
    ) -> Option<Self::Event> {
        let Some(attr) = self.battery_attr(handle) else {
            // Nothing else in the table is deferred; let the stack serve it.
            if reply.reply(Ok(None)).is_err() {
                warn!("deferred read of unknown handle {=u16:#x} failed", handle);
            }
            return None;
        };
        let stale = PENDING_READ.lock(|slot| slot.borrow_mut().replace((offset, reply)));
        if stale.is_some() {
            warn!("previous battery read never answered");
        }
        Some(Event::BatteryRead(attr))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Task plumbing
// ═══════════════════════════════════════════════════════════════════════════

pub struct AdvRequest {
    pub params: AdvParams,
    pub adv: AdvPayload,
    pub scan: AdvPayload,
}

pub enum AdvCommand {
    Start(AdvRequest),
    Stop,
}

pub static ADV_CONTROL: Signal<CriticalSectionRawMutex, AdvCommand> = Signal::new();

pub static EVENTS: Channel<CriticalSectionRawMutex, Event<Connection>, EVENT_QUEUE_DEPTH> =
    Channel::new();

/// ATT allows one outstanding request per link, so one slot suffices.
static PENDING_READ: Mutex<CriticalSectionRawMutex, RefCell<Option<(usize, DeferredReadReply)>>> =
    Mutex::new(RefCell::new(None));

/// Parameters the central picked for the new link.
fn conn_info(conn: &Connection) -> ConnInfo {
    let params = conn.conn_params();
    ConnInfo::from_units(
        params.max_conn_interval,
        params.slave_latency,
        params.conn_sup_timeout,
    )
}

/// HCI status reported for advertising that ended without a connection.
fn advertise_error_status(err: &peripheral::AdvertiseError) -> u8 {
    match err {
        // Advertising Timeout
        peripheral::AdvertiseError::Timeout => 0x3C,
        // Connection Limit Exceeded
        peripheral::AdvertiseError::NoFreeConn => 0x09,
        // Unspecified Error
        peripheral::AdvertiseError::Raw(_) => 0x1F,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LinkLayer implementation
// ═══════════════════════════════════════════════════════════════════════════

pub struct SoftdeviceLink {
    server: Option<&'static Server>,
}

impl SoftdeviceLink {
    /// `server` is `None` when GATT registration failed; `enable()` then
    /// reports it.
    pub fn new(server: Option<&'static Server>) -> Self {
        Self { server }
    }
}

impl LinkLayer for SoftdeviceLink {
    type Connection = Connection;

    fn enable(&mut self) -> Result<(), BleError> {
        match self.server {
            Some(_) => Ok(()),
            None => Err(BleError::RegisterFailed),
        }
    }

    fn start_advertising(
        &mut self,
        params: &AdvParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<(), BleError> {
        let adv = Vec::from_slice(adv_data).map_err(|_| BleError::AdvertiseFailed)?;
        let scan = Vec::from_slice(scan_data).map_err(|_| BleError::AdvertiseFailed)?;
        ADV_CONTROL.signal(AdvCommand::Start(AdvRequest {
            params: *params,
            adv,
            scan,
        }));
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), BleError> {
        ADV_CONTROL.signal(AdvCommand::Stop);
        Ok(())
    }

    fn disconnect(&mut self, conn: &Connection) -> Result<(), BleError> {
        conn.disconnect().map_err(|_| BleError::DisconnectFailed)
    }

    fn notify_battery_level(&mut self, conn: &Connection, level: u8) -> Result<(), BleError> {
        let server = self.server.ok_or(BleError::RegisterFailed)?;
        gatt_server::notify_value(conn, server.battery_level.value_handle, &[level])
            .map_err(|_| BleError::NotifyFailed)
    }

    fn reply_battery_read(&mut self, attr: BatteryAttr, value: &[u8]) -> Result<(), BleError> {
        let (offset, reply) = PENDING_READ
            .lock(|slot| slot.borrow_mut().take())
            .ok_or(BleError::ReplyFailed)?;
        // Long reads continue from `offset`; past the end the value is empty.
        let rest = value.get(offset..).unwrap_or(&[]);
        reply.reply(Ok(Some(rest))).map_err(|_| {
            warn!("reply to {} read refused", attr);
            BleError::ReplyFailed
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Resolves on the next stop request; start requests seen meanwhile are
/// already being served.
async fn wait_stop() {
    loop {
        if let AdvCommand::Stop = ADV_CONTROL.wait().await {
            return;
        }
    }
}

fn post(event: Event<Connection>) {
    if EVENTS.try_send(event).is_err() {
        // A dropped read leaves its reply pending; the client times out.
        warn!("event queue full, GATT event dropped");
    }
}

/// Radio side: advertise on request, serve GATT while connected.
#[embassy_executor::task]
pub async fn advertiser_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    loop {
        let AdvCommand::Start(req) = ADV_CONTROL.wait().await else {
            continue;
        };

        let config = peripheral::Config {
            interval: req.params.interval_min,
            ..Default::default()
        };
        if !req.params.use_identity {
            info!("private addressing requested, advertising with identity address");
        }

        if !req.params.connectable {
            let adv = peripheral::NonconnectableAdvertisement::ScannableUndirected {
                adv_data: &req.adv,
                scan_data: &req.scan,
            };
            if let Either::First(Err(e)) =
                select(peripheral::advertise(sd, adv, &config), wait_stop()).await
            {
                warn!("non-connectable advertising ended: {}", e);
            }
            continue;
        }

        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &req.adv,
            scan_data: &req.scan,
        };
        let conn = match select(peripheral::advertise_connectable(sd, adv, &config), wait_stop())
            .await
        {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(e)) => {
                warn!("advertising ended without connection: {}", e);
                EVENTS
                    .send(Event::Connected(Err(advertise_error_status(&e))))
                    .await;
                continue;
            }
            Either::Second(()) => continue,
        };

        let info = conn_info(&conn);
        EVENTS.send(Event::Connected(Ok((conn.clone(), info)))).await;
        let _ = gatt_server::run(&conn, server, post).await;
        PENDING_READ.lock(|slot| slot.borrow_mut().take());
        // The SoftDevice wrapper does not surface the HCI reason.
        EVENTS.send(Event::Disconnected { reason: 0 }).await;
        drop(conn);
        EVENTS.send(Event::Recycled).await;
    }
}

/// Register the attribute table. Must run before the SoftDevice task.
pub fn register(sd: &mut Softdevice) -> Option<Server> {
    match Server::new(sd) {
        Ok(server) => Some(server),
        Err(e) => {
            defmt::error!("GATT registration failed: {}", e);
            None
        }
    }
}

/// Spawn the radio tasks once the server exists.
pub fn spawn(spawner: &embassy_executor::Spawner, sd: &'static Softdevice, server: Option<&'static Server>) {
    unwrap!(spawner.spawn(softdevice_task(sd)));
    if let Some(server) = server {
        unwrap!(spawner.spawn(advertiser_task(sd, server)));
    }
}
