//! Single-link connectivity manager.
//!
//! Owns the advertising/connection state machine and the one active
//! connection handle. Starting advertising is deferred through the work
//! queue; link events (connect, disconnect, recycle) are fed in by the
//! application task in arrival order.

use heapless::String;

use crate::ble::adv_data::{advertising_data, scan_response_data, AdvPayload};
use crate::ble::{AdvertisingConfig, ConnInfo, LinkLayer, LinkObserver, LinkState};
use crate::config::DEVICE_NAME_MAX_LEN;
use crate::error::Error;
use crate::work::{Scheduler, Work};

pub struct ConnectivityManager<L: LinkLayer, O> {
    link: L,
    observer: O,
    state: LinkState,
    name: String<DEVICE_NAME_MAX_LEN>,
    adv_config: AdvertisingConfig,
    adv_data: AdvPayload,
    scan_data: AdvPayload,
    /// Dropping the handle releases it, so a stale one can only be
    /// released once.
    conn: Option<L::Connection>,
}

impl<L: LinkLayer, O: LinkObserver> ConnectivityManager<L, O> {
    pub fn new(link: L, observer: O) -> Self {
        Self {
            link,
            observer,
            state: LinkState::Uninitialized,
            name: String::new(),
            adv_config: AdvertisingConfig::default(),
            adv_data: AdvPayload::new(),
            scan_data: AdvPayload::new(),
            conn: None,
        }
    }

    /// Enable the link layer and remember the advertised name.
    pub fn init(&mut self, name: &str) -> Result<(), Error> {
        if self.state != LinkState::Uninitialized {
            warn!("connectivity already initialized");
            return Ok(());
        }
        if name.is_empty() {
            error!("device name is empty");
            return Err(Error::InvalidArgument);
        }
        let mut stored = String::new();
        if stored.push_str(name).is_err() {
            error!("device name too long ({} bytes)", name.len());
            return Err(Error::InvalidArgument);
        }

        self.link.enable().map_err(|e| {
            error!("link layer enable failed: {}", e);
            Error::InitError
        })?;

        self.adv_data = advertising_data(&stored);
        self.scan_data = scan_response_data();
        self.name = stored;
        self.state = LinkState::Ready;
        info!("connectivity ready as {}", name);
        Ok(())
    }

    /// Queue an advertising start. `None` uses the default parameters.
    ///
    /// Radio failures surface later in the log, never here.
    pub fn start_advertising(
        &mut self,
        config: Option<AdvertisingConfig>,
        sched: &mut impl Scheduler,
    ) -> Result<(), Error> {
        match self.state {
            LinkState::Uninitialized => return Err(Error::NotInitialized),
            LinkState::Connected => {
                warn!("cannot advertise while connected");
                return Err(Error::InvalidState);
            }
            LinkState::Advertising => return Ok(()),
            LinkState::Ready => {}
        }

        let config = config.unwrap_or_default();
        if config.validate().is_err() {
            error!(
                "invalid advertising interval {}..{} ms",
                config.interval_min_ms, config.interval_max_ms
            );
            return Err(Error::InvalidArgument);
        }

        self.adv_config = config;
        sched.submit(Work::StartAdvertising);
        Ok(())
    }

    /// Handler for [`Work::StartAdvertising`].
    pub fn on_advertise_work(&mut self) {
        if self.state == LinkState::Connected {
            warn!("already connected, skipping advertising start");
            return;
        }

        let params = self.adv_config.params();
        match self
            .link
            .start_advertising(&params, &self.adv_data, &self.scan_data)
        {
            Ok(()) => {
                self.state = LinkState::Advertising;
                info!(
                    "advertising started ({}..{} ms)",
                    self.adv_config.interval_min_ms, self.adv_config.interval_max_ms
                );
                self.observer.on_adv_started();
            }
            Err(e) => error!("advertising failed to start: {}", e),
        }
    }

    pub fn stop_advertising(&mut self) -> Result<(), Error> {
        if self.state != LinkState::Advertising {
            return Err(Error::InvalidState);
        }
        self.link.stop_advertising().map_err(|e| {
            error!("advertising failed to stop: {}", e);
            Error::Link(e)
        })?;
        self.state = LinkState::Ready;
        info!("advertising stopped");
        self.observer.on_adv_stopped();
        Ok(())
    }

    /// Ask the stack to drop the link. The state only changes once the
    /// disconnect event comes back.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let conn = self.conn.as_ref().ok_or(Error::NotConnected)?;
        self.link.disconnect(conn).map_err(|e| {
            error!("disconnect request failed: {}", e);
            Error::Link(e)
        })
    }

    /// Outcome of a connection attempt; `Err` carries the HCI status.
    pub fn on_connected(
        &mut self,
        result: Result<(L::Connection, ConnInfo), u8>,
        sched: &mut impl Scheduler,
    ) {
        match result {
            Err(status) => {
                warn!("connection failed ({:#x}), re-advertising", status);
                self.state = LinkState::Ready;
                sched.submit(Work::StartAdvertising);
            }
            Ok((conn, info)) => {
                if self.conn.take().is_some() {
                    debug!("released stale connection");
                }
                self.conn = Some(conn);
                self.state = LinkState::Connected;
                info!(
                    "connected (interval {} ms, latency {}, timeout {} ms)",
                    info.interval_ms, info.latency, info.timeout_ms
                );
                self.observer.on_connected(&info);
            }
        }
    }

    pub fn on_disconnected(&mut self, reason: u8) {
        info!("disconnected (reason {:#x})", reason);
        self.conn = None;
        self.state = LinkState::Ready;
        self.observer.on_disconnected(reason);
    }

    /// The stack has freed the connection object; advertise again.
    pub fn on_recycled(&mut self, sched: &mut impl Scheduler) {
        debug!("connection recycled");
        sched.submit(Work::StartAdvertising);
        self.observer.on_recycled();
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn connection(&self) -> Option<&L::Connection> {
        self.conn.as_ref()
    }

    pub fn device_name(&self) -> &str {
        &self.name
    }

    pub fn adv_config(&self) -> &AdvertisingConfig {
        &self.adv_config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Connection and link layer together, for GATT notifications.
    pub fn link_and_connection(&mut self) -> (&mut L, Option<&L::Connection>) {
        (&mut self.link, self.conn.as_ref())
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}
