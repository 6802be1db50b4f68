//! Unified error type for proxtag.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A parameter was out of range (name length, interval, intensity).
    InvalidArgument,

    /// The operation is not allowed in the current lifecycle state.
    InvalidState,

    /// The component was used before `init()`.
    NotInitialized,

    /// No BLE link is established.
    NotConnected,

    /// The client has not subscribed to notifications.
    AccessDenied,

    /// Hardware sampling produced no usable value.
    ReadError,

    /// A collaborator could not be brought up.
    InitError,

    /// The radio stack refused the request.
    Link(BleError),
}

/// Subset of radio-stack errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// GATT server registration failed.
    RegisterFailed,
    /// Advertising could not start or stop.
    AdvertiseFailed,
    /// Termination request was rejected.
    DisconnectFailed,
    /// Notification could not be queued.
    NotifyFailed,
    /// No deferred read was waiting, or the stack refused the reply.
    ReplyFailed,
}

/// ATT protocol error codes returned to a GATT client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AttError {
    InvalidOffset = 0x07,
    InvalidAttributeLength = 0x0D,
    ValueNotAllowed = 0x13,
}

impl AttError {
    /// Wire value of the error code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Link(e)
    }
}
