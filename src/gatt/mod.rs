//! GATT bridges.
//!
//! Translate characteristic reads, writes and notifications into calls on
//! the battery gauge and buzzer engine. The attribute table itself belongs
//! to the radio stack; these types only enforce the wire formats.

pub mod battery_service;
pub mod buzzer_service;
pub mod uuids;

pub use battery_service::BatteryBridge;
pub use buzzer_service::BuzzerBridge;
