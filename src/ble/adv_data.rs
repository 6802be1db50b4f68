//! Legacy advertising payloads.
//!
//! Advertising data: flags (LE General Discoverable, BR/EDR not supported)
//! followed by the device name. Scan response: the 128-bit Buzzer service
//! UUID so centrals can filter on it.

use crate::config::ADV_PAYLOAD_MAX_LEN;
use crate::gatt::uuids::BUZZER_SERVICE_UUID;
use heapless::Vec;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_COMPLETE_UUID128: u8 = 0x07;

/// LE General Discoverable | BR/EDR Not Supported.
pub const FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

pub type AdvPayload = Vec<u8, ADV_PAYLOAD_MAX_LEN>;

/// Flags + local name.
///
/// Names that don't fit next to the flags are cut and tagged as
/// "shortened" so scanners know more exists.
pub fn advertising_data(name: &str) -> AdvPayload {
    let mut out = AdvPayload::new();
    push_field(&mut out, AD_TYPE_FLAGS, &[FLAGS_GENERAL_NO_BREDR]);

    let mut room = ADV_PAYLOAD_MAX_LEN - out.len() - 2;
    if name.len() <= room {
        push_field(&mut out, AD_TYPE_COMPLETE_NAME, name.as_bytes());
    } else {
        // Never split a character.
        while !name.is_char_boundary(room) {
            room -= 1;
        }
        push_field(&mut out, AD_TYPE_SHORT_NAME, name[..room].as_bytes());
    }
    out
}

/// Buzzer service UUID, little-endian as carried over the air.
pub fn scan_response_data() -> AdvPayload {
    let mut out = AdvPayload::new();
    push_field(
        &mut out,
        AD_TYPE_COMPLETE_UUID128,
        &BUZZER_SERVICE_UUID.to_le_bytes(),
    );
    out
}

fn push_field(out: &mut AdvPayload, ad_type: u8, data: &[u8]) {
    // Callers size fields to fit; anything beyond capacity is dropped.
    let _ = out.push(data.len() as u8 + 1);
    let _ = out.push(ad_type);
    let _ = out.extend_from_slice(data);
}

/// Find the first AD structure of `ad_type` and return its payload.
pub fn find_field(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if data[i + 1] == ad_type {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

/// Complete or shortened local name, if present and valid UTF-8.
pub fn local_name(data: &[u8]) -> Option<&str> {
    find_field(data, AD_TYPE_COMPLETE_NAME)
        .or_else(|| find_field(data, AD_TYPE_SHORT_NAME))
        .and_then(|bytes| core::str::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_then_complete_name() {
        let data = advertising_data("ProxTag");
        assert_eq!(&data[..3], &[0x02, 0x01, 0x06]);
        assert_eq!(data[3], 8);
        assert_eq!(data[4], AD_TYPE_COMPLETE_NAME);
        assert_eq!(&data[5..], b"ProxTag");
        assert_eq!(local_name(&data), Some("ProxTag"));
    }

    #[test]
    fn longest_complete_name_fills_payload() {
        let name = "abcdefghijklmnopqrstuvwxyz";
        let data = advertising_data(name);
        assert_eq!(data.len(), 31);
        assert_eq!(find_field(&data, AD_TYPE_COMPLETE_NAME), Some(name.as_bytes()));
    }

    #[test]
    fn overlong_name_is_shortened() {
        let name = "abcdefghijklmnopqrstuvwxyz012";
        let data = advertising_data(name);
        assert_eq!(data.len(), 31);
        assert_eq!(find_field(&data, AD_TYPE_COMPLETE_NAME), None);
        assert_eq!(local_name(&data), Some("abcdefghijklmnopqrstuvwxyz"));
    }

    #[test]
    fn shortened_name_keeps_whole_characters() {
        // 25 ASCII bytes then 'é' (2 bytes) straddling the 26-byte limit.
        let name = "abcdefghijklmnopqrstuvwxyé";
        let data = advertising_data(name);
        assert_eq!(data.len(), 30);
        assert_eq!(local_name(&data), Some("abcdefghijklmnopqrstuvwxy"));
        assert!(find_field(&data, AD_TYPE_SHORT_NAME).is_some());
    }

    #[test]
    fn scan_response_carries_buzzer_uuid() {
        let data = scan_response_data();
        assert_eq!(data.len(), 18);
        let uuid = find_field(&data, AD_TYPE_COMPLETE_UUID128).unwrap();
        // 12345678-abcd-efab-cdef-123456789abc, least significant byte first.
        assert_eq!(uuid[0], 0xbc);
        assert_eq!(uuid[15], 0x12);
    }

    #[test]
    fn truncated_structure_stops_parsing() {
        let data = [0x02, 0x01, 0x06, 0x09, 0x09, b'a'];
        assert_eq!(find_field(&data, AD_TYPE_FLAGS), Some(&[0x06][..]));
        assert_eq!(local_name(&data), None);
    }
}
