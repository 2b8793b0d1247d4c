//! Byte layout of the System Management Controller call structure.
//!
//! Requests and replies share one 80-byte structure. Multi-byte integers are
//! stored in native byte order with natural C alignment:
//!
//! ```text
//! offset  size  field
//!      0     4  key (four chars packed big-endian into a u32)
//!      4     6  version {major, minor, build, reserved, release:u16}
//!     10     2  padding
//!     12    16  power limits {version:u16, length:u16, cpu:u32, gpu:u32, mem:u32}
//!     28     4  key info: data size
//!     32     4  key info: data type (four-char code)
//!     36     1  key info: attributes
//!     37     3  padding
//!     40     1  result
//!     41     1  status
//!     42     1  selector
//!     43     1  padding
//!     44     4  data32
//!     48    32  value bytes
//! ```

use crate::error::SmcError;
use hostpulse_core::{ControllerBuffer, CONTROLLER_BUFFER_LEN};
use std::fmt;
use std::str::FromStr;

pub const KEY_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 4;
pub const POWER_LIMIT_OFFSET: usize = 12;
pub const DATA_SIZE_OFFSET: usize = 28;
pub const DATA_TYPE_OFFSET: usize = 32;
pub const DATA_ATTRIBUTES_OFFSET: usize = 36;
pub const RESULT_OFFSET: usize = 40;
pub const STATUS_OFFSET: usize = 41;
pub const SELECTOR_OFFSET: usize = 42;
pub const DATA32_OFFSET: usize = 44;
pub const BYTES_OFFSET: usize = 48;

/// Capacity of the value buffer.
pub const MAX_VALUE_BYTES: usize = 32;

/// Selector asking for a key's declared size and type.
pub const CMD_READ_KEY_INFO: u8 = 9;
/// Selector asking for a key's value bytes.
pub const CMD_READ_BYTES: u8 = 5;

/// Four ASCII characters packed big-endian into a `u32`.
///
/// Used both for controller keys (`TC0P`) and data type tags (`sp78`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(u32);

/// A controller key such as `TC0P`.
pub type SmcKey = FourCc;

/// A data type tag such as `sp78` or `fpe2`.
pub type DataType = FourCc;

impl FourCc {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl FromStr for FourCc {
    type Err = SmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| SmcError::invalid_key(s, "must be exactly four bytes"))?;
        if !bytes.is_ascii() {
            return Err(SmcError::invalid_key(s, "must be ASCII"));
        }
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

/// Key of fan channel `channel` (`F0Ac`, `F1Ac`, ...).
///
/// # Panics
///
/// Panics if `channel` is not a single decimal digit.
#[must_use]
pub fn fan_key(channel: u8) -> SmcKey {
    assert!(channel < 10, "fan channel must be 0-9, got {channel}");
    FourCc::from_bytes([b'F', b'0' + channel, b'A', b'c'])
}

fn put_u32(buf: &mut ControllerBuffer, offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

fn get_u32(buf: &ControllerBuffer, offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(word)
}

/// One outgoing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcRequest {
    pub key: SmcKey,
    pub selector: u8,
    pub data_size: u32,
}

impl SmcRequest {
    /// Probe for a key's declared size and type.
    #[must_use]
    pub const fn key_info(key: SmcKey) -> Self {
        Self {
            key,
            selector: CMD_READ_KEY_INFO,
            data_size: 0,
        }
    }

    /// Fetch `data_size` value bytes of a key.
    #[must_use]
    pub const fn read_bytes(key: SmcKey, data_size: u32) -> Self {
        Self {
            key,
            selector: CMD_READ_BYTES,
            data_size,
        }
    }

    /// Lay the request out as a zero-filled call structure.
    #[must_use]
    pub fn encode(&self) -> ControllerBuffer {
        let mut buf = [0u8; CONTROLLER_BUFFER_LEN];
        put_u32(&mut buf, KEY_OFFSET, self.key.code());
        put_u32(&mut buf, DATA_SIZE_OFFSET, self.data_size);
        buf[SELECTOR_OFFSET] = self.selector;
        buf
    }
}

/// The fields of a reply this client reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcReply {
    pub key: SmcKey,
    pub result: u8,
    pub status: u8,
    pub data_size: u32,
    pub data_type: DataType,
    pub attributes: u8,
    pub bytes: [u8; MAX_VALUE_BYTES],
}

impl SmcReply {
    #[must_use]
    pub fn decode(buf: &ControllerBuffer) -> Self {
        let mut bytes = [0u8; MAX_VALUE_BYTES];
        bytes.copy_from_slice(&buf[BYTES_OFFSET..BYTES_OFFSET + MAX_VALUE_BYTES]);
        Self {
            key: FourCc::from_code(get_u32(buf, KEY_OFFSET)),
            result: buf[RESULT_OFFSET],
            status: buf[STATUS_OFFSET],
            data_size: get_u32(buf, DATA_SIZE_OFFSET),
            data_type: FourCc::from_code(get_u32(buf, DATA_TYPE_OFFSET)),
            attributes: buf[DATA_ATTRIBUTES_OFFSET],
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_cc_packing() {
        let key: SmcKey = "TC0P".parse().unwrap();
        assert_eq!(key.code(), 0x5443_3050);
        assert_eq!(key.to_string(), "TC0P");
        assert_eq!(key.to_bytes(), *b"TC0P");
    }

    #[test]
    fn test_four_cc_rejects_bad_keys() {
        assert!("TC0".parse::<SmcKey>().is_err());
        assert!("TC0PX".parse::<SmcKey>().is_err());
        assert!("TC°".parse::<SmcKey>().is_err());
    }

    #[test]
    fn test_fan_keys() {
        assert_eq!(fan_key(0).to_string(), "F0Ac");
        assert_eq!(fan_key(3).to_string(), "F3Ac");
    }

    #[test]
    fn test_key_info_request_layout() {
        let key: SmcKey = "TC0P".parse().unwrap();
        let buf = SmcRequest::key_info(key).encode();

        assert_eq!(buf.len(), 80);
        assert_eq!(u32::from_ne_bytes(buf[0..4].try_into().unwrap()), 0x5443_3050);
        assert_eq!(buf[SELECTOR_OFFSET], 9);
        assert_eq!(&buf[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4], &[0; 4]);
        // Version and power limit blocks stay zero-filled
        assert!(buf[VERSION_OFFSET..DATA_SIZE_OFFSET].iter().all(|&b| b == 0));
        assert!(buf[BYTES_OFFSET..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_bytes_request_layout() {
        let key: SmcKey = "F0Ac".parse().unwrap();
        let buf = SmcRequest::read_bytes(key, 2).encode();

        assert_eq!(buf[42], 5);
        assert_eq!(u32::from_ne_bytes(buf[28..32].try_into().unwrap()), 2);
        let nonzero: Vec<usize> = (0..80).filter(|&i| buf[i] != 0).collect();
        // Only key, size and selector are set
        assert!(nonzero.iter().all(|&i| i < 4 || (28..32).contains(&i) || i == 42));
    }

    #[test]
    fn test_decode_known_key_info_reply() {
        // Reply to a key-info probe of TC0P: 2 bytes of sp78
        let mut reply = [0u8; 80];
        reply[0..4].copy_from_slice(&0x5443_3050u32.to_ne_bytes());
        reply[28..32].copy_from_slice(&2u32.to_ne_bytes());
        reply[32..36].copy_from_slice(&u32::from_be_bytes(*b"sp78").to_ne_bytes());
        reply[36] = 0xd0;
        reply[42] = 9;

        let decoded = SmcReply::decode(&reply);
        assert_eq!(decoded.key.to_string(), "TC0P");
        assert_eq!(decoded.result, 0);
        assert_eq!(decoded.data_size, 2);
        assert_eq!(decoded.data_type.to_string(), "sp78");
        assert_eq!(decoded.attributes, 0xd0);
    }

    #[test]
    fn test_decode_value_reply() {
        let mut reply = [0u8; 80];
        reply[40] = 0;
        reply[48] = 10;
        reply[49] = 128;
        reply[79] = 0xff;

        let decoded = SmcReply::decode(&reply);
        assert_eq!(&decoded.bytes[..2], &[10, 128]);
        assert_eq!(decoded.bytes[31], 0xff);
    }
}
