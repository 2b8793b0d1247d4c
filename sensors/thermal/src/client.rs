//! Two-phase key query against an open controller connection.

use crate::error::{Result, SmcError};
use crate::protocol::{DataType, SmcKey, SmcReply, SmcRequest, MAX_VALUE_BYTES};
use hostpulse_core::ControllerConnection;
use tracing::trace;

/// Raw value of one controller key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcReading {
    pub key: SmcKey,
    pub data_type: DataType,
    /// Declared size, clamped to the value buffer capacity.
    pub data_size: u32,
    pub bytes: [u8; MAX_VALUE_BYTES],
}

impl SmcReading {
    /// The meaningful prefix of the value buffer.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.data_size as usize]
    }
}

/// Read one key: probe its size and type, then fetch exactly that many bytes.
///
/// # Errors
///
/// * [`SmcError::KeyNotFound`] if the probe fails, returns a non-zero result
///   or reports a zero size
/// * [`SmcError::Call`] if the value call fails
/// * [`SmcError::MalformedReply`] if the value reply carries a non-zero result
pub fn query_key(conn: &mut dyn ControllerConnection, key: SmcKey) -> Result<SmcReading> {
    let info = conn
        .call(&SmcRequest::key_info(key).encode())
        .map(|reply| SmcReply::decode(&reply))
        .map_err(|e| {
            trace!(%key, error = %e, "key info probe failed");
            SmcError::key_not_found(key)
        })?;

    if info.result != 0 || info.data_size == 0 {
        trace!(%key, result = info.result, size = info.data_size, "key not present");
        return Err(SmcError::key_not_found(key));
    }

    let data_size = info.data_size.min(MAX_VALUE_BYTES as u32);
    let value = conn
        .call(&SmcRequest::read_bytes(key, data_size).encode())
        .map(|reply| SmcReply::decode(&reply))
        .map_err(|e| SmcError::call(key, e))?;

    if value.result != 0 {
        return Err(SmcError::malformed_reply(key, value.result));
    }

    trace!(%key, data_type = %info.data_type, size = data_size, "read key");
    Ok(SmcReading {
        key,
        data_type: info.data_type,
        data_size,
        bytes: value.bytes,
    })
}
