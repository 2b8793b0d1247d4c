//! Error handling for management controller operations.

use hostpulse_core::SensorError;
use thiserror::Error;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, SmcError>;

/// Failures talking to the System Management Controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmcError {
    /// The controller service could not be found or opened
    #[error("Management controller unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// The key-info probe failed or reported a zero-sized key
    #[error("Controller key not found: {key}")]
    KeyNotFound { key: String },

    /// The value bytes could not be interpreted as the expected metric
    #[error("Failed to decode {key} as {data_type} ({size} bytes): {reason}")]
    DecodeFailed {
        key: String,
        data_type: String,
        size: u32,
        reason: String,
    },

    /// The value call failed at the transport level
    #[error("Controller call failed for {key}: {reason}")]
    Call { key: String, reason: String },

    /// The controller answered with a non-zero result code
    #[error("Malformed controller reply for {key}: result code {result}")]
    MalformedReply { key: String, result: u8 },

    /// A configured key is not four ASCII characters
    #[error("Invalid controller key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

impl SmcError {
    /// Create a service unavailable error
    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a key not found error
    pub fn key_not_found(key: impl ToString) -> Self {
        Self::KeyNotFound {
            key: key.to_string(),
        }
    }

    /// Create a decode error
    pub fn decode_failed(
        key: impl ToString,
        data_type: impl ToString,
        size: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::DecodeFailed {
            key: key.to_string(),
            data_type: data_type.to_string(),
            size,
            reason: reason.into(),
        }
    }

    /// Create a call error
    pub fn call(key: impl ToString, reason: impl ToString) -> Self {
        Self::Call {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a malformed reply error
    pub fn malformed_reply(key: impl ToString, result: u8) -> Self {
        Self::MalformedReply {
            key: key.to_string(),
            result,
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SmcError::ServiceUnavailable { .. } => "service",
            SmcError::KeyNotFound { .. } => "key",
            SmcError::DecodeFailed { .. } => "decode",
            SmcError::Call { .. } => "call",
            SmcError::MalformedReply { .. } => "reply",
            SmcError::InvalidKey { .. } => "config",
        }
    }
}

impl From<SmcError> for SensorError {
    fn from(err: SmcError) -> Self {
        match err {
            SmcError::ServiceUnavailable { reason } => SensorError::unavailable(reason),
            SmcError::InvalidKey { .. } => SensorError::config_with_value(err.to_string(), "temperature_keys"),
            other => SensorError::invalid_data(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SmcError::decode_failed("TC0P", "ui8 ", 1, "unsupported type");
        assert_eq!(
            err.to_string(),
            "Failed to decode TC0P as ui8  (1 bytes): unsupported type"
        );
        assert_eq!(err.category(), "decode");
    }

    #[test]
    fn test_categories() {
        assert_eq!(SmcError::key_not_found("TC0P").category(), "key");
        assert_eq!(SmcError::malformed_reply("F0Ac", 132).category(), "reply");
        assert_eq!(SmcError::service_unavailable("AppleSMC not found").category(), "service");
        assert_eq!(SmcError::invalid_key("TC", "too short").category(), "config");
    }

    #[test]
    fn test_conversion_to_sensor_error() {
        let err: SensorError = SmcError::service_unavailable("no service").into();
        assert!(matches!(err, SensorError::Unavailable { .. }));

        let err: SensorError = SmcError::invalid_key("TC", "too short").into();
        assert!(matches!(err, SensorError::Config { .. }));

        let err: SensorError = SmcError::key_not_found("TC0P").into();
        assert!(matches!(err, SensorError::InvalidData { .. }));
    }
}
