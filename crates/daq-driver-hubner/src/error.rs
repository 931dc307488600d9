//! Error types for the C-WAVE GTR driver.
//!
//! All fallible operations in this crate return [`GtrError`]. Using the
//! `thiserror` crate, it keeps the error taxonomy of the driver in one place:
//!
//! - **Transport errors** - `ConnectionFailed`, `NotConnected`, `Transport`,
//!   `RequestTimeout`. Surfaced immediately, never retried by the driver.
//! - **Device errors** - `RequestFailed` carries the text reported by the
//!   firmware for a well-formed request; `UnexpectedPayload` means the reply
//!   was accepted but its payload does not have the expected shape.
//! - **Telemetry errors** - `BufferUnderrun`, `UnknownEnumCode`,
//!   `MalformedTelemetry`. Any of these aborts the status decode as a whole.
//! - **Caller errors** - `InvalidArgument`, `InvalidAddress`. Raised before
//!   any network traffic.

use crate::address::AddressError;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type Result<T> = std::result::Result<T, GtrError>;

/// Primary error type of the GTR driver.
#[derive(Error, Debug)]
pub enum GtrError {
    /// The transport to the device could not be established.
    #[error("Failed to connect to '{address}': {reason}")]
    ConnectionFailed {
        /// Normalized device URL
        address: String,
        /// Underlying cause as reported by the transport
        reason: String,
    },

    /// An operation needed a live connection and there is none.
    #[error("Not connected to device")]
    NotConnected,

    /// The device answered with an application-level error.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The device did not answer within the configured bound.
    #[error("Request '{command}' timed out after {timeout:?}")]
    RequestTimeout {
        /// Command name of the timed-out request
        command: String,
        /// Bound that elapsed
        timeout: Duration,
    },

    /// A telemetry field needs more bytes than remain in the block.
    #[error("Buffer underrun at offset {position}: requested {requested} bytes, {available} available")]
    BufferUnderrun {
        /// Cursor position when the read was attempted
        position: usize,
        /// Width of the rejected read
        requested: usize,
        /// Bytes left after the cursor
        available: usize,
    },

    /// A wire code does not map to any variant of its enumeration.
    #[error("Unknown code {code} for enumeration {enumeration}")]
    UnknownEnumCode {
        /// Name of the enumeration being decoded
        enumeration: &'static str,
        /// Raw code read from the stream
        code: i64,
    },

    /// The status payload is not a decodable telemetry block.
    #[error("Malformed telemetry: {0}")]
    MalformedTelemetry(String),

    /// A caller-supplied value violates a documented constraint.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device address could not be normalized into a command URL.
    #[error("Invalid device address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// A successful reply carried a payload of the wrong shape.
    #[error("Unexpected payload for '{command}': {reason}")]
    UnexpectedPayload {
        /// Command name of the request
        command: String,
        /// Deserialization failure
        reason: String,
    },

    /// I/O failure on an established link.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The bridge worker thread is no longer running.
    #[error("Driver worker has stopped")]
    BridgeStopped,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl GtrError {
    /// Returns `true` for errors raised while decoding a telemetry block.
    #[must_use]
    pub fn is_telemetry(&self) -> bool {
        matches!(
            self,
            Self::BufferUnderrun { .. } | Self::UnknownEnumCode { .. } | Self::MalformedTelemetry(_)
        )
    }

    /// Returns `true` for errors that indicate the link is unusable.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionFailed { .. } | Self::BridgeStopped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_carries_device_text() {
        let err = GtrError::RequestFailed("out of range".into());
        assert_eq!(err.to_string(), "Request failed: out of range");
    }

    #[test]
    fn classifies_telemetry_errors() {
        let underrun = GtrError::BufferUnderrun {
            position: 920,
            requested: 8,
            available: 5,
        };
        assert!(underrun.is_telemetry());
        assert!(underrun.to_string().contains("offset 920"));

        let code = GtrError::UnknownEnumCode {
            enumeration: "ShutterState",
            code: 7,
        };
        assert!(code.is_telemetry());
        assert!(code.to_string().contains("ShutterState"));

        assert!(!GtrError::NotConnected.is_telemetry());
    }

    #[test]
    fn classifies_connection_errors() {
        assert!(GtrError::NotConnected.is_connection_lost());
        assert!(GtrError::BridgeStopped.is_connection_lost());
        assert!(!GtrError::InvalidArgument("x".into()).is_connection_lost());
    }
}
