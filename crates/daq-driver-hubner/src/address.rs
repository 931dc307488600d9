//! Device address normalization.
//!
//! The device serves its command endpoint at `/api/cmd`. Users usually type
//! only the host (`192.168.1.20`) or `host:port`; [`normalize_address`] turns
//! any accepted form into the full WebSocket URL:
//!
//! - Bare host or `host:port` gets the `ws://` scheme
//! - `ws://` and `wss://` are accepted as given
//! - The path is forced to `/api/cmd`
//!
//! ```
//! use daq_driver_hubner::address::DeviceAddress;
//!
//! let addr = DeviceAddress::parse("192.168.1.20")?;
//! assert_eq!(addr.as_str(), "ws://192.168.1.20/api/cmd");
//! # Ok::<(), daq_driver_hubner::address::AddressError>(())
//! ```

use std::fmt;
use thiserror::Error;
use url::Url;

/// Path of the command endpoint.
pub const COMMAND_PATH: &str = "/api/cmd";

/// Address validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Input was empty or whitespace-only
    #[error("Address cannot be empty")]
    EmptyInput,
    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// No host was found in the URL
    #[error("URL must include a host")]
    MissingHost,
    /// Only `ws` and `wss` are served by the device
    #[error("Unsupported scheme '{0}' (use ws or wss)")]
    UnsupportedScheme(String),
    /// The input names an endpoint other than the command endpoint
    #[error("Unexpected path '{0}' (the device only serves {COMMAND_PATH})")]
    UnexpectedPath(String),
}

/// Normalized command endpoint of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    url: Url,
    original: String,
}

impl DeviceAddress {
    /// Parse and normalize a user supplied address.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        Ok(Self {
            url: normalize_address(input)?,
            original: input.trim().to_string(),
        })
    }

    /// The normalized URL string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The normalized URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Input before normalization.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Normalize a device address into its command endpoint URL.
pub fn normalize_address(input: &str) -> Result<Url, AddressError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(AddressError::EmptyInput);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("ws://{input}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| AddressError::InvalidUrl(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "ws" && scheme != "wss" {
        return Err(AddressError::UnsupportedScheme(scheme));
    }

    if url.host().is_none() {
        return Err(AddressError::MissingHost);
    }

    let path = url.path().trim_end_matches('/');
    if !path.is_empty() && path != COMMAND_PATH {
        return Err(AddressError::UnexpectedPath(url.path().to_string()));
    }
    url.set_path(COMMAND_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_host() {
        let url = normalize_address("192.168.1.20").unwrap();
        assert_eq!(url.as_str(), "ws://192.168.1.20/api/cmd");
    }

    #[test]
    fn test_normalize_host_port() {
        let url = normalize_address("gtr.lab.local:8080").unwrap();
        assert_eq!(url.as_str(), "ws://gtr.lab.local:8080/api/cmd");
    }

    #[test]
    fn test_normalize_keeps_full_url() {
        let url = normalize_address("ws://10.0.0.5:9000/api/cmd").unwrap();
        assert_eq!(url.as_str(), "ws://10.0.0.5:9000/api/cmd");

        let url = normalize_address("wss://gtr.example.com/").unwrap();
        assert_eq!(url.as_str(), "wss://gtr.example.com/api/cmd");
    }

    #[test]
    fn test_normalize_ipv6() {
        let url = normalize_address("[::1]:8080").unwrap();
        assert_eq!(url.as_str(), "ws://[::1]:8080/api/cmd");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        let url = normalize_address("  localhost  ").unwrap();
        assert_eq!(url.as_str(), "ws://localhost/api/cmd");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_address("").unwrap_err(), AddressError::EmptyInput);
        assert_eq!(normalize_address("   ").unwrap_err(), AddressError::EmptyInput);
    }

    #[test]
    fn test_normalize_unsupported_scheme() {
        let err = normalize_address("http://192.168.1.20").unwrap_err();
        assert_eq!(err, AddressError::UnsupportedScheme("http".into()));
    }

    #[test]
    fn test_normalize_rejects_other_endpoint() {
        let err = normalize_address("ws://192.168.1.20/api/log").unwrap_err();
        assert!(matches!(err, AddressError::UnexpectedPath(_)));
    }

    #[test]
    fn test_device_address_parse() {
        let addr = DeviceAddress::parse(" 10.1.2.3:81 ").unwrap();
        assert_eq!(addr.as_str(), "ws://10.1.2.3:81/api/cmd");
        assert_eq!(addr.original(), "10.1.2.3:81");
        assert_eq!(addr.to_string(), addr.as_str());
        assert_eq!(addr.url().host_str(), Some("10.1.2.3"));
    }
}
