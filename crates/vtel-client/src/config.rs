//! Client configuration
//!
//! Endpoint addresses and transport limits are passed explicitly into
//! [`VehicleClient`](crate::VehicleClient) construction.

use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Default authorization endpoint
pub const DEFAULT_AUTH_URL: &str = "https://owner-api.teslamotors.com/oauth/token";
/// Default REST API root
pub const DEFAULT_BASE_URL: &str = "https://owner-api.teslamotors.com/api/1";
/// Default streaming endpoint root
pub const DEFAULT_STREAMING_URL: &str = "https://streaming.vn.teslamotors.com/stream/";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default capacity of each stream delivery channel
const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Configuration for [`VehicleClient`](crate::VehicleClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Password-grant endpoint
    pub auth_url: Url,
    /// REST API root, e.g. `https://host/api/1`
    pub base_url: Url,
    /// Streaming endpoint root; the vehicle id is appended as a path segment
    pub streaming_url: Url,
    /// Total timeout for request/response calls
    pub timeout: Duration,
    /// TCP/TLS connect timeout, also applied to streaming connections
    pub connect_timeout: Duration,
    /// Maximum silence on an open stream before it is reported as timed out
    pub stream_idle_timeout: Option<Duration>,
    /// Capacity of the event and error channels of a stream session
    pub stream_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_url: Url::parse(DEFAULT_AUTH_URL).expect("valid default auth URL"),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default base URL"),
            streaming_url: Url::parse(DEFAULT_STREAMING_URL).expect("valid default streaming URL"),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream_idle_timeout: None,
            stream_channel_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from explicit endpoint addresses
    pub fn new(auth_url: &str, base_url: &str, streaming_url: &str) -> Result<Self> {
        Ok(Self {
            auth_url: Url::parse(auth_url)?,
            base_url: Url::parse(base_url)?,
            streaming_url: Url::parse(streaming_url)?,
            ..Self::default()
        })
    }

    /// Configuration for a single server hosting every endpoint
    ///
    /// Uses `/oauth/token`, `/api/1` and `/stream/` under `server`.
    pub fn for_server(server: &str) -> Result<Self> {
        let root = Url::parse(server)?;
        Ok(Self {
            auth_url: root.join("/oauth/token")?,
            base_url: root.join("/api/1")?,
            streaming_url: root.join("/stream/")?,
            ..Self::default()
        })
    }

    /// Set request and connect timeouts
    pub fn with_timeouts(mut self, timeout: Duration, connect_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = connect_timeout;
        self
    }

    /// Report an open stream as timed out after `idle` without data
    pub fn with_stream_idle_timeout(mut self, idle: Duration) -> Self {
        self.stream_idle_timeout = Some(idle);
        self
    }

    /// Set the capacity of each stream delivery channel (minimum 1)
    pub fn with_stream_channel_capacity(mut self, capacity: usize) -> Self {
        self.stream_channel_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.auth_url.as_str(), DEFAULT_AUTH_URL);
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.streaming_url.as_str(), DEFAULT_STREAMING_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.stream_idle_timeout.is_none());
    }

    #[test]
    fn test_for_server() {
        let config = ClientConfig::for_server("http://127.0.0.1:8080").unwrap();
        assert_eq!(config.auth_url.as_str(), "http://127.0.0.1:8080/oauth/token");
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/api/1");
        assert_eq!(config.streaming_url.as_str(), "http://127.0.0.1:8080/stream/");
    }

    #[test]
    fn test_invalid_url() {
        assert!(ClientConfig::for_server("not a url").is_err());
        assert!(ClientConfig::new("http://a/token", "nope", "http://a/stream/").is_err());
    }

    #[test]
    fn test_channel_capacity_floor() {
        let config = ClientConfig::default().with_stream_channel_capacity(0);
        assert_eq!(config.stream_channel_capacity, 1);
    }
}
