//! Types for the telemetry stream

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of comma-separated fields in a telemetry line
pub const FIELD_COUNT: usize = 13;

/// Columns requested from the streaming endpoint, in wire order after the timestamp
pub const STREAM_COLUMNS: [&str; FIELD_COUNT - 1] = [
    "speed",
    "odometer",
    "soc",
    "elevation",
    "est_heading",
    "est_lat",
    "est_lng",
    "power",
    "shift_state",
    "range",
    "est_range",
    "heading",
];

/// Gear selector position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftState {
    #[serde(rename = "P")]
    Park,
    #[serde(rename = "R")]
    Reverse,
    #[serde(rename = "N")]
    Neutral,
    #[serde(rename = "D")]
    Drive,
}

impl ShiftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Park => "P",
            Self::Reverse => "R",
            Self::Neutral => "N",
            Self::Drive => "D",
        }
    }
}

impl FromStr for ShiftState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P" => Ok(Self::Park),
            "R" => Ok(Self::Reverse),
            "N" => Ok(Self::Neutral),
            "D" => Ok(Self::Drive),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ShiftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded telemetry line
///
/// Every field is optional: an empty wire field decodes to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub timestamp: Option<DateTime<Utc>>,
    /// Vehicle speed (mph)
    pub speed: Option<u32>,
    /// Odometer (miles)
    pub odometer: Option<f64>,
    /// State of charge (percent)
    pub soc: Option<u32>,
    /// Elevation (feet)
    pub elevation: Option<i32>,
    pub est_heading: Option<u32>,
    pub est_lat: Option<f64>,
    pub est_lng: Option<f64>,
    /// Power draw (kW, negative while regenerating)
    pub power: Option<i32>,
    pub shift_state: Option<ShiftState>,
    /// Rated range (miles)
    pub range: Option<u32>,
    /// Estimated range (miles)
    pub est_range: Option<u32>,
    /// Compass heading (degrees)
    pub heading: Option<u32>,
}

impl StreamEvent {
    /// Encode the event back into its wire line (no trailing newline)
    pub fn to_line(&self) -> String {
        fn field<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        [
            field(&self.timestamp.map(|t| t.timestamp())),
            field(&self.speed),
            field(&self.odometer),
            field(&self.soc),
            field(&self.elevation),
            field(&self.est_heading),
            field(&self.est_lat),
            field(&self.est_lng),
            field(&self.power),
            field(&self.shift_state),
            field(&self.range),
            field(&self.est_range),
            field(&self.heading),
        ]
        .join(",")
    }
}

/// Lifecycle of a [`StreamClient`](super::StreamClient)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// No connection attempted yet
    Idle,
    /// Token taken, connection being opened
    Connecting,
    /// Reading lines from an open connection
    Streaming,
    /// Connection gone; a new `connect()` uses the next token
    Disconnected,
    /// No tokens left; no connection can be attempted
    Exhausted,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Disconnected => "disconnected",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during streaming
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP/connection error
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// No data within the configured idle timeout
    #[error("stream timed out")]
    Timeout,

    /// Server refused the stream connection
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A line with the wrong number of fields; the session continues
    #[error("bad message from API stream")]
    BadMessage { fields: usize },

    /// The server ended the response body
    #[error("stream closed")]
    Closed,

    /// Every streaming token of the vehicle has been used
    #[error("no streaming tokens left")]
    TokensExhausted,

    /// A session is already streaming on this client
    #[error("a stream session is already active")]
    SessionActive,

    /// Streaming endpoint cannot take a vehicle path segment
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),
}

impl StreamError {
    /// True when the current session can produce nothing further
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::BadMessage { .. })
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err)
        }
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StreamError::BadMessage { fields: 9 }.to_string(),
            "bad message from API stream"
        );
        assert_eq!(StreamError::Closed.to_string(), "stream closed");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!StreamError::BadMessage { fields: 2 }.is_terminal());
        assert!(StreamError::Closed.is_terminal());
        assert!(StreamError::Timeout.is_terminal());
    }

    #[test]
    fn test_shift_state_parse() {
        assert_eq!("D".parse::<ShiftState>(), Ok(ShiftState::Drive));
        assert_eq!("P".parse::<ShiftState>(), Ok(ShiftState::Park));
        assert!("X".parse::<ShiftState>().is_err());
        assert_eq!(ShiftState::Reverse.to_string(), "R");
    }

    #[test]
    fn test_empty_event_encodes_empty_fields() {
        assert_eq!(StreamEvent::default().to_line(), ",".repeat(FIELD_COUNT - 1));
    }
}
