//! Streaming support for vehicle telemetry
//!
//! The streaming endpoint answers a long-lived GET with a text body of
//! newline-delimited, comma-separated telemetry lines. Each connection is
//! authorized with a single-use token taken from the vehicle's token list.
//!
//! # Example
//!
//! ```no_run
//! use vtel_client::{ClientConfig, Credential, VehicleClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = Credential::new("client-id", "client-secret", "me@example.com", "password");
//! let client = VehicleClient::connect(ClientConfig::default(), credential).await?;
//!
//! let mut vehicles = client.list_vehicles().await?;
//! let mut stream = client.stream(&mut vehicles[0]);
//!
//! // Each connect() consumes one streaming token
//! let mut session = stream.connect().await?;
//! let (events, errors) = session.channels();
//!
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => {
//!             println!("speed={:?} soc={:?}", event.speed, event.soc);
//!         }
//!         Some(err) = errors.recv() => {
//!             eprintln!("{}", err);
//!             if err.is_terminal() {
//!                 break;
//!             }
//!         }
//!         else => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod parser;
mod session;
mod types;

pub use parser::{decode_line, LineParser};
pub use session::{StreamClient, StreamSession};
pub use types::{
    ShiftState, StreamError, StreamEvent, StreamResult, StreamState, FIELD_COUNT, STREAM_COLUMNS,
};
