//! Vehicle Telemetry Client Library
//!
//! Provides a typed HTTP client for an owner-style vehicle REST API and its
//! line-oriented telemetry stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use vtel_client::{ClientConfig, Credential, VehicleClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credential = Credential::new("client-id", "client-secret", "me@example.com", "password");
//!     let client = VehicleClient::connect(ClientConfig::default(), credential).await?;
//!
//!     // List vehicles on the account
//!     let vehicles = client.list_vehicles().await?;
//!
//!     // Read one state resource
//!     let charge = client.charge_state(vehicles[0].id).await?;
//!     println!("battery: {:?}%", charge.battery_level);
//!
//!     // Or the full snapshot
//!     let snapshot = client.fetch_all(vehicles[0].id).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Reusing a token
//!
//! A token persisted from an earlier session can be reused as long as more
//! than an hour of its lifetime remains:
//!
//! ```rust,ignore
//! let client = VehicleClient::with_token(ClientConfig::default(), token)?;
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router on a local port:
//!
//! ```rust,ignore
//! use vtel_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let client = server.connect(credential).await?;
//! ```

pub mod auth;
mod client;
pub mod config;
mod error;
pub mod streaming;
pub mod testing;
mod types;

pub use auth::{AuthClient, Credential, TokenStore};
pub use client::VehicleClient;
pub use config::ClientConfig;
pub use error::{Result, VtelError};
pub use types::*;

// Re-export streaming types for convenience
pub use streaming::{StreamClient, StreamError, StreamEvent, StreamSession, StreamState};
