//! Test utilities for vtel-client
//!
//! Provides helpers for running integration tests against a local stand-in
//! for the vehicle API.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{ClientConfig, Credential, TokenStore, VehicleClient};

/// A test server that automatically shuts down when dropped
///
/// The router must serve the whole API under one origin: `/oauth/token`,
/// `/api/1/...` and `/stream/{vehicle_id}/`.
pub struct TestServer {
    pub addr: SocketAddr,
    pub config: ClientConfig,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral local port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use vtel_client::testing::TestServer;
    ///
    /// let server = TestServer::start(router).await?;
    /// let client = server.client_with_token(token)?;
    /// let vehicles = client.list_vehicles().await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> anyhow::Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Serve `router` with custom client timeouts
    pub async fn start_with_timeout<S>(
        router: axum::Router<S>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = ClientConfig::for_server(&format!("http://{}", addr))?
            .with_timeouts(timeout, connect_timeout);

        Ok(Self {
            addr,
            config,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client that authorizes against the test server
    pub async fn connect(&self, credential: Credential) -> crate::Result<VehicleClient> {
        VehicleClient::connect(self.config.clone(), credential).await
    }

    /// Client using a pre-issued token
    pub fn client_with_token(&self, token: TokenStore) -> crate::Result<VehicleClient> {
        VehicleClient::with_token(self.config.clone(), token)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
