//! Vehicle API client implementation

use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{AuthClient, Credential, TokenStore};
use crate::config::ClientConfig;
use crate::error::{Result, VtelError};
use crate::streaming::StreamClient;
use crate::types::*;

/// Append path segments to an endpoint root
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| VtelError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Vehicle API client
///
/// Holds the account credential and the current access token. Every REST call
/// is authorized with the token; streaming sessions are created through
/// [`stream`](Self::stream) and authorized with per-vehicle tokens instead.
#[derive(Debug, Clone)]
pub struct VehicleClient {
    client: Client,
    stream_client: Client,
    config: ClientConfig,
    auth: AuthClient,
    credential: Option<Credential>,
    token: Arc<TokenStore>,
}

impl VehicleClient {
    /// Authorize with `credential` and create a client
    pub async fn connect(config: ClientConfig, credential: Credential) -> Result<Self> {
        let (client, stream_client) = build_http_clients(&config)?;
        let auth = AuthClient::new(client.clone(), config.auth_url.clone());
        let token = auth.authorize(&credential).await?;

        Ok(Self {
            client,
            stream_client,
            config,
            auth,
            credential: Some(credential),
            token: Arc::new(token),
        })
    }

    /// Create a client from an already-issued token
    ///
    /// Fails when the token is expired or within an hour of expiry.
    /// The client cannot [`reauthorize`](Self::reauthorize).
    pub fn with_token(config: ClientConfig, token: TokenStore) -> Result<Self> {
        Self::from_token(config, token, None)
    }

    /// Create a client from an already-issued token, keeping `credential`
    /// for later re-authorization
    pub fn with_token_and_credential(
        config: ClientConfig,
        token: TokenStore,
        credential: Credential,
    ) -> Result<Self> {
        Self::from_token(config, token, Some(credential))
    }

    fn from_token(
        config: ClientConfig,
        token: TokenStore,
        credential: Option<Credential>,
    ) -> Result<Self> {
        if token.is_near_expiry() {
            return Err(VtelError::TokenExpired {
                expires_at: token.expires_at(),
            });
        }

        let (client, stream_client) = build_http_clients(&config)?;
        let auth = AuthClient::new(client.clone(), config.auth_url.clone());

        Ok(Self {
            client,
            stream_client,
            config,
            auth,
            credential,
            token: Arc::new(token),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current access token
    pub fn token(&self) -> Arc<TokenStore> {
        self.token.clone()
    }

    /// True when less than an hour of token lifetime remains
    pub fn token_near_expiry(&self) -> bool {
        self.token.is_near_expiry()
    }

    /// Run a fresh password grant and replace the current token
    ///
    /// Holders of the previous [`token`](Self::token) keep their copy.
    #[instrument(skip(self))]
    pub async fn reauthorize(&mut self) -> Result<Arc<TokenStore>> {
        let credential = self.credential.as_ref().ok_or(VtelError::MissingCredential)?;
        let token = self.auth.authorize(credential).await?;
        self.token = Arc::new(token);
        Ok(self.token.clone())
    }

    // =========================================================================
    // Vehicles
    // =========================================================================

    /// List the account's vehicles
    #[instrument(skip(self))]
    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let url = endpoint(&self.config.base_url, &["vehicles"])?;
        let list: VehicleList = self.get_json(url, "vehicles").await?;
        Ok(list.response)
    }

    /// Whether the vehicle accepts remote API control
    #[instrument(skip(self))]
    pub async fn mobile_enabled(&self, vehicle_id: u64) -> Result<bool> {
        let id = vehicle_id.to_string();
        let url = endpoint(&self.config.base_url, &["vehicles", &id, "mobile_enabled"])?;
        self.get_envelope(url, "mobile_enabled").await
    }

    /// Chargers near the vehicle
    #[instrument(skip(self))]
    pub async fn nearby_charging_sites(&self, vehicle_id: u64) -> Result<NearbyChargingSites> {
        let id = vehicle_id.to_string();
        let url = endpoint(
            &self.config.base_url,
            &["vehicles", &id, "nearby_charging_sites"],
        )?;
        self.get_envelope(url, "nearby_charging_sites").await
    }

    // =========================================================================
    // State Resources
    // =========================================================================

    /// Fetch one named state resource
    #[instrument(skip(self))]
    pub async fn fetch_resource(&self, resource: Resource, vehicle_id: u64) -> Result<SubState> {
        Ok(match resource {
            Resource::Charge => SubState::Charge(self.fetch_state(resource, vehicle_id).await?),
            Resource::Climate => SubState::Climate(self.fetch_state(resource, vehicle_id).await?),
            Resource::Drive => SubState::Drive(self.fetch_state(resource, vehicle_id).await?),
            Resource::GuiSettings => {
                SubState::GuiSettings(self.fetch_state(resource, vehicle_id).await?)
            }
            Resource::Vehicle => SubState::Vehicle(self.fetch_state(resource, vehicle_id).await?),
            Resource::Service => SubState::Service(self.fetch_state(resource, vehicle_id).await?),
        })
    }

    /// Fetch climate, drive, GUI settings, vehicle and charge state, in that order
    ///
    /// Stops at the first failing resource; later resources are not requested
    /// and the partial snapshot is discarded.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, vehicle_id: u64) -> Result<StateSnapshot> {
        debug!("Retrieving vehicle data");
        let mut snapshot = StateSnapshot::default();

        for resource in Resource::SNAPSHOT_ORDER {
            match self.fetch_resource(resource, vehicle_id).await {
                Ok(state) => snapshot.insert(state),
                Err(e) => {
                    warn!("Error getting {}: {}", resource, e);
                    return Err(e);
                }
            }
        }

        Ok(snapshot)
    }

    pub async fn charge_state(&self, vehicle_id: u64) -> Result<ChargeState> {
        self.fetch_state(Resource::Charge, vehicle_id).await
    }

    pub async fn climate_state(&self, vehicle_id: u64) -> Result<ClimateState> {
        self.fetch_state(Resource::Climate, vehicle_id).await
    }

    pub async fn drive_state(&self, vehicle_id: u64) -> Result<DriveState> {
        self.fetch_state(Resource::Drive, vehicle_id).await
    }

    pub async fn gui_settings(&self, vehicle_id: u64) -> Result<GuiSettings> {
        self.fetch_state(Resource::GuiSettings, vehicle_id).await
    }

    pub async fn vehicle_state(&self, vehicle_id: u64) -> Result<VehicleState> {
        self.fetch_state(Resource::Vehicle, vehicle_id).await
    }

    pub async fn service_data(&self, vehicle_id: u64) -> Result<ServiceData> {
        self.fetch_state(Resource::Service, vehicle_id).await
    }

    /// URL of a state resource
    pub fn state_url(&self, resource: Resource, vehicle_id: u64) -> Result<Url> {
        let id = vehicle_id.to_string();
        endpoint(
            &self.config.base_url,
            &["vehicles", &id, "data_request", resource.as_str()],
        )
    }

    async fn fetch_state<T: DeserializeOwned>(&self, resource: Resource, vehicle_id: u64) -> Result<T> {
        let url = self.state_url(resource, vehicle_id)?;
        self.get_envelope(url, resource.as_str()).await
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Streaming client that takes over the vehicle's streaming tokens
    ///
    /// The tokens are moved out of `vehicle`; calling this again on the same
    /// vehicle yields a client with no tokens.
    pub fn stream(&self, vehicle: &mut Vehicle) -> StreamClient {
        self.stream_handle(vehicle.stream_handle())
    }

    /// Streaming client for an explicit handle
    pub fn stream_handle(&self, handle: VehicleHandle) -> StreamClient {
        StreamClient::new(
            self.stream_client.clone(),
            self.config.streaming_url.clone(),
            handle,
            self.config.stream_channel_capacity,
        )
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// GET an envelope and unwrap its `response`, checking the embedded error
    async fn get_envelope<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        let envelope: Envelope<T> = self.get_json(url, context).await?;
        if let Some(err) = envelope.error.into_error(context) {
            return Err(err);
        }
        envelope
            .response
            .ok_or_else(|| VtelError::decode(context, "missing response"))
    }

    /// Authenticated GET returning decoded JSON
    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        if self.token.is_near_expiry() {
            warn!(
                expires_at = %self.token.expires_at(),
                "Access token is near expiry"
            );
        }
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.access_token())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| VtelError::from_reqwest(context, e))?;

        self.handle_response(response, context).await
    }

    /// Handle response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| VtelError::from_reqwest(context, e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message())
                .unwrap_or_else(|| status.to_string());
            return Err(VtelError::status(context, status.as_u16(), message));
        }

        serde_json::from_slice(&body).map_err(|e| VtelError::decode(context, e))
    }
}

/// Request/response client and streaming client
///
/// The streaming client has no total timeout, only connect and idle limits.
fn build_http_clients(config: &ClientConfig) -> Result<(Client, Client)> {
    let client = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()?;

    let mut stream_builder = Client::builder().connect_timeout(config.connect_timeout);
    if let Some(idle) = config.stream_idle_timeout {
        stream_builder = stream_builder.read_timeout(idle);
    }
    let stream_client = stream_builder.build()?;

    Ok((client, stream_client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn fresh_token() -> TokenStore {
        TokenStore::issued("abc123", "bearer", 3_888_000, Utc::now())
    }

    fn client() -> VehicleClient {
        let config = ClientConfig::for_server("http://localhost:9080").unwrap();
        VehicleClient::with_token(config, fresh_token()).unwrap()
    }

    #[test]
    fn test_client_from_token() {
        let client = client();
        assert!(!client.token_near_expiry());
        assert_eq!(client.token().access_token(), "abc123");
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = ClientConfig::default();
        let stale = TokenStore::issued("abc", "bearer", 3_600, Utc::now() - Duration::hours(2));
        let err = VehicleClient::with_token(config, stale).unwrap_err();
        assert!(matches!(err, VtelError::TokenExpired { .. }));
    }

    #[test]
    fn test_near_expiry_token_rejected() {
        let config = ClientConfig::default();
        let short = TokenStore::issued("abc", "bearer", 1_800, Utc::now());
        assert!(VehicleClient::with_token(config, short).is_err());
    }

    #[test]
    fn test_state_url() {
        let url = client().state_url(Resource::GuiSettings, 42).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9080/api/1/vehicles/42/data_request/gui_settings"
        );
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let base = Url::parse("http://localhost:9080/api/1/").unwrap();
        let url = endpoint(&base, &["vehicles"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9080/api/1/vehicles");
    }

    #[test]
    fn test_stream_url() {
        let handle = VehicleHandle::new(123, vec!["456".to_string()]);
        let stream = client().stream_handle(handle);
        let url = stream.stream_url().unwrap();
        assert_eq!(url.path(), "/stream/123/");
        assert_eq!(
            url.query_pairs().next().map(|(k, v)| (k.into_owned(), v.into_owned())),
            Some((
                "values".to_string(),
                "speed,odometer,soc,elevation,est_heading,est_lat,est_lng,power,shift_state,range,est_range,heading"
                    .to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_reauthorize_without_credential() {
        let mut client = client();
        assert!(matches!(
            client.reauthorize().await,
            Err(VtelError::MissingCredential)
        ));
    }
}
