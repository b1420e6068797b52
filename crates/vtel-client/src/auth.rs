//! Password-grant authorization and access token lifetime tracking

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, VtelError};
use crate::types::ApiErrorBody;

/// Grant type sent on every authorization request
pub const PASSWORD_GRANT: &str = "password";

/// Remaining lifetime (seconds) below which a token is considered near expiry
pub const NEAR_EXPIRY_SECS: i64 = 3_600;

const AUTH_CONTEXT: &str = "oauth/token";

/// Account credentials for the password grant
#[derive(Clone)]
pub struct Credential {
    grant_type: String,
    client_id: String,
    client_secret: String,
    email: String,
    password: String,
}

impl Credential {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: PASSWORD_GRANT.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Record a caller-chosen grant type.
    ///
    /// The authorization request always uses [`PASSWORD_GRANT`] regardless.
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = grant_type.into();
        self
    }

    pub fn grant_type(&self) -> &str {
        &self.grant_type
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Check that every field needed by the grant is present
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(VtelError::InvalidCredential("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(VtelError::InvalidCredential("client_secret"));
        }
        if self.email.is_empty() {
            return Err(VtelError::InvalidCredential("email"));
        }
        if self.password.is_empty() {
            return Err(VtelError::InvalidCredential("password"));
        }
        Ok(())
    }

    fn grant_request(&self) -> GrantRequest<'_> {
        GrantRequest {
            grant_type: PASSWORD_GRANT,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            email: &self.email,
            password: &self.password,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct GrantRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct GrantResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(flatten)]
    error: ApiErrorBody,
}

/// An issued access token and its derived expiry
///
/// The expiry instant is always computed from the issuance instant and the
/// lifetime; it cannot be set directly.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenStore {
    access_token: String,
    token_type: String,
    expires_in: u64,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TokenStore {
    /// Token issued at `issued_at` and valid for `expires_in` seconds
    pub fn issued(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            issued_at,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime in seconds as returned by the server
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Remaining lifetime at `now` (negative once expired)
    pub fn remaining_at(&self, now: DateTime<Utc>) -> ChronoDuration {
        self.expires_at - now
    }

    /// True when less than an hour of lifetime remains at `now`
    pub fn is_near_expiry_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_at(now) <= ChronoDuration::seconds(NEAR_EXPIRY_SECS)
    }

    /// True when less than an hour of lifetime remains
    pub fn is_near_expiry(&self) -> bool {
        self.is_near_expiry_at(Utc::now())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Performs the password-grant exchange
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    auth_url: Url,
}

impl AuthClient {
    pub fn new(http: Client, auth_url: Url) -> Self {
        Self { http, auth_url }
    }

    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Exchange `credential` for an access token
    ///
    /// The expiry is measured from the moment the request is started, so
    /// round-trip latency shortens the tracked lifetime rather than extending it.
    #[instrument(skip(self, credential), fields(client_id = credential.client_id()))]
    pub async fn authorize(&self, credential: &Credential) -> Result<TokenStore> {
        credential.validate()?;

        let started = Utc::now();
        debug!("Requesting password grant from {}", self.auth_url);

        let response = self
            .http
            .post(self.auth_url.clone())
            .header(ACCEPT, "application/json")
            .json(&credential.grant_request())
            .send()
            .await
            .map_err(|e| VtelError::from_reqwest(AUTH_CONTEXT, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| VtelError::from_reqwest(AUTH_CONTEXT, e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message())
                .unwrap_or_else(|| status.to_string());
            return Err(VtelError::status(AUTH_CONTEXT, status.as_u16(), message));
        }

        let grant: GrantResponse =
            serde_json::from_slice(&body).map_err(|e| VtelError::decode(AUTH_CONTEXT, e))?;

        if let Some(err) = grant.error.into_error(AUTH_CONTEXT) {
            return Err(err);
        }

        let access_token = grant
            .access_token
            .ok_or_else(|| VtelError::decode(AUTH_CONTEXT, "missing access_token"))?;
        let expires_in = grant
            .expires_in
            .ok_or_else(|| VtelError::decode(AUTH_CONTEXT, "missing expires_in"))?;
        let token_type = grant.token_type.unwrap_or_else(|| "bearer".to_string());

        let token = TokenStore::issued(access_token, token_type, expires_in, started);
        debug!("Token issued, expires at {}", token.expires_at());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_460_000_000, 0).unwrap()
    }

    #[test]
    fn test_expiry_is_derived() {
        let token = TokenStore::issued("abc", "bearer", 3_888_000, issued_at());
        assert_eq!(
            token.expires_at(),
            issued_at() + ChronoDuration::seconds(3_888_000)
        );
        assert_eq!(token.expires_in(), 3_888_000);
    }

    #[test]
    fn test_near_expiry_boundary() {
        let lifetime = 7_200;
        let token = TokenStore::issued("abc", "bearer", lifetime, issued_at());
        let boundary = issued_at() + ChronoDuration::seconds(lifetime as i64) - ChronoDuration::hours(1);

        assert!(!token.is_near_expiry_at(boundary - ChronoDuration::seconds(1)));
        assert!(token.is_near_expiry_at(boundary));
        assert!(token.is_near_expiry_at(boundary + ChronoDuration::seconds(1)));
    }

    #[test]
    fn test_short_lived_token_is_near_expiry_immediately() {
        let token = TokenStore::issued("abc", "bearer", 1_800, issued_at());
        assert!(token.is_near_expiry_at(issued_at()));
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let token = TokenStore::issued("abc", "bearer", u64::MAX, issued_at());
        assert!(!token.is_near_expiry_at(issued_at()));
    }

    #[test]
    fn test_credential_validation() {
        assert!(Credential::new("id", "secret", "me@example.com", "pw")
            .validate()
            .is_ok());

        let err = Credential::new("", "secret", "me@example.com", "pw")
            .validate()
            .unwrap_err();
        assert!(matches!(err, VtelError::InvalidCredential("client_id")));

        let err = Credential::new("id", "secret", "me@example.com", "")
            .validate()
            .unwrap_err();
        assert!(matches!(err, VtelError::InvalidCredential("password")));
    }

    #[test]
    fn test_grant_type_is_always_password() {
        let credential =
            Credential::new("id", "secret", "me@example.com", "pw").with_grant_type("refresh_token");
        let body = serde_json::to_value(credential.grant_request()).unwrap();
        assert_eq!(body["grant_type"], "password");
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(credential.grant_type(), "refresh_token");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new("id", "s3cret", "me@example.com", "hunter2");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("hunter2"));

        let token = TokenStore::issued("tok-value", "bearer", 10, issued_at());
        assert!(!format!("{:?}", token).contains("tok-value"));
    }
}
