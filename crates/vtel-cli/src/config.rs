//! Configuration file handling for vtel

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vtel_client::{ClientConfig, Credential};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Single host serving every endpoint (overrides the URLs below)
    pub server: Option<String>,
    pub auth_url: Option<String>,
    pub base_url: Option<String>,
    pub streaming_url: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Stream idle timeout in seconds
    pub stream_idle_timeout: Option<u64>,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

/// `[credentials]` table
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct CredentialConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("client_id", &self.client_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl CredentialConfig {
    /// Values from `other` win where present
    fn overlay(&self, other: &CredentialConfig) -> CredentialConfig {
        CredentialConfig {
            client_id: other.client_id.clone().or_else(|| self.client_id.clone()),
            client_secret: other
                .client_secret
                .clone()
                .or_else(|| self.client_secret.clone()),
            email: other.email.clone().or_else(|| self.email.clone()),
            password: other.password.clone().or_else(|| self.password.clone()),
        }
    }

    /// Build the grant credential; every field is required
    pub fn credential(&self) -> Result<Credential> {
        let client_id = self
            .client_id
            .clone()
            .context("Missing client id (set VTEL_CLIENT_ID or credentials.client_id)")?;
        let client_secret = self
            .client_secret
            .clone()
            .context("Missing client secret (set VTEL_CLIENT_SECRET or credentials.client_secret)")?;
        let email = self
            .email
            .clone()
            .context("Missing email (set VTEL_EMAIL or credentials.email)")?;
        let password = self
            .password
            .clone()
            .context("Missing password (set VTEL_PASSWORD or credentials.password)")?;

        Ok(Credential::new(client_id, client_secret, email, password))
    }
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("vtel");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        output: Option<&str>,
        no_color: bool,
        credentials: &CredentialConfig,
    ) -> MergedConfig {
        MergedConfig {
            server: server.map(String::from).or_else(|| self.server.clone()),
            auth_url: self.auth_url.clone(),
            base_url: self.base_url.clone(),
            streaming_url: self.streaming_url.clone(),
            stream_idle_timeout: self.stream_idle_timeout,
            output: output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
            credentials: self.credentials.overlay(credentials),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: Option<String>,
    pub auth_url: Option<String>,
    pub base_url: Option<String>,
    pub streaming_url: Option<String>,
    pub stream_idle_timeout: Option<u64>,
    pub output: String,
    pub no_color: bool,
    pub credentials: CredentialConfig,
}

impl MergedConfig {
    /// Client configuration for the resolved endpoints
    ///
    /// A server sets every endpoint; the individual URLs apply only without one.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.server {
            Some(server) => ClientConfig::for_server(server)
                .with_context(|| format!("Invalid server URL: {}", server))?,
            None => self.endpoint_config()?,
        };

        if let Some(secs) = self.stream_idle_timeout {
            config = config.with_stream_idle_timeout(std::time::Duration::from_secs(secs));
        }

        Ok(config)
    }

    fn endpoint_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.auth_url {
            config.auth_url = url
                .parse()
                .with_context(|| format!("Invalid auth URL: {}", url))?;
        }
        if let Some(url) = &self.base_url {
            config.base_url = url
                .parse()
                .with_context(|| format!("Invalid base URL: {}", url))?;
        }
        if let Some(url) = &self.streaming_url {
            config.streaming_url = url
                .parse()
                .with_context(|| format!("Invalid streaming URL: {}", url))?;
        }
        Ok(config)
    }

    /// Resolved output format
    pub fn output_format(&self) -> Result<OutputFormat> {
        <OutputFormat as clap::ValueEnum>::from_str(&self.output, true)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid output format: {}", self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        base_url = "http://localhost:9000/api/1"
        output = "json"
        stream_idle_timeout = 30

        [credentials]
        client_id = "file-id"
        client_secret = "file-secret"
        email = "file@example.com"
        password = "file-password"
    "#;

    #[test]
    fn test_parse_config_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.output.as_deref(), Some("json"));
        assert_eq!(config.credentials.email.as_deref(), Some("file@example.com"));
        assert!(config.server.is_none());
    }

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let args = CredentialConfig {
            email: Some("env@example.com".to_string()),
            ..CredentialConfig::default()
        };

        let merged = config.merge_with_args(None, Some("csv"), true, &args);
        assert_eq!(merged.output, "csv");
        assert!(merged.no_color);
        assert_eq!(merged.credentials.email.as_deref(), Some("env@example.com"));
        assert_eq!(merged.credentials.client_id.as_deref(), Some("file-id"));

        let credential = merged.credentials.credential().unwrap();
        assert_eq!(credential.email(), "env@example.com");
    }

    #[test]
    fn test_client_config_from_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let merged = config.merge_with_args(None, None, false, &CredentialConfig::default());
        let client_config = merged.client_config().unwrap();

        assert_eq!(
            client_config.base_url.as_str(),
            "http://localhost:9000/api/1"
        );
        assert_eq!(
            client_config.stream_idle_timeout,
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(
            client_config.auth_url.as_str(),
            ClientConfig::default().auth_url.as_str()
        );
    }

    #[test]
    fn test_server_sets_all_endpoints() {
        let merged = Config::default().merge_with_args(
            Some("http://127.0.0.1:8080"),
            None,
            false,
            &CredentialConfig::default(),
        );
        let client_config = merged.client_config().unwrap();
        assert_eq!(
            client_config.streaming_url.as_str(),
            "http://127.0.0.1:8080/stream/"
        );
        assert_eq!(merged.output, "table");
    }

    #[test]
    fn test_server_overrides_file_urls() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let merged = config.merge_with_args(
            Some("http://cli-host:8080"),
            None,
            false,
            &CredentialConfig::default(),
        );
        let client_config = merged.client_config().unwrap();

        assert_eq!(client_config.base_url.as_str(), "http://cli-host:8080/api/1");
        assert_eq!(
            client_config.auth_url.as_str(),
            "http://cli-host:8080/oauth/token"
        );
        assert_eq!(
            client_config.stream_idle_timeout,
            Some(std::time::Duration::from_secs(30))
        );
    }

    #[test]
    fn test_output_format_from_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let merged = config.merge_with_args(None, None, false, &CredentialConfig::default());
        assert_eq!(merged.output_format().unwrap(), OutputFormat::Json);

        let merged = config.merge_with_args(None, Some("csv"), false, &CredentialConfig::default());
        assert_eq!(merged.output_format().unwrap(), OutputFormat::Csv);
    }

    #[test]
    fn test_invalid_output_format() {
        let merged = Config {
            output: Some("yaml".to_string()),
            ..Config::default()
        }
        .merge_with_args(None, None, false, &CredentialConfig::default());
        assert!(merged.output_format().is_err());
    }

    #[test]
    fn test_missing_credential_field() {
        let err = CredentialConfig::default().credential().unwrap_err();
        assert!(err.to_string().contains("VTEL_CLIENT_ID"));
    }
}
