//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`IdpConfig`](authgate_identity::IdpConfig) for the identity
//! provider configuration.

use authgate_identity::IdpConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Session token and cookie configuration.
    pub token: TokenConfig,

    /// Secrets for the flow state envelope and the flow cipher.
    pub flow: FlowSecretsConfig,

    /// Identity provider configuration.
    pub oidc: IdpConfig,

    /// Downstream relations service configuration.
    pub datasync: DatasyncConfig,
}

/// Session token and cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Domain the session cookie is scoped to.
    pub cookie_domain: String,

    /// Path the session cookie is scoped to.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP
    /// development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Session lifetime in minutes.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Scopes granted to every issued session, comma-separated.
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Interval between expired-token cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl TokenConfig {
    /// Returns the session scopes, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scopes.split(',').map(|s| s.trim().to_string()).collect()
    }
}

/// Secrets for the flow state envelope and cipher.
///
/// The two secrets must differ: one authenticates the client-visible state,
/// the other encrypts the credentials smuggled inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowSecretsConfig {
    /// Secret signing the encoded flow state.
    pub state_secret: String,
    /// Secret behind the flow cipher.
    pub encryption_secret: String,
}

/// Downstream relations (datasync) service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasyncConfig {
    /// Base URL of the datasync service.
    pub base_url: String,

    /// Path of the create-relations endpoint.
    #[serde(default = "default_create_relations_path")]
    pub create_relations_path: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_ttl_minutes() -> i64 {
    720
}

fn default_scopes() -> String {
    "meteringpoints.read,measurements.read".to_string()
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_create_relations_path() -> String {
    "/relations".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_config(json: &str) -> TokenConfig {
        serde_json::from_str(json).expect("deserialize")
    }

    #[test]
    fn token_config_has_correct_defaults() {
        let config = token_config(r#"{"cookie_domain": "example.com"}"#);
        assert_eq!(config.cookie_name, "token");
        assert_eq!(config.cookie_path, "/");
        assert!(config.secure_cookies);
        assert_eq!(config.ttl_minutes, 720);
        assert_eq!(config.cleanup_interval_seconds, 300);
    }

    #[test]
    fn default_scopes_parse() {
        let config = token_config(r#"{"cookie_domain": "example.com"}"#);
        assert_eq!(
            config.scopes(),
            vec!["meteringpoints.read", "measurements.read"]
        );
    }

    #[test]
    fn custom_scopes_parse_with_whitespace() {
        let config = token_config(
            r#"{"cookie_domain": "example.com", "scopes": "a.read, b.write"}"#,
        );
        assert_eq!(config.scopes(), vec!["a.read", "b.write"]);
    }
}
