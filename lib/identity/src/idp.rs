//! Identity-provider configuration and token types.
//!
//! This module provides the configuration for connecting to the external
//! OpenID Connect identity provider, and the parsed token the broker hands
//! to the login orchestrator after a successful code exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for the OpenID Connect identity provider.
///
/// Fields with defaults can be omitted when loading from environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpConfig {
    /// The OIDC issuer URL, used for provider discovery.
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// Absolute, public URL of the login callback endpoint.
    login_callback_url: String,
    /// Absolute, public URL of the secondary-verification callback endpoint.
    verification_callback_url: String,
    /// The provider's backchannel logout endpoint.
    logout_url: String,
    /// Scopes requested on every flow, as a comma-separated string.
    /// Default: "openid,mitid,nemid"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Additional scopes requested when identity verification is required.
    /// Default: "ssn,userinfo_token"
    #[serde(default = "default_verification_scopes")]
    verification_scopes: String,
    /// Language hint passed to the provider's login UI.
    #[serde(default)]
    language: Option<String>,
    /// Request-level timeout for provider calls, in seconds.
    /// A timed-out exchange is indistinguishable from a failed one.
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_scopes() -> String {
    "openid,mitid,nemid".to_string()
}

fn default_verification_scopes() -> String {
    "ssn,userinfo_token".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl IdpConfig {
    /// Creates a new provider configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        login_callback_url: String,
        verification_callback_url: String,
        logout_url: String,
    ) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            login_callback_url,
            verification_callback_url,
            logout_url,
            scopes: default_scopes(),
            verification_scopes: default_verification_scopes(),
            language: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the login callback URL.
    #[must_use]
    pub fn login_callback_url(&self) -> &str {
        &self.login_callback_url
    }

    /// Returns the secondary-verification callback URL.
    #[must_use]
    pub fn verification_callback_url(&self) -> &str {
        &self.verification_callback_url
    }

    /// Returns the provider's backchannel logout endpoint.
    #[must_use]
    pub fn logout_url(&self) -> &str {
        &self.logout_url
    }

    /// Returns the base scopes, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes.split(',').map(str::trim).collect()
    }

    /// Returns the verification scopes, parsed from the comma-separated string.
    #[must_use]
    pub fn verification_scopes(&self) -> Vec<&str> {
        self.verification_scopes.split(',').map(str::trim).collect()
    }

    /// Returns the language hint, if configured.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the request-level timeout for provider calls.
    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

/// Token obtained from the identity provider after a code exchange.
///
/// These are parsed claims, not the wire format; the raw ID token is kept
/// alongside for backchannel logout and at-rest storage.
#[derive(Debug, Clone)]
pub struct IdpToken {
    /// The provider's stable identifier for the authenticated principal.
    pub subject: String,
    /// Name of the identity provider that performed the authentication.
    pub identity_provider: String,
    /// True when the principal authenticated on behalf of a company.
    pub is_company: bool,
    /// Company tax identifier, when the principal carries one.
    pub tax_id: Option<String>,
    /// True when the principal authenticated as a private individual.
    pub is_individual: bool,
    /// Verified national identifier, present after a verification flow.
    pub ssn: Option<String>,
    /// The raw ID token as issued by the provider.
    pub id_token_raw: String,
    /// When the token was issued.
    pub issued: DateTime<Utc>,
    /// When the token expires.
    pub expires: DateTime<Utc>,
    /// Scopes granted by the provider.
    pub scope: Vec<String>,
}

impl IdpToken {
    /// Returns true for a principal type no flow in this system supports:
    /// a private individual without any company context.
    #[must_use]
    pub fn is_bare_individual(&self) -> bool {
        self.is_individual && !self.is_company
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> IdpConfig {
        IdpConfig::new(
            "https://idp.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://auth.example.com/oidc/login/callback".to_string(),
            "https://auth.example.com/oidc/verify/callback".to_string(),
            "https://idp.example.com/api/logout".to_string(),
        )
    }

    fn token() -> IdpToken {
        let issued = Utc::now();
        IdpToken {
            subject: "external-subject".to_string(),
            identity_provider: "mitid".to_string(),
            is_company: true,
            tax_id: Some("39315041".to_string()),
            is_individual: false,
            ssn: None,
            id_token_raw: "raw.id.token".to_string(),
            issued,
            expires: issued + Duration::hours(1),
            scope: vec!["openid".to_string()],
        }
    }

    #[test]
    fn new_config_has_default_scopes() {
        let config = config();
        assert_eq!(config.scopes(), vec!["openid", "mitid", "nemid"]);
        assert_eq!(config.verification_scopes(), vec!["ssn", "userinfo_token"]);
        assert_eq!(config.timeout_seconds(), 30);
        assert!(config.language().is_none());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{
            "issuer_url": "https://idp.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "login_callback_url": "https://auth.example.com/oidc/login/callback",
            "verification_callback_url": "https://auth.example.com/oidc/verify/callback",
            "logout_url": "https://idp.example.com/api/logout"
        }"#;

        let config: IdpConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.scopes(), vec!["openid", "mitid", "nemid"]);
        assert_eq!(config.timeout_seconds(), 30);
    }

    #[test]
    fn scopes_parse_comma_separated_with_whitespace() {
        let json = r#"{
            "issuer_url": "https://idp.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "login_callback_url": "https://auth.example.com/cb",
            "verification_callback_url": "https://auth.example.com/vcb",
            "logout_url": "https://idp.example.com/api/logout",
            "scopes": "openid, mitid, custom"
        }"#;

        let config: IdpConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.scopes(), vec!["openid", "mitid", "custom"]);
    }

    #[test]
    fn company_token_is_supported() {
        assert!(!token().is_bare_individual());
    }

    #[test]
    fn bare_individual_token_is_unsupported() {
        let mut token = token();
        token.is_company = false;
        token.is_individual = true;
        token.tax_id = None;
        assert!(token.is_bare_individual());
    }
}
