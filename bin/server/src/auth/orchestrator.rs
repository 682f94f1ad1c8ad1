//! The login state machine.
//!
//! One orchestrator handles every step of the flow: callback returns from
//! the identity provider (for both the plain login leg and the
//! secondary-verification leg), the terms-acceptance continuation, session
//! issuance, logout, and abandonment. Which callback is being served is an
//! explicit [`CallbackPurpose`] parameter; the decision table in [`decide`]
//! selects the next step from the purpose plus what the directory already
//! knows about the identity.
//!
//! Processing is stateless per request: every invocation reconstructs all
//! context from the decoded [`FlowState`] plus durable storage, and all
//! database writes for one callback happen in one transaction.

use authgate_identity::{
    AccessToken, Company, ErrorCode, FlowCipher, FlowState, IdpConfig, StateCodec, User,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use std::sync::Arc;
use time::Duration as TimeDuration;
use url::Url;

use super::broker::{BrokerError, IdentityBroker};
use super::db::{self, CompanyRepository, TokenRepository, UserRepository};
use super::redirect::{append_path, append_query_parameters, failure_url, success_url};
use super::relations::RelationsNotifier;
use crate::config::TokenConfig;

/// Which callback endpoint a return from the identity provider landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPurpose {
    /// First leg: the plain login flow.
    Login,
    /// Second leg: the flow that requested identity verification.
    Verification,
}

/// Parameters the identity provider passes back on a callback.
///
/// `code` and `error` are mutually exclusive; providers also send `iss`,
/// `scope`, and `error_hint`, none of which the flow needs.
#[derive(Debug, Default)]
pub struct CallbackParams {
    /// Authorization code, present on success.
    pub code: Option<String>,
    /// Error identifier, present on failure.
    pub error: Option<String>,
    /// Human-oriented error description, present on failure.
    pub error_description: Option<String>,
}

/// Where to send the client next, with an optional freshly minted session.
#[derive(Debug)]
pub struct NextStep {
    /// The URL the client continues at.
    pub next_url: Url,
    /// Session cookie to set, when the flow just completed.
    pub cookie: Option<Cookie<'static>>,
}

impl NextStep {
    fn redirect(next_url: Url) -> Self {
        Self {
            next_url,
            cookie: None,
        }
    }
}

/// What the decision table selected for an authenticated identity.
#[derive(Debug)]
enum Decision {
    /// The identity resolves to a known user: issue the session.
    CompleteLogin(User),
    /// New identity on the login leg: re-enter the provider flow with
    /// identity verification requested.
    RequestVerification,
    /// Verified identity that has not accepted terms yet.
    RedirectToTerms,
    /// Verified identity with terms accepted: create the records.
    Provision,
}

/// The decision table, evaluated once per callback.
fn decide(user: Option<User>, purpose: CallbackPurpose, terms_accepted: bool) -> Decision {
    match user {
        Some(user) => Decision::CompleteLogin(user),
        None => match purpose {
            CallbackPurpose::Login => Decision::RequestVerification,
            CallbackPurpose::Verification if !terms_accepted => Decision::RedirectToTerms,
            CallbackPurpose::Verification => Decision::Provision,
        },
    }
}

/// Orchestrates the login flow.
pub struct LoginOrchestrator {
    pool: PgPool,
    codec: StateCodec,
    cipher: FlowCipher,
    broker: Arc<dyn IdentityBroker>,
    relations: RelationsNotifier,
    token: TokenConfig,
    idp: IdpConfig,
}

impl LoginOrchestrator {
    /// Creates a new orchestrator over the given collaborators.
    pub fn new(
        pool: PgPool,
        codec: StateCodec,
        cipher: FlowCipher,
        broker: Arc<dyn IdentityBroker>,
        relations: RelationsNotifier,
        token: TokenConfig,
        idp: IdpConfig,
    ) -> Self {
        Self {
            pool,
            codec,
            cipher,
            broker,
            relations,
            token,
            idp,
        }
    }

    /// Starts a new login flow, returning the provider authorization URL.
    pub fn start_login(
        &self,
        return_url: Url,
        frontend_url: Url,
    ) -> Result<Url, OrchestratorError> {
        let state = FlowState::new(return_url, frontend_url);

        self.broker
            .create_authorization_url(
                &self.codec.encode(&state),
                self.idp.login_callback_url(),
                false,
                self.idp.language(),
            )
            .map_err(OrchestratorError::Broker)
    }

    /// Handles a callback return from the identity provider.
    ///
    /// The caller has already decoded `state`; `raw_state` is the encoded
    /// form, forwarded verbatim to the token exchange.
    pub async fn handle_callback(
        &self,
        purpose: CallbackPurpose,
        mut state: FlowState,
        raw_state: &str,
        params: &CallbackParams,
    ) -> Result<NextStep, OrchestratorError> {
        if params.error.is_some() || params.error_description.is_some() {
            tracing::info!(
                error = ?params.error,
                description = ?params.error_description,
                "identity provider returned an error"
            );
            return Ok(NextStep::redirect(failure_url(
                &state,
                ErrorCode::from_provider_error(params.error_description.as_deref()),
            )));
        }

        let Some(code) = params.code.as_deref() else {
            return Err(OrchestratorError::MissingCode);
        };

        let callback_url = match purpose {
            CallbackPurpose::Login => self.idp.login_callback_url(),
            CallbackPurpose::Verification => self.idp.verification_callback_url(),
        };

        let token = match self.broker.fetch_token(code, raw_state, callback_url).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("token exchange failed: {}", e);
                return Ok(NextStep::redirect(failure_url(
                    &state,
                    ErrorCode::ExchangeFailed,
                )));
            }
        };

        if token.is_bare_individual() {
            tracing::info!(subject = %token.subject, "rejected unsupported principal type");
            return Ok(NextStep::redirect(failure_url(
                &state,
                ErrorCode::UnsupportedPrincipal,
            )));
        }

        state.set_tax_id(token.tax_id.clone());
        state.set_identity_provider(Some(token.identity_provider.clone()));
        state.set_external_subject(Some(token.subject.clone()));
        state.set_id_token(Some(self.cipher.encrypt(&token.id_token_raw)));
        if let Some(ssn) = &token.ssn {
            state.set_ssn(Some(self.cipher.encrypt(ssn)));
        }

        // The identity may already be onboarded from an earlier login.
        let user = UserRepository::new(self.pool.clone())
            .find_by_external_identity(&token.identity_provider, &token.subject)
            .await?;

        let company = match state.tax_id() {
            Some(tax_id) => {
                CompanyRepository::new(self.pool.clone())
                    .find_by_tax_id(tax_id)
                    .await?
            }
            None => None,
        };

        self.next_step(purpose, state, user, company).await
    }

    /// Continues a flow after the client answered the terms page.
    pub async fn resume_after_terms(
        &self,
        mut state: FlowState,
    ) -> Result<NextStep, OrchestratorError> {
        state.accept_terms();

        let (identity_provider, external_subject) =
            match (state.identity_provider(), state.external_subject()) {
                (Some(provider), Some(subject)) => (provider.to_string(), subject.to_string()),
                _ => return Err(OrchestratorError::IncompleteState),
            };

        let user = UserRepository::new(self.pool.clone())
            .find_by_external_identity(&identity_provider, &external_subject)
            .await?;

        let company = match state.tax_id() {
            Some(tax_id) => {
                CompanyRepository::new(self.pool.clone())
                    .find_by_tax_id(tax_id)
                    .await?
            }
            None => None,
        };

        self.next_step(CallbackPurpose::Verification, state, user, company)
            .await
    }

    /// Abandons a flow that never completed.
    ///
    /// Logs the captured provider session out remotely. Returns false when
    /// the state holds no provider session to invalidate.
    pub async fn invalidate(&self, state: &FlowState) -> Result<bool, OrchestratorError> {
        let Some(encrypted) = state.id_token() else {
            return Ok(false);
        };

        let id_token = self.cipher.decrypt(encrypted).map_err(|e| {
            tracing::error!("failed to decrypt captured id token: {}", e);
            OrchestratorError::Cipher(e)
        })?;

        if let Err(e) = self.broker.logout(&id_token).await {
            tracing::warn!("identity provider logout failed: {}", e);
        }

        Ok(true)
    }

    /// Logs out the session behind an opaque token.
    ///
    /// Deleting an absent or already-deleted token is not an error; remote
    /// provider logout is attempted best-effort.
    pub async fn logout(&self, opaque_token: &str) -> Result<(), OrchestratorError> {
        let repository = TokenRepository::new(self.pool.clone());

        let Some(token) = repository.find_by_opaque_token(opaque_token).await? else {
            return Ok(());
        };

        repository.delete(token.opaque_token()).await?;

        match self.cipher.decrypt(token.id_token()) {
            Ok(id_token) => {
                if let Err(e) = self.broker.logout(&id_token).await {
                    tracing::warn!(actor = %token.actor(), "identity provider logout failed: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(actor = %token.actor(), "failed to decrypt stored id token: {}", e);
            }
        }

        Ok(())
    }

    async fn next_step(
        &self,
        purpose: CallbackPurpose,
        state: FlowState,
        user: Option<User>,
        company: Option<Company>,
    ) -> Result<NextStep, OrchestratorError> {
        match decide(user, purpose, state.terms_accepted()) {
            Decision::CompleteLogin(user) => {
                self.complete_login(&state, &user, company.as_ref()).await
            }
            Decision::RequestVerification => {
                let authorization_url = self
                    .broker
                    .create_authorization_url(
                        &self.codec.encode(&state),
                        self.idp.verification_callback_url(),
                        true,
                        self.idp.language(),
                    )
                    .map_err(OrchestratorError::Broker)?;
                Ok(NextStep::redirect(authorization_url))
            }
            Decision::RedirectToTerms => {
                let terms_url = append_path(state.frontend_url(), "terms");
                let encoded = self.codec.encode(&state);
                Ok(NextStep::redirect(append_query_parameters(
                    &terms_url,
                    &[("state", &encoded)],
                )))
            }
            Decision::Provision => self.provision_and_complete(&state).await,
        }
    }

    async fn complete_login(
        &self,
        state: &FlowState,
        user: &User,
        company: Option<&Company>,
    ) -> Result<NextStep, OrchestratorError> {
        let mut tx = self.pool.begin().await?;
        let token = self.issue_session(&mut tx, state, user, company).await?;
        tx.commit().await?;

        tracing::info!(actor = %token.actor(), subject = %token.subject(), "user logged in");
        self.spawn_relations_notification(state, user, company, token.opaque_token());

        Ok(self.success_step(state, &token))
    }

    async fn provision_and_complete(
        &self,
        state: &FlowState,
    ) -> Result<NextStep, OrchestratorError> {
        let (identity_provider, external_subject) =
            match (state.identity_provider(), state.external_subject()) {
                (Some(provider), Some(subject)) => (provider.to_string(), subject.to_string()),
                _ => return Err(OrchestratorError::IncompleteState),
            };

        let ssn_digest = match state.ssn() {
            Some(encrypted) => {
                let raw = self.cipher.decrypt(encrypted).map_err(|e| {
                    tracing::error!("failed to decrypt national identifier: {}", e);
                    OrchestratorError::Cipher(e)
                })?;
                Some(self.cipher.fingerprint(&raw))
            }
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        let (user, company) = db::provision(
            &mut tx,
            &identity_provider,
            &external_subject,
            state.tax_id(),
            ssn_digest.as_deref(),
        )
        .await?;
        let token = self.issue_session(&mut tx, state, &user, company.as_ref()).await?;
        tx.commit().await?;

        tracing::info!(actor = %token.actor(), subject = %token.subject(), "user provisioned and logged in");
        self.spawn_relations_notification(state, &user, company.as_ref(), token.opaque_token());

        Ok(self.success_step(state, &token))
    }

    /// Writes the login record and the session token. Runs inside the
    /// caller's transaction, so a later failure rolls both back.
    async fn issue_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        state: &FlowState,
        user: &User,
        company: Option<&Company>,
    ) -> Result<AccessToken, OrchestratorError> {
        let id_token_encrypted = state
            .id_token()
            .ok_or(OrchestratorError::IncompleteState)?;

        // The stored credential must be recoverable later; refuse to issue
        // a session around a blob that no longer decrypts.
        if let Err(e) = self.cipher.decrypt(id_token_encrypted) {
            tracing::error!("captured id token does not decrypt: {}", e);
            return Err(OrchestratorError::Cipher(e));
        }

        db::register_login(tx, user.subject()).await?;

        let subject = company.map_or_else(|| user.subject().to_string(), |c| c.id().to_string());

        let token = AccessToken::issue(
            user.subject(),
            subject,
            Utc::now(),
            Duration::minutes(self.token.ttl_minutes),
            self.token.scopes(),
            id_token_encrypted.to_string(),
        );

        db::insert_token(tx, &token).await?;

        Ok(token)
    }

    fn success_step(&self, state: &FlowState, token: &AccessToken) -> NextStep {
        NextStep {
            next_url: success_url(state),
            cookie: Some(self.session_cookie(token.opaque_token().to_string())),
        }
    }

    /// Tells the relations service about the completed login, detached from
    /// the issuing transaction.
    fn spawn_relations_notification(
        &self,
        state: &FlowState,
        user: &User,
        company: Option<&Company>,
        bearer: &str,
    ) {
        let tin = company
            .map(|c| c.tax_id().to_string())
            .or_else(|| state.tax_id().map(String::from));

        let ssn = if tin.is_none() {
            state.ssn().and_then(|encrypted| match self.cipher.decrypt(encrypted) {
                Ok(ssn) => Some(ssn),
                Err(e) => {
                    tracing::error!("failed to decrypt national identifier for relations: {}", e);
                    None
                }
            })
        } else {
            None
        };

        if tin.is_none() && ssn.is_none() {
            tracing::warn!(subject = %user.subject(), "no identifier available for relations");
            return;
        }

        let notifier = self.relations.clone();
        let bearer = bearer.to_string();
        let subject = user.subject();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .create_relations(ssn.as_deref(), tin.as_deref(), &bearer)
                .await
            {
                tracing::warn!(subject = %subject, "failed to create relations: {}", e);
            }
        });
    }

    /// Builds the session cookie carrying an opaque token.
    pub fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.token.cookie_name.clone(), value))
            .domain(self.token.cookie_domain.clone())
            .path(self.token.cookie_path.clone())
            .http_only(true)
            .secure(self.token.secure_cookies)
            .same_site(SameSite::Strict)
            .build()
    }

    /// Builds the cookie that clears the session on logout.
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.token.cookie_name.clone(), ""))
            .domain(self.token.cookie_domain.clone())
            .path(self.token.cookie_path.clone())
            .http_only(true)
            .secure(self.token.secure_cookies)
            .same_site(SameSite::Strict)
            .max_age(TimeDuration::ZERO)
            .build()
    }
}

/// Orchestrator errors.
///
/// Failures the flow recovers from (a failed exchange, an identity-provider
/// error) never surface here; they become failure redirects. These variants
/// are the conditions the flow cannot continue past.
#[derive(Debug)]
pub enum OrchestratorError {
    /// A callback carried neither a code nor an error.
    MissingCode,
    /// The state lacks data this step requires.
    IncompleteState,
    /// Database error.
    Database(sqlx::Error),
    /// Broker error outside the recoverable exchange path.
    Broker(BrokerError),
    /// A flow secret failed to decrypt.
    Cipher(authgate_identity::CipherError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "callback carried neither code nor error"),
            Self::IncompleteState => write!(f, "flow state is missing required data"),
            Self::Database(e) => write!(f, "database error: {}", e),
            Self::Broker(e) => write!(f, "broker error: {}", e),
            Self::Cipher(e) => write!(f, "cipher error: {}", e),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<sqlx::Error> for OrchestratorError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasyncConfig;
    use async_trait::async_trait;
    use authgate_identity::IdpToken;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Mutex;

    /// Broker double: serves a canned token (or failure) and records the
    /// state passed to URL creation.
    struct StubBroker {
        token: Option<IdpToken>,
        captured_state: Mutex<Option<String>>,
    }

    impl StubBroker {
        fn with_token(token: IdpToken) -> Self {
            Self {
                token: Some(token),
                captured_state: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                token: None,
                captured_state: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl IdentityBroker for StubBroker {
        fn create_authorization_url(
            &self,
            state: &str,
            _callback_uri: &str,
            _request_identity_verification: bool,
            _language: Option<&str>,
        ) -> Result<Url, BrokerError> {
            *self.captured_state.lock().expect("lock") = Some(state.to_string());
            Ok(Url::parse("https://idp.example.com/authorize").expect("valid url"))
        }

        async fn fetch_token(
            &self,
            _code: &str,
            _state: &str,
            _redirect_uri: &str,
        ) -> Result<IdpToken, BrokerError> {
            self.token
                .clone()
                .ok_or_else(|| BrokerError::TokenExchange("stub failure".to_string()))
        }

        async fn logout(&self, _id_token_raw: &str) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn company_token() -> IdpToken {
        let issued = Utc::now();
        IdpToken {
            subject: "external-1".to_string(),
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

    fn bare_individual_token() -> IdpToken {
        let mut token = company_token();
        token.is_company = false;
        token.is_individual = true;
        token.tax_id = None;
        token
    }

    fn orchestrator(broker: StubBroker) -> LoginOrchestrator {
        orchestrator_with(Arc::new(broker))
    }

    fn orchestrator_with(broker: Arc<StubBroker>) -> LoginOrchestrator {
        let token_config: TokenConfig = serde_json::from_str(
            r#"{"cookie_domain": "example.com"}"#,
        )
        .expect("deserialize");
        let datasync = DatasyncConfig {
            base_url: "https://datasync.example.com".to_string(),
            create_relations_path: "/relations".to_string(),
        };

        LoginOrchestrator::new(
            PgPoolOptions::new()
                .connect_lazy("postgres://authgate@localhost/authgate")
                .expect("lazy pool"),
            StateCodec::new("state-secret"),
            FlowCipher::new("cipher-secret"),
            broker,
            RelationsNotifier::new(&datasync).expect("notifier"),
            token_config,
            IdpConfig::new(
                "https://idp.example.com".to_string(),
                "client-id".to_string(),
                "client-secret".to_string(),
                "https://auth.example.com/oidc/login/callback".to_string(),
                "https://auth.example.com/oidc/verify/callback".to_string(),
                "https://idp.example.com/api/logout".to_string(),
            ),
        )
    }

    fn state() -> FlowState {
        FlowState::new(
            Url::parse("https://app.example.com/landing?foo=bar").expect("valid url"),
            Url::parse("https://app.example.com").expect("valid url"),
        )
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn known_user_completes_login() {
        let user = User::new(None, None);
        assert!(matches!(
            decide(Some(user), CallbackPurpose::Login, false),
            Decision::CompleteLogin(_)
        ));
    }

    #[test]
    fn unknown_user_on_login_leg_needs_verification() {
        assert!(matches!(
            decide(None, CallbackPurpose::Login, false),
            Decision::RequestVerification
        ));
        // Even with terms already accepted, verification comes first.
        assert!(matches!(
            decide(None, CallbackPurpose::Login, true),
            Decision::RequestVerification
        ));
    }

    #[test]
    fn verified_unknown_user_without_terms_goes_to_terms() {
        assert!(matches!(
            decide(None, CallbackPurpose::Verification, false),
            Decision::RedirectToTerms
        ));
    }

    #[test]
    fn verified_unknown_user_with_terms_is_provisioned() {
        assert!(matches!(
            decide(None, CallbackPurpose::Verification, true),
            Decision::Provision
        ));
    }

    #[tokio::test]
    async fn provider_abort_redirects_with_e1() {
        let orchestrator = orchestrator(StubBroker::failing());
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("mitid_user_aborted".to_string()),
            ..CallbackParams::default()
        };

        let step = orchestrator
            .handle_callback(CallbackPurpose::Login, state(), "encoded", &params)
            .await
            .expect("next step");

        assert_eq!(query_value(&step.next_url, "success").as_deref(), Some("0"));
        assert_eq!(
            query_value(&step.next_url, "error_code").as_deref(),
            Some("E1")
        );
        assert_eq!(query_value(&step.next_url, "foo").as_deref(), Some("bar"));
        assert!(step.cookie.is_none());
    }

    #[tokio::test]
    async fn provider_error_redirects_with_e0() {
        let orchestrator = orchestrator(StubBroker::failing());
        let params = CallbackParams {
            error_description: Some("internal_error".to_string()),
            ..CallbackParams::default()
        };

        let step = orchestrator
            .handle_callback(CallbackPurpose::Verification, state(), "encoded", &params)
            .await
            .expect("next step");

        assert_eq!(
            query_value(&step.next_url, "error_code").as_deref(),
            Some("E0")
        );
    }

    #[tokio::test]
    async fn failed_exchange_redirects_with_e505() {
        let orchestrator = orchestrator(StubBroker::failing());
        let params = CallbackParams {
            code: Some("auth-code".to_string()),
            ..CallbackParams::default()
        };

        let step = orchestrator
            .handle_callback(CallbackPurpose::Login, state(), "encoded", &params)
            .await
            .expect("next step");

        assert_eq!(query_value(&step.next_url, "success").as_deref(), Some("0"));
        assert_eq!(
            query_value(&step.next_url, "error_code").as_deref(),
            Some("E505")
        );
    }

    #[tokio::test]
    async fn bare_individual_redirects_with_e504() {
        let orchestrator = orchestrator(StubBroker::with_token(bare_individual_token()));
        let params = CallbackParams {
            code: Some("auth-code".to_string()),
            ..CallbackParams::default()
        };

        let step = orchestrator
            .handle_callback(CallbackPurpose::Login, state(), "encoded", &params)
            .await
            .expect("next step");

        assert_eq!(
            query_value(&step.next_url, "error_code").as_deref(),
            Some("E504")
        );
    }

    #[tokio::test]
    async fn callback_without_code_or_error_is_rejected() {
        let orchestrator = orchestrator(StubBroker::with_token(company_token()));

        let result = orchestrator
            .handle_callback(
                CallbackPurpose::Login,
                state(),
                "encoded",
                &CallbackParams::default(),
            )
            .await;

        assert!(matches!(result, Err(OrchestratorError::MissingCode)));
    }

    #[tokio::test]
    async fn start_login_passes_decodable_state_to_provider() {
        let broker = Arc::new(StubBroker::failing());
        let orchestrator = orchestrator_with(broker.clone());

        let url = orchestrator
            .start_login(
                Url::parse("https://app.example.com/landing").expect("valid url"),
                Url::parse("https://app.example.com").expect("valid url"),
            )
            .expect("authorization url");
        assert_eq!(url.host_str(), Some("idp.example.com"));

        // The state handed to the provider must decode under the same codec.
        let captured = broker
            .captured_state
            .lock()
            .expect("lock")
            .clone()
            .expect("state captured");
        let decoded = StateCodec::new("state-secret")
            .decode(&captured)
            .expect("decodable state");
        assert_eq!(
            decoded.return_url().as_str(),
            "https://app.example.com/landing"
        );
        assert!(!decoded.terms_accepted());
    }

    #[tokio::test]
    async fn session_cookie_is_locked_down() {
        let orchestrator = orchestrator(StubBroker::failing());
        let cookie = orchestrator.session_cookie("opaque-value".to_string());

        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "opaque-value");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[tokio::test]
    async fn clear_cookie_expires_immediately() {
        let orchestrator = orchestrator(StubBroker::failing());
        let cookie = orchestrator.clear_session_cookie();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(TimeDuration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
