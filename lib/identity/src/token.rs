//! Session credential and login audit records.

use authgate_core::{CompanyId, UserId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind an opaque token.
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generates a fresh opaque session token.
///
/// 32 bytes of OS randomness, base64url encoded: unguessable and, for any
/// practical purpose, never reused.
#[must_use]
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// An issued session credential.
///
/// The opaque token is the only part the client ever sees; everything else
/// is resolved server-side on each authenticated request. `actor` is always
/// the user who authenticated; `subject` is who the session acts as — the
/// company id when the login was on behalf of a company, otherwise the
/// actor's own subject. The id prefix (`com_`/`usr_`) makes the two cases
/// distinguishable without a separate discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Client-visible opaque credential. Unique.
    opaque_token: String,
    /// The user who authenticated.
    actor: UserId,
    /// The identifier the session acts as.
    subject: String,
    /// When the session was issued.
    issued: DateTime<Utc>,
    /// When the session expires. Always after `issued`.
    expires: DateTime<Utc>,
    /// Scopes granted to the session.
    scope: Vec<String>,
    /// The identity provider's ID token, encrypted with the flow cipher.
    id_token: String,
}

impl AccessToken {
    /// Issues a new token for the given actor/subject pair.
    ///
    /// The opaque token is generated, and `expires` is `issued` plus the
    /// given lifetime.
    #[must_use]
    pub fn issue(
        actor: UserId,
        subject: String,
        issued: DateTime<Utc>,
        ttl: Duration,
        scope: Vec<String>,
        id_token: String,
    ) -> Self {
        Self {
            opaque_token: generate_opaque_token(),
            actor,
            subject,
            issued,
            expires: issued + ttl,
            scope,
            id_token,
        }
    }

    /// Creates a token with all fields specified, for reconstitution from
    /// storage.
    #[must_use]
    pub fn with_all_fields(
        opaque_token: String,
        actor: UserId,
        subject: String,
        issued: DateTime<Utc>,
        expires: DateTime<Utc>,
        scope: Vec<String>,
        id_token: String,
    ) -> Self {
        Self {
            opaque_token,
            actor,
            subject,
            issued,
            expires,
            scope,
            id_token,
        }
    }

    /// Returns the client-visible opaque credential.
    #[must_use]
    pub fn opaque_token(&self) -> &str {
        &self.opaque_token
    }

    /// Returns the user who authenticated.
    #[must_use]
    pub fn actor(&self) -> UserId {
        self.actor
    }

    /// Returns the identifier the session acts as.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the company the session acts on behalf of, if any.
    #[must_use]
    pub fn company_subject(&self) -> Option<CompanyId> {
        self.subject.parse().ok()
    }

    /// Returns when the session was issued.
    #[must_use]
    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// Returns the scopes granted to the session.
    #[must_use]
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Returns the encrypted ID token stored with the session.
    #[must_use]
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// Returns true if the session is currently valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let now = Utc::now();
        self.issued <= now && now < self.expires
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires
    }
}

/// Append-only audit entry written once per successful login completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    /// Record identifier.
    id: i64,
    /// The user who logged in.
    subject: UserId,
    /// When the login completed.
    created: DateTime<Utc>,
}

impl LoginRecord {
    /// Creates a record with all fields specified, for reconstitution from
    /// storage.
    #[must_use]
    pub fn with_all_fields(id: i64, subject: UserId, created: DateTime<Utc>) -> Self {
        Self {
            id,
            subject,
            created,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns the user who logged in.
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.subject
    }

    /// Returns when the login completed.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<String> {
        vec![
            "meteringpoints.read".to_string(),
            "measurements.read".to_string(),
        ]
    }

    #[test]
    fn opaque_tokens_are_unique() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
    }

    #[test]
    fn opaque_token_shape() {
        let token = generate_opaque_token();
        // 32 bytes base64url without padding
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn issued_token_expires_after_issuance() {
        let issued = Utc::now();
        let token = AccessToken::issue(
            UserId::new(),
            "usr_someone".to_string(),
            issued,
            Duration::minutes(720),
            scopes(),
            "encrypted".to_string(),
        );

        assert!(token.expires() > token.issued());
        assert_eq!(token.expires() - token.issued(), Duration::minutes(720));
        assert!(token.is_valid());
        assert!(!token.is_expired());
    }

    #[test]
    fn expired_token_is_invalid() {
        let issued = Utc::now() - Duration::hours(2);
        let token = AccessToken::issue(
            UserId::new(),
            "usr_someone".to_string(),
            issued,
            Duration::hours(1),
            scopes(),
            "encrypted".to_string(),
        );

        assert!(!token.is_valid());
        assert!(token.is_expired());
    }

    #[test]
    fn company_subject_resolves_from_prefix() {
        let company = CompanyId::new();
        let token = AccessToken::issue(
            UserId::new(),
            company.to_string(),
            Utc::now(),
            Duration::hours(1),
            scopes(),
            "encrypted".to_string(),
        );

        assert_eq!(token.company_subject(), Some(company));
    }

    #[test]
    fn personal_subject_is_not_a_company() {
        let actor = UserId::new();
        let token = AccessToken::issue(
            actor,
            actor.to_string(),
            Utc::now(),
            Duration::hours(1),
            scopes(),
            "encrypted".to_string(),
        );

        assert!(token.company_subject().is_none());
    }
}
