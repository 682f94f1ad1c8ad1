//! User and external-identity directory records.

use authgate_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user of the platform.
///
/// Created once, during first successful onboarding; the `subject` is
/// immutable thereafter and is the identifier every other record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal subject identifier.
    subject: UserId,
    /// National identifier, stored as a keyed digest. Unique when present.
    ssn: Option<String>,
    /// Company tax identifier the user onboarded with, if any.
    tax_id: Option<String>,
    /// When the user record was created.
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user keyed by the given identifiers.
    ///
    /// The subject is generated automatically. Use this when provisioning a
    /// user during their first onboarding.
    #[must_use]
    pub fn new(ssn: Option<String>, tax_id: Option<String>) -> Self {
        Self {
            subject: UserId::new(),
            ssn,
            tax_id,
            created_at: Utc::now(),
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        subject: UserId,
        ssn: Option<String>,
        tax_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            ssn,
            tax_id,
            created_at,
        }
    }

    /// Returns the internal subject identifier.
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.subject
    }

    /// Returns the national-identifier digest, if present.
    #[must_use]
    pub fn ssn(&self) -> Option<&str> {
        self.ssn.as_deref()
    }

    /// Returns the company tax identifier, if present.
    #[must_use]
    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    /// Returns when the user record was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Link between an identity provider's principal and an internal user.
///
/// Unique per `(identity_provider, external_subject)` pair; created when a
/// new user completes secondary verification and used on every subsequent
/// login to resolve the provider identity without repeating verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentityLink {
    /// Name of the identity provider.
    identity_provider: String,
    /// The provider's stable identifier for the principal.
    external_subject: String,
    /// The internal user the identity resolves to.
    user_subject: UserId,
    /// When the link was created.
    created_at: DateTime<Utc>,
}

impl ExternalIdentityLink {
    /// Creates a new link for the given provider identity.
    #[must_use]
    pub fn new(identity_provider: String, external_subject: String, user_subject: UserId) -> Self {
        Self {
            identity_provider,
            external_subject,
            user_subject,
            created_at: Utc::now(),
        }
    }

    /// Creates a link with all fields specified, for reconstitution from
    /// storage.
    #[must_use]
    pub fn with_all_fields(
        identity_provider: String,
        external_subject: String,
        user_subject: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity_provider,
            external_subject,
            user_subject,
            created_at,
        }
    }

    /// Returns the identity provider name.
    #[must_use]
    pub fn identity_provider(&self) -> &str {
        &self.identity_provider
    }

    /// Returns the provider's principal identifier.
    #[must_use]
    pub fn external_subject(&self) -> &str {
        &self.external_subject
    }

    /// Returns the internal user subject.
    #[must_use]
    pub fn user_subject(&self) -> UserId {
        self.user_subject
    }

    /// Returns when the link was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_generated_subject() {
        let user = User::new(None, Some("39315041".to_string()));
        assert!(user.subject().to_string().starts_with("usr_"));
        assert_eq!(user.tax_id(), Some("39315041"));
        assert!(user.ssn().is_none());
    }

    #[test]
    fn two_users_get_distinct_subjects() {
        let a = User::new(None, None);
        let b = User::new(None, None);
        assert_ne!(a.subject(), b.subject());
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let subject = UserId::new();
        let created = Utc::now() - chrono::Duration::days(30);

        let user = User::with_all_fields(
            subject,
            Some("digest".to_string()),
            Some("39315041".to_string()),
            created,
        );

        assert_eq!(user.subject(), subject);
        assert_eq!(user.ssn(), Some("digest"));
        assert_eq!(user.tax_id(), Some("39315041"));
        assert_eq!(user.created_at(), created);
    }

    #[test]
    fn link_points_at_user() {
        let user = User::new(None, None);
        let link = ExternalIdentityLink::new(
            "mitid".to_string(),
            "external-1".to_string(),
            user.subject(),
        );

        assert_eq!(link.identity_provider(), "mitid");
        assert_eq!(link.external_subject(), "external-1");
        assert_eq!(link.user_subject(), user.subject());
    }
}
