//! The transient login flow state.
//!
//! `FlowState` is created when a login is initiated, round-tripped through
//! the identity provider as the OAuth `state` parameter, and updated after
//! every callback. It is never persisted server-side; the encoded form (see
//! [`crate::codec::StateCodec`]) is the only continuation between steps.

use serde::{Deserialize, Serialize};
use url::Url;

/// State carried through the login flow's external redirects.
///
/// Sensitive values (`id_token`, `ssn`) are stored in their encrypted form
/// as produced by [`crate::cipher::FlowCipher`]; the state itself only
/// guarantees integrity, not confidentiality of its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    /// Where to send the client when the flow concludes.
    return_url: Url,
    /// Base URL of the client application, used for intermediate redirects.
    frontend_url: Url,
    /// Company tax identifier, set once the identity provider returns one.
    #[serde(default)]
    tax_id: Option<String>,
    /// Name of the identity provider used.
    #[serde(default)]
    identity_provider: Option<String>,
    /// The identity provider's stable identifier for the principal.
    #[serde(default)]
    external_subject: Option<String>,
    /// The provider's raw ID token, encrypted with the flow cipher.
    #[serde(default)]
    id_token: Option<String>,
    /// Verified national identifier, encrypted with the flow cipher.
    /// Captured by the secondary-verification leg; provisioning may run
    /// only after a further redirect, so the state has to carry it.
    #[serde(default)]
    ssn: Option<String>,
    /// Whether the user has accepted terms in this flow.
    #[serde(default)]
    terms_accepted: bool,
}

impl FlowState {
    /// Creates the initial state for a new login flow.
    #[must_use]
    pub fn new(return_url: Url, frontend_url: Url) -> Self {
        Self {
            return_url,
            frontend_url,
            tax_id: None,
            identity_provider: None,
            external_subject: None,
            id_token: None,
            ssn: None,
            terms_accepted: false,
        }
    }

    /// Returns the URL the client is sent to when the flow concludes.
    #[must_use]
    pub fn return_url(&self) -> &Url {
        &self.return_url
    }

    /// Returns the client application's base URL.
    #[must_use]
    pub fn frontend_url(&self) -> &Url {
        &self.frontend_url
    }

    /// Returns the company tax identifier, if one was returned by the provider.
    #[must_use]
    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    /// Returns the name of the identity provider used.
    #[must_use]
    pub fn identity_provider(&self) -> Option<&str> {
        self.identity_provider.as_deref()
    }

    /// Returns the provider's stable identifier for the principal.
    #[must_use]
    pub fn external_subject(&self) -> Option<&str> {
        self.external_subject.as_deref()
    }

    /// Returns the encrypted ID token, if one has been captured.
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Returns the encrypted national identifier, if one has been captured.
    #[must_use]
    pub fn ssn(&self) -> Option<&str> {
        self.ssn.as_deref()
    }

    /// Returns true if the user has accepted terms in this flow.
    #[must_use]
    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    /// Sets the company tax identifier.
    pub fn set_tax_id(&mut self, tax_id: Option<String>) {
        self.tax_id = tax_id;
    }

    /// Sets the identity provider name.
    pub fn set_identity_provider(&mut self, identity_provider: Option<String>) {
        self.identity_provider = identity_provider;
    }

    /// Sets the provider's principal identifier.
    pub fn set_external_subject(&mut self, external_subject: Option<String>) {
        self.external_subject = external_subject;
    }

    /// Sets the encrypted ID token.
    pub fn set_id_token(&mut self, id_token: Option<String>) {
        self.id_token = id_token;
    }

    /// Sets the encrypted national identifier.
    pub fn set_ssn(&mut self, ssn: Option<String>) {
        self.ssn = ssn;
    }

    /// Marks terms as accepted for this flow.
    pub fn accept_terms(&mut self) {
        self.terms_accepted = true;
    }
}
