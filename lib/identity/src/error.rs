//! The stable client-facing error-code vocabulary.
//!
//! Internal failures are never exposed verbatim; everything reaching the
//! client boundary is mapped to one of these codes and carried on the
//! failure redirect as `error_code`.

use std::fmt;

/// Client-facing login failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The identity provider reported an error we have no specific code for.
    ProviderError,
    /// The user aborted the flow at the identity provider.
    UserAborted,
    /// The provider authenticated a principal type this flow does not support.
    UnsupportedPrincipal,
    /// Token exchange with the identity provider failed or timed out.
    ExchangeFailed,
}

impl ErrorCode {
    /// Returns the wire form of the code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderError => "E0",
            Self::UserAborted => "E1",
            Self::UnsupportedPrincipal => "E504",
            Self::ExchangeFailed => "E505",
        }
    }

    /// Returns the human-readable text carried alongside the code.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ProviderError => "Unknown error from identity provider",
            Self::UserAborted => "User aborted the login flow",
            Self::UnsupportedPrincipal => "Login type not supported",
            Self::ExchangeFailed => "Failed to communicate with identity provider",
        }
    }

    /// Maps an error reported by the identity provider on the callback.
    ///
    /// User-aborted variants map to [`ErrorCode::UserAborted`]; everything
    /// else the provider can report maps to [`ErrorCode::ProviderError`].
    #[must_use]
    pub fn from_provider_error(error_description: Option<&str>) -> Self {
        match error_description {
            Some("mitid_user_aborted" | "user_aborted") => Self::UserAborted,
            _ => Self::ProviderError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_forms_are_stable() {
        assert_eq!(ErrorCode::ProviderError.as_str(), "E0");
        assert_eq!(ErrorCode::UserAborted.as_str(), "E1");
        assert_eq!(ErrorCode::UnsupportedPrincipal.as_str(), "E504");
        assert_eq!(ErrorCode::ExchangeFailed.as_str(), "E505");
    }

    #[test]
    fn user_aborted_variants_map_to_e1() {
        assert_eq!(
            ErrorCode::from_provider_error(Some("mitid_user_aborted")),
            ErrorCode::UserAborted
        );
        assert_eq!(
            ErrorCode::from_provider_error(Some("user_aborted")),
            ErrorCode::UserAborted
        );
    }

    #[test]
    fn other_provider_errors_map_to_e0() {
        assert_eq!(
            ErrorCode::from_provider_error(Some("internal_error")),
            ErrorCode::ProviderError
        );
        assert_eq!(
            ErrorCode::from_provider_error(Some("internal_server_error")),
            ErrorCode::ProviderError
        );
        assert_eq!(
            ErrorCode::from_provider_error(None),
            ErrorCode::ProviderError
        );
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(ErrorCode::ExchangeFailed.to_string(), "E505");
    }
}
