//! Redirect construction for flow completion and failure.
//!
//! The protocol's externally observable artifact is a 307 redirect to the
//! client's `return_url` with query parameters merged additively: whatever
//! the client put on its `return_url` survives, and the gateway's own
//! parameters (`success`, `error_code`, `error`) are appended or override
//! existing pairs of the same name.

use authgate_identity::{ErrorCode, FlowState};
use url::Url;

/// Appends (or overrides) query parameters while keeping all others.
#[must_use]
pub fn append_query_parameters(url: &Url, extra: &[(&str, &str)]) -> Url {
    let existing: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut result = url.clone();
    {
        let mut pairs = result.query_pairs_mut();
        pairs.clear();
        for (key, value) in &existing {
            if !extra.iter().any(|(extra_key, _)| extra_key == key) {
                pairs.append_pair(key, value);
            }
        }
        for (key, value) in extra {
            pairs.append_pair(key, value);
        }
    }
    result
}

/// Appends a path segment to a URL, normalizing slashes.
#[must_use]
pub fn append_path(url: &Url, path: &str) -> Url {
    let mut result = url.clone();
    let joined = format!(
        "{}/{}",
        result.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    result.set_path(&joined);
    result
}

/// The URL a client is sent to after successful completion.
#[must_use]
pub fn success_url(state: &FlowState) -> Url {
    append_query_parameters(state.return_url(), &[("success", "1")])
}

/// The URL a client is sent to when the flow fails.
#[must_use]
pub fn failure_url(state: &FlowState, error_code: ErrorCode) -> Url {
    append_query_parameters(
        state.return_url(),
        &[
            ("success", "0"),
            ("error_code", error_code.as_str()),
            ("error", error_code.message()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn preserves_existing_query_parameters() {
        let url = Url::parse("https://app.example.com/x?foo=bar&baz=1").expect("valid url");
        let result = append_query_parameters(&url, &[("success", "1")]);

        assert_eq!(query_value(&result, "foo").as_deref(), Some("bar"));
        assert_eq!(query_value(&result, "baz").as_deref(), Some("1"));
        assert_eq!(query_value(&result, "success").as_deref(), Some("1"));
    }

    #[test]
    fn overrides_colliding_parameters() {
        let url = Url::parse("https://app.example.com/x?success=0").expect("valid url");
        let result = append_query_parameters(&url, &[("success", "1")]);

        let successes: Vec<_> = result
            .query_pairs()
            .filter(|(k, _)| k == "success")
            .collect();
        assert_eq!(successes.len(), 1);
        assert_eq!(query_value(&result, "success").as_deref(), Some("1"));
    }

    #[test]
    fn keeps_base_url_and_path() {
        let result = success_url(&state());
        assert_eq!(result.host_str(), Some("app.example.com"));
        assert_eq!(result.path(), "/landing");
    }

    #[test]
    fn success_url_appends_success_flag() {
        let result = success_url(&state());
        assert_eq!(query_value(&result, "success").as_deref(), Some("1"));
        assert_eq!(query_value(&result, "foo").as_deref(), Some("bar"));
    }

    #[test]
    fn failure_url_carries_error_code_and_text() {
        let result = failure_url(&state(), ErrorCode::UserAborted);
        assert_eq!(query_value(&result, "success").as_deref(), Some("0"));
        assert_eq!(query_value(&result, "error_code").as_deref(), Some("E1"));
        assert_eq!(
            query_value(&result, "error").as_deref(),
            Some(ErrorCode::UserAborted.message())
        );
        assert_eq!(query_value(&result, "foo").as_deref(), Some("bar"));
    }

    #[test]
    fn append_path_normalizes_slashes() {
        let base = Url::parse("https://app.example.com").expect("valid url");
        assert_eq!(append_path(&base, "terms").path(), "/terms");

        let trailing = Url::parse("https://app.example.com/app/").expect("valid url");
        assert_eq!(append_path(&trailing, "/terms").path(), "/app/terms");
    }
}
