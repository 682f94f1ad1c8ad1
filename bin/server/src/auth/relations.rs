//! Best-effort notification toward the downstream relations service.
//!
//! After a login completes, the datasync domain is told to create relations
//! between the subject and its resources. The call runs detached from the
//! transaction that issued the session: its failure is logged and can never
//! roll back a successful login.

use crate::config::DatasyncConfig;
use std::fmt;

/// Client for the datasync create-relations endpoint.
#[derive(Clone)]
pub struct RelationsNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl RelationsNotifier {
    /// Creates a notifier for the configured datasync service.
    pub fn new(config: &DatasyncConfig) -> Result<Self, RelationsError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| RelationsError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: endpoint_url(&config.base_url, &config.create_relations_path),
        })
    }

    /// Asks datasync to create relations for the given identifiers.
    ///
    /// `bearer` is the opaque credential of the session that was just
    /// issued. Exactly one of `ssn`/`tin` is expected to be set.
    pub async fn create_relations(
        &self,
        ssn: Option<&str>,
        tin: Option<&str>,
        bearer: &str,
    ) -> Result<(), RelationsError> {
        let response = self
            .http_client
            .post(&self.url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", bearer),
            )
            .json(&serde_json::json!({ "ssn": ssn, "tin": tin }))
            .send()
            .await
            .map_err(|e| RelationsError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelationsError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Errors from the relations notification.
#[derive(Debug)]
pub enum RelationsError {
    /// The request could not be sent.
    Request(String),
    /// Datasync answered with a non-success status.
    Status(u16),
}

impl fmt::Display for RelationsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "relations request failed: {}", msg),
            Self::Status(status) => {
                write!(f, "relations endpoint returned status {}", status)
            }
        }
    }
}

impl std::error::Error for RelationsError {}
