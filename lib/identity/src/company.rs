//! Company directory record.

use authgate_core::CompanyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company, created lazily on the first login presenting its tax id.
///
/// Many users may attach to one company; membership lives in a separate
/// join table and attaching is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Internal company identifier.
    id: CompanyId,
    /// Company tax identifier. Unique.
    tax_id: String,
    /// When the company record was created.
    created_at: DateTime<Utc>,
}

impl Company {
    /// Creates a new company for the given tax identifier.
    #[must_use]
    pub fn new(tax_id: String) -> Self {
        Self {
            id: CompanyId::new(),
            tax_id,
            created_at: Utc::now(),
        }
    }

    /// Creates a company with all fields specified, for reconstitution from
    /// storage.
    #[must_use]
    pub fn with_all_fields(id: CompanyId, tax_id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            tax_id,
            created_at,
        }
    }

    /// Returns the internal company identifier.
    #[must_use]
    pub fn id(&self) -> CompanyId {
        self.id
    }

    /// Returns the company tax identifier.
    #[must_use]
    pub fn tax_id(&self) -> &str {
        &self.tax_id
    }

    /// Returns when the company record was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_company_has_generated_id() {
        let company = Company::new("39315041".to_string());
        assert!(company.id().to_string().starts_with("com_"));
        assert_eq!(company.tax_id(), "39315041");
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let id = CompanyId::new();
        let created = Utc::now() - chrono::Duration::days(7);
        let company = Company::with_all_fields(id, "39315041".to_string(), created);

        assert_eq!(company.id(), id);
        assert_eq!(company.created_at(), created);
    }
}
