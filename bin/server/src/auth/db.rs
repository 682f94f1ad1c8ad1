//! Database repositories for the user/company directory and session store.

use authgate_core::UserId;
use authgate_identity::{AccessToken, Company, User};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    subject: String,
    ssn: Option<String>,
    tax_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, sqlx::Error> {
        let subject = UserId::from_str(&self.subject).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid user subject '{}': {}", self.subject, e),
            )))
        })?;
        Ok(User::with_all_fields(
            subject,
            self.ssn,
            self.tax_id,
            self.created_at,
        ))
    }
}

/// Row type for company queries.
#[derive(FromRow)]
struct CompanyRow {
    id: String,
    tax_id: String,
    created_at: DateTime<Utc>,
}

impl CompanyRow {
    fn try_into_company(self) -> Result<Company, sqlx::Error> {
        let id = self.id.parse().map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid company id '{}': {}", self.id, e),
            )))
        })?;
        Ok(Company::with_all_fields(id, self.tax_id, self.created_at))
    }
}

/// Row type for token queries.
#[derive(FromRow)]
struct TokenRow {
    opaque_token: String,
    actor: String,
    subject: String,
    issued: DateTime<Utc>,
    expires: DateTime<Utc>,
    scope: serde_json::Value,
    id_token: String,
}

impl TokenRow {
    fn try_into_token(self) -> Result<AccessToken, sqlx::Error> {
        let actor = UserId::from_str(&self.actor).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid token actor '{}': {}", self.actor, e),
            )))
        })?;
        let scope: Vec<String> = serde_json::from_value(self.scope).unwrap_or_default();
        Ok(AccessToken::with_all_fields(
            self.opaque_token,
            actor,
            self.subject,
            self.issued,
            self.expires,
            scope,
            self.id_token,
        ))
    }
}

/// Repository for user lookups.
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves a user through their external identity link.
    ///
    /// Returns `None` when the identity provider's subject has never
    /// completed onboarding here.
    pub async fn find_by_external_identity(
        &self,
        identity_provider: &str,
        external_subject: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT u.subject, u.ssn, u.tax_id, u.created_at
            FROM users u
            JOIN external_identities e ON e.user_subject = u.subject
            WHERE e.identity_provider = $1 AND e.external_subject = $2
            "#,
        )
        .bind(identity_provider)
        .bind(external_subject)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }
}

/// Repository for company lookups.
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    /// Creates a new company repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds a company by its tax identifier.
    pub async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<Company>, sqlx::Error> {
        let row: Option<CompanyRow> = sqlx::query_as(
            r#"
            SELECT id, tax_id, created_at
            FROM companies
            WHERE tax_id = $1
            "#,
        )
        .bind(tax_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_company()?)),
            None => Ok(None),
        }
    }
}

/// Repository for session token operations.
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    /// Creates a new token repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds a token by its opaque credential, valid or not.
    pub async fn find_by_opaque_token(
        &self,
        opaque_token: &str,
    ) -> Result<Option<AccessToken>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT opaque_token, actor, subject, issued, expires, scope, id_token
            FROM tokens
            WHERE opaque_token = $1
            "#,
        )
        .bind(opaque_token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_token()?)),
            None => Ok(None),
        }
    }

    /// Deletes a token (logout). Deleting an absent token is not an error.
    pub async fn delete(&self, opaque_token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE opaque_token = $1
            "#,
        )
        .bind(opaque_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE expires < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Provisions the directory records for a new identity.
///
/// Gets or creates the user (keyed by the ssn digest when present, else by
/// tax id), gets or creates the company, attaches the user to it, and
/// records the external identity link. Runs inside the caller's
/// transaction; a concurrent flow racing on any of the natural keys
/// collapses to the already-provisioned row instead of failing.
pub async fn provision(
    tx: &mut Transaction<'_, Postgres>,
    identity_provider: &str,
    external_subject: &str,
    tax_id: Option<&str>,
    ssn_digest: Option<&str>,
) -> Result<(User, Option<Company>), sqlx::Error> {
    let user = get_or_create_user(tx, ssn_digest, tax_id).await?;

    let company = match tax_id {
        Some(tax_id) => {
            let company = get_or_create_company(tx, tax_id).await?;
            attach_user_to_company(tx, &company, &user).await?;
            Some(company)
        }
        None => None,
    };

    link_external_identity(tx, identity_provider, external_subject, user.subject()).await?;

    Ok((user, company))
}

async fn get_or_create_user(
    tx: &mut Transaction<'_, Postgres>,
    ssn_digest: Option<&str>,
    tax_id: Option<&str>,
) -> Result<User, sqlx::Error> {
    let candidate = User::new(
        ssn_digest.map(String::from),
        tax_id.map(String::from),
    );

    let inserted: Option<UserRow> = match ssn_digest {
        Some(_) => {
            sqlx::query_as(
                r#"
                INSERT INTO users (subject, ssn, tax_id, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (ssn) DO NOTHING
                RETURNING subject, ssn, tax_id, created_at
                "#,
            )
            .bind(candidate.subject().to_string())
            .bind(candidate.ssn())
            .bind(candidate.tax_id())
            .bind(candidate.created_at())
            .fetch_optional(&mut **tx)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                INSERT INTO users (subject, ssn, tax_id, created_at)
                VALUES ($1, NULL, $2, $3)
                ON CONFLICT (tax_id) WHERE ssn IS NULL DO NOTHING
                RETURNING subject, ssn, tax_id, created_at
                "#,
            )
            .bind(candidate.subject().to_string())
            .bind(candidate.tax_id())
            .bind(candidate.created_at())
            .fetch_optional(&mut **tx)
            .await?
        }
    };

    if let Some(row) = inserted {
        return row.try_into_user();
    }

    // Already provisioned, possibly by a concurrent flow: re-resolve.
    let row: Option<UserRow> = match ssn_digest {
        Some(digest) => {
            sqlx::query_as(
                r#"
                SELECT subject, ssn, tax_id, created_at
                FROM users
                WHERE ssn = $1
                "#,
            )
            .bind(digest)
            .fetch_optional(&mut **tx)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT subject, ssn, tax_id, created_at
                FROM users
                WHERE tax_id = $1 AND ssn IS NULL
                "#,
            )
            .bind(tax_id)
            .fetch_optional(&mut **tx)
            .await?
        }
    };

    row.ok_or(sqlx::Error::RowNotFound)?.try_into_user()
}

async fn get_or_create_company(
    tx: &mut Transaction<'_, Postgres>,
    tax_id: &str,
) -> Result<Company, sqlx::Error> {
    let candidate = Company::new(tax_id.to_string());

    let inserted: Option<CompanyRow> = sqlx::query_as(
        r#"
        INSERT INTO companies (id, tax_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (tax_id) DO NOTHING
        RETURNING id, tax_id, created_at
        "#,
    )
    .bind(candidate.id().to_string())
    .bind(candidate.tax_id())
    .bind(candidate.created_at())
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = inserted {
        return row.try_into_company();
    }

    let row: Option<CompanyRow> = sqlx::query_as(
        r#"
        SELECT id, tax_id, created_at
        FROM companies
        WHERE tax_id = $1
        "#,
    )
    .bind(tax_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.ok_or(sqlx::Error::RowNotFound)?.try_into_company()
}

/// Attaches a user to a company. Attaching an already-linked user is a
/// no-op, not an error.
async fn attach_user_to_company(
    tx: &mut Transaction<'_, Postgres>,
    company: &Company,
    user: &User,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO company_members (company_id, user_subject)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(company.id().to_string())
    .bind(user.subject().to_string())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn link_external_identity(
    tx: &mut Transaction<'_, Postgres>,
    identity_provider: &str,
    external_subject: &str,
    user_subject: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO external_identities (identity_provider, external_subject, user_subject)
        VALUES ($1, $2, $3)
        ON CONFLICT (identity_provider, external_subject) DO NOTHING
        "#,
    )
    .bind(identity_provider)
    .bind(external_subject)
    .bind(user_subject.to_string())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Appends the login audit record for a completed login.
pub async fn register_login(
    tx: &mut Transaction<'_, Postgres>,
    subject: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO login_records (subject, created)
        VALUES ($1, $2)
        "#,
    )
    .bind(subject.to_string())
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Persists an issued session token.
pub async fn insert_token(
    tx: &mut Transaction<'_, Postgres>,
    token: &AccessToken,
) -> Result<(), sqlx::Error> {
    let scope_json = serde_json::to_value(token.scope()).expect("serialize scopes");

    sqlx::query(
        r#"
        INSERT INTO tokens (opaque_token, actor, subject, issued, expires, scope, id_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(token.opaque_token())
    .bind(token.actor().to_string())
    .bind(token.subject())
    .bind(token.issued())
    .bind(token.expires())
    .bind(scope_json)
    .bind(token.id_token())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_row_with_valid_subject_converts() {
        let subject = UserId::new();
        let row = UserRow {
            subject: subject.to_string(),
            ssn: None,
            tax_id: Some("39315041".to_string()),
            created_at: Utc::now(),
        };

        let user = row.try_into_user().expect("convert");
        assert_eq!(user.subject(), subject);
        assert_eq!(user.tax_id(), Some("39315041"));
    }

    #[test]
    fn user_row_with_invalid_subject_fails_to_convert() {
        let row = UserRow {
            subject: "not-a-subject".to_string(),
            ssn: None,
            tax_id: None,
            created_at: Utc::now(),
        };

        assert!(row.try_into_user().is_err());
    }

    #[test]
    fn token_row_with_unreadable_scope_defaults_to_empty() {
        let row = TokenRow {
            opaque_token: "opaque".to_string(),
            actor: UserId::new().to_string(),
            subject: "usr_someone".to_string(),
            issued: Utc::now(),
            expires: Utc::now() + chrono::Duration::hours(1),
            scope: serde_json::json!({"not": "a list"}),
            id_token: "encrypted".to_string(),
        };

        let token = row.try_into_token().expect("convert");
        assert!(token.scope().is_empty());
    }
}
