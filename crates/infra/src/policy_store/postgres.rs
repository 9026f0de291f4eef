//! Postgres-backed policy store.
//!
//! Two tables, one per row kind. Every column of a row is part of its primary
//! key, so inserts are idempotent (`ON CONFLICT DO NOTHING`) and
//! `rows_affected()` says whether anything changed.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | anything else | `Query` |
//!
//! Rows that no longer parse against the vocabulary fail the whole load with
//! `Corrupt`: serving a set with a row silently dropped could lose a deny.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use async_trait::async_trait;
use clinicos_authz::{GroupingPolicy, PermissionPolicy, PolicySnapshot, PolicyStore, StoreError};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS authz_grouping_policies (
        subject     TEXT        NOT NULL,
        role        TEXT        NOT NULL,
        domain      TEXT        NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (subject, role, domain)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS authz_permission_policies (
        role        TEXT        NOT NULL,
        domain      TEXT        NOT NULL,
        resource    TEXT        NOT NULL,
        action      TEXT        NOT NULL,
        effect      TEXT        NOT NULL CHECK (effect IN ('allow', 'deny')),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (role, domain, resource, action, effect)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresPolicyStore {
    pool: PgPool,
}

impl PostgresPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the policy tables if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    #[instrument(skip(self), fields(groupings = tracing::field::Empty, permissions = tracing::field::Empty), err)]
    async fn load(&self) -> Result<PolicySnapshot, StoreError> {
        // Both tables from one snapshot, so a concurrent write cannot land
        // between the two reads.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("load", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load", e))?;

        let grouping_rows = sqlx::query("SELECT subject, role, domain FROM authz_grouping_policies")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_groupings", e))?;
        let permission_rows = sqlx::query(
            "SELECT role, domain, resource, action, effect FROM authz_permission_policies",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_permissions", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("load", e))?;

        let mut snapshot = PolicySnapshot::default();
        for row in grouping_rows {
            let subject: String = column(&row, "subject")?;
            let role: String = column(&row, "role")?;
            let domain: String = column(&row, "domain")?;
            let rule = GroupingPolicy::parse(&subject, &role, &domain).map_err(|e| {
                StoreError::Corrupt(format!("g({subject}, {role}, {domain}): {e}"))
            })?;
            snapshot.groupings.insert(rule);
        }
        for row in permission_rows {
            let role: String = column(&row, "role")?;
            let domain: String = column(&row, "domain")?;
            let resource: String = column(&row, "resource")?;
            let action: String = column(&row, "action")?;
            let effect: String = column(&row, "effect")?;
            let rule = PermissionPolicy::parse(&role, &domain, &resource, &action, &effect)
                .map_err(|e| {
                    StoreError::Corrupt(format!(
                        "p({role}, {domain}, {resource}, {action}, {effect}): {e}"
                    ))
                })?;
            snapshot.permissions.insert(rule);
        }

        let span = Span::current();
        span.record("groupings", snapshot.groupings.len());
        span.record("permissions", snapshot.permissions.len());
        Ok(snapshot)
    }

    #[instrument(skip(self, rule), fields(rule = %rule), err)]
    async fn add_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO authz_grouping_policies (subject, role, domain)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&rule.subject)
        .bind(rule.role.as_str())
        .bind(rule.domain.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_grouping", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, rule), fields(rule = %rule), err)]
    async fn remove_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM authz_grouping_policies WHERE subject = $1 AND role = $2 AND domain = $3",
        )
        .bind(&rule.subject)
        .bind(rule.role.as_str())
        .bind(rule.domain.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_grouping", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn remove_subject(&self, subject: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM authz_grouping_policies WHERE subject = $1")
            .bind(subject)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_subject", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, rule), fields(rule = %rule), err)]
    async fn add_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO authz_permission_policies (role, domain, resource, action, effect)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(rule.role.as_str())
        .bind(rule.domain.as_str())
        .bind(rule.resource.as_str())
        .bind(rule.action.as_str())
        .bind(rule.effect.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_permission", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, rule), fields(rule = %rule), err)]
    async fn remove_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM authz_permission_policies
            WHERE role = $1 AND domain = $2 AND resource = $3 AND action = $4 AND effect = $5
            "#,
        )
        .bind(rule.role.as_str())
        .bind(rule.domain.as_str())
        .bind(rule.resource.as_str())
        .bind(rule.action.as_str())
        .bind(rule.effect.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_permission", e))?;
        Ok(result.rows_affected() > 0)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn column(row: &sqlx::postgres::PgRow, name: &str) -> Result<String, StoreError> {
    row.try_get::<String, _>(name)
        .map_err(|e| StoreError::Corrupt(format!("column '{name}': {e}")))
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}: {err}"))
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            StoreError::Unavailable(format!("connection error in {operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            StoreError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        _ => StoreError::Query(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_map_to_unavailable() {
        assert!(matches!(
            map_sqlx_error("load", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("load", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("load", sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
    }

    #[test]
    fn schema_keys_every_column() {
        assert!(SCHEMA[0].contains("PRIMARY KEY (subject, role, domain)"));
        assert!(SCHEMA[1].contains("PRIMARY KEY (role, domain, resource, action, effect)"));
    }
}
