use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use dictum_application::{AuditEvent, AuditRepository};
use dictum_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository for committed record changes.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO submitted_data_audit (
                category_id,
                entity_name,
                action,
                system_id,
                organization,
                old_data,
                new_data,
                subject
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.category_id.as_i64())
        .bind(event.entity_name.as_str())
        .bind(event.action.as_str())
        .bind(event.system_id.as_str())
        .bind(event.organization.as_str())
        .bind(event.old_data.map(Value::Object))
        .bind(event.new_data.map(Value::Object))
        .bind(event.subject.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append audit event for '{}': {error}",
                event.system_id
            ))
        })?;

        Ok(())
    }
}
