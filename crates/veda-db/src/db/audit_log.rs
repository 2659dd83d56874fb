use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use veda_core::{AppError, AuditLog, AuditLogFilter, NewAuditLog};

/// Conditions shared by list, export and count; parameters `$1` to `$8`.
const FILTER_CLAUSE: &str = r#"
    ($1::audit_action IS NULL OR action = $1)
    AND ($2::uuid IS NULL OR user_id = $2)
    AND ($3::text IS NULL OR target_type = $3)
    AND ($4::int IS NULL OR status_code = $4)
    AND ($5::timestamptz IS NULL OR created_at >= $5)
    AND ($6::timestamptz IS NULL OR created_at < $6)
    AND ($7::text IS NULL
         OR action::text ILIKE $7 OR target_type ILIKE $7 OR ip_address ILIKE $7
         OR user_agent ILIKE $7 OR error_message ILIKE $7)
    AND ($8::text IS NULL OR user_id IN (SELECT id FROM users WHERE username = $8))
"#;

/// Append-only store for audit entries
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, entry), fields(db.table = "audit_logs", db.operation = "insert", action = %entry.action))]
    pub async fn insert(&self, entry: NewAuditLog) -> Result<AuditLog, AppError> {
        let log = sqlx::query_as::<Postgres, AuditLog>(
            r#"
            INSERT INTO audit_logs (action, user_id, target_type, target_id, status_code,
                                    ip_address, user_agent, error_message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(entry.action)
        .bind(entry.user_id)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(entry.status_code)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.error_message)
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<AuditLog>, AppError> {
        let log = sqlx::query_as::<Postgres, AuditLog>("SELECT * FROM audit_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(log)
    }

    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "select"))]
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>, AppError> {
        self.fetch_page(filter, filter.limit(), filter.offset()).await
    }

    /// Every matching entry up to `max_rows`, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "select"))]
    pub async fn export(
        &self,
        filter: &AuditLogFilter,
        max_rows: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        self.fetch_page(filter, max_rows, 0).await
    }

    async fn fetch_page(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let sql = format!(
            "SELECT * FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT $9 OFFSET $10",
            FILTER_CLAUSE
        );
        let logs = sqlx::query_as::<Postgres, AuditLog>(&sql)
            .bind(filter.action)
            .bind(filter.user_id)
            .bind(&filter.target_type)
            .bind(filter.status_code)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.search_pattern())
            .bind(filter.username())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list audit logs");
                AppError::Database(e)
            })?;

        Ok(logs)
    }

    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "count"))]
    pub async fn count(&self, filter: &AuditLogFilter) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM audit_logs WHERE {}", FILTER_CLAUSE);
        let total = sqlx::query_scalar::<Postgres, i64>(&sql)
            .bind(filter.action)
            .bind(filter.user_id)
            .bind(&filter.target_type)
            .bind(filter.status_code)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.search_pattern())
            .bind(filter.username())
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}
