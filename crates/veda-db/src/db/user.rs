use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use veda_core::{AppError, NewUser, User, UserFilter, UserRole, UserStatus};

use super::transaction::with_transaction;

/// Repository for archive accounts
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "insert", username = %user.username))]
    pub async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let created = sqlx::query_as::<Postgres, User>(
            r#"
            INSERT INTO users (email, username, first_name, last_name, mobile,
                               password_hash, role, status, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.status)
        .bind(user.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = AppError::Database(e);
            if err.is_unique_violation() {
                return AppError::BadRequest("Username or email already registered".to_string());
            }
            tracing::error!(error = %err, "Failed to insert user");
            err
        })?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Case-insensitive email lookup
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<Postgres, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    /// Login lookup: the identifier may be a username or an email address.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            "SELECT * FROM users WHERE username = $1 OR LOWER(email) = LOWER($1) LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn exists_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR LOWER(email) = LOWER($2))",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<Postgres, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL
                   OR username ILIKE $1 OR email ILIKE $1
                   OR first_name ILIKE $1 OR last_name ILIKE $1)
              AND ($2::user_role IS NULL OR role = $2)
              AND ($3::user_status IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.search_pattern())
        .bind(filter.role)
        .bind(filter.status)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn count(&self, filter: &UserFilter) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL
                   OR username ILIKE $1 OR email ILIKE $1
                   OR first_name ILIKE $1 OR last_name ILIKE $1)
              AND ($2::user_role IS NULL OR role = $2)
              AND ($3::user_status IS NULL OR status = $3)
            "#,
        )
        .bind(filter.search_pattern())
        .bind(filter.role)
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn count_all(&self) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn count_admins(&self) -> Result<i64, AppError> {
        let total =
            sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(&self.pool)
                .await?;
        Ok(total)
    }

    /// Update name and mobile fields. `None` leaves a field unchanged.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn update_profile(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
        mobile: Option<String>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                mobile = COALESCE($4, mobile),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn update_role_status(
        &self,
        id: Uuid,
        role: Option<UserRole>,
        status: Option<UserStatus>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, password_hash), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_changed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark the email as verified. Pending accounts become active.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn set_status_verified(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE,
                status = CASE WHEN status = 'pending' THEN 'active'::user_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, secret), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn set_otp(
        &self,
        id: Uuid,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET otp_secret = $2, otp_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(secret)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Invalidate the current code along with its secret.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn clear_otp(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET otp_secret = NULL, otp_expires_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a user, refusing to remove the last admin.
    ///
    /// Admin rows are locked for the duration of the check so two concurrent
    /// deletes cannot both pass it.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let admins = sqlx::query_scalar::<Postgres, Uuid>(
                    "SELECT id FROM users WHERE role = 'admin' FOR UPDATE",
                )
                .fetch_all(&mut **tx)
                .await?;

                if admins.len() <= 1 && admins.contains(&id) {
                    return Err(AppError::BadRequest(
                        "Cannot delete the last admin user".to_string(),
                    ));
                }

                let result = sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;

                Ok(result.rows_affected() > 0)
            })
        })
        .await
    }
}
