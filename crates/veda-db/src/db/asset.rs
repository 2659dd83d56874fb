use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use veda_core::{AppError, Asset, AssetFilter, NewAsset, UpdateAsset};

/// Repository for archived media records
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL
           OR filename ILIKE $1 OR title ILIKE $1
           OR description ILIKE $1 OR category ILIKE $1)
      AND ($2::asset_type IS NULL OR asset_type = $2)
      AND ($3::asset_status IS NULL OR status = $3)
      AND ($4::boolean IS NULL OR is_public = $4)
      AND ($5::uuid IS NULL OR uploader_id = $5)
"#;

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "insert", key = %asset.key))]
    pub async fn create(&self, asset: NewAsset) -> Result<Asset, AppError> {
        let created = sqlx::query_as::<Postgres, Asset>(
            r#"
            INSERT INTO assets (key, filename, title, description, asset_type, category, tags,
                                content_type, size_bytes, status, is_public, checksum_sha256,
                                metadata, uploader_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(&asset.key)
        .bind(&asset.filename)
        .bind(&asset.title)
        .bind(&asset.description)
        .bind(asset.asset_type)
        .bind(&asset.category)
        .bind(&asset.tags)
        .bind(&asset.content_type)
        .bind(asset.size_bytes)
        .bind(asset.status)
        .bind(asset.is_public)
        .bind(&asset.checksum_sha256)
        .bind(&asset.metadata)
        .bind(asset.uploader_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %asset.key, "Failed to insert asset");
            AppError::Database(e)
        })?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<Postgres, Asset>("SELECT * FROM assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(asset)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    pub async fn get_by_key(&self, key: &str) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<Postgres, Asset>("SELECT * FROM assets WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(asset)
    }

    /// Filtered page of assets, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    pub async fn list(&self, filter: &AssetFilter) -> Result<Vec<Asset>, AppError> {
        let sql = format!(
            "SELECT * FROM assets {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            FILTER_CLAUSE
        );

        let assets = sqlx::query_as::<Postgres, Asset>(&sql)
            .bind(filter.search_pattern())
            .bind(filter.asset_type)
            .bind(filter.status)
            .bind(filter.is_public)
            .bind(filter.uploader_id)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(assets)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "count"))]
    pub async fn count(&self, filter: &AssetFilter) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM assets {}", FILTER_CLAUSE);

        let total = sqlx::query_scalar::<Postgres, i64>(&sql)
            .bind(filter.search_pattern())
            .bind(filter.asset_type)
            .bind(filter.status)
            .bind(filter.is_public)
            .bind(filter.uploader_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    /// Apply a partial update. Fields left as `None` keep their value.
    #[tracing::instrument(skip(self, update), fields(db.table = "assets", db.operation = "update", db.record_id = %id))]
    pub async fn update(&self, id: Uuid, update: &UpdateAsset) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<Postgres, Asset>(
            r#"
            UPDATE assets
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                tags = COALESCE($5, tags),
                status = COALESCE($6, status),
                is_public = COALESCE($7, is_public),
                metadata = COALESCE($8, metadata),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.category)
        .bind(&update.tags)
        .bind(update.status)
        .bind(update.is_public)
        .bind(&update.metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    /// Delete the row and return it so the caller can remove the stored object.
    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let asset =
            sqlx::query_as::<Postgres, Asset>("DELETE FROM assets WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(asset)
    }
}
