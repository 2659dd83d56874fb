//! Archived media: upload, search, download and curation.

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::upload::read_upload_form;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use veda_core::{
    AppError, Asset, AssetFilter, AssetResponse, AssetStatus, NewAsset, UpdateAsset, UserRole,
};
use veda_storage::{
    asset_type_for_filename, generate_object_key, sha256_hex, ObjectAttributes,
    PRESIGNED_URL_EXPIRY,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetListResponse {
    pub items: Vec<AssetResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn asset_not_found() -> AppError {
    AppError::NotFound("Asset not found".to_string())
}

/// Attach a fetchable URL: the public URL for public assets, a presigned one otherwise.
async fn with_url(state: &AppState, asset: Asset) -> Result<AssetResponse, AppError> {
    let url = if asset.is_public {
        state.storage.public_url(&asset.key)
    } else {
        state
            .storage
            .presigned_url(&asset.key, PRESIGNED_URL_EXPIRY)
            .await?
    };
    Ok(AssetResponse { asset, url })
}

/// `Content-Disposition` value that survives non-ASCII filenames.
pub(crate) fn attachment_disposition(filename: &str) -> String {
    content_disposition("attachment", filename)
}

pub(crate) fn inline_disposition(filename: &str) -> String {
    content_disposition("inline", filename)
}

fn content_disposition(kind: &str, filename: &str) -> String {
    format!(
        "{}; filename*=UTF-8''{}",
        kind,
        utf8_percent_encode(filename, NON_ALPHANUMERIC)
    )
}

/// Browsers render these inline.
fn is_previewable(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type.starts_with("audio/")
        || content_type == "application/pdf"
}

/// Stream a stored file with the given `Content-Disposition`.
async fn file_response(
    state: &AppState,
    asset: &Asset,
    disposition: String,
) -> Result<Response<Body>, HttpAppError> {
    let stream = state.storage.download_stream(&asset.key).await?;
    let body = stream.map(|chunk| {
        chunk.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, asset.content_type.as_str())
        .header(header::CONTENT_LENGTH, asset.size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// List assets
///
/// Filters combine with AND; `q` matches filename, title, description and category.
#[utoipa::path(
    get,
    path = "/api/v1/assets",
    tag = "assets",
    params(
        ("q" = Option<String>, Query, description = "Search text"),
        ("type" = Option<String>, Query, description = "image, audio, video, document, pdf or other"),
        ("status" = Option<String>, Query, description = "draft, published or archived"),
        ("is_public" = Option<bool>, Query, description = "Visibility"),
        ("uploader_id" = Option<Uuid>, Query, description = "Uploader"),
        ("limit" = Option<i64>, Query, description = "Page size (default 25, max 100)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Page of assets", body = AssetListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _user, filter))]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(filter): Query<AssetFilter>,
) -> Result<Json<AssetListResponse>, HttpAppError> {
    let repository = &state.db.asset_repository;
    let (assets, total) = tokio::try_join!(repository.list(&filter), repository.count(&filter))?;

    let mut items = Vec::with_capacity(assets.len());
    for asset in assets {
        items.push(with_url(&state, asset).await?);
    }

    Ok(Json(AssetListResponse {
        items,
        total,
        limit: filter.limit(),
        offset: filter.offset(),
    }))
}

/// Upload an asset
///
/// Multipart form with a `file` field and optional `title`, `description`,
/// `category`, `tags` (comma separated) and `is_public`.
#[utoipa::path(
    post,
    path = "/api/v1/assets",
    tag = "assets",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Asset stored", body = AssetResponse),
        (status = 400, description = "Invalid form", body = ErrorResponse),
        (status = 403, description = "Uploader role required", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Content type not allowed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, multipart), fields(user_id = %user.id()))]
pub async fn upload_asset(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    user.require_role(UserRole::Uploader)?;

    let form = read_upload_form(multipart, state.config.upload_limit_bytes()).await?;
    if !state.config.is_allowed_content_type(&form.content_type) {
        return Err(AppError::UnsupportedMediaType(format!(
            "File type not allowed: {}",
            form.content_type
        ))
        .into());
    }

    let key = generate_object_key(&form.filename, user.id(), Utc::now());
    let checksum = sha256_hex(&form.data);
    let size_bytes = form.data.len() as i64;

    let attributes = ObjectAttributes {
        content_type: form.content_type.clone(),
        uploaded_by: Some(user.id().to_string()),
        checksum_sha256: Some(checksum.clone()),
    };
    state.storage.upload(&key, form.data, &attributes).await?;

    let created = state
        .db
        .asset_repository
        .create(NewAsset {
            key: key.clone(),
            asset_type: asset_type_for_filename(&form.filename),
            filename: form.filename,
            title: form.title,
            description: form.description,
            category: form.category,
            tags: form.tags,
            content_type: form.content_type,
            size_bytes,
            status: AssetStatus::Published,
            is_public: form.is_public,
            checksum_sha256: checksum,
            metadata: serde_json::json!({}),
            uploader_id: Some(user.id()),
        })
        .await;

    let asset = match created {
        Ok(asset) => asset,
        Err(e) => {
            let storage = state.storage.clone();
            tokio::spawn(async move {
                if let Err(cleanup_err) = storage.delete(&key).await {
                    tracing::warn!(
                        error = %cleanup_err,
                        storage_key = %key,
                        "Failed to clean up stored file after database error"
                    );
                }
            });
            return Err(e.into());
        }
    };

    tracing::info!(
        asset_id = %asset.id,
        storage_key = %asset.key,
        size_bytes = asset.size_bytes,
        "Asset uploaded"
    );

    Ok((StatusCode::CREATED, Json(with_url(&state, asset).await?)))
}

/// Get an asset
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}",
    tag = "assets",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = AssetResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _user))]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetResponse>, HttpAppError> {
    let asset = state
        .db
        .asset_repository
        .get(id)
        .await?
        .ok_or_else(asset_not_found)?;
    Ok(Json(with_url(&state, asset).await?))
}

/// Download an asset's file
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}/download",
    tag = "assets",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _user))]
pub async fn download_asset(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response<Body>, HttpAppError> {
    let asset = state
        .db
        .asset_repository
        .get(id)
        .await?
        .ok_or_else(asset_not_found)?;

    file_response(&state, &asset, attachment_disposition(&asset.filename)).await
}

/// View an asset's file in the browser
///
/// Served with `Content-Disposition: inline`. Only images, audio, video and
/// PDF documents can be previewed.
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}/preview",
    tag = "assets",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Asset not found", body = ErrorResponse),
        (status = 415, description = "File type cannot be previewed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _user))]
pub async fn preview_asset(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response<Body>, HttpAppError> {
    let asset = state
        .db
        .asset_repository
        .get(id)
        .await?
        .ok_or_else(asset_not_found)?;

    if !is_previewable(&asset.content_type) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Preview not available for {}",
            asset.content_type
        ))
        .into());
    }

    file_response(&state, &asset, inline_disposition(&asset.filename)).await
}

/// Update an asset's descriptive fields
#[utoipa::path(
    patch,
    path = "/api/v1/assets/{id}",
    tag = "assets",
    params(("id" = Uuid, Path, description = "Asset ID")),
    request_body = UpdateAsset,
    responses(
        (status = 200, description = "Updated asset", body = AssetResponse),
        (status = 403, description = "Editor role required", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, update), fields(user_id = %user.id()))]
pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<UpdateAsset>,
) -> Result<Json<AssetResponse>, HttpAppError> {
    user.require_role(UserRole::Editor)?;
    update.validate()?;

    let asset = state
        .db
        .asset_repository
        .update(id, &update)
        .await?
        .ok_or_else(asset_not_found)?;

    tracing::info!(asset_id = %asset.id, "Asset updated");
    Ok(Json(with_url(&state, asset).await?))
}

/// Delete an asset and its stored file
#[utoipa::path(
    delete,
    path = "/api/v1/assets/{id}",
    tag = "assets",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 403, description = "Editor role required", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    user.require_role(UserRole::Editor)?;

    let asset = state
        .db
        .asset_repository
        .delete(id)
        .await?
        .ok_or_else(asset_not_found)?;

    if let Err(e) = state.storage.delete(&asset.key).await {
        tracing::warn!(
            error = %e,
            asset_id = %asset.id,
            storage_key = %asset.key,
            "Failed to delete stored file; row already removed"
        );
    }

    tracing::info!(asset_id = %asset.id, "Asset deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_disposition_encodes_filename() {
        assert_eq!(
            attachment_disposition("Gītā 1972.pdf"),
            "attachment; filename*=UTF-8''G%C4%ABt%C4%81%201972%2Epdf"
        );
        assert_eq!(
            attachment_disposition("a\"b.pdf"),
            "attachment; filename*=UTF-8''a%22b%2Epdf"
        );
        assert_eq!(
            inline_disposition("scan.png"),
            "inline; filename*=UTF-8''scan%2Epng"
        );
    }

    #[test]
    fn test_previewable_types() {
        assert!(is_previewable("image/jpeg"));
        assert!(is_previewable("video/mp4"));
        assert!(is_previewable("audio/mpeg"));
        assert!(is_previewable("application/pdf"));
        assert!(!is_previewable("application/msword"));
        assert!(!is_previewable("application/zip"));
    }
}
