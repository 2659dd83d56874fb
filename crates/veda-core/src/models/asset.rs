use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Audio,
    Video,
    Document,
    Pdf,
    Other,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetType::Image => "image",
            AssetType::Audio => "audio",
            AssetType::Video => "video",
            AssetType::Document => "document",
            AssetType::Pdf => "pdf",
            AssetType::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(AssetType::Image),
            "audio" => Ok(AssetType::Audio),
            "video" => Ok(AssetType::Video),
            "document" => Ok(AssetType::Document),
            "pdf" => Ok(AssetType::Pdf),
            "other" => Ok(AssetType::Other),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// Publication state of an archived item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl FromStr for AssetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(AssetStatus::Draft),
            "published" => Ok(AssetStatus::Published),
            "archived" => Ok(AssetStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid asset status: {}", s)),
        }
    }
}

/// Archived media item. The bytes live in object storage under `key`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Asset {
    pub id: Uuid,
    pub key: String,
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: AssetStatus,
    pub is_public: bool,
    pub checksum_sha256: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub uploader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Asset with a URL the client can fetch it from.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetResponse {
    #[serde(flatten)]
    pub asset: Asset,
    /// Presigned URL for private assets, public URL otherwise
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewAsset {
    pub key: String,
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub asset_type: AssetType,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: AssetStatus,
    pub is_public: bool,
    pub checksum_sha256: String,
    pub metadata: serde_json::Value,
    pub uploader_id: Option<Uuid>,
}

/// Partial update of editable asset fields.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAsset {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<AssetStatus>,
    pub is_public: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// Search and filter parameters for listing assets.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssetFilter {
    /// Case-insensitive match on filename, title, description and category
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
    pub is_public: Option<bool>,
    pub uploader_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AssetFilter {
    pub const DEFAULT_LIMIT: i64 = 25;

    pub fn limit(&self) -> i64 {
        super::clamp_limit(self.limit, Self::DEFAULT_LIMIT, 100)
    }

    pub fn offset(&self) -> i64 {
        super::clamp_offset(self.offset)
    }

    /// `%q%` pattern with LIKE wildcards in the user input escaped.
    pub fn search_pattern(&self) -> Option<String> {
        super::like_pattern(self.q.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter = AssetFilter::default();
        assert_eq!(filter.limit(), 25);
        assert_eq!(filter.offset(), 0);
        assert_eq!(filter.search_pattern(), None);
    }

    #[test]
    fn test_filter_clamps() {
        let filter = AssetFilter {
            limit: Some(1000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.limit(), 100);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = AssetFilter {
            q: Some(" 100%_kirtan ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern().unwrap(), "%100\\%\\_kirtan%");
    }

    #[test]
    fn test_asset_type_serde() {
        assert_eq!(
            serde_json::to_string(&AssetType::Document).unwrap(),
            "\"document\""
        );
        assert_eq!("PDF".parse::<AssetType>().unwrap(), AssetType::Pdf);
        assert_eq!(AssetStatus::default(), AssetStatus::Published);
    }

    #[test]
    fn test_update_validation() {
        let update = UpdateAsset {
            title: Some("x".repeat(256)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(UpdateAsset::default().validate().is_ok());
    }
}
