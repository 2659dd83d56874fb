//! Configuration module
//!
//! Settings are read from the environment (after loading `.env` when present)
//! into [`ArchiveConfig`], wrapped by [`Config`] which exposes getters.

use std::env;

use crate::models::AssetType;
use crate::storage_types::StorageBackend;

const APP_NAME: &str = "Veda Foundation — Bhakti Charu Swami Archives";
const SERVER_PORT: u16 = 8000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SESSION_LIFETIME_MINUTES: i64 = 1440;
const OTP_EXPIRE_MINUTES: i64 = 15;
/// Upper bound for session and OTP lifetimes (365 days)
const MAX_LIFETIME_MINUTES: i64 = 365 * 24 * 60;
const RATE_LIMIT_PER_MINUTE: u32 = 60;
const MAX_UPLOAD_MB: usize = 1024;
const SMTP_PORT: u16 = 587;
const APP_URL: &str = "http://localhost:8000";
const ADMIN_USERNAME: &str = "admin";

/// Groups of accepted upload content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeGroup {
    Image,
    Audio,
    Video,
    Pdf,
}

impl ContentTypeGroup {
    pub fn content_types(self) -> &'static [&'static str] {
        match self {
            ContentTypeGroup::Image => &["image/jpeg", "image/png", "image/gif", "image/webp"],
            ContentTypeGroup::Audio => &["audio/mpeg", "audio/wav", "audio/ogg", "audio/mp4"],
            ContentTypeGroup::Video => &["video/mp4", "video/webm", "video/ogg"],
            ContentTypeGroup::Pdf => &["application/pdf"],
        }
    }

    pub const ALL: [ContentTypeGroup; 4] = [
        ContentTypeGroup::Image,
        ContentTypeGroup::Audio,
        ContentTypeGroup::Video,
        ContentTypeGroup::Pdf,
    ];

    /// Group accepting `content_type`, if any. Parameters such as `; charset=` are ignored.
    pub fn for_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|group| group.content_types().contains(&essence.as_str()))
    }

    pub fn asset_type(self) -> AssetType {
        match self {
            ContentTypeGroup::Image => AssetType::Image,
            ContentTypeGroup::Audio => AssetType::Audio,
            ContentTypeGroup::Video => AssetType::Video,
            ContentTypeGroup::Pdf => AssetType::Document,
        }
    }
}

/// Archive service configuration
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub app_name: String,
    pub environment: String,
    pub debug: bool,
    pub server_port: u16,
    pub app_url: String,
    pub cors_origins: Vec<String>,
    // Secrets and sessions
    pub secret_key: String,
    pub session_secret: String,
    pub session_lifetime_minutes: i64,
    pub otp_expire_minutes: i64,
    pub rate_limit_per_minute: u32,
    pub trusted_proxy_count: usize,
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_endpoint_url: Option<String>,
    pub s3_region: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_public_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub max_upload_mb: usize,
    // Email
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
    // Optional cache/queue connection; accepted for deployment parity, not used.
    pub redis_url: Option<String>,
    // Initial admin bootstrap
    pub admin_username: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ArchiveConfig>);

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_production_env(environment: &str) -> bool {
    matches!(environment.to_lowercase().as_str(), "prod" | "production")
}

impl ArchiveConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "dev".to_string());
        let is_production = is_production_env(&environment);

        let cors_origins_str =
            env::var("BACKEND_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "BACKEND_CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let secret_key = env::var("SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("SECRET_KEY must be set for token signing"))?;
        let session_secret = non_empty("SESSION_SECRET").unwrap_or_else(|| secret_key.clone());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let config = ArchiveConfig {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| APP_NAME.to_string()),
            debug: env::var("DEBUG")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(!is_production),
            environment,
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            app_url: env::var("APP_URL")
                .unwrap_or_else(|_| APP_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_origins,
            secret_key,
            session_secret,
            session_lifetime_minutes: env::var("SESSION_LIFETIME_MINUTES")
                .unwrap_or_else(|_| SESSION_LIFETIME_MINUTES.to_string())
                .parse()
                .unwrap_or(SESSION_LIFETIME_MINUTES),
            otp_expire_minutes: env::var("OTP_EXPIRE_MINUTES")
                .unwrap_or_else(|_| OTP_EXPIRE_MINUTES.to_string())
                .parse()
                .unwrap_or(OTP_EXPIRE_MINUTES),
            rate_limit_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| RATE_LIMIT_PER_MINUTE.to_string())
                .parse()
                .unwrap_or(RATE_LIMIT_PER_MINUTE),
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_endpoint_url: non_empty("S3_ENDPOINT_URL"),
            s3_region: non_empty("S3_REGION").or_else(|| non_empty("AWS_REGION")),
            s3_bucket: non_empty("S3_BUCKET"),
            s3_public_url: non_empty("S3_PUBLIC_URL"),
            aws_access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty("LOCAL_STORAGE_BASE_URL"),
            max_upload_mb: env::var("MAX_UPLOAD_MB")
                .unwrap_or_else(|_| MAX_UPLOAD_MB.to_string())
                .parse()
                .unwrap_or(MAX_UPLOAD_MB),
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| SMTP_PORT.to_string())
                .parse()
                .unwrap_or(SMTP_PORT),
            smtp_user: non_empty("SMTP_USER"),
            smtp_pass: non_empty("SMTP_PASS"),
            smtp_from: non_empty("SMTP_FROM"),
            smtp_tls: env::var("SMTP_TLS")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            redis_url: non_empty("REDIS_URL"),
            admin_username: non_empty("ADMIN_USERNAME")
                .unwrap_or_else(|| ADMIN_USERNAME.to_string()),
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.secret_key.len() < 32 {
            return Err(anyhow::anyhow!(
                "SECRET_KEY must be at least 32 characters long"
            ));
        }

        if self.session_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "SESSION_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgresql://")
            || self.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if !(1..=MAX_LIFETIME_MINUTES).contains(&self.session_lifetime_minutes) {
            return Err(anyhow::anyhow!(
                "SESSION_LIFETIME_MINUTES must be between 1 and {}",
                MAX_LIFETIME_MINUTES
            ));
        }

        if !(1..=MAX_LIFETIME_MINUTES).contains(&self.otp_expire_minutes) {
            return Err(anyhow::anyhow!(
                "OTP_EXPIRE_MINUTES must be between 1 and {}",
                MAX_LIFETIME_MINUTES
            ));
        }

        if self.max_upload_mb == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_MB must be greater than zero"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Config {
    fn inner(&self) -> &ArchiveConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ArchiveConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().environment)
    }

    pub fn app_name(&self) -> &str {
        &self.inner().app_name
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn debug(&self) -> bool {
        self.inner().debug
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn app_url(&self) -> &str {
        &self.inner().app_url
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn secret_key(&self) -> &str {
        &self.inner().secret_key
    }

    pub fn session_secret(&self) -> &str {
        &self.inner().session_secret
    }

    pub fn session_lifetime_minutes(&self) -> i64 {
        self.inner().session_lifetime_minutes
    }

    pub fn otp_expire_minutes(&self) -> i64 {
        self.inner().otp_expire_minutes
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.inner().rate_limit_per_minute
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.inner().trusted_proxy_count
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_endpoint_url(&self) -> Option<&str> {
        self.inner().s3_endpoint_url.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_public_url(&self) -> Option<&str> {
        self.inner().s3_public_url.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.inner().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.inner().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn max_upload_mb(&self) -> usize {
        self.inner().max_upload_mb
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.inner().max_upload_mb * 1024 * 1024
    }

    /// Accepted upload content types, grouped the way uploads are classified.
    pub fn allowed_content_types(&self) -> Vec<(ContentTypeGroup, &'static [&'static str])> {
        ContentTypeGroup::ALL
            .into_iter()
            .map(|group| (group, group.content_types()))
            .collect()
    }

    pub fn is_allowed_content_type(&self, content_type: &str) -> bool {
        ContentTypeGroup::for_content_type(content_type).is_some()
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.inner().smtp_host.as_deref()
    }

    pub fn smtp_port(&self) -> u16 {
        self.inner().smtp_port
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.inner().smtp_user.as_deref()
    }

    pub fn smtp_pass(&self) -> Option<&str> {
        self.inner().smtp_pass.as_deref()
    }

    pub fn smtp_from(&self) -> Option<&str> {
        self.inner().smtp_from.as_deref()
    }

    pub fn smtp_tls(&self) -> bool {
        self.inner().smtp_tls
    }

    pub fn redis_url(&self) -> Option<&str> {
        self.inner().redis_url.as_deref()
    }

    pub fn admin_username(&self) -> &str {
        &self.inner().admin_username
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.inner().admin_email.as_deref()
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.inner().admin_password.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ArchiveConfig {
        ArchiveConfig {
            app_name: APP_NAME.to_string(),
            environment: "dev".to_string(),
            debug: true,
            server_port: SERVER_PORT,
            app_url: APP_URL.to_string(),
            cors_origins: vec!["*".to_string()],
            secret_key: "a".repeat(32),
            session_secret: "b".repeat(32),
            session_lifetime_minutes: SESSION_LIFETIME_MINUTES,
            otp_expire_minutes: OTP_EXPIRE_MINUTES,
            rate_limit_per_minute: RATE_LIMIT_PER_MINUTE,
            trusted_proxy_count: 0,
            database_url: "postgresql://localhost/veda".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_backend: StorageBackend::S3,
            s3_endpoint_url: None,
            s3_region: Some("us-east-1".to_string()),
            s3_bucket: Some("archive".to_string()),
            s3_public_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            local_storage_path: None,
            local_storage_base_url: None,
            max_upload_mb: MAX_UPLOAD_MB,
            smtp_host: None,
            smtp_port: SMTP_PORT,
            smtp_user: None,
            smtp_pass: None,
            smtp_from: None,
            smtp_tls: true,
            redis_url: None,
            admin_username: ADMIN_USERNAME.to_string(),
            admin_email: None,
            admin_password: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = base();
        config.secret_key = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifetimes_are_bounded() {
        let mut config = base();
        config.session_lifetime_minutes = 0;
        assert!(config.validate().is_err());

        config.session_lifetime_minutes = i64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SESSION_LIFETIME_MINUTES"));

        config.session_lifetime_minutes = MAX_LIFETIME_MINUTES;
        config.otp_expire_minutes = MAX_LIFETIME_MINUTES + 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("OTP_EXPIRE_MINUTES"));

        config.otp_expire_minutes = OTP_EXPIRE_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut config = base();
        config.s3_bucket = None;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("S3_BUCKET"));
    }

    #[test]
    fn test_local_backend_requires_path() {
        let mut config = base();
        config.storage_backend = StorageBackend::Local;
        assert!(config.validate().is_err());
        config.local_storage_path = Some("/tmp/veda".to_string());
        config.local_storage_base_url = Some("http://localhost:8000/files".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upload_limit_bytes() {
        let mut config = base();
        config.max_upload_mb = 2;
        assert_eq!(Config(Box::new(config)).upload_limit_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_content_type_groups() {
        assert_eq!(
            ContentTypeGroup::for_content_type("image/PNG"),
            Some(ContentTypeGroup::Image)
        );
        assert_eq!(
            ContentTypeGroup::for_content_type("audio/mpeg; charset=binary"),
            Some(ContentTypeGroup::Audio)
        );
        assert_eq!(
            ContentTypeGroup::for_content_type("application/pdf"),
            Some(ContentTypeGroup::Pdf)
        );
        assert_eq!(ContentTypeGroup::for_content_type("text/html"), None);
        assert_eq!(ContentTypeGroup::Pdf.asset_type(), AssetType::Document);
    }

    #[test]
    fn test_production_detection() {
        let mut config = base();
        config.environment = "prod".to_string();
        assert!(Config(Box::new(config)).is_production());
        assert!(!Config(Box::new(base())).is_production());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
