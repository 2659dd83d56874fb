//! Object key generation and filename helpers shared by all backends.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;
use veda_core::AssetType;

/// Lifetime of presigned download URLs.
pub const PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Lowercased extension including the dot, or an empty string.
fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Asset type implied by a filename's extension.
pub fn asset_type_for_filename(filename: &str) -> AssetType {
    match extension(filename).as_str() {
        ".jpg" | ".jpeg" | ".png" | ".gif" | ".webp" | ".svg" => AssetType::Image,
        ".pdf" | ".doc" | ".docx" => AssetType::Document,
        ".mp3" | ".wav" | ".ogg" => AssetType::Audio,
        ".mp4" | ".webm" | ".mov" => AssetType::Video,
        _ => AssetType::Other,
    }
}

/// Generate a unique object key: `users/{user_id}/{YYYY/MM/DD}/{8 hex}{.ext}`.
pub fn generate_object_key(filename: &str, user_id: Uuid, now: DateTime<Utc>) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let unique: [u8; 4] = rng.random();
    format!(
        "users/{}/{}/{}{}",
        user_id,
        now.format("%Y/%m/%d"),
        hex::encode(unique),
        extension(filename)
    )
}

/// MIME type guessed from the extension, used when the client sends none.
pub fn content_type_for_filename(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".svg" => "image/svg+xml",
        ".pdf" => "application/pdf",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".ogg" => "audio/ogg",
        ".m4a" => "audio/mp4",
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_asset_type_for_filename() {
        assert_eq!(asset_type_for_filename("darshan.JPG"), AssetType::Image);
        assert_eq!(asset_type_for_filename("lecture.mp3"), AssetType::Audio);
        assert_eq!(asset_type_for_filename("festival.mov"), AssetType::Video);
        assert_eq!(asset_type_for_filename("letter.pdf"), AssetType::Document);
        assert_eq!(asset_type_for_filename("notes.docx"), AssetType::Document);
        assert_eq!(asset_type_for_filename("archive.zip"), AssetType::Other);
        assert_eq!(asset_type_for_filename("no_extension"), AssetType::Other);
    }

    #[test]
    fn test_generate_object_key_format() {
        let user_id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let key = generate_object_key("Kirtan Evening.MP3", user_id, now);

        let prefix = format!("users/{}/2024/03/07/", user_id);
        assert!(key.starts_with(&prefix), "unexpected key {}", key);
        let name = &key[prefix.len()..];
        assert_eq!(name.len(), 8 + ".mp3".len());
        assert!(name.ends_with(".mp3"));
        assert!(name[..8].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_object_key_is_unique() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let a = generate_object_key("a.png", user_id, now);
        let b = generate_object_key("a.png", user_id, now);
        assert_ne!(a, b);
        assert!(!a.contains(".."));
    }

    #[test]
    fn test_content_type_for_filename() {
        assert_eq!(content_type_for_filename("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_filename("book.PDF"), "application/pdf");
        assert_eq!(
            content_type_for_filename("data.bin"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
