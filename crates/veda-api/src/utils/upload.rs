//! Multipart parsing for asset uploads

use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use veda_core::AppError;
use veda_storage::content_type_for_filename;

const MAX_FILENAME_LENGTH: usize = 255;

/// Fields of an upload form. Only `file` is required.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub data: Bytes,
    pub filename: String,
    pub content_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

/// Read the upload form, rejecting files larger than `max_bytes` as soon as
/// the limit is crossed.
pub async fn read_upload_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut file_seen = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            if file_seen {
                return Err(AppError::InvalidInput(
                    "Multiple file fields are not allowed; send exactly one field named 'file'"
                        .to_string(),
                ));
            }
            file_seen = true;
            form.filename = sanitize_filename(field.file_name().unwrap_or("file"))?;
            form.content_type = field
                .content_type()
                .map(normalize_mime_type)
                .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
                .unwrap_or_else(|| content_type_for_filename(&form.filename).to_string());

            let mut buffer = BytesMut::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
            {
                if buffer.len() + chunk.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File too large. Maximum size is {} MB",
                        max_bytes / 1024 / 1024
                    )));
                }
                buffer.extend_from_slice(&chunk);
            }
            form.data = buffer.freeze();
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid form field '{}': {}", name, e)))?;
        let value = value.trim();

        match name.as_str() {
            "title" => form.title = non_empty(value),
            "description" => form.description = non_empty(value),
            "category" => form.category = non_empty(value),
            "tags" => form.tags = parse_tags(value),
            "is_public" => form.is_public = parse_bool(value)?,
            _ => tracing::debug!(field = %name, "Ignoring unknown upload field"),
        }
    }

    if !file_seen {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    }
    if form.data.is_empty() {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }

    Ok(form)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Comma-separated tag list; blanks and duplicates dropped, order kept.
pub fn parse_tags(value: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn parse_bool(value: &str) -> Result<bool, AppError> {
    match value.to_lowercase().as_str() {
        "" | "false" | "0" | "off" | "no" => Ok(false),
        "true" | "1" | "on" | "yes" => Ok(true),
        other => Err(AppError::InvalidInput(format!(
            "Invalid boolean for is_public: {}",
            other
        ))),
    }
}

/// Strip MIME parameters: `"image/jpeg; charset=utf-8"` → `"image/jpeg"`.
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Keep only the final path component of a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name == ".." || name == "." {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let name: String = name
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect();

    if name.is_empty() {
        Ok("file".to_string())
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags(" kirtan, vrindavan ,,kirtan, 1972 "),
            vec!["kirtan", "vrindavan", "1972"]
        );
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("On").unwrap());
        assert!(!parse_bool("").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("Image/JPEG; charset=utf-8"), "image/jpeg");
        assert_eq!(normalize_mime_type("audio/mpeg"), "audio/mpeg");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("C:\\photos\\Darshan 1971.jpg").unwrap(),
            "Darshan 1971.jpg"
        );
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert!(sanitize_filename("a/..").is_err());
        assert_eq!(sanitize_filename("").unwrap(), "file");
    }
}
