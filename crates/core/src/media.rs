//! MIME type validation and blob naming.

use crate::error::{Error, Result};
use uuid::Uuid;

/// Extension used when an image subtype has no explicit mapping.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Content type used when a record carries no MIME type.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Image types with a known file extension.
const KNOWN_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Strip parameters and normalize case: `Image/PNG; q=1` -> `image/png`.
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Accept any `image/*` type.
pub fn validate_image_mime(mime: &str) -> Result<String> {
    let normalized = normalize_mime(mime);
    match normalized.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() => Ok(normalized),
        _ => Err(Error::InvalidType(format!(
            "{mime:?} is not an image; only JPEG, PNG, GIF and WebP images are allowed"
        ))),
    }
}

/// File extension for a MIME type, `jpg` when unknown.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let normalized = normalize_mime(mime);
    KNOWN_IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Content type for a stored object, guessed from its extension.
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Collision resistant object name for a new blob: `<32 hex>.<ext>`.
pub fn generate_blob_name(mime: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension_for_mime(mime))
}

/// Join a storage prefix and an object name with exactly one slash.
pub fn blob_pathname(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
