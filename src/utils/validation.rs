use std::path::Path;

/// Image types the analysis model accepts
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/gif",
];

const ACCEPTED_TYPES: &str = "Only JPEG, PNG, WebP, HEIC and GIF images are accepted.";

/// Longest extension kept from the original file name (without the dot)
const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Validates a declared content type against the image allowlist and
/// returns its normalized essence (`image/png`).
pub fn validate_mime_type(content_type: &str) -> Result<String, ValidationError> {
    let normalized = content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_lowercase())
        .unwrap_or_else(|_| content_type.trim().to_lowercase());

    if ALLOWED_IMAGE_MIME_TYPES.contains(&normalized.as_str()) {
        return Ok(normalized);
    }

    Err(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!("MIME type '{}' is not allowed. {}", content_type, ACCEPTED_TYPES),
    })
}

/// Sniffs the payload's magic bytes. Returns the detected image type when it
/// can be identified, or an error if the bytes are clearly not an image.
pub fn verify_image_bytes(data: &[u8]) -> Result<Option<String>, ValidationError> {
    if data.is_empty() {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        });
    }

    match infer::get(data) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(Some(kind.mime_type().to_string()))
        }
        Some(kind) => Err(ValidationError {
            code: "NOT_AN_IMAGE",
            message: format!("File content looks like '{}', not an image", kind.mime_type()),
        }),
        None => {
            // HEIC variants are not always recognised; trust the declared type.
            tracing::debug!("No magic bytes match for upload, trusting declared type");
            Ok(None)
        }
    }
}

/// Extracts a safe, lower-cased extension (with leading dot) from the
/// client-supplied file name. Anything unusual yields an empty string.
pub fn safe_extension(original_name: &str) -> String {
    let name = original_name.rsplit(['/', '\\']).next().unwrap_or("");

    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Full validation pipeline for an uploaded image. Returns the MIME type to
/// forward to the analysis model.
pub fn validate_image_upload(
    content_type: Option<&str>,
    data: &[u8],
    max_size: usize,
) -> Result<String, ValidationError> {
    // 1. Size check
    validate_file_size(data.len(), max_size)?;

    // 2. Declared type check
    let declared = validate_mime_type(content_type.unwrap_or("application/octet-stream"))?;

    // 3. Magic bytes verification; the sniffed type wins over the declared one
    match verify_image_bytes(data)? {
        Some(detected) if ALLOWED_IMAGE_MIME_TYPES.contains(&detected.as_str()) => Ok(detected),
        Some(detected) => Err(ValidationError {
            code: "INVALID_MIME_TYPE",
            message: format!("Image type '{}' is not allowed. {}", detected, ACCEPTED_TYPES),
        }),
        None => Ok(declared),
    }
}
