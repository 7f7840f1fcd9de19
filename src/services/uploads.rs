use crate::utils::validation::{ValidationError, safe_extension, validate_image_upload};
use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Prefix of every generated upload name: `plant-<epoch-millis><ext>`.
pub const UPLOAD_PREFIX: &str = "plant";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no file was uploaded")]
    MissingFile,

    #[error("malformed upload: {0}")]
    Malformed(String),

    #[error("invalid upload: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to store upload: {0}")]
    Write(#[from] std::io::Error),
}

/// A staged upload on disk.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub file_name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Link under which the static file service exposes this upload.
    pub fn public_path(&self) -> String {
        format!("/uploads/{}", self.file_name)
    }
}

/// Hands out millisecond instants that never repeat and never go backwards,
/// even when the wall clock does.
#[derive(Debug, Default)]
pub struct MonotonicMillis {
    last: AtomicI64,
}

impl MonotonicMillis {
    pub fn next(&self) -> i64 {
        self.next_after(Utc::now().timestamp_millis())
    }

    fn next_after(&self, now: i64) -> i64 {
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

pub struct UploadStore {
    dir: PathBuf,
    max_size: usize,
    clock: MonotonicMillis,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_size,
            clock: MonotonicMillis::default(),
        }
    }

    /// Validates and writes one uploaded image, returning where it landed.
    pub async fn save(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<UploadRecord, UploadError> {
        if data.is_empty() {
            return Err(UploadError::MissingFile);
        }

        let mime_type = validate_image_upload(content_type, data, self.max_size)?;

        let millis = self.clock.next();
        let created_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now);
        let file_name = format!(
            "{}-{}{}",
            UPLOAD_PREFIX,
            millis,
            safe_extension(original_name.unwrap_or_default())
        );

        let dir = tokio::fs::canonicalize(&self.dir).await?;
        let path = dir.join(&file_name);

        // create_new: a name collision must never clobber an earlier upload
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        tracing::info!(
            file = %file_name,
            size = data.len(),
            mime = %mime_type,
            "📥 Upload staged"
        );

        Ok(UploadRecord {
            file_name,
            path,
            mime_type,
            size: data.len(),
            created_at,
        })
    }
}
