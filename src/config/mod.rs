use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the sentinel file that keeps the uploads directory under version control.
pub const PLACEHOLDER_FILE: &str = ".gitkeep";

/// Retention thresholds below this are rejected so a sweep can never race a
/// request that is still writing its upload.
pub const MIN_RETENTION: Duration = Duration::from_secs(60);

/// Runtime configuration for the service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Gemini API credential (required)
    pub api_key: String,

    /// Listen port (default: 3000)
    pub port: u16,

    /// Static asset root; uploads and css live below it (default: "public")
    pub public_dir: PathBuf,

    /// Gemini model id (default: "gemini-1.5-flash")
    pub model: String,

    /// Gemini REST base URL
    pub api_base: String,

    /// Timeout for a single analysis call (default: 30s)
    pub analysis_timeout: Duration,

    /// Maximum accepted upload size in bytes (default: 10 MB)
    pub max_upload_bytes: usize,

    /// Age after which an upload is swept (default: 1 hour)
    pub retention: Duration,

    /// Time between sweeps (default: 1 hour)
    pub sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            port: 3000,
            public_dir: PathBuf::from("public"),
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            analysis_timeout: Duration::from_secs(30),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MB
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let api_key = lookup("GEMINI_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("GEMINI_API_KEY must be set"))?;

        let retention = parsed("RETENTION_SECS")
            .map(Duration::from_secs)
            .unwrap_or(default.retention);
        if retention < MIN_RETENTION {
            return Err(anyhow!(
                "RETENTION_SECS must be at least {} seconds",
                MIN_RETENTION.as_secs()
            ));
        }

        Ok(Self {
            api_key,

            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.port),

            public_dir: lookup("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.public_dir),

            model: lookup("GEMINI_MODEL").unwrap_or(default.model),

            api_base: lookup("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.api_base),

            analysis_timeout: parsed("ANALYSIS_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(default.analysis_timeout),

            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.max_upload_bytes),

            retention,

            sweep_interval: parsed("SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(default.sweep_interval),
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join("uploads")
    }

    pub fn css_dir(&self) -> PathBuf {
        self.public_dir.join("css")
    }

    /// Config for tests and local runs against a stubbed analyzer.
    pub fn development(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: "development".to_string(),
            public_dir: public_dir.into(),
            ..Self::default()
        }
    }
}
