use crate::config::{AppConfig, PLACEHOLDER_FILE};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Stylesheet seeded into `css/` when none exists.
pub const DEFAULT_STYLESHEET: &str = include_str!("../../assets/style.css");

#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub failed: Vec<PathBuf>,
    pub stylesheet_written: bool,
    pub placeholder_written: bool,
}

impl BootstrapReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn ensure_dir(path: PathBuf) -> Result<PathBuf, (PathBuf, std::io::Error)> {
    match tokio::fs::create_dir_all(&path).await {
        Ok(()) => Ok(path),
        Err(e) => Err((path, e)),
    }
}

/// Writes `contents` to `path` unless something is already there.
async fn seed_file(path: &Path, contents: &str) -> std::io::Result<bool> {
    if tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    tokio::fs::write(path, contents).await?;
    Ok(true)
}

/// Creates the public directory layout. Never fails: every problem is logged
/// and reported, and start-up carries on.
pub async fn prepare_public_dirs(config: &AppConfig) -> BootstrapReport {
    let dirs = vec![
        config.public_dir.clone(),
        config.uploads_dir(),
        config.css_dir(),
    ];

    let mut report = BootstrapReport::default();

    for result in join_all(dirs.into_iter().map(ensure_dir)).await {
        match result {
            Ok(path) => info!("📁 Directory ready: {}", path.display()),
            Err((path, e)) => {
                warn!(path = %path.display(), error = %e, "Failed to create directory");
                report.failed.push(path);
            }
        }
    }

    match seed_file(&config.css_dir().join("style.css"), DEFAULT_STYLESHEET).await {
        Ok(written) => report.stylesheet_written = written,
        Err(e) => warn!(error = %e, "Failed to write default stylesheet"),
    }

    match seed_file(&config.uploads_dir().join(PLACEHOLDER_FILE), "").await {
        Ok(written) => report.placeholder_written = written,
        Err(e) => warn!(error = %e, "Failed to write uploads placeholder"),
    }

    report
}
