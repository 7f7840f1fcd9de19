use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Outcome of one pass over the uploads directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Age of a file in whole milliseconds. A timestamp in the future is age 0.
pub fn age_millis(now: SystemTime, modified: SystemTime) -> u128 {
    now.duration_since(modified)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Deletes uploads older than the retention threshold on a fixed interval.
pub struct RetentionSweeper {
    dir: PathBuf,
    placeholder: String,
    threshold: Duration,
    interval: Duration,
}

/// Owns the running sweep task; dropping it without `shutdown` detaches it.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the schedule and waits for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Retention sweeper task ended abnormally");
        }
    }
}

impl RetentionSweeper {
    pub fn new(
        dir: impl Into<PathBuf>,
        placeholder: impl Into<String>,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            placeholder: placeholder.into(),
            threshold,
            interval,
        }
    }

    /// Starts the recurring sweep on the current runtime.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SweeperHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            dir = %self.dir.display(),
            threshold_secs = self.threshold.as_secs(),
            interval_secs = self.interval.as_secs(),
            "🚀 Retention sweeper started"
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("🛑 Retention sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep(SystemTime::now()).await {
                        Ok(report) => tracing::info!(
                            scanned = report.scanned,
                            deleted = report.deleted,
                            skipped = report.skipped,
                            failed = report.failed,
                            "🧹 Upload sweep completed"
                        ),
                        Err(e) => tracing::error!(error = %e, "Upload sweep failed"),
                    }
                }
            }
        }
    }

    /// One pass over the directory, judged against `now`. Only a failure to
    /// list the directory is returned; per-entry failures are logged and
    /// counted.
    pub async fn sweep(&self, now: SystemTime) -> Result<SweepReport> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("reading {}", self.dir.display()))?;

        let threshold_ms = self.threshold.as_millis();
        let mut report = SweepReport::default();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(error = %e, "Failed to read uploads directory entry");
                    break;
                }
            };
            report.scanned += 1;

            if entry.file_name().to_str() == Some(self.placeholder.as_str()) {
                report.skipped += 1;
                continue;
            }

            let path = entry.path();
            match self.sweep_entry(&path, now, threshold_ms).await {
                Ok(true) => {
                    report.deleted += 1;
                    tracing::debug!(path = %path.display(), "Deleted expired upload");
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Failed to sweep upload");
                }
            }
        }

        Ok(report)
    }

    async fn sweep_entry(&self, path: &Path, now: SystemTime, threshold_ms: u128) -> Result<bool> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        if metadata.is_dir() {
            return Ok(false);
        }

        let age = age_millis(now, metadata.modified()?);
        if age <= threshold_ms {
            return Ok(false);
        }

        tokio::fs::remove_file(path).await?;
        Ok(true)
    }
}
