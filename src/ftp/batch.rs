//! Concurrent transfer coordinator — fans a batch of file operations out
//! across independent sessions and aggregates the results.
//!
//! One task, one session, one socket pair per file: tasks share the
//! host/credential/working-directory *values* but never a connection, so
//! no command/response stream is ever interleaved between transfers.
//! A file's failure is recorded against that file only and never aborts
//! its siblings; there are no retries.

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{FtpConnectionConfig, TransferDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Result of one file's worth of work inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    /// Local path (upload) or remote name (download).
    pub file: String,
    pub direction: TransferDirection,
    pub bytes: u64,
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    /// `None` on success; the recorded cause otherwise.
    pub error: Option<FtpError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate report for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Per-file outcomes, in input order.
    pub outcomes: Vec<TransferOutcome>,
    /// Bytes moved by the successful transfers.
    pub total_bytes: u64,
    /// Sum of the successful transfers' durations.
    pub total_transfer_time: Duration,
    /// Wall-clock time from batch start to the last task finishing.
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Total moved bytes as a human-readable string ("1.17 MB").
    pub fn total_size_display(&self) -> String {
        format_size(self.total_bytes)
    }
}

/// Format a byte count with binary-step units, two decimals.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in ["kB", "MB", "GB"] {
        if value <= 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}

/// Coordinates a batch of uploads or downloads over per-file sessions.
pub struct TransferBatch {
    config: FtpConnectionConfig,
    download_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl TransferBatch {
    /// Create a coordinator for the given endpoint. The shared working
    /// directory is `config.initial_directory`; every task restores it
    /// after connecting.
    pub fn new(config: FtpConnectionConfig) -> Self {
        Self {
            config,
            download_dir: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the local directory downloads are written into. The directory
    /// must already exist; the coordinator does not create it.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Token observed by every task; cancelling it aborts in-flight
    /// sessions at the next await point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all in-flight tasks of this batch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    // ─── Batch operations ────────────────────────────────────────

    /// Upload each local file concurrently, one fresh session per file.
    ///
    /// An empty input yields an empty report; per-file failures are
    /// recorded in the report, never returned as `Err`.
    pub async fn upload_all(&self, local_paths: &[PathBuf]) -> FtpResult<BatchReport> {
        log::info!(
            "uploading {} file(s) to {}:{}",
            local_paths.len(),
            self.config.host,
            self.config.port
        );

        let totals = BatchTotals::new();
        let batch_started = Instant::now();

        let handles: Vec<(String, JoinHandle<TransferOutcome>)> = local_paths
            .iter()
            .map(|path| {
                let label = path.display().to_string();
                let path = path.clone();
                let config = self.config.clone();
                let cancel = self.cancel.clone();
                let totals = totals.clone();
                let task_label = label.clone();
                let handle = tokio::spawn(async move {
                    run_task(task_label, TransferDirection::Upload, cancel, totals, {
                        let transfer_id = Uuid::new_v4().to_string();
                        run_upload(config, path, transfer_id)
                    })
                    .await
                });
                (label, handle)
            })
            .collect();

        Ok(self.collect(handles, TransferDirection::Upload, totals, batch_started)
            .await)
    }

    /// Download each remote file concurrently into the configured
    /// download directory, one fresh session per file.
    pub async fn download_all(&self, remote_names: &[String]) -> FtpResult<BatchReport> {
        let download_dir = self
            .download_dir
            .clone()
            .ok_or_else(|| FtpError::state("Download directory not configured"))?;

        log::info!(
            "downloading {} file(s) from {}:{}",
            remote_names.len(),
            self.config.host,
            self.config.port
        );

        let totals = BatchTotals::new();
        let batch_started = Instant::now();

        let handles: Vec<(String, JoinHandle<TransferOutcome>)> = remote_names
            .iter()
            .map(|remote| {
                let label = remote.clone();
                let remote = remote.clone();
                let local_path = download_dir.join(local_name_for(&remote));
                let config = self.config.clone();
                let cancel = self.cancel.clone();
                let totals = totals.clone();
                let task_label = label.clone();
                let handle = tokio::spawn(async move {
                    run_task(task_label, TransferDirection::Download, cancel, totals, {
                        let transfer_id = Uuid::new_v4().to_string();
                        run_download(config, remote, local_path, transfer_id)
                    })
                    .await
                });
                (label, handle)
            })
            .collect();

        Ok(self
            .collect(handles, TransferDirection::Download, totals, batch_started)
            .await)
    }

    /// Join every task (no early abort on failure) and build the report.
    async fn collect(
        &self,
        handles: Vec<(String, JoinHandle<TransferOutcome>)>,
        direction: TransferDirection,
        totals: BatchTotals,
        batch_started: Instant,
    ) -> BatchReport {
        let mut outcomes = Vec::with_capacity(handles.len());
        for (file, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(TransferOutcome {
                    file,
                    direction,
                    bytes: 0,
                    duration: Duration::ZERO,
                    started_at: Utc::now(),
                    error: Some(FtpError::io(format!("Transfer task failed: {}", e))),
                }),
            }
        }

        let report = BatchReport {
            outcomes,
            total_bytes: totals.bytes.load(Ordering::Relaxed),
            total_transfer_time: Duration::from_millis(totals.millis.load(Ordering::Relaxed)),
            elapsed: batch_started.elapsed(),
        };
        log::info!(
            "batch finished: {} ok, {} failed, {} in {:.2?}",
            report.succeeded(),
            report.failed(),
            report.total_size_display(),
            report.elapsed
        );
        report
    }
}

// ─── Per-task plumbing ───────────────────────────────────────────────

/// Cross-task aggregate counters; written by atomic add only, read once
/// after the whole batch has joined.
#[derive(Clone)]
struct BatchTotals {
    bytes: Arc<AtomicU64>,
    millis: Arc<AtomicU64>,
}

impl BatchTotals {
    fn new() -> Self {
        Self {
            bytes: Arc::new(AtomicU64::new(0)),
            millis: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Wrap one file's transfer future with timing, cancellation, and
/// outcome recording. Errors are converted into a failure outcome here;
/// nothing propagates to sibling tasks.
async fn run_task(
    file: String,
    direction: TransferDirection,
    cancel: CancellationToken,
    totals: BatchTotals,
    transfer: impl std::future::Future<Output = FtpResult<u64>>,
) -> TransferOutcome {
    let started_at = Utc::now();
    let started = Instant::now();

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FtpError::cancelled("Batch cancelled before completion")),
        r = transfer => r,
    };
    let duration = started.elapsed();

    match result {
        Ok(bytes) => {
            totals.bytes.fetch_add(bytes, Ordering::Relaxed);
            totals
                .millis
                .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
            TransferOutcome {
                file,
                direction,
                bytes,
                duration,
                started_at,
                error: None,
            }
        }
        Err(e) => {
            log::warn!("{:?} of {} failed: {}", direction, file, e);
            TransferOutcome {
                file,
                direction,
                bytes: 0,
                duration,
                started_at,
                error: Some(e),
            }
        }
    }
}

/// One upload: fresh session, shared working directory, guaranteed
/// teardown on every exit path.
async fn run_upload(
    config: FtpConnectionConfig,
    path: PathBuf,
    transfer_id: String,
) -> FtpResult<u64> {
    let directory = config.initial_directory.clone();
    let mut session = FtpSession::new(config);
    session.connect().await?;

    let result = async {
        session.cwd(&directory).await?;
        session.upload(&path, Some(&transfer_id)).await
    }
    .await;

    if session.is_connected() {
        let _ = session.disconnect().await;
    }
    result
}

/// One download; mirrors `run_upload`.
async fn run_download(
    config: FtpConnectionConfig,
    remote: String,
    local_path: PathBuf,
    transfer_id: String,
) -> FtpResult<u64> {
    let directory = config.initial_directory.clone();
    let mut session = FtpSession::new(config);
    session.connect().await?;

    let result = async {
        session.cwd(&directory).await?;
        session
            .download(&remote, &local_path, Some(&transfer_id))
            .await
    }
    .await;

    if session.is_connected() {
        let _ = session.disconnect().await;
    }
    result
}

/// Local file name for a downloaded remote path (last `/`-segment).
fn local_name_for(remote: &str) -> &str {
    remote.rsplit('/').next().unwrap_or(remote)
}
