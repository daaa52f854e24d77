//! Upload seam and retry driver.
//!
//! The engine hands every changed file to an [`Uploader`]. The shipped
//! [`SimulatedUploader`] only waits; a real transfer would implement the
//! same trait.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hc_core::{FileRecord, SyncConfig};
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::error::UploadError;

/// Transfers one file's content to the remote side.
///
/// Implementations must be cancel-safe: the engine drops the future when the
/// path is changed again, deleted, or the engine stops.
#[async_trait]
pub trait Uploader: Send + Sync + 'static {
    /// Uploads the file described by `record`.
    async fn upload(&self, record: &FileRecord) -> Result<(), UploadError>;
}

/// An uploader that sleeps for a fixed latency.
///
/// Failures can be injected for tests: the first `n` attempts fail with a
/// transient error.
///
/// # Examples
///
/// ```
/// use hc_sync::SimulatedUploader;
/// use std::time::Duration;
///
/// let uploader = SimulatedUploader::new(Duration::from_millis(10)).with_failures(2);
/// assert_eq!(uploader.attempts(), 0);
/// ```
#[derive(Debug)]
pub struct SimulatedUploader {
    latency: Duration,
    failures_left: AtomicU32,
    attempts: AtomicU64,
}

impl SimulatedUploader {
    /// Creates an uploader that takes `latency` per file.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self {
            latency,
            failures_left: AtomicU32::new(0),
            attempts: AtomicU64::new(0),
        }
    }

    /// Creates an uploader using the configured latency.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.upload_latency())
    }

    /// Makes the next `count` attempts fail.
    #[must_use]
    pub fn with_failures(self, count: u32) -> Self {
        self.failures_left.store(count, Ordering::Relaxed);
        self
    }

    /// Returns the number of upload attempts so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Uploader for SimulatedUploader {
    async fn upload(&self, record: &FileRecord) -> Result<(), UploadError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;

        let failed = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(UploadError::transient(&record.path, "injected failure"));
        }
        Ok(())
    }
}

/// How an upload with retries ended.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The upload succeeded.
    Uploaded,
    /// Every attempt failed, or the error was not retryable.
    Failed(UploadError),
    /// The cancellation token fired first.
    Cancelled,
}

/// Uploads `record`, retrying transient failures up to `max_retries` times.
///
/// Both the transfer and the delays between attempts observe `cancel`.
pub async fn upload_with_retry(
    uploader: &dyn Uploader,
    record: &FileRecord,
    backoff: Backoff,
    max_retries: u32,
    cancel: &CancellationToken,
) -> UploadOutcome {
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return UploadOutcome::Cancelled,
            result = uploader.upload(record) => result,
        };

        let error = match result {
            Ok(()) => return UploadOutcome::Uploaded,
            Err(error) => error,
        };

        if error.is_fatal() || attempt >= max_retries {
            return UploadOutcome::Failed(error);
        }

        let delay = backoff.delay(attempt);
        tracing::debug!(
            path = %record.path,
            error = %error,
            attempt = attempt + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Upload failed, retrying"
        );
        attempt += 1;

        tokio::select! {
            biased;
            () = cancel.cancelled() => return UploadOutcome::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use chrono::Utc;

    fn record() -> FileRecord {
        FileRecord::changed(Utf8PathBuf::from("/watch/a.txt"), Utc::now())
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    struct Rejecting;

    #[async_trait]
    impl Uploader for Rejecting {
        async fn upload(&self, record: &FileRecord) -> Result<(), UploadError> {
            Err(UploadError::rejected(&record.path, "quota exceeded"))
        }
    }

    #[tokio::test]
    async fn test_simulated_upload_succeeds() {
        let uploader = SimulatedUploader::new(Duration::from_millis(1));
        assert!(uploader.upload(&record()).await.is_ok());
        assert_eq!(uploader.attempts(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let uploader = SimulatedUploader::new(Duration::ZERO).with_failures(1);
        assert!(uploader.upload(&record()).await.is_err());
        assert!(uploader.upload(&record()).await.is_ok());
    }

    #[tokio::test]
    async fn test_retry_recovers_within_budget() {
        let uploader = SimulatedUploader::new(Duration::ZERO).with_failures(3);
        let cancel = CancellationToken::new();

        let outcome = upload_with_retry(&uploader, &record(), fast_backoff(), 3, &cancel).await;

        assert!(matches!(outcome, UploadOutcome::Uploaded));
        assert_eq!(uploader.attempts(), 4);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let uploader = SimulatedUploader::new(Duration::ZERO).with_failures(4);
        let cancel = CancellationToken::new();

        let outcome = upload_with_retry(&uploader, &record(), fast_backoff(), 3, &cancel).await;

        assert!(matches!(outcome, UploadOutcome::Failed(_)));
        assert_eq!(uploader.attempts(), 4);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_not_retried() {
        let cancel = CancellationToken::new();
        let outcome = upload_with_retry(&Rejecting, &record(), fast_backoff(), 3, &cancel).await;

        match outcome {
            UploadOutcome::Failed(e) => assert!(e.is_fatal()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_upload() {
        let uploader = SimulatedUploader::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = upload_with_retry(&uploader, &record(), fast_backoff(), 3, &cancel).await;
        assert!(matches!(outcome, UploadOutcome::Cancelled));
    }
}
