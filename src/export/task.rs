//! Per-space export: cache check, export request, download with retry, commit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::filename::artifact_path;
use super::progress::ExportOutcome;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::cache::{ExportCache, fingerprint};
use crate::remote::{ExportFormat, Space, SpaceService};

/// Everything one export needs, shared by all spawned tasks.
pub struct ExportTask {
    service: Arc<dyn SpaceService>,
    client: HttpClient,
    cache: Arc<ExportCache>,
    output_dir: PathBuf,
    format: ExportFormat,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for ExportTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportTask")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl ExportTask {
    /// Creates a task writing HTML archives into `output_dir` with the default retry policy.
    #[must_use]
    pub fn new(
        service: Arc<dyn SpaceService>,
        client: HttpClient,
        cache: Arc<ExportCache>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            client,
            cache,
            output_dir: output_dir.into(),
            format: ExportFormat::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Overrides the archive format.
    #[must_use]
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Exports one space. Never fails: every problem becomes a failed outcome.
    #[instrument(skip(self, space), fields(space = %space.key))]
    pub async fn run(&self, space: &Space) -> ExportOutcome {
        let fingerprint = fingerprint(&space.key, SystemTime::now());
        if let Some(artifact) = self.cache.lookup(&fingerprint).await {
            info!(path = %artifact.display(), "using cached export");
            return ExportOutcome::cached(&space.key, artifact);
        }

        info!(name = space.name(), "requesting export");
        let url = match self.service.get_space_export(&space.key, self.format).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                warn!("service returned no download URL");
                return ExportOutcome::failed(
                    &space.key,
                    "export produced no download URL",
                    0,
                    Duration::ZERO,
                );
            }
            Err(error) => {
                warn!(error = %error, "export request failed");
                return ExportOutcome::failed(&space.key, error.to_string(), 0, Duration::ZERO);
            }
        };

        let path = artifact_path(&self.output_dir, &space.key, space.name(), self.format);
        let mut attempt = 0_u32;
        let mut backoff = Duration::ZERO;

        loop {
            attempt += 1;
            debug!(attempt, url = %url, "attempting download");

            match self.client.download(&url, &path).await {
                Ok(bytes) => {
                    self.cache.commit(&fingerprint, &path).await;
                    info!(path = %path.display(), bytes, attempts = attempt, "export downloaded");
                    return ExportOutcome::downloaded(&space.key, path, attempt, backoff);
                }
                Err(error) => match self.retry_policy.should_retry(classify_error(&error), attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        warn!(
                            attempt = next_attempt,
                            max_attempts = self.retry_policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "retrying download"
                        );
                        tokio::time::sleep(delay).await;
                        backoff += delay;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        warn!(attempts = attempt, error = %error, %reason, "download failed");
                        return ExportOutcome::failed(&space.key, error.to_string(), attempt, backoff);
                    }
                },
            }
        }
    }
}
