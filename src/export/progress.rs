//! Per-space outcomes and the run-level tally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Result of exporting one space. Produced exactly once per space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    key: String,
    artifact: Option<PathBuf>,
    from_cache: bool,
    attempts: u32,
    backoff: Duration,
    error: Option<String>,
}

impl ExportOutcome {
    /// Space served from the cache without any network call.
    #[must_use]
    pub fn cached(key: impl Into<String>, artifact: PathBuf) -> Self {
        Self {
            key: key.into(),
            artifact: Some(artifact),
            from_cache: true,
            attempts: 0,
            backoff: Duration::ZERO,
            error: None,
        }
    }

    /// Space freshly downloaded to `artifact`.
    #[must_use]
    pub fn downloaded(
        key: impl Into<String>,
        artifact: PathBuf,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            artifact: Some(artifact),
            from_cache: false,
            attempts,
            backoff,
            error: None,
        }
    }

    /// Space that could not be exported.
    #[must_use]
    pub fn failed(
        key: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            artifact: None,
            from_cache: false,
            attempts,
            backoff,
            error: Some(error.into()),
        }
    }

    /// The space key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the archive; present exactly when the export succeeded.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Whether the export succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.artifact.is_some()
    }

    /// Whether the archive came from the cache.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Download attempts made (0 for cache hits and pre-download failures).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total time spent sleeping between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Failure description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Final tally of a run. Immutable once returned by [`RunAggregator::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    succeeded: usize,
    failed: Vec<String>,
    interrupted: bool,
}

impl RunSummary {
    /// Number of spaces exported or served from the cache.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Keys that failed, in completion order.
    #[must_use]
    pub fn failed_keys(&self) -> &[String] {
        &self.failed
    }

    /// Number of failed spaces.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.len()
    }

    /// Spaces with an outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Whether the run stopped early on a user interrupt.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Consumes outcomes in completion order and drives the progress bar.
#[derive(Debug)]
pub struct RunAggregator {
    bar: ProgressBar,
    summary: RunSummary,
}

impl RunAggregator {
    /// Creates an aggregator for `total` spaces.
    ///
    /// The bar is hidden unless `show_progress` is set.
    #[must_use]
    pub fn new(total: usize, show_progress: bool) -> Self {
        let bar = if show_progress {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.set_message("Exporting spaces");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            summary: RunSummary::default(),
        }
    }

    /// Records one outcome.
    pub fn observe(&mut self, outcome: &ExportOutcome) {
        if outcome.succeeded() {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed.push(outcome.key().to_string());
        }
        self.bar.inc(1);
    }

    /// Marks the run as cut short by an interrupt.
    pub fn mark_interrupted(&mut self) {
        self.summary.interrupted = true;
    }

    /// Spaces observed so far.
    #[must_use]
    pub fn observed(&self) -> usize {
        self.summary.total()
    }

    /// Clears the bar, logs the tally and returns the summary.
    #[must_use]
    pub fn finalize(self) -> RunSummary {
        self.bar.finish_and_clear();
        let summary = self.summary;

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "export finished"
        );
        if !summary.failed.is_empty() {
            warn!(spaces = %summary.failed.join(", "), "failed to export spaces");
        }
        summary
    }
}
