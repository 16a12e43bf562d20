//! Export engine for concurrent space exports.
//!
//! This module provides the [`ExportEngine`], which runs one [`ExportTask`]
//! per space under a semaphore so at most `concurrency` exports are in
//! flight. Outcomes are observed in completion order while new spaces are
//! still being submitted.
//!
//! # Example
//!
//! ```no_run
//! use space_export_core::export::{ExportEngine, ExportTask, RunAggregator};
//! use space_export_core::remote::Space;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! # async fn example(task: ExportTask, spaces: Vec<Space>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ExportEngine::new(5)?;
//! let aggregator = RunAggregator::new(spaces.len(), false);
//! let interrupted = Arc::new(AtomicBool::new(false));
//! let summary = engine.run(spaces, Arc::new(task), aggregator, interrupted).await?;
//! println!("Succeeded: {}, Failed: {}", summary.succeeded(), summary.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::progress::{ExportOutcome, RunAggregator, RunSummary};
use super::task::ExportTask;
use crate::remote::Space;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// How long in-flight exports may keep running after an interrupt.
const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// Poll interval for the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Error type for export engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Bounded-concurrency runner for export tasks.
///
/// # Concurrency Model
///
/// - Each export runs in its own Tokio task
/// - A permit is acquired before a task is spawned and held for its whole life
/// - Submission waits for a free permit, so at most `concurrency` tasks exist
/// - Finished tasks are drained while submission is blocked
#[derive(Debug)]
pub struct ExportEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl ExportEngine {
    /// Creates an engine running at most `concurrency` exports at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating export engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Exports every space and returns the finalized summary.
    ///
    /// Once `interrupted` is set, no further spaces are submitted, running
    /// exports get a short grace period and whatever is still running is
    /// aborted. The summary is then marked interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual export failures never surface here; they are counted in
    /// the summary.
    #[instrument(skip_all, fields(spaces = spaces.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        spaces: Vec<Space>,
        task: Arc<ExportTask>,
        mut aggregator: RunAggregator,
        interrupted: Arc<AtomicBool>,
    ) -> Result<RunSummary, EngineError> {
        let mut tasks: JoinSet<ExportOutcome> = JoinSet::new();
        let mut keys: HashMap<Id, String> = HashMap::new();
        let mut stopped = false;

        info!("starting export run");

        let mut pending = spaces.into_iter();
        let mut next = pending.next();
        while let Some(space) = next.take() {
            if interrupted.load(Ordering::SeqCst) {
                stopped = true;
                break;
            }

            // Race the permit against finished tasks and the interrupt flag so
            // outcomes are reported while submission is blocked.
            tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => {
                    stopped = true;
                    break;
                }
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    record(joined, &mut keys, &mut aggregator);
                    next = Some(space);
                }
                permit = self.semaphore.clone().acquire_owned() => {
                    let permit = permit.map_err(|_| EngineError::SemaphoreClosed)?;
                    let task = Arc::clone(&task);
                    let key = space.key.clone();
                    let handle = tasks.spawn(async move {
                        // Permit is dropped when this block exits (RAII)
                        let _permit = permit;
                        task.run(&space).await
                    });
                    debug!(space = %key, "submitted export");
                    keys.insert(handle.id(), key);
                    next = pending.next();
                }
            }
        }

        debug!(in_flight = tasks.len(), "waiting for exports to complete");

        while !tasks.is_empty() && !stopped {
            tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => stopped = true,
                Some(joined) = tasks.join_next_with_id() => {
                    record(joined, &mut keys, &mut aggregator);
                }
            }
        }

        if stopped {
            aggregator.mark_interrupted();
            drain_with_grace(&mut tasks, &mut keys, &mut aggregator).await;
        }

        Ok(aggregator.finalize())
    }
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

async fn drain_with_grace(
    tasks: &mut JoinSet<ExportOutcome>,
    keys: &mut HashMap<Id, String>,
    aggregator: &mut RunAggregator,
) {
    if tasks.is_empty() {
        return;
    }
    warn!(
        in_flight = tasks.len(),
        grace_secs = INTERRUPT_GRACE.as_secs(),
        "interrupted, waiting for running exports"
    );

    let deadline = tokio::time::Instant::now() + INTERRUPT_GRACE;
    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
            Ok(Some(joined)) => record(joined, keys, aggregator),
            Ok(None) => return,
            Err(_) => break,
        }
    }

    let mut aborted: Vec<&str> = keys.values().map(String::as_str).collect();
    aborted.sort_unstable();
    warn!(spaces = %aborted.join(", "), "aborting unfinished exports");
    tasks.shutdown().await;
}

fn record(
    joined: Result<(Id, ExportOutcome), JoinError>,
    keys: &mut HashMap<Id, String>,
    aggregator: &mut RunAggregator,
) {
    match joined {
        Ok((id, outcome)) => {
            keys.remove(&id);
            aggregator.observe(&outcome);
        }
        Err(join_error) => {
            let key = keys
                .remove(&join_error.id())
                .unwrap_or_else(|| "<unknown>".to_string());
            warn!(space = %key, error = %join_error, "export task panicked");
            let outcome = ExportOutcome::failed(
                key,
                format!("task panic: {join_error}"),
                0,
                Duration::ZERO,
            );
            aggregator.observe(&outcome);
        }
    }
}
