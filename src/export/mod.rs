//! Concurrent export-and-download engine.
//!
//! This module turns a list of discovered spaces into archives on disk:
//! each space is checked against the cache, exported through the remote
//! service, streamed to a file with retry, and recorded in the cache.
//!
//! # Features
//!
//! - Bounded concurrency with a semaphore (1-100, default 5)
//! - Streaming downloads through an 8 KiB buffered writer
//! - Truncated transfers detected against the declared content length
//! - Exponential backoff (10 s, 20 s) for failed attempts
//! - Completion-order progress and a partial-failure summary
//!
//! # Example
//!
//! ```no_run
//! use space_export_core::export::HttpClient;
//! use space_export_core::remote::Credentials;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(Credentials::new("me", "token"), Duration::from_secs(300), false)?;
//! let bytes = client
//!     .download("https://wiki.example.com/download/temp/DOCS.zip", Path::new("./DOCS.html.zip"))
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod filename;
mod progress;
mod retry;
mod task;

pub use client::HttpClient;
pub use engine::{DEFAULT_CONCURRENCY, EngineError, ExportEngine};
pub use error::DownloadError;
pub use filename::{artifact_filename, artifact_path, sanitize_name};
pub use progress::{ExportOutcome, RunAggregator, RunSummary};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use task::ExportTask;
