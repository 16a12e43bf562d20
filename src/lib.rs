//! Space Export Core Library
//!
//! This library provides the core functionality for the space-export tool,
//! which bulk-exports the spaces of a Confluence-style wiki to local
//! archive files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`remote`] - The [`SpaceService`] capability and its REST binding
//! - [`discovery`] - Paginated space inventory and filtering
//! - [`cache`] - Persistent per-day export cache
//! - [`export`] - Concurrent export engine with streaming downloads and retry

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod discovery;
pub mod export;
pub mod remote;

// Re-export commonly used types
pub use cache::{CacheError, ExportCache, fingerprint};
pub use discovery::{DiscoveryError, PAGE_SIZE, SpaceFilter, discover_spaces};
pub use export::{
    DEFAULT_CONCURRENCY, DownloadError, EngineError, ExportEngine, ExportOutcome, ExportTask,
    HttpClient, RetryPolicy, RunAggregator, RunSummary,
};
pub use remote::{
    ConfluenceClient, Credentials, ExportFormat, ServiceError, Space, SpaceKind, SpacePage,
    SpaceService, SpaceStatus,
};
