//! Constants for the export module (timeouts, buffers, file names).

/// HTTP connect timeout for archive downloads (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default total per-request timeout (5 minutes for large archives).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Buffered writer capacity used while streaming archives to disk.
pub const CHUNK_SIZE: usize = 8192;

/// Name of the cache file kept inside the output directory.
pub const CACHE_FILE_NAME: &str = "export_cache.json";

/// Seconds in one cache bucket.
pub const SECONDS_PER_DAY: u64 = 86_400;
