//! Remote space service capability.
//!
//! The export engine never talks to a concrete REST client directly. It calls
//! the [`SpaceService`] trait, which any binding can satisfy:
//!
//! - [`SpaceService::list_spaces`] - one page of the space inventory
//! - [`SpaceService::get_space_export`] - a download URL for one space's archive
//!
//! [`ConfluenceClient`] is the reqwest-backed binding used by the CLI.

mod confluence;
mod error;

pub use confluence::{ConfluenceClient, Credentials};
pub use error::ServiceError;

use async_trait::async_trait;
use serde::Deserialize;

/// Kind of space as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// Shared team space.
    Global,
    /// A user's personal space.
    Personal,
    /// Any label this crate does not know about.
    Other,
}

impl SpaceKind {
    /// Parses a service label, ignoring case.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "global" => Self::Global,
            "personal" => Self::Personal,
            _ => Self::Other,
        }
    }
}

impl From<String> for SpaceKind {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// Lifecycle status of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceStatus {
    /// Active space. Also assumed when the service omits the field.
    #[default]
    Current,
    /// Archived, read-only space.
    Archived,
    /// Any label this crate does not know about.
    Other,
}

impl SpaceStatus {
    /// Parses a service label, ignoring case.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "current" => Self::Current,
            "archived" => Self::Archived,
            _ => Self::Other,
        }
    }
}

impl From<String> for SpaceStatus {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// One exportable space.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Space {
    /// Stable identifier, unique across the inventory.
    pub key: String,
    #[serde(default)]
    name: Option<String>,
    /// Personal vs shared.
    #[serde(rename = "type", deserialize_with = "deserialize_kind")]
    pub kind: SpaceKind,
    /// Active vs archived.
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: SpaceStatus,
}

fn deserialize_kind<'de, D>(deserializer: D) -> Result<SpaceKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SpaceKind::from)
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<SpaceStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.map_or(SpaceStatus::Current, SpaceStatus::from))
}

impl Space {
    /// Creates a space from its parts.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        kind: SpaceKind,
        status: SpaceStatus,
    ) -> Self {
        Self {
            key: key.into(),
            name: Some(name.into()),
            kind,
            status,
        }
    }

    /// Human-readable name, falling back to the key when the service sent none.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.key)
    }
}

/// One page of the space listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpacePage {
    /// Spaces on this page, in service order.
    #[serde(default)]
    pub results: Vec<Space>,
}

/// Archive format requested from the export endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Zipped static HTML site.
    #[default]
    Html,
    /// Zipped XML backup.
    Xml,
}

impl ExportFormat {
    /// Lowercase label used in endpoint paths and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Xml => "xml",
        }
    }

    /// File suffix for the downloaded archive.
    #[must_use]
    pub fn archive_extension(self) -> &'static str {
        match self {
            Self::Html => ".html.zip",
            Self::Xml => ".xml.zip",
        }
    }
}

/// Operations the export engine needs from the remote service.
///
/// This trait uses `async_trait` so the engine can hold an
/// `Arc<dyn SpaceService>`.
#[async_trait]
pub trait SpaceService: Send + Sync {
    /// Fetches one page of the space inventory.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the page cannot be fetched or decoded.
    async fn list_spaces(
        &self,
        start: usize,
        limit: usize,
        expand: &str,
    ) -> Result<SpacePage, ServiceError>;

    /// Requests an export of `key` and returns the URL of the finished archive.
    ///
    /// `Ok(None)` means the service had nothing to hand out for this space.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on transport or protocol failures.
    async fn get_space_export(
        &self,
        key: &str,
        format: ExportFormat,
    ) -> Result<Option<String>, ServiceError>;
}
