//! Work discovery: page through the space inventory and pick what to export.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::remote::{ServiceError, Space, SpaceKind, SpaceService, SpaceStatus};

/// Number of spaces requested per listing call.
pub const PAGE_SIZE: usize = 50;

/// Expansion requested on each listing call.
const LIST_EXPAND: &str = "description.plain";

/// Discovery failed; no partial inventory is returned.
#[derive(Debug, Error)]
#[error("failed to list spaces at offset {start}: {source}")]
pub struct DiscoveryError {
    /// Offset of the page that failed.
    pub start: usize,
    /// Underlying service error.
    #[source]
    pub source: ServiceError,
}

/// Which discovered spaces to export.
///
/// A non-empty `allow_list` wins over every other setting.
#[derive(Debug, Clone, Default)]
pub struct SpaceFilter {
    /// Export exactly these keys (in discovery order) when non-empty.
    pub allow_list: Vec<String>,
    /// Keep personal spaces.
    pub include_personal: bool,
    /// Keep archived spaces.
    pub include_archived: bool,
}

impl SpaceFilter {
    /// Filter that exports exactly the given keys.
    #[must_use]
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_list: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Applies the filter to a discovered inventory, preserving its order.
    #[must_use]
    pub fn apply(&self, inventory: Vec<Space>) -> Vec<Space> {
        if !self.allow_list.is_empty() {
            let wanted: HashSet<&str> = self.allow_list.iter().map(String::as_str).collect();
            let selected: Vec<Space> = inventory
                .into_iter()
                .filter(|space| wanted.contains(space.key.as_str()))
                .collect();

            let found: HashSet<&str> = selected.iter().map(|space| space.key.as_str()).collect();
            for missing in wanted.iter().filter(|key| !found.contains(*key)) {
                warn!(space = %missing, "requested space not found in inventory");
            }
            return selected;
        }

        inventory
            .into_iter()
            .filter(|space| self.include_personal || space.kind != SpaceKind::Personal)
            .filter(|space| self.include_archived || space.status != SpaceStatus::Archived)
            .collect()
    }
}

/// Lists the whole inventory and returns the spaces selected by `filter`.
///
/// Paging stops at the first empty page or the first page shorter than
/// [`PAGE_SIZE`].
///
/// # Errors
///
/// Returns [`DiscoveryError`] if any page fails. Discovery is not retried.
#[instrument(skip(service, filter))]
pub async fn discover_spaces(
    service: &dyn SpaceService,
    filter: &SpaceFilter,
) -> Result<Vec<Space>, DiscoveryError> {
    let inventory = list_all_spaces(service).await?;
    let total = inventory.len();
    info!(total, "found spaces");

    let selected = filter.apply(inventory);
    if filter.allow_list.is_empty() {
        info!(
            selected = selected.len(),
            total,
            include_personal = filter.include_personal,
            include_archived = filter.include_archived,
            "selected spaces for export"
        );
    } else {
        info!(
            selected = selected.len(),
            requested = filter.allow_list.len(),
            "selected requested spaces for export"
        );
    }
    Ok(selected)
}

async fn list_all_spaces(service: &dyn SpaceService) -> Result<Vec<Space>, DiscoveryError> {
    let mut spaces = Vec::new();
    let mut start = 0;

    loop {
        let page = service
            .list_spaces(start, PAGE_SIZE, LIST_EXPAND)
            .await
            .map_err(|source| DiscoveryError { start, source })?;
        let count = page.results.len();
        debug!(start, count, "fetched space page");

        spaces.extend(page.results);
        if count < PAGE_SIZE {
            break;
        }
        start += PAGE_SIZE;
    }

    Ok(spaces)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::remote::{ExportFormat, SpacePage};

    struct PagedService {
        spaces: Vec<Space>,
        calls: Mutex<Vec<(usize, usize)>>,
        fail_at: Option<usize>,
    }

    impl PagedService {
        fn new(spaces: Vec<Space>) -> Self {
            Self {
                spaces,
                calls: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl SpaceService for PagedService {
        async fn list_spaces(
            &self,
            start: usize,
            limit: usize,
            _expand: &str,
        ) -> Result<SpacePage, ServiceError> {
            self.calls.lock().unwrap().push((start, limit));
            if self.fail_at == Some(start) {
                return Err(ServiceError::status("https://wiki.test/rest/api/space", 500));
            }
            let results = self.spaces.iter().skip(start).take(limit).cloned().collect();
            Ok(SpacePage { results })
        }

        async fn get_space_export(
            &self,
            _key: &str,
            _format: ExportFormat,
        ) -> Result<Option<String>, ServiceError> {
            Ok(None)
        }
    }

    fn sample_spaces() -> Vec<Space> {
        vec![
            Space::new("A", "Alpha", SpaceKind::Global, SpaceStatus::Current),
            Space::new("B", "Bob's space", SpaceKind::Personal, SpaceStatus::Current),
            Space::new("C", "Charlie", SpaceKind::Global, SpaceStatus::Archived),
        ]
    }

    fn keys(spaces: &[Space]) -> Vec<&str> {
        spaces.iter().map(|space| space.key.as_str()).collect()
    }

    fn numbered_spaces(count: usize) -> Vec<Space> {
        (0..count)
            .map(|i| {
                Space::new(
                    format!("S{i}"),
                    format!("Space {i}"),
                    SpaceKind::Global,
                    SpaceStatus::Current,
                )
            })
            .collect()
    }

    #[test]
    fn test_default_filter_excludes_personal_and_archived() {
        let selected = SpaceFilter::default().apply(sample_spaces());
        assert_eq!(keys(&selected), vec!["A"]);
    }

    #[test]
    fn test_include_flags_keep_personal_and_archived() {
        let filter = SpaceFilter {
            include_personal: true,
            include_archived: true,
            ..SpaceFilter::default()
        };
        let selected = filter.apply(sample_spaces());
        assert_eq!(keys(&selected), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_allow_list_wins_over_kind_and_status() {
        let selected = SpaceFilter::only(["C", "B"]).apply(sample_spaces());
        // discovery order, not allow-list order
        assert_eq!(keys(&selected), vec!["B", "C"]);
    }

    #[test]
    fn test_allow_list_ignores_unknown_keys() {
        let selected = SpaceFilter::only(["B", "ZZZ"]).apply(sample_spaces());
        assert_eq!(keys(&selected), vec!["B"]);
    }

    #[tokio::test]
    async fn test_discover_stops_on_short_page() {
        let service = PagedService::new(numbered_spaces(120));
        let spaces = discover_spaces(&service, &SpaceFilter::default())
            .await
            .unwrap();

        assert_eq!(spaces.len(), 120);
        let calls = service.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(0, 50), (50, 50), (100, 50)]);
    }

    #[tokio::test]
    async fn test_discover_stops_on_empty_page_after_full_page() {
        let service = PagedService::new(numbered_spaces(50));
        let spaces = discover_spaces(&service, &SpaceFilter::default())
            .await
            .unwrap();

        assert_eq!(spaces.len(), 50);
        assert_eq!(service.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_discover_page_failure_aborts_without_partial_inventory() {
        let mut service = PagedService::new(numbered_spaces(75));
        service.fail_at = Some(50);

        let error = discover_spaces(&service, &SpaceFilter::default())
            .await
            .unwrap_err();
        assert_eq!(error.start, 50);
        assert!(error.to_string().contains("offset 50"));
    }

    #[tokio::test]
    async fn test_discover_applies_filter_to_every_page() {
        let service = PagedService::new(sample_spaces());
        let spaces = discover_spaces(&service, &SpaceFilter::only(["B", "C"]))
            .await
            .unwrap();
        assert_eq!(keys(&spaces), vec!["B", "C"]);
    }
}
