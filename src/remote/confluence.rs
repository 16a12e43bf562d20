//! reqwest binding of [`SpaceService`] for Confluence-style wikis.
//!
//! Listing uses the JSON REST API. Exporting drives the server-side export
//! job the same way the web UI does: fetch the export form for its
//! `atl_token`, submit it, then poll the long-running task until it hands
//! out a download link.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{ExportFormat, ServiceError, SpacePage, SpaceService};

/// Default interval between export task status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Connect timeout for service calls.
const CONNECT_TIMEOUT_SECS: u64 = 30;

#[allow(clippy::expect_used)]
static ATL_TOKEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*\bname="atl_token"[^>]*>"#).expect("atl_token input regex is valid")
});

#[allow(clippy::expect_used)]
static ATL_TOKEN_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]*\bname="ajs-atl-token"[^>]*\bcontent="([^"]*)""#)
        .expect("atl_token meta regex is valid")
});

#[allow(clippy::expect_used)]
static VALUE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bvalue="([^"]*)""#).expect("value attribute regex is valid"));

#[allow(clippy::expect_used)]
static TASK_ID_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]*\bname="ajs-taskId"[^>]*\bcontent="([^"]+)""#)
        .expect("task id meta regex is valid")
});

#[allow(clippy::expect_used)]
static TASK_ID_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"taskId=(\d+)").expect("task id query regex is valid"));

#[allow(clippy::expect_used)]
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("href regex is valid"));

/// Basic-auth credentials for the service and the archive downloads.
#[derive(Clone)]
pub struct Credentials {
    /// Account name or e-mail.
    pub username: String,
    /// API token or password.
    pub token: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatus {
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    successful: bool,
    #[serde(default)]
    percentage_complete: u32,
    #[serde(default)]
    message: String,
}

/// Confluence REST/export client.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    poll_interval: Duration,
    export_timeout: Duration,
}

impl ConfluenceClient {
    /// Creates a client for the wiki rooted at `base_url`.
    ///
    /// `request_timeout` bounds every individual call and also how long an
    /// export job may run before [`ServiceError::ExportTimedOut`].
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidUrl`] for an unparsable base URL and
    /// [`ServiceError::Client`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        request_timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, ServiceError> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(concat!("space-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ServiceError::Client)?;

        Ok(Self {
            client,
            base_url,
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
            export_timeout: request_timeout,
        })
    }

    /// Overrides the export status poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the normalized base URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ServiceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|_| ServiceError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .send()
            .await
            .map_err(|e| ServiceError::request(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::status(url.as_str(), status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| ServiceError::request(url.as_str(), e))
    }

    async fn fetch_atl_token(
        &self,
        key: &str,
        format: ExportFormat,
    ) -> Result<Option<String>, ServiceError> {
        let form_path = format!("spaces/exportspace{}.action", format.as_str());
        let url = self.endpoint(&form_path, &[("key", key)])?;
        let page = self.get_text(url).await?;
        Ok(extract_atl_token(&page))
    }

    async fn submit_export(
        &self,
        key: &str,
        format: ExportFormat,
        atl_token: &str,
    ) -> Result<Option<String>, ServiceError> {
        let url = self.endpoint("spaces/doexportspace.action", &[("key", key)])?;
        let export_type = match format {
            ExportFormat::Html => "TYPE_HTML",
            ExportFormat::Xml => "TYPE_XML",
        };
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("atl_token", atl_token)
            .append_pair("exportType", export_type)
            .append_pair("contentOption", "all")
            .append_pair("includeComments", "true")
            .append_pair("confirm", "Export")
            .finish();

        let response = self
            .client
            .post(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("X-Atlassian-Token", "no-check")
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceError::request(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::status(url.as_str(), status.as_u16()));
        }
        // The task id shows up either in the final redirect URL or in the page.
        let final_url = response.url().to_string();
        let page = response
            .text()
            .await
            .map_err(|e| ServiceError::request(url.as_str(), e))?;
        Ok(extract_task_id(&page).or_else(|| extract_task_id(&final_url)))
    }

    async fn fetch_task_status(&self, task_id: &str) -> Result<TaskStatus, ServiceError> {
        let url = self.endpoint("plugins/servlet/longrunningtaskstatus", &[("taskId", task_id)])?;
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::request(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::status(url.as_str(), status.as_u16()));
        }
        response
            .json::<TaskStatus>()
            .await
            .map_err(|e| ServiceError::decode(url.as_str(), e.to_string()))
    }

    async fn wait_for_download_link(
        &self,
        key: &str,
        task_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        let started = Instant::now();
        let deadline = started + self.export_timeout;

        loop {
            let status = self.fetch_task_status(task_id).await?;
            if status.is_complete {
                if !status.successful {
                    warn!(space = key, message = %status.message, "export task finished unsuccessfully");
                    return Ok(None);
                }
                let Some(link) = extract_download_link(&status.message) else {
                    warn!(space = key, "export task finished without a download link");
                    return Ok(None);
                };
                let absolute = self
                    .base_url
                    .join(&link)
                    .map_err(|_| ServiceError::InvalidUrl { url: link.clone() })?;
                return Ok(Some(absolute.to_string()));
            }

            debug!(
                space = key,
                task_id,
                percent = status.percentage_complete,
                "export task in progress"
            );

            if Instant::now() + self.poll_interval > deadline {
                return Err(ServiceError::ExportTimedOut {
                    key: key.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl SpaceService for ConfluenceClient {
    #[instrument(skip(self))]
    async fn list_spaces(
        &self,
        start: usize,
        limit: usize,
        expand: &str,
    ) -> Result<SpacePage, ServiceError> {
        let start = start.to_string();
        let limit = limit.to_string();
        let url = self.endpoint(
            "rest/api/space",
            &[("start", &start), ("limit", &limit), ("expand", expand)],
        )?;
        let body = self.get_text(url.clone()).await?;
        serde_json::from_str(&body).map_err(|e| ServiceError::decode(url.as_str(), e.to_string()))
    }

    #[instrument(skip(self), fields(format = format.as_str()))]
    async fn get_space_export(
        &self,
        key: &str,
        format: ExportFormat,
    ) -> Result<Option<String>, ServiceError> {
        let Some(atl_token) = self.fetch_atl_token(key, format).await? else {
            warn!(space = key, "export form did not contain an atl_token");
            return Ok(None);
        };
        let Some(task_id) = self.submit_export(key, format, &atl_token).await? else {
            warn!(space = key, "export submission did not return a task id");
            return Ok(None);
        };
        debug!(space = key, task_id = %task_id, "export task started");
        self.wait_for_download_link(key, &task_id).await
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ServiceError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| ServiceError::InvalidUrl {
        url: raw.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceError::InvalidUrl {
            url: raw.to_string(),
        });
    }
    Ok(url)
}

fn extract_atl_token(page: &str) -> Option<String> {
    let from_input = ATL_TOKEN_INPUT
        .find(page)
        .and_then(|tag| VALUE_ATTR.captures(tag.as_str()))
        .map(|caps| caps[1].to_string());
    from_input
        .or_else(|| ATL_TOKEN_META.captures(page).map(|caps| caps[1].to_string()))
        .filter(|token| !token.is_empty())
}

fn extract_task_id(text: &str) -> Option<String> {
    TASK_ID_META
        .captures(text)
        .or_else(|| TASK_ID_QUERY.captures(text))
        .map(|caps| caps[1].to_string())
}

fn extract_download_link(message: &str) -> Option<String> {
    HREF_ATTR
        .captures(message)
        .map(|caps| caps[1].replace("&amp;", "&"))
}
