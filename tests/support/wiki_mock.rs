//! Mounts the listing and export endpoints of a wiki on a wiremock server.

#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "jdoe@example.com";
pub const TOKEN: &str = "api-token";

/// One space served by the mock.
pub struct MockSpace {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: &'static str,
    pub status: &'static str,
}

impl MockSpace {
    pub const fn global(key: &'static str, name: &'static str) -> Self {
        Self {
            key,
            name,
            kind: "global",
            status: "current",
        }
    }
}

/// Base URL the client should be pointed at.
pub fn wiki_base(server: &MockServer) -> String {
    format!("{}/wiki", server.uri())
}

/// Serves `spaces` as a single listing page.
pub async fn mount_space_listing(server: &MockServer, spaces: &[MockSpace]) {
    let results: Vec<_> = spaces
        .iter()
        .map(|space| {
            json!({
                "id": 1,
                "key": space.key,
                "name": space.name,
                "type": space.kind,
                "status": space.status,
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/space"))
        .and(query_param("start", "0"))
        .and(query_param("limit", "50"))
        .and(query_param("expand", "description.plain"))
        .and(basic_auth(USERNAME, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": results,
            "start": 0,
            "limit": 50,
            "size": spaces.len(),
        })))
        .mount(server)
        .await;
}

/// Serves the full export flow for `key`; the archive itself is mounted separately.
///
/// Returns the archive path the task status points at.
pub async fn mount_export_flow(server: &MockServer, key: &str, task_id: u32) -> String {
    let archive_path = format!("/wiki/download/temp/{key}-{task_id}.zip");

    Mock::given(method("GET"))
        .and(path("/wiki/spaces/exportspacehtml.action"))
        .and(query_param("key", key))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><form><input type="hidden" name="atl_token" value="token-{key}"></form></html>"#
        )))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/wiki/spaces/doexportspace.action"))
        .and(query_param("key", key))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><head><meta name="ajs-taskId" content="{task_id}"></head></html>"#
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wiki/plugins/servlet/longrunningtaskstatus"))
        .and(query_param("taskId", task_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isComplete": true,
            "successful": true,
            "percentageComplete": 100,
            "message": format!(r#"Export complete. <a href="{archive_path}">Download</a>"#),
        })))
        .mount(server)
        .await;

    archive_path
}

/// Serves `body` at `archive_path` with the given status.
pub async fn mount_archive(server: &MockServer, archive_path: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(archive_path))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}
