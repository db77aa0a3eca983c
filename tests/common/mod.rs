#![allow(dead_code)]

use std::time::Duration;

use ckan_xlsx::Client;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A wiremock server standing in for a CKAN portal. The crate's client is
/// blocking, so the server's runtime is owned here instead of by the test.
pub struct MockCkan {
    // Dropped before the runtime.
    pub server: MockServer,
    rt: Runtime,
}

impl MockCkan {
    pub fn start() -> Self {
        let rt = Runtime::new().expect("tokio runtime");
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn client(&self) -> Client {
        Client::new(self.uri(), Duration::from_secs(5))
            .expect("client")
            .with_progress(false)
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn package(&self, id: &str, resources: Value) {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/api/3/action/package_show"))
                .and(query_param("id", id))
                .respond_with(ok(json!({
                    "id": id,
                    "name": id,
                    "title": format!("Dataset {}", id),
                    "resources": resources,
                }))),
        );
    }

    pub fn file(&self, file_path: &str, body: &[u8]) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(file_path))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec())),
        );
    }

    pub fn requests_to(&self, request_path: &str) -> usize {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

/// Successful CKAN envelope around `result`.
pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "help": "https://ckan.example/api/3/action/help_show",
        "success": true,
        "result": result,
    }))
}

pub fn ckan_error(status: u16, kind: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "help": "https://ckan.example/api/3/action/help_show",
        "success": false,
        "error": {"__type": kind, "message": message},
    }))
}

pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
