use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{Error, Result, http_status_error};
use crate::models::{Group, Package};
use crate::util::action_url;

/// Blocking CKAN action API client.
///
/// One instance is meant to live for the whole invocation; its connection
/// pool is shared by API calls and downloads.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    progress: bool,

    pub(crate) http: HttpClient,
}

/// Decoded CKAN reply envelope `{"success": ..., "result": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success(Value),
    /// `success` was false or missing, or the body was not JSON. Carries the
    /// raw body for diagnosis.
    Failure { action: String, body: String },
}

#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<Value>,
}

impl ActionOutcome {
    pub fn from_body(action: &str, body: &str) -> Self {
        match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope {
                success: Some(true),
                result,
            }) => Self::Success(result.unwrap_or(Value::Null)),
            _ => Self::Failure {
                action: action.to_string(),
                body: body.to_string(),
            },
        }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure { action, body } => Err(Error::Protocol { action, body }),
        }
    }
}

impl Client {
    /// Creates a client for the portal at `base_url` (e.g.
    /// `https://dadosabertos.capes.gov.br`). `timeout` is the total budget of
    /// every request, body included.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ckan-xlsx/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("ckan-xlsx")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            progress: true,
            http,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.base_url.clone(), settings.timeout)
    }

    /// Show a progress bar while downloading (default: on).
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn progress(&self) -> bool {
        self.progress
    }

    /// Calls `GET {base}/api/3/action/{action}` and returns the `result` field.
    pub fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = action_url(&self.base_url, action);
        tracing::debug!(%url, ?params, "CKAN action");

        let resp = self
            .http
            .get(&url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .map_err(|source| Error::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(http_status_error(status, &url, &text));
        }

        ActionOutcome::from_body(action, &text).into_result()
    }

    fn call_as<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T> {
        let value = self.call(action, params)?;
        serde_json::from_value(value).map_err(|e| Error::Protocol {
            action: action.to_string(),
            body: format!("unexpected result shape: {}", e),
        })
    }

    /// `package_show` for a dataset id or slug.
    pub fn package_show(&self, id_or_slug: &str) -> Result<Package> {
        self.call_as("package_show", &[("id", id_or_slug)])
    }

    /// `group_show` for a group id or slug.
    pub fn group_show(&self, id_or_slug: &str, include_datasets: bool) -> Result<Group> {
        let include = if include_datasets { "true" } else { "false" };
        self.call_as(
            "group_show",
            &[("id", id_or_slug), ("include_datasets", include)],
        )
    }
}
