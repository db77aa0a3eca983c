use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the CKAN client, the downloader and the listing actions.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The connection broke while a response body was being read.
    #[error("reading response from {url} failed")]
    Stream {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for url ({url}){}", detail_suffix(.detail))]
    HttpStatus {
        status: StatusCode,
        url: String,
        detail: Option<String>,
    },

    /// CKAN answered, but the envelope was unsuccessful or malformed.
    #[error("CKAN action {action} failed: {body}")]
    Protocol { action: String, body: String },

    #[error("filesystem operation on {} failed", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV {}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write report")]
    Report(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the network or of the remote server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Stream { .. } | Self::HttpStatus { .. }
        )
    }

    /// The message followed by every underlying cause, joined with `: `.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(e) = cause {
            out.push_str(": ");
            out.push_str(&e.to_string());
            cause = std::error::Error::source(e);
        }
        out
    }

    /// Process exit code for an error that reached the top level.
    pub fn exit_code(&self) -> i32 {
        if self.is_transport() { 2 } else { 1 }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {}", d),
        _ => String::new(),
    }
}

/// The `error` object CKAN puts in failed action replies.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct CkanErrorBody {
    #[serde(default, rename = "__type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CkanErrorEnvelope {
    #[serde(default)]
    error: Option<CkanErrorBody>,
}

/// Builds an [`Error::HttpStatus`], pulling a readable detail out of the body
/// when it is a CKAN error envelope.
pub(crate) fn http_status_error(status: StatusCode, url: &str, body: &str) -> Error {
    let detail = serde_json::from_str::<CkanErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .and_then(|e| describe_ckan_error(&e));

    let detail = detail.or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            None
        } else {
            // Portals sometimes answer with a full HTML page.
            Some(trimmed.chars().take(200).collect())
        }
    });

    Error::HttpStatus {
        status,
        url: url.to_string(),
        detail,
    }
}

pub(crate) fn describe_ckan_error(e: &CkanErrorBody) -> Option<String> {
    match (e.kind.as_deref(), e.message.as_deref()) {
        (Some(kind), Some(msg)) => Some(format!("{}: {}", kind, msg)),
        (Some(kind), None) => Some(kind.to_string()),
        (None, Some(msg)) => Some(msg.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_error_uses_ckan_envelope() {
        let body = r#"{"success": false, "error": {"__type": "Not Found Error", "message": "Not found"}}"#;
        let err = http_status_error(StatusCode::NOT_FOUND, "http://x/api/3/action/package_show", body);
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found Error: Not found"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn http_status_error_truncates_plain_bodies() {
        let body = "x".repeat(1000);
        match http_status_error(StatusCode::BAD_GATEWAY, "http://x", &body) {
            Error::HttpStatus { detail, .. } => assert_eq!(detail.map(|d| d.len()), Some(200)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn causes_are_reported_once() {
        let err = Error::fs(
            "/tmp/out/a.xlsx",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "filesystem operation on /tmp/out/a.xlsx failed");
        assert_eq!(
            err.chain(),
            "filesystem operation on /tmp/out/a.xlsx failed: denied"
        );
        assert_eq!(err.chain().matches("denied").count(), 1);
    }

    #[test]
    fn chain_without_source_is_the_message() {
        let err = Error::Config("bad timeout".into());
        assert_eq!(err.chain(), err.to_string());
    }

    #[test]
    fn non_transport_errors_exit_with_one() {
        let err = Error::Protocol {
            action: "package_show".into(),
            body: "{}".into(),
        };
        assert!(!err.is_transport());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(Error::Config("bad".into()).exit_code(), 1);
    }
}
