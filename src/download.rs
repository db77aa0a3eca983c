use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::client::Client;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::filename::resolve_filename;

/// Size of each read from the response body.
pub const CHUNK_SIZE: usize = 1024 * 1024;

const MIB: f64 = 1_048_576.0;

/// Outcome of one successful download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl DownloadResult {
    pub fn mib(&self) -> f64 {
        self.bytes as f64 / MIB
    }

    pub fn throughput_mib_s(&self) -> f64 {
        self.mib() / self.elapsed.as_secs_f64().max(1e-6)
    }
}

/// Fixed-delay retry: up to `max_attempts` tries, sleeping `backoff` between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.retry, settings.sleep)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `op` until it succeeds or the attempts run out, returning the last
    /// error in that case. `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, target: &str, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        self.run_with_sleep(target, op, thread::sleep)
    }

    pub(crate) fn run_with_sleep<T, F, S>(&self, target: &str, mut op: F, mut sleep: S) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    tracing::warn!(
                        "[attempt {}/{}] error downloading {}: {}",
                        attempt,
                        self.max_attempts,
                        target,
                        e.chain()
                    );
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    sleep(self.backoff);
                    attempt += 1;
                }
            }
        }
    }
}

impl Client {
    /// Streams `url` into `dest_dir`, in a single attempt.
    ///
    /// Bytes go to `<name>.part` first, which is renamed over `<name>` once the
    /// body is complete. An existing file with the same name is replaced. If
    /// the transfer breaks, the `.part` file stays behind.
    pub fn download(&self, url: &str, dest_dir: &Path, name_hint: Option<&str>) -> Result<DownloadResult> {
        std::fs::create_dir_all(dest_dir).map_err(|e| Error::fs(dest_dir, e))?;

        let mut resp = self
            .http
            .get(url)
            .timeout(self.timeout())
            .send()
            .map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status,
                url: url.to_string(),
                detail: None,
            });
        }

        let final_url = resp.url().clone();
        let filename = resolve_filename(resp.headers(), Some(&final_url), url, name_hint);
        let out_path = dest_dir.join(&filename);
        let tmp_path = dest_dir.join(format!("{}.part", filename));
        let total = resp.content_length().filter(|n| *n > 0);

        tracing::debug!(%url, %final_url, file = %out_path.display(), ?total, "downloading");

        let pb = match total {
            Some(len) if self.progress() => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::with_template(
                        "{msg} {percent:>3}% {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
                );
                pb.set_message(filename.clone());
                Some(pb)
            }
            _ => None,
        };

        let started = Instant::now();
        let mut out = File::create(&tmp_path).map_err(|e| Error::fs(&tmp_path, e))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    if let Some(pb) = &pb {
                        pb.abandon();
                    }
                    return Err(Error::Stream {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            out.write_all(&buf[..n]).map_err(|e| Error::fs(&tmp_path, e))?;
            written += n as u64;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }

        out.flush().map_err(|e| Error::fs(&tmp_path, e))?;
        drop(out);
        std::fs::rename(&tmp_path, &out_path).map_err(|e| Error::fs(&out_path, e))?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        let result = DownloadResult {
            path: out_path,
            bytes: written,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            "saved {} ({:.2} MiB in {:.1}s, {:.2} MiB/s)",
            result.path.display(),
            result.mib(),
            result.elapsed.as_secs_f64(),
            result.throughput_mib_s()
        );
        Ok(result)
    }

    /// [`Client::download`] wrapped in `policy`.
    pub fn download_with_retry(
        &self,
        url: &str,
        dest_dir: &Path,
        name_hint: Option<&str>,
        policy: &RetryPolicy,
    ) -> Result<DownloadResult> {
        policy.run(url, |_| self.download(url, dest_dir, name_hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn http_err() -> Error {
        Error::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            url: "https://h/f.xlsx".into(),
            detail: None,
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(4, Duration::from_secs(7));
        let mut failures = 0;
        let mut sleeps = Vec::new();

        let out = policy.run_with_sleep(
            "https://h/f.xlsx",
            |attempt| {
                if attempt < 3 {
                    failures += 1;
                    Err(http_err())
                } else {
                    Ok(attempt)
                }
            },
            |d| sleeps.push(d),
        );

        assert_eq!(out.unwrap(), 3);
        assert_eq!(failures, 2);
        assert_eq!(sleeps, vec![Duration::from_secs(7); 2]);
    }

    #[test]
    fn returns_last_error_after_all_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let mut calls = 0;
        let mut sleeps = 0;

        let out: Result<()> = policy.run_with_sleep(
            "https://h/f.xlsx",
            |attempt| {
                calls += 1;
                Err(Error::Config(format!("failure {}", attempt)))
            },
            |_| sleeps += 1,
        );

        match out {
            Err(Error::Config(msg)) => assert_eq!(msg, "failure 3"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls, 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);

        let mut sleeps = 0;
        let out: Result<()> = policy.run_with_sleep("u", |_| Err(http_err()), |_| sleeps += 1);
        assert!(out.is_err());
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn throughput_is_finite_for_instant_downloads() {
        let r = DownloadResult {
            path: PathBuf::from("x.xlsx"),
            bytes: 2 * 1_048_576,
            elapsed: Duration::ZERO,
        };
        assert_eq!(r.mib(), 2.0);
        assert!(r.throughput_mib_s().is_finite());
    }
}
