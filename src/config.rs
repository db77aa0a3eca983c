use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE: &str = "https://dadosabertos.capes.gov.br";
pub const DEFAULT_DATASET: &str = "36d1c92c-f9e0-4da1-a4f0-633e6ebefe03";
pub const DEFAULT_GROUP: &str = "catalogo-de-teses-e-dissertacoes-brasil";
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_RETRY: u32 = 3;
pub const DEFAULT_SLEEP_SECS: f64 = 2.0;

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// CKAN portal root, without trailing slash.
    pub base_url: String,
    /// Dataset id or slug used by the dataset commands.
    pub dataset: String,
    /// Group id or slug used by `list-group`.
    pub group: String,
    /// Total budget for each HTTP request.
    pub timeout: Duration,
    /// Download attempts per resource.
    pub retry: u32,
    /// Pause between download attempts.
    pub sleep: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            group: DEFAULT_GROUP.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            retry: DEFAULT_RETRY,
            sleep: Duration::from_secs_f64(DEFAULT_SLEEP_SECS),
        }
    }
}

/// Values given explicitly on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub dataset: Option<String>,
    pub group: Option<String>,
    pub timeout_secs: Option<f64>,
    pub retry: Option<u32>,
    pub sleep_secs: Option<f64>,
}

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    base: Option<String>,
    dataset: Option<String>,
    group: Option<String>,
    timeout: Option<String>,
    retry: Option<String>,
    sleep: Option<String>,
}

/// Resolves settings from (in order of precedence):
/// - explicit overrides
/// - environment variables `CKAN_BASE`, `CKAN_DATASET_ID`, `CKAN_GROUP_ID`,
///   `TIMEOUT`, `RETRY`, `SLEEP_BETWEEN`
/// - a `.ckanrc` file (`CKAN_RC`, `./.ckanrc`, `~/.ckanrc`)
/// - built-in defaults
pub fn load_settings(overrides: Overrides) -> Result<Settings> {
    load_settings_from(overrides, |k| std::env::var(k).ok(), &rc_candidates())
}

pub(crate) fn load_settings_from<E>(
    overrides: Overrides,
    env: E,
    rc_candidates: &[PathBuf],
) -> Result<Settings>
where
    E: Fn(&str) -> Option<String>,
{
    let lookup = |k: &str| env(k).filter(|v| !v.trim().is_empty());

    let mut rc = RcConfig::default();
    for rc_path in rc_candidates {
        if rc_path.exists() {
            rc = read_rc(rc_path)?;
            tracing::debug!(path = %rc_path.display(), "loaded configuration file");
            break;
        }
    }

    let defaults = Settings::default();

    let base_url = overrides
        .base_url
        .or_else(|| lookup("CKAN_BASE"))
        .or(rc.base)
        .unwrap_or(defaults.base_url);
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        return Err(Error::Config("base URL is empty".into()));
    }

    let dataset = overrides
        .dataset
        .or_else(|| lookup("CKAN_DATASET_ID"))
        .or(rc.dataset)
        .unwrap_or(defaults.dataset);

    let group = overrides
        .group
        .or_else(|| lookup("CKAN_GROUP_ID"))
        .or(rc.group)
        .unwrap_or(defaults.group);

    let timeout = match overrides.timeout_secs {
        Some(v) => seconds("timeout", v)?,
        None => match lookup("TIMEOUT").or(rc.timeout) {
            Some(v) => seconds("timeout", parse_number("timeout", &v)?)?,
            None => defaults.timeout,
        },
    };

    let retry = match overrides.retry {
        Some(v) => v,
        None => match lookup("RETRY").or(rc.retry) {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::Config(format!("retry must be a whole number, got {:?}", v)))?,
            None => defaults.retry,
        },
    };

    let sleep = match overrides.sleep_secs {
        Some(v) => seconds("sleep", v)?,
        None => match lookup("SLEEP_BETWEEN").or(rc.sleep) {
            Some(v) => seconds("sleep", parse_number("sleep", &v)?)?,
            None => defaults.sleep,
        },
    };

    Ok(Settings {
        base_url,
        dataset,
        group,
        timeout,
        retry,
        sleep,
    })
}

fn parse_number(field: &str, v: &str) -> Result<f64> {
    v.trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{} must be a number of seconds, got {:?}", field, v)))
}

fn seconds(field: &str, v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v)
        .map_err(|_| Error::Config(format!("{} must be a non-negative number of seconds, got {}", field, v)))
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // Support formatting where `key:` is on one line and the value on the next.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !is_key_line(line) {
                set_rc(&mut cfg, pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                set_rc(&mut cfg, k, v);
            }
        }
    }

    cfg
}

// `base: https://...` contains a colon in the value too, so only a known key
// before the first colon marks a new entry.
fn is_key_line(line: &str) -> bool {
    line.split_once(':')
        .map(|(k, _)| {
            matches!(
                k.trim(),
                "base" | "dataset" | "group" | "timeout" | "retry" | "sleep"
            )
        })
        .unwrap_or(false)
}

fn set_rc(cfg: &mut RcConfig, key: &str, value: &str) {
    let value = Some(value.to_string());
    match key {
        "base" => cfg.base = value,
        "dataset" => cfg.dataset = value,
        "group" => cfg.group = value,
        "timeout" => cfg.timeout = value,
        "retry" => cfg.retry = value,
        "sleep" => cfg.sleep = value,
        _ => {}
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) CKAN_RC (explicit)
    // 2) ./.ckanrc
    // 3) ~/.ckanrc
    if let Ok(p) = std::env::var("CKAN_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".ckanrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".ckanrc"));
    }
    v
}
