use reqwest::Url;

/// Placeholder used when sanitizing leaves nothing behind.
pub(crate) const PLACEHOLDER_NAME: &str = "file";

pub(crate) fn action_url(base: &str, action: &str) -> String {
    format!("{}/api/3/action/{}", base.trim_end_matches('/'), action)
}

/// Last non-empty path segment of a URL. Not percent-decoded.
pub(crate) fn guess_filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decodes `%HH` escapes into raw bytes and reads the result as UTF-8.
///
/// Anything that is not a complete two-hex-digit escape is kept verbatim, and
/// malformed UTF-8 turns into U+FFFD, so this never fails.
pub fn pct_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

/// Restricts a name to characters that are safe on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if is_forbidden(c) {
            if !in_run {
                replaced.push('_');
            }
            in_run = true;
        } else {
            replaced.push(c);
            in_run = false;
        }
    }

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join("_");
    // "." and ".." name directories, not files.
    if collapsed.chars().all(|c| c == '.') {
        PLACEHOLDER_NAME.to_string()
    } else {
        collapsed
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Appends `suffix` unless `name` already ends with it (ignoring ASCII case).
pub(crate) fn ensure_suffix(name: String, suffix: &str) -> String {
    if name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        name
    } else {
        format!("{}{}", name, suffix)
    }
}
