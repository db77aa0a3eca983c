use reqwest::Url;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};

use crate::util::{ensure_suffix, guess_filename_from_url, pct_decode, sanitize_filename};

pub(crate) const DEFAULT_SUFFIX: &str = ".xlsx";
pub(crate) const DEFAULT_FILENAME: &str = "file.xlsx";

/// Picks the local filename for a downloaded resource.
///
/// Precedence:
/// 1. `filename` / `filename*` from `Content-Disposition`
/// 2. last path segment of `final_url` (the URL after redirects), or of
///    `fallback_url` when the final URL is unknown
/// 3. `name_hint` with `.xlsx` appended
/// 4. `file.xlsx`
///
/// The result is always sanitized.
pub fn resolve_filename(
    headers: &HeaderMap,
    final_url: Option<&Url>,
    fallback_url: &str,
    name_hint: Option<&str>,
) -> String {
    if let Some(v) = headers.get(CONTENT_DISPOSITION) {
        let raw = String::from_utf8_lossy(v.as_bytes());
        if let Some(name) = content_disposition_filename(&raw) {
            return sanitize_filename(&pct_decode(&name));
        }
    }

    let segment = match final_url {
        Some(url) => guess_filename_from_url(url),
        None => Url::parse(fallback_url)
            .ok()
            .and_then(|url| guess_filename_from_url(&url)),
    };
    if let Some(segment) = segment {
        return sanitize_filename(&pct_decode(&segment));
    }

    if let Some(hint) = name_hint.filter(|h| !h.is_empty()) {
        return ensure_suffix(sanitize_filename(hint), DEFAULT_SUFFIX);
    }

    DEFAULT_FILENAME.to_string()
}

/// Extracts the first `filename=` or `filename*=` value from a
/// `Content-Disposition` header. The RFC 5987 `UTF-8''` tag and surrounding
/// quotes are stripped; the value is returned still percent-encoded.
pub(crate) fn content_disposition_filename(header: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `header`.
    let lower = header.to_ascii_lowercase();
    let bytes = header.as_bytes();
    let mut from = 0;

    while let Some(found) = lower[from..].find("filename") {
        let start = from + found;
        from = start + 1;

        let mut pos = start + "filename".len();
        if bytes.get(pos) == Some(&b'*') {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            continue;
        }
        pos += 1;
        if lower[pos..].starts_with("utf-8''") {
            pos += "utf-8''".len();
        }
        if bytes.get(pos) == Some(&b'"') {
            pos += 1;
        }

        let value: String = header[pos..]
            .chars()
            .take_while(|c| *c != '"' && *c != ';')
            .collect();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn headers(cd: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_DISPOSITION, HeaderValue::from_str(cd).unwrap());
        h
    }

    #[test]
    fn parses_common_content_disposition_forms() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="report 2024.xlsx""#).as_deref(),
            Some("report 2024.xlsx")
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=plain.xlsx").as_deref(),
            Some("plain.xlsx")
        );
        assert_eq!(
            content_disposition_filename("attachment; FILENAME*=UTF-8''Relat%C3%B3rio.xlsx")
                .as_deref(),
            Some("Relat%C3%B3rio.xlsx")
        );
        assert_eq!(content_disposition_filename("inline"), None);
        assert_eq!(content_disposition_filename(r#"attachment; filename="""#), None);
    }

    #[test]
    fn first_filename_token_wins() {
        let cd = r#"attachment; filename="a.xlsx"; filename*=UTF-8''b.xlsx"#;
        assert_eq!(content_disposition_filename(cd).as_deref(), Some("a.xlsx"));
    }

    #[test]
    fn content_disposition_beats_url_and_hint() {
        let name = resolve_filename(
            &headers("attachment; filename*=UTF-8''Dados%20Abertos.xlsx"),
            Some(&url("https://h/files/from-url.xlsx")),
            "https://h/original.xlsx",
            Some("hint"),
        );
        assert_eq!(name, "Dados_Abertos.xlsx");
    }

    #[test]
    fn final_url_beats_fallback_and_hint() {
        let name = resolve_filename(
            &HeaderMap::new(),
            Some(&url("https://cdn/x/Tabela%3A%202023.xlsx?sig=1")),
            "https://h/original.xlsx",
            Some("hint"),
        );
        assert_eq!(name, "Tabela__2023.xlsx");
    }

    #[test]
    fn fallback_url_used_without_final_url() {
        let name = resolve_filename(&HeaderMap::new(), None, "https://h/original.xlsx", None);
        assert_eq!(name, "original.xlsx");
    }

    #[test]
    fn hint_then_default() {
        let name = resolve_filename(&HeaderMap::new(), Some(&url("https://h/")), "https://h/", Some("Cursos: 2020"));
        assert_eq!(name, "Cursos__2020.xlsx");

        let name = resolve_filename(&HeaderMap::new(), Some(&url("https://h/")), "https://h/", Some("x.XLSX"));
        assert_eq!(name, "x.XLSX");

        let name = resolve_filename(&HeaderMap::new(), Some(&url("https://h/")), "https://h/", None);
        assert_eq!(name, DEFAULT_FILENAME);
    }

    #[test]
    fn dot_only_disposition_name_becomes_placeholder() {
        let name = resolve_filename(
            &headers(r#"attachment; filename="..""#),
            Some(&url("https://h/files/real.xlsx")),
            "https://h/files/real.xlsx",
            None,
        );
        assert_eq!(name, "file");
    }
}
