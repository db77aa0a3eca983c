use std::collections::BTreeSet;

use crate::models::Resource;

/// True if the resource declares `wanted` as its format, or its URL ends with
/// `.{wanted}`. Both comparisons ignore ASCII case.
pub fn is_target_format(resource: &Resource, wanted: &str) -> bool {
    let wanted = wanted.trim().to_ascii_lowercase();
    if resource.format().to_ascii_lowercase() == wanted {
        return true;
    }
    let url = resource.effective_url().trim().to_ascii_lowercase();
    url.ends_with(&format!(".{}", wanted))
}

/// Optional format filter. An empty format matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatFilter {
    wanted: Option<String>,
}

impl FormatFilter {
    pub fn new(format: &str) -> Self {
        let f = format.trim().to_ascii_lowercase();
        Self {
            wanted: if f.is_empty() { None } else { Some(f) },
        }
    }

    pub fn any() -> Self {
        Self { wanted: None }
    }

    pub fn xlsx() -> Self {
        Self::new("xlsx")
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        match &self.wanted {
            Some(w) => is_target_format(resource, w),
            None => true,
        }
    }

    pub fn format(&self) -> Option<&str> {
        self.wanted.as_deref()
    }
}

/// Distinct declared formats, uppercased and sorted. Used to tell the operator
/// what a dataset offers when nothing matched.
pub fn formats_present(resources: &[Resource]) -> Vec<String> {
    resources
        .iter()
        .map(|r| r.format().to_uppercase())
        .filter(|f| !f.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(format: Option<&str>, url: Option<&str>) -> Resource {
        Resource {
            format: format.map(str::to_string),
            url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn matches_declared_format_ignoring_case() {
        assert!(is_target_format(&res(Some("XLSX"), None), "xlsx"));
        assert!(is_target_format(&res(Some(" xlsx "), None), "xlsx"));
        assert!(!is_target_format(&res(Some("CSV"), Some("https://x/a.csv")), "xlsx"));
    }

    #[test]
    fn matches_url_suffix_without_format() {
        assert!(is_target_format(&res(None, Some("https://x/B.XLSX")), "xlsx"));
        assert!(is_target_format(&res(Some(""), Some("https://x/b.xlsx")), "xlsx"));
        // .xls is a different format
        assert!(!is_target_format(&res(None, Some("https://x/b.xls")), "xlsx"));
    }

    #[test]
    fn download_url_is_considered() {
        let r = Resource {
            download_url: Some("https://x/dl/report.xlsx".into()),
            ..Default::default()
        };
        assert!(r.is_xlsx());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = FormatFilter::new("  ");
        assert_eq!(f, FormatFilter::any());
        assert!(f.matches(&res(None, None)));
        assert!(FormatFilter::new("CSV").matches(&res(Some("csv"), None)));
        assert!(!FormatFilter::xlsx().matches(&res(Some("csv"), None)));
    }

    #[test]
    fn formats_present_is_sorted_and_unique() {
        let rs = vec![
            res(Some("pdf"), None),
            res(Some("CSV"), None),
            res(Some("csv"), None),
            res(None, None),
        ];
        assert_eq!(formats_present(&rs), vec!["CSV", "PDF"]);
    }
}
