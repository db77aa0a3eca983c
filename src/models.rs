//! Subsets of the CKAN `package_show` / `group_show` payloads that this crate
//! reads. Unknown fields are ignored and every field is optional, since
//! portals routinely send `null` or leave things out.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl Resource {
    /// Name shown to the operator: name, else description, else id.
    pub fn display_name(&self) -> &str {
        self.label().unwrap_or("file")
    }

    /// Like [`Resource::display_name`], but `None` when the resource has no
    /// name, description or id at all.
    pub fn label(&self) -> Option<&str> {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.description))
            .or_else(|| non_empty(&self.id))
    }

    /// `url`, else `download_url`, else the empty string.
    pub fn effective_url(&self) -> &str {
        non_empty(&self.url)
            .or_else(|| non_empty(&self.download_url))
            .unwrap_or("")
    }

    /// Declared format with surrounding whitespace removed.
    pub fn format(&self) -> &str {
        self.format.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn is_xlsx(&self) -> bool {
        crate::filter::is_target_format(self, "xlsx")
    }
}

/// A dataset, as returned by `package_show`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resources: Vec<Resource>,
}

/// Dataset entry embedded in a `group_show` reply. Carries no resources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl PackageSummary {
    pub fn display_title(&self) -> &str {
        non_empty(&self.title)
            .or_else(|| non_empty(&self.name))
            .or_else(|| non_empty(&self.id))
            .unwrap_or("")
    }

    pub fn display_name(&self) -> &str {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.id))
            .unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Identifier used for the follow-up `package_show`: id, else name.
    pub fn lookup_key(&self) -> Option<&str> {
        non_empty(&self.id).or_else(|| non_empty(&self.name))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    packages: Vec<PackageSummary>,
    #[serde(default, deserialize_with = "null_as_empty")]
    datasets: Vec<PackageSummary>,
}

impl Group {
    /// Datasets of the group. Older CKAN versions use `datasets` instead of
    /// `packages`.
    pub fn datasets(&self) -> &[PackageSummary] {
        if self.packages.is_empty() {
            &self.datasets
        } else {
            &self.packages
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.trim().is_empty())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
