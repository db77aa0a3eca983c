//! The three user-facing operations. Report lines go to the supplied writer;
//! per-item failures are logged, reported and skipped.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::client::Client;
use crate::download::{DownloadResult, RetryPolicy};
use crate::error::{Error, Result};
use crate::export::{CsvRow, write_csv};
use crate::filter::{FormatFilter, formats_present};
use crate::models::Resource;

/// `writeln!` into the report writer, failing with [`Error::Report`].
macro_rules! report {
    ($out:expr, $($arg:tt)*) => {
        writeln!($out, $($arg)*).map_err(Error::Report)
    };
}

/// A resource whose download failed on every attempt.
#[derive(Debug, Clone)]
pub struct FailedDownload {
    pub name: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub downloaded: Vec<DownloadResult>,
    pub failed: Vec<FailedDownload>,
    /// Ids of matching resources that had no URL.
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
pub struct GroupListing {
    pub rows: Vec<CsvRow>,
    /// Datasets whose resources could not be fetched.
    pub failed_datasets: Vec<String>,
    /// Where the CSV went, if one was written.
    pub exported: Option<PathBuf>,
}

fn report_no_match(out: &mut impl Write, resources: &[Resource]) -> Result<()> {
    let formats = formats_present(resources);
    let formats = if formats.is_empty() {
        "(none)".to_string()
    } else {
        formats.join(", ")
    };
    report!(out, "No XLSX resources found. Formats available: {}", formats)?;
    Ok(())
}

/// Lists the XLSX resources of a dataset.
pub fn list_dataset(client: &Client, dataset: &str, out: &mut impl Write) -> Result<Vec<Resource>> {
    let package = client.package_show(dataset)?;
    let filter = FormatFilter::xlsx();
    let matches: Vec<Resource> = package
        .resources
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();

    if matches.is_empty() {
        report_no_match(out, &package.resources)?;
        return Ok(matches);
    }

    report!(out, "XLSX resources found for dataset {}:\n", dataset)?;
    for r in &matches {
        report!(out, "- {}", r.display_name())?;
        report!(out, "  {}\n", r.effective_url())?;
    }
    Ok(matches)
}

/// Downloads every XLSX resource of a dataset into `out_dir`.
///
/// Only the initial `package_show` can fail the call; download failures are
/// collected in the summary.
pub fn download_dataset(
    client: &Client,
    dataset: &str,
    out_dir: &Path,
    policy: &RetryPolicy,
    out: &mut impl Write,
) -> Result<DownloadSummary> {
    report!(out, "Querying package_show for dataset: {}", dataset)?;
    let package = client.package_show(dataset)?;
    let filter = FormatFilter::xlsx();
    let matches: Vec<&Resource> = package.resources.iter().filter(|r| filter.matches(r)).collect();

    let mut summary = DownloadSummary::default();
    if matches.is_empty() {
        report_no_match(out, &package.resources)?;
        return Ok(summary);
    }

    let out_dir = std::path::absolute(out_dir).map_err(|e| Error::fs(out_dir, e))?;
    std::fs::create_dir_all(&out_dir).map_err(|e| Error::fs(&out_dir, e))?;
    report!(
        out,
        "Found {} XLSX resources. Output directory: {}",
        matches.len(),
        out_dir.display()
    )?;

    let total = matches.len();
    for (i, r) in matches.into_iter().enumerate() {
        let i = i + 1;
        let url = r.effective_url();
        let name = r
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| format!("file_{}.xlsx", i));

        if url.is_empty() {
            report!(out, "[{}] Resource without URL, skipping: {}", i, r.id())?;
            tracing::warn!(resource = %name, id = r.id(), "resource has no URL");
            summary.skipped.push(r.id().to_string());
            continue;
        }

        report!(out, "\n[{}/{}] {}", i, total, name)?;
        report!(out, "URL: {}", url)?;

        match client.download_with_retry(url, &out_dir, Some(name.as_str()), policy) {
            Ok(result) => {
                report!(
                    out,
                    "✓ Saved: {}  ({:.2} MiB in {:.1}s, {:.2} MiB/s)",
                    result.path.display(),
                    result.mib(),
                    result.elapsed.as_secs_f64(),
                    result.throughput_mib_s()
                )?;
                summary.downloaded.push(result);
            }
            Err(e) => {
                let reason = e.chain();
                report!(out, "Failed: {}", reason)?;
                tracing::error!(resource = %name, %url, error = %reason, "download failed");
                summary.failed.push(FailedDownload {
                    name,
                    url: url.to_string(),
                    reason,
                });
            }
        }
    }

    report!(out, "\nDone.")?;
    Ok(summary)
}

/// Lists the datasets of a group with their resources, optionally filtered by
/// format and exported to CSV.
pub fn list_group(
    client: &Client,
    group: &str,
    filter: &FormatFilter,
    csv_path: Option<&Path>,
    out: &mut impl Write,
) -> Result<GroupListing> {
    let group = client.group_show(group, true)?;
    let datasets = group.datasets();

    let mut listing = GroupListing::default();
    if datasets.is_empty() {
        report!(out, "No datasets found in group.")?;
        return Ok(listing);
    }

    let total = datasets.len();
    for (i, ds) in datasets.iter().enumerate() {
        report!(
            out,
            "\n[{}/{}] Dataset: {} ({})",
            i + 1,
            total,
            ds.display_title(),
            ds.display_name()
        )?;

        let Some(key) = ds.lookup_key() else {
            report!(out, "  ! Dataset has neither id nor name, skipping")?;
            tracing::warn!(position = i + 1, "group dataset without id or name");
            continue;
        };

        let package = match client.package_show(key) {
            Ok(p) => p,
            Err(e) => {
                let reason = e.chain();
                report!(out, "  ! Failed to fetch resources: {}", reason)?;
                tracing::warn!(dataset = key, error = %reason, "skipping dataset");
                listing.failed_datasets.push(key.to_string());
                continue;
            }
        };

        if package.resources.is_empty() {
            report!(out, "  (no resources)")?;
            continue;
        }

        for r in package.resources.iter().filter(|r| filter.matches(r)) {
            report!(
                out,
                "  - {}  |  format={}  |  url={}",
                r.display_name(),
                r.format(),
                r.effective_url()
            )?;
            listing.rows.push(CsvRow::new(ds, r));
        }
    }

    if let Some(path) = csv_path {
        if listing.rows.is_empty() {
            report!(out, "\nNothing to export; check the --format filter.")?;
        } else {
            write_csv(path, &listing.rows)?;
            report!(out, "\n✓ Exported CSV: {}", path.display())?;
            listing.exported = Some(path.to_path_buf());
        }
    }

    Ok(listing)
}
