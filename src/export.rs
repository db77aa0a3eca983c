use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{PackageSummary, Resource};

/// One matched resource of a group listing, flattened for CSV export.
/// Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub dataset_title: String,
    pub dataset_name: String,
    pub dataset_id: String,
    pub resource_name: String,
    pub resource_format: String,
    pub resource_url: String,
    pub resource_id: String,
}

pub const CSV_HEADER: [&str; 7] = [
    "dataset_title",
    "dataset_name",
    "dataset_id",
    "resource_name",
    "resource_format",
    "resource_url",
    "resource_id",
];

impl CsvRow {
    pub fn new(dataset: &PackageSummary, resource: &Resource) -> Self {
        Self {
            dataset_title: dataset.display_title().to_string(),
            dataset_name: dataset.display_name().to_string(),
            dataset_id: dataset.id().to_string(),
            resource_name: resource.display_name().to_string(),
            resource_format: resource.format().to_string(),
            resource_url: resource.effective_url().to_string(),
            resource_id: resource.id().to_string(),
        }
    }
}

/// Writes the header and `rows` to `path`, replacing any existing file.
pub fn write_csv(path: &Path, rows: &[CsvRow]) -> Result<()> {
    let export_err = |source: csv::Error| Error::Export {
        path: path.to_path_buf(),
        source,
    };

    let mut w = csv::Writer::from_path(path).map_err(export_err)?;
    for row in rows {
        w.serialize(row).map_err(export_err)?;
    }
    w.flush().map_err(|e| export_err(e.into()))?;
    Ok(())
}
