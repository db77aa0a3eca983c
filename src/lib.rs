//! A small blocking client for CKAN open-data portals, focused on finding and
//! downloading XLSX resources.
//!
//! The crate provides:
//! - a CKAN action API [`Client`] (`package_show`, `group_show`)
//! - resource filtering by format ([`FormatFilter`])
//! - a streaming downloader with fixed-delay retries ([`RetryPolicy`])
//! - the listing/download operations behind the `ckan-xlsx` binary
//!   ([`actions`])
//!
//! ## Quick start
//!
//! ```no_run
//! use ckan_xlsx::{Client, FormatFilter, RetryPolicy};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! fn main() -> ckan_xlsx::Result<()> {
//!     let client = Client::new("https://dadosabertos.capes.gov.br", Duration::from_secs(120))?;
//!     let package = client.package_show("36d1c92c-f9e0-4da1-a4f0-633e6ebefe03")?;
//!     let policy = RetryPolicy::new(3, Duration::from_secs(2));
//!
//!     for r in package.resources.iter().filter(|r| FormatFilter::xlsx().matches(r)) {
//!         let saved = client.download_with_retry(
//!             r.effective_url(),
//!             Path::new("downloads"),
//!             Some(r.display_name()),
//!             &policy,
//!         )?;
//!         println!("{}", saved.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Settings can also come from the environment or a `.ckanrc` file, see
//! [`load_settings`].

#![forbid(unsafe_code)]

pub mod actions;
mod client;
mod config;
mod download;
mod error;
mod export;
mod filename;
mod filter;
pub mod models;
mod util;

pub use client::{ActionOutcome, Client};
pub use config::{Overrides, Settings, load_settings};
pub use download::{CHUNK_SIZE, DownloadResult, RetryPolicy};
pub use error::{Error, Result};
pub use export::{CSV_HEADER, CsvRow, write_csv};
pub use filename::resolve_filename;
pub use filter::{FormatFilter, formats_present, is_target_format};
pub use models::{Group, Package, PackageSummary, Resource};
pub use util::{pct_decode, sanitize_filename};
