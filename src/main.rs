use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ckan_xlsx::{Client, FormatFilter, Overrides, RetryPolicy, actions, load_settings};

/// CKAN utilities: list datasets and groups, download XLSX resources.
///
/// Defaults come from CKAN_BASE, CKAN_DATASET_ID, CKAN_GROUP_ID, TIMEOUT,
/// RETRY and SLEEP_BETWEEN, or from a .ckanrc file.
#[derive(Debug, Parser)]
#[command(name = "ckan-xlsx", version, about, long_about = None)]
struct Cli {
    /// CKAN base URL (default: https://dadosabertos.capes.gov.br)
    #[arg(long, global = true, value_name = "URL")]
    base: Option<String>,

    /// Per-request timeout in seconds (default: 120)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<f64>,

    /// Do not draw download progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the .xlsx resources of a dataset
    ListDatasetXlsx {
        /// Dataset UUID or slug
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Download the .xlsx resources of a dataset
    DownloadDatasetXlsx {
        /// Dataset UUID or slug
        #[arg(long)]
        dataset: Option<String>,

        /// Output directory
        #[arg(long, default_value = "downloads")]
        out: PathBuf,

        /// Attempts per file (default: 3)
        #[arg(long)]
        retry: Option<u32>,

        /// Seconds to wait between attempts (default: 2)
        #[arg(long, value_name = "SECS")]
        sleep: Option<f64>,
    },

    /// List the datasets of a CKAN group and their resources
    ListGroup {
        /// Group id or slug
        #[arg(long)]
        group: Option<String>,

        /// Only show resources of this format (e.g. xlsx)
        #[arg(long, default_value = "")]
        format: String,

        /// Export the listed resources to this CSV file
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // The current operation is abandoned as is; a partial `.part` file may remain.
    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted by user.");
        std::process::exit(130);
    }) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<ckan_xlsx::Error>() {
                Some(err) if err.is_transport() => {
                    eprintln!("HTTP error: {:#}", e);
                    err.exit_code()
                }
                Some(err) => {
                    eprintln!("Error: {:#}", e);
                    err.exit_code()
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            };
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut overrides = Overrides {
        base_url: cli.base,
        timeout_secs: cli.timeout,
        ..Default::default()
    };
    match &cli.command {
        Command::ListDatasetXlsx { dataset } => {
            overrides.dataset = dataset.clone();
        }
        Command::DownloadDatasetXlsx {
            dataset,
            retry,
            sleep,
            ..
        } => {
            overrides.dataset = dataset.clone();
            overrides.retry = *retry;
            overrides.sleep_secs = *sleep;
        }
        Command::ListGroup { group, .. } => {
            overrides.group = group.clone();
        }
    }

    let settings = load_settings(overrides).context("failed to load settings")?;
    tracing::debug!(?settings, "resolved settings");

    let client = Client::from_settings(&settings)?.with_progress(!cli.no_progress);
    let mut out = io::stdout().lock();

    match cli.command {
        Command::ListDatasetXlsx { .. } => {
            actions::list_dataset(&client, &settings.dataset, &mut out)
                .with_context(|| format!("listing dataset {}", settings.dataset))?;
        }
        Command::DownloadDatasetXlsx { out: out_dir, .. } => {
            let policy = RetryPolicy::from_settings(&settings);
            actions::download_dataset(&client, &settings.dataset, &out_dir, &policy, &mut out)
                .with_context(|| format!("downloading dataset {}", settings.dataset))?;
        }
        Command::ListGroup { format, csv, .. } => {
            let filter = FormatFilter::new(&format);
            let csv = csv.filter(|p| !p.as_os_str().is_empty());
            actions::list_group(&client, &settings.group, &filter, csv.as_deref(), &mut out)
                .with_context(|| format!("listing group {}", settings.group))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,ckan_xlsx={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
