//! spendmap - categorize bank CSV exports

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spendmap_core::{AccountId, DEFAULT_ACCOUNT_ID};
use spendmap_import::{transform, TransformOptions};

mod output;

/// Normalize, categorize and annotate a bank CSV export
#[derive(Parser, Debug)]
#[command(name = "spendmap", version, about, long_about = None)]
struct Cli {
    /// Bank CSV export to transform
    #[arg(long)]
    source: PathBuf,
    /// Mapping rules file (CSV or TOML); discovered next to the source when omitted
    #[arg(long, env = "SPENDMAP_MAPPING")]
    category_mapping: Option<PathBuf>,
    /// Learn labeled rows into the mapping file before transforming
    #[arg(long)]
    learn: bool,
    /// Labeled file to learn from (default: <source>_uncategorized.csv)
    #[arg(long, requires = "learn")]
    learn_from: Option<PathBuf>,
    /// Print a summary report
    #[arg(long)]
    report: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
    /// Account identifier written to every row
    #[arg(long, env = "SPENDMAP_ACCOUNT_ID", default_value = DEFAULT_ACCOUNT_ID)]
    account_id: String,
    /// Also write a Parquet snapshot of the transformed table
    #[arg(long)]
    parquet: bool,
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("[error] {e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let account_id = AccountId::new(&cli.account_id)
        .with_context(|| format!("invalid --account-id '{}'", cli.account_id))?;
    let options = TransformOptions {
        category_mapping: cli.category_mapping,
        learn: cli.learn,
        learn_from: cli.learn_from,
        account_id,
        write_parquet: cli.parquet,
    };
    tracing::debug!("Transforming {} with {options:?}", cli.source.display());

    let summary = transform(&cli.source, &options)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(outcome) = &summary.learn {
        output::learn_outcome(outcome, summary.mapping_path.as_deref())?;
    }
    output::written(&summary);
    if cli.report {
        output::report(&summary);
    }
    Ok(())
}
