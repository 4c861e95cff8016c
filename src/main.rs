//! # s3img - Main Entry Point
//!
//! Punto di ingresso del tool da command line.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti con `clap`
//! - Inizializzazione del logging con `tracing`
//! - Caricamento della configurazione JSON e override delle credenziali
//! - Avvio del resize (`--convert`) o dell'upload (`--upload`) per uno o tutti i profili
//!
//! ## Esempio di utilizzo:
//! ```bash
//! s3img -c sets.json --convert          # tutti i profili
//! s3img -c sets.json --convert=thumb    # solo "thumb"
//! s3img -c sets.json --upload --bucket media --keyid AKIA... --secret ...
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use s3img::batch::profiles::run_profiles;
use s3img::config::S3Settings;
use s3img::object_store::HttpObjectStore;
use s3img::platform::SystemCommandRunner;
use s3img::{Action, BatchReport, Config, ProfileSelector};

#[derive(Parser)]
#[command(name = "s3img")]
#[command(about = "Resize image sets and upload them to an S3 compatible bucket")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = "s3img.json")]
    config: PathBuf,

    /// Access key id (overrides s3.keyid)
    #[arg(long)]
    keyid: Option<String>,

    /// Secret access key (overrides s3.secret)
    #[arg(long)]
    secret: Option<String>,

    /// Target bucket (overrides s3.bucket)
    #[arg(long)]
    bucket: Option<String>,

    /// Region (overrides s3.region)
    #[arg(long)]
    region: Option<String>,

    /// Custom endpoint for S3 compatible services (overrides s3.endpoint)
    #[arg(long)]
    endpoint: Option<String>,

    /// Upload one profile set, or all of them when no name is given
    #[arg(short, long, value_name = "SET", num_args = 0..=1, default_missing_value = "")]
    upload: Option<String>,

    /// Resize into one profile set, or all of them when no name is given
    #[arg(short = 'p', long, value_name = "SET", num_args = 0..=1, default_missing_value = "")]
    convert: Option<String>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    sample_config: bool,

    /// Print the batch reports as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn s3_overrides(&self) -> S3Settings {
        S3Settings {
            keyid: self.keyid.clone(),
            secret: self.secret.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.sample_config {
        println!("{}", Config::sample());
        return Ok(());
    }

    if args.upload.is_none() && args.convert.is_none() {
        Args::command().print_help()?;
        return Ok(());
    }

    let config = Config::from_file(&args.config)
        .await
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    let show_progress = !args.json;
    let mut reports = Vec::new();

    if let Some(set) = args.convert.as_deref() {
        if !SystemCommandRunner::is_command_available(&config.convertbin).await {
            warn!("{} not found in PATH, resize commands will probably fail", config.convertbin);
        }

        let action = Action::Resize {
            runner: Arc::new(SystemCommandRunner),
        };
        reports.extend(run_profiles(&config, &ProfileSelector::from_name(Some(set)), &action, show_progress).await?);
    }

    if let Some(set) = args.upload.as_deref() {
        let s3 = config.s3.clone().unwrap_or_default().merge(&args.s3_overrides());
        let (credentials, bucket) = s3.credentials()?;
        let store = HttpObjectStore::new(credentials, s3.endpoint.as_deref())?;

        let action = Action::Upload {
            store: Arc::new(store),
            bucket,
        };
        reports.extend(run_profiles(&config, &ProfileSelector::from_name(Some(set)), &action, show_progress).await?);
    }

    print_reports(&reports, args.json)?;

    if !reports.iter().all(|(_, report)| report.is_clean()) {
        let failed: usize = reports.iter().map(|(_, report)| report.failed).sum();
        anyhow::bail!("{} file(s) failed", failed);
    }

    Ok(())
}

fn print_reports(reports: &[(String, BatchReport)], json: bool) -> Result<()> {
    if json {
        let value: Vec<serde_json::Value> = reports
            .iter()
            .map(|(profile, report)| serde_json::json!({ "profile": profile, "report": report }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (profile, report) in reports {
        info!("[{}] {}", profile, report.format_summary());
        for failure in &report.failures {
            error!("[{}] {}: {}", profile, failure.name, failure.error);
        }
    }
    Ok(())
}
