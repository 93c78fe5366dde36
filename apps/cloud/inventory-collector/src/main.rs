//! Inventory Collector
//!
//! Discovers resources across the services and projects a cloud credential
//! can see, and prints them as JSON.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use core_config::{Environment, FromEnv};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_inventory::{CATALOG, Resources, ServicePolicy};
use eyre::{Result, eyre};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod collector;
mod config;
mod providers;

use collector::InventoryCollector;
use config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "inventory-collector")]
#[command(about = "Discover cloud resources across services and projects")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct ProviderArgs {
    /// Services to collect (dns, gke, compute, s3, cloud-function, cloud-run). Defaults to all.
    #[arg(short, long, value_delimiter = ',')]
    services: Option<Vec<String>>,

    /// Label attached to every reported resource
    #[arg(long)]
    id: Option<String>,

    /// Service account key JSON file
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// JSON file listing provider option blocks
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl From<ProviderArgs> for Overrides {
    fn from(args: ProviderArgs) -> Self {
        Overrides {
            id: args.id,
            services: args.services,
            credentials_file: args.credentials_file,
            config_file: args.config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One JSON array
    Json,
    /// One resource per line
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the inventory and print it to stdout
    Collect {
        #[command(flatten)]
        provider: ProviderArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Print Prometheus metrics to stderr after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Check that the credentials can reach at least one service
    Verify {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// List supported services
    Services,
}

fn write_resources(resources: &Resources, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, resources)?;
            writeln!(out)?;
        }
        OutputFormat::Jsonl => {
            for resource in resources.iter() {
                serde_json::to_writer(&mut out, resource)?;
                writeln!(out)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn print_services() {
    let policy = ServicePolicy::default();
    for descriptor in CATALOG.iter() {
        let probe = descriptor
            .probe_rank
            .map(|rank| rank.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<12} probe={:<2} {}",
            descriptor.service.as_str(),
            policy.criticality(descriptor.service).to_string(),
            probe,
            descriptor.description
        );
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

/// Run one subcommand. Provider configuration is only read by the commands
/// that talk to a provider.
async fn run(command: Commands, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Collect {
            provider,
            format,
            metrics,
        } => {
            let config = Config::from_env()?;
            let render_metrics = metrics || config.metrics;
            if render_metrics {
                observability::init_metrics()?;
            }

            let blocks = config.option_blocks(&provider.into())?;
            let collector = InventoryCollector::new(blocks);

            info!("Starting inventory collection");
            let result = collector.collect(cancel).await?;

            write_resources(&result.resources, format)?;

            for report in &result.providers {
                info!(
                    provider = %report.provider,
                    id = %report.id,
                    resources = report.resources,
                    skipped = report.skipped.len(),
                    duration_ms = report.duration_ms,
                    "Provider finished"
                );
            }
            info!(
                "Collection complete: {} resources from {} providers, {} errors in {} ms",
                result.resources.len(),
                result.providers.len(),
                result.errors,
                result.duration_ms
            );

            if render_metrics {
                eprint!("{}", observability::render_metrics());
            }

            if result.errors > 0 {
                let report = serde_json::to_string(&result)?;
                return Err(eyre!("{} provider(s) failed: {}", result.errors, report));
            }
        }

        Commands::Verify { provider } => {
            let config = Config::from_env()?;
            let blocks = config.option_blocks(&provider.into())?;
            let collector = InventoryCollector::new(blocks);

            let reports = collector.verify(cancel).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);

            let failed = reports.iter().filter(|report| !report.verified).count();
            if failed > 0 {
                return Err(eyre!("{} provider(s) failed verification", failed));
            }
        }

        Commands::Services => print_services(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    init_tracing(&Environment::from_env(), cli.verbose);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    run(cli.command, &cancel).await
}
