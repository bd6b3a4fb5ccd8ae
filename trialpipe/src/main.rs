use anyhow::{bail, Context};
use clap::Parser;
use regfetcher::{CtgovFetcher, EmaFetcher, EuctrFetcher, IsrctnFetcher, RegistryFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use trialpipe::{MergeStatus, Pipeline, PipelineOptions, ValidationOptions};
use trialstore::config::WarehouseConfig;
use trialstore::models::Source;
use trialstore::TrialStore;

/// Clinical-trial registry ingestion pipeline: fetches from the public
/// registries, normalizes and validates, then merges into the analytics
/// table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Base directory for the warehouse, object store, spool, and catalog.
    #[arg(long, env = "TRIALPIPE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Condition keyword passed to the searchable registries.
    #[arg(long, default_value = "heart attack")]
    condition: String,

    /// Comma-separated subset of sources to run (ctgov,isrctn,euctr,ema_cdp).
    /// Defaults to all four.
    #[arg(long, value_delimiter = ',')]
    sources: Option<Vec<String>>,

    /// Null-fraction warning threshold for optional columns.
    #[arg(long, default_value_t = 0.5)]
    null_fraction_threshold: f64,

    /// Result cap for the ISRCTN query API.
    #[arg(long, default_value_t = 100)]
    isrctn_limit: u32,

    /// Cap on EUCTR trial pages fetched per run.
    #[arg(long, default_value_t = 50)]
    euctr_max_trials: usize,

    /// Cap on EMA news items ingested per run.
    #[arg(long, default_value_t = 20)]
    ema_max_items: usize,

    /// Skip fetching and merge whatever a previous run left staged.
    #[arg(long)]
    merge_only: bool,
}

fn build_fetchers(cli: &Cli) -> anyhow::Result<Vec<Arc<dyn RegistryFetcher>>> {
    let sources: Vec<Source> = match &cli.sources {
        None => Source::all().to_vec(),
        Some(names) => names
            .iter()
            .map(|name| {
                Source::parse(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown source `{name}`"))
            })
            .collect::<anyhow::Result<_>>()?,
    };
    if sources.is_empty() {
        bail!("no sources selected");
    }

    let mut fetchers: Vec<Arc<dyn RegistryFetcher>> = Vec::with_capacity(sources.len());
    for source in sources {
        let fetcher: Arc<dyn RegistryFetcher> = match source {
            Source::Ctgov => Arc::new(CtgovFetcher::new(&cli.condition)?),
            Source::Isrctn => Arc::new(IsrctnFetcher::new(&cli.condition, cli.isrctn_limit)?),
            Source::Euctr => Arc::new(EuctrFetcher::new(&cli.condition, cli.euctr_max_trials)?),
            Source::EmaCdp => Arc::new(EmaFetcher::new(cli.ema_max_items)?),
        };
        fetchers.push(fetcher);
    }
    Ok(fetchers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = WarehouseConfig::new(&cli.data_dir);
    let store = TrialStore::new(config)
        .await
        .context("failed to open the trial store")?;

    let options = PipelineOptions {
        validation: ValidationOptions {
            null_fraction_threshold: cli.null_fraction_threshold,
        },
    };

    if cli.merge_only {
        let pipeline = Pipeline::new(store, Vec::new(), options);
        let status = pipeline.merge_staged().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        if matches!(status, MergeStatus::Failed(_)) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let fetchers = build_fetchers(&cli)?;
    let pipeline = Pipeline::new(store, fetchers, options);
    let summary = pipeline.run().await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
