use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arc_common::{ArcConfig, Review, SessionKey, Stage};
use arc_relay::Relay;
use arc_scout::scorer::enrich;
use arc_scout::{
    Controller, HttpRelayChannel, JsonFileStore, LifecycleState, MemoryStore, Observation,
    PageSignal, PipelineConfig, RelayChannel, RelayScorer, ScoutDeps, SessionStore,
    SettingsStore, ToggleStatus,
};

#[derive(Parser)]
#[command(name = "arc-scout", about = "Feed scraped reviews through the ARC upload pipeline")]
struct Cli {
    /// Call the backend in-process instead of going through a relay.
    #[arg(long, global = true)]
    direct: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload reviews read as JSON lines from a file or stdin.
    Run {
        /// Input file; `-` reads stdin.
        #[arg(long, default_value = "-")]
        input: String,

        /// Session key for this page view.
        #[arg(long, conflicts_with = "url")]
        session_key: Option<String>,

        /// Product page URL to derive the session key from.
        #[arg(long)]
        url: Option<String>,

        /// Score reviews and upload an enriched version of each.
        #[arg(long)]
        enrich: bool,

        /// Keep the reset marker in this file so it outlives one invocation.
        #[arg(long)]
        session_file: Option<PathBuf>,
    },
    /// Turn the overlay on or off.
    Toggle {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Print whether the overlay is enabled.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("arc=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;
    let settings = Arc::new(JsonFileStore::new(config.settings_path()));

    match cli.command {
        Command::Toggle { state } => {
            let enabled = matches!(state, Switch::On);
            settings.set_enabled(enabled).await?;
            print_status(ToggleStatus { enabled })?;
        }
        Command::Status => {
            let enabled = settings.enabled().await?;
            print_status(ToggleStatus { enabled })?;
        }
        Command::Run {
            input,
            session_key,
            url,
            enrich,
            session_file,
        } => {
            config.log_summary();
            let key = match (session_key, url) {
                (Some(key), _) => SessionKey::new(key),
                (None, Some(url)) => SessionKey::from_product_url(&url)
                    .with_context(|| format!("cannot derive a session key from {url:?}"))?,
                (None, None) => bail!("either --session-key or --url is required"),
            };
            let sessions: Arc<dyn SessionStore> = match session_file {
                Some(path) => Arc::new(JsonFileStore::new(path)),
                None => Arc::new(MemoryStore::new()),
            };
            let channel = relay_channel(cli.direct, &config)?;
            let deps = ScoutDeps::over_relay(channel.clone(), settings, sessions);

            let mut controller = Controller::new(key, deps, &config);
            if controller.boot().await != LifecycleState::Enabled {
                info!("ARC is disabled; nothing uploaded (enable with `arc-scout toggle on`)");
                return Ok(());
            }

            let reviews = read_reviews(&input).await?;
            run(&mut controller, channel, reviews, enrich, config.batch_size).await;
        }
    }

    Ok(())
}

fn relay_channel(direct: bool, config: &PipelineConfig) -> Result<Arc<dyn RelayChannel>> {
    if direct {
        let relay_config = ArcConfig::from_env()?;
        return Ok(Arc::new(Relay::from_config(&relay_config)?));
    }
    let channel = HttpRelayChannel::new(
        &config.relay_url,
        Duration::from_secs(config.http_timeout_secs),
    )?;
    Ok(Arc::new(channel))
}

async fn run(
    controller: &mut Controller,
    channel: Arc<dyn RelayChannel>,
    mut reviews: Vec<Review>,
    enrich_reviews: bool,
    chunk_size: usize,
) {
    let mut queued = 0usize;
    let mut duplicates = 0usize;
    let mut tally = |outcome: Observation| match outcome {
        Observation::Queued => queued += 1,
        Observation::Duplicate => duplicates += 1,
        Observation::Inactive => {}
    };

    for review in &reviews {
        match review.to_record() {
            Ok(record) => tally(controller.observe(record, Stage::base())),
            Err(e) => warn!(error = %e, "Skipping review that does not serialize"),
        }
    }

    if enrich_reviews {
        let scorer = RelayScorer::new(channel);
        for chunk in reviews.chunks_mut(chunk_size) {
            if let Err(e) = enrich(&scorer, chunk).await {
                warn!(error = %e, count = chunk.len(), "Scoring failed, skipping enriched upload");
                continue;
            }
            for review in chunk.iter() {
                match review.to_record() {
                    Ok(record) => tally(controller.observe(record, Stage::enriched())),
                    Err(e) => warn!(error = %e, "Skipping review that does not serialize"),
                }
            }
        }
    }

    controller.on_page_signal(PageSignal::Teardown).await;
    info!(queued, duplicates, "Done");
}

async fn read_reviews(input: &str) -> Result<Vec<Review>> {
    if input == "-" {
        parse_lines(BufReader::new(tokio::io::stdin())).await
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("cannot open {input}"))?;
        parse_lines(BufReader::new(file)).await
    }
}

async fn parse_lines<R: AsyncBufRead + Unpin>(reader: R) -> Result<Vec<Review>> {
    let mut reviews = Vec::new();
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Review>(&line) {
            Ok(review) => reviews.push(review),
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed review line"),
        }
    }
    Ok(reviews)
}

fn print_status(status: ToggleStatus) -> Result<()> {
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}
