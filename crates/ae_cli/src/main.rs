use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ae_core::{bounded_store, ArticleStore, ScrapedArticle};
use ae_inference::{create_provider, parse_models, Enhancer, InferenceConfig, ProviderKind, DEFAULT_BATCH_SIZE};
use ae_web::handlers::BatchReportView;
use ae_web::{create_app, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A positive duration such as `90`, `30s`, `5m` or `1h 15m`. Bare numbers are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3_600),
        'd' => Some(86_400),
        _ => None,
    }
}

fn add_term(total: u64, digits: &str, unit: u64) -> std::result::Result<u64, String> {
    if digits.is_empty() {
        return Err("every unit needs a number in front of it".to_string());
    }
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .and_then(|secs| total.checked_add(secs))
        .ok_or_else(|| "duration is out of range".to_string())
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total = 0u64;
        let mut digits = String::new();
        let mut terms = 0;

        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let unit = unit_seconds(c).ok_or_else(|| format!("unknown duration unit '{}'", c))?;
            total = add_term(total, &digits, unit)?;
            digits.clear();
            terms += 1;
        }
        if !digits.is_empty() {
            total = add_term(total, &digits, 1)?;
            terms += 1;
        }

        if terms == 0 {
            return Err("duration is empty".to_string());
        }
        if total == 0 {
            return Err("duration must be greater than zero".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

async fn check_storage(storage: &Arc<dyn ArticleStore>, storage_type: &str) -> ae_core::Result<()> {
    let articles = storage.list_articles().await?;
    info!(
        "🏦 Storage backend initialized successfully (using {}, {} articles)",
        storage_type,
        articles.len()
    );
    Ok(())
}

async fn check_storage_with_retry(
    storage: &Arc<dyn ArticleStore>,
    storage_type: &str,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < max_retries {
        match tokio::time::timeout(timeout, check_storage(storage, storage_type)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => last_error = Some(anyhow::Error::from(e)),
            Err(_) => last_error = Some(anyhow::anyhow!("storage health check timed out after {:?}", timeout)),
        }
        retries += 1;
        if retries < max_retries {
            info!("Storage health check failed, retrying {}/{}...", retries, max_retries);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("storage health check failed after all retries")))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rewrite stored articles with an LLM and keep them next to the originals", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, global = true, default_value = "memory", env = "AE_STORAGE")]
    storage: String,
    /// SQLite database file
    #[arg(long, global = true, default_value = "articles.db", env = "DATABASE_URL")]
    database_url: String,
    /// Provider: gemini (default), deepseek or dummy. Overrides AE_PROVIDER.
    #[arg(long, global = true)]
    provider: Option<String>,
    /// Comma separated model chain, tried in order. Overrides AE_MODELS.
    #[arg(long, global = true)]
    models: Option<String>,
    /// Overrides the provider's API key variable.
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Abort the run after this long (e.g. 30s, 5m, 1h15m)
    #[arg(long, global = true)]
    deadline: Option<HumanDuration>,
    /// Upper bound for each storage call
    #[arg(long, global = true, default_value = "10s", env = "AE_STORE_TIMEOUT_SECS")]
    store_timeout: HumanDuration,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },
    /// Enhance a single original article
    Enhance { id: String },
    /// Replace all enhanced articles with fresh ones for the oldest originals
    Batch {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        max: usize,
        /// Comma separated ids to enhance instead of the stored originals
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Store scraped articles from a JSON file as originals
    Ingest { file: std::path::PathBuf },
    /// Print stored articles as JSON
    List {
        #[arg(long)]
        originals: bool,
    },
}

fn inference_config(cli: &Cli) -> Result<InferenceConfig> {
    let provider = cli.provider.as_deref().map(ProviderKind::from_str).transpose()?;
    let mut config = InferenceConfig::from_env_with(provider).context("invalid inference configuration")?;
    if let Some(models) = &cli.models {
        config.models = parse_models(models);
    }
    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    }
    config.store_timeout = cli.store_timeout.0;
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
        _ = cancel.cancelled() => info!("Deadline reached, shutting down"),
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    if let Some(HumanDuration(deadline)) = cli.deadline {
        info!("⏱️ Run deadline set to {}s", deadline.as_secs());
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("Deadline of {}s elapsed, cancelling", deadline.as_secs());
            token.cancel();
        });
    }

    info!("💾 Checking storage connection...");
    let url = (cli.storage == "sqlite").then_some(cli.database_url.as_str());
    let storage = ae_storage::create_storage(&cli.storage, url)
        .await
        .with_context(|| format!("failed to open {} storage", cli.storage))?;
    let HumanDuration(store_timeout) = cli.store_timeout;
    check_storage_with_retry(&storage, &cli.storage, 3, store_timeout).await?;

    match &cli.command {
        Commands::List { originals } => {
            let articles = if *originals {
                bounded_store(&cancel, store_timeout, storage.list_originals()).await?
            } else {
                bounded_store(&cancel, store_timeout, storage.list_articles()).await?
            };
            println!("{}", serde_json::to_string_pretty(&articles)?);
            return Ok(());
        }
        Commands::Ingest { file } => {
            let raw = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
            let scraped: Vec<ScrapedArticle> =
                serde_json::from_str(&raw).with_context(|| format!("{} is not a list of scraped articles", file.display()))?;
            let report = ae_storage::ingest(storage.as_ref(), &scraped, &cancel, store_timeout).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        _ => {}
    }

    let config = inference_config(&cli)?;
    let provider = create_provider(&config)?;
    info!("🧠 Provider initialized successfully (using {})", provider.name());
    let enhancer = Enhancer::new(provider, storage.clone(), &config);

    match cli.command {
        Commands::Serve { port } => {
            let mut state = AppState::new(storage, enhancer);
            state.shutdown = cancel.clone();
            let app = create_app(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("failed to bind port {}", port))?;
            info!("🚀 Server running on port {}", port);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(cancel))
                .await?;
        }
        Commands::Enhance { id } => {
            let created = enhancer.enhance_by_id(&id, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Commands::Batch { max, ids } => {
            let report = if ids.is_empty() {
                enhancer.enhance_originals(max, &cancel).await?
            } else {
                let mut selection = Vec::with_capacity(ids.len());
                for id in &ids {
                    selection.push(bounded_store(&cancel, store_timeout, storage.get_article(id)).await?);
                }
                enhancer.enhance_batch(&selection, max, &cancel).await?
            };
            if report.failed() > 0 {
                warn!("{} articles could not be enhanced", report.failed());
            }
            println!("{}", serde_json::to_string_pretty(&BatchReportView::from(report))?);
        }
        Commands::List { .. } | Commands::Ingest { .. } => {}
    }

    Ok(())
}
