//! Fog Walker CLI
//!
//! Runs the content server and fetches content cards through the client
//! tier, with the same persisted cache and streaming behavior a UI would use.

mod render;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fogwalker_api::{ApiServer, ServerConfig};
use fogwalker_client::{
    ContentPanel, ContentSource, FileStorage, HttpContentSource, PanelState, PersistedCache,
};
use fogwalker_core::{ContentVariant, PayloadShape};

/// Fog Walker - cached, streamed AI content cards
#[derive(Parser)]
#[command(name = "fogwalker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the content server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Fetch one content card
    Fetch {
        /// sediment, wormhole, labelless or collider
        variant: ContentVariant,
        /// Content server URL
        #[arg(long, env = "FOGWALKER_SERVER", default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Bypass the local cache
        #[arg(long)]
        refresh: bool,
        /// Use a buffered request instead of a streamed delivery
        #[arg(long)]
        no_stream: bool,
        /// Local cache file
        #[arg(long, env = "FOGWALKER_CACHE_FILE", default_value = ".fogwalker/cache.json")]
        cache_file: PathBuf,
    },

    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
        /// Local cache file
        #[arg(long, env = "FOGWALKER_CACHE_FILE", default_value = ".fogwalker/cache.json")]
        cache_file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show age and TTL per variant
    Info,
    /// Remove every cached card
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "fogwalker=debug,info"
    } else {
        "fogwalker=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Fetch {
            variant,
            server,
            refresh,
            no_stream,
            cache_file,
        } => cmd_fetch(variant, &server, refresh, no_stream, cache_file).await,
        Commands::Cache { action, cache_file } => cmd_cache(action, cache_file),
    }
}

fn open_cache(path: PathBuf) -> Result<PersistedCache> {
    let storage = FileStorage::open(&path)
        .with_context(|| format!("Failed to open cache file {}", path.display()))?;
    Ok(PersistedCache::new(Arc::new(storage)))
}

/// Run the content server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    println!("{}", "🌫  Starting Fog Walker content server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/health", "Health check:".dimmed(), bind, port);

    let config = ServerConfig::from_env();
    if config.upstream.api_key.is_none() || config.upstream.base_url.is_none() {
        println!(
            "   {}",
            "⚠️  AI_API_BASE_URL / AI_API_KEY not set; content requests will fail with a config error"
                .yellow()
        );
    }
    println!("\n   Press Ctrl+C to stop.\n");

    let server = ApiServer::new(config).context("Failed to build server state")?;
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    server.run(addr).await?;

    Ok(())
}

/// Fetch one card through the client tier
async fn cmd_fetch(
    variant: ContentVariant,
    server: &str,
    refresh: bool,
    no_stream: bool,
    cache_file: PathBuf,
) -> Result<()> {
    let source = Arc::new(HttpContentSource::new(server).context("Invalid server URL")?);
    let cache = open_cache(cache_file)?;
    debug!(%variant, server, refresh, no_stream, "Fetching content");

    if no_stream {
        return fetch_buffered(variant, source.as_ref(), &cache, refresh).await;
    }

    let panel = Arc::new(ContentPanel::new(variant, source, cache));
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let watcher = tokio::spawn({
        let mut rx = panel.subscribe();
        let spinner = spinner.clone();
        async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                show_progress(variant, &state, &spinner);
            }
        }
    });

    let run = async {
        if refresh {
            panel.refresh().await
        } else {
            panel.mount().await
        }
    };
    tokio::select! {
        _ = run => {}
        _ = tokio::signal::ctrl_c() => {
            panel.unmount();
            watcher.abort();
            spinner.finish_and_clear();
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    watcher.abort();
    spinner.finish_and_clear();

    match panel.state() {
        PanelState::Done {
            value,
            from_cache,
            topic,
            ..
        } => {
            print_card(variant, &value, topic.as_deref(), from_cache);
            Ok(())
        }
        PanelState::Error {
            kind,
            message,
            stale,
        } => {
            if let Some(value) = stale {
                print_card(variant, &value, None, true);
            }
            anyhow::bail!("{message} ({kind})")
        }
        other => anyhow::bail!("Delivery ended without a result: {other:?}"),
    }
}

async fn fetch_buffered(
    variant: ContentVariant,
    source: &dyn ContentSource,
    cache: &PersistedCache,
    refresh: bool,
) -> Result<()> {
    if !refresh {
        if let Some(value) = cache.get::<serde_json::Value>(variant.as_str()) {
            print_card(variant, &value, None, true);
            return Ok(());
        }
    }

    let envelope = source.fetch(variant).await?;
    match (envelope.success, envelope.data) {
        (true, Some(value)) => {
            cache.set(variant.as_str(), &value, variant.ttl());
            print_card(variant, &value, envelope.topic.as_deref(), false);
            Ok(())
        }
        _ => {
            let message = envelope.message.unwrap_or_default();
            let kind = envelope
                .error_type
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".into());
            anyhow::bail!("{message} ({kind})")
        }
    }
}

fn show_progress(variant: ContentVariant, state: &PanelState, spinner: &ProgressBar) {
    match state {
        PanelState::Loading => spinner.set_message(format!("Loading {variant}...")),
        PanelState::Streaming { preview, received } => {
            // Arrays never preview; objects show their latest valid prefix.
            let message = match (variant.shape(), preview) {
                (PayloadShape::ItemList, _) | (_, None) => {
                    format!("Receiving {variant}... {received} chars")
                }
                (_, Some(value)) => render::preview_line(value),
            };
            spinner.set_message(message);
        }
        PanelState::Done { updating: true, .. } => {
            spinner.set_message(format!("Updating {variant}..."))
        }
        PanelState::Done { from_cache: true, .. } => {
            spinner.set_message(format!("Showing cached {variant}, revalidating..."))
        }
        _ => {}
    }
}

fn print_card(variant: ContentVariant, value: &serde_json::Value, topic: Option<&str>, cached: bool) {
    let mut header = format!("{}", variant.as_str().to_uppercase().bold());
    if let Some(topic) = topic {
        header.push_str(&format!(" · {topic}"));
    }
    if cached {
        header.push_str(&format!(" {}", "(cached)".dimmed()));
    }
    println!("{header}\n");
    println!("{}", render::render(variant, value, Local::now().date_naive()));
}

/// Inspect or clear the local cache
fn cmd_cache(action: CacheAction, cache_file: PathBuf) -> Result<()> {
    let cache = open_cache(cache_file)?;

    match action {
        CacheAction::Info => {
            println!("{}", "📦 Local cache".cyan().bold());
            for variant in ContentVariant::ALL {
                match cache.info(variant.as_str()) {
                    Some(info) if info.exists => println!(
                        "   {:<10} {} age {}s / ttl {}s",
                        variant.as_str(),
                        "live".green(),
                        info.age.as_secs(),
                        info.ttl.as_secs()
                    ),
                    Some(info) if info.ttl > Duration::ZERO => println!(
                        "   {:<10} {} age {}s / ttl {}s",
                        variant.as_str(),
                        "expired".yellow(),
                        info.age.as_secs(),
                        info.ttl.as_secs()
                    ),
                    Some(_) => println!("   {:<10} {}", variant.as_str(), "empty".dimmed()),
                    None => println!("   {:<10} {}", variant.as_str(), "unreadable".red()),
                }
            }
        }
        CacheAction::Clear => {
            cache.clear_all();
            println!("{}", "✅ Local cache cleared".green());
        }
    }

    Ok(())
}
