use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use feedsync::config::Config;
use feedsync::feed::{HttpTransport, ProxyTransport, Transport};
use feedsync::store::{FeedId, StateChange};
use feedsync::sync::{Poller, SyncEngine};

#[derive(Parser, Debug)]
#[command(name = "feedsync", about = "Polls RSS feeds and reports new posts")]
struct Args {
    /// Config file (default: ~/.config/feedsync/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL to register at startup (repeatable)
    #[arg(long = "feed", value_name = "URL")]
    feeds: Vec<String>,

    /// Run one pass, print the state as JSON and exit
    #[arg(long)]
    once: bool,
}

fn build_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let http =
        HttpTransport::new(config.max_feed_size_bytes).context("Failed to build HTTP client")?;

    Ok(match config.proxy()? {
        Some(base) => {
            tracing::info!(proxy = %base, "Fetching feeds through proxy");
            Arc::new(ProxyTransport::new(http, base))
        }
        None => Arc::new(http),
    })
}

/// Prints each post the first time it appears in the store.
fn new_post_printer() -> impl FnMut(&StateChange<'_>) + Send + 'static {
    let mut feed_titles: HashMap<FeedId, String> = HashMap::new();
    let mut printed = 0;

    move |change| match change {
        StateChange::Feeds(feeds) => {
            feed_titles = feeds.iter().map(|f| (f.id, f.title.clone())).collect();
        }
        StateChange::Posts(posts) => {
            for post in posts.iter().skip(printed) {
                let feed = feed_titles
                    .get(&post.feed_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                println!("[{}] {}  <{}>", feed, post.title, post.url);
            }
            printed = posts.len();
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path().context("HOME environment variable not set")?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.feeds.extend(args.feeds);

    let transport = build_transport(&config)?;
    let mut engine = SyncEngine::from_config(&config, transport);
    if !args.once {
        engine.store_mut().subscribe(new_post_printer());
    }

    for url in &config.feeds {
        if let Err(e) = engine.submit_candidate(url).await {
            eprintln!("Skipping {}: {} ({})", url.trim(), e, e.message_key());
        }
    }

    if args.once {
        engine.run_pass().await;
        let json = serde_json::to_string_pretty(&engine.store().snapshot())
            .context("Failed to serialize state")?;
        println!("{json}");
        return Ok(());
    }

    if engine.store().links().is_empty() {
        eprintln!("No feeds registered. Add some with --feed <URL> or in the config file.");
    }

    let (poller, handle) = Poller::new(engine, config.poll_interval());
    let task = tokio::spawn(poller.run());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.shutdown().await;
    task.await.context("Poller task failed")?;

    println!("Goodbye!");
    Ok(())
}
