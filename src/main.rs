use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use announcer::config::Config;
use announcer::feed::{FeedItem, Feeder, FeederEvent};
use announcer::storage::{Database, DatabaseError, FeedCache};
use announcer::util::truncate_chars;

/// Get the config directory path (~/.config/announcer/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("announcer");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "announcer", about = "Streaming Blogger feed reader with an offline cache")]
struct Args {
    /// Config file (defaults to ~/.config/announcer/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show the cached articles without refreshing
    #[arg(long)]
    offline: bool,

    /// Discard the offline cache before starting
    #[arg(long)]
    reset_cache: bool,
}

fn print_items(items: &[FeedItem]) {
    if items.is_empty() {
        println!("No articles.");
        return;
    }
    for (i, item) in items.iter().enumerate() {
        let date = item
            .published
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!("{:>2}. {}", i + 1, item.title);
        println!("    {} | {} | {}", date, item.author, item.link);
        if !item.stripped_html_content.is_empty() {
            println!("    {}", truncate_chars(&item.stripped_html_content, 120));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Open database
    let db_path = config_dir.join("cache.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of announcer appears to be running.");
            eprintln!("Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };
    let cache = FeedCache::new(db);

    // Handle --reset-cache flag
    if args.reset_cache {
        cache.clear().await.context("Failed to clear feed cache")?;
        println!("Cache reset.");
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("announcer/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let (event_tx, mut event_rx) = mpsc::channel::<FeederEvent>(32);
    let feeder = Arc::new(
        Feeder::new(client, cache, config.feeder_settings()).with_events(event_tx),
    );

    // Instant start from the offline copy
    if feeder.load_cached().await.context("Failed to load feed cache")? {
        print_items(&feeder.collection().snapshot());
    } else {
        println!("No cached articles yet.");
    }

    if args.offline {
        return Ok(());
    }

    let handle = feeder.spawn_refresh();
    let mut stderr = std::io::stderr();
    while let Some(event) = event_rx.recv().await {
        match event {
            FeederEvent::Progress(fraction) => {
                let _ = write!(stderr, "\rDownloading... {:>3.0}%", fraction * 100.0);
                let _ = stderr.flush();
            }
            FeederEvent::Finished(result) => {
                let _ = writeln!(stderr);
                match result {
                    Ok(items) => {
                        println!();
                        print_items(&items);
                    }
                    Err(e) => {
                        eprintln!("Refresh failed: {}", e);
                    }
                }
                break;
            }
            FeederEvent::LoadedFromCache => {}
        }
    }

    handle.await.context("Refresh task panicked")?;
    Ok(())
}
