mod cache;
mod config;
mod github;
mod logging;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use tracing::{info, warn};

use cache::RequestCache;
use config::{CacheConfig, Config};
use github::cached_client::CachedGitHubClient;
use github::client::GitHubClient;
use github::types::Notification;
use store::{NotificationStore, SnapshotFile, StoreSettings};

#[derive(Parser, Debug)]
#[command(name = "hubox")]
#[command(about = "A focused inbox for GitHub notifications")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hubox/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pull the latest page of notifications
  Sync,
  /// Pull every page of notifications
  FetchAll,
  /// Show the working set
  Inbox,
  /// Show every known notification
  All,
  /// Show notifications marked done
  Done,
  /// Show a notification with its issue or pull request and comments
  Show { id: String },
  /// Mark a notification read
  Read { id: String },
  /// Mark a notification unread
  Unread { id: String },
  /// Mark a notification done, here and on GitHub
  MarkDone { id: String },
  /// Set a local priority
  Priority { id: String, priority: i32 },
  /// Grow the working set (default: inbox.expand_step)
  Expand { count: Option<usize> },
  /// Show counts and sync status
  Stats,
  /// Delete all local data
  Reset,
  /// Check that the GitHub token works
  Validate,
  /// Sync periodically until Ctrl-C
  Watch {
    /// Seconds between syncs (default: cache.ttl_secs, at least 60)
    #[arg(long)]
    interval: Option<u64>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let data_dir = config.data_dir()?;
  let _log_guard = logging::init(&data_dir.join("logs"))?;

  let store = open_store(&config, &data_dir).await?;
  let result = run(&store, &config, args.command).await;

  // Persist whatever the request cache still holds, even on error
  if let Err(e) = store.shutdown() {
    warn!("Failed to flush request cache: {}", e);
  }

  result
}

async fn open_store(config: &Config, data_dir: &Path) -> Result<NotificationStore> {
  let cache = request_cache(&config.cache, data_dir);
  let client = GitHubClient::new(config)?;
  let source = Arc::new(CachedGitHubClient::new(client, cache.clone()));

  Ok(
    NotificationStore::open(
      StoreSettings::from(config),
      source,
      cache,
      SnapshotFile::new(data_dir.join("notifications.json")),
    )
    .await,
  )
}

fn request_cache(config: &CacheConfig, data_dir: &Path) -> RequestCache {
  if !config.enabled {
    // Every entry is born expired
    return RequestCache::in_memory(Duration::ZERO);
  }

  if config.persist {
    RequestCache::persistent(
      data_dir.join("request-cache.json"),
      config.ttl(),
      config.debounce(),
    )
  } else {
    RequestCache::in_memory(config.ttl())
  }
}

async fn run(store: &NotificationStore, config: &Config, command: Command) -> Result<()> {
  match command {
    Command::Sync => {
      store.sync().await?;
      print_summary(store).await;
    }
    Command::FetchAll => {
      store.fetch_all().await?;
      print_summary(store).await;
    }
    Command::Inbox => print_list(&store.get_in_progress().await),
    Command::All => print_list(&store.get_all().await),
    Command::Done => print_list(&store.get_done().await),
    Command::Show { id } => {
      let details = store
        .get_notification_details(&id)
        .await
        .ok_or_else(|| unknown(&id))?;
      print_json(&details)?;
    }
    Command::Read { id } => ensure_known(store.mark_as_read(&id).await, &id)?,
    Command::Unread { id } => ensure_known(store.mark_as_unread(&id).await, &id)?,
    Command::MarkDone { id } => ensure_known(store.mark_as_done(&id).await, &id)?,
    Command::Priority { id, priority } => {
      ensure_known(store.set_priority(&id, priority).await, &id)?
    }
    Command::Expand { count } => {
      store
        .expand_inbox_limit(count.unwrap_or(config.inbox.expand_step))
        .await;
      print_list(&store.get_in_progress().await);
    }
    Command::Stats => print_json(&store.get_stats().await)?,
    Command::Reset => {
      store.reset_storage().await;
      println!("Local data cleared");
    }
    Command::Validate => {
      store.validate_token().await?;
      println!("Token is valid");
    }
    Command::Watch { interval } => watch(store, watch_interval(interval, &config.cache)).await?,
  }

  Ok(())
}

/// Time between `watch` syncs.
///
/// Syncs inside the cache TTL are answered from the cache, so by default a
/// tick waits out the TTL and every sync reaches GitHub.
fn watch_interval(requested: Option<u64>, cache: &CacheConfig) -> Duration {
  let secs = match requested {
    Some(secs) => secs.max(1),
    None if cache.enabled => cache.ttl_secs.max(60),
    None => 60,
  };
  Duration::from_secs(secs)
}

async fn watch(store: &NotificationStore, interval: Duration) -> Result<()> {
  let mut ticker = tokio::time::interval(interval);
  info!(interval_secs = interval.as_secs(), "Watching notifications");

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        match store.sync().await {
          Ok(()) => print_summary(store).await,
          Err(e) => eprintln!("Sync failed: {}", e),
        }
      }
      signal = tokio::signal::ctrl_c() => {
        signal.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
        info!("Stopped watching");
        return Ok(());
      }
    }
  }
}

fn unknown(id: &str) -> color_eyre::eyre::Report {
  eyre!("Unknown notification: {}", id)
}

fn ensure_known(found: bool, id: &str) -> Result<()> {
  if found {
    Ok(())
  } else {
    Err(unknown(id))
  }
}

async fn print_summary(store: &NotificationStore) {
  let stats = store.get_stats().await;
  println!(
    "{} notifications, {} in inbox ({} unread), {} done",
    stats.total, stats.working_set_size, stats.working_set_unread, stats.done
  );
}

fn print_list(notifications: &[Notification]) {
  if notifications.is_empty() {
    println!("Nothing here");
    return;
  }

  for n in notifications {
    let marker = if n.is_done() {
      'x'
    } else if n.is_read() {
      ' '
    } else {
      '*'
    };
    println!(
      "{} {:>12}  {}  {:<11} {:<30} {}",
      marker,
      n.id,
      n.updated_at.format("%Y-%m-%d %H:%M"),
      n.subject.kind.as_str(),
      n.repository.full_name,
      n.subject.title
    );
  }
}

fn print_json(value: &impl Serialize) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", json);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_watch_waits_out_the_cache_by_default() {
    let cache = CacheConfig {
      ttl_secs: 300,
      ..Default::default()
    };

    assert_eq!(watch_interval(None, &cache), Duration::from_secs(300));
  }

  #[test]
  fn test_watch_interval_floor_and_override() {
    let short_ttl = CacheConfig {
      ttl_secs: 5,
      ..Default::default()
    };
    assert_eq!(watch_interval(None, &short_ttl), Duration::from_secs(60));

    let disabled = CacheConfig {
      enabled: false,
      ..Default::default()
    };
    assert_eq!(watch_interval(None, &disabled), Duration::from_secs(60));

    assert_eq!(watch_interval(Some(0), &short_ttl), Duration::from_secs(1));
    assert_eq!(watch_interval(Some(30), &short_ttl), Duration::from_secs(30));
  }

  #[test]
  fn test_cli_parses_watch_without_interval() {
    let args = Args::try_parse_from(["hubox", "watch"]).unwrap();
    assert!(matches!(args.command, Command::Watch { interval: None }));

    let args = Args::try_parse_from(["hubox", "watch", "--interval", "120"]).unwrap();
    assert!(matches!(args.command, Command::Watch { interval: Some(120) }));
  }
}
