use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

use agora::api::types::VoteKind;
use agora::api::HttpAdapter;
use agora::cache::{CacheWorker, FetchOutcome, ReqwestFetch, SqliteCacheStorage};
use agora::config::Config;
use agora::session::{SessionContext, SessionEvent, SessionStore};
use agora::store::media::{MediaStore, UploadFile};
use agora::store::notification::NotificationStore;
use agora::store::opinion::{OpinionFilter, OpinionStore};
use agora::store::user::UserStore;

#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(about = "Command-line client for the Agora civic opinions platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/agora/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in and persist the session
  Login { username: String, password: String },
  /// Register a new account and log in with it
  Register {
    username: String,
    email: String,
    password: String,
  },
  /// Clear the persisted session
  Logout,
  /// Show the authenticated user profile
  Me,
  /// List opinions
  Opinions {
    #[arg(long)]
    page: Option<u64>,
    #[arg(long)]
    category: Option<u64>,
    #[arg(long)]
    status: Option<String>,
  },
  /// Show one opinion with its vote tally and bookmark state
  Show { id: u64 },
  /// Vote on an opinion (like or support)
  Vote { id: u64, kind: String },
  /// Bookmark an opinion (or remove the bookmark)
  Bookmark {
    id: u64,
    #[arg(long)]
    remove: bool,
  },
  /// Upload a media file
  Upload { file: PathBuf },
  /// List notifications
  Notifications {
    #[arg(long)]
    unread: bool,
  },
  /// Offline cache maintenance
  Cache {
    #[command(subcommand)]
    action: CacheCommand,
  },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Precache the portal shell and purge stale generations
  Install,
  /// Serve a URL through the offline cache policies
  Fetch { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_tracing()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let session = Arc::new(SessionContext::load(SessionStore::open()?)?);
  let mut expiry = session.subscribe();

  let api = Arc::new(HttpAdapter::new(&config.api, Arc::clone(&session))?);

  let outcome = run_command(args.command, &config, &session, &api).await;

  // The adapter tears the session down on any 401; surface the redirect
  // side effect once, whatever command was running.
  if matches!(expiry.try_recv(), Ok(SessionEvent::Expired)) {
    eprintln!("Session expired; run `agora login` to sign in again.");
  }

  outcome
}

async fn run_command(
  command: Command,
  config: &Config,
  session: &Arc<SessionContext>,
  api: &Arc<HttpAdapter>,
) -> Result<()> {
  match command {
    Command::Login { username, password } => {
      let users = UserStore::new(Arc::clone(api), Arc::clone(session));
      let user = users.login(&username, &password).await?;
      match user {
        Some(user) => println!("Logged in as {} ({})", user.username, user.role),
        None => println!("Logged in"),
      }
    }

    Command::Register {
      username,
      email,
      password,
    } => {
      let users = UserStore::new(Arc::clone(api), Arc::clone(session));
      users.register(&username, &email, &password).await?;
      println!("Registered and logged in as {username}");
    }

    Command::Logout => {
      let users = UserStore::new(Arc::clone(api), Arc::clone(session));
      users.logout()?;
      println!("Logged out");
    }

    Command::Me => {
      let users = UserStore::new(Arc::clone(api), Arc::clone(session));
      let user = users.get_profile().await?;
      println!("{} <{}> role={}", user.username, user.email, user.role);
    }

    Command::Opinions {
      page,
      category,
      status,
    } => {
      let opinions = OpinionStore::new(Arc::clone(api));
      let filter = OpinionFilter {
        page,
        page_size: None,
        category_id: category,
        status,
      };
      let result = opinions.fetch_opinions(&filter).await?;
      for opinion in &result.items {
        println!("#{:<6} [{}] {}", opinion.id, opinion.status, opinion.title);
      }
      println!("{} of {} opinions", result.items.len(), result.total);
    }

    Command::Show { id } => {
      let opinions = OpinionStore::new(Arc::clone(api));
      let detail = opinions.fetch_opinion(id).await?;
      println!("#{} {}", detail.opinion.id, detail.opinion.title);
      println!("{}", detail.opinion.content);
      println!(
        "likes={} supports={} bookmarked={}",
        detail.upvotes, detail.downvotes, detail.is_bookmarked
      );
    }

    Command::Vote { id, kind } => {
      let kind = match kind.as_str() {
        "like" => VoteKind::Like,
        "support" => VoteKind::Support,
        other => return Err(eyre!("Unknown vote kind '{}': use like or support", other)),
      };
      let opinions = OpinionStore::new(Arc::clone(api));
      let detail = opinions.vote(id, kind).await?;
      println!("likes={} supports={}", detail.upvotes, detail.downvotes);
    }

    Command::Bookmark { id, remove } => {
      let opinions = OpinionStore::new(Arc::clone(api));
      let detail = if remove {
        opinions.unbookmark(id).await?
      } else {
        opinions.bookmark(id).await?
      };
      println!("bookmarked={}", detail.is_bookmarked);
    }

    Command::Upload { file } => {
      let bytes = std::fs::read(&file)
        .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
      let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .ok_or_else(|| eyre!("Invalid file name: {}", file.display()))?;

      let media = MediaStore::new(Arc::clone(api));
      let uploaded = media
        .upload(UploadFile {
          filename,
          content_type: "application/octet-stream".to_string(),
          bytes,
        })
        .await?;
      println!("Uploaded {} -> {}", uploaded.filename, uploaded.url);
    }

    Command::Notifications { unread } => {
      let notifications = NotificationStore::new(Arc::clone(api));
      notifications.fetch_notifications(unread).await;
      for notification in notifications.notifications() {
        let marker = if notification.is_read { " " } else { "*" };
        println!("{} #{:<6} {}", marker, notification.id, notification.title);
      }
      println!("{} unread", notifications.unread_count());
    }

    Command::Cache { action } => run_cache_command(action, config).await?,
  }

  Ok(())
}

async fn run_cache_command(action: CacheCommand, config: &Config) -> Result<()> {
  let origin = Url::parse(&config.cache.origin)
    .map_err(|e| eyre!("Invalid cache origin {}: {}", config.cache.origin, e))?;
  let storage = Arc::new(SqliteCacheStorage::open()?);
  let fetch = ReqwestFetch::new(origin.clone(), Duration::from_secs(config.api.timeout_secs))?;
  let (clients, _commands) = mpsc::unbounded_channel();
  let mut worker = CacheWorker::new(
    storage,
    fetch,
    origin,
    config.cache.api_prefix.clone(),
    config.cache.version,
    clients,
  );

  match action {
    CacheCommand::Install => {
      worker.install().await?;
      worker.activate()?;
      println!(
        "Precached shell into {} (runtime generation {})",
        worker.precache_generation(),
        worker.runtime_generation()
      );
    }
    CacheCommand::Fetch { url } => {
      worker.activate()?;
      match worker.handle_fetch(&url).await? {
        FetchOutcome::Response(served) => {
          println!(
            "{} ({} bytes, served from {:?})",
            served.response.status,
            served.response.body.len(),
            served.from
          );
        }
        FetchOutcome::Bypass => println!("Cross-origin request, not intercepted"),
      }
    }
  }

  Ok(())
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("agora")
    .join("logs");

  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "agora.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
