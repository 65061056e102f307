//! Ludosync CLI - headless sync agent for a game library database
//!
//! Runs the change-synchronization engine against a sync backend, either as
//! a long-lived agent (`ludosync run`) or as one-shot manual operations.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ludosync_core::engine::{QueueConsumer, SyncEngine};
use ludosync_core::library::{FileStore, LibraryStore};
use ludosync_core::models::GameChangeRequest;
use ludosync_core::notify::{NotificationCategory, Notifier};
use ludosync_core::outbound::OutboundSync;
use ludosync_core::progress::Progress;
use ludosync_core::stream::ChangeStreamLoop;
use ludosync_core::sync::{GraceRegistry, SharedSettings, SyncSettings, Watermark};
use ludosync_core::transport::{HttpTransport, SyncTransport};
use ludosync_core::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "ludosync")]
#[command(about = "Keep a game library database in sync with a backend server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync agent until interrupted
    Run,
    /// Fetch and apply the server's full change snapshot
    FetchAll,
    /// Fetch and apply changes missed since the last processed one
    FetchRemaining,
    /// Fetch and apply changes for the given games
    FetchGames {
        /// Game entity ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Push every local collection to the server
    PushAll,
    /// Push the given games to the server
    PushGames {
        /// Game entity ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Probe the server's health endpoint
    Check,
    /// Show the watermark and collection counts
    Status,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] ludosync_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Synchronization is disabled; enable it in {}", .0.display())]
    SyncDisabled(PathBuf),
    #[error("Invalid game id '{0}'")]
    InvalidGameId(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ludosync=info".parse().unwrap())
                .add_directive("ludosync_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Run => run_agent(&config_path).await?,
        Commands::FetchAll => run_fetch_all(&config_path).await?,
        Commands::FetchRemaining => run_fetch_remaining(&config_path).await?,
        Commands::FetchGames { ids } => run_fetch_games(&ids, &config_path).await?,
        Commands::PushAll => run_push_all(&config_path).await?,
        Commands::PushGames { ids } => run_push_games(&ids, &config_path).await?,
        Commands::Check => run_check(&config_path).await?,
        Commands::Status => run_status(&config_path)?,
    }

    Ok(())
}

/// Everything a command needs: the engine plus the shared pieces the
/// background loops are built from.
struct SyncContext {
    engine: SyncEngine,
    consumer: QueueConsumer,
    store: LibraryStore,
    files: FileStore,
    grace: GraceRegistry,
    transport: Arc<dyn SyncTransport>,
    settings: SharedSettings,
    notifier: Arc<dyn Notifier>,
    shutdown: watch::Sender<bool>,
    shutdown_signal: watch::Receiver<bool>,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext").finish_non_exhaustive()
    }
}

fn open_context(config_path: &Path) -> Result<SyncContext, CliError> {
    let config = load_config(config_path)?;
    if !config.sync.synchronization_enabled {
        return Err(CliError::SyncDisabled(config_path.to_path_buf()));
    }
    let paths = resolve_paths(&config);

    let store = LibraryStore::open(&paths.library)?;
    let files = FileStore::open(&paths.media)?;
    let watermark = Watermark::open(&paths.state)?;
    let grace = GraceRegistry::new();
    let settings = SharedSettings::new(config.sync.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    let transport: Arc<dyn SyncTransport> = match HttpTransport::new(config.sync.base_url()) {
        Ok(transport) => Arc::new(transport),
        Err(error) => {
            notifier.notify(
                NotificationCategory::ClientError,
                &format!("could not prepare the sync client: {error}"),
            );
            return Err(error.into());
        }
    };
    tracing::info!(
        address = %config.sync.server_address,
        client_id = transport.client_id(),
        "prepared the sync client"
    );

    let (shutdown, shutdown_signal) = watch::channel(false);
    let (engine, consumer) = SyncEngine::new(
        store.clone(),
        files.clone(),
        grace.clone(),
        Arc::clone(&transport),
        watermark,
        settings.clone(),
        Arc::clone(&notifier),
        shutdown_signal.clone(),
    );

    Ok(SyncContext {
        engine,
        consumer,
        store,
        files,
        grace,
        transport,
        settings,
        notifier,
        shutdown,
        shutdown_signal,
    })
}

async fn run_agent(config_path: &Path) -> Result<(), CliError> {
    let context = open_context(config_path)?;

    match context.engine.check_connection().await {
        Ok(status) => tracing::info!(status = %status, "server reachable"),
        Err(error) => context.notifier.notify(
            NotificationCategory::HttpError,
            &format!("server health probe failed: {error}"),
        ),
    }

    if let Err(error) = context.engine.startup_fetch(&ConsoleProgress::new()).await {
        tracing::warn!("startup fetch failed: {error}");
    }

    let outbound = OutboundSync::start(
        context.store.clone(),
        context.files.clone(),
        context.grace.clone(),
        Arc::clone(&context.transport),
        context.settings.clone(),
        Arc::clone(&context.notifier),
        context.shutdown_signal.clone(),
    );
    let stream = ChangeStreamLoop::new(
        context.engine.clone(),
        Arc::clone(&context.transport),
        context.settings.clone(),
        context.shutdown_signal.clone(),
    );

    let consumer_task = tokio::spawn(context.consumer.run());
    let outbound_task = tokio::spawn(outbound.run());
    let stream_task = tokio::spawn(stream.run());

    println!("ludosync is running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = context.shutdown.send(true);
    let _ = consumer_task.await;
    let _ = outbound_task.await;
    let _ = stream_task.await;

    context.store.save()?;
    println!("library saved");
    Ok(())
}

async fn run_fetch_all(config_path: &Path) -> Result<(), CliError> {
    let context = open_context(config_path)?;
    let result = context.engine.fetch_all(&ConsoleProgress::new()).await;
    // the watermark moved past anything already applied, so keep it
    context.store.save()?;
    result?;
    println!(
        "done; last processed change {}",
        context.engine.last_processed()
    );
    Ok(())
}

async fn run_fetch_remaining(config_path: &Path) -> Result<(), CliError> {
    let context = open_context(config_path)?;
    let result = context.engine.fetch_remaining(&ConsoleProgress::new()).await;
    context.store.save()?;
    result?;
    println!(
        "done; last processed change {}",
        context.engine.last_processed()
    );
    Ok(())
}

async fn run_fetch_games(ids: &[String], config_path: &Path) -> Result<(), CliError> {
    let ids = parse_ids(ids)?;
    let context = open_context(config_path)?;
    let request = GameChangeRequest {
        ids,
        game_ids: Vec::new(),
    };
    let result = context
        .engine
        .fetch_games(&request, &ConsoleProgress::new())
        .await;
    context.store.save()?;
    result?;
    println!(
        "done; last processed change {}",
        context.engine.last_processed()
    );
    Ok(())
}

async fn run_push_all(config_path: &Path) -> Result<(), CliError> {
    let context = open_context(config_path)?;
    context.engine.push_all(&ConsoleProgress::new()).await?;
    println!("push finished");
    Ok(())
}

async fn run_push_games(ids: &[String], config_path: &Path) -> Result<(), CliError> {
    let ids = parse_ids(ids)?;
    let context = open_context(config_path)?;
    context
        .engine
        .push_games(&ids, &ConsoleProgress::new())
        .await?;
    println!("push finished");
    Ok(())
}

async fn run_check(config_path: &Path) -> Result<(), CliError> {
    let context = open_context(config_path)?;
    let status = context.engine.check_connection().await?;
    println!("{status}");
    Ok(())
}

fn run_status(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let paths = resolve_paths(&config);
    let store = LibraryStore::open(&paths.library)?;
    let watermark = Watermark::open(&paths.state)?;
    let counts = store.counts();

    println!("{:<20} {}", "server:", config.sync.server_address);
    println!(
        "{:<20} {}",
        "synchronization:",
        on_off(config.sync.synchronization_enabled)
    );
    println!(
        "{:<20} {}",
        "live send:",
        on_off(config.sync.send_live_changes)
    );
    println!(
        "{:<20} {}",
        "live fetch:",
        on_off(config.sync.fetch_live_changes)
    );
    println!("{:<20} {}", "last processed id:", watermark.last_processed());
    for (kind, count) in counts.named {
        println!("{:<20} {count}", format!("{kind}:"));
    }
    println!("{:<20} {}", "platforms:", counts.platforms);
    println!("{:<20} {}", "filter presets:", counts.filter_presets);
    println!("{:<20} {}", "games:", counts.games);
    Ok(())
}

const fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn parse_ids(raw: &[String]) -> Result<Vec<EntityId>, CliError> {
    raw.iter()
        .map(|id| {
            id.parse()
                .map_err(|_| CliError::InvalidGameId(id.clone()))
        })
        .collect()
}

/// Notification surface for a terminal: one line on stderr per event.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, category: NotificationCategory, message: &str) {
        eprintln!("[{}] {message}", category.id());
    }
}

/// Progress surface for a terminal: a counted line per step.
struct ConsoleProgress {
    total: AtomicU64,
    done: AtomicU64,
}

impl ConsoleProgress {
    const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
        }
    }
}

impl Progress for ConsoleProgress {
    fn begin(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
    }

    fn step(&self, detail: &str) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        println!("[{done}/{total}] {detail}");
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// On-disk configuration: the sync settings plus where the library lives.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CliConfig {
    sync: SyncSettings,
    /// Library snapshot path; defaults under the platform data directory
    library_path: Option<PathBuf>,
    /// Attachment directory; defaults next to the library snapshot
    media_path: Option<PathBuf>,
    /// Watermark state path; defaults next to the library snapshot
    state_path: Option<PathBuf>,
}

struct DataPaths {
    library: PathBuf,
    media: PathBuf,
    state: PathBuf,
}

fn load_config(path: &Path) -> Result<CliConfig, CliError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(CliConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("LUDOSYNC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ludosync")
        .join("config.json")
}

fn resolve_paths(config: &CliConfig) -> DataPaths {
    let data = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ludosync");
    DataPaths {
        library: config
            .library_path
            .clone()
            .unwrap_or_else(|| data.join("library.json")),
        media: config
            .media_path
            .clone()
            .unwrap_or_else(|| data.join("media")),
        state: config
            .state_path
            .clone()
            .unwrap_or_else(|| data.join("state.json")),
    }
}
