//! sheetdo binary: web server, one-shot reminders and schema maintenance.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use sheetdo::clock::{Clock, SystemClock};
use sheetdo::config::{self, Config};
use sheetdo::notify::{self, LineSender, MessageSender, DEFAULT_LEAD_TIMES};
use sheetdo::schedule::{self, DailyTrigger, ReminderJob};
use sheetdo::sheet::{MemorySheet, SheetBackend};
use sheetdo::storage::{self, SharedStore, Store};
use sheetdo::web::{self, state::AppState, state::StoreStatus};

#[derive(Parser, Debug)]
#[command(name = "sheetdo", version = env!("SHEETDO_VERSION"))]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/sheetdo/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to a daily-rolling file instead of stderr, in this
    /// directory or $XDG_DATA_HOME/sheetdo when none is given.
    #[arg(long, global = true)]
    log_dir: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web server and the daily reminder.
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides config).
        #[arg(long)]
        port: Option<u16>,
        /// Keep records in memory instead of a spreadsheet.
        #[arg(long)]
        memory: bool,
    },
    /// Send due-date reminders once and print what happened.
    Notify {
        /// Pretend today is this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Bring the sheet's layout up to date.
    Migrate,
}

fn init_logging(log_dir: Option<Option<PathBuf>>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
        return Ok(None);
    };
    let dir = match dir {
        Some(dir) => dir,
        None => sheetdo::paths::log_directory()
            .context("cannot resolve log directory (is HOME set?)")?,
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(&dir, "sheetdo.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.clone())?;

    match cli.command {
        Command::Serve { host, port, memory } => {
            serve(cli.config.as_deref(), host, port, memory).await
        }
        Command::Notify { date } => notify_once(cli.config.as_deref(), date).await,
        Command::Migrate => migrate(cli.config.as_deref()).await,
    }
}

fn line_sender(config: &Config) -> Option<Arc<dyn MessageSender>> {
    config
        .notify
        .line()
        .map(|line| Arc::new(LineSender::new(line.token, line.recipient)) as Arc<dyn MessageSender>)
}

async fn serve(
    config_path: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
    memory: bool,
) -> Result<()> {
    let (config, store) = if memory {
        tracing::info!("Using in-memory records; nothing will be persisted");
        let sheet: Box<dyn SheetBackend> = Box::new(MemorySheet::new());
        let store: Store = Store::open(sheet).await?;
        // The file/env config is optional here: notifications still need it.
        (config::load(config_path).ok(), StoreStatus::Ready(Arc::new(store)))
    } else {
        let config = config::load(config_path).context("failed to load configuration")?;
        let status = match storage::connect(&config).await {
            Ok(store) => StoreStatus::Ready(store),
            Err(e) => {
                tracing::error!("Spreadsheet connection failed: {e}");
                StoreStatus::Unavailable(e.to_string())
            }
        };
        (Some(config), status)
    };

    let server = config.as_ref().map(|c| c.server.clone()).unwrap_or_default();
    let host = host.unwrap_or(server.host);
    let port = port.unwrap_or(server.port);
    let notifier = config.as_ref().and_then(line_sender);

    let shutdown = CancellationToken::new();
    let scheduler = match (&store, &notifier, &config) {
        (StoreStatus::Ready(store), Some(sender), Some(config)) => {
            let trigger = DailyTrigger::new(config.notify.time()?);
            let job = Arc::new(ReminderJob::new(store.clone(), sender.clone()));
            Some(tokio::spawn(schedule::run_daily(
                trigger,
                Arc::new(SystemClock),
                job,
                shutdown.child_token(),
            )))
        }
        _ => {
            tracing::info!("Daily reminder not scheduled");
            None
        }
    };

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {e}");
        }
        tracing::info!("Shutting down...");
        signal.cancel();
    });

    web::serve(listener, AppState::new(store, notifier), shutdown.clone()).await?;
    shutdown.cancel();
    if let Some(handle) = scheduler {
        handle.await.context("scheduler task panicked")?;
    }
    Ok(())
}

async fn open(config_path: Option<&std::path::Path>) -> Result<(Config, SharedStore)> {
    let config = config::load(config_path).context("failed to load configuration")?;
    let store = storage::connect(&config)
        .await
        .context("failed to open the spreadsheet")?;
    Ok((config, store))
}

async fn notify_once(config_path: Option<&std::path::Path>, date: Option<NaiveDate>) -> Result<()> {
    let (config, store) = open(config_path).await?;
    let sender = line_sender(&config)
        .context("LINE_CHANNEL_ACCESS_TOKEN and LINE_USER_ID must be set to send reminders")?;

    let today = date.unwrap_or_else(|| SystemClock.today());
    let records = store.list().await?;
    println!("{} record(s), reminders as of {today}", records.len());

    let results = notify::notify_due(&records, sender.as_ref(), today, &DEFAULT_LEAD_TIMES).await;
    for r in results {
        println!("  {:<14} {:?}", r.label, r.outcome);
    }
    Ok(())
}

async fn migrate(config_path: Option<&std::path::Path>) -> Result<()> {
    let (_, store) = open(config_path).await?;
    println!("Schema: {:?}", store.schema_outcome());
    Ok(())
}
