//! Command-line interface for quickcap.
//!
//! Provides commands for capturing text and voice, browsing the timeline,
//! searching, draining the offline queue, and inspecting local state.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::capture::{CaptureCoordinator, CaptureOutcome};
use crate::config::Config;
use crate::domain::{CaptureRecord, SyncStatus};
use crate::notify::{LogSink, NotificationSink};
use crate::queue::CaptureQueue;
use crate::reachability::ReachabilityMonitor;
use crate::remote::{retry_with_backoff, ApiError, CaptureApi, HttpCaptureClient};
use crate::state::Store;
use crate::sync::{SyncCoordinator, SyncState};

/// Attempts for the startup reachability probe
const PROBE_ATTEMPTS: u32 = 2;

/// quickcap - offline-first capture with remote sync
#[derive(Parser, Debug)]
#[command(name = "quickcap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture text content
    Capture {
        /// Content to capture (reads from --input or stdin if not provided)
        text: Option<String>,

        /// Read content from a file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read content from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Capture a voice recording (remote-only, no offline fallback)
    Voice {
        /// Path to the audio file
        audio: PathBuf,

        /// MIME type (detected from the extension if not specified)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show recent captures (remote timeline, local fallback)
    Timeline {
        /// Maximum number of captures to show
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Search captures on the remote service
    Search {
        /// Search query
        query: String,
    },

    /// Drain the offline queue to the remote service
    Sync,

    /// Show queue and sync status
    Status,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Capture { text, input, stdin } => {
                let content = read_content(text, input, stdin)?;
                let app = App::init().await?;

                match app.capture.capture(&content).await? {
                    CaptureOutcome::Remote(record) => {
                        println!("Saved to remote ({})", record.id);
                    }
                    CaptureOutcome::QueuedOffline(record) => {
                        println!("Offline: queued locally ({})", record.id);
                        println!("Run `quickcap sync` once back online.");
                    }
                }
                Ok(())
            }

            Commands::Voice { audio, mime } => {
                let bytes = tokio::fs::read(&audio)
                    .await
                    .with_context(|| format!("Failed to read audio file: {}", audio.display()))?;
                let mime = mime.unwrap_or_else(|| detect_mime(&audio).to_string());

                let app = App::init().await?;
                let record = app.capture.capture_voice(bytes, &mime).await?;
                println!("Saved to remote ({})", record.id);
                println!("{}", record.content);
                Ok(())
            }

            Commands::Timeline { limit } => {
                let app = App::init().await?;
                let captures = app.capture.load_captures(limit).await?;

                if captures.is_empty() {
                    println!("No captures yet.");
                } else {
                    for record in &captures {
                        print_record(record);
                    }
                }
                Ok(())
            }

            Commands::Search { query } => {
                let app = App::init().await?;
                let results = app.capture.search(&query).await;

                if results.is_empty() {
                    println!("No results.");
                } else {
                    for record in &results {
                        print_record(record);
                    }
                }
                Ok(())
            }

            Commands::Sync => {
                let app = App::init().await?;
                let report = app.sync.manual_sync().await?;

                if report.skipped {
                    println!("A sync is already in flight.");
                } else if report.attempted == 0 {
                    println!("Nothing to sync.");
                } else {
                    println!(
                        "Synced {}/{} captures ({} still pending)",
                        report.synced, report.attempted, report.failed
                    );
                }
                Ok(())
            }

            Commands::Status => {
                let app = App::init().await?;
                let stats = app.queue.stats()?;
                let state = app.sync.state().get();

                println!(
                    "Network:  {}",
                    if state.online { "online" } else { "offline" }
                );
                println!("Pending:  {}", stats.unsynced);
                println!("Synced:   {}", stats.synced);
                println!("Total:    {}", stats.total);
                match state.last_sync_time {
                    Some(at) => println!("Last sync: {}", at.to_rfc3339()),
                    None => println!("Last sync: never"),
                }
                Ok(())
            }

            Commands::Config => {
                let config = Config::load()?;

                println!("Base URL:    {}", config.base_url);
                println!(
                    "API key:     {}",
                    if config.api_key.is_empty() {
                        "(not set)"
                    } else {
                        "configured"
                    }
                );
                println!("Timeout:     {}s", config.timeout.as_secs());
                println!("Max retries: {}", config.max_retries);
                println!("Home:        {}", config.home.display());
                match config.config_file {
                    Some(path) => println!("Config file: {}", path.display()),
                    None => println!("Config file: (none found)"),
                }
                Ok(())
            }
        }
    }
}

/// Wired-up application services.
struct App {
    queue: Arc<CaptureQueue>,
    capture: CaptureCoordinator,
    sync: Arc<SyncCoordinator>,
}

impl App {
    /// Load config, open the local queue, probe the remote once to seed
    /// reachability, and wire the coordinators together.
    async fn init() -> Result<Self> {
        let config = Config::load()?;

        let queue = Arc::new(
            CaptureQueue::open(&config.db_path())
                .with_context(|| format!("Failed to open {}", config.db_path().display()))?,
        );

        // Assume online until the probe says otherwise, so the probe itself
        // is not short-circuited to an offline error.
        let monitor = ReachabilityMonitor::new(true);
        let api: Arc<dyn CaptureApi> =
            Arc::new(HttpCaptureClient::new(&config, monitor.handle())?);

        let online = retry_with_backoff(
            PROBE_ATTEMPTS,
            Duration::from_millis(250),
            || api.health(),
            |e| matches!(e, ApiError::Network(_)),
        )
        .await
        .is_ok();
        monitor.set_online(online);

        let stats = queue.stats()?;
        let state = Store::new(SyncState::new(online, stats.unsynced));
        let notifier: Arc<dyn NotificationSink> = Arc::new(LogSink);

        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&api),
            state.clone(),
            Arc::clone(&notifier),
        ));
        let capture = CaptureCoordinator::new(api, Arc::clone(&queue), state, notifier);

        Ok(Self {
            queue,
            capture,
            sync,
        })
    }
}

/// Resolve capture content from args, a file, or stdin.
fn read_content(text: Option<String>, input: Option<PathBuf>, stdin: bool) -> Result<String> {
    if let Some(path) = input {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    if stdin {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        return Ok(content);
    }

    text.context("No content provided. Pass TEXT, --input FILE, or --stdin")
}

/// MIME type from a file extension, defaulting to webm audio.
fn detect_mime(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "audio/webm",
    }
}

fn print_record(record: &CaptureRecord) {
    let marker = match record.status {
        SyncStatus::Pending => "*",
        SyncStatus::Synced => " ",
    };

    println!(
        "{} {}  [{}] {}",
        marker,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.kind.as_str(),
        truncate(&record.content, 72)
    );
}

fn truncate(content: &str, max_chars: usize) -> String {
    let flattened = content.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let cut: String = flattened.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
