use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use humansize::{format_size, DECIMAL};
use log::{info, warn};
use optimizer::{
    config::{OptimizerConfig, ENV_BOT_TOKEN, ENV_CHAT_ID},
    open, scan, DeliveryReport, DeliverySink, EventChannel, FfmpegTranscoder, Job, JobEvent,
    JobQueue, JobState, Preferences, QueueEngine, TelegramSink,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Normalize videos with ffmpeg and optionally send them to Telegram
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcode up to ten videos, one after another
    Run {
        /// Video files or directories containing videos
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Deliver finished files regardless of the saved preference
        #[arg(long, conflicts_with = "no_deliver")]
        deliver: bool,

        /// Keep finished files local regardless of the saved preference
        #[arg(long)]
        no_deliver: bool,

        /// Open each finished file that is still on disk
        #[arg(long)]
        open: bool,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show or change the saved delivery preference
    Prefs {
        #[arg(long, value_enum)]
        deliver: Option<Toggle>,
    },
    /// Open a file with the default application
    Open { path: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let cfg = OptimizerConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    match args.command {
        Commands::Run {
            inputs,
            deliver,
            no_deliver,
            open,
            json,
            recursive,
        } => {
            let deliver = if deliver {
                Some(true)
            } else if no_deliver {
                Some(false)
            } else {
                None
            };
            run_batch(&cfg, &inputs, deliver, open, json, recursive).await
        }
        Commands::Prefs { deliver } => {
            update_preferences(&cfg, deliver)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Open { path } => {
            open::open_path(&path).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_batch(
    cfg: &OptimizerConfig,
    inputs: &[PathBuf],
    deliver: Option<bool>,
    open_results: bool,
    json: bool,
    recursive: bool,
) -> Result<ExitCode> {
    let deliver = match deliver {
        Some(flag) => flag,
        None => {
            Preferences::load(&cfg.preferences_path)
                .context("Failed to load preferences")?
                .send_to_telegram
        }
    };

    let files = scan::expand_inputs(inputs, recursive);
    let queue = JobQueue::submit_paths(files, deliver);
    if queue.is_empty() {
        warn!("No video files to process");
        return Ok(ExitCode::SUCCESS);
    }

    let sink = if deliver { connect_sink(cfg).await } else { None };

    let names: Vec<String> = queue.jobs().iter().map(Job::file_name).collect();
    let events = EventChannel::new();
    let mut subscription = events.subscribe().for_batch(queue.batch_id());

    let transcoder = Arc::new(FfmpegTranscoder::new(cfg));
    let mut engine = QueueEngine::with_config(cfg, queue, transcoder, sink, events)
        .context("Invalid engine configuration")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⏹️  Interrupt received, cancelling remaining jobs");
                cancel.cancel();
            }
        });
    }

    let handle = tokio::spawn(async move {
        let summary = engine.run(&cancel).await;
        (engine.into_queue(), summary)
    });

    // Ends once the engine (and with it the channel) is dropped
    while let Some(event) = subscription.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event, &names);
        }
    }

    let (queue, summary) = handle.await.context("Batch task panicked")?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&queue);
        println!(
            "{} job(s): {} done, {} failed, {} delivered",
            summary.total, summary.done, summary.failed, summary.delivered
        );
    }

    if open_results {
        for job in queue.jobs() {
            if job.state == JobState::Done && job.output_path.exists() {
                open::open_path(&job.output_path).await;
            }
        }
    }

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Build the Telegram sink and check that the chat is reachable
///
/// An unreachable chat is only a warning; each job reports its own
/// delivery outcome.
async fn connect_sink(cfg: &OptimizerConfig) -> Option<Arc<dyn DeliverySink>> {
    let Some(sink) = TelegramSink::from_config(&cfg.telegram) else {
        warn!(
            "Delivery requested but Telegram is not configured (set {} and {})",
            ENV_BOT_TOKEN, ENV_CHAT_ID
        );
        return None;
    };

    if let Err(e) = sink.verify().await {
        warn!("⚠️  Telegram check failed: {}", e);
    }
    Some(Arc::new(sink))
}

fn print_event(event: &JobEvent, names: &[String]) {
    let name = names.get(event.index()).map(String::as_str).unwrap_or("?");
    let position = format!("[{}/{}]", event.index() + 1, names.len());

    match event {
        JobEvent::Progress { percent, .. } => {
            println!("{} {} {:>6.2}%", position, name, percent);
        }
        JobEvent::Complete {
            state,
            detail,
            delivery,
            ..
        } => {
            match state {
                JobState::Done => println!("{} ✅ {}", position, name),
                _ => println!(
                    "{} ❌ {}: {}",
                    position,
                    name,
                    detail.as_deref().unwrap_or("failed")
                ),
            }
            match delivery {
                Some(DeliveryReport::Delivered { files_deleted: true }) => {
                    println!("{} 📤 sent, local files removed", position)
                }
                Some(DeliveryReport::Delivered { files_deleted: false }) => {
                    println!("{} 📤 sent, some local files could not be removed", position)
                }
                Some(DeliveryReport::Failed { error }) => {
                    println!("{} ⚠️  not sent: {}", position, error)
                }
                None => {}
            }
        }
    }
}

/// Size of each finished output still on disk next to its input
fn print_summary(queue: &JobQueue) {
    for job in queue.jobs() {
        if job.state != JobState::Done {
            continue;
        }
        let Ok(output) = std::fs::metadata(&job.output_path) else {
            continue;
        };
        let input = std::fs::metadata(&job.input_path)
            .map(|m| format_size(m.len(), DECIMAL))
            .unwrap_or_else(|_| "?".to_string());
        println!(
            "{}: {} -> {}",
            job.output_path.display(),
            input,
            format_size(output.len(), DECIMAL)
        );
    }
}

fn update_preferences(cfg: &OptimizerConfig, deliver: Option<Toggle>) -> Result<()> {
    let path = &cfg.preferences_path;
    let mut prefs = Preferences::load(path).context("Failed to load preferences")?;

    if let Some(toggle) = deliver {
        prefs.send_to_telegram = matches!(toggle, Toggle::On);
        prefs.save(path).context("Failed to save preferences")?;
        info!("Saved preferences to {}", path.display());
    }

    println!(
        "send to telegram: {}",
        if prefs.send_to_telegram { "on" } else { "off" }
    );
    Ok(())
}
