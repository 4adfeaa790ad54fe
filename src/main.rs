// webhook-relay - Main Entry Point
//
// Process wiring for the delivery pipeline:
// - CLI and configuration loading
// - Tracing subscriber setup
// - Work queue fed from newline-delimited JSON payloads
// - Delivery workers draining the queue until input ends or Ctrl-C

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use webhook_relay::config::Config;
use webhook_relay::logging::{init_tracing, TracingLogger, WebhookLogger};
use webhook_relay::webhooks::{
    spawn_workers, work_queue, DeliveryPipeline, QueueProducer, ReqwestTransport, RetryPolicy,
    WebhookPayload,
};

/// webhook-relay: deliver queued webhooks with fixed-budget retries
#[derive(Parser, Debug)]
#[command(name = "webhook-relay")]
#[command(version)]
#[command(about = "Deliver webhook payloads to HTTP endpoints with exponential backoff", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deliver newline-delimited JSON payloads read from a file or stdin
    Run {
        /// Payload file; stdin when omitted or "-"
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

/// Counters for the ingest side of a run
#[derive(Debug, Default)]
struct IngestStats {
    enqueued: usize,
    skipped: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::from_env()?,
    };

    init_tracing(&config.logging, args.verbose)?;

    match args.command {
        Some(Commands::Run { input }) => {
            info!("Starting webhook relay...");
            run_relay(config, input).await?;
        }
        Some(Commands::Config) => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
        None => {
            info!("No command specified. Use \"webhook-relay --help\" for usage.");
        }
    }

    Ok(())
}

/// Wire queue, workers and input together, then wait for the queue to drain
async fn run_relay(config: Config, input: Option<PathBuf>) -> Result<()> {
    let logger: Arc<dyn WebhookLogger> = Arc::new(TracingLogger);
    let transport = ReqwestTransport::new(config.request_timeout())
        .context("Failed to build HTTP client")?;
    let pipeline = DeliveryPipeline::new(Arc::new(transport), logger.clone());
    let policy = RetryPolicy::new(config.retry_settings(), Arc::new(pipeline), logger);

    let (producer, consumer) = work_queue(config.queue.capacity);
    let cancel = CancellationToken::new();
    let workers = spawn_workers(config.queue.workers, Arc::new(policy), consumer, cancel.clone());

    info!(
        workers = config.queue.workers,
        capacity = config.queue.capacity,
        max_attempts = config.delivery.max_attempts,
        "delivery workers started"
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping delivery workers");
            shutdown.cancel();
        }
    });

    let reader = open_input(input.as_deref())?;
    let ingest = spawn_ingest(reader, producer, cancel.clone());

    for worker in workers {
        worker.await.context("Delivery worker task failed")?;
    }

    // The reader thread may be parked on a read that never completes; once
    // cancelled it is left behind and dies with the process.
    let stats = if cancel.is_cancelled() {
        IngestStats::default()
    } else {
        ingest
            .await
            .context("Payload reader stopped unexpectedly")??
    };

    info!(
        enqueued = stats.enqueued,
        skipped = stats.skipped,
        cancelled = cancel.is_cancelled(),
        "webhook relay finished"
    );
    Ok(())
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read + Send>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open payload file {:?}", path))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdin())),
    }
}

/// Feed the queue from a dedicated OS thread, outside the runtime
fn spawn_ingest(
    reader: Box<dyn Read + Send>,
    producer: QueueProducer,
    cancel: CancellationToken,
) -> oneshot::Receiver<Result<IngestStats>> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(enqueue_lines(reader, producer, &cancel));
    });
    rx
}

/// Parse one payload per line and enqueue it, closing the queue at end of input
fn enqueue_lines(
    reader: Box<dyn Read + Send>,
    producer: QueueProducer,
    cancel: &CancellationToken,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let line = line.context("Failed to read payload input")?;
        let line_no = idx + 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let payload: WebhookPayload = match serde_json::from_str(trimmed) {
            Ok(payload) => payload,
            Err(e) => {
                error!(line = line_no, error = %e, "skipping malformed payload");
                stats.skipped += 1;
                continue;
            }
        };

        if producer.blocking_enqueue(payload).is_err() {
            // Workers are gone, which only happens after cancellation
            break;
        }
        stats.enqueued += 1;
    }

    producer.close();
    Ok(stats)
}
