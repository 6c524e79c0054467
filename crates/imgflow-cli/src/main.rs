use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imgflow_core::app::{Pipeline, PipelineBuilder, RejectionPolicy};
use imgflow_core::config::{
    DeadLetterSettings, ENV_EMAIL_FROM, ENV_EMAIL_TO, ENV_REGION, MailSettings, PipelineConfig,
    QueueSettings,
};
use imgflow_core::domain::DecodeError;
use imgflow_core::impls::{InMemoryMetadataStore, InMemoryObjectStore, LogMailer};
use imgflow_core::ports::{MetadataStore, ObjectStore, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "imgflow", about = "Event-driven image ingestion pipeline")]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// Mail transport region
    #[arg(long, env = ENV_REGION)]
    region: String,

    /// Sender address for notifications
    #[arg(long, env = ENV_EMAIL_FROM)]
    email_from: String,

    /// Fixed recipient of every notification
    #[arg(long, env = ENV_EMAIL_TO)]
    email_to: String,

    /// Deliveries before a failing message is dead-lettered
    #[arg(long, default_value_t = 1)]
    max_receive_count: u32,

    /// Messages per poll (1-10)
    #[arg(long, default_value_t = 5)]
    batch_size: usize,

    /// Visibility timeout in seconds
    #[arg(long, default_value_t = 15)]
    visibility_timeout: u64,

    /// Mail rejections from the image processor instead of via the dead-letter queue
    #[arg(long)]
    reject_directly: bool,
}

impl SettingsArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let queue = QueueSettings {
            batch_size: self.batch_size,
            max_receive_count: self.max_receive_count,
            visibility_timeout: Duration::from_secs(self.visibility_timeout),
            ..QueueSettings::default()
        };
        PipelineConfig::new(
            MailSettings::new(&self.region, &self.email_from, &self.email_to),
            queue,
            DeadLetterSettings::default(),
        )
        .context("invalid configuration")
    }

    fn rejection_policy(&self) -> RejectionPolicy {
        if self.reject_directly {
            RejectionPolicy::NotifyDirectly
        } else {
            RejectionPolicy::DeadLetter
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload, caption and remove a few objects against in-memory collaborators
    Demo,

    /// Feed recorded store notification documents through the pipeline
    Replay {
        /// JSON files with a `Records` array
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON caption requests (`{"name": .., "description": ..}`) applied after the uploads
        #[arg(long = "caption")]
        captions: Vec<PathBuf>,
    },

    /// Run the queue workers, ingesting one JSON document per stdin line
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.settings.config()?;
    info!(region = %config.mail.region, to = %config.mail.to, "configuration loaded");

    let store = Arc::new(InMemoryMetadataStore::new());
    let pipeline = PipelineBuilder::new(config)
        .metadata_store(store.clone())
        .mailer(Arc::new(LogMailer))
        .rejection_policy(cli.settings.rejection_policy())
        .build()
        .context("failed to build pipeline")?;

    match cli.command {
        Command::Demo => demo(&pipeline).await?,
        Command::Replay { files, captions } => replay(&pipeline, &files, &captions).await?,
        Command::Serve => serve(&pipeline).await?,
    }

    for record in store.snapshot().await {
        info!(image = %record.image_name, description = ?record.description, "image record");
    }
    report_status(&pipeline).await
}

async fn demo(pipeline: &Pipeline) -> Result<()> {
    let bucket = InMemoryObjectStore::new("images", pipeline.bus().clone(), Arc::new(SystemClock));

    for key in ["cat.jpg", "sunset.png", "doc.pdf"] {
        bucket
            .put_object(key, Vec::new())
            .await
            .with_context(|| format!("failed to upload {key}"))?;
    }
    pipeline.drain().await.context("failed to drain queues")?;

    pipeline.request_caption("cat.jpg", "a cat").await;
    bucket
        .remove_object("sunset.png")
        .await
        .context("failed to remove sunset.png")?;

    let images = pipeline.metadata_store().len().await?;
    info!(images, "demo finished");
    Ok(())
}

async fn replay(pipeline: &Pipeline, files: &[PathBuf], captions: &[PathBuf]) -> Result<()> {
    for path in files {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let report = pipeline
            .ingest_store_notification(&json)
            .await
            .with_context(|| format!("failed to decode {}", path.display()))?;
        info!(file = %path.display(), events = report.events, skipped = report.skipped, "notification replayed");
    }
    pipeline.drain().await.context("failed to drain queues")?;

    for path in captions {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        pipeline
            .ingest_caption_request(&json)
            .await
            .with_context(|| format!("failed to decode {}", path.display()))?;
    }
    Ok(())
}

/// Ingest one JSON document per stdin line while the workers run.
///
/// Lines with a `Records` array are store notifications; anything else is
/// tried as a caption request. Stops on Ctrl-C or end of input.
async fn serve(pipeline: &Pipeline) -> Result<()> {
    let handle = pipeline.spawn_workers();
    info!(workers = handle.worker_count(), "workers running, reading documents from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            signal = &mut interrupt => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    info!("end of input");
                    break;
                };
                if !line.trim().is_empty() {
                    ingest_line(pipeline, &line).await;
                }
            }
        }
    }

    info!("shutting down");
    handle.shutdown_and_join().await;
    // whatever the workers left visible
    pipeline.drain().await.context("failed to drain queues")?;
    Ok(())
}

async fn ingest_line(pipeline: &Pipeline, line: &str) {
    match pipeline.ingest_store_notification(line).await {
        Ok(report) => info!(events = report.events, skipped = report.skipped, "notification ingested"),
        Err(DecodeError::MissingRecords) => match pipeline.ingest_caption_request(line).await {
            Ok(report) => info!(matched = report.matched, "caption request ingested"),
            Err(err) => warn!(error = %err, "unrecognised document skipped"),
        },
        Err(err) => warn!(error = %err, "unreadable document skipped"),
    }
}

async fn report_status(pipeline: &Pipeline) -> Result<()> {
    let status = pipeline.status().await.context("failed to read queue counts")?;
    info!(
        subscriptions = status.subscriptions,
        image_queue = ?status.image_queue,
        dead_letter_queue = ?status.dead_letter_queue,
        "pipeline status"
    );
    Ok(())
}
