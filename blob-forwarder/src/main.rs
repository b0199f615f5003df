mod buffer;
mod errors;
mod format;
mod params;

use std::time::Duration;
use append_blob_writer::{AppendBlobWriter, BlobServices, ConfigError, NameGenerator};
use blob_store::LocalAppendBlobStore;
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;
use validator::Validate;
use crate::buffer::ChunkBuffer;
use crate::errors::ForwarderError;
use crate::format::{format_record, parse_record};
use crate::params::Args;

#[tokio::main]
async fn main() -> Result<(), ForwarderError> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut writer = start_writer(&args).await?;
    let mut buffer = ChunkBuffer::new(args.timekey_secs, args.flush_bytes);

    let result = forward(&args, &mut writer, &mut buffer).await;

    if let Err(e) = buffer.flush(&mut writer).await {
        tracing::error!("final flush failed, dropping {} buffered bytes: {}", buffer.size(), e);
    }
    writer.shutdown().await;
    result
}

async fn start_writer(args: &Args) -> Result<AppendBlobWriter, ForwarderError> {
    let config = args.writer_config();
    let Some(dir) = &args.local_dir else {
        return Ok(AppendBlobWriter::start(&config).await?);
    };

    config.validate().map_err(ConfigError::from)?;
    let container = config.container.clone().ok_or(ConfigError::MissingContainer)?;
    let naming = NameGenerator::new(
        &config.object_key_format,
        &config.path,
        &config.time_slice_format,
        config.localtime,
    )?;
    tracing::info!("writing blobs under local directory {}", dir.display());

    let writer = AppendBlobWriter::from_parts(
        BlobServices::Local(LocalAppendBlobStore::new(dir)),
        container,
        naming,
        config.block_size_limit,
        config.auto_create_container,
        None,
    )
    .await?;
    Ok(writer)
}

/// Reads stdin until EOF or Ctrl-C, flushing whenever the buffer asks for it
/// and on every flush interval. Flushes run one at a time.
async fn forward(args: &Args, writer: &mut AppendBlobWriter, buffer: &mut ChunkBuffer) -> Result<(), ForwarderError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let period = Duration::from_secs(args.flush_interval_secs.max(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let now = Utc::now();
                    let formatted = format_record(now, &args.tag, &parse_record(&line));
                    if buffer.push(now, &formatted) {
                        flush(writer, buffer).await;
                    }
                }
                None => {
                    tracing::info!("input closed");
                    return Ok(());
                }
            },
            _ = ticker.tick() => flush(writer, buffer).await,
            _ = &mut interrupted => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

async fn flush(writer: &mut AppendBlobWriter, buffer: &mut ChunkBuffer) {
    if buffer.is_empty() {
        return;
    }
    match buffer.flush(writer).await {
        Ok(chunks) => tracing::debug!("flushed {} chunks, now at {}", chunks, writer.current_object()),
        Err(e) => tracing::error!("flush failed, keeping {} bytes for the next attempt: {}", buffer.size(), e),
    }
}
