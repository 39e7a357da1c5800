//! sluice-server: accepts event streams over TCP and keeps the most recent
//! events of every source in memory.
//!
//! Configuration is read from the TOML file named by `SLUICE_CONFIG`, else
//! from `./sluice.toml` when present, else defaults are used.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tracing::info;

use sluice_codec::{BinaryCodec, CanonicalEvent, CodecContext, ContentType, EventDecoder, XmlCodec};
use sluice_core::{AccessEvent, AppendOperation, EventWrapper, LoggingEvent, SourceIdentifier};
use sluice_ingest::{IngestConfig, ServerSocketDispatcher};
use sluice_logging::SluiceSubscriberBuilder;
use sluice_storage::CircularBuffer;

const CONFIG_ENV: &str = "SLUICE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "sluice.toml";

type SourceBuffers<E> = DashMap<SourceIdentifier, Arc<CircularBuffer<EventWrapper<E>>>>;

/// Config file to load: the env override wins, then the default file if it exists
fn config_path(env_value: Option<String>) -> Option<PathBuf> {
    env_value
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()))
}

fn load_config() -> anyhow::Result<IngestConfig> {
    match config_path(std::env::var(CONFIG_ENV).ok()) {
        Some(path) => IngestConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(IngestConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let _guard = SluiceSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init()
        .context("initializing logging")?;

    let codecs = CodecContext::new();
    match config.content_type {
        ContentType::Logging => serve::<LoggingEvent>(&config, &codecs).await,
        ContentType::Access => serve::<AccessEvent>(&config, &codecs).await,
    }
}

async fn serve<E>(config: &IngestConfig, codecs: &CodecContext) -> anyhow::Result<()>
where
    E: CanonicalEvent,
    BinaryCodec: EventDecoder<E>,
    XmlCodec: EventDecoder<E>,
{
    let buffers: Arc<SourceBuffers<E>> = Arc::new(DashMap::new());
    let capacity = config.buffer_capacity;
    let provider = {
        let buffers = buffers.clone();
        move |source: &SourceIdentifier| -> Arc<dyn AppendOperation<EventWrapper<E>>> {
            buffers
                .entry(source.clone())
                .or_insert_with(|| Arc::new(CircularBuffer::new(capacity)))
                .clone()
        }
    };

    let decoder = codecs.decoder_for::<E>(config.format, config.compressed);
    let dispatcher = ServerSocketDispatcher::<E>::bind(config, decoder, Arc::new(provider))
        .await
        .context("starting dispatcher")?;
    dispatcher.start()?;

    info!(
        address = %dispatcher.local_addr(),
        content_type = %E::CONTENT_TYPE,
        format = %config.format,
        compressed = config.compressed,
        framing = ?config.framing,
        "sluice-server listening"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!(accepted = dispatcher.accepted(), "Shutting down");

    dispatcher.close();
    dispatcher.cancel_producers();
    dispatcher.join().await?;

    for entry in buffers.iter() {
        let buffer = entry.value();
        info!(
            source = %entry.key(),
            retained = buffer.size(),
            total = buffer.total_added(),
            overflow = buffer.overflow(),
            "Source totals"
        );
    }
    Ok(())
}
