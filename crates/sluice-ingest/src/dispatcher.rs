//! Server socket source dispatcher
//!
//! Accepts TCP connections and runs one [`StreamEventProducer`] per
//! connection. Each connection is registered as its own source, so two
//! clients on the same host get independent sequence spaces.
//!
//! Shutdown is split in two steps. [`ServerSocketDispatcher::close`] only
//! stops accepting; running producers keep draining their streams until the
//! caller also calls [`ServerSocketDispatcher::cancel_producers`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use sluice_codec::{EventDecoder, FrameCodec};
use sluice_core::{AppendOperation, EventWrapper, SourceIdentifier, TransportError};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::producer::{ProducerState, ProducerStatsSnapshot, StreamEventProducer};
use crate::registry::SourceRegistry;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Hands out the destination buffer for a newly connected source
pub trait BufferProvider<E>: Send + Sync {
    fn buffer_for(&self, source: &SourceIdentifier) -> Arc<dyn AppendOperation<EventWrapper<E>>>;
}

impl<E, F> BufferProvider<E> for F
where
    F: Fn(&SourceIdentifier) -> Arc<dyn AppendOperation<EventWrapper<E>>> + Send + Sync,
{
    fn buffer_for(&self, source: &SourceIdentifier) -> Arc<dyn AppendOperation<EventWrapper<E>>> {
        self(source)
    }
}

/// One buffer shared by every source
pub struct SharedBuffer<E> {
    buffer: Arc<dyn AppendOperation<EventWrapper<E>>>,
}

impl<E> SharedBuffer<E> {
    pub fn new(buffer: Arc<dyn AppendOperation<EventWrapper<E>>>) -> Self {
        Self { buffer }
    }
}

impl<E> BufferProvider<E> for SharedBuffer<E> {
    fn buffer_for(&self, _source: &SourceIdentifier) -> Arc<dyn AppendOperation<EventWrapper<E>>> {
        self.buffer.clone()
    }
}

struct DispatcherInner<E> {
    decoder: Arc<dyn EventDecoder<E>>,
    provider: Arc<dyn BufferProvider<E>>,
    frames: FrameCodec,
    registry: SourceRegistry,
    producers: DashMap<SourceIdentifier, Arc<StreamEventProducer<E>>>,
    tracker: TaskTracker,
    /// Stops the accept loop
    shutdown: CancellationToken,
    /// Parent of every producer's token
    producers_cancel: CancellationToken,
    accepted: AtomicU64,
}

/// Accepts connections and spawns a producer for each
pub struct ServerSocketDispatcher<E> {
    inner: Arc<DispatcherInner<E>>,
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl<E> ServerSocketDispatcher<E>
where
    E: Send + 'static,
{
    /// Bind the listen socket from `config.bind_address`
    #[instrument(skip_all, fields(address = %config.bind_address))]
    pub async fn bind(
        config: &IngestConfig,
        decoder: Arc<dyn EventDecoder<E>>,
        provider: Arc<dyn BufferProvider<E>>,
    ) -> IngestResult<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| TransportError::Bind {
                address: config.bind_address.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(TransportError::from)?;
        info!(local_addr = %local_addr, framing = ?config.framing, "Dispatcher bound");

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                decoder,
                provider,
                frames: config.frame_codec(),
                registry: SourceRegistry::new(),
                producers: DashMap::new(),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                producers_cancel: CancellationToken::new(),
                accepted: AtomicU64::new(0),
            }),
            local_addr,
            listener: Mutex::new(Some(listener)),
            accept_task: Mutex::new(None),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the accept loop
    pub fn start(&self) -> IngestResult<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or(IngestError::AlreadyStarted)?;
        let inner = self.inner.clone();
        *self.accept_task.lock() = Some(tokio::spawn(inner.accept_loop(listener)));
        Ok(())
    }

    /// Stop accepting new connections
    ///
    /// Producers already running are left alone.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
        // Not started yet: release the socket now.
        self.listener.lock().take();
    }

    /// Cancel every running producer; each appends its sentinel on the way out
    pub fn cancel_producers(&self) {
        info!(
            active = self.inner.producers.len(),
            "Cancelling producers"
        );
        self.inner.producers_cancel.cancel();
    }

    /// Wait for the accept loop and every producer to finish
    ///
    /// Does not return before [`close`](Self::close) was called.
    pub async fn join(&self) -> IngestResult<()> {
        let handle = self.accept_task.lock().take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| IngestError::Task(e.to_string()))?;
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        Ok(())
    }

    /// Sources with a connection still open
    pub fn active_sources(&self) -> Vec<SourceIdentifier> {
        self.inner.registry.active()
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> u64 {
        self.inner.accepted.load(Ordering::Relaxed)
    }

    pub fn producer_state(&self, source: &SourceIdentifier) -> Option<ProducerState> {
        self.inner.producers.get(source).map(|p| p.state())
    }

    pub fn producer_stats(&self, source: &SourceIdentifier) -> Option<ProducerStatsSnapshot> {
        self.inner.producers.get(source).map(|p| p.stats())
    }
}

impl<E> DispatcherInner<E>
where
    E: Send + 'static,
{
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        info!("Accept loop started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.handle_connection(stream, peer),
                    Err(e) => {
                        warn!(error = %TransportError::Accept(e.to_string()), "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
        info!(
            accepted = self.accepted.load(Ordering::Relaxed),
            "Accept loop stopped"
        );
    }

    fn handle_connection(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        self.accepted.fetch_add(1, Ordering::Relaxed);

        let lease = self.registry.register(peer.ip().to_string());
        let source = lease.source().clone();
        info!(source = %source, peer = %peer, "Accepted connection");

        let producer = Arc::new(
            StreamEventProducer::new(
                source.clone(),
                stream,
                self.decoder.clone(),
                self.provider.buffer_for(&source),
            )
            .with_frame_codec(self.frames.clone())
            .with_cancellation(self.producers_cancel.child_token()),
        );
        self.producers.insert(source.clone(), producer.clone());

        let inner = self.clone();
        self.tracker.spawn(async move {
            match producer.start_on(&inner.tracker) {
                Ok(()) => {
                    if let Err(e) = producer.join().await {
                        warn!(source = %source, error = %e, "Producer task failed");
                    }
                }
                Err(e) => warn!(source = %source, error = %e, "Failed to start producer"),
            }
            inner.producers.remove(&source);
            debug!(source = %source, stats = ?producer.stats(), "Connection finished");
            drop(lease);
        });
    }
}
