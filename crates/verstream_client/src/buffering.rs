//! Batching decorator.
//!
//! A [`BufferingStream`] owns a background task that forwards appends to the
//! inner stream one batch at a time. Appends issued while a batch is in
//! flight are queued and sent together as the next batch, flattened in the
//! order the calls were made. A batch never splits one caller's entities.
//! Every caller receives the result of the batch its entities ended up in.

use crate::error::{SyncError, SyncResult};
use crate::stream::VersionStream;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use verstream_protocol::{Version, VersionedEntity};

struct Request {
    entities: Vec<VersionedEntity>,
    reply: oneshot::Sender<SyncResult<()>>,
}

/// Serializes and coalesces appends to the inner stream.
///
/// Must be created inside a tokio runtime. The background task stops once
/// the stream is dropped and the queue has drained.
pub struct BufferingStream<S> {
    inner: Arc<S>,
    tx: mpsc::UnboundedSender<Request>,
    busy: Arc<AtomicBool>,
}

impl<S: VersionStream + 'static> BufferingStream<S> {
    /// Wraps `inner`. A batch that takes longer than `append_timeout` fails
    /// with [`SyncError::Timeout`] for all of its callers.
    pub fn new(inner: S, append_timeout: Duration) -> Self {
        Self::with_batch_limit(inner, append_timeout, usize::MAX)
    }

    /// Like [`new`](Self::new), but stops coalescing queued appends once the
    /// next one would push a batch past `max_batch` entities. An append that
    /// is larger on its own still goes out whole.
    pub fn with_batch_limit(inner: S, append_timeout: Duration, max_batch: usize) -> Self {
        let inner = Arc::new(inner);
        let busy = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_batches(
            Arc::clone(&inner),
            rx,
            Arc::clone(&busy),
            append_timeout,
            max_batch,
        ));
        Self { inner, tx, busy }
    }

    /// Returns true while a batch is being appended to the inner stream.
    pub fn busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Returns the wrapped stream.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

async fn run_batches<S: VersionStream>(
    inner: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<Request>,
    busy: Arc<AtomicBool>,
    append_timeout: Duration,
    max_batch: usize,
) {
    let mut held_back: Option<Request> = None;
    loop {
        let first = match held_back.take() {
            Some(request) => request,
            None => match rx.recv().await {
                Some(request) => request,
                None => break,
            },
        };
        let mut size = first.entities.len();
        let mut requests = vec![first];
        while let Ok(next) = rx.try_recv() {
            if size.saturating_add(next.entities.len()) > max_batch {
                held_back = Some(next);
                break;
            }
            size += next.entities.len();
            requests.push(next);
        }

        let mut entities = Vec::new();
        let mut replies = Vec::with_capacity(requests.len());
        for request in requests {
            entities.extend(request.entities);
            replies.push(request.reply);
        }
        let count = entities.len();

        busy.store(true, Ordering::SeqCst);
        let result = tokio::time::timeout(append_timeout, inner.append(entities))
            .await
            .unwrap_or(Err(SyncError::Timeout));
        busy.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => debug!(callers = replies.len(), count, "batch appended"),
            Err(err) => warn!(callers = replies.len(), count, error = %err, "batch failed"),
        }
        for reply in replies {
            // caller may have gone away
            let _ = reply.send(result.clone());
        }
    }
    debug!("buffering stream closed");
}

#[async_trait]
impl<S: VersionStream + 'static> VersionStream for BufferingStream<S> {
    async fn init(&self) -> SyncResult<()> {
        self.inner.init().await
    }

    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()> {
        self.inner.load_from(start, on_entity).await
    }

    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { entities, reply })
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)?
    }
}
