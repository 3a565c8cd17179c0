//! The client's local cache of the log.
//!
//! A [`LocalReplica`] exposes a [`ReplicaBackend`] as a [`VersionStream`].
//! The backend is synchronous; the replica runs it on the blocking pool.

mod file;
mod memory;

pub use file::FileReplica;
pub use memory::MemoryReplica;

use crate::error::{SyncError, SyncResult};
use crate::stream::VersionStream;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use verstream_protocol::{Version, VersionedEntity};

/// Storage behind a [`LocalReplica`].
pub trait ReplicaBackend: Send + Sync + 'static {
    /// Opens the backend. Calling it again is a no-op.
    fn open(&self) -> SyncResult<()>;

    /// Returns up to `limit` entities with `version >= start`, ascending.
    fn scan_page(&self, start: Version, limit: usize) -> SyncResult<Vec<VersionedEntity>>;

    /// Stores all entities or none.
    ///
    /// Fails with [`SyncError::Conflict`] if a version is already stored or
    /// occurs twice in `entities`.
    fn insert_all(&self, entities: &[VersionedEntity]) -> SyncResult<()>;

    /// Number of stored entities.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`ReplicaBackend`] as a [`VersionStream`].
pub struct LocalReplica<B> {
    backend: Arc<B>,
    page_size: usize,
    opened: OnceCell<()>,
}

impl<B: ReplicaBackend> LocalReplica<B> {
    /// Creates a replica that reads `page_size` entities at a time.
    pub fn new(backend: B, page_size: usize) -> Self {
        Self {
            backend: Arc::new(backend),
            page_size: page_size.max(1),
            opened: OnceCell::new(),
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.opened.initialized() {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }

    async fn run<T, F>(&self, f: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&B) -> SyncResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || f(&backend))
            .await
            .map_err(|_| SyncError::Closed)?
    }
}

#[async_trait]
impl<B: ReplicaBackend> VersionStream for LocalReplica<B> {
    async fn init(&self) -> SyncResult<()> {
        self.opened
            .get_or_try_init(|| self.run(|backend| backend.open()))
            .await?;
        Ok(())
    }

    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()> {
        self.ensure_open()?;
        let limit = self.page_size;
        let mut cursor = Some(start);
        while let Some(from) = cursor {
            let page = self
                .run(move |backend| backend.scan_page(from, limit))
                .await?;
            let full = page.len() == limit;
            debug!(start = %from, count = page.len(), "local page read");
            for entity in page {
                cursor = entity.version.checked_next();
                on_entity(entity);
            }
            if !full {
                break;
            }
        }
        Ok(())
    }

    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        self.ensure_open()?;
        if entities.is_empty() {
            return Ok(());
        }
        self.run(move |backend| backend.insert_all(&entities)).await
    }
}
