//! The common capability of every stream in the client.

use crate::error::SyncResult;
use async_trait::async_trait;
use std::sync::Arc;
use verstream_protocol::{Version, VersionedEntity};

/// An ordered, append-only source and sink of versioned entities.
///
/// Streams compose: decorators such as
/// [`BufferingStream`](crate::BufferingStream) and
/// [`MergingStream`](crate::MergingStream) wrap other streams and expose the
/// same capability.
#[async_trait]
pub trait VersionStream: Send + Sync {
    /// Prepares the stream. Must complete before the first load or append.
    async fn init(&self) -> SyncResult<()>;

    /// Delivers every entity with `version >= start` to `on_entity`, in
    /// ascending version order. Returns once all have been delivered.
    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()>;

    /// Persists `entities`. Returns once they are durable at this layer.
    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()>;
}

#[async_trait]
impl<S: VersionStream + ?Sized> VersionStream for Arc<S> {
    async fn init(&self) -> SyncResult<()> {
        (**self).init().await
    }

    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()> {
        (**self).load_from(start, on_entity).await
    }

    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        (**self).append(entities).await
    }
}

/// Collects everything from `start` on.
pub async fn load_all<S: VersionStream + ?Sized>(
    stream: &S,
    start: Version,
) -> SyncResult<Vec<VersionedEntity>> {
    let mut entities = Vec::new();
    stream
        .load_from(start, &mut |entity| entities.push(entity))
        .await?;
    Ok(entities)
}
