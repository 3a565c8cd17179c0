//! Read-only decorator.

use crate::error::{SyncError, SyncResult};
use crate::stream::VersionStream;
use async_trait::async_trait;
use verstream_protocol::{Version, VersionedEntity};

/// Wraps a stream and refuses every append.
pub struct ReadOnlyStream<S> {
    inner: S,
}

impl<S: VersionStream> ReadOnlyStream<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Returns the wrapped stream.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: VersionStream> VersionStream for ReadOnlyStream<S> {
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
        Err(SyncError::Permission(format!(
            "read-only stream rejected {} entities",
            entities.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalReplica, MemoryReplica, ReplicaBackend};
    use crate::stream::load_all;

    #[tokio::test]
    async fn reads_pass_writes_fail() {
        let replica = LocalReplica::new(MemoryReplica::new(), 10);
        replica.init().await.unwrap();
        replica.append(vec![VersionedEntity::tombstone(0, 1)]).await.unwrap();

        let stream = ReadOnlyStream::new(replica);
        stream.init().await.unwrap();
        assert_eq!(load_all(&stream, Version(0)).await.unwrap().len(), 1);

        let err = stream.append(vec![VersionedEntity::tombstone(1, 1)]).await.unwrap_err();
        assert!(matches!(err, SyncError::Permission(_)));
        assert_eq!(stream.inner().backend().len(), 1);
    }
}
