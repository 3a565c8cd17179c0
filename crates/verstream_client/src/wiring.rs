//! The standard client stack.

use crate::buffering::BufferingStream;
use crate::config::ClientConfig;
use crate::error::SyncResult;
use crate::http::{HttpClient, ReqwestClient};
use crate::local::{FileReplica, LocalReplica, ReplicaBackend};
use crate::merging::MergingStream;
use crate::remote::{Credentials, RemoteStream};
use crate::store::EntityStore;
use std::path::Path;

/// `Merging(Buffering(local), Buffering(remote))`.
pub type SyncStream<B, C> =
    MergingStream<BufferingStream<LocalReplica<B>>, BufferingStream<RemoteStream<C>>>;

/// An [`EntityStore`] over the standard stack.
pub type SyncStore<B, C> = EntityStore<SyncStream<B, C>>;

/// Builds the standard stack from its parts. Must be called inside a tokio
/// runtime.
pub fn sync_stream<B, C>(
    backend: B,
    client: C,
    config: &ClientConfig,
    credentials: Credentials,
) -> SyncStream<B, C>
where
    B: ReplicaBackend,
    C: HttpClient + 'static,
{
    let local = LocalReplica::new(backend, config.local_page_size);
    let remote = RemoteStream::new(client, config.clone(), credentials);
    MergingStream::new(
        BufferingStream::new(local, config.append_timeout),
        BufferingStream::with_batch_limit(remote, config.append_timeout, config.push_batch_size),
    )
}

/// Opens a store that caches the user's log in `cache_dir` and syncs it
/// with the server at `config.base_url`. The store still needs
/// [`init`](EntityStore::init).
pub fn open_store(
    cache_dir: impl AsRef<Path>,
    config: &ClientConfig,
    credentials: Credentials,
) -> SyncResult<SyncStore<FileReplica, ReqwestClient>> {
    let backend = FileReplica::new(cache_dir, &credentials.user_id);
    let client = ReqwestClient::new(config.request_timeout)?;
    Ok(EntityStore::new(sync_stream(
        backend,
        client,
        config,
        credentials,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::stream::VersionStream;
    use crate::local::MemoryReplica;
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn get(&self, _url: &str, _bearer: &str) -> SyncResult<HttpResponse> {
            Err(crate::SyncError::transport_fatal("offline"))
        }

        async fn post_json(&self, _url: &str, _bearer: &str, _body: Vec<u8>) -> SyncResult<HttpResponse> {
            Err(crate::SyncError::transport_fatal("offline"))
        }
    }

    #[tokio::test]
    async fn offline_load_fails_after_local_phase() {
        let config = ClientConfig::new("http://server");
        let stream = sync_stream(MemoryReplica::new(), Offline, &config, Credentials::new("u", "t"));
        stream.init().await.unwrap();

        let mut seen = 0;
        let result = stream
            .load_from(verstream_protocol::Version(0), &mut |_| seen += 1)
            .await;
        assert!(result.is_err());
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn open_store_names_cache_after_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(
            dir.path(),
            &ClientConfig::new("http://127.0.0.1:9"),
            Credentials::new("u7", "t"),
        )
        .unwrap();
        let local = store.stream().local().inner();
        assert_eq!(local.backend().path(), dir.path().join("user-u7.log"));
        assert!(!store.is_initialized());
    }
}
