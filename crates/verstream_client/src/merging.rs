//! Local-first composition of a cache and an authoritative stream.

use crate::error::SyncResult;
use crate::stream::VersionStream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, warn};
use verstream_protocol::{Version, VersionedEntity};

/// Reads the local cache first, then catches up from the remote stream and
/// writes what it fetched back into the cache.
///
/// Appends go to the remote stream first and are mirrored locally after the
/// remote acknowledged them. A failing local write never fails the
/// operation, since the authoritative copy already exists. Instead the
/// cache stops taking writes until the next load has refetched everything
/// from the lowest version it missed, so it never holds a row newer than a
/// row it lacks.
pub struct MergingStream<L, R> {
    local: L,
    remote: R,
    /// Lowest version a write-through failed to store.
    uncached_from: Mutex<Option<Version>>,
}

impl<L: VersionStream, R: VersionStream> MergingStream<L, R> {
    /// Composes `local` and `remote`.
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            uncached_from: Mutex::new(None),
        }
    }

    /// Returns the local stream.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Returns the remote stream.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the lowest version the cache is missing, if a write-through
    /// failed since the last successful repair.
    pub fn uncached_from(&self) -> Option<Version> {
        *self.uncached_from.lock()
    }

    /// Returns true if the entities were cached.
    async fn write_through(&self, entities: Vec<VersionedEntity>) -> bool {
        let Some(lowest) = entities.iter().map(|e| e.version).min() else {
            return true;
        };
        let count = entities.len();
        match self.local.append(entities).await {
            Ok(()) => {
                debug!(count, "cached remote entities");
                true
            }
            Err(err) => {
                warn!(count, %lowest, error = %err, "write-through to local cache failed");
                let mut uncached = self.uncached_from.lock();
                *uncached = Some(uncached.map_or(lowest, |v| v.min(lowest)));
                false
            }
        }
    }
}

#[async_trait]
impl<L: VersionStream, R: VersionStream> VersionStream for MergingStream<L, R> {
    async fn init(&self) -> SyncResult<()> {
        self.local.init().await?;
        self.remote.init().await
    }

    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()> {
        let uncached = self.uncached_from();
        // a repair rescans the cache from the missing version to learn what it holds
        let scan_from = uncached.map_or(start, |from| from.min(start));
        let mut next = start;
        let mut cached = HashSet::new();
        self.local
            .load_from(scan_from, &mut |entity| {
                next = next.max(entity.version.next());
                if uncached.is_some() {
                    cached.insert(entity.version);
                }
                if entity.version >= start {
                    on_entity(entity);
                }
            })
            .await?;

        let resume = uncached.map_or(next, |from| from.min(next));
        let mut fetched = Vec::new();
        self.remote
            .load_from(resume, &mut |entity| {
                if !cached.contains(&entity.version) {
                    fetched.push(entity);
                }
            })
            .await?;
        debug!(%start, %resume, fetched = fetched.len(), "merged load");

        if self.write_through(fetched.clone()).await && uncached.is_some() {
            let mut current = self.uncached_from.lock();
            if *current == uncached {
                debug!(from = ?uncached, "local cache repaired");
                *current = None;
            }
        }
        for entity in fetched {
            if entity.version >= start {
                on_entity(entity);
            }
        }
        Ok(())
    }

    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        self.remote.append(entities.clone()).await?;
        let uncached = self.uncached_from();
        match uncached {
            Some(from) => debug!(%from, count = entities.len(), "cache behind, write-through skipped"),
            None => {
                self.write_through(entities).await;
            }
        }
        Ok(())
    }
}
