//! Materialized view over a version stream.
//!
//! An [`EntityStore`] keeps every row it has seen in an append-only arena
//! sorted by version, plus the current snapshot of each live entity. The
//! snapshot is what applications read; the arena answers lookups of older
//! versions and derives the next free version and entity numbers.

use crate::error::{SyncError, SyncResult};
use crate::stream::VersionStream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use verstream_protocol::{EntityId, EntityKind, Version, VersionedEntity};

#[derive(Debug, Default)]
struct View {
    /// Every folded row, ascending by version.
    log: Vec<VersionedEntity>,
    /// Latest snapshot of each live entity, in order of first appearance.
    snapshot: Vec<VersionedEntity>,
    slots: HashMap<EntityId, usize>,
}

impl View {
    fn fold(&mut self, entity: VersionedEntity) {
        let at = self.log.partition_point(|e| e.version <= entity.version);
        self.log.insert(at, entity.clone());
        self.apply(entity);
    }

    fn apply(&mut self, entity: VersionedEntity) {
        let id = entity.entity;
        match self.slots.get(&id).copied() {
            Some(slot) if entity.is_tombstone() => {
                self.snapshot.remove(slot);
                self.slots.remove(&id);
                for other in self.slots.values_mut() {
                    if *other > slot {
                        *other -= 1;
                    }
                }
            }
            Some(slot) => self.snapshot[slot] = entity,
            None if entity.is_tombstone() => {}
            None => {
                self.slots.insert(id, self.snapshot.len());
                self.snapshot.push(entity);
            }
        }
    }

    fn rebuild(&mut self) {
        self.snapshot.clear();
        self.slots.clear();
        let log = std::mem::take(&mut self.log);
        for entity in &log {
            self.apply(entity.clone());
        }
        self.log = log;
    }

    /// Removes the rows of a failed save and replays the rest.
    fn rollback(&mut self, saved: &[VersionedEntity]) {
        for entity in saved.iter().rev() {
            if let Some(pos) = self.log.iter().rposition(|e| e == entity) {
                self.log.remove(pos);
            }
        }
        self.rebuild();
    }

    fn next_version(&self) -> Version {
        self.log.last().map_or(Version::ZERO, |e| e.version.next())
    }
}

/// The application-facing state of one user's log.
///
/// `init` and `refresh` run exclusively; saves may run concurrently with
/// each other and are coalesced by the stream underneath. Readers never
/// wait for the stream.
pub struct EntityStore<S> {
    stream: S,
    gate: tokio::sync::RwLock<()>,
    initialized: AtomicBool,
    view: RwLock<View>,
}

impl<S: VersionStream> EntityStore<S> {
    /// Creates an empty store over `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            gate: tokio::sync::RwLock::new(()),
            initialized: AtomicBool::new(false),
            view: RwLock::new(View::default()),
        }
    }

    /// Returns the underlying stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Returns true once [`init`](Self::init) has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Initializes the stream and loads the whole log. Later calls are
    /// no-ops; use [`refresh`](Self::refresh) to pick up new rows.
    pub async fn init(&self) -> SyncResult<()> {
        let _exclusive = self.gate.write().await;
        if self.is_initialized() {
            return Ok(());
        }

        if let Err(err) = self.load_everything().await {
            *self.view.write() = View::default();
            return Err(err);
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(
            rows = self.len(),
            entities = self.view.read().snapshot.len(),
            "entity store initialized"
        );
        Ok(())
    }

    /// Loads rows written since the last load, e.g. by another writer after
    /// a save failed with a conflict. Returns the number of new rows.
    pub async fn refresh(&self) -> SyncResult<usize> {
        let _exclusive = self.gate.write().await;
        self.ensure_initialized()?;

        let start = self.next_version();
        let mut count = 0;
        self.stream
            .load_from(start, &mut |entity| {
                count += 1;
                self.view.write().fold(entity);
            })
            .await?;
        debug!(%start, count, "entity store refreshed");
        Ok(count)
    }

    /// Folds `entities` into the view, then appends them to the stream.
    ///
    /// The new rows are visible to readers immediately. If the append fails
    /// they are removed again and the error is returned.
    pub async fn save(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        let _shared = self.gate.read().await;
        self.ensure_initialized()?;
        if entities.is_empty() {
            return Ok(());
        }

        {
            let mut view = self.view.write();
            for entity in &entities {
                view.fold(entity.clone());
            }
        }

        let count = entities.len();
        if let Err(err) = self.stream.append(entities.clone()).await {
            self.view.write().rollback(&entities);
            warn!(count, error = %err, "save rolled back");
            return Err(err);
        }
        debug!(count, "saved");
        Ok(())
    }

    /// Live entities of `kind`, in order of first appearance.
    pub fn get_all_of_type(&self, kind: EntityKind) -> Vec<VersionedEntity> {
        self.view
            .read()
            .snapshot
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    /// The row with exactly `version`, tombstoned or not.
    pub fn get_by_version(&self, version: Version) -> Option<VersionedEntity> {
        let view = self.view.read();
        let at = view.log.partition_point(|e| e.version < version);
        view.log.get(at).filter(|e| e.version == version).cloned()
    }

    /// The latest snapshot of `entity`, unless it was deleted.
    pub fn get(&self, entity: EntityId) -> Option<VersionedEntity> {
        let view = self.view.read();
        view.slots.get(&entity).map(|&slot| view.snapshot[slot].clone())
    }

    /// All live entities.
    pub fn snapshot(&self) -> Vec<VersionedEntity> {
        self.view.read().snapshot.clone()
    }

    /// One past the highest version seen, or zero.
    pub fn next_version(&self) -> Version {
        self.view.read().next_version()
    }

    /// One past the highest entity id seen, or zero.
    pub fn next_entity(&self) -> EntityId {
        self.view
            .read()
            .log
            .iter()
            .map(|e| e.entity)
            .max()
            .map_or(EntityId(0), EntityId::next)
    }

    /// Number of rows seen.
    pub fn len(&self) -> usize {
        self.view.read().log.len()
    }

    /// Returns true if no rows have been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load_everything(&self) -> SyncResult<()> {
        self.stream.init().await?;
        self.stream
            .load_from(Version::ZERO, &mut |entity| self.view.write().fold(entity))
            .await
    }

    fn ensure_initialized(&self) -> SyncResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalReplica, MemoryReplica};
    use crate::read_only::ReadOnlyStream;
    use proptest::prelude::*;
    use std::sync::Arc;
    use verstream_protocol::model::{Aerodrome, Aircraft};
    use verstream_protocol::EntityBody;

    type Replica = LocalReplica<MemoryReplica>;

    fn aircraft(version: i64, entity: i64, registration: &str) -> VersionedEntity {
        VersionedEntity::new(
            version,
            entity,
            EntityBody::Aircraft(Aircraft {
                registration: registration.into(),
                model: "C172".into(),
            }),
        )
    }

    fn aerodrome(version: i64, entity: i64) -> VersionedEntity {
        VersionedEntity::new(
            version,
            entity,
            EntityBody::Aerodrome(Aerodrome {
                code: format!("E{entity:03}"),
            }),
        )
    }

    async fn store() -> EntityStore<Arc<Replica>> {
        let store = EntityStore::new(Arc::new(LocalReplica::new(MemoryReplica::new(), 4)));
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn save_requires_init() {
        let store = EntityStore::new(LocalReplica::new(MemoryReplica::new(), 4));
        let err = store.save(vec![aircraft(0, 0, "PH-ABC")]).await.unwrap_err();
        assert!(matches!(err, SyncError::NotInitialized));
        assert!(matches!(store.refresh().await, Err(SyncError::NotInitialized)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_store_counters() {
        let store = store().await;
        assert!(store.is_initialized());
        assert_eq!(store.next_version(), Version(0));
        assert_eq!(store.next_entity(), EntityId(0));
    }

    #[tokio::test]
    async fn tombstone_hides_entity_but_keeps_history() {
        let store = store().await;
        store.save(vec![aircraft(0, 0, "PH-ABC")]).await.unwrap();
        store.save(vec![VersionedEntity::tombstone(1, 0)]).await.unwrap();

        assert!(store.get_all_of_type(EntityKind::Aircraft).is_empty());
        assert_eq!(store.get_by_version(Version(0)), Some(aircraft(0, 0, "PH-ABC")));
        assert_eq!(store.get(EntityId(0)), None);
        assert_eq!(store.next_version(), Version(2));
        assert_eq!(store.next_entity(), EntityId(1));
    }

    #[tokio::test]
    async fn newer_version_replaces_snapshot_in_place() {
        let store = store().await;
        store
            .save(vec![aircraft(0, 0, "PH-ABC"), aerodrome(1, 1), aircraft(2, 2, "PH-XYZ")])
            .await
            .unwrap();
        store.save(vec![aircraft(3, 0, "PH-DEF")]).await.unwrap();

        let registrations: Vec<_> = store
            .get_all_of_type(EntityKind::Aircraft)
            .into_iter()
            .map(|e| match e.body {
                EntityBody::Aircraft(a) => a.registration,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(registrations, vec!["PH-DEF", "PH-XYZ"]);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn init_loads_existing_rows_once() {
        let replica = Arc::new(LocalReplica::new(MemoryReplica::new(), 2));
        replica.init().await.unwrap();
        replica
            .append(vec![aircraft(0, 0, "PH-ABC"), aerodrome(1, 1), VersionedEntity::tombstone(2, 1)])
            .await
            .unwrap();

        let store = EntityStore::new(Arc::clone(&replica));
        store.init().await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.snapshot(), vec![aircraft(0, 0, "PH-ABC")]);
    }

    #[tokio::test]
    async fn refresh_picks_up_other_writers() {
        let replica = Arc::new(LocalReplica::new(MemoryReplica::new(), 2));
        let store = EntityStore::new(Arc::clone(&replica));
        store.init().await.unwrap();
        store.save(vec![aerodrome(0, 0)]).await.unwrap();

        replica.append(vec![aerodrome(1, 1), aerodrome(2, 2)]).await.unwrap();
        assert_eq!(store.refresh().await.unwrap(), 2);
        assert_eq!(store.next_version(), Version(3));
        assert_eq!(store.get_all_of_type(EntityKind::Aerodrome).len(), 3);
        assert_eq!(store.refresh().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn conflict_rolls_back_then_retry_succeeds() {
        let replica = Arc::new(LocalReplica::new(MemoryReplica::new(), 2));
        let store = EntityStore::new(Arc::clone(&replica));
        store.init().await.unwrap();
        store.save(vec![aircraft(0, 0, "PH-ABC")]).await.unwrap();

        // another writer takes version 1
        replica.append(vec![aerodrome(1, 1)]).await.unwrap();

        let err = store
            .save(vec![VersionedEntity::tombstone(1, 0)])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get(EntityId(0)), Some(aircraft(0, 0, "PH-ABC")));
        assert_eq!(store.next_version(), Version(1));

        store.refresh().await.unwrap();
        let version = store.next_version();
        assert_eq!(version, Version(2));
        store
            .save(vec![VersionedEntity::tombstone(version, 0)])
            .await
            .unwrap();
        assert_eq!(store.get(EntityId(0)), None);
        assert_eq!(store.snapshot(), vec![aerodrome(1, 1)]);
    }

    #[tokio::test]
    async fn rejected_save_restores_previous_snapshot() {
        let store = EntityStore::new(ReadOnlyStream::new(LocalReplica::new(MemoryReplica::new(), 2)));
        store.init().await.unwrap();
        let err = store.save(vec![aircraft(0, 0, "PH-ABC")]).await.unwrap_err();
        assert!(matches!(err, SyncError::Permission(_)));
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn out_of_order_fold_keeps_log_sorted() {
        let mut view = View::default();
        for version in [0, 5, 2, 9, 3] {
            view.fold(aerodrome(version, version));
        }
        let versions: Vec<_> = view.log.iter().map(|e| e.version.get()).collect();
        assert_eq!(versions, vec![0, 2, 3, 5, 9]);
        assert_eq!(view.next_version(), Version(10));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Aircraft(i64),
        Aerodrome(i64),
        Delete(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..6i64).prop_map(Op::Aircraft),
            (0..6i64).prop_map(Op::Aerodrome),
            (0..6i64).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn snapshot_matches_latest_rows(ops in proptest::collection::vec(op(), 0..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let replica = Arc::new(LocalReplica::new(MemoryReplica::new(), 7));
                let store = EntityStore::new(Arc::clone(&replica));
                store.init().await.unwrap();

                let mut latest: HashMap<i64, VersionedEntity> = HashMap::new();
                for op in &ops {
                    let version = store.next_version().get();
                    let entity = match op {
                        Op::Aircraft(id) => aircraft(version, *id, "PH-ABC"),
                        Op::Aerodrome(id) => aerodrome(version, *id),
                        Op::Delete(id) => VersionedEntity::tombstone(version, *id),
                    };
                    latest.insert(entity.entity.get(), entity.clone());
                    store.save(vec![entity]).await.unwrap();
                }

                prop_assert_eq!(store.next_version(), Version(ops.len() as i64));
                for kind in [EntityKind::Aircraft, EntityKind::Aerodrome] {
                    let mut expected: Vec<_> = latest
                        .values()
                        .filter(|e| e.kind() == kind)
                        .map(|e| e.version)
                        .collect();
                    expected.sort();
                    let mut actual: Vec<_> =
                        store.get_all_of_type(kind).iter().map(|e| e.version).collect();
                    actual.sort();
                    prop_assert_eq!(actual, expected);
                }

                let reloaded = EntityStore::new(replica);
                reloaded.init().await.unwrap();
                prop_assert_eq!(reloaded.snapshot(), store.snapshot());
                Ok(())
            })?;
        }
    }
}
