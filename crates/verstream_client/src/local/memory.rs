//! In-memory replica backend.

use super::ReplicaBackend;
use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use verstream_protocol::{Version, VersionedEntity};

/// A volatile [`ReplicaBackend`].
#[derive(Debug, Default)]
pub struct MemoryReplica {
    entities: RwLock<BTreeMap<Version, VersionedEntity>>,
}

impl MemoryReplica {
    /// Creates an empty replica.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicaBackend for MemoryReplica {
    fn open(&self) -> SyncResult<()> {
        Ok(())
    }

    fn scan_page(&self, start: Version, limit: usize) -> SyncResult<Vec<VersionedEntity>> {
        Ok(self
            .entities
            .read()
            .range(start..)
            .take(limit)
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    fn insert_all(&self, entities: &[VersionedEntity]) -> SyncResult<()> {
        let mut stored = self.entities.write();
        check_new_versions(entities, |v| stored.contains_key(&v))?;
        for entity in entities {
            stored.insert(entity.version, entity.clone());
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entities.read().len()
    }
}

/// Fails with a conflict if a version is taken or repeated.
pub(super) fn check_new_versions(
    entities: &[VersionedEntity],
    exists: impl Fn(Version) -> bool,
) -> SyncResult<()> {
    let mut seen = HashSet::with_capacity(entities.len());
    for entity in entities {
        if exists(entity.version) || !seen.insert(entity.version) {
            return Err(SyncError::Conflict(format!(
                "version {} already stored locally",
                entity.version
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_respects_start_and_limit() {
        let replica = MemoryReplica::new();
        let entities: Vec<_> = [5, 1, 3]
            .into_iter()
            .map(|v| VersionedEntity::tombstone(v, 0))
            .collect();
        replica.insert_all(&entities).unwrap();

        let page = replica.scan_page(Version(2), 1).unwrap();
        assert_eq!(page, vec![VersionedEntity::tombstone(3, 0)]);
        assert_eq!(replica.len(), 3);
    }

    #[test]
    fn repeated_version_in_batch() {
        let replica = MemoryReplica::new();
        let batch = vec![VersionedEntity::tombstone(1, 0), VersionedEntity::tombstone(1, 1)];
        assert!(replica.insert_all(&batch).unwrap_err().is_conflict());
        assert!(replica.is_empty());
    }
}
