//! File-backed replica backend.
//!
//! One append-only record file per user, `user-{id}.log`, holding one
//! checksummed CBOR frame per entity. Opening the file replays it into an
//! in-memory index and cuts off a damaged last frame.

use super::memory::check_new_versions;
use super::ReplicaBackend;
use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use verstream_codec::{encode_frame, FrameReader};
use verstream_protocol::{Version, VersionedEntity};

/// A durable [`ReplicaBackend`].
#[derive(Debug)]
pub struct FileReplica {
    path: PathBuf,
    state: Mutex<Option<OpenFile>>,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    len: u64,
    index: BTreeMap<Version, VersionedEntity>,
}

impl FileReplica {
    /// Creates a replica for `user_id` in `dir`. Nothing is touched until
    /// [`open`](ReplicaBackend::open).
    pub fn new(dir: impl AsRef<Path>, user_id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("user-{user_id}.log")),
            state: Mutex::new(None),
        }
    }

    /// Returns the path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SyncResult<OpenFile> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut index = BTreeMap::new();
        let mut reader = FrameReader::new(&buf);
        loop {
            match reader.next_value::<VersionedEntity>() {
                Ok(Some(entity)) => {
                    index.insert(entity.version, entity);
                }
                Ok(None) => break,
                Err(err) if err.is_torn_frame() => {
                    warn!(path = %self.path.display(), error = %err, "truncating torn replica tail");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let len = reader.offset() as u64;
        if len < buf.len() as u64 {
            file.set_len(len)?;
            file.sync_all()?;
        }
        info!(path = %self.path.display(), entities = index.len(), "replica opened");
        Ok(OpenFile { file, len, index })
    }
}

impl ReplicaBackend for FileReplica {
    fn open(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(self.load()?);
        }
        Ok(())
    }

    fn scan_page(&self, start: Version, limit: usize) -> SyncResult<Vec<VersionedEntity>> {
        let state = self.state.lock();
        let open = state.as_ref().ok_or(SyncError::NotInitialized)?;
        Ok(open
            .index
            .range(start..)
            .take(limit)
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    fn insert_all(&self, entities: &[VersionedEntity]) -> SyncResult<()> {
        let mut state = self.state.lock();
        let open = state.as_mut().ok_or(SyncError::NotInitialized)?;
        check_new_versions(entities, |v| open.index.contains_key(&v))?;

        let mut bytes = Vec::new();
        for entity in entities {
            bytes.extend(encode_frame(entity)?);
        }

        let written = open
            .file
            .seek(SeekFrom::End(0))
            .and_then(|_| open.file.write_all(&bytes))
            .and_then(|()| open.file.sync_data());
        if let Err(err) = written {
            if let Err(rollback) = open.file.set_len(open.len) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial replica write"
                );
            }
            return Err(err.into());
        }

        open.len += bytes.len() as u64;
        for entity in entities {
            open.index.insert(entity.version, entity.clone());
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |open| open.index.len())
    }
}
