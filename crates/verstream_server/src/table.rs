//! Keyed-row storage.
//!
//! Rows are addressed by a partition key and a sort key and hold an
//! attribute map. Within a partition rows are ordered byte-wise by sort
//! key. Writes can be conditional and grouped into all-or-nothing
//! transactions.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use verstream_codec::{encode_frame, FrameReader, Item};

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Partition key.
    pub pk: String,
    /// Sort key.
    pub sk: String,
    /// Row attributes.
    pub item: Item,
}

/// Precondition of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PutCondition {
    /// Always write, replacing any existing row.
    #[default]
    None,
    /// Only write if no row exists under the key.
    NotExists,
}

/// A single row write.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    /// Row to write.
    pub row: Row,
    /// Precondition.
    pub condition: PutCondition,
}

impl Put {
    /// An unconditional write.
    pub fn new(pk: impl Into<String>, sk: impl Into<String>, item: Item) -> Self {
        Self {
            row: Row {
                pk: pk.into(),
                sk: sk.into(),
                item,
            },
            condition: PutCondition::None,
        }
    }

    /// Makes the write fail if the row already exists.
    pub fn if_not_exists(mut self) -> Self {
        self.condition = PutCondition::NotExists;
        self
    }
}

/// A range read over one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Partition to read.
    pub pk: String,
    /// Inclusive lower bound on the sort key.
    pub sk_from: Option<String>,
    /// Read in descending sort-key order.
    pub reverse: bool,
    /// Maximum number of rows in the page.
    pub limit: usize,
    /// Continue after this sort key (the last key of the previous page).
    pub exclusive_start: Option<String>,
}

impl Query {
    /// Reads the whole partition in ascending order.
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk_from: None,
            reverse: false,
            limit: usize::MAX,
            exclusive_start: None,
        }
    }

    /// Sets the inclusive lower bound.
    pub fn with_sk_from(mut self, sk: impl Into<String>) -> Self {
        self.sk_from = Some(sk.into());
        self
    }

    /// Reads in descending order.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Continues after `sk`.
    pub fn with_exclusive_start(mut self, sk: Option<String>) -> Self {
        self.exclusive_start = sk;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Rows in query order.
    pub rows: Vec<Row>,
    /// Set when the page is full; pass it as the next exclusive start.
    pub last_key: Option<String>,
}

/// Keyed-row storage engine.
///
/// Every read observes all writes that completed before it started.
pub trait Table: Send + Sync {
    /// Reads one page of a partition.
    fn query(&self, query: &Query) -> ServerResult<Page>;

    /// Reads a single row.
    fn get(&self, pk: &str, sk: &str) -> ServerResult<Option<Item>>;

    /// Writes all rows or none.
    ///
    /// Fails with [`ServerError::ConditionFailed`] naming the first write
    /// whose condition does not hold. Two writes to the same key in one
    /// transaction are rejected the same way.
    fn transact_put(&self, puts: Vec<Put>) -> ServerResult<()>;

    /// Writes a single row.
    fn put(&self, put: Put) -> ServerResult<()> {
        self.transact_put(vec![put])
    }
}

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<Key, Item>,
    journal: Option<Journal>,
}

/// In-memory [`Table`] with an optional append-only journal.
///
/// Each committed transaction is one checksummed frame in the journal.
/// Opening replays the journal; a damaged last frame, left by a crash in
/// the middle of a write, is cut off.
#[derive(Debug, Default)]
pub struct MemoryTable {
    state: RwLock<State>,
}

impl MemoryTable {
    /// Creates an empty, volatile table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a journaled table at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut rows = BTreeMap::new();
        let mut transactions = 0usize;
        let mut reader = FrameReader::new(&buf);
        loop {
            match reader.next_value::<Vec<Row>>() {
                Ok(Some(batch)) => {
                    for row in batch {
                        rows.insert((row.pk, row.sk), row.item);
                    }
                    transactions += 1;
                }
                Ok(None) => break,
                Err(err) if err.is_torn_frame() => {
                    warn!(path = %path.display(), error = %err, "truncating torn journal tail");
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

        info!(
            path = %path.display(),
            rows = rows.len(),
            transactions,
            "journal replayed"
        );

        Ok(Self {
            state: RwLock::new(State {
                rows,
                journal: Some(Journal {
                    path: path.to_path_buf(),
                    file,
                    len,
                }),
            }),
        })
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Returns true if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if writes are journaled.
    pub fn is_durable(&self) -> bool {
        self.state.read().journal.is_some()
    }
}

impl Table for MemoryTable {
    fn query(&self, query: &Query) -> ServerResult<Page> {
        let state = self.state.read();
        let lower = query.sk_from.clone().unwrap_or_default();
        let partition_end = Bound::Excluded((format!("{}\0", query.pk), String::new()));

        let range = match (&query.exclusive_start, query.reverse) {
            (Some(after), false) if *after >= lower => (
                Bound::Excluded((query.pk.clone(), after.clone())),
                partition_end,
            ),
            (Some(before), true) => {
                if *before < lower {
                    return Ok(Page::default());
                }
                (
                    Bound::Included((query.pk.clone(), lower)),
                    Bound::Excluded((query.pk.clone(), before.clone())),
                )
            }
            _ => (Bound::Included((query.pk.clone(), lower)), partition_end),
        };

        let to_row = |((pk, sk), item): (&Key, &Item)| Row {
            pk: pk.clone(),
            sk: sk.clone(),
            item: item.clone(),
        };
        let entries = state.rows.range::<Key, _>(range);
        let rows: Vec<Row> = if query.reverse {
            entries.rev().take(query.limit).map(to_row).collect()
        } else {
            entries.take(query.limit).map(to_row).collect()
        };

        let last_key = if rows.len() == query.limit {
            rows.last().map(|row| row.sk.clone())
        } else {
            None
        };
        debug!(pk = %query.pk, rows = rows.len(), more = last_key.is_some(), "query page");
        Ok(Page { rows, last_key })
    }

    fn get(&self, pk: &str, sk: &str) -> ServerResult<Option<Item>> {
        let key = (pk.to_string(), sk.to_string());
        Ok(self.state.read().rows.get(&key).cloned())
    }

    fn transact_put(&self, puts: Vec<Put>) -> ServerResult<()> {
        if puts.is_empty() {
            return Ok(());
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        let mut seen = HashSet::with_capacity(puts.len());
        for (index, put) in puts.iter().enumerate() {
            let key = (put.row.pk.clone(), put.row.sk.clone());
            let taken = put.condition == PutCondition::NotExists && state.rows.contains_key(&key);
            if !seen.insert(key) || taken {
                return Err(ServerError::ConditionFailed { index });
            }
        }

        let rows: Vec<Row> = puts.into_iter().map(|put| put.row).collect();
        if let Some(journal) = state.journal.as_mut() {
            journal.append(&rows)?;
        }
        for row in rows {
            state.rows.insert((row.pk, row.sk), row.item);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
    file: File,
    len: u64,
}

impl Journal {
    fn append(&mut self, rows: &[Row]) -> ServerResult<()> {
        let frame = encode_frame(&rows)?;
        let written = self
            .file
            .seek(SeekFrom::End(0))
            .and_then(|_| self.file.write_all(&frame))
            .and_then(|()| self.file.sync_data());

        if let Err(err) = written {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial journal write"
                );
            }
            return Err(err.into());
        }
        self.len += frame.len() as u64;
        Ok(())
    }
}
