//! Per-user version logs.
//!
//! ## Layout
//!
//! - partition key: `stream-{user_id}`
//! - sort key: [`sort_key::encode`] of the version
//! - attributes: the record's fields, without `version`

use crate::error::{ServerError, ServerResult};
use crate::table::{Put, Query, Row, Table};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use verstream_codec::{from_item, sort_key, to_item};
use verstream_protocol::{LogRecord, Version};

/// The authoritative, append-only log of every user.
#[derive(Clone)]
pub struct VersionLog {
    table: Arc<dyn Table>,
    page_size: usize,
}

impl VersionLog {
    /// Creates a log over `table`, reading `page_size` rows per query.
    pub fn new(table: Arc<dyn Table>, page_size: usize) -> Self {
        Self {
            table,
            page_size: page_size.max(1),
        }
    }

    /// Persists all records as new rows, or none of them.
    ///
    /// Fails with [`ServerError::Conflict`] if a version already exists for
    /// the user or occurs twice in `records`.
    pub fn append(&self, user_id: &str, records: &[LogRecord]) -> ServerResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let pk = partition_key(user_id);
        let mut seen = HashSet::with_capacity(records.len());
        let mut puts = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.version) {
                return Err(ServerError::Conflict {
                    version: record.version,
                });
            }
            let sk = version_key(record.version)?;
            puts.push(Put::new(pk.clone(), sk, to_item(&record.fields)).if_not_exists());
        }

        match self.table.transact_put(puts) {
            Ok(()) => {
                info!(
                    user_id,
                    count = records.len(),
                    first = %records[0].version,
                    "batch committed"
                );
                Ok(())
            }
            Err(ServerError::ConditionFailed { index }) => {
                let version = records[index].version;
                debug!(user_id, %version, "version already taken");
                Err(ServerError::Conflict { version })
            }
            Err(err) => Err(err),
        }
    }

    /// Iterates the records with `version >= start`, ascending.
    ///
    /// Rows are fetched lazily, one page at a time.
    pub fn read_from(&self, user_id: &str, start: Version) -> LogIter {
        LogIter {
            table: Arc::clone(&self.table),
            query: Query::new(partition_key(user_id))
                .with_sk_from(sort_key::encode(start.get().max(0) as u64))
                .with_limit(self.page_size),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Collects [`read_from`](Self::read_from) into a vector.
    pub fn read_all_from(&self, user_id: &str, start: Version) -> ServerResult<Vec<LogRecord>> {
        self.read_from(user_id, start).collect()
    }

    /// Returns the highest stored version, if any.
    pub fn read_latest_version(&self, user_id: &str) -> ServerResult<Option<Version>> {
        let query = Query::new(partition_key(user_id)).reversed().with_limit(1);
        let page = self.table.query(&query)?;
        page.rows
            .first()
            .map(|row| Ok(Version(decode_version(&row.sk)?)))
            .transpose()
    }
}

/// Lazy iterator over a user's log. See [`VersionLog::read_from`].
pub struct LogIter {
    table: Arc<dyn Table>,
    query: Query,
    buffer: VecDeque<Row>,
    done: bool,
}

impl LogIter {
    fn fetch_page(&mut self) -> ServerResult<()> {
        let page = self.table.query(&self.query)?;
        debug!(pk = %self.query.pk, rows = page.rows.len(), "log page read");
        self.done = page.last_key.is_none();
        self.query.exclusive_start = page.last_key;
        self.buffer.extend(page.rows);
        Ok(())
    }
}

impl Iterator for LogIter {
    type Item = ServerResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.done {
            if let Err(err) = self.fetch_page() {
                self.done = true;
                return Some(Err(err));
            }
        }
        let row = self.buffer.pop_front()?;
        Some(
            decode_version(&row.sk)
                .map(|version| LogRecord::new(Version(version), from_item(&row.item))),
        )
    }
}

fn partition_key(user_id: &str) -> String {
    format!("stream-{user_id}")
}

fn version_key(version: Version) -> ServerResult<String> {
    u64::try_from(version.get())
        .map(sort_key::encode)
        .map_err(|_| ServerError::InvalidRequest(format!("negative version {version}")))
}

fn decode_version(sk: &str) -> ServerResult<i64> {
    let raw = sort_key::decode(sk)?;
    i64::try_from(raw).map_err(|_| ServerError::Storage(format!("version key {sk:?} out of range")))
}
