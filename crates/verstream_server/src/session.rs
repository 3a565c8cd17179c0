//! Login sessions and user records.

use crate::error::{ServerError, ServerResult};
use crate::table::{Put, Table};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;
use verstream_codec::{AttributeValue, Item};

const SINGLETON_SK: &str = " ";

/// A login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session token.
    pub id: String,
    /// User bound to the session, once one exists.
    pub user_id: Option<String>,
    /// External identity that logged in.
    pub google_id: String,
    /// Expiry, in seconds since the Unix epoch.
    pub expires_at: u64,
}

/// Session rows: `session-{id}`.
#[derive(Clone)]
pub struct SessionStore {
    table: Arc<dyn Table>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store whose sessions live for `ttl`.
    pub fn new(table: Arc<dyn Table>, ttl: Duration) -> Self {
        Self { table, ttl }
    }

    /// Starts a new session.
    pub fn create(
        &self,
        user_id: Option<&str>,
        google_id: &str,
        now: SystemTime,
    ) -> ServerResult<Session> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            google_id: google_id.to_string(),
            expires_at: epoch_secs(now) + self.ttl.as_secs(),
        };
        let put = Put::new(session_key(&session.id), SINGLETON_SK, encode(&session)).if_not_exists();
        match self.table.put(put) {
            Ok(()) => {}
            Err(ServerError::ConditionFailed { .. }) => {
                return Err(ServerError::Internal("session id collision".into()))
            }
            Err(err) => return Err(err),
        }
        debug!(bound = session.user_id.is_some(), "session created");
        Ok(session)
    }

    /// Binds `user_id` to a session that has none yet, renewing its expiry.
    pub fn bind_user(&self, session: &Session, user_id: &str, now: SystemTime) -> ServerResult<Session> {
        if session.user_id.is_some() {
            return Err(ServerError::InvalidRequest("session already has a user".into()));
        }
        let bound = Session {
            id: session.id.clone(),
            user_id: Some(user_id.to_string()),
            google_id: session.google_id.clone(),
            expires_at: epoch_secs(now) + self.ttl.as_secs(),
        };
        self.table
            .put(Put::new(session_key(&bound.id), SINGLETON_SK, encode(&bound)))?;
        Ok(bound)
    }

    /// Looks up an unexpired session.
    pub fn get(&self, session_id: &str, now: SystemTime) -> ServerResult<Option<Session>> {
        let Some(item) = self.table.get(&session_key(session_id), SINGLETON_SK)? else {
            return Ok(None);
        };
        let session = decode(session_id, &item)?;
        if session.expires_at <= epoch_secs(now) {
            debug!("session expired");
            return Ok(None);
        }
        Ok(Some(session))
    }
}

/// User rows: `google-{google_id}` to user id.
#[derive(Clone)]
pub struct UserStore {
    table: Arc<dyn Table>,
}

impl UserStore {
    /// Creates a user store.
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    /// Binds an external identity to a user. The first writer wins.
    pub fn create(&self, user_id: &str, google_id: &str) -> ServerResult<()> {
        let mut item = Item::new();
        item.insert("userId".into(), AttributeValue::from(user_id));
        let put = Put::new(user_key(google_id), SINGLETON_SK, item).if_not_exists();
        match self.table.put(put) {
            Ok(()) => {
                info!(user_id, "user created");
                Ok(())
            }
            Err(ServerError::ConditionFailed { .. }) => Err(ServerError::UserExists {
                google_id: google_id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Returns the user bound to an external identity.
    pub fn find_by_google_id(&self, google_id: &str) -> ServerResult<Option<String>> {
        let item = self.table.get(&user_key(google_id), SINGLETON_SK)?;
        Ok(item.and_then(|item| item.get("userId").and_then(|v| v.as_str().map(str::to_string))))
    }
}

fn session_key(id: &str) -> String {
    format!("session-{id}")
}

fn user_key(google_id: &str) -> String {
    format!("google-{google_id}")
}

fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn encode(session: &Session) -> Item {
    let mut item = Item::new();
    item.insert("googleId".into(), AttributeValue::from(session.google_id.as_str()));
    if let Some(user_id) = &session.user_id {
        item.insert("userId".into(), AttributeValue::from(user_id.as_str()));
    }
    item.insert("ttl".into(), AttributeValue::from(session.expires_at as i64));
    item
}

fn decode(id: &str, item: &Item) -> ServerResult<Session> {
    let google_id = item
        .get("googleId")
        .and_then(AttributeValue::as_str)
        .ok_or_else(|| ServerError::Storage(format!("session {id} has no googleId")))?;
    let expires_at = item
        .get("ttl")
        .and_then(AttributeValue::as_i64)
        .ok_or_else(|| ServerError::Storage(format!("session {id} has no ttl")))?;
    Ok(Session {
        id: id.to_string(),
        user_id: item
            .get("userId")
            .and_then(AttributeValue::as_str)
            .map(str::to_string),
        google_id: google_id.to_string(),
        expires_at: expires_at.max(0) as u64,
    })
}
