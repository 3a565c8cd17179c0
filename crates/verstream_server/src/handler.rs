//! Request handlers for the HTTP API.
//!
//! Handlers take typed inputs and return typed results; mapping to HTTP
//! lives in [`router`](crate::router).

use crate::auth::IdentityVerifier;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::session::{Session, SessionStore, UserStore};
use crate::stream_log::VersionLog;
use crate::table::Table;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};
use uuid::Uuid;
use verstream_protocol::messages::bearer_token;
use verstream_protocol::{CreateUserResponse, LogRecord, LoginRequest, LoginResponse, Version};

/// Shared state of all handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Per-user logs.
    pub log: VersionLog,
    /// Login sessions.
    pub sessions: SessionStore,
    /// External identity to user bindings.
    pub users: UserStore,
    verifier: Arc<dyn IdentityVerifier>,
}

impl HandlerContext {
    /// Creates a context storing everything in `table`.
    pub fn new(
        config: ServerConfig,
        table: Arc<dyn Table>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            log: VersionLog::new(Arc::clone(&table), config.page_size),
            sessions: SessionStore::new(Arc::clone(&table), config.session_ttl),
            users: UserStore::new(table),
            config,
            verifier,
        }
    }

    fn session(&self, authorization: Option<&str>, now: SystemTime) -> ServerResult<Session> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or_else(|| ServerError::Unauthorized("missing bearer token".into()))?;
        self.sessions
            .get(token, now)?
            .ok_or_else(|| ServerError::Unauthorized("unknown or expired session".into()))
    }

    fn authorize(&self, authorization: Option<&str>, user_id: &str, now: SystemTime) -> ServerResult<()> {
        let session = self.session(authorization, now)?;
        if session.user_id.as_deref() != Some(user_id) {
            return Err(ServerError::Unauthorized(
                "session does not belong to this user".into(),
            ));
        }
        Ok(())
    }
}

/// Handler for API requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// `POST /ping`.
    pub fn handle_ping(&self) -> ServerResult<()> {
        Ok(())
    }

    /// `POST /google-login`: exchanges an identity token for a session.
    pub fn handle_login(&self, request: LoginRequest, now: SystemTime) -> ServerResult<LoginResponse> {
        let google_id = self.context.verifier.verify(&request.bearer, now)?;
        let user_id = self.context.users.find_by_google_id(&google_id)?;
        let session = self
            .context
            .sessions
            .create(user_id.as_deref(), &google_id, now)?;
        info!(has_user = user_id.is_some(), "login");
        Ok(LoginResponse {
            session_id: session.id,
            user_id,
        })
    }

    /// `POST /users`: creates the user of a session that has none.
    pub fn handle_create_user(
        &self,
        authorization: Option<&str>,
        now: SystemTime,
    ) -> ServerResult<CreateUserResponse> {
        let session = self.context.session(authorization, now)?;
        if session.user_id.is_some() {
            return Err(ServerError::InvalidRequest(
                "session already has a user".into(),
            ));
        }
        let user_id = Uuid::new_v4().to_string();
        self.context.users.create(&user_id, &session.google_id)?;
        self.context.sessions.bind_user(&session, &user_id, now)?;
        Ok(CreateUserResponse { user_id })
    }

    /// `GET /users/{id}/stream?start=`: records with `version >= start`.
    pub fn handle_read(
        &self,
        authorization: Option<&str>,
        user_id: &str,
        start: i64,
        now: SystemTime,
    ) -> ServerResult<Vec<LogRecord>> {
        self.context.authorize(authorization, user_id, now)?;
        let records = self.context.log.read_all_from(user_id, Version(start))?;
        debug!(user_id, start, count = records.len(), "stream read");
        Ok(records)
    }

    /// `POST /users/{id}/stream`: appends a JSON array of records.
    pub fn handle_append(
        &self,
        authorization: Option<&str>,
        user_id: &str,
        body: Value,
        now: SystemTime,
    ) -> ServerResult<()> {
        self.context.authorize(authorization, user_id, now)?;

        let records = LogRecord::batch_from_json(body)?;
        let max = self.context.config.max_append_batch;
        if records.len() > max {
            return Err(ServerError::InvalidRequest(format!(
                "too many records: {} > {}",
                records.len(),
                max
            )));
        }
        if records.is_empty() {
            return Ok(());
        }

        if self.context.config.require_contiguous_versions {
            self.check_contiguous(user_id, &records)?;
        }
        self.context.log.append(user_id, &records)
    }

    fn check_contiguous(&self, user_id: &str, records: &[LogRecord]) -> ServerResult<()> {
        let mut expected = self
            .context
            .log
            .read_latest_version(user_id)?
            .map_or(Version::ZERO, Version::next);
        for record in records {
            if record.version != expected {
                debug!(user_id, %expected, actual = %record.version, "non-contiguous upload");
                return Err(ServerError::Conflict {
                    version: record.version,
                });
            }
            expected = expected.next();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacIdentityVerifier;
    use crate::table::MemoryTable;
    use serde_json::json;
    use std::time::Duration;
    use verstream_protocol::messages::bearer_header;

    const SECRET: &[u8] = b"handler-test-secret";

    fn create_handler(config: ServerConfig) -> RequestHandler {
        let verifier = Arc::new(HmacIdentityVerifier::new(SECRET.to_vec()));
        let context = HandlerContext::new(config, Arc::new(MemoryTable::new()), verifier);
        RequestHandler::new(Arc::new(context))
    }

    fn login(handler: &RequestHandler, subject: &str, now: SystemTime) -> LoginResponse {
        let bearer = HmacIdentityVerifier::new(SECRET.to_vec())
            .create_token(subject, now)
            .unwrap();
        handler.handle_login(LoginRequest { bearer }, now).unwrap()
    }

    /// Logs in and creates a user; returns (authorization header, user id).
    fn signup(handler: &RequestHandler, subject: &str, now: SystemTime) -> (String, String) {
        let session = login(handler, subject, now);
        let auth = bearer_header(&session.session_id);
        let user = handler.handle_create_user(Some(&auth), now).unwrap();
        (auth, user.user_id)
    }

    fn entity(version: i64, name: &str) -> Value {
        json!({"version": version, "entity": 0, "type": "trip", "name": name, "aircraft": null})
    }

    #[test]
    fn login_and_signup_flow() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();

        let first = login(&handler, "g1", now);
        assert_eq!(first.user_id, None);

        let (_, user_id) = signup(&handler, "g1", now);

        let again = login(&handler, "g1", now);
        assert_eq!(again.user_id.as_deref(), Some(user_id.as_str()));
        assert_ne!(again.session_id, first.session_id);
    }

    #[test]
    fn invalid_identity_is_unauthorized() {
        let handler = create_handler(ServerConfig::default());
        let err = handler
            .handle_login(LoginRequest { bearer: "nope".into() }, SystemTime::now())
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn create_user_requires_unbound_session() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();
        assert_eq!(handler.handle_create_user(None, now).unwrap_err().status_code(), 401);

        let (auth, _) = signup(&handler, "g1", now);
        assert_eq!(
            handler.handle_create_user(Some(&auth), now).unwrap_err().status_code(),
            400
        );
    }

    #[test]
    fn append_and_read() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();
        let (auth, user) = signup(&handler, "g1", now);

        let body = json!([entity(0, "a"), entity(1, "b"), entity(5, "c")]);
        handler.handle_append(Some(&auth), &user, body, now).unwrap();

        let records = handler.handle_read(Some(&auth), &user, 0, now).unwrap();
        let values: Vec<Value> = records.iter().map(LogRecord::to_json).collect();
        assert_eq!(values, vec![entity(0, "a"), entity(1, "b"), entity(5, "c")]);

        let tail = handler.handle_read(Some(&auth), &user, 2, now).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].version, Version(5));
    }

    #[test]
    fn stream_requires_matching_session() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();
        let (auth_a, user_a) = signup(&handler, "ga", now);
        let (auth_b, _) = signup(&handler, "gb", now);

        let status = |r: ServerResult<Vec<LogRecord>>| r.unwrap_err().status_code();
        assert_eq!(status(handler.handle_read(None, &user_a, 0, now)), 401);
        assert_eq!(status(handler.handle_read(Some("Bearer bogus"), &user_a, 0, now)), 401);
        assert_eq!(status(handler.handle_read(Some(&auth_b), &user_a, 0, now)), 401);
        assert!(handler.handle_read(Some(&auth_a), &user_a, 0, now).is_ok());

        let later = now + Duration::from_secs(24 * 60 * 60 + 1);
        assert_eq!(status(handler.handle_read(Some(&auth_a), &user_a, 0, later)), 401);
    }

    #[test]
    fn conflicting_append_keeps_first_writer() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();
        let (auth, user) = signup(&handler, "g1", now);

        handler
            .handle_append(Some(&auth), &user, json!([entity(5, "first")]), now)
            .unwrap();
        let err = handler
            .handle_append(Some(&auth), &user, json!([entity(5, "second")]), now)
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let stored = handler.handle_read(Some(&auth), &user, 0, now).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].to_json(), entity(5, "first"));
    }

    #[test]
    fn malformed_uploads_are_rejected() {
        let handler = create_handler(ServerConfig::default());
        let now = SystemTime::now();
        let (auth, user) = signup(&handler, "g1", now);

        for body in [
            json!({"version": 0}),
            json!([1]),
            json!([{"entity": 0}]),
            json!([{"version": -3}]),
            json!([{"version": "4"}]),
        ] {
            let err = handler
                .handle_append(Some(&auth), &user, body.clone(), now)
                .unwrap_err();
            assert_eq!(err.status_code(), 400, "{body}");
        }
        assert!(handler.handle_read(Some(&auth), &user, 0, now).unwrap().is_empty());
    }

    #[test]
    fn batch_limit() {
        let handler = create_handler(ServerConfig::default().with_max_append_batch(2));
        let now = SystemTime::now();
        let (auth, user) = signup(&handler, "g1", now);

        let body = json!([entity(0, "a"), entity(1, "b"), entity(2, "c")]);
        let err = handler.handle_append(Some(&auth), &user, body, now).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn contiguity_check() {
        let handler = create_handler(ServerConfig::default().with_contiguous_versions(true));
        let now = SystemTime::now();
        let (auth, user) = signup(&handler, "g1", now);

        let gap = handler
            .handle_append(Some(&auth), &user, json!([entity(1, "a")]), now)
            .unwrap_err();
        assert_eq!(gap.status_code(), 409);

        handler
            .handle_append(Some(&auth), &user, json!([entity(0, "a"), entity(1, "b")]), now)
            .unwrap();
        let skip = handler
            .handle_append(Some(&auth), &user, json!([entity(2, "c"), entity(4, "d")]), now)
            .unwrap_err();
        assert_eq!(skip.status_code(), 409);
        handler
            .handle_append(Some(&auth), &user, json!([entity(2, "c")]), now)
            .unwrap();
    }
}
