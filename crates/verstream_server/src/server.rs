//! Main server.

use crate::auth::IdentityVerifier;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler};
use crate::table::{MemoryTable, Table};
use std::path::Path;
use std::sync::Arc;

/// The Verstream server.
///
/// Owns the storage table and the request handler. Expose it over HTTP
/// with [`router`](crate::router) or [`serve`](crate::serve).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use verstream_server::{HmacIdentityVerifier, ServerConfig, SyncServer};
///
/// let verifier = Arc::new(HmacIdentityVerifier::new(b"secret".to_vec()));
/// let server = SyncServer::new(ServerConfig::default(), verifier);
/// assert!(server.handler().handle_ping().is_ok());
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a server over a volatile in-memory table.
    pub fn new(config: ServerConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self::with_table(config, Arc::new(MemoryTable::new()), verifier)
    }

    /// Creates a server whose table is journaled at `path`.
    pub fn open(
        config: ServerConfig,
        path: impl AsRef<Path>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> ServerResult<Self> {
        let table = MemoryTable::open(path)?;
        Ok(Self::with_table(config, Arc::new(table), verifier))
    }

    /// Creates a server over an existing table.
    pub fn with_table(
        config: ServerConfig,
        table: Arc<dyn Table>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let context = Arc::new(HandlerContext::new(config, table, verifier));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the shared handler state.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacIdentityVerifier;
    use serde_json::{json, Value};
    use std::time::SystemTime;
    use tempfile::tempdir;
    use verstream_protocol::messages::bearer_header;
    use verstream_protocol::{LoginRequest, Version};

    fn verifier() -> Arc<HmacIdentityVerifier> {
        Arc::new(HmacIdentityVerifier::new(b"server-test".to_vec()))
    }

    fn signup(server: &SyncServer, now: SystemTime) -> (String, String) {
        let bearer = verifier().create_token("g1", now).unwrap();
        let login = server
            .handler()
            .handle_login(LoginRequest { bearer }, now)
            .unwrap();
        let auth = bearer_header(&login.session_id);
        let user = server.handler().handle_create_user(Some(&auth), now).unwrap();
        (auth, user.user_id)
    }

    #[test]
    fn server_lifecycle() {
        let server = SyncServer::new(ServerConfig::default(), verifier());
        assert!(server.handler().handle_ping().is_ok());
        assert_eq!(server.config().page_size, 100);
    }

    #[test]
    fn journaled_server_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("verstream.journal");
        let now = SystemTime::now();

        let (auth, user) = {
            let server = SyncServer::open(ServerConfig::default(), &path, verifier()).unwrap();
            let (auth, user) = signup(&server, now);
            let body: Value = json!([{"version": 0, "entity": 0, "type": "tombstone"}]);
            server
                .handler()
                .handle_append(Some(&auth), &user, body, now)
                .unwrap();
            (auth, user)
        };

        let server = SyncServer::open(ServerConfig::default(), &path, verifier()).unwrap();
        let records = server
            .handler()
            .handle_read(Some(&auth), &user, 0, now)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            server.context().log.read_latest_version(&user).unwrap(),
            Some(Version(0))
        );
    }
}
