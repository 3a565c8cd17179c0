//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Rows fetched per storage query when reading a log.
    pub page_size: usize,
    /// Maximum number of records in one upload.
    pub max_append_batch: usize,
    /// Lifetime of a login session.
    pub session_ttl: Duration,
    /// Reject uploads that do not continue the log without gaps.
    pub require_contiguous_versions: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            page_size: 100,
            max_append_batch: 100,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            require_contiguous_versions: false,
        }
    }

    /// Sets the read page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the maximum upload size.
    pub fn with_max_append_batch(mut self, size: usize) -> Self {
        self.max_append_batch = size;
        self
    }

    /// Sets the session lifetime.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Requires uploads to start at `latest + 1` and be consecutive.
    pub fn with_contiguous_versions(mut self, required: bool) -> Self {
        self.require_contiguous_versions = required;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
