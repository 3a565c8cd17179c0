//! # Verstream Server
//!
//! Authoritative store and HTTP API for per-user version logs.
//!
//! This crate provides:
//! - [`VersionLog`]: append-only, per-user logs with optimistic
//!   concurrency (a version can be written once, ever)
//! - [`Table`]: the keyed-row storage engine underneath, with a
//!   journaled in-memory implementation ([`MemoryTable`])
//! - Sessions and users: login with a third-party identity token
//!   ([`IdentityVerifier`]), session tokens with a TTL
//! - [`RequestHandler`]: framework-agnostic endpoint logic, exposed over
//!   HTTP by [`router`]
//!
//! # Protocol
//!
//! 1. `POST /google-login {bearer}` returns a session token and, if one
//!    exists, the user id
//! 2. `POST /users` creates the user for a fresh session
//! 3. `GET /users/{id}/stream?start=v` returns every record from `v` on
//! 4. `POST /users/{id}/stream` appends records; 409 if a version is taken
//!
//! Stream calls carry `Authorization: Bearer <session>`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod router;
mod server;
mod session;
mod stream_log;
mod table;

pub use auth::{HmacIdentityVerifier, IdentityVerifier};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use router::{router, serve};
pub use server::SyncServer;
pub use session::{Session, SessionStore, UserStore};
pub use stream_log::{LogIter, VersionLog};
pub use table::{MemoryTable, Page, Put, PutCondition, Query, Row, Table};
