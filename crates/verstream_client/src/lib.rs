//! # Verstream Client
//!
//! Offline-capable client replica for Verstream.
//!
//! This crate provides:
//! - The [`VersionStream`] capability and its implementations
//!   (local replica, remote server, read-only, buffering, merging)
//! - Memory and file backed local replicas
//! - Retry with exponential backoff
//! - HTTP client abstraction with a `reqwest` implementation
//! - [`EntityStore`], the materialized view applications read from
//!
//! ## Architecture
//!
//! The standard stack reads local-first and writes remote-first:
//!
//! ```text
//! EntityStore
//!   └─ MergingStream
//!        ├─ BufferingStream ─ LocalReplica ─ FileReplica
//!        └─ BufferingStream ─ RemoteStream ─ ReqwestClient
//! ```
//!
//! Loading drains the local replica, then fetches the rest from the server
//! and caches it. Saving folds the new rows into the store, appends them to
//! the server and mirrors them locally once the server accepted them.
//!
//! ## Key Invariants
//!
//! - The server is authoritative; a conflicting version is never retried
//! - At most one append per buffering stream is in flight
//! - Local and remote phases of a load never interleave
//! - A failed save leaves the store as it was before the save

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod buffering;
mod config;
mod error;
mod http;
pub mod local;
mod merging;
mod read_only;
mod remote;
mod retry;
mod store;
mod stream;
mod wiring;

pub use buffering::BufferingStream;
pub use config::{ClientConfig, RetryConfig};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use local::{FileReplica, LocalReplica, MemoryReplica, ReplicaBackend};
pub use merging::MergingStream;
pub use read_only::ReadOnlyStream;
pub use remote::{Credentials, RemoteStream};
pub use retry::with_retry;
pub use store::EntityStore;
pub use stream::{load_all, VersionStream};
pub use wiring::{open_store, sync_stream, SyncStore, SyncStream};
