//! # Verstream Protocol
//!
//! Entity types and wire messages shared by the Verstream server and client.
//!
//! This crate provides:
//! - [`VersionedEntity`], the closed set of entity variants ([`EntityBody`])
//! - [`LogRecord`], the schema-agnostic row the server stores
//! - Request and response bodies of the HTTP API ([`messages`])
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
pub mod messages;
pub mod model;
mod record;
mod types;

pub use entity::{EntityBody, EntityKind, VersionedEntity};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{CreateUserResponse, ErrorBody, LoginRequest, LoginResponse, StreamQuery};
pub use record::LogRecord;
pub use types::{EntityId, Version};
