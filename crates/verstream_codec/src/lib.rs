//! # Verstream Codec
//!
//! Value model and byte layouts shared by the Verstream server and client.
//!
//! This crate provides:
//! - [`AttributeValue`], the typed storage form of a JSON tree, with total
//!   mappings in both directions ([`to_attribute`], [`from_attribute`])
//! - Order-preserving sort keys for versions ([`sort_key`])
//! - Checksummed CBOR record frames for append-only files ([`frame`])
//!
//! ## Usage
//!
//! ```
//! use verstream_codec::{from_attribute, sort_key, to_attribute};
//! use serde_json::json;
//!
//! let value = json!({"type": "aircraft", "registration": "N123"});
//! assert_eq!(from_attribute(&to_attribute(&value)), value);
//!
//! assert!(sort_key::encode(99) < sort_key::encode(100));
//! assert_eq!(sort_key::decode(&sort_key::encode(42)).unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod frame;
mod json;
pub mod sort_key;
mod value;

pub use error::{CodecError, CodecResult};
pub use frame::{decode_payload, encode_frame, FrameReader, FRAME_HEADER_LEN};
pub use json::{from_attribute, from_item, to_attribute, to_item};
pub use value::{AttributeValue, Item};
