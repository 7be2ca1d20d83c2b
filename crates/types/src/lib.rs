//! Shared types for the hive collaborative partial map.
//!
//! This crate holds the vocabulary every other hive crate speaks:
//!
//! - [`Handle`]: content address of a persisted chunk
//! - [`Op`]: the totally-ordered wire operations (set/delete/clear/flush)
//! - [`TreeDelta`]: the chunk-set delta carried by a flush op
//! - [`Summary`] and [`InlineLeaf`]: attach/summarize shapes
//! - [`codec`]: centralized postcard encode/decode
//! - [`MapConfig`]: validated tunables

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod handle;
mod key;
mod op;
mod summary;

pub use codec::{CodecError, decode, encode};
pub use config::{ConfigError, MapConfig};
pub use handle::{HANDLE_LEN, Handle};
pub use key::{KeyError, validate_key};
pub use op::{DETACHED_SEQ, Op, SequenceNumber, TreeDelta};
pub use summary::{InlineLeaf, SUMMARY_BLOB_ID, Summary, SummaryRoot};
