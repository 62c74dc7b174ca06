//! # Formats
//!
//! Byte-level encodings of stored data. File and database I/O live in
//! `storage` and the app layer.

pub mod persistence;

pub use persistence::{
    MAX_RECORD_SIZE, PersistenceHeader, decode_answers, flow_from_bytes, flow_to_bytes,
};
