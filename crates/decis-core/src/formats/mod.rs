//! # Exchange and Persistence Formats
//!
//! Pure byte/document transformations, no file I/O. The app layer owns
//! reading and writing files.

pub mod json;
pub mod snapshot;

pub use json::{export_document, import_document, Document};
pub use snapshot::{store_from_bytes, store_to_bytes, SnapshotHeader};
