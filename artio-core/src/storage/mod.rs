//! Storage modules for Artio
//!
//! Provides filesystem blob storage and SQLite-backed metadata records.

pub mod blob_store;
pub mod record_store;

pub use blob_store::{BlobStore, FsBlobStore, compute_hash, verify_hash};
pub use record_store::{
    ArtifactRecord, ProjectStore, RecordPatch, RecordStore, SqliteRecordStore,
};
