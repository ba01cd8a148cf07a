//! Artio Core - pipeline artifact storage for user projects
//!
//! Each artifact is a named binary blob owned by a (owner, project) pair:
//! - SQLite for the metadata records
//! - Filesystem blobs at a location derived from (owner, project, name)
//! - Dual-write discipline: every mutation keeps both stores in agreement
//!   or surfaces a compensated failure / divergence report

pub mod connectivity;
pub mod error;
pub mod key;
pub mod keylock;
pub mod operations;
pub mod storage;

pub use connectivity::ConnectivityGuard;
pub use error::{ArtioError, Result};
pub use key::{ArtifactKey, PIPELINES_DIR, validate_segment};
pub use keylock::KeyLocks;
pub use operations::{
    CheckConsistencyOperation, CheckConsistencyOperationOutcome, CheckConsistencyOperationRequest,
    CreateArtifactOperation, CreateArtifactOperationOutcome, CreateArtifactOperationRequest,
    CreateArtifactOperationResult, DeleteArtifactOperation, DeleteArtifactOperationOutcome,
    DeleteArtifactOperationRequest, DeleteArtifactOperationResult, DivergenceReport,
    ListArtifactsOperation, ListArtifactsOperationOutcome, ListArtifactsOperationRequest,
    ReadArtifactOperation, ReadArtifactOperationOutcome, ReadArtifactOperationRequest,
    ReadArtifactOperationResult, StoreMutations, UpdateArtifactOperation,
    UpdateArtifactOperationOutcome, UpdateArtifactOperationRequest, UpdateArtifactOperationResult,
};
pub use storage::{
    ArtifactRecord, BlobStore, FsBlobStore, ProjectStore, RecordPatch, RecordStore,
    SqliteRecordStore, compute_hash, verify_hash,
};
