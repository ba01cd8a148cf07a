use crate::error::Result;
use crate::key::ArtifactKey;
use crate::keylock::KeyLocks;
use crate::operations::StoreMutations;
use crate::storage::{ArtifactRecord, BlobStore, RecordStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteArtifactOperation {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct DeleteArtifactOperationRequest {
    pub owner: String,
    pub project: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DeleteArtifactOperationResult {
    pub record: ArtifactRecord,
    pub blob_removed: bool,
    pub mutations: StoreMutations,
}

#[derive(Debug, Clone)]
pub enum DeleteArtifactOperationOutcome {
    Deleted(DeleteArtifactOperationResult),
    NotFound,
}

impl DeleteArtifactOperation {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            records,
            blobs,
            locks,
        }
    }

    pub async fn run(
        &self,
        request: DeleteArtifactOperationRequest,
    ) -> Result<DeleteArtifactOperationOutcome> {
        let DeleteArtifactOperationRequest {
            owner,
            project,
            name,
        } = request;

        let key = ArtifactKey::new(owner, project, name)?;
        let _held = self.locks.hold(&key).await;

        // The record is the authoritative half; remove it first.
        let Some(record) = self.records.find_one_and_delete(&key).await? else {
            return Ok(DeleteArtifactOperationOutcome::NotFound);
        };

        let blob_removed = match self.blobs.remove(&record.location).await {
            Ok(removed) => {
                if !removed {
                    tracing::debug!("Blob already absent at {}", record.location);
                }
                removed
            }
            Err(error) => {
                // The record is gone, so the delete stands; the leftover blob
                // is reclaimable by the consistency scan.
                tracing::warn!(
                    "Blob removal failed at {} after record delete: {}",
                    record.location,
                    error
                );
                false
            }
        };

        tracing::info!("Deleted artifact {}", key);

        Ok(DeleteArtifactOperationOutcome::Deleted(
            DeleteArtifactOperationResult {
                record,
                blob_removed,
                mutations: StoreMutations {
                    blob: blob_removed,
                    record: true,
                },
            },
        ))
    }
}
