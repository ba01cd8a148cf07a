use crate::error::{ArtioError, Result};
use crate::key::ArtifactKey;
use crate::storage::{ArtifactRecord, BlobStore, RecordStore, verify_hash};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadArtifactOperation {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

#[derive(Debug, Clone)]
pub struct ReadArtifactOperationRequest {
    pub owner: String,
    pub project: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ReadArtifactOperationResult {
    pub record: ArtifactRecord,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum ReadArtifactOperationOutcome {
    Found(ReadArtifactOperationResult),
    NotFound,
}

impl ReadArtifactOperation {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }

    pub async fn run(
        &self,
        request: ReadArtifactOperationRequest,
    ) -> Result<ReadArtifactOperationOutcome> {
        let ReadArtifactOperationRequest {
            owner,
            project,
            name,
        } = request;

        let key = ArtifactKey::new(owner, project, name)?;

        let Some(record) = self.records.find_one(&key).await? else {
            return Ok(ReadArtifactOperationOutcome::NotFound);
        };

        // A present record with a missing blob is divergence, not a miss.
        let Some(body) = self.blobs.read(&record.location).await? else {
            tracing::error!(
                "Dangling record {}: no blob at {}",
                key,
                record.location
            );
            return Err(ArtioError::Inconsistency(format!(
                "record {} has no blob at {}",
                key, record.location
            )));
        };

        if let Err(error) = verify_hash(&body, &record.sha256) {
            tracing::error!("Blob at {} diverged from record {}: {}", record.location, key, error);
            return Err(error);
        }

        Ok(ReadArtifactOperationOutcome::Found(
            ReadArtifactOperationResult { record, body },
        ))
    }
}
