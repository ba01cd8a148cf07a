use crate::error::{ArtioError, Result};
use crate::key::ArtifactKey;
use crate::keylock::KeyLocks;
use crate::operations::StoreMutations;
use crate::storage::{ArtifactRecord, BlobStore, ProjectStore, RecordStore, compute_hash};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use ulid::Ulid;

#[derive(Clone)]
pub struct CreateArtifactOperation {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    projects: Arc<dyn ProjectStore>,
    locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct CreateArtifactOperationRequest {
    pub owner: String,
    pub project: String,
    pub name: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct CreateArtifactOperationResult {
    pub record: ArtifactRecord,
    pub mutations: StoreMutations,
}

#[derive(Debug, Clone)]
pub enum CreateArtifactOperationOutcome {
    Created(CreateArtifactOperationResult),
    ProjectNotFound,
    NameTaken,
}

impl CreateArtifactOperation {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        projects: Arc<dyn ProjectStore>,
        locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            records,
            blobs,
            projects,
            locks,
        }
    }

    pub async fn run(
        &self,
        request: CreateArtifactOperationRequest,
    ) -> Result<CreateArtifactOperationOutcome> {
        let CreateArtifactOperationRequest {
            owner,
            project,
            name,
            body,
        } = request;

        let key = ArtifactKey::new(owner, project, name)?;

        if !self
            .projects
            .project_exists(key.owner(), key.project())
            .await?
        {
            return Ok(CreateArtifactOperationOutcome::ProjectNotFound);
        }

        let _held = self.locks.hold(&key).await;

        if self.records.find_one(&key).await?.is_some() {
            return Ok(CreateArtifactOperationOutcome::NameTaken);
        }

        // Blob first: a failure here aborts with nothing persisted.
        let location = key.location();
        self.blobs.write(&location, body.clone()).await?;

        let now = Utc::now();
        let record = ArtifactRecord {
            id: Ulid::new().to_string(),
            owner: key.owner().to_string(),
            project: key.project().to_string(),
            name: key.name().to_string(),
            location: location.clone(),
            size_bytes: body.len() as u64,
            sha256: compute_hash(&body),
            created_at: now,
            updated_at: now,
        };

        if let Err(insert_error) = self.records.insert(&record).await {
            // Compensate: a failed create must not leave an orphan blob.
            match self.blobs.remove(&location).await {
                Ok(_) => {
                    tracing::warn!(
                        "Rolled back blob {} after record insert failure: {}",
                        location,
                        insert_error
                    );
                }
                Err(remove_error) => {
                    tracing::error!(
                        "Orphan blob left at {}: record insert failed ({}) and rollback failed ({})",
                        location,
                        insert_error,
                        remove_error
                    );
                    return Err(ArtioError::Inconsistency(format!(
                        "orphan blob at {}: record insert failed ({}) and rollback failed ({})",
                        location, insert_error, remove_error
                    )));
                }
            }

            return Err(match insert_error {
                conflict @ ArtioError::Conflict(_) => conflict,
                other => ArtioError::Storage(format!("record insert failed for {}: {}", key, other)),
            });
        }

        tracing::info!("Created artifact {} ({} bytes)", key, record.size_bytes);

        Ok(CreateArtifactOperationOutcome::Created(
            CreateArtifactOperationResult {
                record,
                mutations: StoreMutations {
                    blob: true,
                    record: true,
                },
            },
        ))
    }
}
