use crate::error::{ArtioError, Result};
use crate::key::ArtifactKey;
use crate::keylock::KeyLocks;
use crate::operations::StoreMutations;
use crate::storage::{ArtifactRecord, BlobStore, RecordPatch, RecordStore, compute_hash};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct UpdateArtifactOperation {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct UpdateArtifactOperationRequest {
    pub owner: String,
    pub project: String,
    pub name: String,
    pub new_name: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct UpdateArtifactOperationResult {
    pub record: ArtifactRecord,
    pub mutations: StoreMutations,
}

#[derive(Debug, Clone)]
pub enum UpdateArtifactOperationOutcome {
    Updated(UpdateArtifactOperationResult),
    NotFound,
    NameTaken,
}

impl UpdateArtifactOperation {
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
        request: UpdateArtifactOperationRequest,
    ) -> Result<UpdateArtifactOperationOutcome> {
        let UpdateArtifactOperationRequest {
            owner,
            project,
            name,
            new_name,
            body,
        } = request;

        let key = ArtifactKey::new(owner, project, name)?;
        let new_key = key.renamed(new_name)?;
        let renaming = new_key != key;

        let (_held, _held_new) = self.locks.hold_pair(&key, &new_key).await;

        let Some(existing) = self.records.find_one(&key).await? else {
            return Ok(UpdateArtifactOperationOutcome::NotFound);
        };

        if renaming && self.records.find_one(&new_key).await?.is_some() {
            return Ok(UpdateArtifactOperationOutcome::NameTaken);
        }

        let old_location = existing.location.clone();
        let new_location = new_key.location();

        if renaming {
            if !self.blobs.exists(&old_location).await {
                tracing::error!("Dangling record {}: no blob at {}", key, old_location);
                return Err(ArtioError::Inconsistency(format!(
                    "record {} has no blob at {}",
                    key, old_location
                )));
            }

            // A rename failure aborts before any metadata change; the record
            // remains valid at the old name.
            self.blobs.rename(&old_location, &new_location).await?;
        }

        if let Err(write_error) = self.blobs.write(&new_location, body.clone()).await {
            if renaming {
                // The blob now lives at the new path while the record still
                // names the old one. A blind rename-back can itself fail, so
                // surface the divergence for external reconciliation.
                tracing::error!(
                    "Overwrite failed after rename {} -> {}: {}",
                    old_location,
                    new_location,
                    write_error
                );
                return Err(ArtioError::Inconsistency(format!(
                    "blob moved {} -> {} but overwrite failed: {}",
                    old_location, new_location, write_error
                )));
            }

            // The atomic write left the previous content in place.
            return Err(write_error);
        }

        let patch = RecordPatch {
            name: new_key.name().to_string(),
            location: new_location.clone(),
            size_bytes: body.len() as u64,
            sha256: compute_hash(&body),
            updated_at: Utc::now(),
        };

        match self.records.find_one_and_update(&key, &patch).await {
            Ok(Some(record)) => {
                tracing::info!("Updated artifact {} -> {}", key, new_key);
                Ok(UpdateArtifactOperationOutcome::Updated(
                    UpdateArtifactOperationResult {
                        record,
                        mutations: StoreMutations {
                            blob: true,
                            record: true,
                        },
                    },
                ))
            }
            Ok(None) => {
                tracing::error!(
                    "Record {} vanished after blob write at {}",
                    key,
                    new_location
                );
                Err(ArtioError::Inconsistency(format!(
                    "record {} vanished after blob write at {}",
                    key, new_location
                )))
            }
            Err(update_error) => {
                tracing::error!(
                    "Record update failed for {} after blob write at {}: {}",
                    key,
                    new_location,
                    update_error
                );
                Err(ArtioError::Inconsistency(format!(
                    "record update failed for {} after blob write at {}: {}",
                    key, new_location, update_error
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::read_artifact::{
        ReadArtifactOperation, ReadArtifactOperationOutcome, ReadArtifactOperationRequest,
    };
    use crate::operations::testkit::{FailingBlobStore, FailingRecordStore, create_artifact, env};

    fn request(name: &str, new_name: &str, body: &'static [u8]) -> UpdateArtifactOperationRequest {
        UpdateArtifactOperationRequest {
            owner: "u1".to_string(),
            project: "p1".to_string(),
            name: name.to_string(),
            new_name: new_name.to_string(),
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn test_update_replaces_content_in_place() {
        let env = env();
        create_artifact(&env, "u1", "p1", "model.pkl", b"v1").await;

        let op = UpdateArtifactOperation::new(
            env.records.clone(),
            env.blobs.clone(),
            env.locks.clone(),
        );
        let outcome = op.run(request("model.pkl", "model.pkl", b"v2")).await.unwrap();

        let UpdateArtifactOperationOutcome::Updated(result) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(result.record.name, "model.pkl");
        assert_eq!(result.record.size_bytes, 2);

        let body = env
            .blobs
            .read("u1/p1/pipelines/model.pkl")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_rename_moves_blob_and_record() {
        let env = env();
        create_artifact(&env, "u1", "p1", "a.pkl", b"v1").await;

        let op = UpdateArtifactOperation::new(
            env.records.clone(),
            env.blobs.clone(),
            env.locks.clone(),
        );
        op.run(request("a.pkl", "b.pkl", b"v2")).await.unwrap();

        let read = ReadArtifactOperation::new(env.records.clone(), env.blobs.clone());

        let at_new = read
            .run(ReadArtifactOperationRequest {
                owner: "u1".to_string(),
                project: "p1".to_string(),
                name: "b.pkl".to_string(),
            })
            .await
            .unwrap();
        let ReadArtifactOperationOutcome::Found(result) = at_new else {
            panic!("expected Found at new name");
        };
        assert_eq!(result.body, Bytes::from_static(b"v2"));

        let at_old = read
            .run(ReadArtifactOperationRequest {
                owner: "u1".to_string(),
                project: "p1".to_string(),
                name: "a.pkl".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(at_old, ReadArtifactOperationOutcome::NotFound));
        assert!(!env.blobs.exists("u1/p1/pipelines/a.pkl").await);
    }

    #[tokio::test]
    async fn test_update_missing_artifact_is_not_found() {
        let env = env();

        let op = UpdateArtifactOperation::new(
            env.records.clone(),
            env.blobs.clone(),
            env.locks.clone(),
        );
        let outcome = op.run(request("ghost.pkl", "ghost.pkl", b"v2")).await.unwrap();
        assert!(matches!(outcome, UpdateArtifactOperationOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_is_conflict() {
        let env = env();
        create_artifact(&env, "u1", "p1", "a.pkl", b"one").await;
        create_artifact(&env, "u1", "p1", "b.pkl", b"two").await;

        let op = UpdateArtifactOperation::new(
            env.records.clone(),
            env.blobs.clone(),
            env.locks.clone(),
        );
        let outcome = op.run(request("a.pkl", "b.pkl", b"moved")).await.unwrap();
        assert!(matches!(outcome, UpdateArtifactOperationOutcome::NameTaken));

        // Neither artifact was touched
        assert_eq!(
            env.blobs.read("u1/p1/pipelines/a.pkl").await.unwrap().unwrap(),
            Bytes::from_static(b"one")
        );
        assert_eq!(
            env.blobs.read("u1/p1/pipelines/b.pkl").await.unwrap().unwrap(),
            Bytes::from_static(b"two")
        );
    }

    #[tokio::test]
    async fn test_rename_failure_keeps_record_valid() {
        let env = env();
        create_artifact(&env, "u1", "p1", "a.pkl", b"v1").await;

        let blobs = Arc::new(FailingBlobStore::new(env.blobs.clone()).fail_rename());
        let op = UpdateArtifactOperation::new(env.records.clone(), blobs, env.locks.clone());

        let err = op.run(request("a.pkl", "b.pkl", b"v2")).await.unwrap_err();
        assert!(matches!(err, ArtioError::Storage(_)));

        // Record still names the old blob and both are readable
        let read = ReadArtifactOperation::new(env.records.clone(), env.blobs.clone());
        let outcome = read
            .run(ReadArtifactOperationRequest {
                owner: "u1".to_string(),
                project: "p1".to_string(),
                name: "a.pkl".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, ReadArtifactOperationOutcome::Found(_)));
    }

    #[tokio::test]
    async fn test_overwrite_failure_after_rename_is_inconsistency() {
        let env = env();
        create_artifact(&env, "u1", "p1", "a.pkl", b"v1").await;

        let blobs = Arc::new(FailingBlobStore::new(env.blobs.clone()).fail_write());
        let op = UpdateArtifactOperation::new(env.records.clone(), blobs, env.locks.clone());

        let err = op.run(request("a.pkl", "b.pkl", b"v2")).await.unwrap_err();
        assert!(matches!(err, ArtioError::Inconsistency(_)));

        // Blob moved, record did not
        assert!(env.blobs.exists("u1/p1/pipelines/b.pkl").await);
        let key = ArtifactKey::new("u1", "p1", "a.pkl").unwrap();
        assert!(env.records.find_one(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_update_failure_after_rename_is_inconsistency() {
        let env = env();
        create_artifact(&env, "u1", "p1", "a.pkl", b"v1").await;

        let records = Arc::new(FailingRecordStore::new(env.records.clone()).fail_update());
        let op = UpdateArtifactOperation::new(records, env.blobs.clone(), env.locks.clone());

        let err = op.run(request("a.pkl", "b.pkl", b"v2")).await.unwrap_err();
        assert!(matches!(err, ArtioError::Inconsistency(_)));

        // Simulated crash between blob rename and metadata update: the blob
        // lives at the new name while the record still points at the old one
        assert!(env.blobs.exists("u1/p1/pipelines/b.pkl").await);
        assert!(!env.blobs.exists("u1/p1/pipelines/a.pkl").await);
        let key = ArtifactKey::new("u1", "p1", "a.pkl").unwrap();
        assert_eq!(
            env.records.find_one(&key).await.unwrap().unwrap().location,
            "u1/p1/pipelines/a.pkl"
        );
    }
}
