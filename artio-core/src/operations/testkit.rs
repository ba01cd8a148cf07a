//! Shared fixtures for operation tests: tempdir-backed real stores for the
//! happy paths, failure-injecting wrappers for compensation and divergence
//! paths.

use crate::error::{ArtioError, Result};
use crate::key::ArtifactKey;
use crate::keylock::KeyLocks;
use crate::operations::create_artifact::{
    CreateArtifactOperation, CreateArtifactOperationOutcome, CreateArtifactOperationRequest,
};
use crate::storage::{
    ArtifactRecord, BlobStore, FsBlobStore, RecordPatch, RecordStore, SqliteRecordStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub(crate) struct TestEnv {
    pub _dir: tempfile::TempDir,
    pub records: Arc<SqliteRecordStore>,
    pub blobs: Arc<FsBlobStore>,
    pub locks: Arc<KeyLocks>,
}

pub(crate) fn env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let records = Arc::new(SqliteRecordStore::new(dir.path().join("artio.db")).unwrap());
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("storage")).unwrap());
    TestEnv {
        _dir: dir,
        records,
        blobs,
        locks: Arc::new(KeyLocks::new()),
    }
}

pub(crate) fn sqlite_store() -> (tempfile::TempDir, Arc<SqliteRecordStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::new(dir.path().join("artio.db")).unwrap());
    (dir, store)
}

/// Create an artifact through the real operation, registering the project
/// on the way. Panics on any non-Created outcome.
pub(crate) async fn create_artifact(
    env: &TestEnv,
    owner: &str,
    project: &str,
    name: &str,
    body: &'static [u8],
) -> ArtifactRecord {
    env.records.register_project(owner, project).unwrap();

    let op = CreateArtifactOperation::new(
        env.records.clone(),
        env.blobs.clone(),
        env.records.clone(),
        env.locks.clone(),
    );

    let outcome = op
        .run(CreateArtifactOperationRequest {
            owner: owner.to_string(),
            project: project.to_string(),
            name: name.to_string(),
            body: Bytes::from_static(body),
        })
        .await
        .unwrap();

    match outcome {
        CreateArtifactOperationOutcome::Created(result) => result.record,
        other => panic!("unexpected create outcome: {:?}", other),
    }
}

/// Record store wrapper that fails selected calls with injected errors.
pub(crate) struct FailingRecordStore {
    inner: Arc<dyn RecordStore>,
    insert_fails: bool,
    update_fails: bool,
    delete_fails: bool,
    ping_fails: bool,
}

impl FailingRecordStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            insert_fails: false,
            update_fails: false,
            delete_fails: false,
            ping_fails: false,
        }
    }

    pub fn fail_insert(mut self) -> Self {
        self.insert_fails = true;
        self
    }

    pub fn fail_update(mut self) -> Self {
        self.update_fails = true;
        self
    }

    #[allow(dead_code)]
    pub fn fail_delete(mut self) -> Self {
        self.delete_fails = true;
        self
    }

    pub fn fail_ping(mut self) -> Self {
        self.ping_fails = true;
        self
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn find_all(&self, owner: &str, project: &str) -> Result<Vec<ArtifactRecord>> {
        self.inner.find_all(owner, project).await
    }

    async fn find_one(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>> {
        self.inner.find_one(key).await
    }

    async fn insert(&self, record: &ArtifactRecord) -> Result<()> {
        if self.insert_fails {
            return Err(ArtioError::Internal("injected insert failure".to_string()));
        }
        self.inner.insert(record).await
    }

    async fn find_one_and_update(
        &self,
        key: &ArtifactKey,
        patch: &RecordPatch,
    ) -> Result<Option<ArtifactRecord>> {
        if self.update_fails {
            return Err(ArtioError::Internal("injected update failure".to_string()));
        }
        self.inner.find_one_and_update(key, patch).await
    }

    async fn find_one_and_delete(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>> {
        if self.delete_fails {
            return Err(ArtioError::Internal("injected delete failure".to_string()));
        }
        self.inner.find_one_and_delete(key).await
    }

    async fn ping(&self) -> Result<()> {
        if self.ping_fails {
            return Err(ArtioError::Internal("injected ping failure".to_string()));
        }
        self.inner.ping().await
    }
}

/// Blob store wrapper that fails selected calls with injected errors.
pub(crate) struct FailingBlobStore {
    inner: Arc<dyn BlobStore>,
    write_fails: bool,
    rename_fails: bool,
    remove_fails: bool,
}

impl FailingBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            write_fails: false,
            rename_fails: false,
            remove_fails: false,
        }
    }

    pub fn fail_write(mut self) -> Self {
        self.write_fails = true;
        self
    }

    pub fn fail_rename(mut self) -> Self {
        self.rename_fails = true;
        self
    }

    pub fn fail_remove(mut self) -> Self {
        self.remove_fails = true;
        self
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn write(&self, location: &str, body: Bytes) -> Result<()> {
        if self.write_fails {
            return Err(ArtioError::Storage("injected write failure".to_string()));
        }
        self.inner.write(location, body).await
    }

    async fn read(&self, location: &str) -> Result<Option<Bytes>> {
        self.inner.read(location).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        if self.rename_fails {
            return Err(ArtioError::Storage("injected rename failure".to_string()));
        }
        self.inner.rename(from, to).await
    }

    async fn remove(&self, location: &str) -> Result<bool> {
        if self.remove_fails {
            return Err(ArtioError::Storage("injected remove failure".to_string()));
        }
        self.inner.remove(location).await
    }

    async fn exists(&self, location: &str) -> bool {
        self.inner.exists(location).await
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        self.inner.list(dir).await
    }
}
