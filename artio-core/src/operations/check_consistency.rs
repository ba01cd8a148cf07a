use crate::error::Result;
use crate::key::{scope_dir, validate_segment};
use crate::storage::{ArtifactRecord, BlobStore, RecordStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Detection-only scan of one (owner, project) scope: compares record
/// locations against the blob names actually on disk. It never repairs.
#[derive(Clone)]
pub struct CheckConsistencyOperation {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

#[derive(Debug, Clone)]
pub struct CheckConsistencyOperationRequest {
    pub owner: String,
    pub project: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DivergenceReport {
    /// Records whose blob is missing from the scope directory.
    pub dangling_records: Vec<ArtifactRecord>,
    /// Blob file names with no matching record.
    pub orphan_blobs: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum CheckConsistencyOperationOutcome {
    Consistent { artifacts: usize },
    Diverged(DivergenceReport),
}

impl CheckConsistencyOperation {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }

    pub async fn run(
        &self,
        request: CheckConsistencyOperationRequest,
    ) -> Result<CheckConsistencyOperationOutcome> {
        let CheckConsistencyOperationRequest { owner, project } = request;

        validate_segment("owner", &owner)?;
        validate_segment("project", &project)?;

        let records = self.records.find_all(&owner, &project).await?;
        let blob_names: HashSet<String> = self
            .blobs
            .list(&scope_dir(&owner, &project))
            .await?
            .into_iter()
            .collect();

        let record_names: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();

        let dangling_records: Vec<ArtifactRecord> = records
            .iter()
            .filter(|record| !blob_names.contains(&record.name))
            .cloned()
            .collect();

        let mut orphan_blobs: Vec<String> = blob_names
            .iter()
            .filter(|name| !record_names.contains(name.as_str()))
            .cloned()
            .collect();
        orphan_blobs.sort_unstable();

        if dangling_records.is_empty() && orphan_blobs.is_empty() {
            return Ok(CheckConsistencyOperationOutcome::Consistent {
                artifacts: records.len(),
            });
        }

        tracing::error!(
            "Store divergence in {}/{}: {} dangling record(s), {} orphan blob(s)",
            owner,
            project,
            dangling_records.len(),
            orphan_blobs.len()
        );

        Ok(CheckConsistencyOperationOutcome::Diverged(
            DivergenceReport {
                dangling_records,
                orphan_blobs,
            },
        ))
    }
}
