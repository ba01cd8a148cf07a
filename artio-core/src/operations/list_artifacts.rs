use crate::error::Result;
use crate::key::validate_segment;
use crate::storage::{ArtifactRecord, RecordStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct ListArtifactsOperation {
    records: Arc<dyn RecordStore>,
}

#[derive(Debug, Clone)]
pub struct ListArtifactsOperationRequest {
    pub owner: String,
    pub project: String,
}

/// Records come back in store-native order; callers must not depend on it.
#[derive(Debug, Clone)]
pub enum ListArtifactsOperationOutcome {
    Found(Vec<ArtifactRecord>),
    NotFound,
}

impl ListArtifactsOperation {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn run(
        &self,
        request: ListArtifactsOperationRequest,
    ) -> Result<ListArtifactsOperationOutcome> {
        let ListArtifactsOperationRequest { owner, project } = request;

        validate_segment("owner", &owner)?;
        validate_segment("project", &project)?;

        let records = self.records.find_all(&owner, &project).await?;
        if records.is_empty() {
            return Ok(ListArtifactsOperationOutcome::NotFound);
        }

        Ok(ListArtifactsOperationOutcome::Found(records))
    }
}
