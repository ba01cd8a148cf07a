pub mod check_consistency;
pub mod create_artifact;
pub mod delete_artifact;
pub mod list_artifacts;
pub mod read_artifact;
pub mod update_artifact;

#[cfg(test)]
pub(crate) mod testkit;

pub use check_consistency::{
    CheckConsistencyOperation, CheckConsistencyOperationOutcome, CheckConsistencyOperationRequest,
    DivergenceReport,
};
pub use create_artifact::{
    CreateArtifactOperation, CreateArtifactOperationOutcome, CreateArtifactOperationRequest,
    CreateArtifactOperationResult,
};
pub use delete_artifact::{
    DeleteArtifactOperation, DeleteArtifactOperationOutcome, DeleteArtifactOperationRequest,
    DeleteArtifactOperationResult,
};
pub use list_artifacts::{
    ListArtifactsOperation, ListArtifactsOperationOutcome, ListArtifactsOperationRequest,
};
pub use read_artifact::{
    ReadArtifactOperation, ReadArtifactOperationOutcome, ReadArtifactOperationRequest,
    ReadArtifactOperationResult,
};
pub use update_artifact::{
    UpdateArtifactOperation, UpdateArtifactOperationOutcome, UpdateArtifactOperationRequest,
    UpdateArtifactOperationResult,
};

/// Which sub-stores a completed operation actually mutated. Lets callers
/// and tests see the write footprint without inspecting the stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMutations {
    pub blob: bool,
    pub record: bool,
}
