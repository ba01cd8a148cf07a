use crate::error::{ArtioError, Result};
use serde::{Deserialize, Serialize};

/// Directory segment under which every artifact blob lives.
pub const PIPELINES_DIR: &str = "pipelines";

/// Validated (owner, project, name) triple identifying one artifact.
///
/// Construction is the only validation point: once an `ArtifactKey`
/// exists, its segments are safe to join into a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    owner: String,
    project: String,
    name: String,
}

impl ArtifactKey {
    pub fn new(
        owner: impl Into<String>,
        project: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let owner = owner.into();
        let project = project.into();
        let name = name.into();

        validate_segment("owner", &owner)?;
        validate_segment("project", &project)?;
        validate_segment("name", &name)?;

        Ok(Self {
            owner,
            project,
            name,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derived storage path: `<owner>/<project>/pipelines/<name>`.
    pub fn location(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.owner, self.project, PIPELINES_DIR, self.name
        )
    }

    /// Directory holding every blob of this key's (owner, project) scope.
    pub fn scope_dir(&self) -> String {
        scope_dir(&self.owner, &self.project)
    }

    /// Same scope, different name.
    pub fn renamed(&self, name: impl Into<String>) -> Result<Self> {
        Self::new(self.owner.clone(), self.project.clone(), name)
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.project, self.name)
    }
}

/// Blob directory for an (owner, project) scope.
pub fn scope_dir(owner: &str, project: &str) -> String {
    format!("{}/{}/{}", owner, project, PIPELINES_DIR)
}

/// Reject anything that is not a single safe path segment.
pub fn validate_segment(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ArtioError::InvalidRequest(format!(
            "{} cannot be empty",
            label
        )));
    }

    if value == "." || value == ".." {
        return Err(ArtioError::InvalidRequest(format!(
            "{} cannot be a traversal segment: {}",
            label, value
        )));
    }

    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(ArtioError::InvalidRequest(format!(
            "{} contains an invalid character: {}",
            label, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_slash_joined() {
        let key = ArtifactKey::new("u1@example.com", "p1", "model.pkl").unwrap();
        assert_eq!(key.location(), "u1@example.com/p1/pipelines/model.pkl");
        assert_eq!(key.scope_dir(), "u1@example.com/p1/pipelines");
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!(ArtifactKey::new("", "p1", "model.pkl").is_err());
        assert!(ArtifactKey::new("u1", "", "model.pkl").is_err());
        assert!(ArtifactKey::new("u1", "p1", "").is_err());
    }

    #[test]
    fn test_rejects_traversal_segments() {
        assert!(ArtifactKey::new("u1", "p1", "..").is_err());
        assert!(ArtifactKey::new("u1", "p1", ".").is_err());
        assert!(ArtifactKey::new("u1", "p1", "a/b").is_err());
        assert!(ArtifactKey::new("u1", "p1", "a\\b").is_err());
        assert!(ArtifactKey::new("..", "p1", "model.pkl").is_err());
    }

    #[test]
    fn test_renamed_keeps_scope() {
        let key = ArtifactKey::new("u1", "p1", "a.pkl").unwrap();
        let renamed = key.renamed("b.pkl").unwrap();
        assert_eq!(renamed.owner(), "u1");
        assert_eq!(renamed.project(), "p1");
        assert_eq!(renamed.name(), "b.pkl");
        assert!(key.renamed("../evil").is_err());
    }
}
