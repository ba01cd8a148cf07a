use crate::error::{ArtioError, Result};
use crate::key::ArtifactKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artifact metadata as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub owner: String,
    pub project: String,
    pub name: String,
    pub location: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a metadata update may change. Identity (owner, project) and the
/// record id are immutable.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    pub name: String,
    pub location: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub updated_at: DateTime<Utc>,
}

/// Metadata-side collaborator contract, document-store shaped: lookups by
/// the (owner, project, name) key, single-record mutate-and-return calls,
/// and a reachability probe.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_all(&self, owner: &str, project: &str) -> Result<Vec<ArtifactRecord>>;

    async fn find_one(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>>;

    /// Insert a new record. A duplicate (owner, project, name) is reported
    /// as `Conflict`.
    async fn insert(&self, record: &ArtifactRecord) -> Result<()>;

    /// Apply `patch` to the record at `key`. `None` when no record matched.
    async fn find_one_and_update(
        &self,
        key: &ArtifactKey,
        patch: &RecordPatch,
    ) -> Result<Option<ArtifactRecord>>;

    /// Remove and return the record at `key`. `None` when no record matched.
    async fn find_one_and_delete(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>>;

    /// Single reachability probe. No retries.
    async fn ping(&self) -> Result<()>;
}

/// Project-lookup collaborator: artifacts may only be created under an
/// existing project of the same owner.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn project_exists(&self, owner: &str, project: &str) -> Result<bool>;
}

/// SQLite-backed record store. Opens a connection per call; the schema is
/// initialized on construction.
pub struct SqliteRecordStore {
    db_path: PathBuf,
}

impl SqliteRecordStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS artifacts (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                owner TEXT NOT NULL,
                project TEXT NOT NULL,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (owner, project, name)
            )",
            [],
        )?;

        // Index for scope queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_artifacts_scope ON artifacts(owner, project)",
            [],
        )?;

        // Project directory; populated out-of-band (see server routes)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS projects (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (owner, name)
            )",
            [],
        )?;

        Ok(())
    }

    /// Register a project for an owner. Returns `false` when it already
    /// existed.
    pub fn register_project(&self, owner: &str, project: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "INSERT OR IGNORE INTO projects (owner, name, created_at) VALUES (?1, ?2, ?3)",
            params![owner, project, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Total artifact records, for the health probe.
    pub fn count_artifacts(&self) -> Result<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    let size_bytes: i64 = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(ArtifactRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        project: row.get(2)?,
        name: row.get(3)?,
        location: row.get(4)?,
        size_bytes: size_bytes as u64,
        sha256: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
            .with_timezone(&Utc),
    })
}

const RECORD_COLUMNS: &str =
    "id, owner, project, name, location, size_bytes, sha256, created_at, updated_at";

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_all(&self, owner: &str, project: &str) -> Result<Vec<ArtifactRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM artifacts WHERE owner = ?1 AND project = ?2",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([owner, project], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    async fn find_one(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>> {
        let conn = self.get_conn()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM artifacts WHERE owner = ?1 AND project = ?2 AND name = ?3",
                    RECORD_COLUMNS
                ),
                [key.owner(), key.project(), key.name()],
                row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    async fn insert(&self, record: &ArtifactRecord) -> Result<()> {
        let conn = self.get_conn()?;

        let inserted = conn.execute(
            "INSERT INTO artifacts (
                id, owner, project, name, location, size_bytes, sha256, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.owner,
                record.project,
                record.name,
                record.location,
                record.size_bytes as i64,
                record.sha256,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(code, message))
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ArtioError::Conflict(format!(
                    "artifact {}/{}/{} already exists: {}",
                    record.owner,
                    record.project,
                    record.name,
                    message.unwrap_or_default()
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find_one_and_update(
        &self,
        key: &ArtifactKey,
        patch: &RecordPatch,
    ) -> Result<Option<ArtifactRecord>> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            "UPDATE artifacts
             SET name = ?1, location = ?2, size_bytes = ?3, sha256 = ?4, updated_at = ?5
             WHERE owner = ?6 AND project = ?7 AND name = ?8",
            params![
                patch.name,
                patch.location,
                patch.size_bytes as i64,
                patch.sha256,
                patch.updated_at.to_rfc3339(),
                key.owner(),
                key.project(),
                key.name(),
            ],
        )?;

        if affected == 0 {
            return Ok(None);
        }

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM artifacts WHERE owner = ?1 AND project = ?2 AND name = ?3",
                    RECORD_COLUMNS
                ),
                [key.owner(), key.project(), patch.name.as_str()],
                row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    async fn find_one_and_delete(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>> {
        let conn = self.get_conn()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM artifacts WHERE owner = ?1 AND project = ?2 AND name = ?3",
                    RECORD_COLUMNS
                ),
                [key.owner(), key.project(), key.name()],
                row_to_record,
            )
            .optional()?;

        let Some(record) = record else {
            return Ok(None);
        };

        let affected = conn.execute(
            "DELETE FROM artifacts WHERE owner = ?1 AND project = ?2 AND name = ?3",
            [key.owner(), key.project(), key.name()],
        )?;

        if affected == 0 {
            // Lost a race to another delete
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for SqliteRecordStore {
    async fn project_exists(&self, owner: &str, project: &str) -> Result<bool> {
        let conn = self.get_conn()?;

        let found: Option<i64> = conn
            .query_row(
                "SELECT pk FROM projects WHERE owner = ?1 AND name = ?2",
                [owner, project],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }
}
