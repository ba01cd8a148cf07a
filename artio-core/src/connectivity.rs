use crate::error::{ArtioError, Result};
use crate::storage::RecordStore;
use std::sync::Arc;

/// Per-request reachability check for the metadata store.
///
/// Callers run `ensure()` before invoking artifact operations. A single
/// failed probe is reported immediately as `Unavailable`; there are no
/// retries.
#[derive(Clone)]
pub struct ConnectivityGuard {
    records: Arc<dyn RecordStore>,
}

impl ConnectivityGuard {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn ensure(&self) -> Result<()> {
        self.records.ping().await.map_err(|error| {
            tracing::warn!("Metadata store ping failed: {}", error);
            ArtioError::Unavailable(error.to_string())
        })
    }
}
