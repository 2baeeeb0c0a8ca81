//! Replay provider: serves a snapshot previously saved as JSON.
//!
//! Used by `outlook run --snapshot <path>` to re-score recorded inputs, e.g.
//! an `outputs/inputs/<run>.json` written by an earlier run.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{FetchRequest, MarketDataProvider, MarketSnapshot};
use crate::storage;

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotFile {
    fn name(&self) -> String {
        "snapshot".to_string()
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<MarketSnapshot> {
        let mut snapshot: MarketSnapshot = storage::load_json(&self.path)?;
        debug!(path = %self.path.display(), session = %request.session, "Replaying snapshot");
        if snapshot.symbol.is_empty() {
            snapshot.symbol = request.symbol.clone();
        }
        if snapshot.proxy.is_empty() {
            snapshot.proxy = request.proxy.clone();
        }
        Ok(snapshot)
    }
}
