//! Run orchestration: fetch → derive → evaluate → render → persist.
//!
//! The runner owns the loaded configuration, one market data provider and
//! a clock. It holds no mutable state, so the HTTP server shares a single
//! instance across requests.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis;
use crate::config::{AppConfig, ScenarioConfig};
use crate::data::fred::FredOverlay;
use crate::data::snapshot_file::SnapshotFile;
use crate::data::stub::StubProvider;
use crate::data::{FetchRequest, MarketDataProvider, MarketSnapshot};
use crate::engine::{self, assembler::Clock, assembler::SystemClock, session};
use crate::report::OutlookReport;
use crate::storage::{self, ArtifactPaths};
use crate::types::OutlookError;

/// The result of a persisted run.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub report: OutlookReport,
    pub paths: ArtifactPaths,
}

pub struct Runner {
    config: AppConfig,
    scenarios: ScenarioConfig,
    provider: Box<dyn MarketDataProvider>,
    output_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl Runner {
    pub fn new(
        config: AppConfig,
        scenarios: ScenarioConfig,
        provider: Box<dyn MarketDataProvider>,
    ) -> Self {
        let output_dir = PathBuf::from(&config.data.output_dir);
        Self {
            config,
            scenarios,
            provider,
            output_dir,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scenarios(&self) -> &ScenarioConfig {
        &self.scenarios
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn provider_name(&self) -> String {
        self.provider.name()
    }

    /// Fetch and score one session without writing anything.
    pub async fn evaluate(&self, session_token: &str) -> Result<(OutlookReport, MarketSnapshot)> {
        // Fail on an unusable session before spending a fetch on it.
        let resolved = session::resolve(session_token, &self.scenarios)?;

        let request = FetchRequest {
            symbol: self.config.symbols.spx.clone(),
            proxy: self.config.symbols.proxy.clone(),
            session: resolved.token.clone(),
            asof: self.clock.now(),
        };

        let snapshot = self.provider.fetch_snapshot(&request).await.map_err(|e| {
            OutlookError::Data {
                provider: self.provider.name(),
                message: format!("{e:#}"),
            }
        })?;
        if !snapshot.health.missing.is_empty() {
            warn!(
                provider = %snapshot.health.provider,
                missing = ?snapshot.health.missing,
                "Provider could not supply every input"
            );
        }

        let analysis = analysis::analyze(&snapshot, &self.config.thresholds);
        let outcome = engine::evaluate(
            &resolved.token,
            &self.scenarios,
            &analysis.observation,
            self.clock.as_ref(),
        )?;

        let report = OutlookReport::build(outcome, analysis, &snapshot, &self.config);
        Ok((report, snapshot))
    }

    /// Fetch, score and write the artifacts for one session.
    pub async fn run(&self, session_token: &str) -> Result<RunArtifacts> {
        let (report, snapshot) = self.evaluate(session_token).await?;
        let paths = storage::save_run(&self.output_dir, &snapshot, &report)?;

        info!(
            run_id = %report.run_id(),
            dominant = %report.record.dominant_scenario(),
            low_conviction = report.low_conviction,
            "Run complete"
        );
        Ok(RunArtifacts { report, paths })
    }
}

/// Provider stack for the configuration: a snapshot replay when `snapshot`
/// is given, otherwise the env-driven stub, overlaid with FRED rates when
/// the configured API key variable is set.
pub fn build_provider(
    config: &AppConfig,
    snapshot: Option<&Path>,
) -> Result<Box<dyn MarketDataProvider>> {
    if let Some(path) = snapshot {
        info!(path = %path.display(), "Using snapshot replay provider");
        return Ok(Box::new(SnapshotFile::new(path)));
    }

    let stub = StubProvider::from_env(&config.thresholds);
    let fred_key = config
        .data
        .fred_api_key_env
        .as_deref()
        .and_then(|name| AppConfig::resolve_env(name).ok())
        .filter(|key| !key.trim().is_empty());

    match fred_key {
        Some(key) => {
            info!("FRED key found, overlaying Treasury yields");
            Ok(Box::new(FredOverlay::new(stub, key)?))
        }
        None => Ok(Box::new(stub)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
