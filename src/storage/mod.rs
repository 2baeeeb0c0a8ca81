//! Persistence layer.
//!
//! Writes the artifacts of a run under an output directory:
//!
//! ```text
//! outputs/inputs/<stem>.json   fetched snapshot
//! outputs/json/<stem>.json     report document (run record nested under `record`)
//! outputs/reports/<stem>.md    Markdown report
//! ```
//!
//! The stem is the run id with `:` removed and every other character outside
//! `[A-Za-z0-9_-]` replaced by `_`, so custom session tokens can neither
//! leave the output directory nor produce invalid file names. If any of the three files already exists, an 8-char
//! suffix from a v4 UUID is appended to the stem. The run id inside the
//! documents is never changed.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::data::MarketSnapshot;
use crate::report::OutlookReport;
use crate::types::{OutlookError, RunRecord};

const INPUTS_DIR: &str = "inputs";
const JSON_DIR: &str = "json";
const REPORTS_DIR: &str = "reports";

/// Attempts at finding a free suffixed stem before giving up.
const MAX_SUFFIX_ATTEMPTS: usize = 8;

/// Where one run's artifacts were written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactPaths {
    pub snapshot: PathBuf,
    pub json: PathBuf,
    pub report: PathBuf,
}

/// File stem for a run id: `PRE-2026-01-05T13:00:00Z` → `PRE-2026-01-05T130000Z`.
pub fn file_stem(run_id: &str) -> String {
    run_id
        .chars()
        .filter(|c| *c != ':')
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn paths_for(root: &Path, stem: &str) -> ArtifactPaths {
    ArtifactPaths {
        snapshot: root.join(INPUTS_DIR).join(format!("{stem}.json")),
        json: root.join(JSON_DIR).join(format!("{stem}.json")),
        report: root.join(REPORTS_DIR).join(format!("{stem}.md")),
    }
}

fn any_exists(paths: &ArtifactPaths) -> bool {
    paths.snapshot.exists() || paths.json.exists() || paths.report.exists()
}

/// Pick artifact paths that do not overwrite an earlier run.
pub fn reserve_paths(root: &Path, run_id: &str) -> Result<ArtifactPaths> {
    let stem = file_stem(run_id);
    let paths = paths_for(root, &stem);
    if !any_exists(&paths) {
        return Ok(paths);
    }

    for _ in 0..MAX_SUFFIX_ATTEMPTS {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let candidate = paths_for(root, &format!("{stem}-{suffix}"));
        if !any_exists(&candidate) {
            warn!(run_id, suffix = %suffix, "Artifacts for this run id already exist, writing with suffix");
            return Ok(candidate);
        }
    }

    Err(OutlookError::Storage(format!(
        "no free artifact name for run {run_id} in {}",
        root.display()
    ))
    .into())
}

/// Write the snapshot, report document and Markdown report of one run.
pub fn save_run(
    root: impl AsRef<Path>,
    snapshot: &MarketSnapshot,
    report: &OutlookReport,
) -> Result<ArtifactPaths> {
    let root = root.as_ref();
    for dir in [INPUTS_DIR, JSON_DIR, REPORTS_DIR] {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)
            .context(format!("Failed to create output directory {}", path.display()))?;
    }

    let paths = reserve_paths(root, report.run_id())?;

    write_artifacts(&paths, snapshot, report)?;

    info!(
        run_id = %report.run_id(),
        json = %paths.json.display(),
        report = %paths.report.display(),
        "Artifacts written"
    );
    Ok(paths)
}

/// Write all three artifacts, or none: files written before a failure are removed.
fn write_artifacts(
    paths: &ArtifactPaths,
    snapshot: &MarketSnapshot,
    report: &OutlookReport,
) -> Result<()> {
    let written = save_json(&paths.snapshot, snapshot)
        .and_then(|_| save_json(&paths.json, report))
        .and_then(|_| {
            std::fs::write(&paths.report, report.to_markdown())
                .context(format!("Failed to write report to {}", paths.report.display()))
        });

    if written.is_err() {
        for path in [&paths.snapshot, &paths.json, &paths.report] {
            if path.is_file() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial artifact");
                }
            }
        }
    }
    written
}

/// The most recently written report document under `root`, if any.
///
/// Newest by modification time; equal times fall back to the file name.
pub fn latest_document(root: impl AsRef<Path>) -> Result<Option<serde_json::Value>> {
    let dir = root.as_ref().join(JSON_DIR);
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(&dir).context(format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .context(format!("Failed to stat {}", path.display()))?;
        let candidate = (modified, path);
        if newest.as_ref().map_or(true, |best| candidate > *best) {
            newest = Some(candidate);
        }
    }

    match newest {
        Some((_, path)) => {
            debug!(path = %path.display(), "Latest report document");
            load_json(&path).map(Some)
        }
        None => Ok(None),
    }
}

/// Serialize `value` as pretty JSON to `path`.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .context(format!("Failed to serialise {}", path.display()))?;
    std::fs::write(path, &json).context(format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = json.len(), "JSON saved");
    Ok(())
}

/// Read and parse a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).context(format!("Failed to parse {}", path.display()))
}

/// Load the run record from a report document written by [`save_run`].
pub fn load_record(path: impl AsRef<Path>) -> Result<RunRecord> {
    let path = path.as_ref();
    let doc: serde_json::Value = load_json(path)?;
    let record = doc
        .get("record")
        .cloned()
        .context(format!("No `record` in {}", path.display()))?;
    serde_json::from_value(record).context(format!("Invalid run record in {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
