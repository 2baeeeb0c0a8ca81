//! Run record assembler.
//!
//! Packages the outputs of one invocation into an immutable [`RunRecord`].
//! Infallible: everything that can fail has already happened upstream.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

use crate::types::{NormalizedFeatureSet, RawObservation, RunRecord, Scenario, ScoreTriple};

/// Source of "now". Injected so that runs are reproducible in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `<SESSION>-<ISO8601 UTC, second precision>`, e.g. `PRE-2026-01-05T13:00:00Z`.
pub fn run_id(session: &str, at: DateTime<Utc>) -> String {
    format!("{session}-{}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Build the run record. `created_at` is truncated to whole seconds so it
/// matches the timestamp embedded in the run identifier.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    session_token: &str,
    config_version: &str,
    raw: &RawObservation,
    normalized: NormalizedFeatureSet,
    scores: ScoreTriple,
    dominant: Scenario,
    margin: f64,
    clock: &dyn Clock,
) -> RunRecord {
    let now = clock.now();
    let created_at = now.with_nanosecond(0).unwrap_or(now);

    RunRecord::new(
        run_id(session_token, created_at),
        session_token.to_string(),
        config_version.to_string(),
        raw.clone(),
        normalized,
        scores,
        dominant,
        margin,
        created_at,
    )
}
