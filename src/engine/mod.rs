//! Core engine: session → slice → normalized features → scores → record.
//!
//! [`evaluate`] is the synchronous entry point shared by the CLI runner and
//! the HTTP server. It performs no I/O and holds no state between calls, so
//! concurrent invocations only need their own inputs.

pub mod assembler;
pub mod normalizer;
pub mod scorer;
pub mod session;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScenarioConfig;
use crate::types::{OutlookError, RawObservation, RunRecord, Scenario, ScoreTriple};
use assembler::Clock;
use normalizer::DegradedInput;
use session::SliceSource;

/// The record plus the advisory data produced alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub record: RunRecord,
    /// Features that fell back to their configured default.
    pub degraded_inputs: Vec<DegradedInput>,
    pub slice_source: SliceSource,
    /// Weighted sums before rescaling.
    pub raw_scores: ScoreTriple,
    /// The slice's neutral zone, echoed for renderers.
    pub neutral_zone: f64,
    /// Margin below the slice's neutral zone.
    pub low_conviction: bool,
}

impl RunOutcome {
    pub fn dominant(&self) -> Scenario {
        self.record.dominant_scenario()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_inputs.is_empty()
    }
}

/// Run one scoring invocation.
///
/// Fails only on session resolution (no usable slice); missing or malformed
/// raw values never abort the run.
pub fn evaluate(
    session_token: &str,
    config: &ScenarioConfig,
    raw: &RawObservation,
    clock: &dyn Clock,
) -> Result<RunOutcome, OutlookError> {
    let resolved = session::resolve(session_token, config)?;
    if resolved.source == SliceSource::DefaultForUnknown {
        warn!(
            session = %resolved.token,
            "Unrecognised session token, using default configuration slice"
        );
    }

    let normalized = normalizer::normalize(raw, resolved.slice);
    if !normalized.degraded.is_empty() {
        warn!(
            session = %resolved.token,
            degraded = ?normalized.degraded_names(),
            "Degraded inputs replaced with configured defaults"
        );
    }

    let scored = scorer::score(&normalized.features, resolved.slice);

    let record = assembler::assemble(
        &resolved.token,
        resolved.slice.version(),
        raw,
        normalized.features,
        scored.scores,
        scored.dominant,
        scored.margin,
        clock,
    );

    let neutral_zone = resolved.slice.neutral_zone();
    let low_conviction = scored.margin < neutral_zone;

    info!(
        run_id = %record.run_id(),
        dominant = %scored.dominant,
        margin = format!("{:.3}", scored.margin),
        scores = %scored.scores,
        degraded = normalized.degraded.len(),
        "Outlook evaluated"
    );

    Ok(RunOutcome {
        record,
        degraded_inputs: normalized.degraded,
        slice_source: resolved.source,
        raw_scores: scored.raw,
        neutral_zone,
        low_conviction,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
