//! Feature derivation: turns a fetched [`MarketSnapshot`] into the raw
//! observation the engine scores, plus the context the reports show.
//!
//! Features are computed only from fetched data. When an input is missing
//! the feature is recorded as unavailable and the normalizer substitutes
//! the configured default; the `[thresholds]` fallbacks only feed the key
//! levels used by the playbook.

pub mod levels;
pub mod macro_context;
pub mod structure;

use serde::Serialize;

use crate::config::ThresholdsConfig;
use crate::data::MarketSnapshot;
use crate::types::{RawObservation, RawValue};
use levels::KeyLevels;
use macro_context::MacroContext;
use structure::{GammaRegime, StructureContext, VixTerm};

// ---------------------------------------------------------------------------
// Feature names
// ---------------------------------------------------------------------------

/// Percent change of last vs previous close.
pub const PCT_CHANGE: &str = "pct_change";
/// Points above (+) or below (-) the weekly pivot.
pub const PIVOT_DISTANCE: &str = "pivot_distance";
/// Points above (+) or below (-) the gamma flip.
pub const GAMMA_FLIP_DISTANCE: &str = "gamma_flip_distance";
/// Points above (+) or below (-) the midpoint of the max-pain zone.
pub const MAX_PAIN_GRAVITY: &str = "max_pain_gravity";
/// Points down to the nearest support.
pub const SUPPORT_DISTANCE: &str = "support_distance";
/// Points up to the nearest resistance.
pub const RESISTANCE_DISTANCE: &str = "resistance_distance";
pub const RSI14: &str = "rsi14";
pub const MACD_HIST: &str = "macd_hist";
pub const VIX_SPOT: &str = "vix_spot";
/// +1 contango, 0 flattening, -1 backwardation.
pub const VIX_TERM: &str = "vix_term";
/// +1 positive, 0 transition, -1 negative dealer gamma.
pub const GAMMA_REGIME: &str = "gamma_regime";
/// Rate-pressure score, 0-100.
pub const RATE_PRESSURE: &str = "rate_pressure";
/// 0 low, 1 medium, 2 high.
pub const EVENT_RISK: &str = "event_risk";

pub const ALL_FEATURES: &[&str] = &[
    PCT_CHANGE,
    PIVOT_DISTANCE,
    GAMMA_FLIP_DISTANCE,
    MAX_PAIN_GRAVITY,
    SUPPORT_DISTANCE,
    RESISTANCE_DISTANCE,
    RSI14,
    MACD_HIST,
    VIX_SPOT,
    VIX_TERM,
    GAMMA_REGIME,
    RATE_PRESSURE,
    EVENT_RISK,
];

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Everything derived from one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MarketAnalysis {
    pub macro_context: MacroContext,
    pub structure: StructureContext,
    pub key_levels: KeyLevels,
    #[serde(skip)]
    pub observation: RawObservation,
}

pub fn analyze(snapshot: &MarketSnapshot, thresholds: &ThresholdsConfig) -> MarketAnalysis {
    let macro_context = macro_context::analyze(snapshot);
    let structure = structure::analyze(snapshot);
    let key_levels = levels::select(snapshot, thresholds);
    let observation = derive_observation(snapshot, &macro_context);

    MarketAnalysis {
        macro_context,
        structure,
        key_levels,
        observation,
    }
}

fn distance(last: Option<f64>, level: Option<f64>) -> RawValue {
    match (last, level) {
        (Some(p), Some(l)) => RawValue::Number(p - l),
        _ => RawValue::Unavailable,
    }
}

/// Free text mapped through `parse`; unparseable text is kept as text so
/// the normalizer reports it as non-numeric.
fn signal<T>(text: Option<&str>, parse: fn(&str) -> Option<T>, value: fn(&T) -> f64) -> RawValue {
    match text {
        None => RawValue::Unavailable,
        Some(t) => match parse(t) {
            Some(state) => RawValue::Number(value(&state)),
            None => RawValue::Text(t.to_string()),
        },
    }
}

/// Build the raw observation. Every name in [`ALL_FEATURES`] is present.
pub fn derive_observation(snapshot: &MarketSnapshot, macro_ctx: &MacroContext) -> RawObservation {
    let last = snapshot.price.last;
    let tech = &snapshot.technicals;
    let opts = &snapshot.options;

    let pct_change = match (last, snapshot.price.prev_close) {
        (Some(p), Some(prev)) if prev != 0.0 => RawValue::Number((p - prev) / prev * 100.0),
        _ => RawValue::Unavailable,
    };

    let mp_mid = opts.max_pain_zone.map(|[lo, hi]| (lo + hi) / 2.0);

    let support_distance = match last {
        Some(p) => distance(Some(p), levels::nearest_below(p, &tech.supports)),
        None => RawValue::Unavailable,
    };
    let resistance_distance = match last.and_then(|p| levels::nearest_above(p, &tech.resistances))
    {
        Some(r) => distance(Some(r), last),
        None => RawValue::Unavailable,
    };

    RawObservation::new()
        .with(PCT_CHANGE, pct_change)
        .with(PIVOT_DISTANCE, distance(last, tech.weekly_pivot))
        .with(GAMMA_FLIP_DISTANCE, distance(last, opts.gamma_flip))
        .with(MAX_PAIN_GRAVITY, distance(last, mp_mid))
        .with(SUPPORT_DISTANCE, support_distance)
        .with(RESISTANCE_DISTANCE, resistance_distance)
        .with(RSI14, tech.rsi14)
        .with(MACD_HIST, tech.macd_hist)
        .with(VIX_SPOT, snapshot.vix.spot)
        .with(
            VIX_TERM,
            signal(snapshot.vix.term.as_deref(), VixTerm::parse, VixTerm::signal),
        )
        .with(
            GAMMA_REGIME,
            signal(opts.regime.as_deref(), GammaRegime::parse, GammaRegime::signal),
        )
        .with(RATE_PRESSURE, macro_ctx.rate_pressure)
        .with(EVENT_RISK, macro_ctx.event_risk.level())
}
