//! Rule-based playbook: trigger, targets and invalidation per scenario.

use serde::Serialize;

use crate::analysis::levels::KeyLevels;
use crate::config::PlaybookConfig;
use crate::types::{Scenario, ScoreTriple};

/// Bear target below support when no lower level is known.
const BEAR_FALLBACK_DROP: f64 = 50.0;
/// Half-width of the neutral range when no levels are known.
const NEUTRAL_FALLBACK_BAND: f64 = 40.0;
/// Bull confirmation above the pivot when no resistance is known.
const BULL_CONFIRM_OFFSET: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioPlay {
    pub scenario: Scenario,
    pub name: String,
    pub probability: f64,
    pub trigger: String,
    pub targets: Vec<f64>,
    pub invalidation: String,
}

/// One play per scenario in Bear, Neutral, Bull order.
pub fn build(levels: &KeyLevels, scores: &ScoreTriple, cfg: &PlaybookConfig) -> Vec<ScenarioPlay> {
    vec![
        bear(levels, scores.bear, cfg),
        neutral(levels, scores.neutral, cfg),
        bull(levels, scores.bull, cfg),
    ]
}

fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

fn bear(levels: &KeyLevels, probability: f64, cfg: &PlaybookConfig) -> ScenarioPlay {
    let hold = cfg.hold_minutes;
    let s1 = levels.support_1;

    let trigger_level = match (s1, levels.gamma_flip) {
        (Some(s), Some(flip)) => Some(s.min(flip)),
        (s, _) => s,
    };

    let mut targets: Vec<f64> = [levels.support_2, levels.max_pain_target]
        .into_iter()
        .flatten()
        .collect();
    if targets.is_empty() {
        targets.extend(s1.map(|s| s - BEAR_FALLBACK_DROP));
    }

    let invalidation = if cfg.use_close_confirmation {
        let level = match (levels.weekly_pivot, levels.resistance_1) {
            (Some(p), Some(r)) => Some(p.max(r)),
            (Some(p), None) => Some(p),
            (None, r) => r,
        };
        match level {
            Some(l) => format!("Daily close > {l:.0}"),
            None => "Daily close above key resistance".to_string(),
        }
    } else {
        match levels.resistance_1 {
            Some(r) => format!("Reclaim > {r:.0}"),
            None => "Reclaim key resistance".to_string(),
        }
    };

    ScenarioPlay {
        scenario: Scenario::Bear,
        name: "Bearish pull-to-support/maxpain".to_string(),
        probability: round4(probability),
        trigger: match trigger_level {
            Some(l) => format!("Break < {l:.0} and hold {hold}m"),
            None => format!("Break below support and hold {hold}m"),
        },
        targets: targets.into_iter().map(f64::round).collect(),
        invalidation,
    }
}

fn neutral(levels: &KeyLevels, probability: f64, cfg: &PlaybookConfig) -> ScenarioPlay {
    let low = levels
        .support_1
        .or(levels.max_pain_target)
        .or(levels.last.map(|p| p - NEUTRAL_FALLBACK_BAND));
    let high = levels
        .weekly_pivot
        .or(levels.resistance_1)
        .or(levels.last.map(|p| p + NEUTRAL_FALLBACK_BAND));

    let (trigger, targets) = match (low, high) {
        (Some(lo), Some(hi)) => (
            format!(
                "Hold above {lo:.0} and fail to sustain > {hi:.0} for {}m",
                cfg.hold_minutes
            ),
            vec![lo.round(), hi.round()],
        ),
        _ => (format!("Range holds for {}m", cfg.hold_minutes), Vec::new()),
    };

    ScenarioPlay {
        scenario: Scenario::Neutral,
        name: "Neutral range / consolidation".to_string(),
        probability: round4(probability),
        trigger,
        targets,
        invalidation: "Range expansion with momentum/volume (breakout or breakdown)".to_string(),
    }
}

fn bull(levels: &KeyLevels, probability: f64, cfg: &PlaybookConfig) -> ScenarioPlay {
    let hold = cfg.hold_minutes;
    let pivot = levels.weekly_pivot;
    let reclaim = pivot.or(levels.gamma_flip);

    let confirm = match (levels.resistance_1, pivot) {
        (Some(r), Some(p)) => Some(r.max(p)),
        (Some(r), None) => Some(r),
        (None, Some(p)) => Some(p + BULL_CONFIRM_OFFSET),
        (None, None) => None,
    };

    let targets = match (levels.resistance_2, levels.last) {
        (Some(r2), _) => vec![r2.round()],
        (None, Some(p)) => vec![(p + 50.0).round(), (p + 100.0).round()],
        (None, None) => Vec::new(),
    };

    let invalidation = match reclaim {
        Some(r) if cfg.use_close_confirmation => format!("Daily close < {r:.0}"),
        Some(r) => format!("Reject < {r:.0} after reclaim"),
        None => "Reversal back into range".to_string(),
    };

    ScenarioPlay {
        scenario: Scenario::Bull,
        name: "Bullish reversal / breakout".to_string(),
        probability: round4(probability),
        trigger: match (reclaim, confirm) {
            (Some(r), Some(c)) => format!("Reclaim > {r:.0} and sustain > {c:.0} for {hold}m"),
            _ => format!("Reclaim key level and hold {hold}m"),
        },
        targets,
        invalidation,
    }
}
