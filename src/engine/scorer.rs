//! Scenario scorer.
//!
//! Weighted aggregation of normalized features into raw Bear / Neutral /
//! Bull scores, rescaled into a distribution that sums to 1, followed by
//! dominant-scenario selection.
//!
//! Tie-break: whenever the top score is shared by two or three scenarios,
//! Neutral is reported, including the Bear == Bull > Neutral case. The
//! margin is then the top score minus the Neutral score, which is zero
//! when Neutral is part of the tie.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigurationSlice;
use crate::types::{NormalizedFeatureSet, Scenario, ScoreTriple};

/// How raw scores become a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreNormalization {
    /// Shift so the minimum is zero, then divide by the sum.
    #[default]
    Shift,
    /// `exp(x - max)` divided by the sum of exponentials.
    Softmax,
}

/// Everything the scorer produces for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    /// Weighted sums before rescaling.
    pub raw: ScoreTriple,
    /// Non-negative, sums to 1.
    pub scores: ScoreTriple,
    pub dominant: Scenario,
    /// Dominant score minus runner-up; never negative.
    pub margin: f64,
}

/// Weighted sum per scenario. Features missing from the set count as 0.
pub fn raw_scores(features: &NormalizedFeatureSet, slice: &ConfigurationSlice) -> ScoreTriple {
    let side = |scenario: Scenario| -> f64 {
        slice
            .weights()
            .for_scenario(scenario)
            .iter()
            .map(|(name, weight)| weight * features.value(name))
            .sum()
    };
    ScoreTriple::new(side(Scenario::Bear), side(Scenario::Neutral), side(Scenario::Bull))
}

/// Rescale raw scores into a distribution.
pub fn normalize_scores(raw: ScoreTriple, mode: ScoreNormalization) -> ScoreTriple {
    match mode {
        ScoreNormalization::Shift => {
            let min = raw.bear.min(raw.neutral).min(raw.bull);
            let (b, n, u) = (raw.bear - min, raw.neutral - min, raw.bull - min);
            let sum = b + n + u;
            if sum > 0.0 && sum.is_finite() {
                ScoreTriple::new(b / sum, n / sum, u / sum)
            } else {
                // All three equal: no signal, maximum uncertainty
                ScoreTriple::uniform()
            }
        }
        ScoreNormalization::Softmax => {
            let max = raw.bear.max(raw.neutral).max(raw.bull);
            let (b, n, u) = (
                (raw.bear - max).exp(),
                (raw.neutral - max).exp(),
                (raw.bull - max).exp(),
            );
            let sum = b + n + u;
            if sum > 0.0 && sum.is_finite() {
                ScoreTriple::new(b / sum, n / sum, u / sum)
            } else {
                ScoreTriple::uniform()
            }
        }
    }
}

/// Pick the dominant scenario and its confidence margin.
pub fn select_dominant(scores: &ScoreTriple) -> (Scenario, f64) {
    let top = scores.bear.max(scores.neutral).max(scores.bull);
    let leaders: Vec<Scenario> = Scenario::ALL
        .iter()
        .copied()
        .filter(|s| scores.get(*s) == top)
        .collect();

    if let [only] = leaders.as_slice() {
        let runner_up = Scenario::ALL
            .iter()
            .filter(|s| *s != only)
            .map(|s| scores.get(*s))
            .fold(f64::NEG_INFINITY, f64::max);
        (*only, (top - runner_up).max(0.0))
    } else {
        (Scenario::Neutral, (top - scores.neutral).max(0.0))
    }
}

/// Score a normalized feature set against a slice.
pub fn score(features: &NormalizedFeatureSet, slice: &ConfigurationSlice) -> ScoreOutcome {
    let raw = raw_scores(features, slice);
    let scores = normalize_scores(raw, slice.normalization());
    let (dominant, margin) = select_dominant(&scores);

    debug!(
        raw_bear = raw.bear,
        raw_neutral = raw.neutral,
        raw_bull = raw.bull,
        dominant = %dominant,
        margin = format!("{margin:.4}"),
        "Scenario scores computed"
    );

    ScoreOutcome {
        raw,
        scores,
        dominant,
        margin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureBounds, WeightTable};
    use std::collections::BTreeMap;

    const EPS: f64 = 1e-9;

    fn momentum_slice(mode: ScoreNormalization) -> ConfigurationSlice {
        let mut features = BTreeMap::new();
        features.insert("momentum".to_string(), FeatureBounds::new(-5.0, 5.0, 0.0));
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 1.0);
        weights.bear.insert("momentum".into(), -1.0);
        weights.neutral.insert("momentum".into(), 0.0);
        ConfigurationSlice::new("1.0.0", 0.1, mode, features, weights).unwrap()
    }

    fn features(pairs: &[(&str, f64)]) -> NormalizedFeatureSet {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn assert_distribution(t: &ScoreTriple) {
        assert!(t.bear >= 0.0 && t.neutral >= 0.0 && t.bull >= 0.0, "negative component: {t}");
        assert!((t.sum() - 1.0).abs() < EPS, "sum {} != 1", t.sum());
    }

    #[test]
    fn test_bullish_momentum_example() {
        let slice = momentum_slice(ScoreNormalization::Shift);
        let out = score(&features(&[("momentum", 1.0)]), &slice);
        assert_eq!(out.raw, ScoreTriple::new(-1.0, 0.0, 1.0));
        assert!((out.scores.bull - 2.0 / 3.0).abs() < EPS);
        assert!((out.scores.neutral - 1.0 / 3.0).abs() < EPS);
        assert!(out.scores.bear.abs() < EPS);
        assert_eq!(out.dominant, Scenario::Bull);
        assert!((out.margin - 1.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_all_neutral_features_give_neutral() {
        let slice = momentum_slice(ScoreNormalization::Shift);
        let out = score(&features(&[("momentum", 0.0)]), &slice);
        assert_eq!(out.scores, ScoreTriple::uniform());
        assert_eq!(out.dominant, Scenario::Neutral);
        assert_eq!(out.margin, 0.0);
    }

    #[test]
    fn test_directional_tie_prefers_neutral() {
        let scores = ScoreTriple::new(0.4, 0.2, 0.4);
        let (dominant, margin) = select_dominant(&scores);
        assert_eq!(dominant, Scenario::Neutral);
        assert!((margin - 0.2).abs() < EPS);
    }

    #[test]
    fn test_neutral_in_tie_has_zero_margin() {
        let (d, m) = select_dominant(&ScoreTriple::new(0.1, 0.45, 0.45));
        assert_eq!(d, Scenario::Neutral);
        assert_eq!(m, 0.0);
        let (d, m) = select_dominant(&ScoreTriple::new(0.45, 0.45, 0.1));
        assert_eq!(d, Scenario::Neutral);
        assert_eq!(m, 0.0);
    }

    #[test]
    fn test_bear_bull_tie_from_weights() {
        // Bear and Bull both load positively on the same feature: equal raw scores.
        let mut feats = BTreeMap::new();
        feats.insert("vol".to_string(), FeatureBounds::new(0.0, 1.0, 0.0));
        let mut weights = WeightTable::default();
        weights.bear.insert("vol".into(), 1.0);
        weights.bull.insert("vol".into(), 1.0);
        weights.neutral.insert("vol".into(), -1.0);
        let slice =
            ConfigurationSlice::new("v", 0.1, ScoreNormalization::Shift, feats, weights).unwrap();
        let out = score(&features(&[("vol", 0.5)]), &slice);
        assert_eq!(out.scores.bear, out.scores.bull);
        assert_eq!(out.dominant, Scenario::Neutral);
        assert!((out.margin - (out.scores.bear - out.scores.neutral)).abs() < EPS);
        assert!((out.margin - 0.5).abs() < EPS);
    }

    #[test]
    fn test_unique_leader_margin_is_gap_to_second() {
        let (d, m) = select_dominant(&ScoreTriple::new(0.5, 0.3, 0.2));
        assert_eq!(d, Scenario::Bear);
        assert!((m - 0.2).abs() < EPS);
    }

    #[test]
    fn test_distribution_invariant_over_grid() {
        for mode in [ScoreNormalization::Shift, ScoreNormalization::Softmax] {
            let slice = momentum_slice(mode);
            for i in -10..=10 {
                let v = i as f64 / 10.0;
                let out = score(&features(&[("momentum", v)]), &slice);
                assert_distribution(&out.scores);
                assert!(out.margin >= 0.0);
            }
        }
    }

    #[test]
    fn test_softmax_orders_like_shift() {
        let slice = momentum_slice(ScoreNormalization::Softmax);
        let out = score(&features(&[("momentum", -0.8)]), &slice);
        assert_eq!(out.dominant, Scenario::Bear);
        assert!(out.scores.bear > out.scores.neutral);
        assert!(out.scores.neutral > out.scores.bull);
        assert_distribution(&out.scores);
    }

    #[test]
    fn test_softmax_equal_raw_is_uniform() {
        let t = normalize_scores(ScoreTriple::new(2.0, 2.0, 2.0), ScoreNormalization::Softmax);
        assert!((t.bear - 1.0 / 3.0).abs() < EPS);
        let (d, m) = select_dominant(&t);
        assert_eq!(d, Scenario::Neutral);
        assert_eq!(m, 0.0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let slice = momentum_slice(ScoreNormalization::Shift);
        let f = features(&[("momentum", 0.37)]);
        assert_eq!(score(&f, &slice), score(&f, &slice));
    }
}
