//! Key price levels for the playbook.
//!
//! Nearest and second support below price, nearest and second resistance
//! above it, plus the pivot, gamma flip and max-pain target. Missing levels
//! fall back to `[thresholds]`; every fallback used is listed in
//! [`KeyLevels::fallbacks`].

use serde::Serialize;

use crate::config::ThresholdsConfig;
use crate::data::MarketSnapshot;

/// Width of the synthetic max-pain zone used when none was fetched.
const FALLBACK_MAX_PAIN_WIDTH: f64 = 130.0;
/// Offset of the synthetic max-pain zone below the fallback support.
const FALLBACK_MAX_PAIN_OFFSET: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyLevels {
    pub last: Option<f64>,
    pub weekly_pivot: Option<f64>,
    pub gamma_flip: Option<f64>,
    pub support_1: Option<f64>,
    pub support_2: Option<f64>,
    pub resistance_1: Option<f64>,
    pub resistance_2: Option<f64>,
    pub max_pain_zone: Option<[f64; 2]>,
    /// Upper bound of the max-pain zone.
    pub max_pain_target: Option<f64>,
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
    /// Price within `near_level_points` of `support_1`.
    pub near_support: bool,
    pub near_resistance: bool,
    /// Names of levels that came from `[thresholds]` instead of data.
    pub fallbacks: Vec<String>,
}

/// Closest level at or below `last`.
pub fn nearest_below(last: f64, levels: &[f64]) -> Option<f64> {
    levels
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l <= last)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.max(l))))
}

/// Second-closest distinct level at or below `last`.
pub fn second_below(last: f64, levels: &[f64]) -> Option<f64> {
    let first = nearest_below(last, levels)?;
    levels
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l < first)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.max(l))))
}

/// Closest level at or above `last`.
pub fn nearest_above(last: f64, levels: &[f64]) -> Option<f64> {
    levels
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l >= last)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.min(l))))
}

pub fn second_above(last: f64, levels: &[f64]) -> Option<f64> {
    let first = nearest_above(last, levels)?;
    levels
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l > first)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.min(l))))
}

pub fn select(snapshot: &MarketSnapshot, thresholds: &ThresholdsConfig) -> KeyLevels {
    let mut fallbacks = Vec::new();
    let tech = &snapshot.technicals;
    let last = snapshot.price.last.filter(|v| v.is_finite());

    let (mut support_1, support_2, mut resistance_1, resistance_2) = match last {
        Some(p) => (
            nearest_below(p, &tech.supports),
            second_below(p, &tech.supports),
            nearest_above(p, &tech.resistances),
            second_above(p, &tech.resistances),
        ),
        None => (None, None, None, None),
    };
    if support_1.is_none() {
        support_1 = Some(thresholds.fallback_support);
        fallbacks.push("support_1".to_string());
    }
    if resistance_1.is_none() {
        resistance_1 = Some(thresholds.fallback_resistance);
        fallbacks.push("resistance_1".to_string());
    }

    let weekly_pivot = tech.weekly_pivot.or_else(|| {
        fallbacks.push("weekly_pivot".to_string());
        Some(thresholds.fallback_resistance)
    });

    let gamma_flip = snapshot.options.gamma_flip.or_else(|| {
        fallbacks.push("gamma_flip".to_string());
        Some(thresholds.gamma_flip_default)
    });

    let max_pain_zone = snapshot.options.max_pain_zone.or_else(|| {
        fallbacks.push("max_pain_zone".to_string());
        let high = thresholds.fallback_support - FALLBACK_MAX_PAIN_OFFSET;
        Some([high - FALLBACK_MAX_PAIN_WIDTH, high])
    });

    let near = thresholds.near_level_points;
    let near_support = matches!((last, support_1), (Some(p), Some(s)) if p - s <= near);
    let near_resistance = matches!((last, resistance_1), (Some(p), Some(r)) if r - p <= near);

    KeyLevels {
        last,
        weekly_pivot,
        gamma_flip,
        support_1,
        support_2,
        resistance_1,
        resistance_2,
        max_pain_target: max_pain_zone.map(|[_, high]| high),
        max_pain_zone,
        call_wall: snapshot.options.call_wall,
        put_wall: snapshot.options.put_wall,
        near_support,
        near_resistance,
        fallbacks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(last: f64, supports: &[f64], resistances: &[f64]) -> MarketSnapshot {
        let mut snap = MarketSnapshot::default();
        snap.price.last = Some(last);
        snap.technicals.supports = supports.to_vec();
        snap.technicals.resistances = resistances.to_vec();
        snap.technicals.weekly_pivot = Some(6860.0);
        snap.options.gamma_flip = Some(6850.0);
        snap.options.max_pain_zone = Some([6620.0, 6750.0]);
        snap
    }

    #[test]
    fn test_nearest_and_second() {
        let supports = [6700.0, 6800.0, 6750.0, 6900.0];
        assert_eq!(nearest_below(6830.0, &supports), Some(6800.0));
        assert_eq!(second_below(6830.0, &supports), Some(6750.0));
        assert_eq!(nearest_above(6830.0, &supports), Some(6900.0));
        assert_eq!(second_above(6830.0, &supports), None);
        assert_eq!(nearest_below(6600.0, &supports), None);
    }

    #[test]
    fn test_level_touched_exactly_counts() {
        let levels = [6800.0, 6750.0, 6800.0, 6850.0];
        assert_eq!(nearest_below(6800.0, &levels), Some(6800.0));
        assert_eq!(second_below(6800.0, &levels), Some(6750.0));
        assert_eq!(nearest_above(6800.0, &levels), Some(6800.0));
        assert_eq!(second_above(6800.0, &levels), Some(6850.0));

        let snap = snapshot(6800.0, &[6800.0, 6750.0], &[6800.0, 6850.0]);
        let levels = select(&snap, &ThresholdsConfig::default());
        assert_eq!(levels.support_1, Some(6800.0));
        assert_eq!(levels.resistance_1, Some(6800.0));
        assert!(levels.near_support);
        assert!(levels.near_resistance);
    }

    #[test]
    fn test_select_from_data() {
        let snap = snapshot(6830.0, &[6800.0, 6760.0], &[6880.0, 6920.0]);
        let levels = select(&snap, &ThresholdsConfig::default());
        assert_eq!(levels.support_1, Some(6800.0));
        assert_eq!(levels.support_2, Some(6760.0));
        assert_eq!(levels.resistance_1, Some(6880.0));
        assert_eq!(levels.resistance_2, Some(6920.0));
        assert_eq!(levels.max_pain_target, Some(6750.0));
        assert!(!levels.near_support);
        assert!(levels.fallbacks.is_empty());
    }

    #[test]
    fn test_select_uses_threshold_fallbacks() {
        let levels = select(&MarketSnapshot::default(), &ThresholdsConfig::default());
        assert_eq!(levels.support_1, Some(6800.0));
        assert_eq!(levels.resistance_1, Some(6888.0));
        assert_eq!(levels.weekly_pivot, Some(6888.0));
        assert_eq!(levels.gamma_flip, Some(6850.0));
        assert_eq!(levels.max_pain_zone, Some([6620.0, 6750.0]));
        assert_eq!(levels.support_2, None);
        assert_eq!(
            levels.fallbacks,
            vec!["support_1", "resistance_1", "weekly_pivot", "gamma_flip", "max_pain_zone"]
        );
    }

    #[test]
    fn test_near_level_flags() {
        let snap = snapshot(6810.0, &[6800.0], &[6900.0]);
        let levels = select(&snap, &ThresholdsConfig::default());
        assert!(levels.near_support);
        assert!(!levels.near_resistance);
    }
}
