//! Feature normalizer.
//!
//! Converts a raw observation into the bounded feature set the scorer
//! consumes. Total over any input: missing, non-numeric and non-finite
//! values are replaced by the feature's configured default and reported
//! back as degraded inputs rather than failing the run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{ConfigurationSlice, FeatureBounds};
use crate::types::{NormalizedFeatureSet, RawObservation, RawValue};

/// Why a feature fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// Not supplied at all.
    Missing,
    /// Supplied as an explicit "unavailable" marker.
    Unavailable,
    /// Supplied, but not a number.
    NonNumeric,
    /// NaN or infinite.
    NonFinite,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::Missing => write!(f, "missing"),
            DegradedReason::Unavailable => write!(f, "unavailable"),
            DegradedReason::NonNumeric => write!(f, "non-numeric"),
            DegradedReason::NonFinite => write!(f, "non-finite"),
        }
    }
}

/// A feature whose raw value was replaced by its configured default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedInput {
    pub feature: String,
    pub reason: DegradedReason,
    /// The substituted normalized value.
    pub substituted: f64,
}

impl fmt::Display for DegradedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, using {:+.2})", self.feature, self.reason, self.substituted)
    }
}

/// Normalized features plus the advisory list of degraded inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutcome {
    pub features: NormalizedFeatureSet,
    pub degraded: Vec<DegradedInput>,
}

impl NormalizationOutcome {
    pub fn degraded_names(&self) -> Vec<&str> {
        self.degraded.iter().map(|d| d.feature.as_str()).collect()
    }
}

/// Clamp `value` to `[min, max]` and map it linearly onto `[-1, 1]`.
pub fn rescale(value: f64, bounds: &FeatureBounds) -> f64 {
    let clamped = value.clamp(bounds.min, bounds.max);
    let unit = (clamped - bounds.min) / (bounds.max - bounds.min);
    (2.0 * unit - 1.0).clamp(-1.0, 1.0)
}

/// Normalize every feature referenced by the slice's weight tables.
///
/// Raw entries the slice does not reference are ignored (they stay in the
/// raw snapshot of the run record for auditing).
pub fn normalize(raw: &RawObservation, slice: &ConfigurationSlice) -> NormalizationOutcome {
    let mut features = BTreeMap::new();
    let mut degraded = Vec::new();

    for name in slice.referenced_features() {
        let Some(bounds) = slice.bounds(name) else {
            // Unreachable for a validated slice; stay neutral rather than fail.
            features.insert(name.to_string(), 0.0);
            degraded.push(DegradedInput {
                feature: name.to_string(),
                reason: DegradedReason::Missing,
                substituted: 0.0,
            });
            continue;
        };

        let failure = match raw.get(name) {
            None => Some(DegradedReason::Missing),
            Some(RawValue::Unavailable) => Some(DegradedReason::Unavailable),
            Some(RawValue::Text(_)) => Some(DegradedReason::NonNumeric),
            Some(RawValue::Number(v)) if !v.is_finite() => Some(DegradedReason::NonFinite),
            Some(RawValue::Number(v)) => {
                features.insert(name.to_string(), rescale(*v, bounds));
                None
            }
        };

        if let Some(reason) = failure {
            features.insert(name.to_string(), bounds.default);
            degraded.push(DegradedInput {
                feature: name.to_string(),
                reason,
                substituted: bounds.default,
            });
        }
    }

    NormalizationOutcome {
        features: NormalizedFeatureSet::from_map(features),
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightTable;
    use crate::engine::scorer::ScoreNormalization;

    fn slice() -> ConfigurationSlice {
        let mut features = BTreeMap::new();
        features.insert("momentum".to_string(), FeatureBounds::new(-5.0, 5.0, 0.0));
        features.insert("vix_spot".to_string(), FeatureBounds::new(10.0, 40.0, -0.25));
        features.insert("unused".to_string(), FeatureBounds::new(0.0, 1.0, 0.0));
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 1.0);
        weights.bear.insert("vix_spot".into(), 0.5);
        ConfigurationSlice::new("1.0.0", 0.1, ScoreNormalization::Shift, features, weights)
            .unwrap()
    }

    #[test]
    fn test_rescale_endpoints_and_midpoint() {
        let b = FeatureBounds::new(-5.0, 5.0, 0.0);
        assert_eq!(rescale(5.0, &b), 1.0);
        assert_eq!(rescale(-5.0, &b), -1.0);
        assert_eq!(rescale(0.0, &b), 0.0);
        let asym = FeatureBounds::new(10.0, 40.0, 0.0);
        assert!((rescale(25.0, &asym)).abs() < 1e-12);
        assert!((rescale(17.5, &asym) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rescale_clamps_out_of_range() {
        let b = FeatureBounds::new(-5.0, 5.0, 0.0);
        assert_eq!(rescale(50.0, &b), 1.0);
        assert_eq!(rescale(-1e9, &b), -1.0);
    }

    #[test]
    fn test_normalize_full_observation() {
        let raw = RawObservation::new().with("momentum", 5.0).with("vix_spot", 40.0);
        let out = normalize(&raw, &slice());
        assert!(out.degraded.is_empty());
        assert_eq!(out.features.get("momentum"), Some(1.0));
        assert_eq!(out.features.get("vix_spot"), Some(1.0));
        // Only referenced features are produced
        assert!(!out.features.contains("unused"));
        assert_eq!(out.features.len(), 2);
    }

    #[test]
    fn test_empty_observation_uses_defaults() {
        let out = normalize(&RawObservation::new(), &slice());
        assert_eq!(out.features.len(), 2);
        assert_eq!(out.features.get("momentum"), Some(0.0));
        assert_eq!(out.features.get("vix_spot"), Some(-0.25));
        assert_eq!(out.degraded_names(), vec!["momentum", "vix_spot"]);
        assert!(out.degraded.iter().all(|d| d.reason == DegradedReason::Missing));
    }

    #[test]
    fn test_malformed_values_degrade() {
        let raw = RawObservation::new()
            .with("momentum", RawValue::Text("n/a".into()))
            .with("vix_spot", f64::NAN);
        let out = normalize(&raw, &slice());
        assert_eq!(out.degraded.len(), 2);
        assert_eq!(out.degraded[0].reason, DegradedReason::NonNumeric);
        assert_eq!(out.degraded[1].reason, DegradedReason::NonFinite);
        assert_eq!(out.features.get("vix_spot"), Some(-0.25));
    }

    #[test]
    fn test_explicit_unavailable_marker() {
        let raw = RawObservation::new().with("momentum", RawValue::Unavailable).with("vix_spot", 25.0);
        let out = normalize(&raw, &slice());
        assert_eq!(out.degraded.len(), 1);
        assert_eq!(out.degraded[0].reason, DegradedReason::Unavailable);
        assert_eq!(format!("{}", out.degraded[0]), "momentum (unavailable, using +0.00)");
    }

    #[test]
    fn test_extra_raw_features_ignored() {
        let raw = RawObservation::new()
            .with("momentum", 1.0)
            .with("vix_spot", 20.0)
            .with("breadth", 0.7);
        let out = normalize(&raw, &slice());
        assert!(!out.features.contains("breadth"));
        assert!(out.degraded.is_empty());
    }
}
