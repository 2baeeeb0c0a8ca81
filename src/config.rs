//! Configuration loading from TOML with validation.
//!
//! Reads `config.toml`, fills in defaults for anything omitted, merges the
//! per-session overrides on top of the `[default]` slice and validates the
//! result into a [`ScenarioConfig`]. Every problem is collected before
//! failing so one run of `outlook validate-config` reports all of them.
//!
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::engine::scorer::ScoreNormalization;
use crate::types::{canonical_token, OutlookError, Scenario, Session};

/// Neutral zone applied when a slice does not declare one.
pub const DEFAULT_NEUTRAL_ZONE: f64 = 0.10;

/// Largest absolute weight accepted before the table is considered suspicious.
pub const MAX_ABS_WEIGHT: f64 = 5.0;

// ---------------------------------------------------------------------------
// File schema
// ---------------------------------------------------------------------------

/// Top-level application configuration, as written in `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub playbook: PlaybookConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Global fallback slice.
    #[serde(default)]
    pub default: Option<SliceSpec>,
    /// Per-session overrides, keyed by session label.
    #[serde(default)]
    pub sessions: BTreeMap<String, SliceSpec>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_timezone() -> String {
    "Asia/Singapore".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SymbolsConfig {
    pub spx: String,
    pub proxy: String,
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            spx: "SPX".to_string(),
            proxy: "ES".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// How raw scenario scores are rescaled into a distribution.
    #[serde(default)]
    pub normalization: ScoreNormalization,
}

/// Price levels used when the fetched data does not provide them.
#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdsConfig {
    pub gamma_flip_default: f64,
    pub fallback_support: f64,
    pub fallback_resistance: f64,
    /// Distance (index points) under which price counts as "at" a level.
    pub near_level_points: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            gamma_flip_default: 6850.0,
            fallback_support: 6800.0,
            fallback_resistance: 6888.0,
            near_level_points: 25.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaybookConfig {
    pub hold_minutes: u32,
    pub use_close_confirmation: bool,
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            hold_minutes: 30,
            use_close_confirmation: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Env var holding the FRED API key. Rates overlay is skipped when unset.
    pub fred_api_key_env: Option<String>,
    /// Directory artifacts are written to.
    pub output_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            fred_api_key_env: Some("FRED_API_KEY".to_string()),
            output_dir: "outputs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8088 }
    }
}

/// A (possibly partial) slice as written in the file.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SliceSpec {
    pub neutral_zone: Option<f64>,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureBounds>,
    #[serde(default)]
    pub weights: WeightTable,
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Clamp bounds for one feature plus the neutral substitute used when its
/// raw value is missing. `default` lives in normalized space (`[-1, 1]`).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub default: f64,
}

impl FeatureBounds {
    pub fn new(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }
}

/// Scenario → feature → signed weight.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct WeightTable {
    #[serde(default)]
    pub bear: BTreeMap<String, f64>,
    #[serde(default)]
    pub neutral: BTreeMap<String, f64>,
    #[serde(default)]
    pub bull: BTreeMap<String, f64>,
}

impl WeightTable {
    pub fn for_scenario(&self, scenario: Scenario) -> &BTreeMap<String, f64> {
        match scenario {
            Scenario::Bear => &self.bear,
            Scenario::Neutral => &self.neutral,
            Scenario::Bull => &self.bull,
        }
    }

    fn for_scenario_mut(&mut self, scenario: Scenario) -> &mut BTreeMap<String, f64> {
        match scenario {
            Scenario::Bear => &mut self.bear,
            Scenario::Neutral => &mut self.neutral,
            Scenario::Bull => &mut self.bull,
        }
    }

    /// Every feature named by any scenario.
    pub fn referenced_features(&self) -> BTreeSet<&str> {
        Scenario::ALL
            .iter()
            .flat_map(|s| self.for_scenario(*s).keys())
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        Scenario::ALL.iter().all(|s| self.for_scenario(*s).is_empty())
    }

    /// Overlay `other` on top of `self`, key by key.
    fn merged_with(&self, other: &WeightTable) -> WeightTable {
        let mut out = self.clone();
        for scenario in Scenario::ALL {
            out.for_scenario_mut(*scenario)
                .extend(other.for_scenario(*scenario).iter().map(|(k, v)| (k.clone(), *v)));
        }
        out
    }
}

/// The resolved weight/bounds data used for one run.
///
/// Constructed only through [`ConfigurationSlice::new`], which guarantees
/// that every weighted feature has bounds and that all numbers are sane.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSlice {
    version: String,
    neutral_zone: f64,
    normalization: ScoreNormalization,
    features: BTreeMap<String, FeatureBounds>,
    weights: WeightTable,
}

impl ConfigurationSlice {
    pub fn new(
        version: impl Into<String>,
        neutral_zone: f64,
        normalization: ScoreNormalization,
        features: BTreeMap<String, FeatureBounds>,
        weights: WeightTable,
    ) -> Result<Self, OutlookError> {
        let slice = Self {
            version: version.into(),
            neutral_zone,
            normalization,
            features,
            weights,
        };
        let problems = slice.problems();
        if problems.is_empty() {
            Ok(slice)
        } else {
            Err(OutlookError::ConfigurationDefect(problems.join("; ")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.neutral_zone) {
            errors.push(format!("neutral_zone {} outside [0, 1]", self.neutral_zone));
        }

        for (name, b) in &self.features {
            if !b.min.is_finite() || !b.max.is_finite() || !b.default.is_finite() {
                errors.push(format!("feature '{name}' has non-finite bounds"));
                continue;
            }
            if b.min >= b.max {
                errors.push(format!("feature '{name}': min {} must be < max {}", b.min, b.max));
            }
            if !(-1.0..=1.0).contains(&b.default) {
                errors.push(format!("feature '{name}': default {} outside [-1, 1]", b.default));
            }
        }

        if self.weights.is_empty() {
            errors.push("weight table is empty".to_string());
        }

        for scenario in Scenario::ALL {
            for (feature, w) in self.weights.for_scenario(*scenario) {
                if !self.features.contains_key(feature) {
                    errors.push(format!(
                        "weights.{} references feature '{feature}' with no bounds",
                        scenario.to_string().to_lowercase()
                    ));
                }
                if !w.is_finite() {
                    errors.push(format!(
                        "weights.{}.{feature} is not finite",
                        scenario.to_string().to_lowercase()
                    ));
                } else if w.abs() > MAX_ABS_WEIGHT {
                    errors.push(format!(
                        "suspicious weight weights.{}.{feature}: |{w}| > {MAX_ABS_WEIGHT}",
                        scenario.to_string().to_lowercase()
                    ));
                }
            }
        }

        errors
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn neutral_zone(&self) -> f64 {
        self.neutral_zone
    }

    pub fn normalization(&self) -> ScoreNormalization {
        self.normalization
    }

    pub fn features(&self) -> &BTreeMap<String, FeatureBounds> {
        &self.features
    }

    pub fn bounds(&self, feature: &str) -> Option<&FeatureBounds> {
        self.features.get(feature)
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn referenced_features(&self) -> BTreeSet<&str> {
        self.weights.referenced_features()
    }
}

/// Validated scenario configuration: an optional default slice plus
/// per-session slices keyed by canonical (upper-case) token.
#[derive(Debug, Clone, Default)]
pub struct ScenarioConfig {
    default: Option<ConfigurationSlice>,
    sessions: BTreeMap<String, ConfigurationSlice>,
}

impl ScenarioConfig {
    pub fn new(
        default: Option<ConfigurationSlice>,
        sessions: BTreeMap<String, ConfigurationSlice>,
    ) -> Self {
        let sessions = sessions
            .into_iter()
            .map(|(k, v)| (canonical_token(&k), v))
            .collect();
        Self { default, sessions }
    }

    pub fn default_slice(&self) -> Option<&ConfigurationSlice> {
        self.default.as_ref()
    }

    /// The override for a canonical token, if one is configured.
    pub fn session_slice(&self, canonical: &str) -> Option<&ConfigurationSlice> {
        self.sessions.get(canonical)
    }

    pub fn session_tokens(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, ScenarioConfig)> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        let scenarios = config
            .validate()
            .with_context(|| format!("Config validation failed ({})", path.display()))?;
        Ok((config, scenarios))
    }

    /// Parse without validating.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Range-check everything and build the validated scenario slices.
    pub fn validate(&self) -> Result<ScenarioConfig, OutlookError> {
        let mut errors: Vec<String> = Vec::new();

        if self.version.trim().is_empty() {
            errors.push("version must not be empty".to_string());
        }

        let hm = self.playbook.hold_minutes;
        if !(1..=240).contains(&hm) {
            errors.push(format!("playbook.hold_minutes {hm} outside [1, 240]"));
        }
        if hm > 120 && !self.playbook.use_close_confirmation {
            errors.push(
                "playbook.hold_minutes > 120 requires use_close_confirmation = true".to_string(),
            );
        }

        let t = &self.thresholds;
        for (name, v) in [
            ("gamma_flip_default", t.gamma_flip_default),
            ("fallback_support", t.fallback_support),
            ("fallback_resistance", t.fallback_resistance),
        ] {
            if !(1000.0..=20000.0).contains(&v) {
                errors.push(format!("thresholds.{name} {v} outside [1000, 20000]"));
            }
        }
        if t.fallback_support >= t.fallback_resistance {
            errors.push("thresholds.fallback_support must be < fallback_resistance".to_string());
        }
        if !(1.0..=500.0).contains(&t.near_level_points) {
            errors.push(format!(
                "thresholds.near_level_points {} outside [1, 500]",
                t.near_level_points
            ));
        }

        let default = match &self.default {
            Some(spec) => match self.build_slice(spec) {
                Ok(slice) => Some(slice),
                Err(e) => {
                    errors.push(format!("[default] {e}"));
                    None
                }
            },
            None => None,
        };

        let mut sessions = BTreeMap::new();
        for (token, spec) in &self.sessions {
            if token.parse::<Session>().is_err() {
                warn!(session = %token, "Override for unrecognised session label");
            }
            let merged = match &self.default {
                Some(base) => merge_spec(base, spec),
                None => spec.clone(),
            };
            match self.build_slice(&merged) {
                Ok(slice) => {
                    sessions.insert(canonical_token(token), slice);
                }
                Err(e) => errors.push(format!("[sessions.{token}] {e}")),
            }
        }

        if self.default.is_none() && self.sessions.is_empty() {
            errors.push("no [default] slice and no [sessions.*] overrides".to_string());
        }

        if errors.is_empty() {
            Ok(ScenarioConfig::new(default, sessions))
        } else {
            let msg = std::iter::once("Config validation failed:".to_string())
                .chain(errors.iter().map(|e| format!("- {e}")))
                .collect::<Vec<_>>()
                .join("\n");
            Err(OutlookError::ConfigurationDefect(msg))
        }
    }

    fn build_slice(&self, spec: &SliceSpec) -> Result<ConfigurationSlice, OutlookError> {
        ConfigurationSlice::new(
            self.version.clone(),
            spec.neutral_zone.unwrap_or(DEFAULT_NEUTRAL_ZONE),
            self.engine.normalization,
            spec.features.clone(),
            spec.weights.clone(),
        )
    }
}

/// Overlay a session override on the default slice spec.
fn merge_spec(base: &SliceSpec, over: &SliceSpec) -> SliceSpec {
    let mut features = base.features.clone();
    features.extend(over.features.iter().map(|(k, v)| (k.clone(), *v)));
    SliceSpec {
        neutral_zone: over.neutral_zone.or(base.neutral_zone),
        features,
        weights: base.weights.merged_with(&over.weights),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = "2.1.0"

[default]
neutral_zone = 0.1

[default.features.momentum]
min = -5.0
max = 5.0

[default.features.vix_spot]
min = 10.0
max = 40.0
default = 0.0

[default.weights.bull]
momentum = 1.0
vix_spot = -0.5

[default.weights.bear]
momentum = -1.0
vix_spot = 0.5

[default.weights.neutral]
momentum = 0.0

[sessions.sun_weekly]
neutral_zone = 0.2

[sessions.sun_weekly.weights.neutral]
vix_spot = -0.25
"#;

    fn slice_with(weights: WeightTable) -> Result<ConfigurationSlice, OutlookError> {
        let mut features = BTreeMap::new();
        features.insert("momentum".to_string(), FeatureBounds::new(-5.0, 5.0, 0.0));
        ConfigurationSlice::new("1.0.0", 0.1, ScoreNormalization::Shift, features, weights)
    }

    #[test]
    fn test_load_sample_config() {
        let cfg = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.version, "2.1.0");
        assert_eq!(cfg.timezone, "Asia/Singapore");
        assert_eq!(cfg.playbook.hold_minutes, 30);
        assert_eq!(cfg.engine.normalization, ScoreNormalization::Shift);

        let scenarios = cfg.validate().unwrap();
        let default = scenarios.default_slice().unwrap();
        assert_eq!(default.version(), "2.1.0");
        assert_eq!(default.referenced_features().len(), 2);
    }

    #[test]
    fn test_session_override_merges_with_default() {
        let scenarios = AppConfig::from_toml_str(SAMPLE).unwrap().validate().unwrap();
        let weekly = scenarios.session_slice("SUN_WEEKLY").unwrap();
        assert!((weekly.neutral_zone() - 0.2).abs() < 1e-12);
        // Inherited from default
        assert_eq!(weekly.weights().bull.get("momentum"), Some(&1.0));
        // Overlaid
        assert_eq!(weekly.weights().neutral.get("vix_spot"), Some(&-0.25));
        assert_eq!(weekly.weights().neutral.get("momentum"), Some(&0.0));
    }

    #[test]
    fn test_missing_bounds_is_defect() {
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 1.0);
        weights.bear.insert("breadth".into(), -1.0);
        let err = slice_with(weights).unwrap_err();
        assert!(matches!(err, OutlookError::ConfigurationDefect(_)));
        assert!(err.to_string().contains("breadth"));
    }

    #[test]
    fn test_empty_weights_is_defect() {
        assert!(slice_with(WeightTable::default()).is_err());
    }

    #[test]
    fn test_suspicious_weight_rejected() {
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 7.5);
        assert!(slice_with(weights).unwrap_err().to_string().contains("suspicious"));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut features = BTreeMap::new();
        features.insert("momentum".to_string(), FeatureBounds::new(5.0, -5.0, 0.0));
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 1.0);
        let err = ConfigurationSlice::new("v", 0.1, ScoreNormalization::Shift, features, weights)
            .unwrap_err();
        assert!(err.to_string().contains("must be <"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let toml = r#"
[playbook]
hold_minutes = 500
use_close_confirmation = false

[thresholds]
gamma_flip_default = 6850.0
fallback_support = 6900.0
fallback_resistance = 6800.0
near_level_points = 25.0

[default.features.x]
min = 0.0
max = 1.0
default = 3.0

[default.weights.bull]
x = 1.0
"#;
        let err = AppConfig::from_toml_str(toml).unwrap().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("hold_minutes 500"));
        assert!(msg.contains("use_close_confirmation"));
        assert!(msg.contains("fallback_support must be <"));
        assert!(msg.contains("default 3"));
    }

    #[test]
    fn test_no_slices_at_all_is_defect() {
        let err = AppConfig::from_toml_str("version = \"1\"").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("no [default] slice"));
    }

    #[test]
    fn test_sessions_only_config() {
        let toml = r#"
[sessions.CLOSE.features.momentum]
min = -1.0
max = 1.0

[sessions.CLOSE.weights.bull]
momentum = 1.0
"#;
        let scenarios = AppConfig::from_toml_str(toml).unwrap().validate().unwrap();
        assert!(scenarios.default_slice().is_none());
        let close = scenarios.session_slice("CLOSE").unwrap();
        assert!((close.neutral_zone() - DEFAULT_NEUTRAL_ZONE).abs() < 1e-12);
    }

    #[test]
    fn test_load_config_file() {
        let mut p = std::env::temp_dir();
        p.push(format!("outlook_test_config_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&p, SAMPLE).unwrap();
        let (cfg, scenarios) = AppConfig::load(&p).unwrap();
        assert_eq!(cfg.version, "2.1.0");
        assert!(scenarios.default_slice().is_some());
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/tmp/outlook_does_not_exist_xyz.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_repo_config_is_valid() {
        // The shipped config.toml must always validate.
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml");
        let (cfg, scenarios) = AppConfig::load(path).unwrap();
        assert!(!cfg.version.is_empty());
        assert!(scenarios.default_slice().is_some());
    }
}
