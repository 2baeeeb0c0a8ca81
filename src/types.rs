//! Shared types for the OUTLOOK engine.
//!
//! These types form the data model used across all modules: the session
//! labels that trigger a run, the three outlook scenarios, the raw and
//! normalized feature maps, and the immutable run record handed to the
//! renderers. Maps are `BTreeMap`s so that serialized output is stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A named time-of-day trigger context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Pre,
    OpenConfirm,
    Mid,
    PowerHour,
    Close,
    SatReview,
    SunWeekly,
}

impl Session {
    /// All known sessions, in trading-day order.
    pub const ALL: &'static [Session] = &[
        Session::Pre,
        Session::OpenConfirm,
        Session::Mid,
        Session::PowerHour,
        Session::Close,
        Session::SatReview,
        Session::SunWeekly,
    ];

    /// The canonical upper-case label (`"OPEN_CONFIRM"`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Session::Pre => "PRE",
            Session::OpenConfirm => "OPEN_CONFIRM",
            Session::Mid => "MID",
            Session::PowerHour => "POWER_HOUR",
            Session::Close => "CLOSE",
            Session::SatReview => "SAT_REVIEW",
            Session::SunWeekly => "SUN_WEEKLY",
        }
    }

    /// Weekend sessions review the past week rather than a live tape.
    pub fn is_weekend(&self) -> bool {
        matches!(self, Session::SatReview | Session::SunWeekly)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Parse a session label (case-insensitive, surrounding whitespace ignored).
impl std::str::FromStr for Session {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = canonical_token(s);
        Session::ALL
            .iter()
            .copied()
            .find(|session| session.label() == canonical)
            .ok_or_else(|| anyhow::anyhow!("Unknown session: {s}"))
    }
}

/// Normalise a caller-supplied session token: trimmed and upper-cased.
pub fn canonical_token(token: &str) -> String {
    token.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// One of the three mutually exclusive outlook classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scenario {
    Bear,
    Neutral,
    Bull,
}

impl Scenario {
    /// All scenarios, in the order used by score triples.
    pub const ALL: &'static [Scenario] = &[Scenario::Bear, Scenario::Neutral, Scenario::Bull];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Bear => write!(f, "Bear"),
            Scenario::Neutral => write!(f, "Neutral"),
            Scenario::Bull => write!(f, "Bull"),
        }
    }
}

impl std::str::FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bear" | "bearish" => Ok(Scenario::Bear),
            "neutral" => Ok(Scenario::Neutral),
            "bull" | "bullish" => Ok(Scenario::Bull),
            _ => Err(anyhow::anyhow!("Unknown scenario: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw observations
// ---------------------------------------------------------------------------

/// A single value as supplied by a fetcher.
///
/// Serialized untagged: a JSON number, a string (kept so that malformed
/// provider output can be audited), or `null` for "unavailable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Unavailable,
}

impl RawValue {
    /// The numeric value, if this is a finite number.
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(v: Option<f64>) -> Self {
        v.map(RawValue::Number).unwrap_or(RawValue::Unavailable)
    }
}

/// Feature name → raw value for one session. May be partially populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObservation(BTreeMap<String, RawValue>);

impl RawObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature's value (overwrites any previous entry).
    pub fn insert(&mut self, feature: impl Into<String>, value: impl Into<RawValue>) {
        self.0.insert(feature.into(), value.into());
    }

    /// Builder-style insert, handy for tests and stubs.
    pub fn with(mut self, feature: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(feature, value);
        self
    }

    pub fn get(&self, feature: &str) -> Option<&RawValue> {
        self.0.get(feature)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, RawValue)> for RawObservation {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Normalized features & scores
// ---------------------------------------------------------------------------

/// Feature name → value in `[-1, 1]`. Every referenced feature is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedFeatureSet(BTreeMap<String, f64>);

impl NormalizedFeatureSet {
    pub(crate) fn from_map(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }

    /// Value of a feature; absent features read as neutral.
    pub fn value(&self, feature: &str) -> f64 {
        self.0.get(feature).copied().unwrap_or(0.0)
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.0.get(feature).copied()
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains_key(feature)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, f64)> for NormalizedFeatureSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Probability-like distribution over the three scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTriple {
    pub bear: f64,
    pub neutral: f64,
    pub bull: f64,
}

impl ScoreTriple {
    pub fn new(bear: f64, neutral: f64, bull: f64) -> Self {
        Self { bear, neutral, bull }
    }

    /// The uniform "no signal" distribution.
    pub fn uniform() -> Self {
        let third = 1.0 / 3.0;
        Self::new(third, third, third)
    }

    pub fn get(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::Bear => self.bear,
            Scenario::Neutral => self.neutral,
            Scenario::Bull => self.bull,
        }
    }

    pub fn sum(&self) -> f64 {
        self.bear + self.neutral + self.bull
    }
}

impl fmt::Display for ScoreTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bear {:.1}% | Neutral {:.1}% | Bull {:.1}%",
            self.bear * 100.0,
            self.neutral * 100.0,
            self.bull * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

/// The immutable output of one scoring invocation.
///
/// Only `engine::assembler` constructs records; everything downstream
/// reads them through the accessors. Field names are the stable JSON
/// contract consumed by the renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    run_id: String,
    session: String,
    config_version: String,
    raw_inputs: RawObservation,
    normalized_features: NormalizedFeatureSet,
    scores: ScoreTriple,
    dominant_scenario: Scenario,
    confidence_margin: f64,
    created_at: DateTime<Utc>,
}

impl RunRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: String,
        session: String,
        config_version: String,
        raw_inputs: RawObservation,
        normalized_features: NormalizedFeatureSet,
        scores: ScoreTriple,
        dominant_scenario: Scenario,
        confidence_margin: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            session,
            config_version,
            raw_inputs,
            normalized_features,
            scores,
            dominant_scenario,
            confidence_margin,
            created_at,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn config_version(&self) -> &str {
        &self.config_version
    }

    pub fn raw_inputs(&self) -> &RawObservation {
        &self.raw_inputs
    }

    pub fn normalized_features(&self) -> &NormalizedFeatureSet {
        &self.normalized_features
    }

    pub fn scores(&self) -> &ScoreTriple {
        &self.scores
    }

    pub fn dominant_scenario(&self) -> Scenario {
        self.dominant_scenario
    }

    pub fn confidence_margin(&self) -> f64 {
        self.confidence_margin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (margin {:.3}) | {}",
            self.run_id, self.dominant_scenario, self.confidence_margin, self.scores,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal conditions of an outlook run.
///
/// Missing or malformed raw inputs are not errors; they degrade to the
/// configured defaults.
#[derive(Debug, thiserror::Error)]
pub enum OutlookError {
    #[error("Unknown session '{token}' and no default configuration slice")]
    UnknownSession { token: String },

    #[error("Configuration defect: {0}")]
    ConfigurationDefect(String),

    #[error("Data provider error ({provider}): {message}")]
    Data { provider: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Session tests --

    #[test]
    fn test_session_from_str_case_insensitive() {
        assert_eq!("pre".parse::<Session>().unwrap(), Session::Pre);
        assert_eq!(" Power_Hour ".parse::<Session>().unwrap(), Session::PowerHour);
        assert_eq!("SUN_WEEKLY".parse::<Session>().unwrap(), Session::SunWeekly);
        assert!("LUNCH".parse::<Session>().is_err());
    }

    #[test]
    fn test_session_labels_roundtrip() {
        for session in Session::ALL {
            assert_eq!(session.label().parse::<Session>().unwrap(), *session);
        }
        assert_eq!(format!("{}", Session::OpenConfirm), "OPEN_CONFIRM");
    }

    #[test]
    fn test_session_weekend() {
        assert!(Session::SatReview.is_weekend());
        assert!(!Session::Close.is_weekend());
    }

    // -- Scenario tests --

    #[test]
    fn test_scenario_display_and_parse() {
        assert_eq!(format!("{}", Scenario::Bull), "Bull");
        assert_eq!("BEARISH".parse::<Scenario>().unwrap(), Scenario::Bear);
        assert!("sideways".parse::<Scenario>().is_err());
    }

    // -- Raw observation tests --

    #[test]
    fn test_raw_value_from_json() {
        let obs: RawObservation =
            serde_json::from_str(r#"{"a": 1.5, "b": null, "c": "n/a"}"#).unwrap();
        assert_eq!(obs.get("a"), Some(&RawValue::Number(1.5)));
        assert_eq!(obs.get("b"), Some(&RawValue::Unavailable));
        assert_eq!(obs.get("c"), Some(&RawValue::Text("n/a".into())));
        assert_eq!(obs.len(), 3);
    }

    #[test]
    fn test_raw_value_as_finite() {
        assert_eq!(RawValue::Number(2.0).as_finite(), Some(2.0));
        assert_eq!(RawValue::Number(f64::NAN).as_finite(), None);
        assert_eq!(RawValue::Number(f64::INFINITY).as_finite(), None);
        assert_eq!(RawValue::Unavailable.as_finite(), None);
        assert_eq!(RawValue::from(None).as_finite(), None);
    }

    // -- Score triple tests --

    #[test]
    fn test_uniform_triple_sums_to_one() {
        let t = ScoreTriple::uniform();
        assert!((t.sum() - 1.0).abs() < 1e-12);
        assert_eq!(t.get(Scenario::Bear), t.get(Scenario::Bull));
    }

    #[test]
    fn test_run_record_field_names() {
        let record = RunRecord::new(
            "PRE-2026-01-05T13:00:00Z".into(),
            "PRE".into(),
            "1.0.0".into(),
            RawObservation::new().with("momentum", 5.0),
            [("momentum".to_string(), 1.0)].into_iter().collect(),
            ScoreTriple::new(0.0, 1.0 / 3.0, 2.0 / 3.0),
            Scenario::Bull,
            1.0 / 3.0,
            Utc::now(),
        );
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "run_id",
            "session",
            "config_version",
            "raw_inputs",
            "normalized_features",
            "scores",
            "dominant_scenario",
            "confidence_margin",
            "created_at",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 9);
        assert_eq!(json["dominant_scenario"], "Bull");
        assert_eq!(json["raw_inputs"]["momentum"], 5.0);
    }
}
