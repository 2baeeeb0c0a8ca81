//! Session resolver.
//!
//! Maps a caller-supplied session token onto the configuration slice that
//! applies to it. Pure lookup: logging the lenient fallback for unknown
//! tokens is left to the caller.

use serde::Serialize;

use crate::config::{ConfigurationSlice, ScenarioConfig};
use crate::types::{canonical_token, OutlookError, Session};

/// Where a resolved slice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceSource {
    /// A `[sessions.<TOKEN>]` override matched.
    Override,
    /// A recognised session without an override; global default used.
    Default,
    /// Unrecognised token; global default used. Callers should warn.
    DefaultForUnknown,
}

/// Result of session resolution.
#[derive(Debug, Clone)]
pub struct ResolvedSlice<'a> {
    /// Trimmed, upper-cased token.
    pub token: String,
    /// The parsed session, if the token is one of the known labels.
    pub session: Option<Session>,
    pub slice: &'a ConfigurationSlice,
    pub source: SliceSource,
}

/// Resolve `token` against the validated configuration.
///
/// Unknown tokens silently fall back to the default slice. Fails with
/// [`OutlookError::UnknownSession`] only when the token is unrecognised and
/// no default exists; a recognised token with neither override nor default
/// is a [`OutlookError::ConfigurationDefect`].
pub fn resolve<'a>(
    token: &str,
    config: &'a ScenarioConfig,
) -> Result<ResolvedSlice<'a>, OutlookError> {
    let canonical = canonical_token(token);
    let session = canonical.parse::<Session>().ok();

    if let Some(slice) = config.session_slice(&canonical) {
        return Ok(ResolvedSlice {
            token: canonical,
            session,
            slice,
            source: SliceSource::Override,
        });
    }

    match (config.default_slice(), session) {
        (Some(slice), Some(_)) => Ok(ResolvedSlice {
            token: canonical,
            session,
            slice,
            source: SliceSource::Default,
        }),
        (Some(slice), None) => Ok(ResolvedSlice {
            token: canonical,
            session,
            slice,
            source: SliceSource::DefaultForUnknown,
        }),
        (None, None) => Err(OutlookError::UnknownSession { token: canonical }),
        (None, Some(s)) => Err(OutlookError::ConfigurationDefect(format!(
            "no configuration slice for session {s} and no default slice"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureBounds, WeightTable};
    use crate::engine::scorer::ScoreNormalization;
    use std::collections::BTreeMap;

    fn slice(version: &str) -> ConfigurationSlice {
        let mut features = BTreeMap::new();
        features.insert("momentum".to_string(), FeatureBounds::new(-5.0, 5.0, 0.0));
        let mut weights = WeightTable::default();
        weights.bull.insert("momentum".into(), 1.0);
        ConfigurationSlice::new(version, 0.1, ScoreNormalization::Shift, features, weights)
            .unwrap()
    }

    fn config(with_default: bool) -> ScenarioConfig {
        let mut sessions = BTreeMap::new();
        sessions.insert("close".to_string(), slice("close"));
        sessions.insert("LUNCH".to_string(), slice("lunch"));
        ScenarioConfig::new(with_default.then(|| slice("default")), sessions)
    }

    #[test]
    fn test_override_wins() {
        let cfg = config(true);
        let r = resolve("Close", &cfg).unwrap();
        assert_eq!(r.token, "CLOSE");
        assert_eq!(r.session, Some(Session::Close));
        assert_eq!(r.source, SliceSource::Override);
        assert_eq!(r.slice.version(), "close");
    }

    #[test]
    fn test_known_session_falls_back_to_default() {
        let cfg = config(true);
        let r = resolve("pre", &cfg).unwrap();
        assert_eq!(r.source, SliceSource::Default);
        assert_eq!(r.slice.version(), "default");
    }

    #[test]
    fn test_unknown_session_uses_default_without_error() {
        let cfg = config(true);
        let r = resolve("overnight", &cfg).unwrap();
        assert_eq!(r.source, SliceSource::DefaultForUnknown);
        assert_eq!(r.session, None);
        assert_eq!(r.slice.version(), "default");
    }

    #[test]
    fn test_custom_token_with_override() {
        let cfg = config(false);
        let r = resolve(" lunch ", &cfg).unwrap();
        assert_eq!(r.source, SliceSource::Override);
        assert_eq!(r.session, None);
        assert_eq!(r.slice.version(), "lunch");
    }

    #[test]
    fn test_unknown_session_without_default_fails() {
        let cfg = config(false);
        let err = resolve("overnight", &cfg).unwrap_err();
        assert!(matches!(err, OutlookError::UnknownSession { ref token } if token == "OVERNIGHT"));
    }

    #[test]
    fn test_known_session_without_any_slice_is_defect() {
        let cfg = config(false);
        let err = resolve("MID", &cfg).unwrap_err();
        assert!(matches!(err, OutlookError::ConfigurationDefect(_)));
    }
}
