//! Stub provider.
//!
//! Produces a complete snapshot from environment variables with fixed
//! fallbacks, so the pipeline runs end-to-end without a market data
//! subscription. Any variable can be set to override the canned value,
//! e.g. `SPX_LAST=6900 outlook run --session PRE`. A variable set to an
//! unparseable value is treated as unavailable and reported in
//! `health.missing`.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::{
    FetchRequest, Fx, InputsHealth, MarketDataProvider, MarketSnapshot, OptionsStructure,
    PriceQuote, Rates, Technicals, VixState,
};
use crate::config::ThresholdsConfig;

/// Where stub values are read from.
#[derive(Debug, Clone)]
enum VarSource {
    Env,
    Fixed(HashMap<String, String>),
}

pub struct StubProvider {
    vars: VarSource,
    gamma_flip_default: f64,
}

impl StubProvider {
    /// Read overrides from the process environment.
    pub fn from_env(thresholds: &ThresholdsConfig) -> Self {
        Self {
            vars: VarSource::Env,
            gamma_flip_default: thresholds.gamma_flip_default,
        }
    }

    /// Read overrides from a fixed map (tests, replays).
    pub fn with_vars(vars: HashMap<String, String>, thresholds: &ThresholdsConfig) -> Self {
        Self {
            vars: VarSource::Fixed(vars),
            gamma_flip_default: thresholds.gamma_flip_default,
        }
    }

    fn raw(&self, key: &str) -> Option<String> {
        match &self.vars {
            VarSource::Env => std::env::var(key).ok(),
            VarSource::Fixed(map) => map.get(key).cloned(),
        }
    }

    /// Numeric variable with fallback; `None` (and a `missing` entry) when
    /// the variable is set but unparseable.
    fn num(&self, key: &str, fallback: f64, missing: &mut Vec<String>) -> Option<f64> {
        match self.raw(key) {
            None => Some(fallback),
            Some(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    debug!(var = key, value = %s, "Unparseable stub override");
                    missing.push(key.to_string());
                    None
                }
            },
        }
    }

    fn text(&self, key: &str, fallback: &str) -> String {
        self.raw(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Build the snapshot synchronously; the trait method only wraps this.
    pub fn snapshot(&self, request: &FetchRequest) -> MarketSnapshot {
        let mut missing = Vec::new();

        let prev_close = self.num("SPX_PREV_CLOSE", 6848.7, &mut missing);
        let last = self.num("SPX_LAST", prev_close.unwrap_or(6848.7) - 18.5, &mut missing);

        let mp_low = self.num("MAX_PAIN_LOW", 6620.0, &mut missing);
        let mp_high = self.num("MAX_PAIN_HIGH", 6750.0, &mut missing);
        let max_pain_zone = match (mp_low, mp_high) {
            (Some(lo), Some(hi)) => Some([lo, hi]),
            _ => None,
        };

        MarketSnapshot {
            symbol: request.symbol.clone(),
            proxy: request.proxy.clone(),
            price: PriceQuote { last, prev_close },
            rates: Rates {
                us10y: self.num("US10Y", 4.25, &mut missing),
                us2y: self.num("US2Y", 4.55, &mut missing),
            },
            fx: Fx {
                dxy: self.num("DXY", 103.2, &mut missing),
            },
            macro_calendar: Vec::new(),
            earnings: Vec::new(),
            // Levels and indicators are left to the fallbacks in `analysis`.
            technicals: Technicals::default(),
            options: OptionsStructure {
                gamma_flip: self.num("GAMMA_FLIP", self.gamma_flip_default, &mut missing),
                regime: Some(self.text("GAMMA_REGIME", "Transition->NegativeGamma")),
                max_pain_zone,
                call_wall: self.num("CALL_WALL", 6900.0, &mut missing),
                put_wall: self.num("PUT_WALL", 6800.0, &mut missing),
            },
            vix: VixState {
                spot: self.num("VIX", 16.24, &mut missing),
                term: Some(self.text("VIX_TERM", "Contango->Flattening")),
            },
            health: InputsHealth {
                provider: self.name(),
                asof_utc: request.asof,
                missing,
            },
        }
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn name(&self) -> String {
        "stub".to_string()
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<MarketSnapshot> {
        Ok(self.snapshot(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request() -> FetchRequest {
        FetchRequest {
            symbol: "SPX".into(),
            proxy: "ES".into(),
            session: "PRE".into(),
            asof: Utc::now(),
        }
    }

    fn provider(pairs: &[(&str, &str)]) -> StubProvider {
        let vars = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        StubProvider::with_vars(vars, &ThresholdsConfig::default())
    }

    #[test]
    fn test_canned_defaults() {
        let snap = provider(&[]).snapshot(&request());
        assert_eq!(snap.price.prev_close, Some(6848.7));
        assert!((snap.price.last.unwrap() - 6830.2).abs() < 1e-9);
        assert_eq!(snap.options.gamma_flip, Some(6850.0));
        assert_eq!(snap.options.max_pain_zone, Some([6620.0, 6750.0]));
        assert_eq!(snap.health.provider, "stub");
        assert!(snap.health.missing.is_empty());
    }

    #[test]
    fn test_overrides_applied() {
        let snap = provider(&[("SPX_LAST", "6900"), ("VIX_TERM", "Backwardation")])
            .snapshot(&request());
        assert_eq!(snap.price.last, Some(6900.0));
        assert_eq!(snap.vix.term.as_deref(), Some("Backwardation"));
    }

    #[test]
    fn test_garbage_override_reported_missing() {
        let snap = provider(&[("VIX", "lots"), ("MAX_PAIN_HIGH", "")]).snapshot(&request());
        assert_eq!(snap.vix.spot, None);
        assert_eq!(snap.options.max_pain_zone, None);
        assert_eq!(snap.health.missing, vec!["MAX_PAIN_HIGH", "VIX"]);
    }

    #[test]
    fn test_fetch_snapshot_via_trait() {
        let p = provider(&[]);
        let snap = tokio_test::block_on(p.fetch_snapshot(&request())).unwrap();
        assert_eq!(snap.symbol, "SPX");
        assert_eq!(snap.proxy, "ES");
    }
}
