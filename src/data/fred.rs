//! FRED rates overlay.
//!
//! Wraps another provider and replaces its Treasury yields with the latest
//! daily observations from FRED (Federal Reserve Economic Data).
//!
//! API: `https://api.stlouisfed.org/fred/series/observations`
//! Auth: API key via `api_key` query param. Free registration.
//!
//! Series: DGS10 (10-year), DGS2 (2-year). A failed or empty series leaves
//! the wrapped provider's value in place and is listed in `health.missing`
//! as `fred:<SERIES>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FetchRequest, MarketDataProvider, MarketSnapshot};

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const SERIES_10Y: &str = "DGS10";
const SERIES_2Y: &str = "DGS2";

// ---------------------------------------------------------------------------
// FRED API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FredResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    #[allow(dead_code)]
    date: String,
    value: String,
}

/// Most recent numeric observation. FRED reports gaps as `"."`.
fn latest_value(observations: &[FredObservation]) -> Option<f64> {
    observations
        .iter()
        .filter(|o| o.value != ".")
        .find_map(|o| o.value.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

pub struct FredOverlay<P> {
    inner: P,
    http: Client,
    api_key: Secret<String>,
    base_url: String,
}

impl<P: MarketDataProvider> FredOverlay<P> {
    pub fn new(inner: P, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("OUTLOOK/0.1.0")
            .build()
            .context("Failed to build FRED HTTP client")?;
        Ok(Self {
            inner,
            http,
            api_key: Secret::new(api_key),
            base_url: FRED_BASE_URL.to_string(),
        })
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_series(&self, series_id: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}?series_id={}&api_key={}&file_type=json&sort_order=desc&limit=12",
            self.base_url,
            urlencoding::encode(series_id),
            urlencoding::encode(self.api_key.expose_secret()),
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context(format!("FRED request failed for {series_id}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("FRED API error for {series_id}: {status}");
        }

        let data: FredResponse = resp
            .json()
            .await
            .context(format!("Failed to parse FRED response for {series_id}"))?;

        Ok(latest_value(&data.observations))
    }
}

/// Apply one series result to a yield slot.
fn overlay_value(
    slot: &mut Option<f64>,
    series_id: &str,
    result: Result<Option<f64>>,
    missing: &mut Vec<String>,
) {
    match result {
        Ok(Some(v)) => {
            debug!(series = series_id, value = v, "FRED observation applied");
            *slot = Some(v);
        }
        Ok(None) => {
            debug!(series = series_id, "FRED series had no numeric observation");
            missing.push(format!("fred:{series_id}"));
        }
        Err(e) => {
            warn!(series = series_id, error = %e, "FRED fetch failed, keeping provider value");
            missing.push(format!("fred:{series_id}"));
        }
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for FredOverlay<P> {
    fn name(&self) -> String {
        format!("{}+fred", self.inner.name())
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<MarketSnapshot> {
        let mut snapshot = self.inner.fetch_snapshot(request).await?;

        let (ten, two) = futures::join!(
            self.fetch_series(SERIES_10Y),
            self.fetch_series(SERIES_2Y)
        );

        let missing = &mut snapshot.health.missing;
        overlay_value(&mut snapshot.rates.us10y, SERIES_10Y, ten, missing);
        overlay_value(&mut snapshot.rates.us2y, SERIES_2Y, two, missing);
        snapshot.health.provider = self.name();

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdsConfig;
    use crate::data::stub::StubProvider;
    use chrono::Utc;
    use std::collections::HashMap;

    fn obs(values: &[&str]) -> Vec<FredObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| FredObservation {
                date: format!("2026-01-{:02}", 10 - i),
                value: v.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_latest_value_skips_gaps() {
        assert_eq!(latest_value(&obs(&[".", "4.31", "4.29"])), Some(4.31));
        assert_eq!(latest_value(&obs(&[".", "."])), None);
        assert_eq!(latest_value(&[]), None);
    }

    #[test]
    fn test_parse_fred_response() {
        let json = r#"{"observations":[{"date":"2026-01-09","value":"."},{"date":"2026-01-08","value":"4.18"}]}"#;
        let data: FredResponse = serde_json::from_str(json).unwrap();
        assert_eq!(latest_value(&data.observations), Some(4.18));
    }

    #[test]
    fn test_overlay_value_keeps_inner_on_error() {
        let mut slot = Some(4.25);
        let mut missing = Vec::new();
        overlay_value(&mut slot, "DGS10", Err(anyhow::anyhow!("boom")), &mut missing);
        assert_eq!(slot, Some(4.25));
        assert_eq!(missing, vec!["fred:DGS10"]);

        overlay_value(&mut slot, "DGS10", Ok(Some(4.4)), &mut missing);
        assert_eq!(slot, Some(4.4));
        assert_eq!(missing.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_fred_falls_back_to_inner() {
        let inner = StubProvider::with_vars(HashMap::new(), &ThresholdsConfig::default());
        let overlay = FredOverlay::new(inner, "key".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9/fred");
        let request = FetchRequest {
            symbol: "SPX".into(),
            proxy: "ES".into(),
            session: "PRE".into(),
            asof: Utc::now(),
        };
        let snap = overlay.fetch_snapshot(&request).await.unwrap();
        assert_eq!(snap.rates.us10y, Some(4.25));
        assert_eq!(snap.rates.us2y, Some(4.55));
        assert_eq!(snap.health.provider, "stub+fred");
        assert!(snap.health.missing.contains(&"fred:DGS10".to_string()));
        assert!(snap.health.missing.contains(&"fred:DGS2".to_string()));
    }
}
