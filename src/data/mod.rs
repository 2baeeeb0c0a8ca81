//! Market data providers.
//!
//! Defines the `MarketDataProvider` trait and the `MarketSnapshot` schema
//! every fetcher returns. Providers may be stubbed or real; the analysis
//! layer only relies on this schema and tolerates any field being absent.

pub mod fred;
pub mod snapshot_file;
pub mod stub;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshot schema
// ---------------------------------------------------------------------------

/// Everything fetched for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub price: PriceQuote,
    #[serde(default)]
    pub rates: Rates,
    #[serde(default)]
    pub fx: Fx,
    #[serde(default)]
    pub macro_calendar: Vec<CalendarEvent>,
    #[serde(default)]
    pub earnings: Vec<CalendarEvent>,
    #[serde(default)]
    pub technicals: Technicals,
    #[serde(default)]
    pub options: OptionsStructure,
    #[serde(default)]
    pub vix: VixState,
    #[serde(default)]
    pub health: InputsHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub last: Option<f64>,
    pub prev_close: Option<f64>,
}

/// Treasury yields in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub us10y: Option<f64>,
    pub us2y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fx {
    pub dxy: Option<f64>,
}

/// A scheduled macro release or earnings report inside the event window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Technicals {
    pub weekly_pivot: Option<f64>,
    #[serde(default)]
    pub supports: Vec<f64>,
    #[serde(default)]
    pub resistances: Vec<f64>,
    pub rsi14: Option<f64>,
    pub macd_hist: Option<f64>,
    pub trend_state: Option<String>,
}

/// Options positioning: gamma flip, dealer regime, max-pain zone, walls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsStructure {
    pub gamma_flip: Option<f64>,
    /// Free text such as `"Transition->NegativeGamma"`.
    pub regime: Option<String>,
    /// `[low, high]`.
    pub max_pain_zone: Option<[f64; 2]>,
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VixState {
    pub spot: Option<f64>,
    /// Free text such as `"Contango->Flattening"`.
    pub term: Option<String>,
}

/// Where the data came from and what the provider could not supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputsHealth {
    pub provider: String,
    pub asof_utc: DateTime<Utc>,
    #[serde(default)]
    pub missing: Vec<String>,
}

impl Default for InputsHealth {
    fn default() -> Self {
        Self {
            provider: "unknown".to_string(),
            asof_utc: DateTime::<Utc>::default(),
            missing: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// What a provider is asked to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    pub proxy: String,
    /// Canonical session token.
    pub session: String,
    pub asof: DateTime<Utc>,
}

/// Abstraction over external market data sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short identifier recorded in `InputsHealth::provider`.
    fn name(&self) -> String;

    /// Fetch one snapshot for the requested session.
    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<MarketSnapshot>;
}

#[async_trait]
impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> String {
        (**self).name()
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<MarketSnapshot> {
        (**self).fetch_snapshot(request).await
    }
}
