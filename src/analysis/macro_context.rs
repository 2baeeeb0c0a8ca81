//! Macro context: rate pressure, event risk and the resulting bias.

use serde::Serialize;
use std::fmt;

use crate::data::MarketSnapshot;

/// Rate-pressure score (0-100) at or above which the bias is Risk-Off.
pub const RISK_OFF_AT: f64 = 60.0;
/// Rate-pressure score at or below which the bias is Risk-On.
pub const RISK_ON_AT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventRisk {
    Low,
    Medium,
    High,
}

impl EventRisk {
    /// 0 events → Low, 1 → Medium, 2+ → High.
    pub fn from_event_count(count: usize) -> Self {
        match count {
            0 => EventRisk::Low,
            1 => EventRisk::Medium,
            _ => EventRisk::High,
        }
    }

    /// Ordinal used as the `event_risk` feature.
    pub fn level(&self) -> f64 {
        match self {
            EventRisk::Low => 0.0,
            EventRisk::Medium => 1.0,
            EventRisk::High => 2.0,
        }
    }
}

impl fmt::Display for EventRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRisk::Low => write!(f, "Low"),
            EventRisk::Medium => write!(f, "Medium"),
            EventRisk::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacroBias {
    #[serde(rename = "Risk-On")]
    RiskOn,
    Mixed,
    #[serde(rename = "Risk-Off")]
    RiskOff,
}

impl MacroBias {
    pub fn from_rate_pressure(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= RISK_OFF_AT => MacroBias::RiskOff,
            Some(s) if s <= RISK_ON_AT => MacroBias::RiskOn,
            _ => MacroBias::Mixed,
        }
    }
}

impl fmt::Display for MacroBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroBias::RiskOn => write!(f, "Risk-On"),
            MacroBias::Mixed => write!(f, "Mixed"),
            MacroBias::RiskOff => write!(f, "Risk-Off"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroContext {
    /// `None` when the 10-year yield or the dollar index is missing.
    pub rate_pressure: Option<f64>,
    pub event_count: usize,
    pub event_risk: EventRisk,
    pub bias: MacroBias,
}

/// Higher yields and a stronger dollar both add pressure. Clamped to 0-100.
pub fn rate_pressure_score(us10y: f64, dxy: f64) -> f64 {
    let score = 50.0 + (us10y - 4.0) * 25.0 + (dxy - 103.0) * 5.0;
    score.clamp(0.0, 100.0)
}

pub fn analyze(snapshot: &MarketSnapshot) -> MacroContext {
    let rate_pressure = match (snapshot.rates.us10y, snapshot.fx.dxy) {
        (Some(y), Some(d)) if y.is_finite() && d.is_finite() => Some(rate_pressure_score(y, d)),
        _ => None,
    };
    let event_count = snapshot.macro_calendar.len() + snapshot.earnings.len();

    MacroContext {
        rate_pressure,
        event_count,
        event_risk: EventRisk::from_event_count(event_count),
        bias: MacroBias::from_rate_pressure(rate_pressure),
    }
}
