//! Market structure: dealer gamma regime, VIX term state, momentum label.
//!
//! Regime and term fields arrive as free text, often as a transition such as
//! `"Transition->NegativeGamma"`. The state after the last `->` is the
//! current one.

use serde::Serialize;
use std::fmt;

use crate::data::Technicals;

fn current_state(text: &str) -> String {
    text.rsplit("->").next().unwrap_or(text).trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GammaRegime {
    Negative,
    Transition,
    Positive,
}

impl GammaRegime {
    /// `None` when the text names no recognisable regime.
    pub fn parse(text: &str) -> Option<Self> {
        let s = current_state(text);
        if s.contains("neg") {
            Some(GammaRegime::Negative)
        } else if s.contains("pos") {
            Some(GammaRegime::Positive)
        } else if s.contains("transition") || s.contains("neutral") || s.contains("flat") {
            Some(GammaRegime::Transition)
        } else {
            None
        }
    }

    /// +1 positive, 0 transition, -1 negative.
    pub fn signal(&self) -> f64 {
        match self {
            GammaRegime::Negative => -1.0,
            GammaRegime::Transition => 0.0,
            GammaRegime::Positive => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VixTerm {
    Backwardation,
    Flattening,
    Contango,
}

impl VixTerm {
    pub fn parse(text: &str) -> Option<Self> {
        let s = current_state(text);
        if s.contains("backward") {
            Some(VixTerm::Backwardation)
        } else if s.contains("flat") {
            Some(VixTerm::Flattening)
        } else if s.contains("contango") {
            Some(VixTerm::Contango)
        } else {
            None
        }
    }

    /// +1 contango, 0 flattening, -1 backwardation.
    pub fn signal(&self) -> f64 {
        match self {
            VixTerm::Backwardation => -1.0,
            VixTerm::Flattening => 0.0,
            VixTerm::Contango => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumState {
    Bearish,
    Neutral,
    Bullish,
}

impl MomentumState {
    /// Bearish on a negative MACD histogram; Bullish needs RSI > 55 and a
    /// positive histogram.
    pub fn from_indicators(rsi14: Option<f64>, macd_hist: Option<f64>) -> Self {
        match (rsi14, macd_hist) {
            (Some(rsi), Some(macd)) if rsi > 55.0 && macd > 0.0 => MomentumState::Bullish,
            (_, Some(macd)) if macd < 0.0 => MomentumState::Bearish,
            _ => MomentumState::Neutral,
        }
    }
}

impl fmt::Display for MomentumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumState::Bearish => write!(f, "Bearish"),
            MomentumState::Neutral => write!(f, "Neutral"),
            MomentumState::Bullish => write!(f, "Bullish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureContext {
    pub gamma_regime: Option<GammaRegime>,
    pub vix_term: Option<VixTerm>,
    pub momentum: MomentumState,
    pub trend_state: String,
}

pub fn analyze(snapshot: &crate::data::MarketSnapshot) -> StructureContext {
    let Technicals {
        rsi14,
        macd_hist,
        trend_state,
        ..
    } = &snapshot.technicals;

    StructureContext {
        gamma_regime: snapshot.options.regime.as_deref().and_then(GammaRegime::parse),
        vix_term: snapshot.vix.term.as_deref().and_then(VixTerm::parse),
        momentum: MomentumState::from_indicators(*rsi14, *macd_hist),
        trend_state: trend_state.clone().unwrap_or_else(|| "Unknown".to_string()),
    }
}
