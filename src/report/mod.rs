//! Report rendering.
//!
//! [`OutlookReport`] is the JSON document written to `outputs/json/` and
//! returned by the HTTP API. The run record sits under `record` with its
//! exact field names so it can be re-read on its own; everything else is
//! advisory context for the reader.

pub mod markdown;
pub mod playbook;

use serde::Serialize;

use crate::analysis::levels::KeyLevels;
use crate::analysis::macro_context::MacroContext;
use crate::analysis::structure::StructureContext;
use crate::analysis::MarketAnalysis;
use crate::config::AppConfig;
use crate::data::{InputsHealth, MarketSnapshot, PriceQuote};
use crate::engine::normalizer::DegradedInput;
use crate::engine::session::SliceSource;
use crate::engine::RunOutcome;
use crate::types::{RunRecord, ScoreTriple};
use playbook::ScenarioPlay;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketInfo {
    pub symbol: String,
    pub proxy: String,
    pub timezone: String,
    pub price: PriceQuote,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlookReport {
    pub record: RunRecord,
    pub degraded_inputs: Vec<DegradedInput>,
    pub low_conviction: bool,
    pub neutral_zone: f64,
    pub slice_source: SliceSource,
    pub raw_scores: ScoreTriple,
    pub market: MarketInfo,
    #[serde(rename = "macro")]
    pub macro_context: MacroContext,
    pub structure: StructureContext,
    pub key_levels: KeyLevels,
    pub playbook: Vec<ScenarioPlay>,
    pub health: InputsHealth,
}

impl OutlookReport {
    pub fn build(
        outcome: RunOutcome,
        analysis: MarketAnalysis,
        snapshot: &MarketSnapshot,
        config: &AppConfig,
    ) -> Self {
        let playbook =
            playbook::build(&analysis.key_levels, outcome.record.scores(), &config.playbook);

        Self {
            market: MarketInfo {
                symbol: config.symbols.spx.clone(),
                proxy: config.symbols.proxy.clone(),
                timezone: config.timezone.clone(),
                price: snapshot.price.clone(),
            },
            record: outcome.record,
            degraded_inputs: outcome.degraded_inputs,
            low_conviction: outcome.low_conviction,
            neutral_zone: outcome.neutral_zone,
            slice_source: outcome.slice_source,
            raw_scores: outcome.raw_scores,
            macro_context: analysis.macro_context,
            structure: analysis.structure,
            key_levels: analysis.key_levels,
            playbook,
            health: snapshot.health.clone(),
        }
    }

    pub fn run_id(&self) -> &str {
        self.record.run_id()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        markdown::render(self)
    }
}
