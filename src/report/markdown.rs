//! Markdown report for `outputs/reports/`.

use super::OutlookReport;
use crate::types::Scenario;

fn level(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.0}")).unwrap_or_else(|| "n/a".to_string())
}

fn pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

pub fn render(report: &OutlookReport) -> String {
    let record = &report.record;
    let scores = record.scores();
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!(
        "# {} Outlook: {} ({})",
        report.market.symbol,
        record.session(),
        record.created_at().format("%Y-%m-%d %H:%M UTC")
    ));
    parts.push(String::new());
    parts.push(format!(
        "- Run: `{}` | config v{} | proxy {}",
        record.run_id(),
        record.config_version(),
        report.market.proxy
    ));
    if let (Some(last), Some(prev)) = (report.market.price.last, report.market.price.prev_close) {
        parts.push(format!("- Last: {last:.2} (prev close {prev:.2}, {:+.2})", last - prev));
    }
    parts.push(format!(
        "- Verdict: **{}** with margin {:.3}{}",
        record.dominant_scenario(),
        record.confidence_margin(),
        if report.low_conviction {
            " (low conviction)"
        } else {
            ""
        }
    ));

    // Probabilities
    parts.push(String::new());
    parts.push("## Scenario probabilities".to_string());
    parts.push(String::new());
    parts.push("| Scenario | Probability | Raw score |".to_string());
    parts.push("|---|---:|---:|".to_string());
    for scenario in Scenario::ALL {
        let marker = if *scenario == record.dominant_scenario() { " ◀" } else { "" };
        parts.push(format!(
            "| {scenario}{marker} | {} | {:+.3} |",
            pct(scores.get(*scenario)),
            report.raw_scores.get(*scenario)
        ));
    }

    // Features
    parts.push(String::new());
    parts.push("## Normalized features".to_string());
    parts.push(String::new());
    parts.push("| Feature | Raw | Normalized |".to_string());
    parts.push("|---|---:|---:|".to_string());
    for (name, value) in record.normalized_features().iter() {
        let raw = match record.raw_inputs().get(name).and_then(|v| v.as_finite()) {
            Some(x) => format!("{x:.2}"),
            None => "n/a".to_string(),
        };
        parts.push(format!("| {name} | {raw} | {value:+.3} |"));
    }

    if !report.degraded_inputs.is_empty() {
        parts.push(String::new());
        parts.push("> Degraded inputs (configured defaults substituted):".to_string());
        for d in &report.degraded_inputs {
            parts.push(format!("> - {d}"));
        }
    }

    // Context
    let m = &report.macro_context;
    let s = &report.structure;
    parts.push(String::new());
    parts.push("## Context".to_string());
    parts.push(String::new());
    parts.push(format!(
        "- Macro: {} (rate pressure {}), event risk {} ({} events)",
        m.bias,
        m.rate_pressure
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "n/a".to_string()),
        m.event_risk,
        m.event_count
    ));
    parts.push(format!(
        "- Structure: gamma {}, VIX term {}, momentum {}, trend {}",
        s.gamma_regime
            .map(|g| format!("{g:?}"))
            .unwrap_or_else(|| "n/a".to_string()),
        s.vix_term
            .map(|t| format!("{t:?}"))
            .unwrap_or_else(|| "n/a".to_string()),
        s.momentum,
        s.trend_state
    ));

    // Levels
    let k = &report.key_levels;
    parts.push(String::new());
    parts.push("## Key levels".to_string());
    parts.push(String::new());
    parts.push(format!(
        "- Support: {} / {}{}",
        level(k.support_1),
        level(k.support_2),
        if k.near_support { " (near)" } else { "" }
    ));
    parts.push(format!(
        "- Resistance: {} / {}{}",
        level(k.resistance_1),
        level(k.resistance_2),
        if k.near_resistance { " (near)" } else { "" }
    ));
    parts.push(format!(
        "- Weekly pivot: {} | Gamma flip: {}",
        level(k.weekly_pivot),
        level(k.gamma_flip)
    ));
    if let Some([lo, hi]) = k.max_pain_zone {
        parts.push(format!("- Max pain zone: {lo:.0}-{hi:.0}"));
    }
    parts.push(format!(
        "- Walls: call {} | put {}",
        level(k.call_wall),
        level(k.put_wall)
    ));
    if !k.fallbacks.is_empty() {
        parts.push(format!("- Fallback levels: {}", k.fallbacks.join(", ")));
    }

    // Playbook
    parts.push(String::new());
    parts.push("## Playbook".to_string());
    for play in &report.playbook {
        let targets = if play.targets.is_empty() {
            "n/a".to_string()
        } else {
            play.targets
                .iter()
                .map(|t| format!("{t:.0}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        parts.push(String::new());
        parts.push(format!("### {} ({})", play.name, pct(play.probability)));
        parts.push(format!("- Trigger: {}", play.trigger));
        parts.push(format!("- Targets: {targets}"));
        parts.push(format!("- Invalidation: {}", play.invalidation));
    }

    // Inputs health
    let h = &report.health;
    parts.push(String::new());
    parts.push("## Inputs".to_string());
    parts.push(String::new());
    parts.push(format!(
        "- Provider: {} as of {}",
        h.provider,
        h.asof_utc.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if !h.missing.is_empty() {
        parts.push(format!("- Missing: {}", h.missing.join(", ")));
    }

    parts.push(String::new());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;

    #[test]
    fn test_markdown_sections() {
        let md = sample_report().to_markdown();
        assert!(md.starts_with("# SPX Outlook: PRE (2026-01-05 13:00 UTC)"));
        for heading in [
            "## Scenario probabilities",
            "## Normalized features",
            "## Key levels",
            "## Playbook",
            "## Inputs",
        ] {
            assert!(md.contains(heading), "missing {heading}");
        }
        assert!(md.contains("Bearish pull-to-support/maxpain"));
        assert!(md.contains("- Provider: stub"));
    }

    #[test]
    fn test_markdown_lists_degraded_inputs() {
        let md = sample_report().to_markdown();
        assert!(md.contains("> - rsi14 (unavailable, using +0.00)"));
        assert!(md.contains("| rsi14 | n/a | +0.000 |"));
    }

    #[test]
    fn test_markdown_marks_dominant() {
        let report = sample_report();
        let md = report.to_markdown();
        let line = format!("| {} ◀ |", report.record.dominant_scenario());
        assert!(md.contains(&line));
    }
}
