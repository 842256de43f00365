//! Markdown portfolio report
//!
//! Pure rendering over stored records: a portfolio overview table, then one
//! section per ranked candidate with its risk profile and summary.

use crate::types::{Assessment, Job, RankedEntry, RevenueProjection, RiskLevel};

/// Render the report for a job's ranked entries.
///
/// `assessments` are matched to entries by id; an entry without one still
/// gets its overview row and summary.
pub fn render_markdown(job: &Job, entries: &[RankedEntry], assessments: &[Assessment]) -> Vec<u8> {
    let mut out = String::new();

    // Header
    out.push_str("# Investment Portfolio Analysis\n\n");
    out.push_str(&format!(
        "Job `{}` · {} · top {} shortlisted startups\n\n",
        job.id,
        job.status,
        entries.len()
    ));
    out.push_str("## Thesis\n\n");
    out.push_str(&job.thesis.describe());
    out.push_str("\n\n");

    // Overview
    out.push_str("## Overview\n\n");
    if entries.is_empty() {
        out.push_str("No startup survived deep analysis.\n");
        return out.into_bytes();
    }
    out.push_str("| Rank | Startup | Success | Relevance | Recommendation |\n");
    out.push_str("|---:|---|---:|---:|---|\n");
    for e in entries {
        out.push_str(&format!(
            "| {} | {} | {:.1}% | {:.2} | {} |\n",
            e.rank,
            escape_cell(&e.name),
            e.success_probability,
            e.relevance_score,
            e.recommendation
        ));
    }
    out.push('\n');

    // Per candidate
    for e in entries {
        out.push_str(&format!("## #{} {}\n\n", e.rank, e.name));
        if !e.fit_reason.is_empty() {
            out.push_str(&format!("**Thesis fit:** {}\n\n", e.fit_reason));
        }

        let Some(a) = assessments.iter().find(|a| a.id == e.assessment_id) else {
            out.push_str(&format!("{}\n\n", e.summary));
            continue;
        };
        let risk = &a.risk;

        out.push_str(&format!(
            "- Success probability: **{:.1}%**\n- Competition difficulty: {:.1}%\n- Technical score: {:.0}/100\n- Market score: {:.0}/100\n",
            risk.success_probability,
            risk.competition_difficulty,
            a.technical.technical_score,
            a.market.market_score
        ));
        if let Some(margin) = &risk.profit_margin {
            out.push_str(&format!("- Profit margin: {}\n", margin));
        }
        if let Some(projection) = projection_line(&risk.revenue_projection) {
            out.push_str(&format!("- Revenue projection: {}\n", projection));
        }
        out.push('\n');

        out.push_str("### Risk heatmap\n\n");
        for (dimension, level) in risk.heatmap.iter() {
            out.push_str(&format!("- {}: {} {}\n", dimension, marker(level), level.as_str()));
        }
        out.push('\n');

        if !risk.key_points.is_empty() {
            out.push_str("### Key points\n\n");
            for (i, point) in risk.key_points.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, point));
            }
            out.push('\n');
        }

        out.push_str("### Summary\n\n");
        out.push_str(&risk.summary);
        out.push_str("\n\n");
        if let Some(detail) = &risk.detailed_analysis {
            out.push_str(detail);
            out.push_str("\n\n");
        }
    }

    out.into_bytes()
}

fn marker(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Green => "🟢",
        RiskLevel::Yellow => "🟡",
        RiskLevel::Red => "🔴",
    }
}

fn projection_line(p: &RevenueProjection) -> Option<String> {
    let years: Vec<String> = [p.year1, p.year2, p.year3]
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| format!("Y{} {}", i + 1, compact_amount(v))))
        .collect();
    if years.is_empty() {
        return None;
    }
    Some(format!("{} ({})", years.join(", "), p.currency))
}

fn compact_amount(v: f64) -> String {
    match v.abs() {
        a if a >= 1e9 => format!("{:.1}B", v / 1e9),
        a if a >= 1e6 => format!("{:.1}M", v / 1e6),
        a if a >= 1e3 => format!("{:.0}k", v / 1e3),
        _ => format!("{:.0}", v),
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
