//! Formatted terminal output.
//!
//! Formatting lives here so the fitting and estimation code stays free of
//! presentation details.

use crate::domain::RowError;
use crate::estimate::{DensityEstimate, Estimate, Estimates};
use crate::fit::{CandidateRow, SkippedCandidate};
use crate::report::{ChosenModel, DatasetSummary, Report};

/// Row errors listed before the rest are summarised by count.
const MAX_LISTED_ROW_ERRORS: usize = 10;

/// Full analysis report for the terminal.
pub fn format_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format_dataset(&report.dataset));
    out.push('\n');
    out.push_str("Detection function candidates:\n");
    out.push_str(&format_aic_table(&report.candidates, &report.skipped));
    out.push('\n');
    out.push_str(&format_chosen(&report.chosen));
    out.push('\n');
    out.push_str(&format_estimates(&report.estimates));
    out
}

pub fn format_dataset(d: &DatasetSummary) -> String {
    let mut out = String::new();
    out.push_str("=== dsurvey - line transect distance sampling ===\n");
    out.push_str(&format!("Input: {}\n", d.input));
    out.push_str(&format!(
        "Rows: read={} used={} rejected={} | detections={} | transects={}\n",
        d.rows_read,
        d.rows_used,
        d.row_errors.len(),
        d.detections,
        d.transects
    ));
    out.push_str(&format!(
        "Effort: L={:.3} ({}) | Region: {} (A={})\n",
        d.total_effort,
        d.visits.map_or_else(|| "unscaled".to_string(), |v| format!("{v} visits")),
        d.region_label,
        d.area
    ));
    if let Some((lo, hi)) = d.distance_range {
        out.push_str(&format!("Perpendicular distance: [{lo:.2}, {hi:.2}]\n"));
    }
    if !d.row_errors.is_empty() {
        out.push_str(&format_row_errors(&d.row_errors));
    }
    out
}

pub fn format_row_errors(errors: &[RowError]) -> String {
    let mut out = String::from("Rejected rows:\n");
    for e in errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        match &e.sample {
            Some(sample) => out.push_str(&format!("  line {:>5} [{}] {}\n", e.line, truncate(sample, 16), e.message)),
            None => out.push_str(&format!("  line {:>5} {}\n", e.line, e.message)),
        }
    }
    if errors.len() > MAX_LISTED_ROW_ERRORS {
        out.push_str(&format!("  ... and {} more\n", errors.len() - MAX_LISTED_ROW_ERRORS));
    }
    out
}

/// AIC comparison table; the chosen model is marked with `*`.
pub fn format_aic_table(rows: &[CandidateRow], skipped: &[SkippedCandidate]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "  {:<28} {:>3} {:>12} {:>10} {:>8} {:>8} {:>8} {:>8}",
            "model", "k", "lnL", "AIC", "dAIC", "P_a", "se(P_a)", "GOF p"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "  {:-<28} {:-<3} {:-<12} {:-<10} {:-<8} {:-<8} {:-<8} {:-<8}",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let chosen = if r.chosen { "*" } else { " " };
        out.push_str(
            format!(
                "{chosen} {:<28} {:>3} {:>12.3} {:>10.3} {:>8.3} {:>8.4} {:>8} {:>8}",
                truncate(&r.label, 28),
                r.k,
                r.log_likelihood,
                r.aic,
                r.delta_aic,
                r.p_a,
                fmt_opt(r.p_a_se, 4),
                fmt_opt(r.gof_p, 3),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    for s in skipped {
        out.push_str(&format!("  (no viable model: {}) {}\n", s.key.display_name(), s.reason));
    }
    out
}

pub fn format_chosen(m: &ChosenModel) -> String {
    let mut out = String::from("Chosen model:\n");
    out.push_str(&format!("- {} (w={}, n={}, {} beyond w)\n", m.label, m.truncation, m.n, m.truncated));
    if let Some(sigma) = m.scale {
        out.push_str(&format!("- sigma: {sigma:.4}\n"));
    }
    if let Some(b) = m.shape {
        out.push_str(&format!("- shape: {b:.4}\n"));
    }
    if !m.adjustment_orders.is_empty() {
        let key_len = m.key.key_param_len().min(m.params.len());
        out.push_str(&format!("- cosine coefficients: {}\n", fmt_vec(&m.params[key_len..])));
    }
    out.push_str(&format!(
        "- ESW: {:.4} (se {}) | P_a: {:.4} (se {})\n",
        m.esw,
        fmt_opt(m.esw_se, 4),
        m.p_a,
        fmt_opt(m.p_a_se, 4)
    ));
    out.push_str(&format!(
        "- GOF: chi2={:.3} df={} p={}\n",
        m.gof.chi_square,
        m.gof.df,
        fmt_opt(m.gof.p_value, 4)
    ));
    out
}

pub fn format_estimates(e: &Estimates) -> String {
    let pct = e.confidence_level * 100.0;
    let mut out = format!("Estimates ({pct:.0}% log-normal CI):\n");
    out.push_str(
        format!(
            "  {:<24} {:>12} {:>10} {:>7} {:>12} {:>12} {:>7}",
            "quantity", "estimate", "se", "cv", "lcl", "ucl", "df"
        )
        .trim_end(),
    );
    out.push('\n');

    let mut line = |name: &str, est: &Estimate| {
        out.push_str(
            format!(
                "  {:<24} {:>12.4} {:>10.4} {:>7.3} {:>12.4} {:>12.4} {:>7}",
                name,
                est.value,
                est.se,
                est.cv,
                est.lcl,
                est.ucl,
                fmt_opt(est.df, 1)
            )
            .trim_end(),
        );
        out.push('\n');
    };
    line("encounter rate (n/L)", &e.encounter_rate);
    line("ESW", &e.esw);
    line("P_a", &e.p_a);
    line("mean cluster size", &e.mean_cluster_size);

    let mut pair = |label: &str, d: &DensityEstimate| {
        line(&format!("D ({label})"), &d.density);
        line(&format!("N ({label})"), &d.abundance);
    };
    pair("clusters", &e.clusters);
    pair("individuals", &e.individuals);

    out.push_str(&format!(
        "  region {} | A={} | n={} | K={} | L={:.3}\n",
        e.region_label, e.area, e.detections, e.transects, e.effort
    ));
    out
}

/// Tab-separated AIC table for scripting (`rank`).
pub fn format_rank_tsv(rows: &[CandidateRow]) -> String {
    let mut out = String::from("model\tk\tlnL\tAIC\tdAIC\tP_a\tchosen\n");
    for r in rows {
        out.push_str(&format!(
            "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}\n",
            r.label, r.k, r.log_likelihood, r.aic, r.delta_aic, r.p_a, r.chosen
        ));
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.decimals$}"))
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
