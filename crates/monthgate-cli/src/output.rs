use monthgate_core::{AccessPlan, ReconciliationReport};
use serde::Serialize;
use std::fmt::Write;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns sized to their widest cell, a dashed rule under the
/// header, no trailing whitespace.
fn render_table(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .fold(headers[i].len(), usize::max)
        })
        .collect();

    let mut line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    line(headers.to_vec());
    let rules: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    line(rules.iter().map(String::as_str).collect());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
}

/// Allowed buckets per tier, newest first.
pub fn render_plan(plan: &AccessPlan) -> String {
    let mut out = format!(
        "period {} (channel {})\n\n",
        plan.period,
        plan.period.channel_name()
    );
    let rows: Vec<Vec<String>> = plan
        .tiers
        .iter()
        .map(|t| {
            let allowed: Vec<String> = t.allowed.iter().rev().map(|k| k.channel_name()).collect();
            vec![
                t.name.clone(),
                t.principal.clone(),
                t.window_months.to_string(),
                allowed.join(", "),
            ]
        })
        .collect();
    render_table(&mut out, &["TIER", "ROLE", "WINDOW", "ALLOWED"], &rows);
    out
}

/// Summary line, visibility per tier, then any failed writes.
pub fn render_report(report: &ReconciliationReport) -> String {
    let mut out = format!("{}\n", report.summary());
    if report.ignored > 0 {
        let _ = writeln!(
            out,
            "{} unrelated channel(s) in the category left untouched",
            report.ignored
        );
    }
    out.push('\n');

    let rows: Vec<Vec<String>> = report
        .visible
        .iter()
        .map(|(tier, buckets)| vec![tier.clone(), buckets.join(", ")])
        .collect();
    render_table(&mut out, &["TIER", "VISIBLE"], &rows);

    if !report.failures.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = report
            .failures
            .iter()
            .map(|f| vec![f.bucket.clone(), f.target.to_string(), f.error.clone()])
            .collect();
        render_table(&mut out, &["BUCKET", "TARGET", "ERROR"], &rows);
    }
    out
}
