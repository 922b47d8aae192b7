//! Human-readable run messages (Slack mrkdwn)

use std::fmt::Write;

use chrono::{DateTime, Utc};
use hrline_core::{JobStatus, RunReport, fmt_num};

fn fmt_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Start-of-run message
pub fn render_start(pipeline: &str, resources: &[&str], started_at: &str) -> String {
    format!(
        "*Pipeline {pipeline} started*\n\n*Sources*: {}\n\n*Started at*: {started_at}",
        resources.join(" - ")
    )
}

/// End-of-run message: run header, one line per resource, then the
/// exception when the run was aborted.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    if report.exception.is_none() {
        out.push_str("*INGESTION INFORMATION*\n\n");
    }

    let meta = &report.meta;
    // write! into a String cannot fail
    let _ = writeln!(out, "*Pipeline -> {}*", meta.pipeline);
    let _ = writeln!(out, "- *Destination*: {}", meta.destination);
    let _ = writeln!(out, "- *Dataset*: {}", meta.dataset);
    let _ = writeln!(out, "- *Started at*: {}", fmt_time(&report.started_at));
    let _ = writeln!(out, "- *Finished at*: {}", fmt_time(&report.finished_at));

    let _ = write!(out, "\n*Job information ({} tables)*\n\n", report.outcomes.len());
    let lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| match o.status {
            JobStatus::Success => format!(
                "- *Success* for table `{}` ({} records)",
                o.resource,
                fmt_num(o.records)
            ),
            JobStatus::Failed => format!(
                "- *Failed* for table `{}`: {}",
                o.resource,
                o.detail.as_deref().unwrap_or("unknown error")
            ),
        })
        .collect();
    out.push_str(&lines.join("\n"));

    if let Some(exc) = &report.exception {
        let _ = write!(out, "\n\n*Exception found*: {exc}");
    }
    out
}
