//! Display logic for the expiry-check CLI.
//!
//! Colored result lines, NDJSON lines, the verbose header, and the final
//! summary. Uses only the `console` crate for styling.

use console::{pad_str, style, Alignment, Style};
use expiry_check_lib::{CheckMode, DispatchSummary, ExpiryCheckError, ProbeResult, StopReason};
use std::collections::BTreeMap;
use std::time::Duration;

/// Days below which an expiry is shown as a warning.
pub const WARN_DAYS: i64 = 30;

const DOMAIN_WIDTH: usize = 30;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a verbose run.
pub fn print_header(mode: CheckMode, threads: usize, source: &str) {
    println!(
        "{} {} {}",
        style("expiry-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!("- {} expiry for domains in {}", mode, source)).dim(),
    );
    println!("{}", style(format!("Threads: {}", threads)).dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Color for a day count: red once expired, yellow when close, green otherwise.
pub fn days_style(days: i64) -> Style {
    if days < 0 {
        Style::new().red().bold()
    } else if days < WARN_DAYS {
        Style::new().yellow().bold()
    } else {
        Style::new().green()
    }
}

/// Human wording for a day count.
pub fn describe_days(days: i64) -> String {
    match days {
        0 => "expires today".to_string(),
        1 => "1 day left".to_string(),
        -1 => "expired 1 day ago".to_string(),
        d if d < 0 => format!("expired {} days ago", -d),
        d => format!("{} days left", d),
    }
}

/// Format one result as a colored line.
pub fn format_result(result: &ProbeResult) -> String {
    let padded_domain = pad_str(&result.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));

    if let Some(days) = result.outcome.days_remaining() {
        return format!(
            "  {}  {}",
            style(&padded_domain).white(),
            days_style(days).apply_to(describe_days(days)),
        );
    }

    let reason = result
        .outcome
        .error()
        .map(brief_error)
        .unwrap_or_else(|| "(unknown)".to_string());
    format!(
        "  {}  {}  {}",
        style(&padded_domain).white(),
        style("FAILED").red(),
        style(reason).dim(),
    )
}

/// Print a single result, plus timing when debugging.
pub fn print_result(result: &ProbeResult, debug: bool) {
    println!("{}", format_result(result));

    if debug {
        if let Some(duration) = result.check_duration {
            println!(
                "    {} Checked in {}ms ({})",
                style("└─").dim(),
                duration.as_millis(),
                result.mode,
            );
        }
    }
}

/// One result as a single JSON object (one line of NDJSON).
pub fn format_json(result: &ProbeResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(result)
}

// ── Run statistics ───────────────────────────────────────────────────────────

/// Counters collected while results stream in.
#[derive(Debug, Default)]
pub struct RunStats {
    pub healthy: usize,
    pub expiring: usize,
    pub expired: usize,
    /// Failed domains grouped by error kind
    pub failures: BTreeMap<&'static str, Vec<String>>,
}

impl RunStats {
    pub fn record(&mut self, result: &ProbeResult) {
        match (result.outcome.days_remaining(), result.outcome.error()) {
            (Some(days), _) if days < 0 => self.expired += 1,
            (Some(days), _) if days < WARN_DAYS => self.expiring += 1,
            (Some(_), _) => self.healthy += 1,
            (None, Some(error)) => self
                .failures
                .entry(error.kind())
                .or_default()
                .push(result.domain.clone()),
            (None, None) => {}
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }

    pub fn total(&self) -> usize {
        self.healthy + self.expiring + self.expired + self.failed()
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(stats: &RunStats, summary: &DispatchSummary, duration: Duration) {
    println!();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}  {}  {}",
        style(stats.total()).bold(),
        if stats.total() == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} ok", stats.healthy)).green(),
        style("|").dim(),
        style(format!("{} expiring", stats.expiring)).yellow(),
        style("|").dim(),
        style(format!("{} expired", stats.expired)).red(),
        style("|").dim(),
        style(format!("{} failed", stats.failed())).dim(),
    );

    for (kind, domains) in &stats.failures {
        println!(
            "  {} {} {}: {}",
            style("•").dim(),
            domains.len(),
            kind.replace('_', " "),
            format_list(domains, 5),
        );
    }

    if let Some(note) = describe_stop(&summary.stop_reason) {
        println!("  {} {}", style("•").dim(), style(note).yellow());
    }
    if !summary.skipped.is_empty() {
        println!(
            "  {} {} input line{} skipped",
            style("•").dim(),
            summary.skipped.len(),
            if summary.skipped.len() == 1 { "" } else { "s" },
        );
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Explain an early stop of input consumption, if there was one.
pub fn describe_stop(reason: &StopReason) -> Option<String> {
    match reason {
        StopReason::EndOfInput => None,
        StopReason::BlankLine { line } => {
            Some(format!("Stopped at blank line {}; later lines not checked", line))
        }
        StopReason::MalformedEntry { line, entry } => Some(format!(
            "Stopped at invalid domain '{}' on line {}; later lines not checked",
            entry, line
        )),
        StopReason::ReadError { line, message } => {
            Some(format!("Stopped reading at line {}: {}", line, message))
        }
    }
}

fn format_list(domains: &[String], max_show: usize) -> String {
    if domains.len() <= max_show {
        domains.join(", ")
    } else {
        let shown = &domains[..max_show];
        let remaining = domains.len() - max_show;
        format!("{}, ... and {} more", shown.join(", "), remaining)
    }
}

/// Short reason shown next to a failed domain.
fn brief_error(error: &ExpiryCheckError) -> String {
    match error {
        ExpiryCheckError::NotRegistered { .. } => "(not registered)".to_string(),
        ExpiryCheckError::LookupError { message, .. }
        | ExpiryCheckError::ConnectionError { message, .. } => format!("({})", message),
        other => format!("({})", other),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
