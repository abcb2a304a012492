use crate::aggregate::FinalIssue;
use crate::extract::MAX_SAMPLES;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;

pub const HEADER: &str = "Unique Issues";
pub const NO_ISSUES: &str = "Unique Issues\n- No issues detected.";
pub const NO_CONTENT: &str = "No content found in the log file.";

const CATEGORY_PREFIX: &str = "- Category:";

static OCCURRENCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"Occurrences:\s*(\d+)").expect("occurrences regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex"));
static DASH_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\s*)-\s+").expect("bullet regex"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank line regex"));

/// Final ordering: occurrences descending, then latest `last_seen` first
/// (missing timestamps last), then category text.
pub fn compare_issues(a: &FinalIssue, b: &FinalIssue) -> Ordering {
    b.occurrences
        .cmp(&a.occurrences)
        .then_with(|| b.last_seen.cmp(&a.last_seen))
        .then_with(|| a.category.cmp(&b.category))
}

pub fn sort_issues(issues: &mut [FinalIssue]) {
    issues.sort_by(compare_issues);
}

fn single_line(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Plain-text summary. Deterministic for a given set of issues.
pub fn render_text(issues: &[FinalIssue]) -> String {
    if issues.is_empty() {
        return NO_ISSUES.to_string();
    }
    let mut sorted = issues.to_vec();
    sort_issues(&mut sorted);

    let mut lines = vec![HEADER.to_string()];
    for it in &sorted {
        let last = it.last_seen_display();
        lines.push(format!("{CATEGORY_PREFIX} {}", single_line(&it.category)));
        lines.push(format!("  - Occurrences: {}", it.occurrences));
        lines.push(format!("  - Last Occurrence: {last}"));
        if !it.samples.is_empty() {
            lines.push("  - Sample Messages:".to_string());
            for sample in it.samples.iter().take(MAX_SAMPLES) {
                lines.push(format!("    • {}", single_line(sample)));
            }
        }
    }
    lines.join("\n").trim().to_string()
}

/// One category as read back from rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedEntry {
    pub category: String,
    pub occurrences: u64,
    pub last_seen: String,
    pub samples: Vec<String>,
}

/// Reads the `Unique Issues` text form back into entries. Anything that is
/// not part of a category block is ignored.
pub fn parse_rendered(text: &str) -> Vec<RenderedEntry> {
    let mut items = Vec::new();
    let mut cur: Option<RenderedEntry> = None;
    let mut in_samples = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(CATEGORY_PREFIX) {
            if let Some(done) = cur.take() {
                items.push(done);
            }
            cur = Some(RenderedEntry { category: rest.trim().to_string(), ..Default::default() });
            in_samples = false;
            continue;
        }
        let Some(entry) = cur.as_mut() else { continue };
        if in_samples && line.starts_with('•') {
            let sample = line.trim_start_matches(|c: char| c == '•' || c == ' ').trim();
            if !sample.is_empty() {
                entry.samples.push(sample.to_string());
            }
        } else if line.contains("Occurrences:") {
            if let Some(n) = OCCURRENCES.captures(line).and_then(|c| c[1].parse::<u64>().ok()) {
                entry.occurrences = n;
            }
            in_samples = false;
        } else if line.contains("Last Occurrence:") {
            entry.last_seen = line.split_once(':').map(|(_, ts)| ts.trim().to_string()).unwrap_or_default();
            in_samples = false;
        } else if line.contains("Sample Messages:") {
            in_samples = true;
        }
    }
    if let Some(done) = cur {
        items.push(done);
    }
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn for_occurrences(occurrences: u64) -> Self {
        if occurrences >= 10 {
            Severity::High
        } else if occurrences >= 3 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Severity::High => ":red_circle:",
            Severity::Medium => ":large_orange_circle:",
            Severity::Low => ":large_blue_circle:",
        }
    }
}

/// Markdown-ish text to chat mrkdwn: `**bold**` becomes `*bold*`, leading
/// dashes become bullets, runs of blank lines collapse.
pub fn slackify(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = BOLD.replace_all(&s, "*$1*");
    let s = DASH_BULLET.replace_all(&s, "${1}• ");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    s.trim().to_string()
}
