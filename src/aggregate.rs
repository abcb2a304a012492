use crate::extract::{IssueCategory, MAX_SAMPLES};
use crate::timestamp::{display_raw, format_display, parse_timestamp, to_iso, UNKNOWN};
use ahash::AHashMap;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Canonical accumulator for one category across chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedIssue {
    pub category: String,
    pub occurrences: u64,
    pub last_seen: Option<DateTime<FixedOffset>>,
    /// Latest `last_seen` text that did not parse; shown only when
    /// `last_seen` is `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_raw: Option<String>,
    pub samples: Vec<String>,
}

/// Output of consolidation; same shape as the aggregate it came from.
pub type FinalIssue = AggregatedIssue;

pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

impl AggregatedIssue {
    pub fn new(category: &str) -> Self {
        Self { category: category.trim().to_string(), occurrences: 0, last_seen: None, last_seen_raw: None, samples: Vec::new() }
    }

    pub fn key(&self) -> String {
        normalize_category(&self.category)
    }

    pub fn last_seen_iso(&self) -> Option<String> {
        self.last_seen.as_ref().map(to_iso)
    }

    /// Human form of `last_seen`, the unparsed text as-is, or `Unknown`.
    pub fn last_seen_display(&self) -> String {
        match (&self.last_seen, &self.last_seen_raw) {
            (Some(ts), _) => format_display(ts),
            (None, Some(raw)) => display_raw(raw),
            (None, None) => UNKNOWN.to_string(),
        }
    }

    /// Appends a sample unless already present; only the newest three are kept.
    pub fn push_sample(&mut self, sample: &str) {
        if sample.is_empty() || self.samples.iter().any(|s| s == sample) {
            return;
        }
        self.samples.push(sample.to_string());
        if self.samples.len() > MAX_SAMPLES {
            let excess = self.samples.len() - MAX_SAMPLES;
            self.samples.drain(..excess);
        }
    }

    pub fn observe(&mut self, ts: DateTime<FixedOffset>) {
        if self.last_seen.map_or(true, |cur| ts > cur) {
            self.last_seen = Some(ts);
        }
    }

    pub fn absorb(&mut self, item: &IssueCategory) {
        self.occurrences = self.occurrences.saturating_add(item.occurrences);
        for s in &item.samples {
            self.push_sample(s);
        }
        if let Some(raw) = item.last_seen.as_deref() {
            match parse_timestamp(raw) {
                Some(ts) => self.observe(ts),
                None => self.last_seen_raw = Some(raw.to_string()),
            }
        }
    }

    pub fn absorb_issue(&mut self, other: &AggregatedIssue) {
        self.occurrences = self.occurrences.saturating_add(other.occurrences);
        for s in &other.samples {
            self.push_sample(s);
        }
        if let Some(ts) = other.last_seen {
            self.observe(ts);
        }
        if let Some(raw) = &other.last_seen_raw {
            self.last_seen_raw = Some(raw.clone());
        }
    }
}

/// Merges per-chunk results under `normalize_category` keys, remembering the
/// order in which categories were first seen.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    issues: Vec<AggregatedIssue>,
    index: AHashMap<String, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, category: &str) -> &mut AggregatedIssue {
        let key = normalize_category(category);
        let idx = match self.index.get(&key).copied() {
            Some(i) => i,
            None => {
                self.issues.push(AggregatedIssue::new(category));
                self.index.insert(key, self.issues.len() - 1);
                self.issues.len() - 1
            }
        };
        &mut self.issues[idx]
    }

    pub fn ingest_one(&mut self, item: &IssueCategory) {
        if normalize_category(&item.category).is_empty() {
            return;
        }
        self.slot(&item.category).absorb(item);
    }

    pub fn ingest(&mut self, items: &[IssueCategory]) {
        for item in items {
            self.ingest_one(item);
        }
    }

    pub fn ingest_issue(&mut self, issue: &AggregatedIssue) {
        if issue.key().is_empty() {
            return;
        }
        self.slot(&issue.category).absorb_issue(issue);
    }

    pub fn get(&self, category: &str) -> Option<&AggregatedIssue> {
        self.index.get(&normalize_category(category)).map(|&i| &self.issues[i])
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[AggregatedIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<AggregatedIssue> {
        self.issues
    }
}

pub fn aggregate(chunk_results: &[Vec<IssueCategory>]) -> Aggregator {
    let mut agg = Aggregator::new();
    for items in chunk_results {
        agg.ingest(items);
    }
    agg
}

/// Re-keys a list of issues so every normalized category appears once.
pub fn dedupe_issues(issues: &[AggregatedIssue]) -> Vec<AggregatedIssue> {
    let mut agg = Aggregator::new();
    for issue in issues {
        agg.ingest_issue(issue);
    }
    agg.into_issues()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, occ: u64, last_seen: Option<&str>, samples: &[&str]) -> IssueCategory {
        IssueCategory {
            category: category.to_string(),
            occurrences: occ,
            last_seen: last_seen.map(str::to_string),
            samples: samples.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn keys_are_case_and_space_insensitive() {
        let mut agg = Aggregator::new();
        agg.ingest(&[item("Refund request", 1, None, &[]), item("  refund REQUEST ", 2, None, &[])]);
        assert_eq!(agg.len(), 1);
        let issue = agg.get("REFUND request").unwrap();
        assert_eq!(issue.occurrences, 3);
        assert_eq!(issue.category, "Refund request");
    }

    #[test]
    fn samples_keep_newest_three_distinct() {
        let mut issue = AggregatedIssue::new("x");
        for s in ["a", "b", "a", "c", "d"] {
            issue.push_sample(s);
        }
        assert_eq!(issue.samples, vec!["b", "c", "d"]);
        // an evicted sample may come back as the newest
        issue.push_sample("a");
        assert_eq!(issue.samples, vec!["c", "d", "a"]);
    }

    #[test]
    fn last_seen_compares_chronologically() {
        let mut agg = Aggregator::new();
        agg.ingest(&[
            item("x", 1, Some("2025-09-26T12:00:00+02:00"), &[]),
            item("x", 1, Some("2025-09-26T10:30:00+00:00"), &[]),
            item("x", 1, Some("not a time"), &[]),
        ]);
        let issue = agg.get("x").unwrap();
        // 10:30Z is later than 12:00+02:00 (10:00Z) even though it sorts lower as text
        assert_eq!(issue.last_seen_iso().as_deref(), Some("2025-09-26T10:30:00+00:00"));
        assert_eq!(issue.last_seen_display(), "Sep 26, 2025 10:30 AM");
    }

    #[test]
    fn unparsed_last_seen_is_shown_as_is() {
        let mut agg = Aggregator::new();
        agg.ingest(&[item("x", 1, Some("26/09/2025 10:00"), &[]), item("y", 1, None, &[])]);
        let x = agg.get("x").unwrap();
        assert_eq!(x.last_seen, None);
        assert_eq!(x.last_seen_display(), "26/09/2025 10:00");
        assert_eq!(agg.get("y").unwrap().last_seen_display(), "Unknown");

        let mut merged = Aggregator::new();
        merged.ingest_issue(x);
        assert_eq!(merged.get("x").unwrap().last_seen_raw.as_deref(), Some("26/09/2025 10:00"));
    }
}
