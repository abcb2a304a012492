use crate::aggregate::{AggregatedIssue, Aggregator, FinalIssue};
use crate::oracle::Oracle;
use crate::response::{extract_json_array, validate_items, ArrayParse, ValidityReport};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const CONSOLIDATION_SYSTEM_PROMPT: &str = concat!(
    "You are a taxonomy expert. Input is a JSON array of issue categories with occurrences, ",
    "last_seen timestamps, and sample messages. ",
    "Your job: CONSOLIDATE them into a SMALL set of clean, canonical categories. ",
    "Instructions: ",
    "- Merge semantically similar or overly specific categories into one. ",
    "- Choose the clearest, action/outcome-oriented label. ",
    "- Sum occurrences across merged items. ",
    "- For last_seen, keep the LATEST timestamp in ISO 8601 format. ",
    "- For samples, combine and select the most representative 2-3 examples from all merged categories. ",
    "- Exclude vague or non-actionable categories (e.g., 'general complaint', 'customer upset'). ",
    "- Aim for clarity, minimal overlap, and no redundancy. ",
    "Output ONLY a JSON array of objects with fields: category (string), occurrences (int), ",
    "last_seen (ISO 8601 string), samples (array of strings). ",
    "No prose, no code fences."
);

#[derive(Debug, Clone, PartialEq)]
pub enum ConsolidationOutcome {
    /// Nothing to consolidate; the oracle was not called.
    Empty,
    Consolidated,
    /// The input came back unchanged for the given reason.
    FellBack(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub issues: Vec<FinalIssue>,
    pub outcome: ConsolidationOutcome,
    pub report: ValidityReport,
}

/// Reads a consolidation completion. Duplicate categories in the answer are
/// merged so every key stays unique.
pub fn parse_consolidation(completion: &str) -> (Vec<FinalIssue>, ValidityReport) {
    collect_consolidation(extract_json_array(completion))
}

fn collect_consolidation(parsed: ArrayParse) -> (Vec<FinalIssue>, ValidityReport) {
    let mut report = ValidityReport::default();
    report.record_response(&parsed);
    let valid = validate_items(&parsed.into_items(), &mut report);
    let mut agg = Aggregator::new();
    agg.ingest(&valid);
    (agg.into_issues(), report)
}

/// The taxonomy as the oracle sees it: one `last_seen` string per category,
/// the raw text when nothing parsed.
fn oracle_input(issues: &[AggregatedIssue]) -> Vec<Value> {
    issues
        .iter()
        .map(|i| {
            json!({
                "category": i.category,
                "occurrences": i.occurrences,
                "last_seen": i.last_seen_iso().or_else(|| i.last_seen_raw.clone()),
                "samples": i.samples,
            })
        })
        .collect()
}

/// Second oracle pass over the aggregated taxonomy. Fails open: any problem
/// returns the input as it was.
pub struct Consolidator<O> {
    oracle: O,
}

impl<O: Oracle> Consolidator<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn consolidate(&self, issues: &[AggregatedIssue]) -> Vec<FinalIssue> {
        self.consolidate_with_report(issues).issues
    }

    pub fn consolidate_with_report(&self, issues: &[AggregatedIssue]) -> Consolidation {
        if issues.is_empty() {
            return Consolidation { issues: Vec::new(), outcome: ConsolidationOutcome::Empty, report: ValidityReport::default() };
        }
        let fallback = |reason: String, report: ValidityReport| {
            warn!(%reason, "consolidation failed, keeping aggregated categories");
            Consolidation { issues: issues.to_vec(), outcome: ConsolidationOutcome::FellBack(reason), report }
        };

        let input = match serde_json::to_string(&oracle_input(issues)) {
            Ok(s) => s,
            Err(e) => return fallback(format!("cannot encode issues: {e}"), ValidityReport::default()),
        };
        let completion = match self.oracle.complete(CONSOLIDATION_SYSTEM_PROMPT, &input) {
            Ok(text) => text,
            Err(e) => return fallback(e.to_string(), ValidityReport::default()),
        };
        let parsed = extract_json_array(&completion);
        if let ArrayParse::Failure(reason) = &parsed {
            let report = ValidityReport { responses: 1, unparseable_responses: 1, ..Default::default() };
            return fallback(format!("output is not a JSON array: {reason}"), report);
        }
        let (merged, report) = collect_consolidation(parsed);
        if merged.is_empty() {
            return fallback("no valid categories in output".to_string(), report);
        }
        info!(before = issues.len(), after = merged.len(), "categories consolidated");
        Consolidation { issues: merged, outcome: ConsolidationOutcome::Consolidated, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_is_validated_and_rekeyed() {
        let (issues, report) = parse_consolidation(
            r#"```json
[{"category":"Refund request","occurrences":2,"last_seen":"26/09/2025 10:00"},
 {"category":"refund request","occurrences":1,"last_seen":"2025-09-26"},
 {"occurrences":4}]
```"#,
        );
        assert_eq!(report.responses, 1);
        assert_eq!(report.valid, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].occurrences, 3);
        assert_eq!(issues[0].last_seen_iso().as_deref(), Some("2025-09-26T00:00:00+00:00"));
        assert_eq!(issues[0].last_seen_raw.as_deref(), Some("26/09/2025 10:00"));
    }

    #[test]
    fn raw_timestamps_reach_the_oracle() {
        let issue = AggregatedIssue { last_seen_raw: Some("26/09/2025 10:00".into()), ..AggregatedIssue::new("Refund") };
        let input = oracle_input(&[issue]);
        assert_eq!(input[0]["last_seen"], "26/09/2025 10:00");
        assert!(input[0].get("last_seen_raw").is_none());
    }

    #[test]
    fn non_array_answer_records_one_unparseable_response() {
        let (issues, report) = parse_consolidation("merged everything, see above");
        assert!(issues.is_empty());
        assert_eq!((report.responses, report.unparseable_responses), (1, 1));
    }
}
