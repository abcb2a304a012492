//! Tolerant reading of oracle output: find the JSON array in a completion and
//! validate its items one by one.

use crate::extract::{IssueCategory, MAX_SAMPLES};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayParse {
    Parsed(Vec<Value>),
    Failure(String),
}

impl ArrayParse {
    pub fn is_failure(&self) -> bool {
        matches!(self, ArrayParse::Failure(_))
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ArrayParse::Parsed(items) => items,
            ArrayParse::Failure(_) => Vec::new(),
        }
    }
}

/// Strips code fences, keeps the span between the first `[` and the last `]`
/// and parses it as a JSON array.
pub fn extract_json_array(text: &str) -> ArrayParse {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = s.trim_matches('`');
        // drop a language hint such as `json`
        if let Some((_, rest)) = s.split_once('\n') {
            s = rest;
        }
    }
    if let (Some(start), Some(end)) = (s.find('['), s.rfind(']')) {
        if end > start {
            s = &s[start..=end];
        }
    }
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Array(items)) => ArrayParse::Parsed(items),
        Ok(other) => ArrayParse::Failure(format!("expected a JSON array, got {}", value_kind(&other))),
        Err(e) => ArrayParse::Failure(e.to_string()),
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAnObject,
    MissingCategory,
    BadOccurrences,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotAnObject => "item is not an object",
            SkipReason::MissingCategory => "missing category",
            SkipReason::BadOccurrences => "occurrences is not an integer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Valid(IssueCategory),
    Skipped(SkipReason),
}

/// What happened to each item of one or more oracle responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidityReport {
    pub responses: usize,
    pub unparseable_responses: usize,
    pub items: usize,
    pub valid: usize,
    pub skipped: Vec<SkipReason>,
}

impl ValidityReport {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.items += 1;
        match outcome {
            ItemOutcome::Valid(_) => self.valid += 1,
            ItemOutcome::Skipped(reason) => self.skipped.push(*reason),
        }
    }

    pub fn record_response(&mut self, parse: &ArrayParse) {
        self.responses += 1;
        if parse.is_failure() {
            self.unparseable_responses += 1;
        }
    }

    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|r| **r == reason).count()
    }

    pub fn merge(&mut self, other: &ValidityReport) {
        self.responses += other.responses;
        self.unparseable_responses += other.unparseable_responses;
        self.items += other.items;
        self.valid += other.valid;
        self.skipped.extend(other.skipped.iter().copied());
    }
}

/// Validates one item of an issue array. `category` may also be given as `issue`.
pub fn validate_item(item: &Value) -> ItemOutcome {
    let Some(obj) = item.as_object() else {
        return ItemOutcome::Skipped(SkipReason::NotAnObject);
    };
    let Some(category) = category_of(obj) else {
        return ItemOutcome::Skipped(SkipReason::MissingCategory);
    };
    let occurrences = match obj.get("occurrences") {
        None => 0,
        Some(v) => match occurrences_of(v) {
            Some(n) => n,
            None => return ItemOutcome::Skipped(SkipReason::BadOccurrences),
        },
    };
    let last_seen = obj
        .get("last_seen")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let mut samples: Vec<String> = Vec::new();
    if let Some(Value::Array(arr)) = obj.get("samples") {
        for s in arr.iter().filter_map(Value::as_str) {
            if !s.is_empty() && !samples.iter().any(|x| x == s) {
                samples.push(s.to_string());
            }
        }
    }
    samples.truncate(MAX_SAMPLES);
    ItemOutcome::Valid(IssueCategory { category, occurrences, last_seen, samples })
}

/// Validates every item, keeping the valid ones in order.
pub fn validate_items(items: &[Value], report: &mut ValidityReport) -> Vec<IssueCategory> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let outcome = validate_item(item);
        report.record(&outcome);
        if let ItemOutcome::Valid(issue) = outcome {
            out.push(issue);
        }
    }
    out
}

fn category_of(obj: &Map<String, Value>) -> Option<String> {
    ["category", "issue"].iter().find_map(|key| {
        let text = match obj.get(*key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() { None } else { Some(text) }
    })
}

/// Integer reading of an occurrence count. Negative counts clamp to zero,
/// fractional ones truncate.
fn occurrences_of(v: &Value) -> Option<u64> {
    let n: i64 = match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(u) = n.as_u64() {
                return Some(u);
            } else {
                let f = n.as_f64()?;
                if !f.is_finite() {
                    return None;
                }
                f.trunc() as i64
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };
    Some(n.max(0) as u64)
}
