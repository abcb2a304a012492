use crate::oracle::{Oracle, OracleError};
use crate::response::{extract_json_array, validate_items, ArrayParse, ValidityReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MAX_SAMPLES: usize = 3;

pub const EXTRACTION_SYSTEM_PROMPT: &str = concat!(
    "You are a precise support issue extractor. Input is a portion of a group chat log, ",
    "where each line looks like: [ISO_TIMESTAMP] Sender: Message. ",
    "Your job is to detect DISTINCT customer support issues mentioned in THIS CHUNK ONLY. ",
    "Output requirements: ",
    "- Categories must be SHORT, CANONICAL, and ACTION/OUTCOME-ORIENTED. ",
    "- Use clear names like: 'Funds not reflected', 'Bill upload failure', 'Payment not processing', ",
    "'Loan disbursement delay', 'Refund request'. ",
    "- Merge near-duplicates within the chunk into one category. ",
    "- Avoid vague or emotional labels (e.g., 'customer angry', 'complaints', 'disturbance'). ",
    "Always map to a concrete support issue. ",
    "- For each category, return: category (string), occurrences (int), last_seen (ISO 8601 timestamp string), ",
    "samples (array of 1-3 example messages from the log). ",
    "- last_seen must be the exact ISO timestamp from the log (e.g., '2025-09-26T19:14:45.987000+00:00'). ",
    "- samples should contain 1-3 representative message texts that demonstrate this issue category. ",
    "Keep them brief but informative. ",
    "- If no valid issues, return an empty array []. ",
    "Respond with ONLY a JSON array. No prose, no code fences."
);

/// One category reported for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCategory {
    pub category: String,
    pub occurrences: u64,
    pub last_seen: Option<String>,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkExtraction {
    pub issues: Vec<IssueCategory>,
    pub report: ValidityReport,
}

pub fn extraction_user_prompt(chunk: &str) -> String {
    format!(
        "Extract distinct issues from this log chunk. Return ONLY JSON array as specified.\n\nCHUNK BEGIN\n{chunk}\nCHUNK END"
    )
}

/// Turns a raw completion into the chunk's categories. Malformed output
/// yields an empty list.
pub fn parse_extraction(completion: &str) -> ChunkExtraction {
    let mut report = ValidityReport::default();
    let parsed = extract_json_array(completion);
    report.record_response(&parsed);
    if let ArrayParse::Failure(reason) = &parsed {
        warn!(%reason, "extraction output is not a JSON array, treating chunk as empty");
    }
    let issues = validate_items(&parsed.into_items(), &mut report);
    ChunkExtraction { issues, report }
}

pub struct IssueExtractor<O> {
    oracle: O,
}

impl<O: Oracle> IssueExtractor<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Extracts categories from one chunk. Only transport failures are
    /// returned as errors; unusable responses degrade to an empty result.
    pub fn extract(&self, chunk: &str) -> Result<ChunkExtraction, OracleError> {
        let completion = match self.oracle.complete(EXTRACTION_SYSTEM_PROMPT, &extraction_user_prompt(chunk)) {
            Ok(text) => text,
            Err(e) if e.is_parse() => {
                warn!(error = %e, "extraction response unusable, treating chunk as empty");
                let report = ValidityReport { responses: 1, unparseable_responses: 1, ..Default::default() };
                return Ok(ChunkExtraction { issues: Vec::new(), report });
            }
            Err(e) => return Err(e),
        };
        let extraction = parse_extraction(&completion);
        debug!(
            categories = extraction.issues.len(),
            skipped = extraction.report.skipped.len(),
            "chunk extracted"
        );
        Ok(extraction)
    }
}
