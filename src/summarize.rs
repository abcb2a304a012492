//! The per-file pipeline: chunk, extract, aggregate, consolidate, render.

use crate::aggregate::{Aggregator, FinalIssue};
use crate::chunker::{chunk_text, DEFAULT_CHUNK_CHARS};
use crate::consolidate::{ConsolidationOutcome, Consolidator};
use crate::extract::IssueExtractor;
use crate::oracle::{Oracle, OracleError};
use crate::render::{render_text, sort_issues, NO_CONTENT, NO_ISSUES};
use crate::response::ValidityReport;
use crate::retry::{Sleeper, ThreadSleeper};
use std::time::Duration;
use tracing::info;

/// Pause between chunk extraction calls.
pub const CHUNK_PACING: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub chunk_chars: usize,
    pub chunk_pacing: Duration,
    pub consolidate: bool,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self { chunk_chars: DEFAULT_CHUNK_CHARS, chunk_pacing: CHUNK_PACING, consolidate: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// The transcript was empty or whitespace only.
    NoContent,
    NoIssues,
    /// Final issues, already sorted.
    Issues(Vec<FinalIssue>),
}

impl Summary {
    pub fn to_text(&self) -> String {
        match self {
            Summary::NoContent => NO_CONTENT.to_string(),
            Summary::NoIssues => NO_ISSUES.to_string(),
            Summary::Issues(issues) => render_text(issues),
        }
    }

    pub fn issues(&self) -> &[FinalIssue] {
        match self {
            Summary::Issues(issues) => issues,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub summary: Summary,
    pub chunks: usize,
    /// Extraction and consolidation validity, merged.
    pub validity: ValidityReport,
    /// `None` when consolidation was disabled or there was nothing to consolidate.
    pub consolidation: Option<ConsolidationOutcome>,
}

pub struct Summarizer<O, S = ThreadSleeper> {
    oracle: O,
    sleeper: S,
    options: SummarizeOptions,
}

impl<O: Oracle> Summarizer<O, ThreadSleeper> {
    pub fn new(oracle: O, options: SummarizeOptions) -> Self {
        Self::with_sleeper(oracle, options, ThreadSleeper)
    }
}

impl<O: Oracle, S: Sleeper> Summarizer<O, S> {
    pub fn with_sleeper(oracle: O, options: SummarizeOptions, sleeper: S) -> Self {
        Self { oracle, sleeper, options }
    }

    pub fn options(&self) -> &SummarizeOptions {
        &self.options
    }

    /// Runs the whole pipeline over one transcript. Only a transport failure
    /// during extraction is returned as an error.
    pub fn summarize(&self, content: &str) -> Result<SummaryReport, OracleError> {
        if content.trim().is_empty() {
            return Ok(SummaryReport {
                summary: Summary::NoContent,
                chunks: 0,
                validity: ValidityReport::default(),
                consolidation: None,
            });
        }

        let chunks = chunk_text(content, self.options.chunk_chars);
        let total = chunks.len();
        let extractor = IssueExtractor::new(&self.oracle);
        let mut validity = ValidityReport::default();
        let mut agg = Aggregator::new();

        for (i, chunk) in chunks.iter().enumerate() {
            info!(chunk = i + 1, of = total, chars = chunk.chars().count(), "processing chunk");
            let extraction = extractor.extract(chunk)?;
            validity.merge(&extraction.report);
            agg.ingest(&extraction.issues);
            if i + 1 < total && !self.options.chunk_pacing.is_zero() {
                self.sleeper.sleep(self.options.chunk_pacing);
            }
        }

        if agg.is_empty() {
            return Ok(SummaryReport { summary: Summary::NoIssues, chunks: total, validity, consolidation: None });
        }

        let merged = agg.into_issues();
        let (mut issues, consolidation) = if self.options.consolidate {
            let result = Consolidator::new(&self.oracle).consolidate_with_report(&merged);
            validity.merge(&result.report);
            (result.issues, Some(result.outcome))
        } else {
            (merged, None)
        };
        sort_issues(&mut issues);
        info!(chunks = total, categories = issues.len(), "summary ready");

        Ok(SummaryReport { summary: Summary::Issues(issues), chunks: total, validity, consolidation })
    }

    pub fn summarize_text(&self, content: &str) -> Result<String, OracleError> {
        Ok(self.summarize(content)?.summary.to_text())
    }
}
