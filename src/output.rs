//! Filesystem side of a run: where summaries go, what they look like on disk,
//! and which transcripts to pick up when none are named.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const MESSAGES_MARKER: &str = "-messages-";
pub const SUMMARY_SUFFIX: &str = "-summary.txt";

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("group name regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// `{group}-messages-{date}.txt` maps to `{summaries_dir}/{group}-summary.txt`;
/// any other name uses its stem.
pub fn derive_output_path(input: &Path, summaries_dir: &Path) -> PathBuf {
    let name = file_name(input);
    let group = match name.split_once(MESSAGES_MARKER) {
        Some((group, _)) => group.to_string(),
        None => input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or(name),
    };
    summaries_dir.join(format!("{group}{SUMMARY_SUFFIX}"))
}

/// Appends a header and the summary text to `output`, creating parent
/// directories as needed.
pub fn write_summary(
    output: &Path,
    input: &Path,
    summary: &str,
    model: &str,
    generated_at: DateTime<FixedOffset>,
) -> io::Result<()> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(output)?;
    write!(
        f,
        "Summary for: {}\nGenerated at: {}\nModel: {}\n\n=== Summary ===\n\n{}\n",
        file_name(input),
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        model,
        summary.trim()
    )?;
    Ok(())
}

/// Files that already hold a summary: `*.summary*.txt` or `*-summary.txt`.
pub fn is_summary_file(path: &Path) -> bool {
    let name = file_name(path);
    (name.contains(".summary") && name.ends_with(".txt")) || name.ends_with(SUMMARY_SUFFIX)
}

/// Lowercase, drop everything but ASCII letters, digits and whitespace, then
/// join words with `-`.
pub fn sanitize_group_name(group: &str) -> String {
    let lower = group.to_lowercase();
    let kept = NON_ALNUM.replace_all(&lower, "");
    SPACES.replace_all(kept.trim(), "-").into_owned()
}

fn parse_log_name(name: &str) -> Option<(&str, NaiveDate)> {
    if !name.ends_with(".txt") || name.contains("summary") {
        return None;
    }
    let (group, rest) = name.split_once(MESSAGES_MARKER)?;
    let date = NaiveDate::parse_from_str(rest.strip_suffix(".txt")?, "%Y-%m-%d").ok()?;
    Some((group, date))
}

/// Newest `{sanitized-group}-messages-YYYY-MM-DD.txt` in `dir` for each of
/// `groups`, keyed by the group's display name. A missing directory yields an
/// empty map.
pub fn find_most_recent_log_files(dir: &Path, groups: &[String]) -> io::Result<BTreeMap<String, PathBuf>> {
    let mut newest: BTreeMap<String, (NaiveDate, PathBuf)> = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(BTreeMap::new());
    }
    let wanted: Vec<(String, &String)> = groups.iter().map(|g| (sanitize_group_name(g), g)).collect();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((group_part, date)) = parse_log_name(&name) else { continue };
        let Some((_, display)) = wanted.iter().find(|(sanitized, _)| sanitized == group_part) else { continue };
        match newest.get(display.as_str()) {
            Some((seen, _)) if *seen >= date => {}
            _ => {
                newest.insert(display.to_string(), (date, entry.path()));
            }
        }
    }
    Ok(newest.into_iter().map(|(group, (_, path))| (group, path)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_group_names() {
        assert_eq!(sanitize_group_name("Seeds+Customer Support"), "seedscustomer-support");
        assert_eq!(sanitize_group_name("Merchant Acquisition_Paybox"), "merchant-acquisitionpaybox");
        assert_eq!(sanitize_group_name("retail all-stars"), "retail-allstars");
    }

    #[test]
    fn log_names() {
        assert!(parse_log_name("team-messages-2025-09-26.txt").is_some());
        assert!(parse_log_name("team-messages-2025-13-01.txt").is_none());
        assert!(parse_log_name("team-summary.txt").is_none());
        assert!(parse_log_name("team-messages-2025-09-26.log").is_none());
    }
}
