use anyhow::Context;
use chrono::Local;
use clap::{Parser, ValueEnum};
use issuescope::blocks::build_summary_blocks;
use issuescope::chunker::DEFAULT_CHUNK_CHARS;
use issuescope::config::{self, ConfigError, HttpSettings, OracleSettings, Overrides, SlackSettings};
use issuescope::http::ReqwestTransport;
use issuescope::oracle::ChatCompletionClient;
use issuescope::output::{derive_output_path, find_most_recent_log_files, is_summary_file, write_summary};
use issuescope::slack::SlackClient;
use issuescope::summarize::{SummarizeOptions, Summarizer};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_GROUPS: [&str; 4] = [
    "retail all-stars",
    "Seeds+Customer Support",
    "Winwise Agent Support",
    "Merchant Acquisition_Paybox",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "issuescope", version, about = "Summarize recurring support issues in chat logs")]
struct Cli {
    /// Transcripts to summarize. Without any, the newest log of each group is used.
    files: Vec<PathBuf>,

    /// Model name (overrides OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,
    /// Skip TLS certificate verification
    #[arg(long, default_value_t = false)]
    insecure: bool,
    /// PEM bundle of trusted roots
    #[arg(long = "ca-bundle")]
    ca_bundle: Option<PathBuf>,
    /// Trust the platform certificate store instead of the bundled roots
    #[arg(long = "system-roots", default_value_t = false)]
    system_roots: bool,
    #[arg(long = "chunk-chars", default_value_t = DEFAULT_CHUNK_CHARS)]
    chunk_chars: usize,
    /// Skip the consolidation pass
    #[arg(long = "no-consolidate", default_value_t = false)]
    no_consolidate: bool,
    /// Stdout format of each summary
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Also post each summary to the chat channel
    #[arg(long, default_value_t = false)]
    slack: bool,
    /// Channel id (overrides SLACK_CHANNEL)
    #[arg(long = "slack-channel")]
    slack_channel: Option<String>,

    #[arg(long = "log-dir", default_value = "message-logs")]
    log_dir: PathBuf,
    #[arg(long = "summaries-dir", default_value = "summaries")]
    summaries_dir: PathBuf,
    /// Group names to discover logs for. May be repeated.
    #[arg(long = "group")]
    groups: Vec<String>,

    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

type OracleClient = ChatCompletionClient<ReqwestTransport>;
type ChatTarget = (SlackClient<ReqwestTransport>, String);

struct Run {
    cli: Cli,
    overrides: Overrides,
    model: String,
    slack: Option<ChatTarget>,
    oracle: Option<OracleClient>,
}

impl Run {
    /// The oracle is only built once a transcript actually needs summarizing.
    fn oracle(&mut self) -> anyhow::Result<&OracleClient> {
        if self.oracle.is_none() {
            let settings = OracleSettings::from_env(&self.overrides).context("loading oracle settings")?;
            self.oracle = Some(ChatCompletionClient::from_settings(&settings).context("building oracle client")?);
        }
        self.oracle.as_ref().context("oracle client unavailable")
    }

    fn process(&mut self, path: &Path) -> anyhow::Result<()> {
        let summary = if is_summary_file(path) {
            info!(path = %path.display(), "existing summary, posting only");
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        } else {
            let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let options = SummarizeOptions {
                chunk_chars: self.cli.chunk_chars,
                consolidate: !self.cli.no_consolidate,
                ..SummarizeOptions::default()
            };
            let oracle = self.oracle()?;
            let report = Summarizer::new(oracle, options).summarize(&content).with_context(|| format!("summarizing {}", path.display()))?;
            let text = report.summary.to_text();
            let out = derive_output_path(path, &self.cli.summaries_dir);
            write_summary(&out, path, &text, &self.model, Local::now().fixed_offset())
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), chunks = report.chunks, skipped = report.validity.skipped.len(), "wrote summary");
            match self.cli.format {
                Format::Text => println!("{text}\n"),
                Format::Json => println!("{}", serde_json::to_string_pretty(report.summary.issues())?),
            }
            text
        };

        if let Some((client, channel)) = &self.slack {
            let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let doc = build_summary_blocks(&filename, &self.model, &summary);
            if let Err(e) = client.post_message(channel, &doc) {
                warn!(error = %e, channel = %channel, "failed to post summary");
            }
        }
        Ok(())
    }
}

/// Configuration problems end the whole run; anything else only fails the file.
fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConfigError>().is_some()
}

fn slack_target(cli: &Cli, http: &HttpSettings) -> anyhow::Result<Option<ChatTarget>> {
    if !cli.slack {
        return Ok(None);
    }
    let settings = SlackSettings::from_env();
    let Some(token) = settings.token.as_deref() else {
        warn!("--slack given but SLACK_BOT_TOKEN is not set; skipping posting");
        return Ok(None);
    };
    let Some(channel) = cli.slack_channel.clone().or_else(|| settings.channel.clone()) else {
        warn!("--slack given but no channel configured; skipping posting");
        return Ok(None);
    };
    let client = SlackClient::from_settings(token, &settings.api_base, http).context("building chat client")?;
    Ok(Some((client, channel)))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        model: cli.model.clone(),
        insecure: cli.insecure,
        ca_bundle: cli.ca_bundle.clone(),
        system_roots: cli.system_roots,
    };
    let model = config::resolve_model(&config::env_lookup, &overrides);
    let http = HttpSettings::from_env(&overrides).context("loading transport settings")?;
    let slack = slack_target(&cli, &http)?;

    let files: Vec<PathBuf> = if !cli.files.is_empty() {
        info!(count = cli.files.len(), "processing given files");
        cli.files.clone()
    } else {
        let groups: Vec<String> = if cli.groups.is_empty() {
            DEFAULT_GROUPS.iter().map(|g| g.to_string()).collect()
        } else {
            cli.groups.clone()
        };
        let found = find_most_recent_log_files(&cli.log_dir, &groups)
            .with_context(|| format!("scanning {}", cli.log_dir.display()))?;
        if found.is_empty() {
            error!(dir = %cli.log_dir.display(), groups = %groups.join(", "), "no log files found for target groups");
            return Ok(ExitCode::from(1));
        }
        for (group, path) in &found {
            info!(%group, path = %path.display(), "discovered log");
        }
        found.into_values().collect()
    };

    let mut run = Run { cli, overrides, model, slack, oracle: None };
    let mut failed = false;
    for path in &files {
        info!(path = %path.display(), "processing");
        if let Err(e) = run.process(path) {
            if is_fatal(&e) {
                error!(error = %format!("{e:#}"), "configuration error, stopping");
                return Ok(ExitCode::from(1));
            }
            error!(path = %path.display(), error = %format!("{e:#}"), "failed to process file");
            failed = true;
        }
    }
    Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuescope::http::TransportError;

    #[test]
    fn missing_key_stops_the_run() {
        let lookup = |_: &str| -> Option<String> { None };
        let err = OracleSettings::from_lookup(&lookup, &Overrides::default())
            .context("loading oracle settings")
            .unwrap_err();
        assert!(is_fatal(&err));
    }

    #[test]
    fn transport_failures_stay_per_file() {
        let err = Err::<(), _>(TransportError::Status { status: 503, url: "https://oracle.test".into(), body: String::new() })
            .context("summarizing a.txt")
            .unwrap_err();
        assert!(!is_fatal(&err));
        assert!(!is_fatal(&anyhow::anyhow!("reading a.txt")));
    }
}
