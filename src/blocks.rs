//! Chat-platform presentation blocks built from a rendered summary.

use crate::extract::MAX_SAMPLES;
use crate::render::{parse_rendered, slackify, Severity};
use crate::timestamp::display_raw;
use itertools::Itertools;
use serde::Serialize;

pub const HEADER_TITLE: &str = "Chat Log: Unique Issues";
/// Section text limit is about 3000 characters; stay under it.
pub const SECTION_CHARS: usize = 2900;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        TextObject::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            TextObject::PlainText { text, .. } | TextObject::Mrkdwn { text } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Context {
        elements: Vec<TextObject>,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Divider,
}

impl Block {
    fn section_text(text: impl Into<String>) -> Self {
        Block::Section { text: Some(TextObject::mrkdwn(text)), fields: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockDocument {
    pub blocks: Vec<Block>,
}

/// Splits on character boundaries into pieces of at most `max_chars`.
fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_chars.max(1)).map(|c| c.iter().collect()).collect()
}

/// Builds the message for one summary. The summary text is parsed back into
/// categories; when nothing parses, the text itself is posted in sections.
pub fn build_summary_blocks(filename: &str, model: &str, summary: &str) -> BlockDocument {
    let mut items = parse_rendered(summary);
    let mut blocks = vec![
        Block::Header { text: TextObject::PlainText { text: HEADER_TITLE.to_string(), emoji: true } },
        Block::Context {
            elements: vec![
                TextObject::mrkdwn(format!("*File:* `{filename}`")),
                TextObject::mrkdwn(format!("*Model:* `{model}`")),
            ],
        },
        Block::Divider,
    ];

    if items.is_empty() {
        for part in split_chars(&slackify(summary), SECTION_CHARS) {
            blocks.push(Block::section_text(part));
        }
        return BlockDocument { blocks };
    }

    // stable: the text order already breaks ties
    items.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    let total = items.len();
    for (idx, it) in items.iter().enumerate().map(|(i, it)| (i + 1, it)) {
        let marker = Severity::for_occurrences(it.occurrences).marker();
        blocks.push(Block::Section {
            text: None,
            fields: vec![
                TextObject::mrkdwn(format!("*{marker} Category {idx}:*\n{}", it.category)),
                TextObject::mrkdwn(format!("*Occurrences:*\n{}\n*Last:*\n{}", it.occurrences, display_raw(&it.last_seen))),
            ],
        });
        if !it.samples.is_empty() {
            let samples = it.samples.iter().take(MAX_SAMPLES).map(|s| format!("• {s}")).join("\n");
            blocks.push(Block::section_text(format!("*Sample Messages:*\n{samples}")));
        }
        if idx < total {
            blocks.push(Block::Divider);
        }
    }
    BlockDocument { blocks }
}
