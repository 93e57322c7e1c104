use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::model::{CandidateRecord, Field, MANUAL_THEME, Provenance};
use crate::registry::RecipientRegistry;

mod attachments;
mod recipients;
mod theme;

pub const MIN_MEANINGFUL_CHARS: usize = 50;

const QUOTED_ORIGINAL_START: &str = "ΚΕΙΜΕΝΟ ΑΡΧΙΚΟΥ ΜΗΝΥΜΑΤΟΣ";
const QUOTED_ORIGINAL_END: &str = "ΤΕΛΟΣ ΑΡΧΙΚΟΥ ΜΗΝΥΜΑΤΟΣ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    QuotedOriginal,
    Identifier,
    Sender,
    Recipients,
    Theme,
    Attachments,
}

impl FieldRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuotedOriginal => "quoted_original",
            Self::Identifier => "identifier",
            Self::Sender => "sender",
            Self::Recipients => "recipients",
            Self::Theme => "theme",
            Self::Attachments => "attachments",
        }
    }
}

pub const EXTRACTION_ORDER: [FieldRule; 6] = [
    FieldRule::QuotedOriginal,
    FieldRule::Identifier,
    FieldRule::Sender,
    FieldRule::Recipients,
    FieldRule::Theme,
    FieldRule::Attachments,
];

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub url_pattern: String,
    pub platform_markers: Vec<String>,
}

#[derive(Debug)]
pub struct SignalExtractor {
    sender_line: Regex,
    theme_line: Regex,
    related_line: Regex,
    url: Regex,
    web_link: Regex,
    recipient_noise: Regex,
    theme_noise: Regex,
    blank_run: Regex,
    attachment_phrase: Regex,
    attachment_count: Regex,
    numbered_item: Regex,
    platform_markers: Vec<String>,
}

impl SignalExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        Ok(Self {
            sender_line: Regex::new(r"(?i)^\s*FM\s+(.+)$")
                .context("failed to compile sender line regex")?,
            theme_line: Regex::new(r"(?i)^\s*ΘΕΜΑ\s*:\s*(.*)$")
                .context("failed to compile theme line regex")?,
            related_line: Regex::new(r"(?i)^\s*ΣΧΕΤ\.?\s*:")
                .context("failed to compile related-reference regex")?,
            url: Regex::new(&config.url_pattern).with_context(|| {
                format!("failed to compile url regex: {}", config.url_pattern)
            })?,
            web_link: Regex::new(r"https?://\S+").context("failed to compile web link regex")?,
            recipient_noise: Regex::new(r"[^\w\s/.\-]")
                .context("failed to compile recipient cleanup regex")?,
            theme_noise: Regex::new(r"[^\w\s.\-]").context("failed to compile theme cleanup regex")?,
            blank_run: Regex::new(r"\n\s*\n\s*\n").context("failed to compile blank-run regex")?,
            attachment_phrase: Regex::new(r"(?i)συνημμένα\s+αρχεία")
                .context("failed to compile attachment phrase regex")?,
            attachment_count: Regex::new(r"(?i)(\d+)\s*συνημμέν[οα]\s+αρχεί[οα]")
                .context("failed to compile attachment count regex")?,
            numbered_item: Regex::new(r"^\d+\.\s*(.+)$")
                .context("failed to compile numbered item regex")?,
            platform_markers: config
                .platform_markers
                .iter()
                .map(|marker| marker.trim().to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        })
    }

    pub fn extract(&self, text: &str, known: &RecipientRegistry) -> CandidateRecord {
        let mut cleaned = text.replace("\r\n", "\n");
        let mut record = CandidateRecord {
            identifier: Field::Absent,
            sender: Field::Absent,
            theme: Field::Absent,
            recipients: BTreeSet::new(),
            attachments: Vec::new(),
            provenance: Provenance::Extracted,
        };

        for rule in EXTRACTION_ORDER {
            match rule {
                FieldRule::QuotedOriginal => {
                    cleaned = self.excise_quoted_original(&cleaned);
                }
                FieldRule::Identifier => {
                    record.identifier = extract_identifier(&split_lines(&cleaned));
                }
                FieldRule::Sender => record.sender = self.extract_sender(&split_lines(&cleaned)),
                FieldRule::Recipients => {
                    let detected = self.detect_recipients(&split_lines(&cleaned));
                    record.recipients = known.filter(detected);
                }
                FieldRule::Theme => record.theme = self.extract_theme(&split_lines(&cleaned)),
                FieldRule::Attachments => {
                    record.attachments = self.extract_attachments(&split_lines(&cleaned));
                }
            }
            debug!(rule = rule.as_str(), "applied extraction rule");
        }

        record
    }

    pub fn excise_quoted_original(&self, text: &str) -> String {
        let mut remaining = text.to_string();
        let mut removed = 0usize;

        while let Some(start) = remaining.find(QUOTED_ORIGINAL_START) {
            let Some(relative_end) = remaining[start..].find(QUOTED_ORIGINAL_END) else {
                break;
            };
            let end = start + relative_end + QUOTED_ORIGINAL_END.len();
            remaining.replace_range(start..end, "");
            removed += 1;
        }

        if removed == 0 {
            return remaining;
        }

        debug!(sections = removed, "removed quoted original message");
        self.blank_run
            .replace_all(&remaining, "\n\n")
            .trim()
            .to_string()
    }

    fn extract_sender(&self, lines: &[&str]) -> Field<String> {
        let Some(captured) = lines.iter().find_map(|line| {
            self.sender_line
                .captures(line)
                .and_then(|captures| captures.get(1))
                .map(|value| value.as_str())
        }) else {
            return Field::Absent;
        };

        let without_parenthetical = captured.split('(').next().unwrap_or_default();
        Field::from_text(without_parenthetical)
    }

    fn sender_line_index(&self, lines: &[&str]) -> Option<usize> {
        lines.iter().position(|line| self.sender_line.is_match(line))
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

fn extract_identifier(lines: &[&str]) -> Field<String> {
    let Some(marker_index) = lines.iter().position(|line| is_sender_marker(line)) else {
        return Field::Absent;
    };

    lines[..marker_index]
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(Field::from_text)
        .unwrap_or(Field::Absent)
}

fn is_sender_marker(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(head) = trimmed.get(..2) else {
        return false;
    };
    if !head.eq_ignore_ascii_case("FM") {
        return false;
    }

    trimmed[2..]
        .chars()
        .next()
        .map(char::is_whitespace)
        .unwrap_or(true)
}

fn strip_prefix_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

pub fn meaningful_char_count(text: &str) -> usize {
    text.trim().chars().count()
}

pub fn needs_manual_entry(text: &str) -> bool {
    meaningful_char_count(text) <= MIN_MEANINGFUL_CHARS
}

pub fn manual_record(identifier: &str, sender: &str, attachments: Vec<String>) -> CandidateRecord {
    CandidateRecord {
        identifier: Field::from_text(identifier),
        sender: Field::from_text(sender),
        theme: Field::Present(MANUAL_THEME.to_string()),
        recipients: BTreeSet::new(),
        attachments,
        provenance: Provenance::Manual,
    }
}
