use tracing::warn;

use super::SignalExtractor;

const SECTION_LOOKAHEAD_LINES: usize = 20;
const MAX_DECLARED_ATTACHMENTS: usize = 100;
const PLACEHOLDER_PREFIX: &str = "Συνημμένο_";

impl SignalExtractor {
    pub(super) fn extract_attachments(&self, lines: &[&str]) -> Vec<String> {
        let section_index = lines
            .iter()
            .position(|line| self.attachment_phrase.is_match(line));

        match section_index {
            Some(index) => {
                let mut attachments = self.attachments_from_section(lines, index);
                if let Some(declared) = self.declared_count(lines[index]) {
                    pad_to_declared(&mut attachments, declared);
                }
                attachments
            }
            None => self.attachments_from_declared_count(lines),
        }
    }

    fn attachments_from_section(&self, lines: &[&str], header_index: usize) -> Vec<String> {
        let mut attachments = Vec::new();

        let header = lines[header_index].trim();
        if let Some(phrase) = self.attachment_phrase.find(header) {
            let rest = &header[phrase.end()..];
            let trailing = rest
                .trim_start_matches(|character: char| character == ':' || character.is_whitespace())
                .trim();
            let separated = rest.starts_with(|character: char| character == ':' || character.is_whitespace());
            if separated
                && !trailing.is_empty()
                && !trailing.chars().all(|character| character.is_ascii_digit())
            {
                attachments.push(trailing.to_string());
            }
        }

        let scan_end = (header_index + 1 + SECTION_LOOKAHEAD_LINES).min(lines.len());
        let mut numbered_seen = false;
        for raw_line in &lines[(header_index + 1).min(scan_end)..scan_end] {
            let line = raw_line.trim();
            if line.is_empty() {
                if numbered_seen {
                    break;
                }
                continue;
            }

            let Some(name) = self.numbered_attachment(line) else {
                break;
            };
            numbered_seen = true;
            if !name.is_empty() {
                attachments.push(name);
            }
        }

        attachments
    }

    fn attachments_from_declared_count(&self, lines: &[&str]) -> Vec<String> {
        let Some(declared) = lines.iter().find_map(|line| self.declared_count(line)) else {
            return Vec::new();
        };

        let mut attachments = lines
            .iter()
            .filter_map(|line| self.numbered_attachment(line.trim()))
            .filter(|name| !name.is_empty())
            .take(declared.min(MAX_DECLARED_ATTACHMENTS))
            .collect::<Vec<String>>();

        pad_to_declared(&mut attachments, declared);
        attachments
    }

    fn declared_count(&self, line: &str) -> Option<usize> {
        self.attachment_count
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<usize>().ok())
    }

    fn numbered_attachment(&self, line: &str) -> Option<String> {
        let captured = self.numbered_item.captures(line)?.get(1)?.as_str();
        Some(self.web_link.replace_all(captured, "").trim().to_string())
    }
}

/// Pads with numbered placeholders up to the declared count, capped at
/// [`MAX_DECLARED_ATTACHMENTS`].
fn pad_to_declared(attachments: &mut Vec<String>, declared: usize) {
    if declared > MAX_DECLARED_ATTACHMENTS {
        warn!(
            declared,
            cap = MAX_DECLARED_ATTACHMENTS,
            "declared attachment count is implausible; padding capped"
        );
    }
    let target = declared.min(MAX_DECLARED_ATTACHMENTS);
    while attachments.len() < target {
        attachments.push(format!("{PLACEHOLDER_PREFIX}{}", attachments.len() + 1));
    }
}
