use std::collections::BTreeSet;

use super::{SignalExtractor, strip_prefix_ignore_ascii_case};
use crate::util::collapse_whitespace;

impl SignalExtractor {
    /// Raw recipient candidates between the sender line and the theme
    /// marker, before allow-list filtering.
    pub(super) fn detect_recipients(&self, lines: &[&str]) -> BTreeSet<String> {
        let mut detected = BTreeSet::new();

        let Some(sender_index) = self.sender_line_index(lines) else {
            return detected;
        };

        let section_start = sender_index + 1;
        let section_end = lines[section_start..]
            .iter()
            .position(|line| self.theme_line.is_match(line))
            .map(|offset| section_start + offset)
            .unwrap_or(lines.len());

        for line in &lines[section_start..section_end] {
            if let Some(candidate) = self.clean_recipient_line(line) {
                detected.insert(candidate);
            }
        }

        detected
    }

    fn clean_recipient_line(&self, raw_line: &str) -> Option<String> {
        let mut line = raw_line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = strip_prefix_ignore_ascii_case(line, "TO ") {
            line = rest.trim();
        } else if let Some(rest) = strip_prefix_ignore_ascii_case(line, "INFO ") {
            line = rest.trim();
        }

        if line.is_empty() || line.contains('=') || self.is_link_line(line) {
            return None;
        }

        let stripped = self.recipient_noise.replace_all(line, "");
        let candidate = collapse_whitespace(&stripped);
        if candidate.is_empty() {
            None
        } else {
            Some(candidate)
        }
    }

    fn is_link_line(&self, line: &str) -> bool {
        if line.to_ascii_lowercase().starts_with("http") || self.url.is_match(line) {
            return true;
        }

        let lowered = line.to_lowercase();
        self.platform_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }
}
