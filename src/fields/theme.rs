use super::SignalExtractor;
use crate::model::Field;
use crate::util::collapse_whitespace;

impl SignalExtractor {
    pub(super) fn extract_theme(&self, lines: &[&str]) -> Field<String> {
        let Some((theme_index, first_line_text)) =
            lines.iter().enumerate().find_map(|(index, line)| {
                self.theme_line
                    .captures(line.trim())
                    .and_then(|captures| captures.get(1))
                    .map(|value| (index, value.as_str()))
            })
        else {
            return Field::Absent;
        };

        let related_index = lines[theme_index + 1..]
            .iter()
            .position(|line| self.related_line.is_match(line))
            .map(|offset| theme_index + 1 + offset);

        let raw_theme = match related_index {
            Some(end) => {
                let mut parts = vec![first_line_text];
                parts.extend(lines[theme_index + 1..end].iter().copied());
                parts.join("\n")
            }
            None => first_line_text.to_string(),
        };

        let without_hosts = self.url.replace_all(&raw_theme, "");
        let without_links = self.web_link.replace_all(&without_hosts, "");
        let reduced = self.theme_noise.replace_all(&without_links, "");
        Field::from_text(&collapse_whitespace(&reduced))
    }
}
