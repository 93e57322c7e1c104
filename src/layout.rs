use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub top: f64,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub blocks: Vec<TextBlock>,
}

impl PageLayout {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|block| block.lines.iter().map(String::as_str))
    }
}

pub fn read_pdf_layout(pdf_path: &Path) -> Result<Vec<PageLayout>> {
    let output = Command::new("pdftotext")
        .arg("-bbox-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let xhtml = String::from_utf8_lossy(&output.stdout);
    parse_bbox_layout(&xhtml)
}

struct BboxLayoutParser {
    page: Regex,
    block: Regex,
    y_min: Regex,
    line: Regex,
    word: Regex,
}

impl BboxLayoutParser {
    fn new() -> Result<Self> {
        Ok(Self {
            page: Regex::new(r#"(?s)<page\b[^>]*?width="([^"]*)"[^>]*?height="([^"]*)"[^>]*>(.*?)</page>"#)
                .context("failed to compile page regex")?,
            block: Regex::new(r"(?s)<block\b([^>]*)>(.*?)</block>")
                .context("failed to compile block regex")?,
            y_min: Regex::new(r#"yMin="([^"]*)""#).context("failed to compile yMin regex")?,
            line: Regex::new(r"(?s)<line\b[^>]*>(.*?)</line>")
                .context("failed to compile line regex")?,
            word: Regex::new(r"(?s)<word\b[^>]*>(.*?)</word>")
                .context("failed to compile word regex")?,
        })
    }

    fn parse(&self, xhtml: &str) -> Vec<PageLayout> {
        let mut pages = Vec::new();

        for page_captures in self.page.captures_iter(xhtml) {
            let width = parse_coordinate(page_captures.get(1).map(|value| value.as_str()));
            let height = parse_coordinate(page_captures.get(2).map(|value| value.as_str()));
            let body = page_captures
                .get(3)
                .map(|value| value.as_str())
                .unwrap_or_default();

            let mut blocks = Vec::new();
            for block_captures in self.block.captures_iter(body) {
                let attributes = block_captures
                    .get(1)
                    .map(|value| value.as_str())
                    .unwrap_or_default();
                let top = parse_coordinate(
                    self.y_min
                        .captures(attributes)
                        .and_then(|captures| captures.get(1))
                        .map(|value| value.as_str()),
                );
                let block_body = block_captures
                    .get(2)
                    .map(|value| value.as_str())
                    .unwrap_or_default();

                let lines = self
                    .line
                    .captures_iter(block_body)
                    .map(|line_captures| {
                        let line_body = line_captures
                            .get(1)
                            .map(|value| value.as_str())
                            .unwrap_or_default();
                        self.word
                            .captures_iter(line_body)
                            .filter_map(|word| word.get(1).map(|value| decode_entities(value.as_str())))
                            .collect::<Vec<String>>()
                            .join(" ")
                    })
                    .collect::<Vec<String>>();

                blocks.push(TextBlock { top, lines });
            }

            pages.push(PageLayout {
                width,
                height,
                blocks,
            });
        }

        pages
    }
}

pub fn parse_bbox_layout(xhtml: &str) -> Result<Vec<PageLayout>> {
    let parser = BboxLayoutParser::new()?;
    Ok(parser.parse(xhtml))
}

fn parse_coordinate(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace('\u{00a0}', " ")
        .replace("&amp;", "&")
}
