use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::layout::PageLayout;

pub const DEFAULT_URL_PATTERN: &str =
    r"(?i)\bhttps?://\S+|\b[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}/\S*";

const EDGE_ZONE_RATIO: f64 = 0.1;
const STRAY_URL_MAX_REMAINDER: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoilerplateKind {
    Header,
    Footer,
    StrayUrl,
}

impl BoilerplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::StrayUrl => "stray_url",
        }
    }
}

/// Evaluation order of the boilerplate rules.
pub const BOILERPLATE_RULES: [BoilerplateKind; 3] = [
    BoilerplateKind::Header,
    BoilerplateKind::Footer,
    BoilerplateKind::StrayUrl,
];

#[derive(Debug)]
pub struct ZoneFilter {
    date: Regex,
    time: Regex,
    page_number: Regex,
    url: Regex,
}

impl ZoneFilter {
    pub fn new(url_pattern: &str) -> Result<Self> {
        Ok(Self {
            date: Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}")
                .context("failed to compile header date regex")?,
            time: Regex::new(r"\d{1,2}:\d{2}\s*[πμ]\.[πμ]\.")
                .context("failed to compile header time regex")?,
            page_number: Regex::new(r"\b\d+/\d+\b")
                .context("failed to compile footer page-number regex")?,
            url: Regex::new(url_pattern)
                .with_context(|| format!("failed to compile boilerplate url regex: {url_pattern}"))?,
        })
    }

    pub fn classify_line(&self, raw_line: &str) -> Option<BoilerplateKind> {
        let line = raw_line.trim();
        if line.is_empty() {
            return None;
        }

        let url = self.url.find(line)?;

        BOILERPLATE_RULES.into_iter().find(|rule| match rule {
            BoilerplateKind::Header => self.date.is_match(line) || self.time.is_match(line),
            BoilerplateKind::Footer => self.page_number.is_match(line),
            BoilerplateKind::StrayUrl => {
                let remainder = line.replace(url.as_str(), "");
                remainder.trim().chars().count() < STRAY_URL_MAX_REMAINDER
            }
        })
    }

    pub fn is_boilerplate(&self, line: &str) -> bool {
        self.classify_line(line).is_some()
    }

    pub fn filter_text(&self, text: &str) -> String {
        let mut clean = String::with_capacity(text.len());
        for line in text.lines() {
            if !self.is_boilerplate(line) {
                clean.push_str(line);
                clean.push('\n');
            }
        }
        clean
    }

    pub fn filter_page(&self, page: &PageLayout) -> String {
        if let Err(reason) = validate_page(page) {
            warn!(reason, "page layout malformed; keeping all lines unfiltered");
            return verbatim_page_text(page);
        }

        let header_zone = page.height * EDGE_ZONE_RATIO;
        let footer_zone = page.height * (1.0 - EDGE_ZONE_RATIO);

        let mut clean = String::new();
        for block in &page.blocks {
            if block.top <= header_zone || block.top >= footer_zone {
                let block_text = block.lines.concat();
                if let Some(kind) = self.classify_line(&block_text) {
                    debug!(kind = kind.as_str(), top = block.top, "dropped edge-zone block");
                    continue;
                }
            }

            for line in &block.lines {
                if !self.is_boilerplate(line) {
                    clean.push_str(line);
                    clean.push('\n');
                }
            }
        }

        clean
    }

    pub fn filter_pages(&self, pages: &[PageLayout]) -> String {
        let mut full_text = String::new();
        for page in pages {
            full_text.push_str(&self.filter_page(page));
            full_text.push('\n');
        }
        full_text
    }
}

fn validate_page(page: &PageLayout) -> std::result::Result<(), &'static str> {
    if !page.width.is_finite() || page.width <= 0.0 {
        return Err("page width missing or not positive");
    }
    if !page.height.is_finite() || page.height <= 0.0 {
        return Err("page height missing or not positive");
    }
    if page.blocks.iter().any(|block| !block.top.is_finite()) {
        return Err("block position missing");
    }
    Ok(())
}

fn verbatim_page_text(page: &PageLayout) -> String {
    let mut text = String::new();
    for line in page.lines() {
        text.push_str(line);
        text.push('\n');
    }
    text
}
