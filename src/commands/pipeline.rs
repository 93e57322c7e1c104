use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::{ExtractionOptions, ManualOptions, SourceOptions};
use crate::fields::{
    ExtractorConfig, SignalExtractor, manual_record, meaningful_char_count, needs_manual_entry,
};
use crate::identity::{numeric_serial, serial};
use crate::layout::read_pdf_layout;
use crate::model::{CandidateRecord, ExtractionReport};
use crate::registry::RecipientRegistry;
use crate::util::now_utc_string;
use crate::writer::list_download_attachments;
use crate::zones::ZoneFilter;

#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub record: CandidateRecord,
}

impl Extraction {
    pub fn needs_manual_entry(&self) -> bool {
        needs_manual_entry(&self.text)
    }

    pub fn report(&self, source: &str) -> ExtractionReport {
        let identifier = self.record.identifier_text();
        let sender = self.record.sender_text();
        ExtractionReport {
            source: source.to_string(),
            generated_at: now_utc_string(),
            meaningful_chars: meaningful_char_count(&self.text),
            manual_input_required: self.needs_manual_entry(),
            serial: serial(identifier, sender),
            numeric_serial: numeric_serial(identifier, sender),
            record: self.record.clone(),
        }
    }
}

/// Zone filtering, field extraction and allow-list filtering for one run.
pub struct SignalPipeline {
    zones: ZoneFilter,
    extractor: SignalExtractor,
    registry: RecipientRegistry,
}

impl SignalPipeline {
    pub fn new(options: &ExtractionOptions) -> Result<Self> {
        let zones = ZoneFilter::new(&options.boilerplate_url)?;
        let extractor = SignalExtractor::new(&ExtractorConfig {
            url_pattern: options.boilerplate_url.clone(),
            platform_markers: options.platform_markers.clone(),
        })?;
        let registry = RecipientRegistry::load(&options.recipient_list)?;

        Ok(Self {
            zones,
            extractor,
            registry,
        })
    }

    pub fn extract_pdf(&self, pdf_path: &Path) -> Result<Extraction> {
        let pages = read_pdf_layout(pdf_path)?;
        debug!(path = %pdf_path.display(), pages = pages.len(), "read pdf layout");
        let text = self.zones.filter_pages(&pages);
        Ok(self.extract_filtered(text))
    }

    pub fn extract_plain_text(&self, raw: &str) -> Extraction {
        let text = self.zones.filter_text(raw);
        self.extract_filtered(text)
    }

    fn extract_filtered(&self, text: String) -> Extraction {
        let record = self.extractor.extract(&text, &self.registry);
        Extraction { text, record }
    }

    /// Extracts from `--text` when given, otherwise from the signal PDF.
    /// Returns the source path alongside the extraction.
    pub fn extract_source(&self, source: &SourceOptions) -> Result<(String, Extraction)> {
        if let Some(text_path) = &source.text {
            let raw = fs::read_to_string(text_path)
                .with_context(|| format!("failed to read {}", text_path.display()))?;
            return Ok((
                text_path.display().to_string(),
                self.extract_plain_text(&raw),
            ));
        }

        let pdf_path = source.signal_pdf();
        if !pdf_path.is_file() {
            bail!("signal pdf not found: {}", pdf_path.display());
        }
        let extraction = self.extract_pdf(&pdf_path)?;
        Ok((pdf_path.display().to_string(), extraction))
    }

    /// The record to file: manual entry when `--id`/`--fm` are given,
    /// otherwise the extracted record, which must carry enough text and an
    /// identifier.
    pub fn candidate(&self, source: &SourceOptions, manual: &ManualOptions) -> Result<CandidateRecord> {
        if let (Some(identifier), Some(sender)) =
            (&manual.manual_identifier, &manual.manual_sender)
        {
            let attachments =
                list_download_attachments(&source.downloads_dir, &source.signal_pdf_name)?;
            info!(
                identifier = %identifier,
                attachments = attachments.len(),
                "using manual signal entry"
            );
            return Ok(manual_record(identifier, sender, attachments));
        }

        let (source_label, extraction) = self.extract_source(source)?;
        if extraction.needs_manual_entry() {
            bail!(
                "signal text from {} is too short ({} chars); pass --id and --fm for manual entry",
                source_label,
                meaningful_char_count(&extraction.text)
            );
        }
        if !extraction.record.identifier.is_present() {
            bail!(
                "no signal identifier found in {}; pass --id and --fm for manual entry",
                source_label
            );
        }
        if !extraction.record.sender.is_present() {
            warn!(source = %source_label, "no sender found; filing under the unavailable sentinel");
        }

        Ok(extraction.record)
    }
}

/// Explicit recipients win; otherwise the detected (allow-listed) ones.
pub fn target_recipients(explicit: &[String], record: &CandidateRecord) -> Result<Vec<String>> {
    let recipients = if explicit.is_empty() {
        record.recipients.iter().cloned().collect::<Vec<String>>()
    } else {
        explicit.to_vec()
    };

    if recipients.is_empty() {
        bail!("no recipients detected; pass --recipient to choose them");
    }
    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Provenance};
    use crate::zones::DEFAULT_URL_PATTERN;

    fn options(recipient_list: &Path) -> ExtractionOptions {
        ExtractionOptions {
            recipient_list: recipient_list.to_path_buf(),
            platform_markers: vec!["texchn".to_string(), "pyrseia".to_string()],
            boilerplate_url: DEFAULT_URL_PATTERN.to_string(),
        }
    }

    #[test]
    fn plain_text_is_zone_filtered_before_extraction() {
        let dir = tempfile::tempdir().expect("temp dir");
        let list = dir.path().join("recipients.json");
        fs::write(&list, r#"["UNIT ALPHA", "UNIT BRAVO"]"#).expect("write list");
        let pipeline = SignalPipeline::new(&options(&list)).expect("pipeline");

        let raw = "\
12/3/25, 10:15 π.μ. https://8mptexchn2.army.hndgs.mil/pyrseia/pyrseia_server.php
R 010101Z JAN 25
FM TEST SENDER
TO UNIT ALPHA
INFO UNIT BRAVO
ΘΕΜΑ: Test Subject
https://8mptexchn2.army.hndgs.mil/pyrseia/pyrseia_server.php 1/2
";
        let extraction = pipeline.extract_plain_text(raw);
        assert!(!extraction.text.contains("https://"));
        assert_eq!(
            extraction.record.identifier,
            Field::Present("R 010101Z JAN 25".to_string())
        );

        let report = extraction.report("inline");
        assert!(!report.manual_input_required);
        assert_eq!(report.serial, serial("R 010101Z JAN 25", "TEST SENDER"));
        assert_eq!(report.record.recipients.len(), 2);
    }

    #[test]
    fn manual_options_take_precedence_over_extraction() {
        let dir = tempfile::tempdir().expect("temp dir");
        let downloads = dir.path().join("downloads");
        fs::create_dir_all(&downloads).expect("create downloads");
        fs::write(downloads.join("pyrseia_server.pdf"), b"%PDF").expect("write pdf");
        fs::write(downloads.join("annex.pdf"), b"annex").expect("write annex");

        let pipeline = SignalPipeline::new(&options(&dir.path().join("missing.json"))).expect("pipeline");
        let source = SourceOptions {
            downloads_dir: downloads,
            signal_pdf_name: "pyrseia_server.pdf".to_string(),
            pdf: None,
            text: None,
        };
        let manual = ManualOptions {
            manual_identifier: Some("R 1".to_string()),
            manual_sender: Some("ΓΕΣ".to_string()),
        };

        let record = pipeline.candidate(&source, &manual).expect("candidate");
        assert_eq!(record.provenance, Provenance::Manual);
        assert_eq!(record.attachments, vec!["annex.pdf".to_string()]);
    }

    #[test]
    fn short_text_requires_manual_entry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let text_path = dir.path().join("signal.txt");
        fs::write(&text_path, "R 1\nFM X\n").expect("write text");

        let pipeline = SignalPipeline::new(&options(&dir.path().join("missing.json"))).expect("pipeline");
        let source = SourceOptions {
            downloads_dir: dir.path().join("downloads"),
            signal_pdf_name: "pyrseia_server.pdf".to_string(),
            pdf: None,
            text: Some(text_path),
        };
        let manual = ManualOptions {
            manual_identifier: None,
            manual_sender: None,
        };

        assert!(pipeline.candidate(&source, &manual).is_err());
    }

    #[test]
    fn explicit_recipients_override_detected_ones() {
        let mut record = manual_record("R 1", "ΓΕΣ", Vec::new());
        assert!(target_recipients(&[], &record).is_err());

        record.recipients.insert("UNIT ALPHA".to_string());
        assert_eq!(
            target_recipients(&[], &record).expect("detected"),
            vec!["UNIT ALPHA".to_string()]
        );
        assert_eq!(
            target_recipients(&["UNIT BRAVO".to_string()], &record).expect("explicit"),
            vec!["UNIT BRAVO".to_string()]
        );
    }
}
