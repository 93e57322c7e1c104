use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::RegenerateArgs;
use crate::commands::pipeline::{Extraction, SignalPipeline};
use crate::identity::numeric_serial;
use crate::ledger::metadata::{MetadataRead, has_any_metadata, read_signal_info, write_signal_info};
use crate::model::{Field, SignalInfo};
use crate::util::{EntryKind, file_name_string, list_entries, now_local_iso_string, write_json_stdout};

#[derive(Debug, Default, Serialize)]
pub struct RegenerateReport {
    pub generated: Vec<String>,
    pub kept_existing: usize,
    pub kept_manual: usize,
    pub missing_pdf: Vec<String>,
    pub failed: Vec<String>,
}

pub fn run(args: RegenerateArgs) -> Result<()> {
    let pipeline = SignalPipeline::new(&args.extraction)?;
    let report = regenerate_missing(&args.data_root, &args.recipients, |pdf| {
        pipeline.extract_pdf(pdf)
    })?;

    info!(
        data_root = %args.data_root.display(),
        generated = report.generated.len(),
        kept_existing = report.kept_existing,
        kept_manual = report.kept_manual,
        missing_pdf = report.missing_pdf.len(),
        failed = report.failed.len(),
        "metadata regeneration finished"
    );

    if args.json {
        return write_json_stdout(&report);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Generated: {}", report.generated.len())?;
    for folder in &report.generated {
        writeln!(output, "\t{folder}")?;
    }
    writeln!(output, "Kept existing: {}", report.kept_existing)?;
    writeln!(output, "\tuser-entered: {}", report.kept_manual)?;
    writeln!(output, "Missing pdf: {}", report.missing_pdf.len())?;
    writeln!(output, "Failed: {}", report.failed.len())?;
    for folder in &report.failed {
        writeln!(output, "\t{folder}")?;
    }
    output.flush()?;
    Ok(())
}

/// Writes `signal_info.json` for every signal folder that has no metadata
/// file yet but holds `<folder name>.pdf`. Existing metadata, user-entered
/// or not, is never touched.
pub fn regenerate_missing<F>(root: &Path, recipients: &[String], extract: F) -> Result<RegenerateReport>
where
    F: Fn(&Path) -> Result<Extraction>,
{
    let mut report = RegenerateReport::default();
    if !root.exists() {
        return Ok(report);
    }

    for recipient_dir in list_entries(root, EntryKind::Directory)? {
        let recipient = file_name_string(&recipient_dir)?;
        if !recipients.is_empty() && !recipients.contains(&recipient) {
            continue;
        }

        for signal_dir in list_entries(&recipient_dir, EntryKind::Directory)? {
            if has_any_metadata(&signal_dir)? {
                report.kept_existing += 1;
                match read_signal_info(&signal_dir) {
                    Ok(MetadataRead::Loaded(info)) if info.is_manual() => report.kept_manual += 1,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(folder = %signal_dir.display(), error = %err, "existing metadata unreadable; kept as is");
                    }
                }
                continue;
            }

            let folder_name = file_name_string(&signal_dir)?;
            let pdf_filename = format!("{folder_name}.pdf");
            let pdf_path = signal_dir.join(&pdf_filename);
            if !pdf_path.is_file() {
                debug!(folder = %signal_dir.display(), "no signal pdf; metadata not regenerated");
                report.missing_pdf.push(signal_dir.display().to_string());
                continue;
            }

            let extraction = match extract(&pdf_path) {
                Ok(extraction) => extraction,
                Err(err) => {
                    warn!(pdf = %pdf_path.display(), error = %err, "extraction failed; folder left without metadata");
                    report.failed.push(signal_dir.display().to_string());
                    continue;
                }
            };

            let record = &extraction.record;
            let identifier = match &record.identifier {
                Field::Present(identifier) => identifier.clone(),
                Field::Absent => folder_name.clone(),
            };
            let info = SignalInfo {
                serial_number: numeric_serial(&identifier, record.sender_text()).into(),
                id: identifier,
                fm: Some(record.sender_text().to_string()),
                theme: record.theme.display().to_string(),
                recipients: record.recipients.iter().cloned().collect(),
                attachments: record.attachments.clone(),
                processed_date: now_local_iso_string(),
                pdf_filename: Some(pdf_filename),
                manual_input: None,
                auto_generated: Some(true),
            };
            write_signal_info(&signal_dir, &info)?;
            info!(folder = %signal_dir.display(), "signal metadata regenerated");
            report.generated.push(signal_dir.display().to_string());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::bail;

    use super::*;
    use crate::fields::manual_record;
    use crate::model::Provenance;

    fn extraction(identifier: &str, sender: &str) -> Extraction {
        let mut record = manual_record(identifier, sender, Vec::new());
        record.provenance = Provenance::Extracted;
        Extraction {
            text: String::new(),
            record,
        }
    }

    #[test]
    fn regenerates_only_folders_without_metadata() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();

        let fresh = root.join("ALPHA").join("ID1");
        fs::create_dir_all(&fresh).expect("create");
        fs::write(fresh.join("ID1.pdf"), b"%PDF").expect("write pdf");

        let manual = root.join("ALPHA").join("ID2");
        fs::create_dir_all(&manual).expect("create");
        fs::write(manual.join("ID2.pdf"), b"%PDF").expect("write pdf");
        fs::write(manual.join("signal_info.json"), r#"{"id":"ID2","manual_input":true}"#)
            .expect("write metadata");

        let legacy = root.join("ALPHA").join("ID3");
        fs::create_dir_all(&legacy).expect("create");
        fs::write(legacy.join("ID3.pdf"), b"%PDF").expect("write pdf");
        fs::write(legacy.join("ID3_info.json"), "{}").expect("write legacy metadata");

        let no_pdf = root.join("BRAVO").join("ID4");
        fs::create_dir_all(&no_pdf).expect("create");

        let report = regenerate_missing(root, &[], |_| Ok(extraction("ID1", "SENDER")))
            .expect("regenerate");
        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.kept_existing, 2);
        assert_eq!(report.kept_manual, 1);
        assert_eq!(report.missing_pdf.len(), 1);

        let MetadataRead::Loaded(info) = read_signal_info(&fresh).expect("read") else {
            panic!("regenerated metadata should load");
        };
        assert_eq!(info.id, "ID1");
        assert_eq!(info.auto_generated, Some(true));
        assert_eq!(info.pdf_filename.as_deref(), Some("ID1.pdf"));

        let MetadataRead::Loaded(kept) = read_signal_info(&manual).expect("read") else {
            panic!("manual metadata should load");
        };
        assert!(kept.is_manual());
        assert_eq!(kept.auto_generated, None);
        assert!(!legacy.join("signal_info.json").exists());
    }

    #[test]
    fn extraction_failures_are_reported_and_recipient_filter_applies() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();
        for recipient in ["ALPHA", "BRAVO"] {
            let folder = root.join(recipient).join("ID1");
            fs::create_dir_all(&folder).expect("create");
            fs::write(folder.join("ID1.pdf"), b"%PDF").expect("write pdf");
        }

        let report = regenerate_missing(root, &["BRAVO".to_string()], |_| bail!("pdftotext missing"))
            .expect("regenerate");
        assert!(report.generated.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].contains("BRAVO"));
    }
}
