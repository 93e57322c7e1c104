use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, info, warn};

use crate::identity::numeric_serial;
use crate::ledger::RecipientPlan;
use crate::ledger::metadata::{has_any_metadata, write_signal_info};
use crate::model::{CandidateRecord, Field, Provenance, SignalInfo};
use crate::util::{
    EntryKind, collapse_whitespace, ensure_directory, file_name_string, list_entries,
    now_local_iso_string,
};

const FUZZY_MATCH_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopiedAttachment {
    pub name: String,
    pub source: String,
    pub matched: MatchKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub recipient: String,
    pub on_disk_identifier: String,
    pub folder: String,
    pub copied: Vec<CopiedAttachment>,
    pub missing: Vec<String>,
}

/// Writes planned signal entries into `root/<recipient>/<onDiskIdentifier>/`.
pub struct SignalWriter<'a> {
    root: &'a Path,
    downloads_dir: &'a Path,
    signal_pdf: PathBuf,
}

impl<'a> SignalWriter<'a> {
    pub fn new(root: &'a Path, downloads_dir: &'a Path, signal_pdf: PathBuf) -> Self {
        Self {
            root,
            downloads_dir,
            signal_pdf,
        }
    }

    pub fn commit(
        &self,
        record: &CandidateRecord,
        recipients: &[String],
        entry: &RecipientPlan,
    ) -> Result<CommitOutcome> {
        let Some(on_disk_identifier) = entry.on_disk_identifier.as_deref() else {
            bail!(
                "recipient {} already holds this signal; nothing to write",
                entry.recipient
            );
        };
        let Field::Present(identifier) = &record.identifier else {
            bail!("signal identifier unavailable; refusing to write");
        };
        validate_folder_name(&entry.recipient)?;
        validate_folder_name(on_disk_identifier)?;

        let folder = self.root.join(&entry.recipient).join(on_disk_identifier);
        if folder.exists() && has_any_metadata(&folder)? {
            bail!(
                "signal folder already holds metadata; refusing to overwrite: {}",
                folder.display()
            );
        }
        ensure_directory(&folder)?;

        let pdf_filename = format!("{on_disk_identifier}.pdf");
        if !self.signal_pdf.is_file() {
            bail!("signal pdf not found: {}", self.signal_pdf.display());
        }
        let pdf_target = folder.join(&pdf_filename);
        fs::copy(&self.signal_pdf, &pdf_target).with_context(|| {
            format!(
                "failed to copy {} to {}",
                self.signal_pdf.display(),
                pdf_target.display()
            )
        })?;

        let (copied, missing) = self.copy_attachments(&record.attachments, &folder)?;

        let info = SignalInfo {
            id: on_disk_identifier.to_string(),
            fm: Some(record.sender_text().to_string()),
            theme: record.theme.display().to_string(),
            recipients: recipients.to_vec(),
            attachments: record.attachments.clone(),
            serial_number: numeric_serial(identifier, record.sender_text()).into(),
            processed_date: now_local_iso_string(),
            pdf_filename: Some(pdf_filename),
            manual_input: Some(record.provenance == Provenance::Manual),
            auto_generated: None,
        };
        let metadata_path = write_signal_info(&folder, &info)?;

        info!(
            recipient = %entry.recipient,
            folder = %folder.display(),
            provenance = record.provenance.as_str(),
            attachments = copied.len(),
            missing = missing.len(),
            "signal committed"
        );
        debug!(path = %metadata_path.display(), "metadata written");

        Ok(CommitOutcome {
            recipient: entry.recipient.clone(),
            on_disk_identifier: on_disk_identifier.to_string(),
            folder: folder.display().to_string(),
            copied,
            missing,
        })
    }

    fn copy_attachments(
        &self,
        attachments: &[String],
        folder: &Path,
    ) -> Result<(Vec<CopiedAttachment>, Vec<String>)> {
        let mut copied = Vec::new();
        let mut missing = Vec::new();

        for name in attachments {
            if validate_folder_name(name).is_err() {
                warn!(attachment = %name, "attachment name is not a plain file name; skipped");
                missing.push(name.clone());
                continue;
            }

            let Some((source, matched)) = find_download(self.downloads_dir, name)? else {
                warn!(attachment = %name, "attachment not found in downloads");
                missing.push(name.clone());
                continue;
            };

            let target = folder.join(name);
            fs::copy(&source, &target).with_context(|| {
                format!("failed to copy {} to {}", source.display(), target.display())
            })?;
            copied.push(CopiedAttachment {
                name: name.clone(),
                source: file_name_string(&source)?,
                matched,
            });
        }

        Ok((copied, missing))
    }

    /// Removes every regular file in the downloads folder.
    pub fn clear_downloads(&self) -> Result<usize> {
        if !self.downloads_dir.exists() {
            return Ok(0);
        }

        let files = list_entries(self.downloads_dir, EntryKind::File)?;
        for file in &files {
            fs::remove_file(file)
                .with_context(|| format!("failed to remove {}", file.display()))?;
        }
        info!(
            downloads = %self.downloads_dir.display(),
            removed = files.len(),
            "downloads cleared"
        );
        Ok(files.len())
    }
}

pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name == "." || name == ".." {
        bail!("invalid folder name: {name:?}");
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        bail!("folder name must not contain path separators: {name:?}");
    }
    Ok(())
}

/// Every downloaded file other than the signal PDF, sorted by name.
pub fn list_download_attachments(downloads_dir: &Path, signal_pdf_name: &str) -> Result<Vec<String>> {
    if !downloads_dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for file in list_entries(downloads_dir, EntryKind::File)? {
        let name = file_name_string(&file)?;
        if name != signal_pdf_name {
            names.push(name);
        }
    }
    Ok(names)
}

/// Looks `name` up in `downloads_dir`: exact name, then case-insensitive
/// name, then the most similar file name above the fuzzy threshold.
pub fn find_download(downloads_dir: &Path, name: &str) -> Result<Option<(PathBuf, MatchKind)>> {
    let exact = downloads_dir.join(name);
    if exact.is_file() {
        return Ok(Some((exact, MatchKind::Exact)));
    }
    if !downloads_dir.exists() {
        return Ok(None);
    }

    let files = list_entries(downloads_dir, EntryKind::File)?;
    let lowered = name.to_lowercase();
    for file in &files {
        if file_name_string(file)?.to_lowercase() == lowered {
            return Ok(Some((file.clone(), MatchKind::CaseInsensitive)));
        }
    }

    let target = normalize_for_matching(name);
    let mut best: Option<(f32, &PathBuf)> = None;
    for file in &files {
        let score = filename_similarity(&target, &normalize_for_matching(&file_name_string(file)?));
        if score > FUZZY_MATCH_THRESHOLD && best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, file));
        }
    }

    Ok(best.map(|(score, file)| {
        debug!(attachment = %name, source = %file.display(), score, "fuzzy attachment match");
        (file.clone(), MatchKind::Fuzzy)
    }))
}

fn filename_similarity(left: &str, right: &str) -> f32 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    TextDiff::from_chars(left, right).ratio()
}

fn normalize_for_matching(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    let cleaned = stem
        .to_lowercase()
        .chars()
        .map(strip_greek_tonos)
        .filter(|character| {
            character.is_alphanumeric()
                || character.is_whitespace()
                || matches!(character, '-' | '_' | '.')
        })
        .collect::<String>();

    collapse_whitespace(&cleaned)
}

fn strip_greek_tonos(character: char) -> char {
    match character {
        'ά' => 'α',
        'έ' => 'ε',
        'ή' => 'η',
        'ί' | 'ϊ' | 'ΐ' => 'ι',
        'ό' => 'ο',
        'ύ' | 'ϋ' | 'ΰ' => 'υ',
        'ώ' => 'ω',
        other => other,
    }
}
