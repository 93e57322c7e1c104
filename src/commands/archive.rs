use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::{ArchiveArgs, RestoreArgs};
use crate::util::{EntryKind, ensure_directory, file_name_string, list_entries, write_json_stdout};
use crate::writer::validate_folder_name;

#[derive(Debug, Default, Serialize)]
pub struct MoveReport {
    pub from: String,
    pub to: String,
    pub moved: Vec<String>,
    pub missing: Vec<String>,
    pub conflicts: Vec<String>,
}

pub fn run_archive(args: ArchiveArgs) -> Result<()> {
    let report = archive(
        &args.data_root,
        &args.backup_root,
        &args.recipient,
        &args.label,
        &args.signals,
    )?;
    finish(report, args.json)
}

pub fn run_restore(args: RestoreArgs) -> Result<()> {
    let report = restore(
        &args.data_root,
        &args.backup_root,
        &args.recipient,
        &args.label,
        &args.signals,
    )?;
    finish(report, args.json)
}

fn finish(report: MoveReport, json: bool) -> Result<()> {
    info!(
        from = %report.from,
        to = %report.to,
        moved = report.moved.len(),
        missing = report.missing.len(),
        conflicts = report.conflicts.len(),
        "move finished"
    );

    if json {
        write_json_stdout(&report)?;
    } else {
        let mut output = io::BufWriter::new(io::stdout().lock());
        writeln!(output, "From: {}", report.from)?;
        writeln!(output, "To: {}", report.to)?;
        writeln!(output, "Moved: {}", report.moved.len())?;
        for name in &report.moved {
            writeln!(output, "\t{name}")?;
        }
        for name in &report.missing {
            writeln!(output, "Missing: {name}")?;
        }
        for name in &report.conflicts {
            writeln!(output, "Already exists: {name}")?;
        }
        output.flush()?;
    }

    if !report.conflicts.is_empty() {
        bail!(
            "{} folders already exist at the destination and were not moved",
            report.conflicts.len()
        );
    }
    Ok(())
}

/// Moves signal folders from `data_root/<recipient>/` into
/// `backup_root/<recipient>/<label>/` and drops the recipient folder once
/// it is empty.
pub fn archive(
    data_root: &Path,
    backup_root: &Path,
    recipient: &str,
    label: &str,
    signals: &[String],
) -> Result<MoveReport> {
    validate_folder_name(recipient)?;
    validate_folder_name(label)?;

    let source_dir = data_root.join(recipient);
    if !source_dir.is_dir() {
        bail!("recipient folder not found: {}", source_dir.display());
    }
    let target_dir = backup_root.join(recipient).join(label);

    let report = move_folders(&source_dir, &target_dir, signals)?;

    if list_entries(&source_dir, EntryKind::Directory)?.is_empty()
        && list_entries(&source_dir, EntryKind::File)?.is_empty()
    {
        fs::remove_dir(&source_dir)
            .with_context(|| format!("failed to remove {}", source_dir.display()))?;
        debug!(folder = %source_dir.display(), "removed empty recipient folder");
    }

    Ok(report)
}

/// Moves archived folders back into `data_root/<recipient>/`, never
/// replacing a folder that already exists there.
pub fn restore(
    data_root: &Path,
    backup_root: &Path,
    recipient: &str,
    label: &str,
    signals: &[String],
) -> Result<MoveReport> {
    validate_folder_name(recipient)?;
    validate_folder_name(label)?;

    let source_dir = backup_root.join(recipient).join(label);
    if !source_dir.is_dir() {
        bail!("backup folder not found: {}", source_dir.display());
    }
    let target_dir = data_root.join(recipient);

    move_folders(&source_dir, &target_dir, signals)
}

fn move_folders(source_dir: &Path, target_dir: &Path, signals: &[String]) -> Result<MoveReport> {
    let names = if signals.is_empty() {
        list_entries(source_dir, EntryKind::Directory)?
            .iter()
            .map(|path| file_name_string(path))
            .collect::<Result<Vec<String>>>()?
    } else {
        signals.to_vec()
    };

    let mut report = MoveReport {
        from: source_dir.display().to_string(),
        to: target_dir.display().to_string(),
        ..MoveReport::default()
    };
    if names.is_empty() {
        return Ok(report);
    }
    ensure_directory(target_dir)?;

    for name in names {
        validate_folder_name(&name)?;
        let source = source_dir.join(&name);
        let target = target_dir.join(&name);

        if !source.is_dir() {
            warn!(folder = %source.display(), "signal folder not found; skipped");
            report.missing.push(name);
            continue;
        }
        if target.exists() {
            warn!(folder = %target.display(), "destination already exists; not overwritten");
            report.conflicts.push(name);
            continue;
        }

        move_dir(&source, &target)?;
        debug!(from = %source.display(), to = %target.display(), "moved signal folder");
        report.moved.push(name);
    }

    Ok(report)
}

fn move_dir(source: &Path, target: &Path) -> Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    copy_dir_recursive(source, target)?;
    fs::remove_dir_all(source).with_context(|| format!("failed to remove {}", source.display()))
}

fn copy_dir_recursive(source: &Path, target: &Path) -> Result<()> {
    ensure_directory(target)?;
    for file in list_entries(source, EntryKind::File)? {
        let destination = target.join(file_name_string(&file)?);
        fs::copy(&file, &destination).with_context(|| {
            format!("failed to copy {} to {}", file.display(), destination.display())
        })?;
    }
    for dir in list_entries(source, EntryKind::Directory)? {
        copy_dir_recursive(&dir, &target.join(file_name_string(&dir)?))?;
    }
    Ok(())
}
