use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::{METADATA_FILE_NAME, SignalInfo, UNKNOWN_SENDER};
use crate::util::{EntryKind, file_name_string, list_entries, write_json_pretty};

const LEGACY_METADATA_SUFFIX: &str = "_info.json";

#[derive(Debug, Clone)]
pub enum MetadataRead {
    Absent,
    Malformed(String),
    Loaded(SignalInfo),
}

impl MetadataRead {
    pub fn stored_sender(&self) -> &str {
        match self {
            MetadataRead::Loaded(info) => info.fm.as_deref().unwrap_or(UNKNOWN_SENDER),
            MetadataRead::Absent | MetadataRead::Malformed(_) => UNKNOWN_SENDER,
        }
    }
}

pub fn metadata_path(signal_dir: &Path) -> PathBuf {
    signal_dir.join(METADATA_FILE_NAME)
}

/// Absent and unparsable files are reported as values; any other read
/// failure is an error.
pub fn read_signal_info(signal_dir: &Path) -> Result<MetadataRead> {
    let path = metadata_path(signal_dir);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(MetadataRead::Absent),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    match serde_json::from_slice::<SignalInfo>(&raw) {
        Ok(info) => Ok(MetadataRead::Loaded(info)),
        Err(error) => Ok(MetadataRead::Malformed(error.to_string())),
    }
}

/// True when the folder holds `signal_info.json` or an older
/// `<name>_info.json` file.
pub fn has_any_metadata(signal_dir: &Path) -> Result<bool> {
    if metadata_path(signal_dir).exists() {
        return Ok(true);
    }

    for file in list_entries(signal_dir, EntryKind::File)? {
        if file_name_string(&file)?.ends_with(LEGACY_METADATA_SUFFIX) {
            return Ok(true);
        }
    }

    Ok(false)
}

pub fn write_signal_info(signal_dir: &Path, info: &SignalInfo) -> Result<PathBuf> {
    let path = metadata_path(signal_dir);
    write_json_pretty(&path, info)?;
    Ok(path)
}
