use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::StateMap;
use super::metadata::{MetadataRead, read_signal_info};
use crate::identity::{serial, split_versioned};
use crate::util::{EntryKind, file_name_string, list_entries};

/// Rebuilds the identity state from `<root>/<recipient>/<signal folder>`.
pub fn scan(root: &Path) -> Result<StateMap> {
    let mut state = StateMap::default();

    if !root.exists() {
        debug!(root = %root.display(), "data root does not exist; nothing to scan");
        return Ok(state);
    }

    let mut folders = 0usize;
    for recipient_dir in list_entries(root, EntryKind::Directory)? {
        let Ok(recipient) = file_name_string(&recipient_dir) else {
            warn!(path = %recipient_dir.display(), "skipping recipient folder with non UTF-8 name");
            continue;
        };

        for signal_dir in list_entries(&recipient_dir, EntryKind::Directory)? {
            let Ok(folder_name) = file_name_string(&signal_dir) else {
                warn!(path = %signal_dir.display(), "skipping signal folder with non UTF-8 name");
                continue;
            };

            let (signal_id, version) = split_versioned(&folder_name);
            let metadata = read_signal_info(&signal_dir)?;
            if let MetadataRead::Malformed(reason) = &metadata {
                warn!(
                    path = %signal_dir.display(),
                    reason = %reason,
                    "unreadable signal metadata; sender treated as unknown"
                );
            }

            let sender = metadata.stored_sender();
            let signal_serial = serial(signal_id, sender);
            state.register_holding(&signal_serial, signal_id, sender, &recipient);
            state.register_version(&signal_serial, &recipient, version);
            folders += 1;
        }
    }

    debug!(
        root = %root.display(),
        folders,
        signals = state.len(),
        "scanned data root"
    );
    Ok(state)
}
