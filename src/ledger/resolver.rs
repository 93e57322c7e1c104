use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::StateMap;
use super::metadata::{MetadataRead, read_signal_info};
use super::scanner::scan;
use crate::identity::{serial, versioned_identifier};
use crate::model::{CandidateRecord, Field};

/// Caller's answer when a recipient already holds the same signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendPolicy {
    Skip,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    New,
    AlreadyHeld,
    Resend { version: u32 },
    /// Resend version whose folder already belongs to another signal.
    ResendBlocked { version: u32 },
    NameConflict { version: u32 },
}

impl Resolution {
    pub fn version(self) -> u32 {
        match self {
            Resolution::Resend { version }
            | Resolution::ResendBlocked { version }
            | Resolution::NameConflict { version } => version,
            Resolution::New | Resolution::AlreadyHeld => 0,
        }
    }

    pub fn writes(self) -> bool {
        !matches!(self, Resolution::AlreadyHeld | Resolution::ResendBlocked { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::New => "new",
            Resolution::AlreadyHeld => "already_held",
            Resolution::Resend { .. } => "resend",
            Resolution::ResendBlocked { .. } => "resend_blocked",
            Resolution::NameConflict { .. } => "name_conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientPlan {
    pub recipient: String,
    pub resolution: Resolution,
    pub on_disk_identifier: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionPlan {
    pub identifier: String,
    pub sender: String,
    pub serial: String,
    pub holders: Vec<String>,
    pub entries: Vec<RecipientPlan>,
}

impl ResolutionPlan {
    pub fn writable(&self) -> impl Iterator<Item = &RecipientPlan> {
        self.entries.iter().filter(|entry| entry.resolution.writes())
    }
}

pub struct VersionResolver<'a> {
    root: &'a Path,
    state: StateMap,
}

impl<'a> VersionResolver<'a> {
    pub fn new(root: &'a Path, state: StateMap) -> Self {
        Self { root, state }
    }

    /// Resolver over a fresh scan of `root`.
    pub fn scan(root: &'a Path) -> Result<Self> {
        Ok(Self::new(root, scan(root)?))
    }

    pub fn state(&self) -> &StateMap {
        &self.state
    }

    pub fn recipients_with_signal(&self, identifier: &str, sender: &str) -> Vec<String> {
        self.state.recipients_with(&serial(identifier, sender))
    }

    pub fn next_resend_version(&self, identifier: &str, sender: &str, recipient: &str) -> u32 {
        self.state
            .next_free_version(&serial(identifier, sender), recipient)
    }

    pub fn register_version(&mut self, identifier: &str, sender: &str, recipient: &str, version: u32) -> bool {
        self.state
            .register_version(&serial(identifier, sender), recipient, version)
    }

    pub fn resolve(
        &mut self,
        identifier: &str,
        sender: &str,
        recipient: &str,
        policy: ResendPolicy,
    ) -> Result<Resolution> {
        let signal_serial = serial(identifier, sender);

        if self.state.holds(&signal_serial, recipient) {
            return Ok(match policy {
                ResendPolicy::Skip => Resolution::AlreadyHeld,
                ResendPolicy::Version => {
                    let version = self.next_resend_version(identifier, sender, recipient);
                    self.register_version(identifier, sender, recipient, version);
                    Resolution::Resend { version }
                }
            });
        }

        match self.name_conflict_version(identifier, &signal_serial, recipient)? {
            Some(version) => Ok(Resolution::NameConflict { version }),
            None => Ok(Resolution::New),
        }
    }

    fn name_conflict_version(
        &self,
        identifier: &str,
        signal_serial: &str,
        recipient: &str,
    ) -> Result<Option<u32>> {
        let recipient_dir = self.root.join(recipient);
        let existing = recipient_dir.join(identifier);
        if !existing.exists() {
            return Ok(None);
        }

        let metadata = read_signal_info(&existing)?;
        let conflicting = match &metadata {
            MetadataRead::Loaded(_) => serial(identifier, metadata.stored_sender()) != signal_serial,
            MetadataRead::Malformed(reason) => {
                warn!(
                    path = %existing.display(),
                    reason = %reason,
                    "colliding folder has unreadable metadata; versioning new entry"
                );
                true
            }
            MetadataRead::Absent => {
                warn!(
                    path = %existing.display(),
                    "colliding folder has no metadata; versioning new entry"
                );
                true
            }
        };

        if !conflicting {
            return Ok(None);
        }

        Ok(Some(next_free_folder_version(&recipient_dir, identifier)))
    }

    pub fn target_dir(&self, recipient: &str, on_disk_identifier: &str) -> PathBuf {
        self.root.join(recipient).join(on_disk_identifier)
    }
}

/// Lowest N >= 1 such that `identifier(N)` is not yet a child of `recipient_dir`.
pub fn next_free_folder_version(recipient_dir: &Path, identifier: &str) -> u32 {
    let mut version = 1;
    while recipient_dir
        .join(versioned_identifier(identifier, version))
        .exists()
    {
        version += 1;
    }
    version
}

pub fn plan(
    root: &Path,
    record: &CandidateRecord,
    recipients: &[String],
    policy: ResendPolicy,
) -> Result<ResolutionPlan> {
    let Field::Present(identifier) = &record.identifier else {
        bail!("signal identifier unavailable; manual entry is required before resolving");
    };
    let sender = record.sender_text();

    let mut resolver = VersionResolver::scan(root)?;
    let holders = resolver.recipients_with_signal(identifier, sender);
    debug!(
        root = %root.display(),
        signals = resolver.state().len(),
        holders = holders.len(),
        "identity state loaded"
    );

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for recipient in recipients {
        let recipient = recipient.trim();
        if recipient.is_empty() || !seen.insert(recipient.to_string()) {
            continue;
        }

        let mut resolution = resolver.resolve(identifier, sender, recipient, policy)?;
        if let Resolution::Resend { version } = resolution {
            let folder = versioned_identifier(identifier, version);
            if resolver.target_dir(recipient, &folder).exists() {
                warn!(
                    recipient,
                    folder = %folder,
                    "resend version already exists on disk under another signal; not written"
                );
                resolution = Resolution::ResendBlocked { version };
            }
        }
        let on_disk_identifier = resolution
            .writes()
            .then(|| versioned_identifier(identifier, resolution.version()));

        debug!(
            recipient,
            outcome = resolution.as_str(),
            version = resolution.version(),
            "resolved recipient"
        );
        entries.push(RecipientPlan {
            recipient: recipient.to_string(),
            resolution,
            on_disk_identifier,
        });
    }

    let plan = ResolutionPlan {
        identifier: identifier.clone(),
        sender: sender.to_string(),
        serial: serial(identifier, sender),
        holders,
        entries,
    };
    info!(
        identifier = %plan.identifier,
        serial = %plan.serial,
        recipients = plan.entries.len(),
        writable = plan.writable().count(),
        "resolution planned"
    );
    Ok(plan)
}
