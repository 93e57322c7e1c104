use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub mod metadata;
pub mod resolver;
pub mod scanner;
#[cfg(test)]
mod tests;

pub use resolver::{RecipientPlan, ResendPolicy, ResolutionPlan, plan};
pub use scanner::scan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalState {
    pub serial: String,
    pub signal_id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub versions: BTreeMap<String, BTreeSet<u32>>,
}

impl SignalState {
    fn new(serial: &str, signal_id: &str, sender: &str) -> Self {
        Self {
            serial: serial.to_string(),
            signal_id: signal_id.to_string(),
            sender: sender.to_string(),
            recipients: Vec::new(),
            versions: BTreeMap::new(),
        }
    }
}

/// Identity state rebuilt from the data tree, keyed by serial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateMap {
    signals: BTreeMap<String, SignalState>,
}

impl StateMap {
    pub fn get(&self, serial: &str) -> Option<&SignalState> {
        self.signals.get(serial)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn signals(&self) -> impl Iterator<Item = &SignalState> {
        self.signals.values()
    }

    pub fn holds(&self, serial: &str, recipient: &str) -> bool {
        self.get(serial)
            .map(|state| state.recipients.iter().any(|held| held == recipient))
            .unwrap_or(false)
    }

    pub fn recipients_with(&self, serial: &str) -> Vec<String> {
        self.get(serial)
            .map(|state| state.recipients.clone())
            .unwrap_or_default()
    }

    pub fn versions_in_use(&self, serial: &str, recipient: &str) -> BTreeSet<u32> {
        self.get(serial)
            .and_then(|state| state.versions.get(recipient))
            .cloned()
            .unwrap_or_default()
    }

    /// Smallest positive version not yet used by `recipient` under `serial`.
    pub fn next_free_version(&self, serial: &str, recipient: &str) -> u32 {
        let used = self.versions_in_use(serial, recipient);
        (1..)
            .find(|candidate| !used.contains(candidate))
            .unwrap_or(1)
    }

    pub fn register_holding(&mut self, serial: &str, signal_id: &str, sender: &str, recipient: &str) {
        let state = self
            .signals
            .entry(serial.to_string())
            .or_insert_with(|| SignalState::new(serial, signal_id, sender));
        if !state.recipients.iter().any(|held| held == recipient) {
            state.recipients.push(recipient.to_string());
        }
    }

    /// Returns false when `serial` is unknown; versions are only tracked for
    /// signals already present in the tree.
    pub fn register_version(&mut self, serial: &str, recipient: &str, version: u32) -> bool {
        if version == 0 {
            return false;
        }
        let Some(state) = self.signals.get_mut(serial) else {
            return false;
        };
        state
            .versions
            .entry(recipient.to_string())
            .or_default()
            .insert(version);
        true
    }
}
