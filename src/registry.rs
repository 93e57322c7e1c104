use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Allow-list of recipient names the operator has registered. Detected
/// recipients outside this list are never reported.
#[derive(Debug, Clone, Default)]
pub struct RecipientRegistry {
    names: Vec<String>,
}

impl RecipientRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "recipient list missing; no recipients will be detected");
            return Ok(Self::default());
        }

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let names: Vec<String> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let registry = Self::new(names);
        if registry.is_empty() {
            warn!(path = %path.display(), "recipient list is empty; no recipients will be detected");
        }
        info!(path = %path.display(), recipients = registry.len(), "loaded recipient list");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    pub fn filter<I>(&self, detected: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = String>,
    {
        detected
            .into_iter()
            .filter(|name| self.contains(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_deduplicates_preserving_order() {
        let registry = RecipientRegistry::new([" ΣΥ ΗΠΕΙΡΟΥ ", "4501 ΠΜΥ", "", "ΣΥ ΗΠΕΙΡΟΥ"]);
        assert_eq!(registry.names, ["ΣΥ ΗΠΕΙΡΟΥ", "4501 ΠΜΥ"]);
    }

    #[test]
    fn filter_keeps_only_exact_allow_list_members() {
        let registry = RecipientRegistry::new(["UNIT ALPHA", "UNIT BRAVO"]);
        let detected = ["UNIT ALPHA", "UNIT ALPHA 2", "unit bravo", "UNIT BRAVO"]
            .into_iter()
            .map(String::from);

        let filtered = registry.filter(detected);
        assert_eq!(
            filtered.into_iter().collect::<Vec<String>>(),
            vec!["UNIT ALPHA".to_string(), "UNIT BRAVO".to_string()]
        );
    }

    #[test]
    fn load_reads_json_array_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("recipients.json");

        let missing = RecipientRegistry::load(&path).expect("missing list is not an error");
        assert!(missing.is_empty());

        fs::write(&path, r#"["ΛΑΦ ΙΩΑΝΝΙΝΩΝ", "ΣΠ ΙΩΑΝΝΙΝΩΝ"]"#).expect("write list");
        let loaded = RecipientRegistry::load(&path).expect("list loads");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("ΣΠ ΙΩΑΝΝΙΝΩΝ"));

        fs::write(&path, "{not json").expect("write garbage");
        assert!(RecipientRegistry::load(&path).is_err());
    }
}
