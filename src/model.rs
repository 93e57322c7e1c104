use std::collections::BTreeSet;

use serde::{Deserialize, Serialize, Serializer};

pub const UNAVAILABLE: &str = "Μη διαθέσιμο";
pub const UNKNOWN_SENDER: &str = "UNKNOWN";
pub const METADATA_FILE_NAME: &str = "signal_info.json";
pub const MANUAL_THEME: &str = "Manual Signal Entry";

/// A value extracted from free text. `Absent` is rendered as the
/// [`UNAVAILABLE`] sentinel only when serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Present(T),
    Absent,
}

impl<T> Field<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }
}

impl Field<String> {
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Field::Absent
        } else {
            Field::Present(trimmed.to_string())
        }
    }

    pub fn display(&self) -> &str {
        match self {
            Field::Present(value) => value,
            Field::Absent => UNAVAILABLE,
        }
    }
}

impl Serialize for Field<String> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Extracted,
    Manual,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub identifier: Field<String>,
    pub sender: Field<String>,
    pub theme: Field<String>,
    pub recipients: BTreeSet<String>,
    pub attachments: Vec<String>,
    pub provenance: Provenance,
}

impl CandidateRecord {
    pub fn identifier_text(&self) -> &str {
        self.identifier.display()
    }

    pub fn sender_text(&self) -> &str {
        self.sender.display()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub generated_at: String,
    pub meaningful_chars: usize,
    pub manual_input_required: bool,
    pub serial: String,
    pub numeric_serial: u64,
    pub record: CandidateRecord,
}

/// Contents of `signal_info.json`. Every field is optional on read so that
/// trees written by older tooling still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fm: Option<String>,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub serial_number: serde_json::Value,
    #[serde(default)]
    pub processed_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_input: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_generated: Option<bool>,
}

impl SignalInfo {
    pub fn is_manual(&self) -> bool {
        self.manual_input.unwrap_or(false)
    }
}
