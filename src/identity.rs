use sha2::{Digest, Sha256};

pub const SERIAL_HEX_LEN: usize = 12;

/// Content identity of a signal: first 12 hex digits (uppercase) of
/// SHA-256 over `identifier|sender`, both trimmed.
pub fn serial(identifier: &str, sender: &str) -> String {
    let combined = format!("{}|{}", identifier.trim(), sender.trim());
    let digest = Sha256::digest(combined.as_bytes());
    let hex = format!("{digest:x}");
    hex[..SERIAL_HEX_LEN].to_ascii_uppercase()
}

/// Numeric tag shown to users and stored as `serial_number`. Not used for
/// identity or versioning.
pub fn numeric_serial(identifier: &str, sender: &str) -> u64 {
    let digest = md5::compute(format!("{identifier}_{sender}").as_bytes());
    let bytes = digest.0;
    u64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn versioned_identifier(identifier: &str, version: u32) -> String {
    if version == 0 {
        identifier.to_string()
    } else {
        format!("{identifier}({version})")
    }
}

/// Splits an on-disk folder name into its base identifier and version
/// suffix. Names without a trailing `(N)` have version 0.
pub fn split_versioned(name: &str) -> (&str, u32) {
    let Some(without_close) = name.strip_suffix(')') else {
        return (name, 0);
    };
    let Some(open) = without_close.rfind('(') else {
        return (name, 0);
    };

    let digits = &without_close[open + 1..];
    if digits.is_empty() || !digits.chars().all(|character| character.is_ascii_digit()) {
        return (name, 0);
    }

    match digits.parse::<u32>() {
        Ok(version) => (&name[..open], version),
        Err(_) => (name, 0),
    }
}
