use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::metadata::{MetadataRead, has_any_metadata, read_signal_info};
use super::resolver::{Resolution, VersionResolver, next_free_folder_version};
use super::*;
use crate::fields::manual_record;
use crate::identity::serial;
use crate::model::{CandidateRecord, Field, Provenance, UNKNOWN_SENDER};

fn signal_folder(root: &Path, recipient: &str, folder: &str, sender: Option<&str>) {
    let dir = root.join(recipient).join(folder);
    fs::create_dir_all(&dir).expect("create signal folder");
    if let Some(sender) = sender {
        let info = serde_json::json!({
            "id": folder,
            "fm": sender,
            "theme": "Test Subject",
            "recipients": [recipient],
            "attachments": [],
            "serial_number": 12345,
            "processed_date": "2025-01-01T10:00:00.000000",
            "manual_input": false
        });
        fs::write(dir.join("signal_info.json"), info.to_string()).expect("write metadata");
    }
}

fn broken_folder(root: &Path, recipient: &str, folder: &str) {
    let dir = root.join(recipient).join(folder);
    fs::create_dir_all(&dir).expect("create signal folder");
    fs::write(dir.join("signal_info.json"), "{ not json").expect("write metadata");
}

fn record(identifier: &str, sender: &str) -> CandidateRecord {
    manual_record(identifier, sender, Vec::new())
}

fn recipients(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn scan_of_missing_root_is_empty() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = scan(&dir.path().join("DATA")).expect("scan");
    assert!(state.is_empty());
}

#[test]
fn scan_reconstructs_holders_and_versions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));
    signal_folder(root, "ALPHA", "ID1(2)", Some("SENDER"));
    signal_folder(root, "BRAVO", "ID1", Some("SENDER"));
    signal_folder(root, "BRAVO", "ID1(5)", Some("SENDER"));
    signal_folder(root, "BRAVO", "ID2", None);
    fs::write(root.join("stray.txt"), "not a recipient").expect("write stray file");

    let state = scan(root).expect("scan");
    let entry = state.get(&serial("ID1", "SENDER")).expect("ID1 scanned");

    assert_eq!(entry.signal_id, "ID1");
    assert_eq!(entry.sender, "SENDER");
    assert_eq!(entry.recipients, vec!["ALPHA".to_string(), "BRAVO".to_string()]);
    assert_eq!(entry.versions["ALPHA"], BTreeSet::from([2]));
    assert_eq!(entry.versions["BRAVO"], BTreeSet::from([5]));

    let unknown = state
        .get(&serial("ID2", UNKNOWN_SENDER))
        .expect("folder without metadata is defaulted");
    assert_eq!(unknown.sender, UNKNOWN_SENDER);
    assert!(unknown.versions.is_empty());
}

#[test]
fn corrupt_metadata_does_not_abort_scan() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    broken_folder(root, "ALPHA", "ID9");
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));

    let state = scan(root).expect("scan survives corrupt metadata");
    assert_eq!(state.len(), 2);
    assert!(state.holds(&serial("ID9", UNKNOWN_SENDER), "ALPHA"));
    assert!(state.holds(&serial("ID1", "SENDER"), "ALPHA"));
}

#[test]
fn metadata_read_distinguishes_absent_from_malformed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "EMPTY", None);
    broken_folder(root, "ALPHA", "BROKEN");
    signal_folder(root, "ALPHA", "GOOD", Some("SENDER"));

    let absent = read_signal_info(&root.join("ALPHA/EMPTY")).expect("read");
    assert!(matches!(absent, MetadataRead::Absent));
    let malformed = read_signal_info(&root.join("ALPHA/BROKEN")).expect("read");
    assert!(matches!(malformed, MetadataRead::Malformed(_)));
    assert_eq!(malformed.stored_sender(), UNKNOWN_SENDER);
    let loaded = read_signal_info(&root.join("ALPHA/GOOD")).expect("read");
    assert_eq!(loaded.stored_sender(), "SENDER");
}

#[test]
fn legacy_metadata_file_counts_as_metadata() {
    let dir = tempfile::tempdir().expect("temp dir");
    let folder = dir.path().join("ID1");
    fs::create_dir_all(&folder).expect("create folder");
    assert!(!has_any_metadata(&folder).expect("inspect"));

    fs::write(folder.join("ID1_info.json"), "{}").expect("write legacy metadata");
    assert!(has_any_metadata(&folder).expect("inspect"));
}

#[test]
fn resend_to_holder_is_reported_then_versioned_on_request() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));

    let skipped = plan(root, &record("ID1", "SENDER"), &recipients(&["ALPHA"]), ResendPolicy::Skip)
        .expect("plan");
    assert_eq!(skipped.holders, vec!["ALPHA".to_string()]);
    assert_eq!(skipped.entries[0].resolution, Resolution::AlreadyHeld);
    assert_eq!(skipped.entries[0].on_disk_identifier, None);
    assert_eq!(skipped.writable().count(), 0);

    let forced = plan(root, &record("ID1", "SENDER"), &recipients(&["ALPHA"]), ResendPolicy::Version)
        .expect("plan");
    assert_eq!(forced.entries[0].resolution, Resolution::Resend { version: 1 });
    assert_eq!(forced.entries[0].on_disk_identifier.as_deref(), Some("ID1(1)"));
}

#[test]
fn different_sender_on_same_identifier_takes_name_conflict_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("OLD SENDER"));

    let planned = plan(root, &record("ID1", "NEW SENDER"), &recipients(&["ALPHA"]), ResendPolicy::Skip)
        .expect("plan");
    assert!(planned.holders.is_empty());
    assert_eq!(planned.entries[0].resolution, Resolution::NameConflict { version: 1 });
    assert_eq!(planned.entries[0].on_disk_identifier.as_deref(), Some("ID1(1)"));
}

#[test]
fn name_conflict_counter_follows_existing_folders_not_resend_versions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("OLD SENDER"));
    signal_folder(root, "ALPHA", "ID1(1)", Some("OLD SENDER"));

    let mut resolver = VersionResolver::scan(root).expect("scan");
    assert_eq!(resolver.next_resend_version("ID1", "NEW SENDER", "ALPHA"), 1);

    let resolution = resolver
        .resolve("ID1", "NEW SENDER", "ALPHA", ResendPolicy::Version)
        .expect("resolve");
    assert_eq!(resolution, Resolution::NameConflict { version: 2 });
}

#[test]
fn resend_onto_folder_of_another_signal_is_blocked() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));
    signal_folder(root, "ALPHA", "ID1(1)", Some("OTHER SENDER"));

    let planned = plan(root, &record("ID1", "SENDER"), &recipients(&["ALPHA"]), ResendPolicy::Version)
        .expect("plan");
    assert_eq!(planned.entries[0].resolution, Resolution::ResendBlocked { version: 1 });
    assert_eq!(planned.entries[0].on_disk_identifier, None);
    assert_eq!(planned.writable().count(), 0);
}

#[test]
fn colliding_folder_without_readable_metadata_is_versioned() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", None);
    broken_folder(root, "BRAVO", "ID1");

    let planned = plan(
        root,
        &record("ID1", "SENDER"),
        &recipients(&["ALPHA", "BRAVO"]),
        ResendPolicy::Skip,
    )
    .expect("plan");
    for entry in &planned.entries {
        assert_eq!(entry.resolution, Resolution::NameConflict { version: 1 });
    }
}

#[test]
fn fresh_recipient_receives_bare_identifier() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));

    let planned = plan(root, &record("ID1", "SENDER"), &recipients(&["BRAVO"]), ResendPolicy::Skip)
        .expect("plan");
    assert_eq!(planned.entries[0].resolution, Resolution::New);
    assert_eq!(planned.entries[0].on_disk_identifier.as_deref(), Some("ID1"));
}

#[test]
fn resend_versions_reuse_gaps_and_never_repeat_after_registration() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    signal_folder(root, "ALPHA", "ID1", Some("SENDER"));
    signal_folder(root, "ALPHA", "ID1(1)", Some("SENDER"));
    signal_folder(root, "ALPHA", "ID1(3)", Some("SENDER"));

    let mut resolver = VersionResolver::scan(root).expect("scan");
    assert_eq!(resolver.next_resend_version("ID1", "SENDER", "ALPHA"), 2);

    assert!(resolver.register_version("ID1", "SENDER", "ALPHA", 2));
    assert_eq!(resolver.next_resend_version("ID1", "SENDER", "ALPHA"), 4);

    let resolution = resolver
        .resolve("ID1", "SENDER", "ALPHA", ResendPolicy::Version)
        .expect("resolve");
    assert_eq!(resolution, Resolution::Resend { version: 4 });
    assert_eq!(resolver.next_resend_version("ID1", "SENDER", "ALPHA"), 5);
    assert_eq!(
        resolver.state().versions_in_use(&serial("ID1", "SENDER"), "ALPHA"),
        BTreeSet::from([1, 2, 3, 4])
    );
}

#[test]
fn register_version_ignores_unknown_serial() {
    let mut state = StateMap::default();
    assert!(!state.register_version("ABCDEF012345", "ALPHA", 1));
    assert!(state.is_empty());
}

#[test]
fn next_free_folder_version_skips_existing_names() {
    let dir = tempfile::tempdir().expect("temp dir");
    let recipient_dir = dir.path().join("ALPHA");
    fs::create_dir_all(recipient_dir.join("ID1(1)")).expect("create");
    fs::create_dir_all(recipient_dir.join("ID1(2)")).expect("create");
    fs::create_dir_all(recipient_dir.join("ID1(4)")).expect("create");
    assert_eq!(next_free_folder_version(&recipient_dir, "ID1"), 3);
}

#[test]
fn plan_deduplicates_recipients() {
    let dir = tempfile::tempdir().expect("temp dir");
    let planned = plan(
        dir.path(),
        &record("ID1", "SENDER"),
        &recipients(&["ALPHA", " ALPHA ", "", "BRAVO"]),
        ResendPolicy::Skip,
    )
    .expect("plan");
    let names = planned
        .entries
        .iter()
        .map(|entry| entry.recipient.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["ALPHA", "BRAVO"]);
}

#[test]
fn plan_requires_identifier() {
    let dir = tempfile::tempdir().expect("temp dir");
    let candidate = CandidateRecord {
        identifier: Field::Absent,
        sender: Field::Present("SENDER".to_string()),
        theme: Field::Absent,
        recipients: BTreeSet::new(),
        attachments: Vec::new(),
        provenance: Provenance::Extracted,
    };
    assert!(plan(dir.path(), &candidate, &recipients(&["ALPHA"]), ResendPolicy::Skip).is_err());
}
