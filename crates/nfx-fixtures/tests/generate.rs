use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nfx_fixtures::{
    ARCHIVE_FILE_NAME, BYTES_SCALAR_FILE_NAME, FixtureConfig, MANIFEST_FILE_NAME,
    MATRIX_BYTE_ORDERS, MATRIX_LAYOUTS, UNICODE_SCALAR_FILE_NAME, generate, matrix_file_name,
};
use nfx_dtype::MATRIX_DTYPES;

fn corpus_snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut snapshot = BTreeMap::new();
    for entry in fs::read_dir(dir).expect("read output dir") {
        let entry = entry.expect("dir entry");
        let name = entry.file_name().into_string().expect("utf-8 name");
        snapshot.insert(name, fs::read(entry.path()).expect("read file"));
    }
    snapshot
}

/// Walk the local file headers of a STORE-only archive.
fn archive_members(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut members = Vec::new();
    let mut pos = 0usize;
    while pos + 4 <= data.len() && data[pos..pos + 4] == [0x50, 0x4B, 0x03, 0x04] {
        let compression = u16::from_le_bytes([data[pos + 8], data[pos + 9]]);
        assert_eq!(compression, 0, "entries must be STOREd");
        let size = u32::from_le_bytes([
            data[pos + 18],
            data[pos + 19],
            data[pos + 20],
            data[pos + 21],
        ]) as usize;
        let name_len = u16::from_le_bytes([data[pos + 26], data[pos + 27]]) as usize;
        let extra_len = u16::from_le_bytes([data[pos + 28], data[pos + 29]]) as usize;
        let name_start = pos + 30;
        let name = std::str::from_utf8(&data[name_start..name_start + name_len])
            .expect("utf-8 entry name")
            .to_string();
        let data_start = name_start + name_len + extra_len;
        members.push((name, data[data_start..data_start + size].to_vec()));
        pos = data_start + size;
    }
    members
}

#[test]
fn full_corpus_is_written_with_no_skips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = FixtureConfig::new(dir.path());
    let report = generate(&config).expect("generate");

    assert!(report.skipped.is_empty(), "sample block fits every kind");
    // 48 matrix cells + 2 scalar fixtures
    assert_eq!(report.fixtures.len(), 50);
    assert_eq!(report.archive.entry_count, 50);

    for dtype in MATRIX_DTYPES {
        for order in MATRIX_BYTE_ORDERS {
            for layout in MATRIX_LAYOUTS {
                let name = matrix_file_name(dtype, order, layout);
                assert!(dir.path().join(&name).is_file(), "{name} missing");
            }
        }
    }
    assert!(dir.path().join(BYTES_SCALAR_FILE_NAME).is_file());
    assert!(dir.path().join(UNICODE_SCALAR_FILE_NAME).is_file());
    assert!(dir.path().join(ARCHIVE_FILE_NAME).is_file());
    assert!(dir.path().join(MANIFEST_FILE_NAME).is_file());
}

#[test]
fn every_archive_entry_matches_its_standalone_container() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = FixtureConfig::new(dir.path());
    let report = generate(&config).expect("generate");

    let archive = fs::read(dir.path().join(ARCHIVE_FILE_NAME)).expect("read archive");
    let members = archive_members(&archive);
    assert_eq!(members.len(), report.archive.entry_count);

    for (name, bytes) in &members {
        let standalone = fs::read(dir.path().join(name)).expect("standalone container");
        assert_eq!(&standalone, bytes, "{name} diverges inside the archive");
    }

    // entry names are the sorted container file names
    let mut expected: Vec<String> = report
        .fixtures
        .iter()
        .map(|f| f.file_name.clone())
        .collect();
    expected.sort();
    let actual: Vec<String> = members.into_iter().map(|(name, _)| name).collect();
    assert_eq!(actual, expected);
}

#[test]
fn reruns_are_byte_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = FixtureConfig::new(dir.path());

    generate(&config).expect("first run");
    let first = corpus_snapshot(dir.path());
    generate(&config).expect("second run");
    let second = corpus_snapshot(dir.path());

    assert_eq!(first, second);
}

#[test]
fn clearing_replaces_owned_files_and_spares_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unrelated = dir.path().join("notes.txt");
    let stale = dir.path().join("i4_le_c.npy");
    fs::write(&unrelated, b"keep me").expect("write unrelated");
    fs::write(&stale, b"stale garbage").expect("write stale");

    let config = FixtureConfig::new(dir.path());
    generate(&config).expect("generate");

    assert_eq!(fs::read(&unrelated).expect("unrelated"), b"keep me");
    let fresh = fs::read(&stale).expect("regenerated");
    assert_ne!(fresh, b"stale garbage");
    assert_eq!(&fresh[..6], &[0x93, b'N', b'U', b'M', b'P', b'Y']);
}

#[test]
fn manifest_lists_every_fixture_with_digests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = FixtureConfig::new(dir.path());
    let report = generate(&config).expect("generate");

    let manifest = fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).expect("manifest");
    let parsed: serde_json::Value = serde_json::from_str(&manifest).expect("valid json");

    let fixtures = parsed["fixtures"].as_array().expect("fixtures array");
    assert_eq!(fixtures.len(), report.fixtures.len());
    for fixture in fixtures {
        let digest = fixture["sha256"].as_str().expect("digest");
        assert_eq!(digest.len(), 64);
        let file_name = fixture["file_name"].as_str().expect("file name");
        let on_disk = fs::read(dir.path().join(file_name)).expect("fixture file");
        assert_eq!(
            fixture["byte_len"].as_u64().expect("byte_len"),
            on_disk.len() as u64
        );
    }
    assert!(parsed["skipped"].as_array().expect("skipped").is_empty());
    assert_eq!(parsed["archive"]["entry_count"].as_u64(), Some(50));
}

#[test]
fn missing_output_directory_is_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("deep").join("testdata");
    let config = FixtureConfig::new(&nested);
    generate(&config).expect("generate into fresh directory");
    assert!(nested.join(ARCHIVE_FILE_NAME).is_file());
}
