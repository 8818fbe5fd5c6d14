#![forbid(unsafe_code)]

use core::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use nfx_dtype::{ByteOrder, DType, MATRIX_DTYPES, MemoryLayout};
use nfx_io::{
    ArchiveEntry, DataBlock, EncodeError, bytes_scalar_descr, encode_array, encode_bytes_scalar,
    encode_unicode_scalar, pack_archive, unicode_scalar_descr,
};

pub const ARCHIVE_FILE_NAME: &str = "all.npz";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const BYTES_SCALAR_FILE_NAME: &str = "S.npy";
pub const UNICODE_SCALAR_FILE_NAME: &str = "U.npy";

/// Fixed scalar fixture contents. The byte-string value is plain ASCII of
/// ten bytes; the Unicode value carries umlauts and a sharp-s so non-Latin
/// code points are exercised.
pub const BYTES_SCALAR_VALUE: &[u8] = b"uebergross";
pub const UNICODE_SCALAR_VALUE: &str = "übergroß";

/// The shared logical payload: every numeric fixture encodes this same 2×3
/// block, so files differ only in their physical encoding.
pub const SAMPLE_ROWS: usize = 2;
pub const SAMPLE_COLS: usize = 3;
pub const SAMPLE_VALUES: [i64; 6] = [0, 1, 2, 3, 4, 5];

pub const MATRIX_BYTE_ORDERS: [ByteOrder; 2] = [ByteOrder::Little, ByteOrder::Big];
pub const MATRIX_LAYOUTS: [MemoryLayout; 2] = [MemoryLayout::RowMajor, MemoryLayout::ColumnMajor];

/// Where a generation run writes its corpus.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub output_dir: PathBuf,
}

impl FixtureConfig {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn default_paths() -> Self {
        Self::new("target/testdata")
    }
}

/// One written fixture, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureRecord {
    pub file_name: String,
    pub descr: String,
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub byte_len: usize,
    pub sha256: String,
}

/// A matrix cell skipped because its value/kind pairing would lose data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCell {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRecord {
    pub file_name: String,
    pub entry_count: usize,
    pub byte_len: usize,
    pub sha256: String,
}

/// Everything one generation run produced; serialized as `manifest.json`.
/// Carries no timestamps so reruns emit identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    pub fixtures: Vec<FixtureRecord>,
    pub skipped: Vec<SkippedCell>,
    pub archive: ArchiveRecord,
}

#[derive(Debug)]
pub enum GenerateError {
    Encode(EncodeError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Manifest(serde_json::Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "i/o failure at {}: {source}", path.display())
            }
            Self::Manifest(err) => write!(f, "manifest serialization failed: {err}"),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Manifest(err) => Some(err),
        }
    }
}

impl From<EncodeError> for GenerateError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

/// File name of one matrix cell, e.g. `i4_le_c.npy`.
#[must_use]
pub fn matrix_file_name(dtype: DType, order: ByteOrder, layout: MemoryLayout) -> String {
    format!("{}_{}_{}.npy", dtype.code(), order.tag(), layout.tag())
}

/// Whether `name` belongs to this generator's output scheme. The clearing
/// pass deletes exactly these names and leaves unrelated files alone.
#[must_use]
pub fn is_generator_owned(name: &str) -> bool {
    if name == ARCHIVE_FILE_NAME
        || name == MANIFEST_FILE_NAME
        || name == BYTES_SCALAR_FILE_NAME
        || name == UNICODE_SCALAR_FILE_NAME
    {
        return true;
    }
    for dtype in MATRIX_DTYPES {
        for order in MATRIX_BYTE_ORDERS {
            for layout in MATRIX_LAYOUTS {
                if name == matrix_file_name(dtype, order, layout) {
                    return true;
                }
            }
        }
    }
    false
}

fn io_failure(path: &Path, source: std::io::Error) -> GenerateError {
    GenerateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), GenerateError> {
    let path = dir.join(name);
    fs::write(&path, bytes).map_err(|err| io_failure(&path, err))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

fn clear_owned_files(dir: &Path) -> Result<(), GenerateError> {
    let entries = fs::read_dir(dir).map_err(|err| io_failure(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| io_failure(dir, err))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_generator_owned(&name) {
            let path = entry.path();
            fs::remove_file(&path).map_err(|err| io_failure(&path, err))?;
        }
    }
    Ok(())
}

fn record(
    file_name: &str,
    descr: String,
    shape: Vec<usize>,
    fortran: bool,
    bytes: &[u8],
) -> FixtureRecord {
    FixtureRecord {
        file_name: file_name.to_string(),
        descr,
        shape,
        fortran_order: fortran,
        byte_len: bytes.len(),
        sha256: sha256_hex(bytes),
    }
}

/// Regenerate the full fixture corpus under `config.output_dir`.
///
/// Creates the directory if absent, removes stale generator-owned files,
/// writes one container per `(kind, byte order, layout)` matrix cell plus
/// the two string scalars, bundles every container written in this run
/// into `all.npz`, and emits `manifest.json`. A `LossyConversion` on one
/// cell skips that cell and is reported; every other failure aborts the
/// run, leaving already-written files in place.
pub fn generate(config: &FixtureConfig) -> Result<GenerateReport, GenerateError> {
    let dir = config.output_dir.as_path();
    fs::create_dir_all(dir).map_err(|err| io_failure(dir, err))?;
    clear_owned_files(dir)?;

    let block = DataBlock::new(SAMPLE_ROWS, SAMPLE_COLS, SAMPLE_VALUES.to_vec())?;
    let shape = vec![SAMPLE_ROWS, SAMPLE_COLS];

    let mut fixtures = Vec::new();
    let mut skipped = Vec::new();
    let mut archive_entries: Vec<ArchiveEntry> = Vec::new();

    for dtype in MATRIX_DTYPES {
        for order in MATRIX_BYTE_ORDERS {
            for layout in MATRIX_LAYOUTS {
                let file_name = matrix_file_name(dtype, order, layout);
                match encode_array(&block, dtype, order, layout) {
                    Ok(bytes) => {
                        write_file(dir, &file_name, &bytes)?;
                        let descr = dtype
                            .descr(order)
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        fixtures.push(record(
                            &file_name,
                            descr,
                            shape.clone(),
                            layout.is_fortran(),
                            &bytes,
                        ));
                        archive_entries.push(ArchiveEntry::new(file_name, bytes));
                    }
                    Err(err @ EncodeError::LossyConversion { .. }) => {
                        skipped.push(SkippedCell {
                            file_name,
                            reason: err.to_string(),
                        });
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    let bytes_scalar = encode_bytes_scalar(BYTES_SCALAR_VALUE)?;
    write_file(dir, BYTES_SCALAR_FILE_NAME, &bytes_scalar)?;
    fixtures.push(record(
        BYTES_SCALAR_FILE_NAME,
        bytes_scalar_descr(BYTES_SCALAR_VALUE.len()),
        Vec::new(),
        false,
        &bytes_scalar,
    ));
    archive_entries.push(ArchiveEntry::new(BYTES_SCALAR_FILE_NAME, bytes_scalar));

    let unicode_scalar = encode_unicode_scalar(UNICODE_SCALAR_VALUE, ByteOrder::Little)?;
    write_file(dir, UNICODE_SCALAR_FILE_NAME, &unicode_scalar)?;
    fixtures.push(record(
        UNICODE_SCALAR_FILE_NAME,
        unicode_scalar_descr(UNICODE_SCALAR_VALUE.chars().count(), ByteOrder::Little),
        Vec::new(),
        false,
        &unicode_scalar,
    ));
    archive_entries.push(ArchiveEntry::new(UNICODE_SCALAR_FILE_NAME, unicode_scalar));

    // entry order is sorted by name so the archive bytes are run-stable
    archive_entries.sort_by(|a, b| a.name.cmp(&b.name));
    let archive_bytes = pack_archive(&archive_entries)?;
    write_file(dir, ARCHIVE_FILE_NAME, &archive_bytes)?;

    let report = GenerateReport {
        fixtures,
        skipped,
        archive: ArchiveRecord {
            file_name: ARCHIVE_FILE_NAME.to_string(),
            entry_count: archive_entries.len(),
            byte_len: archive_bytes.len(),
            sha256: sha256_hex(&archive_bytes),
        },
    };

    let mut manifest = serde_json::to_string_pretty(&report).map_err(GenerateError::Manifest)?;
    manifest.push('\n');
    write_file(dir, MANIFEST_FILE_NAME, manifest.as_bytes())?;

    Ok(report)
}
