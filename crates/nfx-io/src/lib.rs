#![forbid(unsafe_code)]

use core::fmt;
use std::collections::HashSet;

use half::f16;
use nfx_dtype::{ByteOrder, DType, MemoryLayout};

pub const NPY_MAGIC_PREFIX: [u8; 6] = [0x93, b'N', b'U', b'M', b'P', b'Y'];
pub const NPY_VERSION: (u8, u8) = (1, 0);

/// Version 1.0 stores the header length in a little-endian u16.
pub const MAX_HEADER_BYTES: usize = 65_535;
pub const MAX_ARCHIVE_MEMBERS: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A block value cannot be represented in the target kind without loss.
    LossyConversion { value: i64, descr: String },
    /// The block's value count disagrees with its declared shape.
    ShapeMismatch { expected: usize, actual: usize },
    /// The kind has no fixed element width and cannot back a numeric array.
    UnsupportedArrayKind { code: &'static str },
    /// The rendered header does not fit the version 1.0 length field.
    HeaderOverflow,
    DuplicateEntryName { name: String },
    ArchiveContract(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyConversion { value, descr } => {
                write!(f, "value {value} is not representable as {descr}")
            }
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "block holds {actual} values but shape declares {expected}")
            }
            Self::UnsupportedArrayKind { code } => {
                write!(f, "kind {code:?} has no fixed element width")
            }
            Self::HeaderOverflow => write!(f, "header exceeds the version 1.0 length field"),
            Self::DuplicateEntryName { name } => {
                write!(f, "archive entry name {name:?} is not unique")
            }
            Self::ArchiveContract(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EncodeError {}

// ── logical data block ────────

/// A 2-D block of small integer values, stored row-major.
///
/// The same logical block backs every numeric fixture; only the physical
/// encoding (kind, byte order, linearization) varies between containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    rows: usize,
    cols: usize,
    values: Vec<i64>,
}

impl DataBlock {
    pub fn new(rows: usize, cols: usize, values: Vec<i64>) -> Result<Self, EncodeError> {
        let expected = rows
            .checked_mul(cols)
            .ok_or(EncodeError::ShapeMismatch {
                expected: usize::MAX,
                actual: values.len(),
            })?;
        if values.len() != expected {
            return Err(EncodeError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { rows, cols, values })
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.values[row * self.cols + col]
    }

    /// Values in the order they are written under `layout`: row-major
    /// visits `(0,0),(0,1),…`; column-major visits `(0,0),(1,0),…`.
    #[must_use]
    pub fn linearized(&self, layout: MemoryLayout) -> Vec<i64> {
        match layout {
            MemoryLayout::RowMajor => self.values.clone(),
            MemoryLayout::ColumnMajor => {
                let mut out = Vec::with_capacity(self.values.len());
                for col in 0..self.cols {
                    for row in 0..self.rows {
                        out.push(self.get(row, col));
                    }
                }
                out
            }
        }
    }
}

// ── npy header grammar ────────

fn format_shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        _ => {
            let joined = shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({joined},)")
        }
    }
}

fn encode_header_dict(descr: &str, fortran_order: bool, shape: &[usize]) -> String {
    let fortran_order = if fortran_order { "True" } else { "False" };
    let shape = format_shape_tuple(shape);
    format!("{{'descr': '{descr}', 'fortran_order': {fortran_order}, 'shape': {shape}, }}")
}

/// Render the complete container: magic, version 1.0, little-endian u16
/// header length, space-padded dictionary ending in `\n`, then the payload.
/// The dictionary is padded so that the payload starts on a 16-byte
/// boundary.
fn encode_container(
    descr: &str,
    fortran_order: bool,
    shape: &[usize],
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let dictionary = encode_header_dict(descr, fortran_order, shape);
    let dictionary_bytes = dictionary.as_bytes();
    let prefix_len = NPY_MAGIC_PREFIX.len() + 2 + 2;
    let base_header_len = dictionary_bytes.len() + 1;
    let padding = (16 - ((prefix_len + base_header_len) % 16)) % 16;
    let header_len = base_header_len + padding;
    let header_len_field = u16::try_from(header_len).map_err(|_| EncodeError::HeaderOverflow)?;

    let mut encoded = Vec::with_capacity(prefix_len + header_len + payload.len());
    encoded.extend_from_slice(&NPY_MAGIC_PREFIX);
    encoded.push(NPY_VERSION.0);
    encoded.push(NPY_VERSION.1);
    encoded.extend_from_slice(&header_len_field.to_le_bytes());
    encoded.extend_from_slice(dictionary_bytes);
    encoded.extend(std::iter::repeat_n(b' ', padding));
    encoded.push(b'\n');
    encoded.extend_from_slice(payload);
    Ok(encoded)
}

// ── numeric array encoding ────────

fn lossy(value: i64, descr: &str) -> EncodeError {
    EncodeError::LossyConversion {
        value,
        descr: descr.to_string(),
    }
}

fn push_element(
    out: &mut Vec<u8>,
    value: i64,
    dtype: DType,
    big: bool,
    descr: &str,
) -> Result<(), EncodeError> {
    match dtype {
        DType::Bool => out.push(u8::from(value != 0)),
        DType::I8 => {
            let v = i8::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        DType::U8 => {
            let v = u8::try_from(value).map_err(|_| lossy(value, descr))?;
            out.push(v);
        }
        DType::I16 => {
            let v = i16::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
        DType::I32 => {
            let v = i32::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
        DType::I64 => {
            out.extend_from_slice(&if big {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            });
        }
        DType::U16 => {
            let v = u16::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
        DType::U32 => {
            let v = u32::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
        DType::U64 => {
            let v = u64::try_from(value).map_err(|_| lossy(value, descr))?;
            out.extend_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
        DType::F16 => {
            let v = f16::from_f64(value as f64);
            if v.to_f64() != value as f64 || (value as f64) as i64 != value {
                return Err(lossy(value, descr));
            }
            let bits = v.to_bits();
            out.extend_from_slice(&if big {
                bits.to_be_bytes()
            } else {
                bits.to_le_bytes()
            });
        }
        DType::F32 => {
            let v = value as f32;
            if v as i64 != value {
                return Err(lossy(value, descr));
            }
            let bits = v.to_bits();
            out.extend_from_slice(&if big {
                bits.to_be_bytes()
            } else {
                bits.to_le_bytes()
            });
        }
        DType::F64 => {
            let v = value as f64;
            if v as i64 != value {
                return Err(lossy(value, descr));
            }
            let bits = v.to_bits();
            out.extend_from_slice(&if big {
                bits.to_be_bytes()
            } else {
                bits.to_le_bytes()
            });
        }
        DType::Bytes | DType::Str => {
            return Err(EncodeError::UnsupportedArrayKind { code: dtype.code() });
        }
    }
    Ok(())
}

/// Serialize a 2-D block into one self-describing npy container.
///
/// The header always declares the logical `(rows, cols)` shape; the layout
/// only changes the order in which elements land in the payload. Multi-byte
/// elements are emitted in the requested byte order, single-byte kinds are
/// order-insensitive. A value that cannot be represented exactly in `dtype`
/// fails with `LossyConversion` (boolean uses the nonzero rule and never
/// loses).
pub fn encode_array(
    block: &DataBlock,
    dtype: DType,
    order: ByteOrder,
    layout: MemoryLayout,
) -> Result<Vec<u8>, EncodeError> {
    let descr = dtype
        .descr(order)
        .ok_or(EncodeError::UnsupportedArrayKind { code: dtype.code() })?;
    let item_size = dtype
        .item_size()
        .ok_or(EncodeError::UnsupportedArrayKind { code: dtype.code() })?;
    let big = order.is_big();

    let values = block.linearized(layout);
    let mut payload = Vec::with_capacity(values.len() * item_size);
    for value in values {
        push_element(&mut payload, value, dtype, big, descr)?;
    }

    encode_container(
        descr,
        layout.is_fortran(),
        &[block.rows(), block.cols()],
        &payload,
    )
}

// ── scalar encoding ────────

/// Descriptor for a fixed-width byte-string scalar of `width` bytes.
#[must_use]
pub fn bytes_scalar_descr(width: usize) -> String {
    format!("|S{width}")
}

/// Descriptor for a Unicode scalar of `char_count` code points.
#[must_use]
pub fn unicode_scalar_descr(char_count: usize, order: ByteOrder) -> String {
    let prefix = if order.is_big() { '>' } else { '<' };
    format!("{prefix}U{char_count}")
}

/// Serialize a byte-string scalar. The declared width is the exact byte
/// length of the value, the shape is zero-dimensional, and the payload is
/// the value verbatim; byte order does not apply to opaque bytes.
pub fn encode_bytes_scalar(value: &[u8]) -> Result<Vec<u8>, EncodeError> {
    encode_container(&bytes_scalar_descr(value.len()), false, &[], value)
}

/// Serialize a Unicode scalar as zero-dimensional `U{n}` data: one 4-byte
/// UCS-4 code unit per Unicode scalar value, in the requested byte order.
pub fn encode_unicode_scalar(value: &str, order: ByteOrder) -> Result<Vec<u8>, EncodeError> {
    let big = order.is_big();
    let char_count = value.chars().count();
    let mut payload = Vec::with_capacity(char_count * 4);
    for ch in value.chars() {
        let unit = u32::from(ch);
        payload.extend_from_slice(&if big {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        });
    }
    encode_container(&unicode_scalar_descr(char_count, order), false, &[], &payload)
}

// ── npz archive ────────

/// One named container destined for an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Bundle already-encoded containers into one uncompressed ZIP archive.
///
/// Every entry is stored verbatim (STORE method) under its exact name,
/// extension included. Modification time and date fields are zeroed so the
/// archive bytes depend only on the entries. Entry names must be unique.
pub fn pack_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>, EncodeError> {
    if entries.is_empty() {
        return Err(EncodeError::ArchiveContract(
            "cannot pack an archive with zero entries",
        ));
    }
    if entries.len() > MAX_ARCHIVE_MEMBERS {
        return Err(EncodeError::ArchiveContract(
            "archive member count exceeds bounded limit",
        ));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(EncodeError::ArchiveContract(
                "archive entry name cannot be empty",
            ));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(EncodeError::DuplicateEntryName {
                name: entry.name.clone(),
            });
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut central_directory: Vec<u8> = Vec::new();

    for entry in entries {
        let name_bytes = entry.name.as_bytes();
        let name_len = u16::try_from(name_bytes.len())
            .map_err(|_| EncodeError::ArchiveContract("entry name exceeds u16 length field"))?;
        let entry_len = u32::try_from(entry.bytes.len())
            .map_err(|_| EncodeError::ArchiveContract("entry exceeds u32 size field"))?;
        let local_offset = u32::try_from(buf.len())
            .map_err(|_| EncodeError::ArchiveContract("archive exceeds u32 offset field"))?;
        let crc = crc32_ieee(&entry.bytes);

        // Local file header (30 bytes + name)
        buf.extend_from_slice(&[0x50, 0x4B, 0x03, 0x04]);
        buf.extend_from_slice(&20_u16.to_le_bytes()); // version needed (2.0)
        buf.extend_from_slice(&0_u16.to_le_bytes()); // flags
        buf.extend_from_slice(&0_u16.to_le_bytes()); // compression: STORE
        buf.extend_from_slice(&0_u16.to_le_bytes()); // mod time
        buf.extend_from_slice(&0_u16.to_le_bytes()); // mod date
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&entry_len.to_le_bytes()); // compressed size
        buf.extend_from_slice(&entry_len.to_le_bytes()); // uncompressed size
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(&0_u16.to_le_bytes()); // extra field len
        buf.extend_from_slice(name_bytes);
        buf.extend_from_slice(&entry.bytes);

        // Central directory entry (46 bytes + name)
        central_directory.extend_from_slice(&[0x50, 0x4B, 0x01, 0x02]);
        central_directory.extend_from_slice(&20_u16.to_le_bytes()); // version made by
        central_directory.extend_from_slice(&20_u16.to_le_bytes()); // version needed
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // flags
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // compression
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // mod time
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // mod date
        central_directory.extend_from_slice(&crc.to_le_bytes());
        central_directory.extend_from_slice(&entry_len.to_le_bytes());
        central_directory.extend_from_slice(&entry_len.to_le_bytes());
        central_directory.extend_from_slice(&name_len.to_le_bytes());
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // extra field len
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // comment len
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // disk number
        central_directory.extend_from_slice(&0_u16.to_le_bytes()); // internal attrs
        central_directory.extend_from_slice(&0_u32.to_le_bytes()); // external attrs
        central_directory.extend_from_slice(&local_offset.to_le_bytes());
        central_directory.extend_from_slice(name_bytes);
    }

    let entry_count = u16::try_from(entries.len())
        .map_err(|_| EncodeError::ArchiveContract("entry count exceeds u16 field"))?;
    let cd_offset = u32::try_from(buf.len())
        .map_err(|_| EncodeError::ArchiveContract("archive exceeds u32 offset field"))?;
    let cd_size = u32::try_from(central_directory.len())
        .map_err(|_| EncodeError::ArchiveContract("central directory exceeds u32 size field"))?;
    buf.extend_from_slice(&central_directory);

    // End of central directory record (22 bytes)
    buf.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06]);
    buf.extend_from_slice(&0_u16.to_le_bytes()); // disk number
    buf.extend_from_slice(&0_u16.to_le_bytes()); // disk with CD
    buf.extend_from_slice(&entry_count.to_le_bytes()); // entries on disk
    buf.extend_from_slice(&entry_count.to_le_bytes()); // total entries
    buf.extend_from_slice(&cd_size.to_le_bytes());
    buf.extend_from_slice(&cd_offset.to_le_bytes());
    buf.extend_from_slice(&0_u16.to_le_bytes()); // comment length

    Ok(buf)
}

/// IEEE 802.3 CRC-32 (used by the ZIP format).
fn crc32_ieee(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
