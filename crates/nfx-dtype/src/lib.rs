#![forbid(unsafe_code)]

use core::fmt;

/// Scalar kinds that can appear in a fixture container.
///
/// The numeric/boolean kinds form the closed matrix domain; `Bytes` and
/// `Str` are the width-carrying string kinds used for the scalar fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
    /// Fixed-width byte string (`S` kind); bytes are opaque.
    Bytes,
    /// Fixed-width Unicode string (`U` kind); one UCS-4 code unit per char.
    Str,
}

/// The twelve numeric/boolean kinds, in canonical matrix order.
pub const MATRIX_DTYPES: [DType; 12] = [
    DType::Bool,
    DType::I8,
    DType::I16,
    DType::I32,
    DType::I64,
    DType::U8,
    DType::U16,
    DType::U32,
    DType::U64,
    DType::F16,
    DType::F32,
    DType::F64,
];

impl DType {
    /// Canonical short format code, as used in fixture file names.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i1",
            Self::I16 => "i2",
            Self::I32 => "i4",
            Self::I64 => "i8",
            Self::U8 => "u1",
            Self::U16 => "u2",
            Self::U32 => "u4",
            Self::U64 => "u8",
            Self::F16 => "f2",
            Self::F32 => "f4",
            Self::F64 => "f8",
            Self::Bytes => "S",
            Self::Str => "U",
        }
    }

    /// On-disk bytes per element. `None` for the width-carrying string
    /// kinds, whose element size is fixed per value rather than per kind.
    #[must_use]
    pub const fn item_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 | Self::F16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Bytes | Self::Str => None,
        }
    }

    /// Resolve a format code back to its kind. Total over the closed set;
    /// anything else is an `UnknownFormatCode` error.
    pub fn resolve(code: &str) -> Result<Self, DTypeError> {
        match code {
            "bool" => Ok(Self::Bool),
            "i1" => Ok(Self::I8),
            "i2" => Ok(Self::I16),
            "i4" => Ok(Self::I32),
            "i8" => Ok(Self::I64),
            "u1" => Ok(Self::U8),
            "u2" => Ok(Self::U16),
            "u4" => Ok(Self::U32),
            "u8" => Ok(Self::U64),
            "f2" => Ok(Self::F16),
            "f4" => Ok(Self::F32),
            "f8" => Ok(Self::F64),
            "S" => Ok(Self::Bytes),
            "U" => Ok(Self::Str),
            _ => Err(DTypeError::UnknownFormatCode {
                code: code.to_string(),
            }),
        }
    }

    /// Returns `true` if elements of this kind occupy more than one byte,
    /// i.e. the kind is sensitive to the requested byte order.
    #[must_use]
    pub const fn is_multi_byte(self) -> bool {
        !matches!(self, Self::Bool | Self::I8 | Self::U8 | Self::Bytes)
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
        )
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32 | Self::F64)
    }

    /// Descriptor string for the fixed-width kinds, e.g. `<i4`, `>f2`,
    /// `|b1`. Single-byte kinds ignore the byte order and carry the `|`
    /// prefix. `None` for `Bytes`/`Str`, whose descriptors carry a
    /// per-value width and are rendered by the container writer.
    #[must_use]
    pub const fn descr(self, order: ByteOrder) -> Option<&'static str> {
        let big = order.resolved().is_big() && self.is_multi_byte();
        match (self, big) {
            (Self::Bool, _) => Some("|b1"),
            (Self::I8, _) => Some("|i1"),
            (Self::U8, _) => Some("|u1"),
            (Self::I16, false) => Some("<i2"),
            (Self::I16, true) => Some(">i2"),
            (Self::I32, false) => Some("<i4"),
            (Self::I32, true) => Some(">i4"),
            (Self::I64, false) => Some("<i8"),
            (Self::I64, true) => Some(">i8"),
            (Self::U16, false) => Some("<u2"),
            (Self::U16, true) => Some(">u2"),
            (Self::U32, false) => Some("<u4"),
            (Self::U32, true) => Some(">u4"),
            (Self::U64, false) => Some("<u8"),
            (Self::U64, true) => Some(">u8"),
            (Self::F16, false) => Some("<f2"),
            (Self::F16, true) => Some(">f2"),
            (Self::F32, false) => Some("<f4"),
            (Self::F32, true) => Some(">f4"),
            (Self::F64, false) => Some("<f8"),
            (Self::F64, true) => Some(">f8"),
            (Self::Bytes | Self::Str, _) => None,
        }
    }
}

/// Byte order of multi-byte elements within a container payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
    /// Resolved to the build target's endianness at descriptor time.
    Native,
}

impl ByteOrder {
    /// Collapse `Native` to the concrete order of the build target.
    #[must_use]
    pub const fn resolved(self) -> Self {
        match self {
            Self::Little | Self::Big => self,
            Self::Native => {
                if cfg!(target_endian = "big") {
                    Self::Big
                } else {
                    Self::Little
                }
            }
        }
    }

    #[must_use]
    pub const fn is_big(self) -> bool {
        matches!(self.resolved(), Self::Big)
    }

    /// Tag used in fixture file names.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self.resolved() {
            Self::Big => "be",
            _ => "le",
        }
    }
}

/// Linearization order of a 2-D logical block into the flat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLayout {
    RowMajor,
    ColumnMajor,
}

impl MemoryLayout {
    /// Tag used in fixture file names (`c` for row-major, `f` for
    /// column-major).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::RowMajor => "c",
            Self::ColumnMajor => "f",
        }
    }

    /// Value of the `fortran_order` header field.
    #[must_use]
    pub const fn is_fortran(self) -> bool {
        matches!(self, Self::ColumnMajor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DTypeError {
    UnknownFormatCode { code: String },
}

impl fmt::Display for DTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFormatCode { code } => {
                write!(f, "unknown format code: {code:?}")
            }
        }
    }
}

impl std::error::Error for DTypeError {}

#[cfg(test)]
mod tests {
    use super::{ByteOrder, DType, DTypeError, MATRIX_DTYPES, MemoryLayout};

    const ALL_DTYPES: [DType; 14] = [
        DType::Bool,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F16,
        DType::F32,
        DType::F64,
        DType::Bytes,
        DType::Str,
    ];

    #[test]
    fn resolve_is_total_over_the_closed_code_set() {
        for dtype in ALL_DTYPES {
            assert_eq!(DType::resolve(dtype.code()).expect("known code"), dtype);
        }
    }

    #[test]
    fn resolve_rejects_codes_outside_the_registry() {
        for code in ["", "i16", "c8", "f1", "O", "<i4"] {
            let err = DType::resolve(code).expect_err("unknown code");
            assert_eq!(
                err,
                DTypeError::UnknownFormatCode {
                    code: code.to_string()
                }
            );
        }
    }

    #[test]
    fn item_sizes_match_descriptor_widths() {
        for dtype in MATRIX_DTYPES {
            let size = dtype.item_size().expect("fixed-width kind");
            let descr = dtype.descr(ByteOrder::Little).expect("fixed-width kind");
            let width: usize = descr[2..].parse().expect("width digit");
            assert_eq!(size, width, "descr {descr} disagrees with item_size");
        }
        assert_eq!(DType::Bytes.item_size(), None);
        assert_eq!(DType::Str.item_size(), None);
    }

    #[test]
    fn single_byte_kinds_ignore_byte_order() {
        for dtype in [DType::Bool, DType::I8, DType::U8] {
            let little = dtype.descr(ByteOrder::Little).expect("descr");
            let big = dtype.descr(ByteOrder::Big).expect("descr");
            assert_eq!(little, big);
            assert!(little.starts_with('|'));
        }
    }

    #[test]
    fn multi_byte_kinds_flip_descriptor_prefix() {
        for dtype in MATRIX_DTYPES {
            if !dtype.is_multi_byte() {
                continue;
            }
            let little = dtype.descr(ByteOrder::Little).expect("descr");
            let big = dtype.descr(ByteOrder::Big).expect("descr");
            assert!(little.starts_with('<'));
            assert!(big.starts_with('>'));
            assert_eq!(little[1..], big[1..]);
        }
    }

    #[test]
    fn native_order_resolves_to_a_concrete_order() {
        let resolved = ByteOrder::Native.resolved();
        assert!(matches!(resolved, ByteOrder::Little | ByteOrder::Big));
        assert_eq!(ByteOrder::Native.tag(), resolved.tag());
    }

    #[test]
    fn layout_tags_and_fortran_flags_agree() {
        assert_eq!(MemoryLayout::RowMajor.tag(), "c");
        assert_eq!(MemoryLayout::ColumnMajor.tag(), "f");
        assert!(!MemoryLayout::RowMajor.is_fortran());
        assert!(MemoryLayout::ColumnMajor.is_fortran());
    }

    #[test]
    fn string_kinds_have_no_static_descriptor() {
        assert_eq!(DType::Bytes.descr(ByteOrder::Little), None);
        assert_eq!(DType::Str.descr(ByteOrder::Big), None);
    }
}
