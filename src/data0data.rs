//! SQL data field and tuple.
//!
//! Grounded in `data_data.hpp`'s `dfield_struct`/`dtuple_struct`: a tuple
//! is a flat, logical array of typed fields, borrowed from whatever arena
//! created it. Unlike the original's `mem_heap_t`-backed allocation, the
//! Rust port just owns a `Vec<DField>` and lets normal drop semantics
//! stand in for the heap.

/// Marker used in [`DField::len`] for an SQL NULL field, matching the
/// original `IB_SQL_NULL` sentinel (`ULINT32_UNDEFINED`).
pub const SQL_NULL: u32 = crate::univ::ULINT32_UNDEFINED;

/// `dtuple_struct::magic_n`; debug-only identity check carried over from
/// the original for parity with code that asserts on it.
pub const DATA_TUPLE_MAGIC_N: u32 = 65_478_679;

/// Minimal type annotation needed to interpret a field's bytes: MySQL's
/// `dtype_t` packs `mtype`/`prtype`/`len`/`mbminlen`/`mbmaxlen` into
/// bitfields; this port exposes them as plain fields instead of accessor
/// macros since there is no ABI layout to preserve for `DType` itself
/// (only the on-disk record encoding in [`crate::rem0rec`] is fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    /// Main data type (`DATA_VARCHAR`, `DATA_INT`, `DATA_BLOB`, ...).
    pub mtype: u8,
    /// Precise type flags (unsigned, not-null, binary, ...).
    pub prtype: u32,
    /// Maximum fixed length in bytes, 0 if variable-length.
    pub len: u32,
    /// Minimum/maximum bytes per character, for multi-byte charsets.
    pub mbminlen: u8,
    pub mbmaxlen: u8,
}

/// Bit of `prtype` marking a column `NOT NULL`.
pub const DATA_NOT_NULL: u32 = 0x100;
/// Bit of `prtype` marking a binary (not collated) column.
pub const DATA_BINARY_TYPE: u32 = 0x200;

impl DType {
    pub const fn new(mtype: u8, prtype: u32, len: u32) -> Self {
        DType {
            mtype,
            prtype,
            len,
            mbminlen: 1,
            mbmaxlen: 1,
        }
    }

    /// Whether this is a large object type that is always a candidate
    /// for external storage (`DATA_BLOB`, `DATA_GEOMETRY`), as opposed to
    /// a fixed-length or short variable-length column that
    /// `convert_big_rec` must never move out of line.
    pub fn is_blob(&self) -> bool {
        self.mtype == DATA_BLOB
    }

    pub fn is_fixed_size(&self) -> bool {
        matches!(self.mtype, DATA_INT | DATA_FLOAT | DATA_DOUBLE | DATA_SYS)
    }
}

/// Main type codes from `data_types.hpp` that this core needs to reason
/// about field extern-ability and comparisons.
pub const DATA_VARCHAR: u8 = 1;
pub const DATA_CHAR: u8 = 2;
pub const DATA_FIXBINARY: u8 = 3;
pub const DATA_BINARY: u8 = 4;
pub const DATA_BLOB: u8 = 5;
pub const DATA_INT: u8 = 6;
pub const DATA_SYS_CHILD: u8 = 7;
pub const DATA_SYS: u8 = 8;
pub const DATA_FLOAT: u8 = 9;
pub const DATA_DOUBLE: u8 = 10;

/// A single logical field in a [`DTuple`]: a type, a length (or
/// [`SQL_NULL`]), the extern flag, and an owned byte payload.
///
/// The original `dfield_t` borrows its `data` pointer from the
/// surrounding memory heap; this port owns the bytes directly so a
/// `DTuple` built by the tree cursor (e.g. a node-pointer prefix copied
/// out of a page) can outlive the page latch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DField {
    pub field_type: DType,
    pub data: Option<Vec<u8>>,
    pub ext: bool,
}

impl DField {
    pub fn new(field_type: DType, data: Vec<u8>) -> Self {
        DField {
            field_type,
            data: Some(data),
            ext: false,
        }
    }

    pub fn null(field_type: DType) -> Self {
        DField {
            field_type,
            data: None,
            ext: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn len(&self) -> u32 {
        match &self.data {
            Some(d) => d.len() as u32,
            None => SQL_NULL,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 || self.len() == SQL_NULL
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn set_ext(&mut self) {
        self.ext = true;
    }
}

/// A logical record: an ordered list of typed fields plus the
/// `n_fields_cmp` prefix used for tree comparisons.
///
/// `info_bits` mirrors the record's own info bits (delete-mark, min-rec)
/// when a tuple is built from, or destined for, a physical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DTuple {
    pub info_bits: u8,
    pub fields: Vec<DField>,
    /// Number of leading fields participating in comparisons
    /// (`rem0cmp`); defaults to `fields.len()` at construction.
    pub n_fields_cmp: usize,
}

impl DTuple {
    pub fn new(fields: Vec<DField>) -> Self {
        let n_fields_cmp = fields.len();
        DTuple {
            info_bits: 0,
            fields,
            n_fields_cmp,
        }
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn set_n_fields_cmp(&mut self, n: usize) {
        debug_assert!(n <= self.fields.len());
        self.n_fields_cmp = n;
    }

    /// Sum of the field data lengths, the space occupied by field
    /// structs/tuple struct excluded, matching `dtuple_get_data_size`.
    pub fn data_size(&self) -> u32 {
        self.fields
            .iter()
            .map(|f| if f.is_null() { 0 } else { f.len() })
            .sum()
    }

    /// Number of fields already flagged externally stored.
    pub fn n_ext(&self) -> usize {
        self.fields.iter().filter(|f| f.ext).count()
    }

    pub fn contains_null(&self) -> bool {
        self.fields.iter().any(|f| f.is_null())
    }
}

/// A slot for a field moved out of line by `convert_big_rec`
/// (`big_rec_field_struct`): the field's ordinal position in the record
/// and the suffix bytes that no longer fit inline.
#[derive(Debug, Clone)]
pub struct BigRecField {
    pub field_no: usize,
    pub data: Vec<u8>,
}

/// `big_rec_struct`: the ordered vector of overflowing field suffixes
/// produced by [`crate::btr0cur::convert_big_rec`], consumed by
/// [`crate::btr0cur::store_big_rec_extern_fields`].
#[derive(Debug, Clone, Default)]
pub struct BigRec {
    pub fields: Vec<BigRecField>,
}

impl BigRec {
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }
}
