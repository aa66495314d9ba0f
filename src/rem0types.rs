//! Record-format constants shared by [`crate::rem0rec`], [`crate::page0cur`]
//! and [`crate::btr0cur`]; grounded in `rem_rec.hpp` and, for the extern
//! reference layout, `btr_cur.hpp`'s `BTR_EXTERN_*` offsets.

/// Set in a record's info bits when it is the leftmost record of a
/// page that is not the tree's leftmost page on its level (at any
/// level, leaf included): comparisons must not dereference its key,
/// only use it as "smaller than everything".
pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
/// Set when the record is delete-marked.
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;

pub const REC_N_OLD_EXTRA_BYTES: usize = 6;
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;

/// Status bits of a COMPACT record's 5-byte header.
pub const REC_STATUS_ORDINARY: u8 = 0;
pub const REC_STATUS_NODE_PTR: u8 = 1;
pub const REC_STATUS_INFIMUM: u8 = 2;
pub const REC_STATUS_SUPREMUM: u8 = 3;

/// Heap number of the first user record on a COMPACT page (0 and 1 are
/// infimum/supremum).
pub const REC_NEW_HEAP_NO: u16 = 4;
pub const REC_HEAP_NO_SHIFT: u32 = 3;

/// Size of the page number appended to a node-pointer record.
pub const REC_NODE_PTR_SIZE: usize = 4;

pub const REC_INFO_BITS: u32 = 6;

/// Maximum data size if offsets are given in one-byte (resp. two-byte)
/// format; the data size of a record must stay under
/// [`REC_MAX_DATA_SIZE`] because the two highest bits of a two-byte
/// offset are reserved (SQL-NULL and extern-storage flags).
pub const REC_1BYTE_OFFS_LIMIT: u32 = 0x7F;
pub const REC_2BYTE_OFFS_LIMIT: u32 = 0x7FFF;

pub const REC_MAX_DATA_SIZE: u32 = 16 * 1024;

/// Maximum number of fields a record may carry; bounds the offsets array
/// allocation in [`crate::rem0rec::RecOffsets::compute`].
pub const REC_MAX_N_FIELDS: usize = 1024 - 1;

/// Local prefix length retained inline for an externally stored field on
/// a pre-Barracuda (Antelope: REDUNDANT/COMPACT non-dynamic) table.
pub const BTR_EXTERN_FIELD_REF_SIZE: usize = 20;
pub const REC_ANTELOPE_MAX_INDEX_COL_LEN: usize = 768;
/// Barracuda (DYNAMIC/COMPRESSED) formats keep no local prefix at all.
pub const REC_VERSION_56_MAX_INDEX_COL_LEN: usize = 0;

/// Byte offsets within the 20-byte extern reference, matching
/// `btr_cur.hpp`'s `BTR_EXTERN_SPACE_ID`/`_PAGE_NO`/`_OFFSET`/`_LEN`.
pub const BTR_EXTERN_SPACE_ID: usize = 0;
pub const BTR_EXTERN_PAGE_NO: usize = 4;
pub const BTR_EXTERN_OFFSET: usize = 8;
pub const BTR_EXTERN_LEN: usize = 12;

/// Top bit of the length field's most significant byte: the record
/// owning this reference may purge the BLOB chain.
pub const BTR_EXTERN_OWNER_FLAG: u64 = 1 << 63;
/// Second-highest bit: this reference was inherited from an earlier
/// record version (e.g. by `UPDATE`); rollback must never free it.
pub const BTR_EXTERN_INHERITED_FLAG: u64 = 1 << 62;

/// A 20-byte reference to externally stored ("big record") data,
/// embedded in place of a field's moved suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternRef {
    pub space_id: u32,
    pub page_no: u32,
    pub offset: u32,
    pub length: u64,
    pub owner: bool,
    pub inherited: bool,
}

impl ExternRef {
    pub const SIZE: usize = BTR_EXTERN_FIELD_REF_SIZE;

    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= Self::SIZE);

        let space_id = crate::mach::mach_read_from_4(&buf[BTR_EXTERN_SPACE_ID..]);
        let page_no = crate::mach::mach_read_from_4(&buf[BTR_EXTERN_PAGE_NO..]);
        let offset = crate::mach::mach_read_from_4(&buf[BTR_EXTERN_OFFSET..]);
        let raw_len = crate::mach::mach_read_from_8(&buf[BTR_EXTERN_LEN..]);

        ExternRef {
            space_id,
            page_no,
            offset,
            length: raw_len & !(BTR_EXTERN_OWNER_FLAG | BTR_EXTERN_INHERITED_FLAG),
            owner: raw_len & BTR_EXTERN_OWNER_FLAG != 0,
            inherited: raw_len & BTR_EXTERN_INHERITED_FLAG != 0,
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= Self::SIZE);

        let mut raw_len = self.length & !(BTR_EXTERN_OWNER_FLAG | BTR_EXTERN_INHERITED_FLAG);
        if self.owner {
            raw_len |= BTR_EXTERN_OWNER_FLAG;
        }
        if self.inherited {
            raw_len |= BTR_EXTERN_INHERITED_FLAG;
        }

        crate::mach::mach_write_to_4(&mut buf[BTR_EXTERN_SPACE_ID..], self.space_id)
            .expect("extern ref buffer too small");
        crate::mach::mach_write_to_4(&mut buf[BTR_EXTERN_PAGE_NO..], self.page_no)
            .expect("extern ref buffer too small");
        crate::mach::mach_write_to_4(&mut buf[BTR_EXTERN_OFFSET..], self.offset)
            .expect("extern ref buffer too small");
        crate::mach::mach_write_to_8(&mut buf[BTR_EXTERN_LEN..], raw_len)
            .expect("extern ref buffer too small");
    }

    /// A zeroed reference with the `OWNER` bit set and `INHERITED`
    /// clear, as written by `convert_big_rec` before the BLOB chain is
    /// actually populated by `store_big_rec_extern_fields`.
    pub fn new_owner_placeholder() -> Self {
        ExternRef {
            space_id: 0,
            page_no: 0,
            offset: 0,
            length: 0,
            owner: true,
            inherited: false,
        }
    }
}

/// Per-column shape needed to lay out or parse a record: fixed width (0 if
/// variable), maximum width, nullability and extern-eligibility. A thin
/// stand-in for `dict_col_t`/`dict_field_t`, carrying only what
/// [`crate::rem0rec`] needs to compute offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub fixed_len: u16,
    pub max_len: u16,
    pub nullable: bool,
    pub is_blob: bool,
}

impl FieldDef {
    pub const fn fixed(len: u16, nullable: bool) -> Self {
        FieldDef {
            fixed_len: len,
            max_len: len,
            nullable,
            is_blob: false,
        }
    }

    pub const fn variable(max_len: u16, nullable: bool, is_blob: bool) -> Self {
        FieldDef {
            fixed_len: 0,
            max_len,
            nullable,
            is_blob,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_len != 0
    }

    /// Whether the COMPACT length array stores this field's length in one
    /// byte (`max_len <= 255` and not a BLOB) or two (everything else, the
    /// second byte's top bit doubling as the extern flag).
    pub fn uses_one_byte_len(&self) -> bool {
        !self.is_blob && self.max_len as u32 <= REC_1BYTE_OFFS_LIMIT + 128
    }
}

/// Column shape and comparison-prefix width for one index, the minimum a
/// record codec needs: REDUNDANT vs COMPACT, the field list, and how many
/// leading fields are the unique key (`n_unique` for node pointers built by
/// [`crate::btr0btr`]).
#[derive(Debug, Clone)]
pub struct IndexDesc {
    pub is_comp: bool,
    pub fields: Vec<FieldDef>,
    pub n_unique: usize,
}

impl IndexDesc {
    pub fn new(is_comp: bool, fields: Vec<FieldDef>, n_unique: usize) -> Self {
        debug_assert!(n_unique <= fields.len());
        IndexDesc {
            is_comp,
            fields,
            n_unique,
        }
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn n_nullable(&self) -> usize {
        self.fields.iter().filter(|f| f.nullable).count()
    }
}

#[cfg(test)]
mod test {
    use super::ExternRef;

    #[test]
    fn round_trips_flags() {
        let r = ExternRef {
            space_id: 7,
            page_no: 99,
            offset: 38,
            length: 12_345,
            owner: true,
            inherited: false,
        };
        let mut buf = [0u8; ExternRef::SIZE];
        r.write(&mut buf);
        assert_eq!(ExternRef::parse(&buf), r);

        let r2 = ExternRef {
            owner: false,
            inherited: true,
            ..r
        };
        r2.write(&mut buf);
        assert_eq!(ExternRef::parse(&buf), r2);
    }
}
