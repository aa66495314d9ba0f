//! Physical record codec: computing field offsets from a stored record,
//! converting a [`crate::data0data::DTuple`] to its on-page byte image and
//! back, and the fold used by the adaptive hash index.
//!
//! Grounded in `rem_rec.hpp`'s REDUNDANT ("old") and COMPACT ("new") record
//! formats. Both share the idea of a small fixed header immediately before
//! the record origin, preceded by a per-field array that locates each
//! field's data without touching the field itself; they differ in how that
//! array is packed.

use crate::data0data::{DField, DTuple};
use crate::error::DbErr;
use crate::mach;
use crate::rem0types::{
    FieldDef, IndexDesc, REC_1BYTE_OFFS_LIMIT, REC_HEAP_NO_SHIFT, REC_INFO_DELETED_FLAG,
    REC_INFO_MIN_REC_FLAG, REC_MAX_N_FIELDS, REC_N_NEW_EXTRA_BYTES, REC_N_OLD_EXTRA_BYTES,
    REC_NEW_HEAP_NO, REC_STATUS_INFIMUM, REC_STATUS_NODE_PTR, REC_STATUS_ORDINARY,
    REC_STATUS_SUPREMUM,
};

/// One field's position, worked out by [`RecOffsets::compute`]: where its
/// data ends (offsets are cumulative, so the start is the previous field's
/// end), whether it is SQL NULL, and whether it is stored externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    pub end_offset: u32,
    pub sql_null: bool,
    pub extern_flag: bool,
}

/// The per-field layout of one physical record, plus the size of its
/// "extra" bytes (header, length array, null bitmap) ahead of the origin.
/// Mirrors what `rec_get_offsets` hands back, minus the packed-array
/// representation: callers index [`RecOffsets::fields`] directly.
#[derive(Debug, Clone)]
pub struct RecOffsets {
    pub origin: usize,
    pub extra_size: usize,
    pub data_size: usize,
    pub fields: Vec<FieldOffset>,
}

impl RecOffsets {
    pub fn compute(page: &[u8], rec_offset: usize, index: &IndexDesc) -> Result<RecOffsets, DbErr> {
        if index.n_fields() > REC_MAX_N_FIELDS {
            return Err(DbErr::CorruptOffsets);
        }
        if index.is_comp {
            compute_comp(page, rec_offset, index)
        } else {
            compute_redundant(page, rec_offset, index)
        }
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// Start offset of field `i`, relative to the record origin.
    pub fn field_start(&self, i: usize) -> u32 {
        if i == 0 {
            0
        } else {
            self.fields[i - 1].end_offset
        }
    }

    /// The stored bytes of field `i` (empty for NULL or zero-length).
    pub fn field_data<'a>(&self, page: &'a [u8], rec_offset: usize, i: usize) -> &'a [u8] {
        let f = &self.fields[i];
        if f.sql_null {
            return &[];
        }
        let start = rec_offset + self.field_start(i) as usize;
        let end = rec_offset + f.end_offset as usize;
        &page[start..end]
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.fields[i].sql_null
    }

    pub fn is_extern(&self, i: usize) -> bool {
        self.fields[i].extern_flag
    }
}

fn compute_comp(page: &[u8], rec_offset: usize, index: &IndexDesc) -> Result<RecOffsets, DbErr> {
    let n_fields = index.n_fields();
    let n_nullable = index.n_nullable();
    let null_bytes = n_nullable.div_ceil(8);

    let header_start = rec_offset
        .checked_sub(REC_N_NEW_EXTRA_BYTES)
        .ok_or(DbErr::CorruptOffsets)?;
    let bitmap_start = header_start
        .checked_sub(null_bytes)
        .ok_or(DbErr::CorruptOffsets)?;
    let bitmap = &page[bitmap_start..header_start];

    let mut is_null = vec![false; n_fields];
    let mut bit = 0usize;
    for (i, f) in index.fields.iter().enumerate() {
        if f.nullable {
            is_null[i] = (bitmap[bit / 8] >> (bit % 8)) & 1 != 0;
            bit += 1;
        }
    }

    let mut field_len = vec![0u32; n_fields];
    let mut field_extern = vec![false; n_fields];
    let mut cursor = bitmap_start;
    for i in (0..n_fields).rev() {
        let f = &index.fields[i];
        if f.is_fixed() {
            field_len[i] = f.fixed_len as u32;
            continue;
        }
        if is_null[i] {
            continue;
        }
        if f.uses_one_byte_len() {
            cursor = cursor.checked_sub(1).ok_or(DbErr::CorruptOffsets)?;
            field_len[i] = page[cursor] as u32;
        } else {
            cursor = cursor.checked_sub(2).ok_or(DbErr::CorruptOffsets)?;
            let v = mach::mach_read_from_2(&page[cursor..]);
            field_extern[i] = v & 0x8000 != 0;
            field_len[i] = (v & 0x3FFF) as u32;
        }
    }
    let extra_size = rec_offset - cursor;

    let mut fields = Vec::with_capacity(n_fields);
    let mut acc = 0u32;
    for i in 0..n_fields {
        if !is_null[i] {
            acc += field_len[i];
        }
        fields.push(FieldOffset {
            end_offset: acc,
            sql_null: is_null[i],
            extern_flag: field_extern[i],
        });
    }

    Ok(RecOffsets {
        origin: rec_offset,
        extra_size,
        data_size: acc as usize,
        fields,
    })
}

fn compute_redundant(page: &[u8], rec_offset: usize, index: &IndexDesc) -> Result<RecOffsets, DbErr> {
    let header_start = rec_offset
        .checked_sub(REC_N_OLD_EXTRA_BYTES)
        .ok_or(DbErr::CorruptOffsets)?;
    let n_fields_and_short = mach::mach_read_from_2(&page[header_start + 2..]);
    let short_flag = n_fields_and_short & 1 != 0;
    let n_fields = (n_fields_and_short >> 1) as usize;
    if n_fields != index.n_fields() {
        return Err(DbErr::FormatMismatch);
    }

    let entry_size = if short_flag { 1 } else { 2 };
    let table_size = n_fields * entry_size;
    let table_start = header_start
        .checked_sub(table_size)
        .ok_or(DbErr::CorruptOffsets)?;

    let mut fields = Vec::with_capacity(n_fields);
    let mut prev_end = 0u32;
    for i in 0..n_fields {
        // the table holds one entry per field in reverse field order
        let slot = table_start + (n_fields - 1 - i) * entry_size;
        let (raw, sql_null, extern_flag) = if short_flag {
            let b = page[slot];
            ((b & 0x7F) as u32, b & 0x80 != 0, false)
        } else {
            let v = mach::mach_read_from_2(&page[slot..]);
            ((v & 0x3FFF) as u32, v & 0x8000 != 0, v & 0x4000 != 0)
        };
        let end_offset = if sql_null { prev_end } else { raw };
        prev_end = end_offset;
        fields.push(FieldOffset {
            end_offset,
            sql_null,
            extern_flag,
        });
    }

    let extra_size = rec_offset - table_start;
    let data_size = fields.last().map(|f| f.end_offset).unwrap_or(0) as usize;

    Ok(RecOffsets {
        origin: rec_offset,
        extra_size,
        data_size,
        fields,
    })
}

/// Header fields common to both record formats, read back out of a page.
#[derive(Debug, Clone, Copy)]
pub struct RecHeader {
    pub info_bits: u8,
    pub n_owned: u8,
    pub heap_no: u16,
    pub status: u8,
    pub next_offset: u16,
}

pub fn read_header(page: &[u8], rec_offset: usize, is_comp: bool) -> RecHeader {
    if is_comp {
        let b0 = page[rec_offset - 5];
        let heap_status = mach::mach_read_from_2(&page[rec_offset - 4..]);
        let next_offset = mach::mach_read_from_2(&page[rec_offset - 2..]);
        RecHeader {
            info_bits: b0 & 0xF0,
            n_owned: b0 & 0x0F,
            heap_no: heap_status >> REC_HEAP_NO_SHIFT,
            status: (heap_status & 0x7) as u8,
            next_offset,
        }
    } else {
        let n_owned = page[rec_offset - 6];
        let info_bits = page[rec_offset - 5];
        let next_offset = mach::mach_read_from_2(&page[rec_offset - 2..]);
        RecHeader {
            info_bits,
            n_owned,
            heap_no: 0,
            status: REC_STATUS_ORDINARY,
            next_offset,
        }
    }
}

pub fn write_header(page: &mut [u8], rec_offset: usize, is_comp: bool, hdr: &RecHeader) {
    if is_comp {
        page[rec_offset - 5] = (hdr.info_bits & 0xF0) | (hdr.n_owned & 0x0F);
        let heap_status = (hdr.heap_no << REC_HEAP_NO_SHIFT) | (hdr.status as u16 & 0x7);
        mach::mach_write_to_2(&mut page[rec_offset - 4..], heap_status).unwrap();
        mach::mach_write_to_2(&mut page[rec_offset - 2..], hdr.next_offset).unwrap();
    } else {
        page[rec_offset - 6] = hdr.n_owned;
        page[rec_offset - 5] = hdr.info_bits;
        mach::mach_write_to_2(&mut page[rec_offset - 2..], hdr.next_offset).unwrap();
    }
}

pub fn is_deleted(hdr: &RecHeader) -> bool {
    hdr.info_bits & REC_INFO_DELETED_FLAG != 0
}

pub fn is_min_rec(hdr: &RecHeader) -> bool {
    hdr.info_bits & REC_INFO_MIN_REC_FLAG != 0
}

/// Set or clear the `MIN_REC` flag on the record at `rec_offset` in place.
/// A page's own first record carries this flag whenever the page is not
/// the tree's leftmost page on its level (at any level, leaf included),
/// standing in for "-infinity" so comparisons never need to dereference
/// its key; splits, merges and page discards keep it in sync as pages
/// gain or lose that status.
pub fn set_min_rec(page: &mut [u8], rec_offset: usize, is_comp: bool, value: bool) {
    let mut hdr = read_header(page, rec_offset, is_comp);
    if value {
        hdr.info_bits |= REC_INFO_MIN_REC_FLAG;
    } else {
        hdr.info_bits &= !REC_INFO_MIN_REC_FLAG;
    }
    write_header(page, rec_offset, is_comp, &hdr);
}

pub fn is_infimum(hdr: &RecHeader, is_comp: bool) -> bool {
    is_comp && hdr.status == REC_STATUS_INFIMUM
}

pub fn is_supremum(hdr: &RecHeader, is_comp: bool) -> bool {
    is_comp && hdr.status == REC_STATUS_SUPREMUM
}

pub fn is_node_ptr(hdr: &RecHeader, is_comp: bool, offsets: &RecOffsets, index: &IndexDesc) -> bool {
    if is_comp {
        hdr.status == REC_STATUS_NODE_PTR
    } else {
        offsets.n_fields() == index.n_unique + 1
    }
}

/// Size, in bytes, of the extra header/length-array/null-bitmap region a
/// COMPACT record of this shape needs, not counting the field data itself.
fn extra_size_comp(index: &IndexDesc, tuple: &DTuple) -> usize {
    let null_bytes = index.n_nullable().div_ceil(8);
    let mut var_len_bytes = 0usize;
    for (i, f) in index.fields.iter().enumerate() {
        if f.is_fixed() {
            continue;
        }
        if tuple.fields[i].is_null() {
            continue;
        }
        var_len_bytes += if f.uses_one_byte_len() { 1 } else { 2 };
    }
    REC_N_NEW_EXTRA_BYTES + null_bytes + var_len_bytes
}

fn extra_size_redundant(index: &IndexDesc, tuple: &DTuple) -> usize {
    let entry_size = if tuple.data_size() as usize <= REC_1BYTE_OFFS_LIMIT as usize {
        1
    } else {
        2
    };
    REC_N_OLD_EXTRA_BYTES + index.n_fields() * entry_size
}

/// Number of bytes a record built from `tuple` against `index` will
/// occupy, extra bytes included. Used to size the page's free space check
/// before a physical insert.
pub fn converted_size(tuple: &DTuple, index: &IndexDesc) -> usize {
    let data_size = tuple.data_size() as usize;
    let extra = if index.is_comp {
        extra_size_comp(index, tuple)
    } else {
        extra_size_redundant(index, tuple)
    };
    data_size + extra
}

/// Build the byte image of `tuple` against `index`: the extra bytes
/// (header, lengths, null bitmap) followed by the field data, with the
/// record origin at the returned offset.
pub fn convert_dtuple_to_rec(
    tuple: &DTuple,
    index: &IndexDesc,
    heap_no: u16,
    status: u8,
) -> Result<(Vec<u8>, usize), DbErr> {
    if tuple.n_fields() != index.n_fields() {
        return Err(DbErr::FormatMismatch);
    }
    if index.is_comp {
        convert_comp(tuple, index, heap_no, status)
    } else {
        convert_redundant(tuple, index)
    }
}

fn convert_comp(
    tuple: &DTuple,
    index: &IndexDesc,
    heap_no: u16,
    status: u8,
) -> Result<(Vec<u8>, usize), DbErr> {
    let null_bytes = index.n_nullable().div_ceil(8);
    let mut var_len_bytes = 0usize;
    let mut bitmap = vec![0u8; null_bytes];
    let mut bit = 0usize;

    for (i, f) in index.fields.iter().enumerate() {
        let field = &tuple.fields[i];
        if f.nullable && field.is_null() {
            bitmap[bit / 8] |= 1 << (bit % 8);
        }
        if f.nullable {
            bit += 1;
        }
        if f.is_fixed() || field.is_null() {
            continue;
        }
        let len = field.len();
        if f.uses_one_byte_len() {
            if len > 255 {
                return Err(DbErr::TooBigRecord);
            }
            var_len_bytes += 1;
        } else {
            if len > 0x3FFF {
                return Err(DbErr::TooBigRecord);
            }
            var_len_bytes += 2;
        }
    }

    // lay out: [reverse var-len array][null bitmap][5-byte header][data]
    let extra = REC_N_NEW_EXTRA_BYTES + null_bytes + var_len_bytes;
    let total = extra + tuple.data_size() as usize;
    let mut buf = vec![0u8; total];
    let origin = extra;

    let mut cursor = origin - REC_N_NEW_EXTRA_BYTES - null_bytes;
    for (i, f) in index.fields.iter().enumerate().rev() {
        if f.is_fixed() {
            continue;
        }
        let field = &tuple.fields[i];
        if field.is_null() {
            continue;
        }
        let len = field.len();
        if f.uses_one_byte_len() {
            cursor -= 1;
            buf[cursor] = len as u8;
        } else {
            cursor -= 2;
            let mut v = len & 0x3FFF;
            if field.ext {
                v |= 0x8000;
            }
            mach::mach_write_to_2(&mut buf[cursor..], v as u16).unwrap();
        }
    }
    debug_assert_eq!(cursor, origin - REC_N_NEW_EXTRA_BYTES - null_bytes);

    buf[origin - REC_N_NEW_EXTRA_BYTES - null_bytes..origin - REC_N_NEW_EXTRA_BYTES]
        .copy_from_slice(&bitmap);

    write_header(
        &mut buf,
        origin,
        true,
        &RecHeader {
            info_bits: tuple.info_bits,
            n_owned: 0,
            heap_no,
            status,
            next_offset: 0,
        },
    );

    let mut data_cursor = origin;
    for field in &tuple.fields {
        if field.is_null() {
            continue;
        }
        let data = field.data();
        buf[data_cursor..data_cursor + data.len()].copy_from_slice(data);
        data_cursor += data.len();
    }

    Ok((buf, origin))
}

fn convert_redundant(tuple: &DTuple, index: &IndexDesc) -> Result<(Vec<u8>, usize), DbErr> {
    let n_fields = index.n_fields();
    let data_size = tuple.data_size() as usize;
    let short_flag = data_size <= REC_1BYTE_OFFS_LIMIT as usize;
    let entry_size = if short_flag { 1 } else { 2 };
    let table_size = n_fields * entry_size;
    let extra = REC_N_OLD_EXTRA_BYTES + table_size;
    let total = extra + data_size;

    let mut buf = vec![0u8; total];
    let origin = extra;
    let table_start = origin - REC_N_OLD_EXTRA_BYTES - table_size;

    let mut end = 0u32;
    let mut data_cursor = origin;
    for (i, field) in tuple.fields.iter().enumerate() {
        let slot = table_start + (n_fields - 1 - i) * entry_size;
        if field.is_null() {
            if short_flag {
                buf[slot] = (end as u8) | 0x80;
            } else {
                mach::mach_write_to_2(&mut buf[slot..], (end as u16) | 0x8000).unwrap();
            }
            continue;
        }
        let data = field.data();
        buf[data_cursor..data_cursor + data.len()].copy_from_slice(data);
        data_cursor += data.len();
        end += data.len() as u32;
        if short_flag {
            buf[slot] = end as u8;
        } else {
            let mut v = end as u16;
            if field.ext {
                v |= 0x4000;
            }
            mach::mach_write_to_2(&mut buf[slot..], v).unwrap();
        }
    }

    write_header(
        &mut buf,
        origin,
        false,
        &RecHeader {
            info_bits: tuple.info_bits,
            n_owned: 0,
            heap_no: 0,
            status: REC_STATUS_ORDINARY,
            next_offset: 0,
        },
    );
    mach::mach_write_to_2(
        &mut buf[origin - REC_N_OLD_EXTRA_BYTES + 2..],
        ((n_fields as u16) << 1) | (short_flag as u16),
    )
    .unwrap();

    Ok((buf, origin))
}

/// Copy the first `n` fields of the record at `rec_offset` into an owned
/// tuple, as used to build node pointers and persistent-cursor prefixes.
pub fn copy_prefix_to_dtuple(
    page: &[u8],
    rec_offset: usize,
    offsets: &RecOffsets,
    index: &IndexDesc,
    n: usize,
) -> DTuple {
    let mut fields = Vec::with_capacity(n);
    for i in 0..n {
        let dtype = field_dtype(index, i);
        if offsets.is_null(i) {
            fields.push(DField::null(dtype));
        } else {
            let data = offsets.field_data(page, rec_offset, i).to_vec();
            let mut f = DField::new(dtype, data);
            f.ext = offsets.is_extern(i);
            fields.push(f);
        }
    }
    DTuple::new(fields)
}

fn field_dtype(index: &IndexDesc, i: usize) -> crate::data0data::DType {
    let f: &FieldDef = &index.fields[i];
    let mtype = if f.is_blob {
        crate::data0data::DATA_BLOB
    } else if f.is_fixed() {
        crate::data0data::DATA_FIXBINARY
    } else {
        crate::data0data::DATA_BINARY
    };
    let mut dtype = crate::data0data::DType::new(mtype, 0, f.max_len as u32);
    if !f.nullable {
        dtype.prtype |= crate::data0data::DATA_NOT_NULL;
    }
    dtype
}

/// `ut_fold_binary` over a record's ordered key-field bytes, used to
/// populate and probe the adaptive hash index.
pub fn fold(page: &[u8], rec_offset: usize, offsets: &RecOffsets, n_fields: usize) -> u32 {
    let mut h: u32 = 0;
    for i in 0..n_fields.min(offsets.n_fields()) {
        let data = offsets.field_data(page, rec_offset, i);
        for &b in data {
            h = h.rotate_left(8) ^ u32::from(b).wrapping_mul(0x9E37_79B1);
        }
        h = h.rotate_left(5) ^ 0xFF;
    }
    h
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data0data::{DField, DType, DTuple, DATA_INT, DATA_VARCHAR};

    fn tiny_index() -> IndexDesc {
        IndexDesc::new(
            true,
            vec![
                FieldDef::fixed(4, false),
                FieldDef::variable(255, true, false),
            ],
            1,
        )
    }

    fn tuple(id: i32, name: Option<&str>) -> DTuple {
        let id_type = DType::new(DATA_INT, crate::data0data::DATA_NOT_NULL, 4);
        let name_type = DType::new(DATA_VARCHAR, 0, 255);
        let name_field = match name {
            Some(s) => DField::new(name_type, s.as_bytes().to_vec()),
            None => DField::null(name_type),
        };
        DTuple::new(vec![DField::new(id_type, id.to_be_bytes().to_vec()), name_field])
    }

    #[test]
    fn round_trips_comp_record_with_null() {
        let index = tiny_index();
        let t = tuple(7, None);
        let (buf, origin) = convert_comp(&t, &index, REC_NEW_HEAP_NO, REC_STATUS_ORDINARY).unwrap();
        let offsets = RecOffsets::compute(&buf, origin, &index).unwrap();
        assert!(offsets.is_null(1));
        assert_eq!(offsets.field_data(&buf, origin, 0), &7i32.to_be_bytes());
    }

    #[test]
    fn round_trips_comp_record_with_value() {
        let index = tiny_index();
        let t = tuple(42, Some("hello"));
        let (buf, origin) = convert_comp(&t, &index, REC_NEW_HEAP_NO, REC_STATUS_ORDINARY).unwrap();
        let offsets = RecOffsets::compute(&buf, origin, &index).unwrap();
        assert!(!offsets.is_null(1));
        assert_eq!(offsets.field_data(&buf, origin, 1), b"hello");
    }

    #[test]
    fn round_trips_redundant_record() {
        let index = IndexDesc::new(
            false,
            vec![
                FieldDef::fixed(4, false),
                FieldDef::variable(255, false, false),
            ],
            1,
        );
        let t = tuple(9, Some("x"));
        let (buf, origin) = convert_redundant(&t, &index).unwrap();
        let offsets = RecOffsets::compute(&buf, origin, &index).unwrap();
        assert_eq!(offsets.field_data(&buf, origin, 0), &9i32.to_be_bytes());
        assert_eq!(offsets.field_data(&buf, origin, 1), b"x");
    }

    #[test]
    fn fold_is_stable_for_same_key() {
        let index = tiny_index();
        let t1 = tuple(1, Some("a"));
        let t2 = tuple(1, Some("b"));
        let (buf1, origin1) = convert_comp(&t1, &index, REC_NEW_HEAP_NO, REC_STATUS_ORDINARY).unwrap();
        let (buf2, origin2) = convert_comp(&t2, &index, REC_NEW_HEAP_NO, REC_STATUS_ORDINARY).unwrap();
        let offsets1 = RecOffsets::compute(&buf1, origin1, &index).unwrap();
        let offsets2 = RecOffsets::compute(&buf2, origin2, &index).unwrap();
        assert_eq!(
            fold(&buf1, origin1, &offsets1, 1),
            fold(&buf2, origin2, &offsets2, 1)
        );
    }
}
