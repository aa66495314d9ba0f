//! Index page layout: the 56-byte page header between the FIL header and
//! the first record, the infimum/supremum sentinels, and the page
//! directory that grows backward from the FIL trailer.
//!
//! Grounded in `page_types.hpp`/`page_cur.hpp` and the `FIL_PAGE_*` offsets
//! already in [`crate::fil0fil`]; this module only adds what sits between
//! them.

use crate::fil0fil::{FIL_PAGE_DATA, FIL_PAGE_DATA_END};
use crate::mach;

/// Start of the page header, immediately after the 38-byte FIL header.
pub const PAGE_HEADER: usize = FIL_PAGE_DATA as usize;

pub const PAGE_N_DIR_SLOTS: usize = PAGE_HEADER;
pub const PAGE_HEAP_TOP: usize = PAGE_HEADER + 2;
pub const PAGE_N_HEAP: usize = PAGE_HEADER + 4;
pub const PAGE_FREE: usize = PAGE_HEADER + 6;
pub const PAGE_GARBAGE: usize = PAGE_HEADER + 8;
pub const PAGE_LAST_INSERT: usize = PAGE_HEADER + 10;
pub const PAGE_DIRECTION: usize = PAGE_HEADER + 12;
pub const PAGE_N_DIRECTION: usize = PAGE_HEADER + 14;
pub const PAGE_N_RECS: usize = PAGE_HEADER + 16;
pub const PAGE_MAX_TRX_ID: usize = PAGE_HEADER + 18;
pub const PAGE_LEVEL: usize = PAGE_HEADER + 26;
pub const PAGE_INDEX_ID: usize = PAGE_HEADER + 28;
pub const PAGE_BTR_SEG_LEAF: usize = PAGE_HEADER + 36;
pub const PAGE_BTR_SEG_TOP: usize = PAGE_HEADER + 46;
/// First byte of actual record storage.
pub const PAGE_DATA: usize = PAGE_HEADER + 36 + 2 * 10;

pub const FSEG_HEADER_SIZE: usize = 10;

/// Flags of `PAGE_DIRECTION`.
pub const PAGE_LEFT: u16 = 1;
pub const PAGE_RIGHT: u16 = 2;
pub const PAGE_SAME_REC: u16 = 3;
pub const PAGE_SAME_PAGE: u16 = 4;
pub const PAGE_NO_DIRECTION: u16 = 5;

/// Search modes, `page_cur.hpp`'s `PAGE_CUR_*`; values must stay in this
/// order since [`crate::btr0cur`] relies on `PAGE_CUR_GE`/`PAGE_CUR_LE`
/// bracketing `PAGE_CUR_G`/`PAGE_CUR_L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageCurMode {
    Greater = 1,
    GreaterOrEqual = 2,
    Less = 3,
    LessOrEqual = 4,
    /// `PAGE_CUR_DBG`: behaves exactly like [`PageCurMode::LessOrEqual`]
    /// but tells [`crate::btr0cur::search_to_nth_level`] to skip the
    /// adaptive-hash guess and always descend through the tree, for
    /// callers that are themselves validating the hash index.
    Dbg = 5,
}

/// Heap numbers of the two sentinel records every page carries.
pub const PAGE_INFIMUM_HEAP_NO: u16 = 0;
pub const PAGE_SUPREMUM_HEAP_NO: u16 = 1;

/// Byte length of the COMPACT infimum/supremum records' extra bytes plus
/// their fixed 8-byte payload ("infimum\0" / "supremum").
pub const PAGE_INFIMUM_BYTES: usize = 8;
pub const PAGE_SUPREMUM_BYTES: usize = 8;

/// Record origin offset of the infimum record: right after the 5-byte
/// COMPACT header that starts at [`PAGE_DATA`].
pub const PAGE_INFIMUM: usize = PAGE_DATA + crate::rem0types::REC_N_NEW_EXTRA_BYTES;
pub const PAGE_SUPREMUM: usize =
    PAGE_INFIMUM + PAGE_INFIMUM_BYTES + crate::rem0types::REC_N_NEW_EXTRA_BYTES;
/// First byte free for user records.
pub const PAGE_SUPREMUM_END: usize = PAGE_SUPREMUM + PAGE_SUPREMUM_BYTES;

/// Record origin of the infimum sentinel, for either record format;
/// [`PAGE_INFIMUM`] is this function's `is_comp = true` case, kept as a
/// const since most of the test suite only exercises COMPACT pages.
pub fn page_infimum_offset(is_comp: bool) -> usize {
    let extra = if is_comp {
        crate::rem0types::REC_N_NEW_EXTRA_BYTES
    } else {
        crate::rem0types::REC_N_OLD_EXTRA_BYTES
    };
    PAGE_DATA + extra
}

pub fn page_supremum_offset(is_comp: bool) -> usize {
    let extra = if is_comp {
        crate::rem0types::REC_N_NEW_EXTRA_BYTES
    } else {
        crate::rem0types::REC_N_OLD_EXTRA_BYTES
    };
    page_infimum_offset(is_comp) + PAGE_INFIMUM_BYTES + extra
}

pub fn page_supremum_end_offset(is_comp: bool) -> usize {
    page_supremum_offset(is_comp) + PAGE_SUPREMUM_BYTES
}

/// Maximum number of records one page directory slot may own before a new
/// slot must be inserted (`PAGE_DIR_SLOT_MAX_N_OWNED`).
pub const PAGE_DIR_SLOT_MAX_N_OWNED: u8 = 8;
pub const PAGE_DIR_SLOT_MIN_N_OWNED: u8 = 4;
pub const PAGE_DIR_SLOT_SIZE: usize = 2;

pub fn page_header_get_field(page: &[u8], field: usize) -> u16 {
    mach::mach_read_from_2(&page[field..])
}

pub fn page_header_set_field(page: &mut [u8], field: usize, value: u16) {
    mach::mach_write_to_2(&mut page[field..], value).unwrap();
}

pub fn page_get_n_recs(page: &[u8]) -> u16 {
    page_header_get_field(page, PAGE_N_RECS)
}

pub fn page_get_n_dir_slots(page: &[u8]) -> u16 {
    page_header_get_field(page, PAGE_N_DIR_SLOTS)
}

/// Offset of directory slot `n`, counting from the end of the page; slot 0
/// is closest to the FIL trailer and always points at the supremum.
pub fn page_dir_get_nth_slot(page_size: usize, n: usize) -> usize {
    page_size - FIL_PAGE_DATA_END as usize - (n + 1) * PAGE_DIR_SLOT_SIZE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn infimum_before_supremum() {
        assert!(PAGE_INFIMUM < PAGE_SUPREMUM);
        assert!(PAGE_SUPREMUM_END <= PAGE_DATA + 64);
    }
}
