//! B-tree-wide constants and the latch-mode enum the tree cursor uses to
//! drive latch coupling during a descent.
//!
//! Grounded in `btr_types.hpp`/`btr_cur.hpp`/`btr_sea.hpp`: none of these
//! are page-format bits, just tuning constants and the latch-mode
//! vocabulary those files name directly.

/// Latch-coupling policy for [`crate::btr0cur::search_to_nth_level`].
/// Order matters: `ModifyTree`/`ContModifyTree` hold the tree meta-latch
/// for the whole operation, the `*Leaf`/`*Prev` modes release it as soon
/// as the leaf is latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtrLatchMode {
    /// S- or X-latch the leaf only; caller wants to read.
    SearchLeaf,
    /// S- or X-latch the leaf only; caller may mutate the leaf in place.
    ModifyLeaf,
    /// X-latch the tree meta-latch for the whole operation; latches
    /// left sibling, target and right sibling at the leaf.
    ModifyTree,
    /// Continuation of a `ModifyTree` descent after a release; caller
    /// already owns the tree X-latch.
    ContModifyTree,
    /// Like `SearchLeaf`, but also latches and returns the left sibling.
    SearchPrev,
    /// Like `ModifyLeaf`, but also latches and returns the left sibling.
    ModifyPrev,
}

impl BtrLatchMode {
    pub fn is_leaf_only(self) -> bool {
        matches!(
            self,
            BtrLatchMode::SearchLeaf
                | BtrLatchMode::ModifyLeaf
                | BtrLatchMode::SearchPrev
                | BtrLatchMode::ModifyPrev
        )
    }

    pub fn wants_left_sibling(self) -> bool {
        matches!(self, BtrLatchMode::SearchPrev | BtrLatchMode::ModifyPrev)
    }

    pub fn is_modify(self) -> bool {
        !matches!(self, BtrLatchMode::SearchLeaf | BtrLatchMode::SearchPrev)
    }
}

/// `BTR_CUR_PAGE_COMPRESS_LIMIT`: a leaf or node page below this fraction
/// of its page size is a merge candidate.
pub fn btr_cur_page_compress_limit(page_size: usize) -> usize {
    page_size / 2
}

/// `BTR_SEARCH_HASH_ANALYSIS`: rounds waited after a change in the
/// recommended prefix before the adaptive hash analysis runs again.
pub const BTR_SEARCH_HASH_ANALYSIS: u32 = 17;
/// `BTR_SEARCH_ON_PATTERN_LIMIT` / `BTR_SEARCH_ON_HASH_LIMIT`: how many
/// consecutive hits the search-pattern / hash shortcut needs before it is
/// trusted again after a miss.
pub const BTR_SEARCH_ON_PATTERN_LIMIT: u32 = 3;
pub const BTR_SEARCH_ON_HASH_LIMIT: u32 = 3;
/// `BTR_SEA_TIMEOUT`: searches done before voluntarily releasing a
/// contended search latch.
pub const BTR_SEA_TIMEOUT: u32 = 10_000;

/// `BTR_CUR_RETRY_DELETE_N_TIMES` / `BTR_CUR_RETRY_SLEEP_TIME`: bounds on
/// the retry loop `pessimistic_delete` runs against a transient lock-wait
/// from the collaborating lock manager.
pub const BTR_CUR_RETRY_DELETE_N_TIMES: u32 = 100;
/// Microseconds slept between retries of that loop.
pub const BTR_CUR_RETRY_SLEEP_TIME_US: u32 = 50_000;

/// `BTR_N_LEAF_PAGES` / `BTR_TOTAL_SIZE`: the two counters
/// [`crate::btr0btr::get_size`] can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtrSizeKind {
    NLeafPages,
    TotalSize,
}
