//! The error taxonomy of the clustered-index storage core.
//!
//! `DbErr` is the `db_err` enum of the original engine: every mutating
//! entry point returns one of these as a tagged status rather than
//! unwinding. Optimistic-path failures (`Fail`, `Overflow`, `Underflow`,
//! `ZipOverflow`) are ordinary control flow for the pessimistic retries
//! in [`crate::btr0cur`]; the rest are either surfaced to the caller
//! (`TooBigRecord`, `OutOfFileSpace`) or internal to the core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbErr {
    /// An optimistic operation could not fit on the current page; the
    /// caller should escalate to the pessimistic counterpart.
    #[error("optimistic operation did not fit on the page")]
    Fail,

    /// `optimistic_update` would grow the record past what the page (or
    /// its free space after reorganize) can hold.
    #[error("update would overflow the page")]
    Overflow,

    /// `optimistic_update` would shrink the record enough to require a
    /// merge check the optimistic path does not perform.
    #[error("update would underflow the page")]
    Underflow,

    /// Like `Overflow`, but observed on a compressed page whose zip
    /// image has no room even after `page_zip_reorganize`.
    #[error("update would overflow the compressed page image")]
    ZipOverflow,

    /// Even after `convert_big_rec` exhausted every shortening candidate,
    /// the tuple is still too large for a record on this page.
    #[error("record cannot be shortened to fit a single page")]
    TooBigRecord,

    /// A pessimistic entry point's up-front extent reservation failed;
    /// no mutation was performed.
    #[error("out of file space reserving extents")]
    OutOfFileSpace,

    /// The collaborating lock manager reported that the caller must wait.
    #[error("lock wait")]
    LockWait,

    /// `index.is_comp` disagrees with the record's own format bit.
    #[error("record format does not match index definition")]
    FormatMismatch,

    /// `rec_get_offsets` found the record inconsistent with the index
    /// definition (field count, offset ordering, etc).
    #[error("corrupt record offsets")]
    CorruptOffsets,

    /// A page or compressed-page checksum did not match.
    #[error("bad page checksum")]
    BadChecksum,

    /// `page_zip_compress`/`decompress` failed (corrupt or oversized
    /// input, zlib stream error).
    #[error("page compression or decompression failure")]
    CompressionFailure,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbErr>;
