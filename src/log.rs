pub const LOG_FILE_NAME_PREFIX: &str = "ib_logfile";
pub const LOG_FILE_NAME: &str = "ib_logfile0";

// Type (lsn_t) used for all log sequence number storage and arithmetics.
pub type Lsn = u64;

pub const LSN_MAX: Lsn = u64::MAX;

// According to Linux "man 2 read" and "man 2 write" this applies to
// both 32-bit and 64-bit systems.
//
// On FreeBSD, the limit is close to the Linux one, INT_MAX.
//
// On Microsoft Windows, the limit is UINT_MAX (4 GiB - 1).
//
// On other systems, the limit typically is up to SSIZE_T_MAX.
pub const OS_FILE_REQUEST_SIZE_MAX: usize = 0x7fff_f000;

/// The maximum buf_size
pub const BUF_SIZE_MAX: usize = OS_FILE_REQUEST_SIZE_MAX;

/// The original (not version-tagged) InnoDB redo log format
pub const FORMAT_3_23: u32 = 0;
/// The MySQL 5.7.9/MariaDB 10.2.2 log format
pub const FORMAT_10_2: u32 = 1;
/// The MariaDB 10.3.2 log format.
pub const FORMAT_10_3: u32 = 103;
/// The MariaDB 10.4.0 log format.
pub const FORMAT_10_4: u32 = 104;
/// Encrypted MariaDB redo log
pub const FORMAT_ENCRYPTED: u32 = 1u32 << 31;
/// The MariaDB 10.4.0 log format (only with innodb_encrypt_log=ON)
pub const FORMAT_ENC_10_4: u32 = FORMAT_10_4 | FORMAT_ENCRYPTED;
/// The MariaDB 10.5.1 physical redo log format
pub const FORMAT_10_5: u32 = 0x5048_5953;
/// The MariaDB 10.5.1 physical format (only with innodb_encrypt_log=ON)
pub const FORMAT_ENC_10_5: u32 = FORMAT_10_5 | FORMAT_ENCRYPTED;
/// The MariaDB 10.8.0 variable-block-size redo log format
pub const FORMAT_10_8: u32 = 0x5068_7973;
/// The MariaDB 10.8.0 format with innodb_encrypt_log=ON
pub const FORMAT_ENC_10_8: u32 = FORMAT_10_8 | FORMAT_ENCRYPTED;

/// Location of the first checkpoint block
pub const CHECKPOINT_1: usize = 4096;
/// Location of the second checkpoint block
pub const CHECKPOINT_2: usize = 8192;
/// Start of record payload (0x3000)
pub const START_OFFSET: Lsn = 12288;

/// smallest possible log sequence number in the current format
/// (used to be 2048 before FORMAT_10_8).
pub const FIRST_LSN: Lsn = START_OFFSET;

use std::fs::OpenOptions;
use std::io::{Cursor, Result as IoResult};
use std::path::Path;

use anyhow::Context;
use mmap_rs::{MmapFlags, MmapMut, MmapOptions};

use crate::mach;
use crate::mtr::Mtr;
use crate::ring::RingReader;

const HDR_CREATOR_LEN: usize = 32;
const HDR_TOTAL_LEN: usize = 4 + 8 + 1 + HDR_CREATOR_LEN;

const CKP_TOTAL_LEN: usize = 8 + 8 + 1;

/// Fields decoded from the plaintext redo log file header.
#[derive(Debug, Clone, Copy)]
pub struct RedoHeaderInfo {
    pub format: u32,
    pub first_lsn: Lsn,
    pub encrypted: bool,
}

/// Fields decoded from a checkpoint block.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointInfo {
    pub checkpoint_lsn: Option<Lsn>,
    pub end_lsn: Lsn,
    pub encrypted: bool,
}

/// Builds the byte images of the redo log header and checkpoint blocks.
/// These are written verbatim into the log file; [`Redo`] is what parses
/// them back.
pub struct RedoHeader;

impl RedoHeader {
    /// Build an unencrypted FORMAT_10_8 log file header.
    pub fn build_unencrypted_header_10_8(first_lsn: Lsn, creator: &str) -> IoResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(HDR_TOTAL_LEN);

        mach::mach_write_to_4(&mut buf, FORMAT_10_8)?;
        mach::mach_write_to_8(&mut buf, first_lsn)?;
        buf.push(0); // not encrypted

        let creator = creator.as_bytes();
        let n = creator.len().min(HDR_CREATOR_LEN);
        buf.extend_from_slice(&creator[..n]);
        buf.resize(HDR_TOTAL_LEN, 0);

        Ok(buf)
    }

    /// Build an unencrypted checkpoint block.
    pub fn build_unencrypted_header_10_8_checkpoint(
        checkpoint_lsn: Lsn,
        end_lsn: Lsn,
    ) -> IoResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(CKP_TOTAL_LEN);

        mach::mach_write_to_8(&mut buf, checkpoint_lsn)?;
        mach::mach_write_to_8(&mut buf, end_lsn)?;
        buf.push(0); // not encrypted

        Ok(buf)
    }
}

/// One parsed group of mini-transaction records returned by a single
/// [`RedoReader::parse_next`] call.
#[derive(Debug)]
pub struct Chain {
    pub mtr: Vec<Mtr>,
}

/// Iterates the mini-transactions recorded in the capacity (ring) region
/// of a redo log file, starting at the position recorded by the most
/// recent checkpoint.
pub struct RedoReader<'a> {
    ring: RingReader<'a>,
}

impl<'a> RedoReader<'a> {
    pub fn parse_next(&mut self) -> anyhow::Result<Chain> {
        let mtr = Mtr::parse_next(&mut self.ring)?;

        Ok(Chain { mtr: vec![mtr] })
    }
}

/// A memory-mapped redo log file: the fixed-size header and checkpoint
/// blocks, followed by the ring-buffered mini-transaction log.
pub struct Redo {
    m: MmapMut,
}

impl Redo {
    /// Create (or truncate) a redo log file of `size` bytes and map it for
    /// writing. `first_lsn` is the byte offset at which the ring-buffered
    /// capacity region begins, normally [`FIRST_LSN`].
    pub fn writer(path: &Path, _first_lsn: usize, size: u64) -> anyhow::Result<Redo> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create redo log file at {}", path.display()))?;

        file.set_len(size).context("set redo log file length")?;

        let m = unsafe {
            MmapOptions::new(size as usize)
                .context("mmap option")?
                .with_file(&file, 0u64)
                .with_flags(MmapFlags::SHARED)
                .map_mut()
                .context("mmap redo log file")?
        };

        Ok(Redo { m })
    }

    /// Open an existing redo log file for reading (and, incidentally,
    /// writing, since the underlying mapping is shared).
    pub fn open(path: &Path) -> anyhow::Result<Redo> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open redo log file at {}", path.display()))?;

        let size = file
            .metadata()
            .context("get metadata for redo log file")?
            .len();

        let m = unsafe {
            MmapOptions::new(size as usize)
                .context("mmap option")?
                .with_file(&file, 0u64)
                .with_flags(MmapFlags::SHARED)
                .map_mut()
                .context("mmap redo log file")?
        };

        Ok(Redo { m })
    }

    /// A cursor over the whole file, for writing the header, checkpoint
    /// blocks and test fixtures at arbitrary offsets.
    pub fn cursor(&mut self) -> Cursor<&mut [u8]> {
        Cursor::new(self.m.as_mut_slice())
    }

    pub fn buf(&self) -> &[u8] {
        self.m.as_slice()
    }

    pub fn header(&self) -> RedoHeaderInfo {
        let buf = self.m.as_slice();

        RedoHeaderInfo {
            format: mach::mach_read_from_4(&buf[0..4]),
            first_lsn: mach::mach_read_from_8(&buf[4..12]),
            encrypted: buf[12] != 0,
        }
    }

    pub fn checkpoint(&self) -> CheckpointInfo {
        let buf = &self.m.as_slice()[CHECKPOINT_1..CHECKPOINT_1 + CKP_TOTAL_LEN];
        let checkpoint_lsn = mach::mach_read_from_8(&buf[0..8]);

        CheckpointInfo {
            checkpoint_lsn: if checkpoint_lsn == 0 {
                None
            } else {
                Some(checkpoint_lsn)
            },
            end_lsn: mach::mach_read_from_8(&buf[8..16]),
            encrypted: buf[16] != 0,
        }
    }

    /// A reader positioned at the mini-transaction following the most
    /// recent checkpoint.
    pub fn reader(&self) -> RedoReader<'_> {
        let header = self.header();
        let checkpoint = self.checkpoint();
        let capacity_buf = &self.m.as_slice()[header.first_lsn as usize..];

        RedoReader {
            ring: RingReader::buf_at(
                capacity_buf,
                header.first_lsn as usize,
                checkpoint.end_lsn as usize,
            ),
        }
    }
}
