// Functions related to encoding.
use std::io::{Result, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

// MariaDB uses big-endian byte order for its Mach-O files.
// The most significant byte is at the lowest address.
type E = BigEndian;

pub fn mach_read_from_2(buf: &[u8]) -> u16 {
    E::read_u16(buf)
}

pub fn mach_read_from_4(buf: &[u8]) -> u32 {
    E::read_u32(buf)
}

pub fn mach_read_from_8(buf: &[u8]) -> u64 {
    E::read_u64(buf)
}

pub fn mach_write_to_2(mut w: impl Write, n: u16) -> Result<()> {
    w.write_u16::<E>(n)
}

pub fn mach_write_to_4(mut w: impl Write, n: u32) -> Result<()> {
    w.write_u32::<E>(n)
}

pub fn mach_write_to_8(mut w: impl Write, n: u64) -> Result<()> {
    w.write_u64::<E>(n)
}
