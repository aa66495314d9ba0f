use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result};
use std::ops::Add;

use crate::mach;

/// A reader over a fixed-size ring buffer (the redo log capacity region).
///
/// `pos` is tracked as an unbounded, monotonically increasing offset
/// ("lsn-like") rather than a wrapped buffer index, so that two readers
/// taken at different points in the same pass can be subtracted to
/// recover the number of bytes between them, even across a wrap.
#[derive(Debug, Clone)]
pub struct RingReader<'a> {
    buf: &'a [u8],
    header: usize,
    pos: usize,
}

impl<'a> RingReader<'a> {
    pub fn new(buf: &'a [u8]) -> RingReader<'a> {
        Self::buf_at(buf, 0, 0)
    }

    pub fn buf_at(buf: &'a [u8], header: usize, pos: usize) -> RingReader<'a> {
        RingReader { buf, header, pos }
    }

    fn idx(&self) -> usize {
        self.pos % self.buf.len()
    }

    /// Logical header size this reader was constructed with.
    pub fn header(&self) -> usize {
        self.header
    }

    /// Capacity of the underlying ring buffer, in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Current unbounded position (bytes advanced since the reader's origin).
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ensure(&self, t: usize) -> Result<()> {
        if self.len() < t {
            return Err(Error::from(ErrorKind::UnexpectedEof));
        }

        Ok(())
    }

    pub fn advance(&mut self, bytes: usize) {
        self.pos += bytes;
    }

    pub fn peek_1(&self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf[self.idx()])
    }

    pub fn read_1(&mut self) -> Result<u8> {
        let b = self.peek_1()?;
        self.advance(1);
        Ok(b)
    }

    pub fn read_4(&mut self) -> Result<u32> {
        self.ensure(4)?;

        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;

        Ok(mach::mach_read_from_4(&buf))
    }

    pub fn read_8(&mut self) -> Result<u64> {
        self.ensure(8)?;

        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;

        Ok(mach::mach_read_from_8(&buf))
    }

    /// Copy `out.len()` bytes starting at the current position into `out`,
    /// without advancing the reader.
    pub fn block(&self, out: &mut [u8]) {
        let mut idx = self.idx();
        for b in out.iter_mut() {
            *b = self.buf[idx];
            idx += 1;
            if idx >= self.buf.len() {
                idx = 0;
            }
        }
    }

    /// CRC-32C of the `len` bytes starting at the current position, without
    /// advancing the reader.
    pub fn crc32c(&self, len: usize) -> u32 {
        let mut tmp = vec![0u8; len];
        self.block(&mut tmp);
        crc32c::crc32c(&tmp)
    }
}

impl<'a> Add<usize> for RingReader<'a> {
    type Output = RingReader<'a>;

    fn add(self, rhs: usize) -> Self::Output {
        RingReader {
            buf: self.buf,
            header: self.header,
            pos: self.pos + rhs,
        }
    }
}

impl<'a> Add<usize> for &RingReader<'a> {
    type Output = RingReader<'a>;

    fn add(self, rhs: usize) -> Self::Output {
        RingReader {
            buf: self.buf,
            header: self.header,
            pos: self.pos + rhs,
        }
    }
}

impl<'a> Read for RingReader<'a> {
    fn read(&mut self, mut buf: &mut [u8]) -> Result<usize> {
        let idx0 = self.idx();
        let size1 = min(self.buf.len() - idx0, buf.len());
        buf[..size1].copy_from_slice(&self.buf[idx0..idx0 + size1]);

        self.pos += size1;
        if idx0 + size1 >= self.buf.len() {
            // wrapped past the end of the ring.
        } else {
            return Ok(size1);
        }

        buf = &mut buf[size1..];
        let size2 = min(idx0, buf.len());
        buf[0..size2].copy_from_slice(&self.buf[..size2]);

        self.pos += size2;

        Ok(size1 + size2)
    }
}

#[cfg(test)]
mod test {
    use byteorder::ReadBytesExt;
    use std::io::Read;

    use super::RingReader;

    #[test]
    fn test_ring_reader() {
        let storage = [1u8, 2, 3, 4, 5];
        let buf = &storage;
        let r0 = RingReader::new(buf);
        let mut r1 = r0.clone();

        assert_eq!(r1.read_u8().unwrap(), 1);
        assert_eq!(r1.read_u8().unwrap(), 2, "{r1:#?}");
        assert_eq!(r1.read_u8().unwrap(), 3);
        assert_eq!(r1.read_u8().unwrap(), 4);
        assert_eq!(r1.read_u8().unwrap(), 5);

        let mut d2 = [0u8; 2];
        r1.read_exact(&mut d2).unwrap();
        assert_eq!(&d2, &[1, 2]);
        r1.read_exact(&mut d2).unwrap();
        assert_eq!(&d2, &[3, 4]);
        r1.read_exact(&mut d2).unwrap();
        assert_eq!(&d2, &[5, 1]);

        let mut d4 = [0u8; 4];
        r1.read_exact(&mut d4).unwrap();
        assert_eq!(&d4, &[2, 3, 4, 5]);

        let mut d6 = [0u8; 6];
        #[allow(clippy::unused_io_amount)]
        r1.read(&mut d6).unwrap();
        assert_eq!(&d6, &[1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_from_end() {
        let storage = [1u8, 2, 3, 4, 5];
        let buf = &storage;
        let mut r0 = RingReader::buf_at(buf, 0, 5);

        assert_eq!(r0.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_add_offset() {
        let storage = [1u8, 2, 3, 4, 5];
        let buf = &storage;
        let r0 = RingReader::new(buf);

        assert_eq!((&r0 + 2).peek_1().unwrap(), 3);
        assert_eq!((r0 + 4).peek_1().unwrap(), 5);
    }

    #[test]
    fn test_crc32c_matches_contiguous_slice() {
        let storage = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let r0 = RingReader::new(&storage);

        assert_eq!(r0.crc32c(4), crc32c::crc32c(&storage[..4]));
    }
}
