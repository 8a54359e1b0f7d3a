//! Bitstream I/O utilities for ETI and FIG parsing.
//!
//! ETI header words and FIG payloads pack most fields at arbitrary bit
//! offsets, so parsing goes through a bounds-checked big-endian bit reader.
//! Whole-byte big-endian fields at fixed frame offsets are read with
//! [`read_u16_be`] and [`read_u32_be`].

use std::io;

use anyhow::{Result, ensure};
use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        if self.available()? == 0 {
            return Err(self.out_of_bounds("get", 1));
        }

        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        if n as u64 > self.available()? {
            return Err(self.out_of_bounds("get_n", n));
        }

        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let bits = (buf.len() as u64) << 3;
        if bits > self.available()? {
            return Err(self.out_of_bounds("get_bytes", bits as u32));
        }

        self.bs.read_bytes(buf)
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        if n as u64 > self.available()? {
            return Err(self.out_of_bounds("skip_n", n));
        }

        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    /// Whole bytes consumed so far.
    #[inline(always)]
    pub fn byte_position(&mut self) -> io::Result<usize> {
        self.position().map(|pos| (pos >> 3) as usize)
    }

    /// Whole bytes left before the end of the slice.
    #[inline(always)]
    pub fn remaining_bytes(&mut self) -> io::Result<usize> {
        self.available().map(|avail| (avail >> 3) as usize)
    }

    fn out_of_bounds(&mut self, op: &str, n: u32) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{op}({n}): out of bounds bits at {}",
                self.bs.position_in_bits().unwrap_or(0)
            ),
        )
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

/// Reads a big-endian `u16` at `offset`, failing instead of reading past `buf`.
pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16> {
    ensure!(
        offset.checked_add(2).is_some_and(|end| end <= buf.len()),
        "read_u16_be: offset {offset} out of bounds for {} bytes",
        buf.len()
    );

    Ok(u16::from_be_bytes([buf[offset], buf[offset + 1]]))
}

/// Reads a big-endian `u32` at `offset`, failing instead of reading past `buf`.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    ensure!(
        offset.checked_add(4).is_some_and(|end| end <= buf.len()),
        "read_u32_be: offset {offset} out of bounds for {} bytes",
        buf.len()
    );

    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_packed_fields() -> anyhow::Result<()> {
        // 0b101_00110, 0x12, 0x34
        let data = [0xA6u8, 0x12, 0x34];
        let mut reader = BsIoSliceReader::from_slice(&data);

        assert_eq!(reader.get_n::<u8>(3)?, 5);
        assert_eq!(reader.get_n::<u8>(5)?, 6);
        assert_eq!(reader.byte_position()?, 1);
        assert_eq!(reader.get_n::<u16>(16)?, 0x1234);
        assert_eq!(reader.remaining_bytes()?, 0);
        assert!(reader.get().is_err());
        Ok(())
    }

    #[test]
    fn out_of_bounds_reads_fail() {
        let data = [0xFFu8];
        let mut reader = BsIoSliceReader::from_slice(&data);
        let err = reader.get_n::<u16>(16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut buf = [0u8; 2];
        assert!(reader.get_bytes(&mut buf).is_err());
    }

    #[test]
    fn byte_helpers_are_bounds_checked() -> anyhow::Result<()> {
        let data = [0x07u8, 0x3A, 0xB6, 0x49];
        assert_eq!(read_u16_be(&data, 1)?, 0x3AB6);
        assert_eq!(read_u32_be(&data, 0)?, 0x073A_B649);
        assert!(read_u16_be(&data, 3).is_err());
        assert!(read_u32_be(&data, 1).is_err());
        assert!(read_u16_be(&data, usize::MAX).is_err());
        Ok(())
    }
}
