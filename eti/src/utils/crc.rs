//! CRC validation utilities for ETI frames.
//!
//! ETI(NI) protects three nested byte windows with the same CRC-16/CCITT
//! algorithm: the frame header (FC, STC and MNSC), every FIB of the FIC and
//! the whole main stream data (FIC plus MSC). Each window is seeded with
//! `0xFFFF` and the result is complemented before comparison.

use std::fmt::{Display, Formatter};

/// CRC parameters: polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16/CCITT as used by ETI(NI) and the FIC.
pub const CRC_CCITT_ALG: Algorithm<u16> = Algorithm {
    poly: 0x1021,
    init: 0xFFFF,
};

/// Shifts `len` bits through a CRC-16 register, MSB first.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, (i as u16) << 8, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8);
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn finalize(crc: u16) -> u16 {
        !crc
    }

    /// Seeds, accumulates and finalizes over one checksum window.
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        Self::finalize(self.update(self.init, bytes))
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new(&CRC_CCITT_ALG)
    }
}

/// Outcome of comparing a computed CRC with the value embedded in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcCheck {
    pub calculated: u16,
    pub read: u16,
}

impl CrcCheck {
    pub fn is_ok(&self) -> bool {
        self.calculated == self.read
    }
}

impl Display for CrcCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_ok() {
            f.write_str("CRC OK")
        } else {
            write!(f, "CRC Mismatch: {:04x}", self.calculated)
        }
    }
}
