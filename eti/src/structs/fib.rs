//! Fast Information Blocks.
//!
//! The FIC is a sequence of 32-byte FIBs: 30 bytes of FIGs packed end to
//! end, padded after an end marker, followed by a CRC over those 30 bytes.

use anyhow::{Result, ensure};
use log::{debug, warn};

use crate::process::carousel::{Carousel, FigOccurrence};
use crate::structs::fig::{self, FIG_END_MARKER, Fig};
use crate::utils::bitstream_io::read_u16_be;
use crate::utils::crc::{Crc16, CrcCheck};
use crate::utils::errors::FicError;

pub const FIB_SIZE: usize = 32;

/// Bytes of a FIB available to FIGs.
pub const FIB_DATA_SIZE: usize = 30;

/// The FIG scan stops once this many bytes are consumed.
pub const FIB_SCAN_LIMIT: usize = 29;

/// One FIG as found in a FIB.
#[derive(Debug)]
pub struct FigRecord {
    pub fig_type: u8,
    pub length: usize,
    /// Offset of the FIG header byte within the FIB.
    pub offset: usize,
    pub payload: Vec<u8>,
    pub decoded: Result<Fig>,
}

impl FigRecord {
    /// Carousel entry of this FIG. Only the types carrying an extension
    /// field with a non-empty payload are tracked.
    pub fn occurrence(&self) -> Option<FigOccurrence> {
        if !matches!(self.fig_type, 0 | 1 | 2 | 5) {
            return None;
        }

        let first = *self.payload.first()?;
        fig::extension_of(self.fig_type, first).map(|extension| FigOccurrence {
            fig_type: self.fig_type,
            extension,
            length: self.length,
        })
    }
}

#[derive(Debug)]
pub struct Fib {
    pub index: usize,
    pub figs: Vec<FigRecord>,
    /// FIG header and payload bytes scanned, end marker excluded.
    pub consumed: usize,
    pub end_marker: bool,
    pub overrun: Option<FicError>,
    pub crc: CrcCheck,
}

impl Fib {
    /// Scans the FIGs of one FIB, recording them in `carousel` when given.
    pub fn read(
        index: usize,
        bytes: &[u8],
        crc: &Crc16,
        mut carousel: Option<&mut Carousel>,
    ) -> Result<Self> {
        ensure!(
            bytes.len() == FIB_SIZE,
            "FIB {index}: expected {FIB_SIZE} bytes, got {}",
            bytes.len()
        );

        let mut figs = Vec::new();
        let mut consumed = 0;
        let mut end_marker = false;
        let mut overrun = None;

        while consumed < FIB_SCAN_LIMIT {
            let offset = consumed;
            let fig_type = bytes[offset] >> 5;
            if fig_type == FIG_END_MARKER {
                end_marker = true;
                break;
            }

            let length = (bytes[offset] & 0x1F) as usize;
            let start = offset + 1;
            let end = start + length;
            if end > FIB_DATA_SIZE {
                let error = FicError::FigOverrun {
                    fib: index,
                    offset,
                    length,
                };
                warn!("{error}");
                overrun = Some(error);
                break;
            }

            let payload = bytes[start..end].to_vec();
            let decoded = fig::decode(fig_type, &payload);
            if let Err(e) = &decoded {
                warn!("FIB {index}: FIG {fig_type} at offset {offset}: {e}");
            }

            let record = FigRecord {
                fig_type,
                length,
                offset,
                payload,
                decoded,
            };
            if let (Some(carousel), Some(occurrence)) =
                (carousel.as_deref_mut(), record.occurrence())
            {
                carousel.record(index, occurrence);
            }
            figs.push(record);

            consumed = end;
        }

        let read = read_u16_be(bytes, FIB_DATA_SIZE)?;
        let calculated = crc.checksum(&bytes[..FIB_DATA_SIZE]);
        let crc = CrcCheck { calculated, read };
        if !crc.is_ok() {
            warn!(
                "{}",
                FicError::FibCrcMismatch {
                    fib: index,
                    calculated,
                    read
                }
            );
        }

        debug!(
            "FIB {index}: {} FIGs, {consumed} bytes, end marker {end_marker}",
            figs.len()
        );

        Ok(Self {
            index,
            figs,
            consumed,
            end_marker,
            overrun,
            crc,
        })
    }
}

/// The FIBs of one frame.
#[derive(Debug)]
pub struct Fic {
    pub fibs: Vec<Fib>,
}

impl Fic {
    pub fn read(bytes: &[u8], crc: &Crc16, mut carousel: Option<&mut Carousel>) -> Result<Self> {
        let fibs = bytes
            .chunks_exact(FIB_SIZE)
            .enumerate()
            .map(|(i, fib)| Fib::read(i, fib, crc, carousel.as_deref_mut()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { fibs })
    }

    /// Carousel of this frame alone.
    pub fn carousel(&self) -> Carousel {
        let mut carousel = Carousel::default();
        for fib in &self.fibs {
            for occurrence in fib.figs.iter().filter_map(FigRecord::occurrence) {
                carousel.record(fib.index, occurrence);
            }
        }
        carousel
    }

    pub fn figs(&self) -> impl Iterator<Item = &FigRecord> {
        self.fibs.iter().flat_map(|fib| fib.figs.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_frames::fib_bytes;

    fn read(bytes: &[u8]) -> Fib {
        Fib::read(0, bytes, &Crc16::default(), None).unwrap()
    }

    #[test]
    fn records_stop_at_end_marker() {
        let figs: [&[u8]; 3] = [
            &[0x05, 0x00, 0x40, 0x01, 0x00, 0x00],
            &[0x02, 0x8A, 0x00],
            &[0xA1, 0x00],
        ];
        let fib = read(&fib_bytes(&figs));

        assert_eq!(fib.figs.len(), 3);
        assert!(fib.end_marker);
        assert_eq!(fib.consumed, figs.iter().map(|f| f.len()).sum::<usize>());
        assert!(fib.crc.is_ok());
        assert!(fib.overrun.is_none());
    }

    #[test]
    fn scan_ends_at_limit_without_marker() {
        // 29 bytes of FIG 0/10 and no end marker; the next byte would
        // otherwise be read as a FIG header
        let mut fig = vec![0x1C, 0x0A];
        fig.resize(29, 0x00);
        let mut bytes = fib_bytes(&[fig.as_slice()]);
        bytes[29] = 0x05;
        let crc = Crc16::default().checksum(&bytes[..FIB_DATA_SIZE]);
        bytes[30..].copy_from_slice(&crc.to_be_bytes());

        let fib = read(&bytes);
        assert_eq!(fib.figs.len(), 1);
        assert_eq!(fib.consumed, FIB_SCAN_LIMIT);
        assert!(!fib.end_marker);
        assert!(fib.overrun.is_none());
    }

    #[test]
    fn fig_crossing_data_field_is_an_overrun() {
        let mut bytes = fib_bytes(&[&[0x02, 0x8A, 0x00]]);
        // a 31-byte FIG at offset 3
        bytes[3] = 0x1F;

        let fib = read(&bytes);
        assert_eq!(fib.figs.len(), 1);
        assert_eq!(
            fib.overrun,
            Some(FicError::FigOverrun {
                fib: 0,
                offset: 3,
                length: 31
            })
        );
        assert!(!fib.crc.is_ok());
    }

    #[test]
    fn unsupported_figs_are_kept_but_not_carouselled() {
        let mut carousel = Carousel::default();
        let bytes = fib_bytes(&[&[0xC1, 0x00], &[0x01, 0x00]]);
        let fib = Fib::read(1, &bytes, &Crc16::default(), Some(&mut carousel)).unwrap();

        assert_eq!(fib.figs.len(), 2);
        assert!(fib.figs[0].decoded.is_err());
        assert_eq!(
            carousel.fibs()[1],
            [FigOccurrence {
                fig_type: 0,
                extension: 0,
                length: 1
            }]
        );
    }

    #[test]
    fn fic_of_mode_three_has_four_fibs() {
        let fib = fib_bytes(&[&[0x02, 0x8A, 0x00]]);
        let fic_bytes = fib.repeat(4);
        let mut carousel = Carousel::default();
        let fic = Fic::read(&fic_bytes, &Crc16::default(), Some(&mut carousel)).unwrap();

        assert_eq!(fic.fibs.len(), 4);
        assert_eq!(fic.figs().count(), 4);
        assert_eq!(carousel.fibs().len(), 4);
        assert_eq!(fic.carousel(), carousel);
    }
}
