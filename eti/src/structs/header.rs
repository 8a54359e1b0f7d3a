//! Frame header of an ETI(NI) frame: FC, STC and EOH.
//!
//! ## Layout
//!
//! ```text
//! | 4..8 FC | 8..8+4*NST STC | EOH: MNSC(2) CRC(2) | MST ...
//! ```
//!
//! The header CRC covers FC, STC and MNSC.

use std::fmt::{Display, Formatter};

use anyhow::Result;
use log::{trace, warn};

use crate::utils::bitstream_io::{BsIoSliceReader, read_u16_be};
use crate::utils::crc::{Crc16, CrcCheck};
use crate::utils::errors::HeaderError;

/// Byte offset of the FC field.
pub const FC_OFFSET: usize = 4;

/// Byte offset of the first STC word.
pub const STC_OFFSET: usize = 8;

/// Highest stream count an ensemble may declare.
pub const MAX_STREAMS: u8 = 64;

/// Frame Characterization field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCharacterization {
    pub fct: u8,
    pub ficf: bool,
    pub nst: u8,
    pub fp: u8,
    pub mid: u8,
    pub fl: u16,
}

impl FrameCharacterization {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let fc = Self {
            fct: reader.get_n(8)?,
            ficf: reader.get()?,
            nst: reader.get_n(7)?,
            fp: reader.get_n(3)?,
            mid: reader.get_n(2)?,
            fl: reader.get_n(11)?,
        };

        trace!(
            "FC: FCT={} FICF={} NST={} FP={} MID={} FL={}",
            fc.fct, fc.ficf, fc.nst, fc.fp, fc.mid, fc.fl
        );

        Ok(fc)
    }

    /// Transmission mode, MID 0 standing for mode 4.
    pub fn mode(&self) -> u8 {
        if self.mid == 0 { 4 } else { self.mid }
    }

    /// FIC length in 32-bit words.
    pub fn fic_length_words(&self) -> usize {
        match (self.ficf, self.mid) {
            (false, _) => 0,
            (true, 3) => 32,
            (true, _) => 24,
        }
    }

    pub fn fic_length_bytes(&self) -> usize {
        self.fic_length_words() * 4
    }
}

const EEP_A_PROFILES: [&str; 4] = [
    "1-A, 1/4, 16 CUs",
    "2-A, 3/8, 8 CUs",
    "3-A, 1/2, 6 CUs",
    "4-A, 3/4, 4 CUs",
];

const EEP_B_PROFILES: [&str; 4] = [
    "1-B, 4/9, 27 CUs",
    "2-B, 4/7, 21 CUs",
    "3-B, 4/6, 18 CUs",
    "4-B, 4/5, 15 CUs",
];

/// Sub-channel protection decoded from TPL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Equal { option: u8, level: u8 },
    Unequal { table_switch: bool, index: u8 },
}

impl Protection {
    pub fn from_tpl(tpl: u8) -> Self {
        if tpl & 0x20 != 0 {
            Protection::Equal {
                option: (tpl >> 2) & 0x07,
                level: tpl & 0x03,
            }
        } else {
            Protection::Unequal {
                table_switch: tpl & 0x08 != 0,
                index: tpl & 0x07,
            }
        }
    }

    /// Code rate and capacity-unit label of an EEP profile.
    pub fn profile(&self) -> Option<&'static str> {
        match *self {
            Protection::Equal { option: 0, level } => Some(EEP_A_PROFILES[level as usize & 3]),
            Protection::Equal { option: 1, level } => Some(EEP_B_PROFILES[level as usize & 3]),
            _ => None,
        }
    }
}

impl Display for Protection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Protection::Equal { option, .. } => match self.profile() {
                Some(profile) => write!(f, "Equal Error Protection. {profile}"),
                None => write!(f, "Equal Error Protection. Unknown option {option}"),
            },
            Protection::Unequal {
                table_switch,
                index,
            } => write!(
                f,
                "Unequal Error Protection. Table switch {},  UEP index {index}",
                *table_switch as u8
            ),
        }
    }
}

/// One STC word describing a sub-channel carried in the MST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubchannelDescriptor {
    pub stream_index: usize,
    pub scid: u8,
    pub sad: u16,
    pub tpl: u8,
    pub protection: Protection,
    pub stl: u16,
}

impl SubchannelDescriptor {
    pub fn read(stream_index: usize, reader: &mut BsIoSliceReader) -> Result<Self> {
        let scid = reader.get_n(6)?;
        let sad = reader.get_n(10)?;
        let tpl = reader.get_n(6)?;
        let stl = reader.get_n(10)?;

        Ok(Self {
            stream_index,
            scid,
            sad,
            tpl,
            protection: Protection::from_tpl(tpl),
            stl,
        })
    }

    /// Approximate bitrate derived from STL, for display only.
    pub fn bitrate_kbps(&self) -> u32 {
        self.stl as u32 * 8 / 3
    }

    /// Stream length in bytes within one frame.
    pub fn length_bytes(&self) -> usize {
        self.stl as usize * 8
    }

    /// Effective sub-channel index handed to stream decoders.
    pub fn subchannel_index(&self) -> usize {
        self.stl as usize / 3
    }
}

/// End Of Header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfHeader {
    pub mnsc: u16,
    pub crc: CrcCheck,
}

/// FC, STC table and EOH of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub fc: FrameCharacterization,
    pub stc: Vec<SubchannelDescriptor>,
    pub eoh: EndOfHeader,
    pub errors: Vec<HeaderError>,
}

impl Header {
    pub fn read(crc: &Crc16, frame: &[u8]) -> Result<Self> {
        let mut errors = Vec::new();
        let mut reader = BsIoSliceReader::from_slice(&frame[FC_OFFSET.min(frame.len())..]);

        let fc = FrameCharacterization::read(&mut reader)?;
        if fc.nst > MAX_STREAMS {
            let error = HeaderError::TooManyStreams(fc.nst);
            warn!("{error}");
            errors.push(error);
        }

        let stc = (0..fc.nst as usize)
            .map(|i| SubchannelDescriptor::read(i, &mut reader))
            .collect::<Result<Vec<_>>>()?;

        let eoh_offset = Self::eoh_offset(fc.nst);
        let mnsc = read_u16_be(frame, eoh_offset)?;
        let read = read_u16_be(frame, eoh_offset + 2)?;
        let calculated = crc.checksum(&frame[FC_OFFSET..eoh_offset + 2]);

        let eoh = EndOfHeader {
            mnsc,
            crc: CrcCheck { calculated, read },
        };

        if !eoh.crc.is_ok() {
            let error = HeaderError::HeaderCrcMismatch { calculated, read };
            warn!("{error}");
            errors.push(error);
        }

        let computed = fc.nst as u32
            + 1
            + fc.fic_length_words() as u32
            + stc.iter().map(|s| 2 * s.stl as u32).sum::<u32>();
        if computed != fc.fl as u32 {
            let error = HeaderError::FrameLengthMismatch {
                declared: fc.fl,
                computed,
            };
            warn!("{error}");
            errors.push(error);
        }

        Ok(Self {
            fc,
            stc,
            eoh,
            errors,
        })
    }

    pub fn eoh_offset(nst: u8) -> usize {
        STC_OFFSET + 4 * nst as usize
    }

    /// Byte offset of the MST, right after EOH.
    pub fn mst_offset(&self) -> usize {
        Self::eoh_offset(self.fc.nst) + 4
    }
}
