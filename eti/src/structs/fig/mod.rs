//! Fast Information Groups.
//!
//! A FIG is a self-describing record inside a FIB: a one-byte header with a
//! 3-bit type and a 5-bit length, followed by `length` payload bytes. The
//! first payload byte carries the extension and type-specific flags, so
//! decoding dispatches on the type and then on the extension.
//!
//! | Type | Content                                    |
//! |------|--------------------------------------------|
//! | 0    | MCI and SI ([`fig0`])                      |
//! | 1    | Short labels ([`fig1`])                    |
//! | 2    | Long label segments                        |
//! | 5    | FIDC                                       |
//! | 6    | Conditional access (unsupported)           |
//! | 7    | End marker, never decoded                  |

use std::fmt::{Display, Formatter};
use std::io;

use anyhow::{Result, anyhow, bail};

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::FigError;

pub mod fig0;
pub mod fig1;

pub use fig0::{Fig0, Fig0Body};
pub use fig1::{Fig1, Fig1Body};

/// FIG type marking the start of the FIB padding.
pub const FIG_END_MARKER: u8 = 7;

/// A decoded FIG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fig {
    Type0(Fig0),
    Type1(Fig1),
    Type2(LongLabelSegment),
    Type5(FidcHeader),
}

impl Fig {
    pub fn fig_type(&self) -> u8 {
        match self {
            Fig::Type0(_) => 0,
            Fig::Type1(_) => 1,
            Fig::Type2(_) => 2,
            Fig::Type5(_) => 5,
        }
    }

    pub fn extension(&self) -> u8 {
        match self {
            Fig::Type0(fig) => fig.extension,
            Fig::Type1(fig) => fig.extension,
            Fig::Type2(fig) => fig.extension,
            Fig::Type5(fig) => fig.extension,
        }
    }
}

impl Display for Fig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Fig::Type0(fig) => write!(
                f,
                "FIG 0/{}: C/N={} OE={} P/D={}",
                fig.extension, fig.cn as u8, fig.oe as u8, fig.pd as u8
            ),
            Fig::Type1(fig) => write!(
                f,
                "FIG 1/{}: OE={}, Charset={}",
                fig.extension, fig.oe as u8, fig.charset
            ),
            Fig::Type2(fig) => write!(
                f,
                "FIG 2/{}: Toggle={}, OE={}, Segment_index={}",
                fig.extension, fig.toggle as u8, fig.oe as u8, fig.segment_index
            ),
            Fig::Type5(fig) => write!(
                f,
                "FIG 5/{}: D1={}, D2={}, TCId={}",
                fig.extension, fig.d1 as u8, fig.d2 as u8, fig.tcid
            ),
        }
    }
}

/// Decodes one FIG payload, the FIG header byte excluded.
pub fn decode(fig_type: u8, payload: &[u8]) -> Result<Fig> {
    if matches!(fig_type, 0 | 1 | 2 | 5) && payload.is_empty() {
        bail!(FigError::EmptyPayload { fig_type });
    }

    let reader = &mut BsIoSliceReader::from_slice(payload);

    let fig = match fig_type {
        0 => Fig::Type0(Fig0::read(reader)?),
        1 => Fig::Type1(Fig1::read(reader)?),
        2 => Fig::Type2(LongLabelSegment::read(reader)?),
        5 => Fig::Type5(FidcHeader::read(reader)?),
        6 => bail!(FigError::ConditionalAccess),
        other => bail!(FigError::UnsupportedType(other)),
    };

    Ok(fig)
}

/// Extension of a FIG as tracked by the carousel, read from the first
/// payload byte. Types without an extension field yield `None`.
pub fn extension_of(fig_type: u8, first_byte: u8) -> Option<u8> {
    match fig_type {
        0 => Some(first_byte & 0x1F),
        1 | 2 | 5 => Some(first_byte & 0x07),
        _ => None,
    }
}

pub(crate) fn truncated(fig_type: u8, extension: u8) -> impl FnOnce(io::Error) -> anyhow::Error {
    move |e| {
        anyhow!(FigError::Truncated {
            fig_type,
            extension,
            reason: e.to_string(),
        })
    }
}

/// FIG type 2 segment header. Segment reassembly is not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongLabelSegment {
    pub toggle: bool,
    pub segment_index: u8,
    pub oe: bool,
    pub extension: u8,
    pub data_len: usize,
}

impl LongLabelSegment {
    fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let segment = Self {
            toggle: reader.get()?,
            segment_index: reader.get_n(3)?,
            oe: reader.get()?,
            extension: reader.get_n(3)?,
            data_len: reader.remaining_bytes()?,
        };

        Ok(segment)
    }
}

/// FIG type 5 (FIDC) header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FidcHeader {
    pub d1: bool,
    pub d2: bool,
    pub tcid: u8,
    pub extension: u8,
}

impl FidcHeader {
    fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        Ok(Self {
            d1: reader.get()?,
            d2: reader.get()?,
            tcid: reader.get_n(3)?,
            extension: reader.get_n(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_access_is_unsupported() {
        let err = decode(6, &[0x00, 0x01]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FigError>(),
            Some(&FigError::ConditionalAccess)
        );
    }

    #[test]
    fn reserved_types_are_unsupported() {
        for fig_type in [3, 4] {
            let err = decode(fig_type, &[0x00]).unwrap_err();
            assert_eq!(
                err.downcast_ref::<FigError>(),
                Some(&FigError::UnsupportedType(fig_type))
            );
        }
    }

    #[test]
    fn empty_payload_is_an_error() {
        let err = decode(0, &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FigError>(),
            Some(&FigError::EmptyPayload { fig_type: 0 })
        );
    }

    #[test]
    fn long_label_segment_header() -> anyhow::Result<()> {
        // toggle=1, segment=5, OE=0, ext=3
        let fig = decode(2, &[0b1_101_0_011, b'A', b'B'])?;
        let Fig::Type2(segment) = &fig else {
            panic!("expected FIG 2, got {fig:?}");
        };
        assert!(segment.toggle);
        assert_eq!(segment.segment_index, 5);
        assert_eq!(segment.extension, 3);
        assert_eq!(segment.data_len, 2);
        assert_eq!(fig.to_string(), "FIG 2/3: Toggle=1, OE=0, Segment_index=5");
        Ok(())
    }

    #[test]
    fn fidc_header() -> anyhow::Result<()> {
        // D1=1, D2=0, TCId=6, ext=1
        let fig = decode(5, &[0b1_0_110_001])?;
        assert_eq!(
            fig,
            Fig::Type5(FidcHeader {
                d1: true,
                d2: false,
                tcid: 6,
                extension: 1
            })
        );
        Ok(())
    }

    #[test]
    fn carousel_extension() {
        assert_eq!(extension_of(0, 0xAD), Some(13));
        assert_eq!(extension_of(1, 0x04), Some(4));
        assert_eq!(extension_of(5, 0xFF), Some(7));
        assert_eq!(extension_of(6, 0x00), None);
    }
}
