//! FIG type 1: short labels.
//!
//! Every extension ends with a 16-byte label and a 16-bit character flag
//! field selecting the short label. The identifier in front of the label
//! depends on the extension.

use std::fmt::{Display, Formatter};
use std::io;

use anyhow::Result;

use super::truncated;
use crate::utils::bitstream_io::BsIoSliceReader;

pub const LABEL_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub bytes: [u8; LABEL_LENGTH],
    pub short_mask: u16,
}

impl Label {
    /// Reads the label from the tail of the FIG, skipping anything between
    /// the identifier and the label.
    fn read(reader: &mut BsIoSliceReader) -> io::Result<Self> {
        let trailing = LABEL_LENGTH + 2;
        let extra = reader.remaining_bytes()?.checked_sub(trailing).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("label needs {trailing} bytes"),
            )
        })?;
        reader.skip_n(extra as u32 * 8)?;

        let mut bytes = [0u8; LABEL_LENGTH];
        reader.get_bytes(&mut bytes)?;

        Ok(Self {
            bytes,
            short_mask: reader.get_n(16)?,
        })
    }

    /// Label text, one character per byte.
    pub fn text(&self) -> String {
        self.bytes.iter().map(|&b| b as char).collect()
    }

    /// Characters selected by the flag field, in order.
    pub fn short_text(&self) -> String {
        self.bytes
            .iter()
            .enumerate()
            .filter(|(i, _)| self.short_mask & (0x8000 >> i) != 0)
            .map(|(_, &b)| b as char)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fig1 {
    pub charset: u8,
    pub oe: bool,
    pub extension: u8,
    pub body: Fig1Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fig1Body {
    Ensemble {
        eid: u16,
        label: Label,
    },
    Programme {
        sid: u16,
        label: Label,
    },
    ServiceComponent {
        pd: bool,
        scids: u8,
        sid: u32,
        label: Label,
    },
    DataService {
        sid: u32,
        label: Label,
    },
    XpadApplication {
        pd: bool,
        scids: u8,
        sid: u32,
        xpad_app: u8,
        label: Label,
    },
    Undecoded,
}

impl Fig1 {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let charset = reader.get_n(4)?;
        let oe = reader.get()?;
        let extension: u8 = reader.get_n(3)?;

        let body = Self::read_body(extension, reader).map_err(truncated(1, extension))?;

        Ok(Self {
            charset,
            oe,
            extension,
            body,
        })
    }

    fn read_body(extension: u8, reader: &mut BsIoSliceReader) -> io::Result<Fig1Body> {
        let body = match extension {
            0 => Fig1Body::Ensemble {
                eid: reader.get_n(16)?,
                label: Label::read(reader)?,
            },
            1 => Fig1Body::Programme {
                sid: reader.get_n(16)?,
                label: Label::read(reader)?,
            },
            4 => {
                let (pd, scids, sid) = read_component_id(reader)?;
                Fig1Body::ServiceComponent {
                    pd,
                    scids,
                    sid,
                    label: Label::read(reader)?,
                }
            }
            5 => Fig1Body::DataService {
                sid: reader.get_n(32)?,
                label: Label::read(reader)?,
            },
            6 => {
                let (pd, scids, sid) = read_component_id(reader)?;
                reader.skip_n(3)?;
                let xpad_app = reader.get_n(5)?;
                Fig1Body::XpadApplication {
                    pd,
                    scids,
                    sid,
                    xpad_app,
                    label: Label::read(reader)?,
                }
            }
            _ => Fig1Body::Undecoded,
        };

        Ok(body)
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.body {
            Fig1Body::Ensemble { label, .. }
            | Fig1Body::Programme { label, .. }
            | Fig1Body::ServiceComponent { label, .. }
            | Fig1Body::DataService { label, .. }
            | Fig1Body::XpadApplication { label, .. } => Some(label),
            Fig1Body::Undecoded => None,
        }
    }
}

/// `P/D(1) Rfa(3) SCIdS(4)` followed by a 16- or 32-bit SId.
fn read_component_id(reader: &mut BsIoSliceReader) -> io::Result<(bool, u8, u32)> {
    let pd = reader.get()?;
    reader.skip_n(3)?;
    let scids = reader.get_n(4)?;
    let sid = if pd {
        reader.get_n(32)?
    } else {
        reader.get_n(16)?
    };

    Ok((pd, scids, sid))
}

pub fn xpad_application_name(xpad_app: u8) -> &'static str {
    match xpad_app {
        2 => "DLS",
        12 => "MOT",
        _ => "?",
    }
}

impl Display for Fig1Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Fig1Body::Ensemble { eid, label } => write!(
                f,
                "Ensemble ID 0x{eid:04X} label: \"{}\", Short label mask: 0x{:04X}",
                label.text(),
                label.short_mask
            ),
            Fig1Body::Programme { sid, label } => write!(
                f,
                "Service ID 0x{sid:04X} label: \"{}\", Short label mask: 0x{:04X}",
                label.text(),
                label.short_mask
            ),
            Fig1Body::ServiceComponent {
                scids, sid, label, ..
            } => write!(
                f,
                "Service ID 0x{sid:08X}, Service Component ID 0x{scids:04X}, label: \"{}\", Short label mask: 0x{:04X}",
                label.text(),
                label.short_mask
            ),
            Fig1Body::DataService { sid, label } => write!(
                f,
                "Service ID 0x{sid:08X} label: \"{}\", Short label mask: 0x{:04X}",
                label.text(),
                label.short_mask
            ),
            Fig1Body::XpadApplication {
                scids,
                sid,
                xpad_app,
                label,
                ..
            } => write!(
                f,
                "Service ID 0x{sid:08X}, Service Component ID 0x{scids:04X}, X-PAD App {xpad_app:02X} ({}), label: \"{}\", Short label mask: 0x{:04X}",
                xpad_application_name(*xpad_app),
                label.text(),
                label.short_mask
            ),
            Fig1Body::Undecoded => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::fig::{Fig, decode};
    use crate::utils::errors::FigError;

    fn with_label(head: &[u8], text: &[u8; 16], mask: u16) -> Vec<u8> {
        let mut payload = head.to_vec();
        payload.extend_from_slice(text);
        payload.extend_from_slice(&mask.to_be_bytes());
        payload
    }

    fn fig1(payload: &[u8]) -> Fig1 {
        match decode(1, payload) {
            Ok(Fig::Type1(fig)) => fig,
            other => panic!("expected FIG 1, got {other:?}"),
        }
    }

    #[test]
    fn ensemble_label() {
        let payload = with_label(&[0x00, 0x4F, 0xFF], b"Test Ensemble   ", 0xF000);
        let fig = fig1(&payload);

        assert_eq!(fig.charset, 0);
        assert_eq!(fig.extension, 0);
        let label = fig.label().copied().unwrap();
        assert_eq!(label.text(), "Test Ensemble   ");
        assert_eq!(label.short_text(), "Test");
        assert_eq!(
            fig.body.to_string(),
            "Ensemble ID 0x4FFF label: \"Test Ensemble   \", Short label mask: 0xF000"
        );
    }

    #[test]
    fn programme_label() {
        let payload = with_label(&[0x01, 0x4D, 0xA2], b"Radio One       ", 0xFF00);
        let fig = fig1(&payload);
        assert!(matches!(fig.body, Fig1Body::Programme { sid: 0x4DA2, .. }));
    }

    #[test]
    fn service_component_label_with_long_sid() {
        // P/D=1, SCIdS=3
        let payload = with_label(
            &[0x04, 0x83, 0xE1, 0x2C, 0x00, 0x01],
            b"Component       ",
            0x0000,
        );
        let fig = fig1(&payload);
        assert!(matches!(
            fig.body,
            Fig1Body::ServiceComponent {
                pd: true,
                scids: 3,
                sid: 0xE12C_0001,
                ..
            }
        ));
    }

    #[test]
    fn xpad_application_label() {
        // P/D=0, SCIdS=1, SId 0x4DA2, X-PAD app 12
        let payload = with_label(&[0x06, 0x01, 0x4D, 0xA2, 0x0C], b"Slides          ", 0x0000);
        let fig = fig1(&payload);
        let Fig1Body::XpadApplication { xpad_app, .. } = fig.body else {
            panic!("wrong body {:?}", fig.body);
        };
        assert_eq!(xpad_app, 12);
        assert_eq!(xpad_application_name(xpad_app), "MOT");
        assert_eq!(xpad_application_name(2), "DLS");
        assert_eq!(xpad_application_name(7), "?");
    }

    #[test]
    fn short_label_is_truncated() {
        let err = decode(1, &[0x01, 0x4D, 0xA2, b'X']).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FigError>(),
            Some(FigError::Truncated {
                fig_type: 1,
                extension: 1,
                ..
            })
        ));
    }
}
