//! FIG type 0: Multiplex Configuration Information and Service Information.
//!
//! The first payload byte is `C/N(1) OE(1) P/D(1) Extension(5)`. Decoded
//! extensions:
//!
//! - **0/0** ensemble information (EId, change flags, CIF count)
//! - **0/1** sub-channel organisation
//! - **0/2** basic service and service component definition
//! - **0/13** user application information
//!
//! Every other extension is recognised by its header only.

use std::fmt::{Display, Formatter};
use std::io;

use anyhow::Result;
use log::trace;

use super::truncated;
use crate::utils::bitstream_io::BsIoSliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fig0 {
    pub cn: bool,
    pub oe: bool,
    pub pd: bool,
    pub extension: u8,
    pub body: Fig0Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fig0Body {
    EnsembleInformation(EnsembleInformation),
    SubchannelOrganisation(Vec<SubchannelOrganisation>),
    ServiceOrganisation(ServiceOrganisation),
    UserApplications(UserApplicationInformation),
    Undecoded,
}

impl Fig0 {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let cn = reader.get()?;
        let oe = reader.get()?;
        let pd = reader.get()?;
        let extension: u8 = reader.get_n(5)?;

        let body = match extension {
            0 => Fig0Body::EnsembleInformation(
                EnsembleInformation::read(reader).map_err(truncated(0, extension))?,
            ),
            1 => Fig0Body::SubchannelOrganisation(
                SubchannelOrganisation::read_all(reader).map_err(truncated(0, extension))?,
            ),
            2 => Fig0Body::ServiceOrganisation(
                ServiceOrganisation::read(pd, reader).map_err(truncated(0, extension))?,
            ),
            13 => Fig0Body::UserApplications(
                UserApplicationInformation::read(pd, reader).map_err(truncated(0, extension))?,
            ),
            _ => Fig0Body::Undecoded,
        };

        Ok(Self {
            cn,
            oe,
            pd,
            extension,
            body,
        })
    }
}

/// FIG 0/0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleInformation {
    pub eid: u16,
    pub change_flags: u8,
    pub alarm: bool,
    pub cif_count_high: u8,
    pub cif_count_low: u8,
    pub occurrence_change: Option<u8>,
}

impl EnsembleInformation {
    fn read(reader: &mut BsIoSliceReader) -> io::Result<Self> {
        let eid = reader.get_n(16)?;
        let change_flags: u8 = reader.get_n(2)?;
        let alarm = reader.get()?;
        let cif_count_high = reader.get_n(5)?;
        let cif_count_low = reader.get_n(8)?;
        let occurrence_change = if change_flags != 0 {
            Some(reader.get_n(8)?)
        } else {
            None
        };

        Ok(Self {
            eid,
            change_flags,
            alarm,
            cif_count_high,
            cif_count_low,
            occurrence_change,
        })
    }

    pub fn country_id(&self) -> u8 {
        (self.eid >> 12) as u8
    }

    pub fn ensemble_reference(&self) -> u16 {
        self.eid & 0x0FFF
    }
}

impl Display for EnsembleInformation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ensemble ID=0x{:04X} (Country id={}, Ensemble reference={}), Change flag={}, Alarm flag={}, CIF Count={}/{}",
            self.eid,
            self.country_id(),
            self.ensemble_reference(),
            self.change_flags,
            self.alarm as u8,
            self.cif_count_high,
            self.cif_count_low
        )?;

        if let Some(occurrence) = self.occurrence_change {
            write!(f, ", Occurrence change={occurrence}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubchannelForm {
    Short { table_switch: bool, table_index: u8 },
    Long { option: u8, protection_level: u8, size: u16 },
}

/// One FIG 0/1 entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubchannelOrganisation {
    pub subchid: u8,
    pub start_address: u16,
    pub form: SubchannelForm,
}

impl SubchannelOrganisation {
    /// Reads entries while more than three bytes of the FIG remain.
    ///
    /// The bound counts the FIG 0 header byte, so a trailing short-form
    /// entry that ends exactly on the last byte is left undecoded.
    fn read_all(reader: &mut BsIoSliceReader) -> io::Result<Vec<Self>> {
        let mut entries = Vec::new();

        loop {
            let pos = reader.byte_position()?;
            let len = pos + reader.remaining_bytes()?;
            if pos + 3 >= len {
                break;
            }

            let subchid = reader.get_n(6)?;
            let start_address = reader.get_n(10)?;
            let form = if reader.get()? {
                SubchannelForm::Long {
                    option: reader.get_n(3)?,
                    protection_level: reader.get_n(2)?,
                    size: reader.get_n(10)?,
                }
            } else {
                SubchannelForm::Short {
                    table_switch: reader.get()?,
                    table_index: reader.get_n(6)?,
                }
            };

            entries.push(Self {
                subchid,
                start_address,
                form,
            });
        }

        Ok(entries)
    }
}

impl Display for SubchannelOrganisation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Subch 0x{:x}, start_addr {}, ",
            self.subchid, self.start_address
        )?;

        match self.form {
            SubchannelForm::Long {
                option,
                protection_level,
                size,
            } => match option {
                0 | 1 => write!(
                    f,
                    "long, EEP {}-{}, subch size {size}",
                    protection_level + 1,
                    if option == 0 { 'A' } else { 'B' }
                ),
                _ => write!(
                    f,
                    "long, invalid option {option}, protection {protection_level}, subch size {size}"
                ),
            },
            SubchannelForm::Short {
                table_switch: false,
                table_index,
            } => write!(f, "short, table index {table_index}"),
            SubchannelForm::Short {
                table_switch: true,
                table_index,
            } => write!(f, "short, invalid table_switch(=1), table index {table_index}"),
        }
    }
}

/// Transport of a service component, from TMId.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    StreamAudio { ascty: u8, subchid: u8 },
    StreamData { dscty: u8, subchid: u8 },
    Fidc { dscty: u8, fidcid: u8 },
    PacketData { scid: u16 },
}

/// One service component of FIG 0/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceComponent {
    pub kind: ComponentKind,
    pub primary: bool,
    pub ca: bool,
}

impl ServiceComponent {
    fn read(reader: &mut BsIoSliceReader) -> io::Result<Self> {
        let tmid: u8 = reader.get_n(2)?;
        let ty: u8 = reader.get_n(6)?;
        let id: u8 = reader.get_n(6)?;
        let primary = reader.get()?;
        let ca = reader.get()?;

        let kind = match tmid {
            0 => ComponentKind::StreamAudio {
                ascty: ty,
                subchid: id,
            },
            1 => ComponentKind::StreamData {
                dscty: ty,
                subchid: id,
            },
            2 => ComponentKind::Fidc {
                dscty: ty,
                fidcid: id,
            },
            _ => ComponentKind::PacketData {
                scid: (ty as u16) << 6 | id as u16,
            },
        };

        Ok(Self { kind, primary, ca })
    }
}

fn audio_type_name(ascty: u8) -> &'static str {
    match ascty {
        0 => "MPEG Foreground sound",
        1 => "MPEG Background sound",
        2 => "Multi Channel sound",
        63 => "AAC sound",
        _ => "Unknown ASCTy",
    }
}

impl Display for ServiceComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ps = if self.primary {
            "Primary service"
        } else {
            "Secondary service"
        };

        match self.kind {
            ComponentKind::StreamAudio { ascty, subchid } => write!(
                f,
                "Stream audio mode, {ps}, {} ({ascty}), SubChannel ID={subchid:02X}",
                audio_type_name(ascty)
            )?,
            ComponentKind::StreamData { dscty, subchid } => write!(
                f,
                "Stream data mode, {ps}, DSCTy={dscty}, SubChannel ID={subchid:02X}"
            )?,
            ComponentKind::Fidc { dscty, fidcid } => {
                write!(f, "FIDC, {ps}, DSCTy={dscty}, Fast Information Data Channel ID={fidcid:02X}")?
            }
            ComponentKind::PacketData { scid } => write!(
                f,
                "MSC Packet Mode, {ps}, Service Component ID={scid:03X}"
            )?,
        }

        write!(f, ", CA={}", self.ca as u8)
    }
}

/// One service of FIG 0/2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub sid: u32,
    pub ecc: Option<u8>,
    pub local: bool,
    pub caid: u8,
    pub declared_components: u8,
    pub components: Vec<ServiceComponent>,
}

impl Service {
    /// Reads one service. The flag is set when the component list ran past
    /// the FIG; the components read until then are kept.
    fn read(pd: bool, reader: &mut BsIoSliceReader) -> io::Result<(Self, bool)> {
        let (sid, ecc) = if pd {
            let sid: u32 = reader.get_n(32)?;
            (sid, Some((sid >> 24) as u8))
        } else {
            (reader.get_n(16)?, None)
        };

        let local = reader.get()?;
        let caid = reader.get_n(3)?;
        let declared_components: u8 = reader.get_n(4)?;

        let mut components = Vec::with_capacity(declared_components as usize);
        let mut truncated = false;
        for _ in 0..declared_components {
            match ServiceComponent::read(reader) {
                Ok(component) => components.push(component),
                Err(_) => {
                    truncated = true;
                    break;
                }
            }
        }

        let service = Self {
            sid,
            ecc,
            local,
            caid,
            declared_components,
            components,
        };

        Ok((service, truncated))
    }

    pub fn country_id(&self) -> u8 {
        match self.ecc {
            Some(_) => ((self.sid >> 20) & 0x0F) as u8,
            None => ((self.sid >> 12) & 0x0F) as u8,
        }
    }

    pub fn service_reference(&self) -> u32 {
        match self.ecc {
            Some(_) => self.sid & 0x000F_FFFF,
            None => self.sid & 0x0FFF,
        }
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.ecc {
            Some(ecc) => write!(
                f,
                "Service ID=0x{:08X} (ECC={ecc}, Country id={}, Service reference={})",
                self.sid,
                self.country_id(),
                self.service_reference()
            )?,
            None => write!(
                f,
                "Service ID=0x{:04X} (Country id={}, Service reference={})",
                self.sid,
                self.country_id(),
                self.service_reference()
            )?,
        }

        write!(
            f,
            ", Number of components={}, Local flag={}, CAID={}",
            self.declared_components, self.local as u8, self.caid
        )
    }
}

/// FIG 0/2 body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOrganisation {
    pub services: Vec<Service>,
    pub truncated: bool,
}

impl ServiceOrganisation {
    fn read(pd: bool, reader: &mut BsIoSliceReader) -> io::Result<Self> {
        let mut body = Self::default();

        while reader.remaining_bytes()? > 0 {
            match Service::read(pd, reader) {
                Ok((service, truncated)) => {
                    body.services.push(service);
                    if truncated {
                        body.truncated = true;
                        break;
                    }
                }
                Err(e) => {
                    trace!("FIG 0/2 service header cut short: {e}");
                    body.truncated = true;
                    break;
                }
            }
        }

        Ok(body)
    }
}

/// User application entry of FIG 0/13. Application data is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserApplication {
    pub app_type: u16,
    pub data_length: u8,
}

impl UserApplication {
    pub fn name(&self) -> &'static str {
        user_application_name(self.app_type)
    }
}

impl Display for UserApplication {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User Application {} '{}'; length {}",
            self.app_type,
            self.name(),
            self.data_length
        )
    }
}

pub fn user_application_name(app_type: u16) -> &'static str {
    match app_type {
        0x000 => "Reserved for future definition",
        0x001 => "Not used",
        0x002 => "MOT Slideshow",
        0x003 => "MOT Broadacst Web Site",
        0x004 => "TPEG",
        0x005 => "DGPS",
        0x006 => "TMC",
        0x007 => "EPG",
        0x008 => "DAB Java",
        0x44A => "Journaline",
        _ => "Reserved for future applications",
    }
}

/// Service entry of FIG 0/13.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserApplicationService {
    pub sid: u32,
    pub scids: u8,
    pub declared_applications: u8,
    pub applications: Vec<UserApplication>,
}

impl Display for UserApplicationService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SId={} SCIdS={} No={}",
            self.sid, self.scids, self.declared_applications
        )
    }
}

/// FIG 0/13 body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserApplicationInformation {
    pub services: Vec<UserApplicationService>,
    pub truncated: bool,
}

impl UserApplicationInformation {
    fn read(pd: bool, reader: &mut BsIoSliceReader) -> io::Result<Self> {
        let mut body = Self::default();

        while reader.remaining_bytes()? > 0 {
            let header = (|| -> io::Result<(u32, u8, u8)> {
                let sid = if pd {
                    reader.get_n(32)?
                } else {
                    reader.get_n(16)?
                };
                Ok((sid, reader.get_n(4)?, reader.get_n(4)?))
            })();

            let Ok((sid, scids, declared_applications)) = header else {
                body.truncated = true;
                break;
            };

            let mut service = UserApplicationService {
                sid,
                scids,
                declared_applications,
                applications: Vec::with_capacity(declared_applications as usize),
            };

            for _ in 0..declared_applications {
                let entry = (|| -> io::Result<UserApplication> {
                    let app_type = reader.get_n(11)?;
                    let data_length = reader.get_n(5)?;
                    reader.skip_n(data_length as u32 * 8)?;
                    Ok(UserApplication {
                        app_type,
                        data_length,
                    })
                })();

                match entry {
                    Ok(app) => service.applications.push(app),
                    Err(_) => {
                        body.truncated = true;
                        break;
                    }
                }
            }

            body.services.push(service);
            if body.truncated {
                break;
            }
        }

        Ok(body)
    }
}
