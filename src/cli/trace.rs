use std::io::{self, Write};

use eti::process::analyse::{EtiFrame, LiData};
use eti::structs::fib::{FIB_DATA_SIZE, FIB_SIZE, Fib, FigRecord};
use eti::structs::fig::{Fig, Fig0Body, Fig1Body};
use eti::structs::sync::SyncField;
use eti::utils::errors::{FrameError, HeaderError};

const SEPARATOR_WIDTH: usize = 109;

/// Tab-indented field dump of analysed frames.
///
/// At verbosity 0 nothing but label lines is written, at 1 every field
/// with its description, and from 2 on the raw bytes as well.
pub struct TraceWriter<W: Write> {
    out: W,
    verbosity: u8,
    carousel_per_frame: bool,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W, verbosity: u8) -> Self {
        Self {
            out,
            verbosity,
            carousel_per_frame: false,
        }
    }

    /// Prints the FIG carousel of each frame right after its FIC.
    pub fn with_frame_carousel(mut self, enabled: bool) -> Self {
        self.carousel_per_frame = enabled;
        self
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Writes `header` at `indent`, followed by `bytes` in hex from
    /// verbosity 2 and by `desc` in brackets.
    pub fn field(&mut self, header: &str, indent: usize, bytes: &[u8], desc: &str) -> io::Result<()> {
        if self.verbosity == 0 {
            return Ok(());
        }

        self.indent(indent)?;
        write!(self.out, "{header}")?;

        if self.verbosity > 1 {
            if !bytes.is_empty() {
                write!(self.out, ": ")?;
            }
            for byte in bytes {
                write!(self.out, "{byte:02x} ")?;
            }
        }

        if !desc.is_empty() {
            write!(self.out, " [{desc}] ")?;
        }

        writeln!(self.out)
    }

    /// Writes `text` at `indent` whatever the verbosity.
    pub fn info(&mut self, text: &str, indent: usize) -> io::Result<()> {
        self.indent(indent)?;
        writeln!(self.out, "{text}")
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    pub fn separator(&mut self) -> io::Result<()> {
        if self.verbosity == 0 {
            return Ok(());
        }
        writeln!(self.out, "{}", "-".repeat(SEPARATOR_WIDTH))
    }

    fn indent(&mut self, indent: usize) -> io::Result<()> {
        for _ in 0..indent {
            write!(self.out, "\t")?;
        }
        Ok(())
    }

    pub fn frame(&mut self, frame: &EtiFrame) -> io::Result<()> {
        self.sync(&frame.sync)?;

        match &frame.lidata {
            Some(lidata) => {
                self.lidata(lidata)?;
                self.separator()
            }
            None => Ok(()),
        }
    }

    fn sync(&mut self, sync: &SyncField) -> io::Result<()> {
        let fsync = sync.fsync.to_be_bytes();
        let bytes = [sync.err, fsync[1], fsync[2], fsync[3]];

        self.field("SYNC", 0, &bytes, "")?;
        self.field("ERR", 1, &bytes[..1], sync.err_description())?;
        self.field("Sync FSYNC", 1, &bytes[1..], &sync.fsync_status.to_string())
    }

    fn lidata(&mut self, lidata: &LiData) -> io::Result<()> {
        let data = lidata.frame.as_ref();
        let header = &lidata.header;
        let fc = &header.fc;

        self.field("LDATA", 0, &[], "")?;
        self.field("FC - Frame Characterization field", 1, &data[4..8], "")?;
        self.field("FCT  - Frame Count", 2, &data[4..5], &fc.fct.to_string())?;

        let ficf = if fc.ficf {
            "1- FIC Information are present"
        } else {
            "0- FIC Information are not present"
        };
        self.field("FICF - Fast Information Channel Flag", 2, &[], ficf)?;
        self.field("NST  - Number of streams", 2, &[], &fc.nst.to_string())?;
        for error in &header.errors {
            if let HeaderError::TooManyStreams(_) = error {
                self.field(&error.to_string(), 3, &[], "")?;
            }
        }
        self.field("FP   - Frame Phase", 2, &[fc.fp], &fc.fp.to_string())?;
        self.field("MID  - Mode Identity", 2, &[fc.mid], &format!("Mode {}", fc.mode()))?;
        self.field("FL   - Frame Length", 2, &[], &format!("{} words", fc.fl))?;
        for error in &header.errors {
            if let HeaderError::FrameLengthMismatch { .. } = error {
                self.field(&error.to_string(), 3, &[], "")?;
            }
        }

        self.field("STC - Stream Characterisation", 1, &[], "")?;
        for stc in &header.stc {
            let offset = 8 + 4 * stc.stream_index;
            self.field(
                "STC  - Stream Characterisation",
                2,
                &data[offset..offset + 4],
                &format!("Stream number {}", stc.stream_index),
            )?;
            self.field("SCID - Sub-channel Identifier", 3, &[], &stc.scid.to_string())?;
            self.field("SAD  - Sub-channel Start Address", 3, &[], &stc.sad.to_string())?;
            self.field(
                "TPL  - Sub-channel Type and Protection Level",
                3,
                &[],
                &format!("0x{:02x} - {}", stc.tpl, stc.protection),
            )?;
            self.field(
                "STL  - Sub-channel Stream Length",
                3,
                &[],
                &format!("{} => {} kbit/s", stc.stl, stc.bitrate_kbps()),
            )?;
        }

        let eoh = 8 + 4 * header.stc.len();
        self.field("EOH - End Of Header", 1, &data[eoh..eoh + 4], "")?;
        self.field(
            "MNSC - Multiplex Network Signalling Channel",
            2,
            &data[eoh..eoh + 2],
            &header.eoh.mnsc.to_string(),
        )?;
        self.field("Header CRC", 2, &data[eoh + 2..eoh + 4], &header.eoh.crc.to_string())?;

        if let Some(fic) = &lidata.fic {
            self.field(&format!("FIC Data ({} bytes)", fc.fic_length_bytes()), 1, &[], "")?;
            let fic_bytes = lidata.fic_bytes();
            for fib in &fic.fibs {
                self.fib(fib, fic_bytes)?;
            }

            if self.carousel_per_frame {
                self.line(&fic.carousel().summarize().to_string())?;
            }
        }

        for slice in &lidata.streams {
            let selection = if slice.selected {
                "selected for decoding"
            } else {
                "not selected for decoding"
            };
            self.field(
                "Stream Data",
                1,
                lidata.stream_data(slice),
                &format!("id {}, len {}, {selection}", slice.index, slice.length),
            )?;
        }

        for error in &lidata.errors {
            match error {
                FrameError::StreamOverrun { stream, .. } => {
                    self.field("Stream Data", 1, &[], &format!("id {stream}, {error}"))?;
                }
                FrameError::TrailerOverrun { .. } => {
                    self.field("EOF", 1, &[], &error.to_string())?;
                }
                _ => {}
            }
        }

        if let Some(eof) = &lidata.eof {
            let at = eof.offset;
            self.field("EOF", 1, &data[at..at + 4], "")?;
            self.field("CRC", 2, &data[at..at + 2], &eof.crc.to_string())?;
            self.field("RFU", 2, &data[at + 2..at + 4], "")?;
        }

        if let Some(tist) = &lidata.tist {
            self.field(
                "TIST - Time Stamp",
                1,
                &tist.bytes,
                &format!("{} ms", tist.milliseconds()),
            )?;
        }

        Ok(())
    }

    fn fib(&mut self, fib: &Fib, fic_bytes: &[u8]) -> io::Result<()> {
        for record in &fib.figs {
            self.fig(record)?;
        }
        if let Some(overrun) = &fib.overrun {
            self.field(&overrun.to_string(), 3, &[], "")?;
        }

        let crc_at = fib.index * FIB_SIZE + FIB_DATA_SIZE;
        let crc_bytes = fic_bytes.get(crc_at..crc_at + 2).unwrap_or_default();
        self.field("FIB CRC", 3, crc_bytes, &format!("FIB {}", fib.crc))
    }

    pub fn fig(&mut self, record: &FigRecord) -> io::Result<()> {
        self.field(
            &format!("FIG {} [{} bytes]", record.fig_type, record.length),
            3,
            &record.payload,
            "",
        )?;

        match &record.decoded {
            Ok(fig) => self.decoded_fig(fig, record.payload.get(1..).unwrap_or_default(), 4),
            Err(e) => self.field(&e.to_string(), 4, &[], ""),
        }
    }

    fn decoded_fig(&mut self, fig: &Fig, body: &[u8], indent: usize) -> io::Result<()> {
        self.field(&fig.to_string(), indent, body, "")?;

        match fig {
            Fig::Type0(fig0) => match &fig0.body {
                Fig0Body::EnsembleInformation(info) => {
                    self.field(&info.to_string(), indent + 1, &[], "")?;
                }
                Fig0Body::SubchannelOrganisation(subchannels) => {
                    for subchannel in subchannels {
                        self.field(&subchannel.to_string(), indent + 1, &[], "")?;
                    }
                }
                Fig0Body::ServiceOrganisation(organisation) => {
                    for service in &organisation.services {
                        self.field(&service.to_string(), indent + 1, &[], "")?;
                        for (i, component) in service.components.iter().enumerate() {
                            self.field(&format!("Component[{i}]"), indent + 2, &[], "")?;
                            self.field(&component.to_string(), indent + 3, &[], "")?;
                        }
                    }
                }
                Fig0Body::UserApplications(information) => {
                    for service in &information.services {
                        self.field(&service.to_string(), indent + 1, &[], "")?;
                        for application in &service.applications {
                            self.field(&application.to_string(), indent + 2, &[], "")?;
                        }
                    }
                }
                Fig0Body::Undecoded => {}
            },
            Fig::Type1(fig1) => {
                if fig1.body != Fig1Body::Undecoded {
                    self.info(&fig1.body.to_string(), indent + 1)?;
                }
            }
            Fig::Type2(_) | Fig::Type5(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eti::process::Frame;
    use eti::process::analyse::{Analyser, AnalyserConfig};
    use eti::process::ETI_FRAME_SIZE;
    use eti::utils::crc::Crc16;

    /// Mode 1 frame with valid header and frame CRCs. Stream payloads are
    /// left as padding.
    fn build_frame(err: u8, stc: &[[u8; 4]], fic: &[u8], fl: u16) -> Frame {
        let crc = Crc16::default();
        let mut frame = vec![0x55u8; ETI_FRAME_SIZE];
        frame[..4].copy_from_slice(&[err, 0x07, 0x3A, 0xB6]);
        frame[4] = 0x05;
        frame[5] = (u8::from(!fic.is_empty()) << 7) | stc.len() as u8;
        frame[6] = 0x08 | (fl >> 8) as u8;
        frame[7] = fl as u8;
        for (i, word) in stc.iter().enumerate() {
            frame[8 + 4 * i..12 + 4 * i].copy_from_slice(word);
        }

        let eoh = 8 + 4 * stc.len();
        frame[eoh..eoh + 2].copy_from_slice(&[0x00, 0x00]);
        let header_crc = crc.checksum(&frame[4..eoh + 2]);
        frame[eoh + 2..eoh + 4].copy_from_slice(&header_crc.to_be_bytes());

        let mst = eoh + 4;
        let mst_end = mst + fic.len();
        frame[mst..mst_end].copy_from_slice(fic);
        let frame_crc = crc.checksum(&frame[mst..mst_end]);
        frame[mst_end..mst_end + 2].copy_from_slice(&frame_crc.to_be_bytes());
        frame[mst_end + 2..mst_end + 4].copy_from_slice(&[0xFF, 0xFF]);
        frame[mst_end + 4..mst_end + 8].copy_from_slice(&[0x00, 0x0A, 0x00, 0x00]);
        frame.into()
    }

    /// Mode 1 frame without FIC or streams.
    fn empty_frame(err: u8) -> Frame {
        build_frame(err, &[], &[], 1)
    }

    /// Three FIBs, the first holding `figs`, all with valid CRCs.
    fn fic(figs: &[u8]) -> Vec<u8> {
        let crc = Crc16::default();
        let mut fic = Vec::new();
        for i in 0..3 {
            let mut fib = vec![0xFFu8; FIB_DATA_SIZE];
            if i == 0 {
                fib[..figs.len()].copy_from_slice(figs);
            }
            let fib_crc = crc.checksum(&fib);
            fib.extend_from_slice(&fib_crc.to_be_bytes());
            fic.extend(fib);
        }
        fic
    }

    fn render(verbosity: u8, frame: &Frame, config: AnalyserConfig) -> String {
        let mut analyser = Analyser::new(config);
        let frame = analyser.analyse(frame).unwrap();
        let mut trace = TraceWriter::new(Vec::new(), verbosity);
        trace.frame(&frame).unwrap();
        String::from_utf8(trace.into_inner()).unwrap()
    }

    #[test]
    fn field_shows_bytes_from_verbosity_two() {
        let mut trace = TraceWriter::new(Vec::new(), 1);
        trace.field("ERR", 1, &[0xFF], "No error").unwrap();
        assert_eq!(trace.into_inner(), b"\tERR [No error] \n");

        let mut trace = TraceWriter::new(Vec::new(), 2);
        trace.field("ERR", 1, &[0xFF], "No error").unwrap();
        assert_eq!(trace.into_inner(), b"\tERR: ff  [No error] \n");
    }

    #[test]
    fn silent_verbosity_keeps_info_lines() {
        let mut trace = TraceWriter::new(Vec::new(), 0);
        trace.field("SYNC", 0, &[0xFF], "").unwrap();
        trace.separator().unwrap();
        trace.info("label", 5).unwrap();
        assert_eq!(trace.into_inner(), b"\t\t\t\t\tlabel\n");
    }

    #[test]
    fn frame_fields_are_listed_in_order() {
        let text = render(1, &empty_frame(0xFF), AnalyserConfig::default());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "SYNC");
        assert_eq!(lines[1], "\tERR [No error] ");
        assert_eq!(lines[2], "\tSync FSYNC [OK] ");
        assert_eq!(lines[3], "LDATA");
        assert_eq!(lines[5], "\t\tFCT  - Frame Count [5] ");
        assert_eq!(
            lines[6],
            "\t\tFICF - Fast Information Channel Flag [0- FIC Information are not present] "
        );
        assert_eq!(lines[9], "\t\tMID  - Mode Identity [Mode 1] ");
        assert_eq!(lines[10], "\t\tFL   - Frame Length [1 words] ");
        assert!(text.contains("\t\tHeader CRC [CRC OK] \n"));
        assert!(text.contains("\t\tCRC [CRC OK] \n"));
        assert!(text.contains("\tTIST - Time Stamp [40 ms] \n"));
        assert_eq!(lines.last().map(|l| l.len()), Some(SEPARATOR_WIDTH));
    }

    #[test]
    fn errored_frame_stops_after_sync() {
        let text = render(1, &empty_frame(0x00), AnalyserConfig::default());
        assert_eq!(text, "SYNC\n\tERR [Error] \n\tSync FSYNC [OK] \n");

        let ignored = render(
            1,
            &empty_frame(0x00),
            AnalyserConfig {
                ignore_errors: true,
                ..Default::default()
            },
        );
        assert!(ignored.contains("LDATA"));
    }

    #[test]
    fn frame_length_mismatch_follows_fl() {
        let text = render(1, &build_frame(0xFF, &[], &[], 2), AnalyserConfig::default());
        assert!(text.contains(
            "\t\tFL   - Frame Length [2 words] \n\
             \t\t\tFL does not match the frame geometry. Declared 2 words, computed 1\n"
        ));
    }

    #[test]
    fn too_many_streams_follows_nst() {
        let stc = [[0x04, 0x00, 0x80, 0x00]; 65];
        let text = render(1, &build_frame(0xFF, &stc, &[], 66), AnalyserConfig::default());
        assert!(text.contains(
            "\t\tNST  - Number of streams [65] \n\t\t\tNST must not exceed 64. Read 65\n"
        ));
        assert!(!text.contains("FL does not match"));
    }

    #[test]
    fn stream_past_frame_end_is_traced() {
        // STL 1023: 8184 bytes starting at byte 16
        let stc = [[0x04, 0x00, 0x83, 0xFF]];
        let text = render(2, &build_frame(0xFF, &stc, &[], 2047), AnalyserConfig::default());

        assert!(text.contains(
            "\tStream Data [id 0, Stream 0 ends at byte 8200, past the 6144-byte frame] \n"
        ));
        assert!(text.contains("\tEOF [EOF/TIST at byte 8200 lies past the 6144-byte frame] \n"));
        assert!(!text.contains("TIST - Time Stamp"));
        assert_eq!(text.lines().last().map(|l| l.len()), Some(SEPARATOR_WIDTH));
    }

    #[test]
    fn fig_overrun_is_traced_before_fib_crc() {
        // a 31-byte FIG 0 at the start of FIB 0
        let mut figs = vec![0x1F];
        figs.resize(FIB_DATA_SIZE, 0x00);
        let fic = fic(&figs);
        let text = render(1, &build_frame(0xFF, &[], &fic, 25), AnalyserConfig::default());

        let overrun = text
            .find("\t\t\tFIG at offset 0 of FIB 0 declares 31 bytes past the FIB data field\n")
            .unwrap();
        let crc = text.find("\t\t\tFIB CRC").unwrap();
        assert!(overrun < crc);
    }

    #[test]
    fn frame_carousel_starts_afresh_each_frame() {
        let fic = fic(&[0x05, 0x00, 0x40, 0x01, 0x00, 0x00]);
        let frame = build_frame(0xFF, &[], &fic, 25);

        let mut analyser = Analyser::new(AnalyserConfig::default());
        let mut trace = TraceWriter::new(Vec::new(), 0).with_frame_carousel(true);
        for _ in 0..2 {
            trace.frame(&analyser.analyse(&frame).unwrap()).unwrap();
        }

        let text = String::from_utf8(trace.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], lines[1]);
        assert!(lines[0].starts_with("FIC [0 0/00 ( 5) "));
        assert!(analyser.carousel().is_empty());
    }
}
