use anyhow::{Result, bail};
use log::{debug, error, info, warn};

use crate::process::carousel::{Carousel, CarouselTally};
use crate::process::demux::{Demultiplexer, StreamSink, StreamSlice};
use crate::process::{ETI_FRAME_SIZE, Frame, FrameSource};
use crate::structs::fib::Fic;
use crate::structs::header::Header;
use crate::structs::sync::{FrameSynchronizer, FsyncStatus, SyncField};
use crate::utils::bitstream_io::read_u16_be;
use crate::utils::crc::{Crc16, CrcCheck};
use crate::utils::errors::{FrameError, HeaderError, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyserConfig {
    /// Keep decoding frames whose ERR byte signals an error.
    pub ignore_errors: bool,
    /// Record the FIG carousel of each frame and tally it over the run.
    pub analyse_carousel: bool,
}

/// Fault counters over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub frames: u64,
    pub err_frames: u64,
    pub fsync_faults: u64,
    pub header_crc_errors: u64,
    pub frame_length_mismatches: u64,
    pub fib_crc_errors: u64,
    pub fig_errors: u64,
    pub fig_overruns: u64,
    pub stream_overruns: u64,
    pub frame_crc_errors: u64,
}

impl Stats {
    pub fn faults(&self) -> u64 {
        self.err_frames
            + self.fsync_faults
            + self.header_crc_errors
            + self.frame_length_mismatches
            + self.fib_crc_errors
            + self.fig_errors
            + self.fig_overruns
            + self.stream_overruns
            + self.frame_crc_errors
    }
}

/// EOF field: CRC over the MST and the reserved word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfFrame {
    pub offset: usize,
    pub crc: CrcCheck,
    pub rfu: u16,
}

/// TIST field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tist {
    pub offset: usize,
    pub bytes: [u8; 4],
}

impl Tist {
    /// Milliseconds as read from the upper seven bits of the second byte.
    pub fn milliseconds(&self) -> u32 {
        ((self.bytes[1] & 0xFE) >> 1) as u32 * 8
    }
}

/// Everything after SYNC: header, MST and trailer.
#[derive(Debug)]
pub struct LiData {
    pub header: Header,
    pub fic: Option<Fic>,
    pub msc_offset: usize,
    pub streams: Vec<StreamSlice>,
    pub eof: Option<EndOfFrame>,
    pub tist: Option<Tist>,
    pub errors: Vec<FrameError>,
    pub frame: Frame,
}

impl LiData {
    pub fn stream_data(&self, slice: &StreamSlice) -> &[u8] {
        slice.data(self.frame.as_ref())
    }

    pub fn fic_bytes(&self) -> &[u8] {
        let start = self.header.mst_offset();
        &self.frame.as_ref()[start..self.msc_offset]
    }
}

/// One analysed frame.
#[derive(Debug)]
pub struct EtiFrame {
    pub index: u64,
    pub sync: SyncField,
    /// `None` when the ERR byte stopped decoding.
    pub lidata: Option<LiData>,
}

impl EtiFrame {
    /// True when no fault of any kind was found in the frame.
    pub fn is_clean(&self) -> bool {
        if self.sync.has_error() || self.sync.fsync_status == FsyncStatus::Wrong {
            return false;
        }

        let Some(lidata) = &self.lidata else {
            return true;
        };

        lidata.header.errors.is_empty()
            && lidata.errors.is_empty()
            && lidata.fic.as_ref().is_none_or(|fic| {
                fic.fibs.iter().all(|fib| {
                    fib.crc.is_ok()
                        && fib.overrun.is_none()
                        && fib.figs.iter().all(|fig| fig.decoded.is_ok())
                })
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    EndOfStream,
    /// ERR byte signalled an error and errors are not ignored.
    Aborted,
}

/// Decodes frames in order, holding the state spanning frames.
pub struct Analyser {
    config: AnalyserConfig,
    crc: Crc16,
    sync: FrameSynchronizer,
    carousel: Carousel,
    tally: CarouselTally,
    demux: Demultiplexer,
    stats: Stats,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Self {
        Self {
            config,
            crc: Crc16::default(),
            sync: FrameSynchronizer::default(),
            carousel: Carousel::default(),
            tally: CarouselTally::default(),
            demux: Demultiplexer::default(),
            stats: Stats::default(),
        }
    }

    /// Forwards stream `stream_index` of every frame to `sink`.
    pub fn add_stream_sink(&mut self, stream_index: usize, sink: Box<dyn StreamSink>) {
        self.demux.add_sink(stream_index, sink);
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// FIG occurrences of the last frame carrying a FIC. Empty unless
    /// `analyse_carousel` is set.
    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    /// FIG totals over all frames carrying a FIC.
    pub fn tally(&self) -> &CarouselTally {
        &self.tally
    }

    /// Decodes one frame.
    ///
    /// Faults inside the frame are logged, counted and reported in the
    /// returned value; only a frame of the wrong size is an error.
    pub fn analyse(&mut self, frame: &Frame) -> Result<EtiFrame> {
        let data = frame.as_ref();
        if data.len() != ETI_FRAME_SIZE {
            bail!(FrameError::InvalidFrameSize {
                expected: ETI_FRAME_SIZE,
                actual: data.len(),
            });
        }

        let index = self.stats.frames;
        self.stats.frames += 1;

        let sync = self.sync.check(&[data[0], data[1], data[2], data[3]]);
        if sync.fsync_status == FsyncStatus::Wrong {
            self.stats.fsync_faults += 1;
        }

        if sync.has_error() {
            self.stats.err_frames += 1;
            warn!("Frame {index}: {}", SyncError::ErrorIndicator(sync.err));
            if !self.config.ignore_errors {
                return Ok(EtiFrame {
                    index,
                    sync,
                    lidata: None,
                });
            }
        }

        let lidata = self.analyse_lidata(frame)?;

        Ok(EtiFrame {
            index,
            sync,
            lidata: Some(lidata),
        })
    }

    fn analyse_lidata(&mut self, frame: &Frame) -> Result<LiData> {
        let data = frame.as_ref();
        let header = Header::read(&self.crc, data)?;
        for error in &header.errors {
            match error {
                HeaderError::HeaderCrcMismatch { .. } => self.stats.header_crc_errors += 1,
                HeaderError::FrameLengthMismatch { .. } => self.stats.frame_length_mismatches += 1,
                HeaderError::TooManyStreams(_) => {}
            }
        }

        let mst = header.mst_offset();
        let msc_offset = mst + header.fc.fic_length_bytes();

        let fic = if header.fc.ficf {
            let fic_data = &data[mst..msc_offset];
            let fic = if self.config.analyse_carousel {
                self.carousel.clear();
                let fic = Fic::read(fic_data, &self.crc, Some(&mut self.carousel))?;
                self.tally.add(&self.carousel);
                fic
            } else {
                Fic::read(fic_data, &self.crc, None)?
            };
            for fib in &fic.fibs {
                if !fib.crc.is_ok() {
                    self.stats.fib_crc_errors += 1;
                }
                if fib.overrun.is_some() {
                    self.stats.fig_overruns += 1;
                }
                self.stats.fig_errors += fib.figs.iter().filter(|f| f.decoded.is_err()).count() as u64;
            }
            Some(fic)
        } else {
            None
        };

        let mut errors = Vec::new();
        let (streams, overrun) = self.demux.slice(data, msc_offset, &header.stc);
        if let Some(error) = overrun {
            self.stats.stream_overruns += 1;
            errors.push(error);
        }
        self.demux.dispatch(data, &streams, &header.stc)?;

        let mst_end = msc_offset + header.stc.iter().map(|s| s.length_bytes()).sum::<usize>();
        let (eof, tist) = if mst_end + 8 <= data.len() {
            let read = read_u16_be(data, mst_end)?;
            let calculated = self.crc.checksum(&data[mst..mst_end]);
            let crc = CrcCheck { calculated, read };
            if !crc.is_ok() {
                self.stats.frame_crc_errors += 1;
                let error = FrameError::FrameCrcMismatch { calculated, read };
                warn!("{error}");
                errors.push(error);
            }

            let eof = EndOfFrame {
                offset: mst_end,
                crc,
                rfu: read_u16_be(data, mst_end + 2)?,
            };
            let tist = Tist {
                offset: mst_end + 4,
                bytes: [
                    data[mst_end + 4],
                    data[mst_end + 5],
                    data[mst_end + 6],
                    data[mst_end + 7],
                ],
            };
            (Some(eof), Some(tist))
        } else {
            let error = FrameError::TrailerOverrun {
                offset: mst_end,
                frame_len: data.len(),
            };
            warn!("{error}");
            errors.push(error);
            (None, None)
        };

        debug!(
            "FCT {}: {} streams, FIC {} bytes, MST ends at {mst_end}",
            header.fc.fct,
            header.stc.len(),
            msc_offset - mst
        );

        Ok(LiData {
            header,
            fic,
            msc_offset,
            streams,
            eof,
            tist,
            errors,
            frame: frame.clone(),
        })
    }

    /// Pulls and analyses frames until the source ends or an ERR byte
    /// aborts the run, handing each frame to `on_frame`.
    ///
    /// Stream sinks are closed exactly once before returning, whichever
    /// way the loop ended.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<RunEnd>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&EtiFrame) -> Result<()>,
    {
        let result = self.run_frames(source, &mut on_frame);
        let closed = self.demux.close_all();

        let end = result?;
        closed?;
        Ok(end)
    }

    fn run_frames<S, F>(&mut self, source: &mut S, on_frame: &mut F) -> Result<RunEnd>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&EtiFrame) -> Result<()>,
    {
        while let Some(frame) = source.next_frame()? {
            let eti = self.analyse(&frame)?;
            on_frame(&eti)?;

            if eti.lidata.is_none() {
                error!("{}", SyncError::Aborted);
                return Ok(RunEnd::Aborted);
            }
        }

        info!("End of ETI after {} frames", self.stats.frames);
        Ok(RunEnd::EndOfStream)
    }
}
