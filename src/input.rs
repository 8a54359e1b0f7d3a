use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use anyhow::{Result, bail};
use eti::process::{ETI_FRAME_SIZE, Frame, FrameSource};
use eti::structs::sync::{FSYNC0, FSYNC1};
use eti::utils::errors::InputError;
use log::{debug, info, warn};

/// Fill byte for frames shorter than [`ETI_FRAME_SIZE`].
pub const PADDING_BYTE: u8 = 0x55;

/// Bytes needed to tell the container formats apart.
const PROBE_SIZE: usize = 10;

/// ETI container layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtiFormat {
    /// Back-to-back 6144-byte frames.
    Raw,
    /// Each frame preceded by its size as u16 LE.
    Streamed,
    /// A u32 LE frame count, then streamed frames.
    Framed,
}

impl Display for EtiFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EtiFormat::Raw => "RAW",
            EtiFormat::Streamed => "STREAMED",
            EtiFormat::Framed => "FRAMED",
        })
    }
}

fn is_fsync(bytes: &[u8]) -> bool {
    let word = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
    word == FSYNC0 || word == FSYNC1
}

/// Identifies the container from the first bytes of the input.
pub fn identify_format(probe: &[u8]) -> Result<EtiFormat, InputError> {
    if probe.len() >= 4 && is_fsync(&probe[1..4]) {
        Ok(EtiFormat::Raw)
    } else if probe.len() >= 6 && is_fsync(&probe[3..6]) {
        Ok(EtiFormat::Streamed)
    } else if probe.len() >= PROBE_SIZE && is_fsync(&probe[7..10]) {
        Ok(EtiFormat::Framed)
    } else {
        Err(InputError::UnknownFormat)
    }
}

/// Reads ETI frames from a file or stdin, whatever the container.
pub struct EtiReader {
    reader: Box<dyn Read>,
    format: EtiFormat,
    input_len: Option<u64>,
    declared_frames: Option<u32>,
    frames_read: u64,
    bytes_read: u64,
}

impl EtiReader {
    /// Opens `input_path`, `-` standing for stdin, and identifies its format.
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();

        if path_str == "-" {
            info!("Analysing stdin");
            Self::from_reader(Box::new(io::stdin().lock()), None)
        } else {
            let file = File::open(input_path)?;
            let len = file.metadata()?.len();
            Self::from_reader(Box::new(BufReader::new(file)), Some(len))
        }
    }

    /// Wraps `reader`; `input_len` is the total byte count when known.
    pub fn from_reader(mut reader: Box<dyn Read>, input_len: Option<u64>) -> Result<Self> {
        let mut probe = [0u8; PROBE_SIZE];
        let probed = read_full(reader.as_mut(), &mut probe).map_err(InputError::from)?;
        let format = identify_format(&probe[..probed])?;
        info!("Identified ETI type {format}");

        // Put the probed bytes back in front of the stream
        let probe = Cursor::new(probe[..probed].to_vec());
        let mut this = Self {
            reader: Box::new(probe.chain(reader)),
            format,
            input_len,
            declared_frames: None,
            frames_read: 0,
            bytes_read: 0,
        };

        if format == EtiFormat::Framed {
            let mut count = [0u8; 4];
            this.read_exact_or_eof(&mut count)?;
            let count = u32::from_le_bytes(count);
            debug!("Container declares {count} frames");
            this.declared_frames = Some(count);
        }

        Ok(this)
    }

    pub fn format(&self) -> EtiFormat {
        self.format
    }

    /// Expected frame count: the FRAMED header, or the size of a RAW file.
    pub fn estimated_frames(&self) -> Option<u64> {
        match self.format {
            EtiFormat::Framed => self.declared_frames.map(u64::from),
            EtiFormat::Raw => self.input_len.map(|len| len / ETI_FRAME_SIZE as u64),
            EtiFormat::Streamed => None,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fills `buf`, returning `false` on a clean end of stream.
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let n = read_full(self.reader.as_mut(), buf).map_err(InputError::from)?;
        self.bytes_read += n as u64;

        match n {
            0 => Ok(false),
            n if n == buf.len() => Ok(true),
            n => {
                warn!(
                    "Truncated input: {n} of {} bytes after frame {}",
                    buf.len(),
                    self.frames_read
                );
                Ok(false)
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let size = match self.format {
            EtiFormat::Raw => ETI_FRAME_SIZE,
            EtiFormat::Streamed | EtiFormat::Framed => {
                let mut size = [0u8; 2];
                if !self.read_exact_or_eof(&mut size)? {
                    return Ok(None);
                }
                let size = u16::from_le_bytes(size) as usize;
                if size > ETI_FRAME_SIZE {
                    bail!(InputError::FrameTooLong(size));
                }
                size
            }
        };

        let mut frame = vec![PADDING_BYTE; ETI_FRAME_SIZE];
        if !self.read_exact_or_eof(&mut frame[..size])? {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

impl FrameSource for EtiReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.read_frame()?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame.map(Frame::from))
    }
}

/// Reads until `buf` is full or the stream ends, returning the byte count.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(fsync: u32, fill: u8) -> Vec<u8> {
        let mut frame = vec![fill; ETI_FRAME_SIZE];
        frame[0] = 0xFF;
        frame[1..4].copy_from_slice(&fsync.to_be_bytes()[1..]);
        frame
    }

    fn reader(bytes: Vec<u8>) -> Result<EtiReader> {
        let len = bytes.len() as u64;
        EtiReader::from_reader(Box::new(Cursor::new(bytes)), Some(len))
    }

    #[test]
    fn raw_frames_are_read_back_to_back() -> Result<()> {
        let mut data = raw_frame(FSYNC0, 0x01);
        data.extend(raw_frame(FSYNC1, 0x02));

        let mut reader = reader(data)?;
        assert_eq!(reader.format(), EtiFormat::Raw);

        let first = reader.next_frame()?.unwrap();
        assert_eq!(first.as_ref()[1..4], [0x07, 0x3A, 0xB6]);
        let second = reader.next_frame()?.unwrap();
        assert_eq!(second.as_ref()[100], 0x02);
        assert!(reader.next_frame()?.is_none());
        assert_eq!(reader.estimated_frames(), Some(2));
        assert_eq!(reader.bytes_read(), 2 * ETI_FRAME_SIZE as u64);
        Ok(())
    }

    #[test]
    fn streamed_frames_are_padded() -> Result<()> {
        let short = &raw_frame(FSYNC0, 0x00)[..100];
        let mut data = (short.len() as u16).to_le_bytes().to_vec();
        data.extend_from_slice(short);

        let mut reader = reader(data)?;
        assert_eq!(reader.format(), EtiFormat::Streamed);

        let frame = reader.next_frame()?.unwrap();
        assert_eq!(frame.as_ref().len(), ETI_FRAME_SIZE);
        assert_eq!(frame.as_ref()[99], 0x00);
        assert_eq!(frame.as_ref()[100], PADDING_BYTE);
        assert!(reader.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn framed_container_declares_count() -> Result<()> {
        let frame = raw_frame(FSYNC1, 0x00);
        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend((ETI_FRAME_SIZE as u16).to_le_bytes());
        data.extend(&frame);

        let mut reader = reader(data)?;
        assert_eq!(reader.format(), EtiFormat::Framed);
        assert_eq!(reader.estimated_frames(), Some(3));
        assert!(reader.next_frame()?.is_some());
        assert!(reader.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn oversized_streamed_frame_is_an_error() -> Result<()> {
        let mut data = 7000u16.to_le_bytes().to_vec();
        data.extend_from_slice(&raw_frame(FSYNC0, 0x00)[..8]);

        let mut reader = reader(data)?;
        let err = reader.next_frame().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::FrameTooLong(7000))
        ));
        Ok(())
    }

    #[test]
    fn truncated_raw_frame_ends_the_stream() -> Result<()> {
        let mut data = raw_frame(FSYNC0, 0x00);
        data.truncate(4000);

        let mut reader = reader(data)?;
        assert!(reader.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = reader(vec![0u8; 64]).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::UnknownFormat)
        ));
        assert!(matches!(
            identify_format(&[0xFF, 0x07]),
            Err(InputError::UnknownFormat)
        ));
    }
}
