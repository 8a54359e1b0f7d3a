use std::collections::BTreeMap;

use anyhow::Result;
use log::{debug, warn};

use crate::structs::header::SubchannelDescriptor;
use crate::utils::errors::FrameError;

/// Consumer of one selected sub-channel stream.
pub trait StreamSink {
    /// Called before the first push, and again if the sub-channel index
    /// derived from STL changes.
    fn configure(&mut self, subchannel_index: usize, stream_index: usize) -> Result<()>;

    /// Receives the stream bytes of one frame, in frame order.
    fn push(&mut self, data: &[u8]) -> Result<()>;

    /// Called once after the last frame.
    fn close(&mut self) -> Result<()>;
}

/// Byte range of one stream within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSlice {
    pub index: usize,
    pub offset: usize,
    pub length: usize,
    pub selected: bool,
}

impl StreamSlice {
    pub fn data<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.offset..self.offset + self.length]
    }
}

struct SinkSlot {
    sink: Box<dyn StreamSink>,
    configured: Option<usize>,
}

#[derive(Default)]
pub struct Demultiplexer {
    sinks: BTreeMap<usize, SinkSlot>,
}

impl Demultiplexer {
    pub fn add_sink(&mut self, stream_index: usize, sink: Box<dyn StreamSink>) {
        self.sinks.insert(
            stream_index,
            SinkSlot {
                sink,
                configured: None,
            },
        );
    }

    pub fn is_selected(&self, stream_index: usize) -> bool {
        self.sinks.contains_key(&stream_index)
    }

    /// Cuts the MST, starting at `msc_start`, into consecutive streams.
    ///
    /// Slicing stops at the first stream reaching past the frame; the
    /// streams before it are returned along with the error.
    pub fn slice(
        &self,
        frame: &[u8],
        msc_start: usize,
        stc: &[SubchannelDescriptor],
    ) -> (Vec<StreamSlice>, Option<FrameError>) {
        let mut slices = Vec::with_capacity(stc.len());
        let mut offset = msc_start;

        for descriptor in stc {
            let length = descriptor.length_bytes();
            let end = offset + length;
            if end > frame.len() {
                let error = FrameError::StreamOverrun {
                    stream: descriptor.stream_index,
                    end,
                    frame_len: frame.len(),
                };
                warn!("{error}");
                return (slices, Some(error));
            }

            slices.push(StreamSlice {
                index: descriptor.stream_index,
                offset,
                length,
                selected: self.is_selected(descriptor.stream_index),
            });
            offset = end;
        }

        (slices, None)
    }

    /// Pushes the selected slices of `frame` to their sinks.
    pub fn dispatch(
        &mut self,
        frame: &[u8],
        slices: &[StreamSlice],
        stc: &[SubchannelDescriptor],
    ) -> Result<()> {
        for (slice, descriptor) in slices.iter().zip(stc) {
            let Some(slot) = self.sinks.get_mut(&slice.index) else {
                continue;
            };

            let subchannel_index = descriptor.subchannel_index();
            if slot.configured != Some(subchannel_index) {
                debug!(
                    "Configuring stream {} with sub-channel index {subchannel_index}",
                    slice.index
                );
                slot.sink.configure(subchannel_index, slice.index)?;
                slot.configured = Some(subchannel_index);
            }

            slot.sink.push(slice.data(frame))?;
        }

        Ok(())
    }

    /// Closes every sink once and forgets it. All sinks are closed even if
    /// one fails; the first failure is returned.
    pub fn close_all(&mut self) -> Result<()> {
        let mut result = Ok(());

        for (index, mut slot) in std::mem::take(&mut self.sinks) {
            if let Err(e) = slot.sink.close() {
                warn!("Closing stream {index} failed: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::process::test_frames::FrameBuilder;
    use crate::structs::header::Header;
    use crate::utils::crc::Crc16;

    #[derive(Debug, Default)]
    pub struct Recorded {
        pub configured: Vec<(usize, usize)>,
        pub pushed: Vec<Vec<u8>>,
        pub closed: usize,
    }

    /// Sink recording every call into shared state.
    pub struct RecordingSink(pub Rc<RefCell<Recorded>>);

    impl StreamSink for RecordingSink {
        fn configure(&mut self, subchannel_index: usize, stream_index: usize) -> Result<()> {
            self.0
                .borrow_mut()
                .configured
                .push((subchannel_index, stream_index));
            Ok(())
        }

        fn push(&mut self, data: &[u8]) -> Result<()> {
            self.0.borrow_mut().pushed.push(data.to_vec());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.0.borrow_mut().closed += 1;
            Ok(())
        }
    }

    fn header(frame: &[u8]) -> Header {
        Header::read(&Crc16::default(), frame).unwrap()
    }

    #[test]
    fn single_stream_is_24_bytes() {
        let frame = FrameBuilder::new().stream(1, 0x20, 3).build();
        let header = header(&frame);

        let demux = Demultiplexer::default();
        let (slices, error) = demux.slice(&frame, header.mst_offset(), &header.stc);

        assert!(error.is_none());
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].length, 24);
        assert!(!slices[0].selected);
        assert!(
            slices[0]
                .data(&frame)
                .iter()
                .all(|&b| b == FrameBuilder::stream_fill(0))
        );
    }

    #[test]
    fn streams_are_consecutive() {
        let frame = FrameBuilder::new()
            .stream(1, 0x20, 6)
            .stream(2, 0x20, 12)
            .build();
        let header = header(&frame);

        let (slices, _) = Demultiplexer::default().slice(&frame, header.mst_offset(), &header.stc);
        assert_eq!(slices[1].offset, slices[0].offset + 48);
        assert_eq!(slices[1].length, 96);
        assert_eq!(slices[1].data(&frame)[0], FrameBuilder::stream_fill(1));
    }

    #[test]
    fn stream_past_frame_is_an_overrun() {
        let frame = FrameBuilder::new().stream(1, 0x20, 3).build();
        let mut header = header(&frame);
        header.stc[0].stl = 1023;

        let (slices, error) = Demultiplexer::default().slice(&frame, header.mst_offset(), &header.stc);
        assert!(slices.is_empty());
        assert_eq!(
            error,
            Some(FrameError::StreamOverrun {
                stream: 0,
                end: 16 + 1023 * 8,
                frame_len: frame.len()
            })
        );
    }

    #[test]
    fn selected_stream_is_configured_pushed_and_closed_once() -> anyhow::Result<()> {
        let frame = FrameBuilder::new()
            .stream(1, 0x20, 3)
            .stream(2, 0x20, 6)
            .build();
        let header = header(&frame);

        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut demux = Demultiplexer::default();
        demux.add_sink(1, Box::new(RecordingSink(recorded.clone())));

        let (slices, _) = demux.slice(&frame, header.mst_offset(), &header.stc);
        assert!(slices[1].selected);
        demux.dispatch(&frame, &slices, &header.stc)?;
        demux.dispatch(&frame, &slices, &header.stc)?;
        demux.close_all()?;
        demux.close_all()?;

        let recorded = recorded.borrow();
        assert_eq!(recorded.configured, [(2, 1)]);
        assert_eq!(recorded.pushed.len(), 2);
        assert_eq!(recorded.pushed[0].len(), 48);
        assert_eq!(recorded.closed, 1);
        Ok(())
    }
}
