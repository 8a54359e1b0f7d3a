use std::sync::Arc;

use anyhow::Result;

/// Frame-by-frame analysis.
///
/// Provides the [`Analyser`](analyse::Analyser), which turns each
/// [`Frame`] into an [`EtiFrame`](analyse::EtiFrame) and keeps the state
/// spanning frames: FSYNC alternation, the FIG carousel and the stream sinks.
pub mod analyse;

/// FIG occurrence bookkeeping per FIB.
pub mod carousel;

/// Slicing of the MST into sub-channel streams.
///
/// Provides the [`StreamSink`](demux::StreamSink) trait implemented by
/// consumers of selected streams.
pub mod demux;

/// Size of one ETI(NI) frame in bytes.
pub const ETI_FRAME_SIZE: usize = 6144;

/// One ETI(NI) frame, always [`ETI_FRAME_SIZE`] bytes once it left the
/// container reader.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

/// Supplier of frames, pulled one at a time.
pub trait FrameSource {
    /// Returns the next frame, `Ok(None)` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
