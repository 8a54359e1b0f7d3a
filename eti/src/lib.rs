//! Parser for ETI(NI) frames and the DAB Fast Information Channel.
//!
//! ## Technical Overview
//!
//! An ETI(NI) frame is 6144 bytes carrying one 24 ms CIF of a DAB ensemble:
//!
//! ```text
//! | SYNC | FC | STC | EOH | MST: FIC + streams | EOF | TIST | padding |
//! ```
//!
//! Three CRCs protect a frame: one over the header, one per FIB and one over
//! the MST. Mismatches are reported and decoding carries on.
//!
//! ## Quick Start
//!
//! 1. Pull frames from a [`process::FrameSource`]
//! 2. Decode them with [`process::analyse::Analyser`]
//! 3. Walk the returned [`process::analyse::EtiFrame`]
//!
//! ```rust,no_run
//! use eti::process::analyse::{Analyser, AnalyserConfig};
//! use eti::process::{ETI_FRAME_SIZE, Frame};
//!
//! let mut analyser = Analyser::new(AnalyserConfig::default());
//! let frame = Frame::from(vec![0u8; ETI_FRAME_SIZE]);
//!
//! let eti = analyser.analyse(&frame)?;
//! if let Some(lidata) = &eti.lidata {
//!     for stream in &lidata.header.stc {
//!         println!("SCID {} at {} kbit/s", stream.scid, stream.bitrate_kbps());
//!     }
//!     for fig in lidata.fic.iter().flat_map(|fic| fic.figs()) {
//!         if let Ok(decoded) = &fig.decoded {
//!             println!("{decoded}");
//!         }
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Frame processing.
///
/// 1. **Analysis** ([`process::analyse`]): Decodes frames in order and
///    drives every other stage.
/// 2. **Carousel** ([`process::carousel`]): Records which FIGs each FIB
///    carries and tallies them over a run.
/// 3. **Demultiplexing** ([`process::demux`]): Cuts the MST into streams
///    and feeds the selected ones to sinks.
pub mod process;

/// Data structures representing ETI(NI) components.
///
/// - **Sync** ([`structs::sync`]): ERR and FSYNC alternation
/// - **Header** ([`structs::header`]): FC, STC and EOH
/// - **FIBs** ([`structs::fib`]): FIG scan and FIB CRC
/// - **FIGs** ([`structs::fig`]): FIG types 0, 1, 2 and 5
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): CRC-16/CCITT
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
