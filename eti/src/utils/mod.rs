//! Utility functions and supporting infrastructure.
//!
//! Provides bit-level reading, CRC validation and the error types shared by
//! the frame and FIG parsers.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
