//! SYNC field of an ETI(NI) frame.
//!
//! ## Layout
//!
//! - **ERR** (byte 0): error indicator, `0xFF` when the frame carries no error.
//! - **FSYNC** (bytes 1..4): frame synchronization word. Consecutive frames
//!   alternate between [`FSYNC0`] and [`FSYNC1`].

use std::fmt::{Display, Formatter};

use log::{trace, warn};

use crate::utils::errors::SyncError;

/// ERR value of a frame without error.
pub const ERR_NONE: u8 = 0xFF;

/// FSYNC of even frames.
pub const FSYNC0: u32 = 0x07_3A_B6;

/// FSYNC of odd frames.
pub const FSYNC1: u32 = 0xF8_C5_49;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncStatus {
    Ok,
    Wrong,
}

impl Display for FsyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FsyncStatus::Ok => f.write_str("OK"),
            FsyncStatus::Wrong => f.write_str("Wrong FSYNC"),
        }
    }
}

/// Decoded SYNC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncField {
    pub err: u8,
    pub fsync: u32,
    pub fsync_status: FsyncStatus,
}

impl SyncField {
    pub fn has_error(&self) -> bool {
        self.err != ERR_NONE
    }

    pub fn err_description(&self) -> &'static str {
        if self.has_error() { "Error" } else { "No error" }
    }
}

/// Tracks FSYNC alternation across frames.
#[derive(Debug, Default, Clone)]
pub struct FrameSynchronizer {
    previous: Option<u32>,
}

impl FrameSynchronizer {
    /// Decodes the SYNC field of `frame` and updates the alternation state.
    ///
    /// A non-alternating or unrecognized FSYNC resets the state to unknown,
    /// so the following frame may re-acquire with either word.
    pub fn check(&mut self, frame: &[u8; 4]) -> SyncField {
        let err = frame[0];
        let fsync = u32::from_be_bytes([0, frame[1], frame[2], frame[3]]);

        let expected = match self.previous {
            None => None,
            Some(FSYNC0) => Some(FSYNC1),
            Some(_) => Some(FSYNC0),
        };

        let acceptable = match expected {
            None => fsync == FSYNC0 || fsync == FSYNC1,
            Some(word) => fsync == word,
        };

        let fsync_status = if acceptable {
            trace!("FSYNC {fsync:#08X} OK");
            self.previous = Some(fsync);
            FsyncStatus::Ok
        } else {
            let error = SyncError::WrongFsync {
                read: fsync,
                expected: match expected {
                    Some(word) => format!("{word:#08X}"),
                    None => format!("{FSYNC0:#08X} or {FSYNC1:#08X}"),
                },
            };
            warn!("{error}");
            self.previous = None;
            FsyncStatus::Wrong
        };

        SyncField {
            err,
            fsync,
            fsync_status,
        }
    }

    /// Last accepted FSYNC word, `None` while unsynchronized.
    pub fn previous(&self) -> Option<u32> {
        self.previous
    }
}
