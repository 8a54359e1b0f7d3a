#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("ERR byte signals an error condition. Read {0:#04X}, expected 0xFF")]
    ErrorIndicator(u8),

    #[error("Aborting because of SYNC error")]
    Aborted,

    #[error("Wrong FSYNC. Read {read:#08X}, expected {expected}")]
    WrongFsync { read: u32, expected: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("NST must not exceed 64. Read {0}")]
    TooManyStreams(u8),

    #[error("Header CRC mismatch. Calculated {calculated:#06X}, Read {read:#06X}")]
    HeaderCrcMismatch { calculated: u16, read: u16 },

    #[error("FL does not match the frame geometry. Declared {declared} words, computed {computed}")]
    FrameLengthMismatch { declared: u16, computed: u32 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FicError {
    #[error("FIB {fib} CRC mismatch. Calculated {calculated:#06X}, Read {read:#06X}")]
    FibCrcMismatch { fib: usize, calculated: u16, read: u16 },

    #[error("FIG at offset {offset} of FIB {fib} declares {length} bytes past the FIB data field")]
    FigOverrun {
        fib: usize,
        offset: usize,
        length: usize,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FigError {
    #[error("FIG {fig_type} payload is empty")]
    EmptyPayload { fig_type: u8 },

    #[error("FIG {fig_type}/{extension} truncated: {reason}")]
    Truncated {
        fig_type: u8,
        extension: u8,
        reason: String,
    },

    #[error("ETI contains unsupported FIG 6 (conditional access)")]
    ConditionalAccess,

    #[error("Unsupported FIG type {0}")]
    UnsupportedType(u8),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame must be {expected} bytes. Got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    #[error("Stream {stream} ends at byte {end}, past the {frame_len}-byte frame")]
    StreamOverrun {
        stream: usize,
        end: usize,
        frame_len: usize,
    },

    #[error("EOF/TIST at byte {offset} lies past the {frame_len}-byte frame")]
    TrailerOverrun { offset: usize, frame_len: usize },

    #[error("Frame CRC mismatch. Calculated {calculated:#06X}, Read {read:#06X}")]
    FrameCrcMismatch { calculated: u16, read: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("Could not identify stream type")]
    UnknownFormat,

    #[error("Declared frame size {0} exceeds the ETI(NI) frame size")]
    FrameTooLong(usize),

    #[error("ETI file read error: {0}")]
    Io(#[from] std::io::Error),
}
