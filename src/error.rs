use thiserror::Error;

/// Errors raised while decoding or encoding Standard MIDI File bytes.
///
/// Offsets are absolute positions in the input file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MidiError {
    #[error("unexpected end of data at offset {offset:#06x} while reading {context}")]
    UnexpectedEof { offset: usize, context: &'static str },

    #[error("expected {expected} chunk at offset {offset:#06x}, found {found:?}")]
    UnexpectedChunk {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    #[error("chunk {kind:?} at offset {offset:#06x} declares {declared} bytes but only {available} remain")]
    TruncatedChunk {
        offset: usize,
        kind: String,
        declared: u32,
        available: usize,
    },

    #[error("header chunk length must be at least 6, found {0}")]
    BadHeaderLength(u32),

    #[error("unknown file format {0}")]
    UnknownFormat(u16),

    #[error("metrical division of zero ticks per quarter note")]
    InvalidDivision,

    #[error("invalid SMPTE frame rate {0}")]
    InvalidTimecode(u8),

    #[error("format 0 file declares {0} tracks")]
    FormatTrackMismatch(u16),

    #[error("header declares {declared} tracks but {found} track chunks were found")]
    TrackCountMismatch { declared: u16, found: usize },

    #[error("variable-length quantity at offset {offset:#06x} is longer than four bytes")]
    VlqOverflow { offset: usize },

    #[error("value {0:#x} does not fit in a variable-length quantity")]
    VlqTooLarge(u32),

    #[error("data byte {byte:#04x} at offset {offset:#06x} with no running status")]
    MissingStatus { offset: usize, byte: u8 },

    #[error("status byte {byte:#04x} at offset {offset:#06x} is not allowed in a MIDI file")]
    InvalidStatus { offset: usize, byte: u8 },

    #[error("data byte {byte:#04x} at offset {offset:#06x} has its high bit set")]
    InvalidDataByte { offset: usize, byte: u8 },

    #[error("track {track} has no End of Track event")]
    MissingEndOfTrack { track: usize },
}

pub type Result<T> = std::result::Result<T, MidiError>;
