use log::warn;
use serde::Serialize;
use std::fmt;

use crate::error::{MidiError, Result};
use crate::midi::chunk::Chunk;
use crate::midi::cursor::ByteCursor;

const HEADER_DATA_LEN: u32 = 6;

/// SMF file format from the header chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    /// Format 0: one multi-channel track
    SingleTrack,
    /// Format 1: simultaneous tracks sharing one tempo map
    MultiTrack,
    /// Format 2: independent single-track patterns
    MultiSong,
}

impl Format {
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Format::SingleTrack),
            1 => Ok(Format::MultiTrack),
            2 => Ok(Format::MultiSong),
            other => Err(MidiError::UnknownFormat(other)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::MultiTrack => 1,
            Format::MultiSong => 2,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Format::SingleTrack => "single track",
            Format::MultiTrack => "multiple simultaneous tracks",
            Format::MultiSong => "multiple independent songs",
        };
        write!(f, "{} ({})", self.as_u16(), label)
    }
}

/// Meaning of a delta-time tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Division {
    /// Ticks per quarter note; real time depends on the tempo map
    Metrical { ticks_per_quarter: u16 },
    /// Absolute time: frames per second and ticks per frame.
    /// A `frames_per_second` of 29 means 29.97 drop-frame.
    Timecode {
        frames_per_second: u8,
        ticks_per_frame: u8,
    },
}

impl Division {
    pub fn from_u16(raw: u16) -> Result<Self> {
        if raw & 0x8000 == 0 {
            if raw == 0 {
                return Err(MidiError::InvalidDivision);
            }
            return Ok(Division::Metrical {
                ticks_per_quarter: raw,
            });
        }

        // High byte holds the negated frame rate in two's complement
        let fps = ((raw >> 8) as u8 as i8).unsigned_abs();
        match fps {
            24 | 25 | 29 | 30 => Ok(Division::Timecode {
                frames_per_second: fps,
                ticks_per_frame: (raw & 0xFF) as u8,
            }),
            other => Err(MidiError::InvalidTimecode(other)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Division::Metrical { ticks_per_quarter } => ticks_per_quarter & 0x7FFF,
            Division::Timecode {
                frames_per_second,
                ticks_per_frame,
            } => {
                let high = (-(frames_per_second as i8)) as u8;
                (u16::from(high) << 8) | u16::from(ticks_per_frame)
            }
        }
    }

    /// Frame rate as a real number (29 becomes 29.97)
    pub fn frames_per_second_exact(fps: u8) -> f64 {
        if fps == 29 {
            29.97
        } else {
            f64::from(fps)
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Division::Metrical { ticks_per_quarter } => {
                write!(f, "{} ticks per quarter note", ticks_per_quarter)
            }
            Division::Timecode {
                frames_per_second,
                ticks_per_frame,
            } => write!(
                f,
                "SMPTE {} fps, {} ticks per frame",
                Division::frames_per_second_exact(*frames_per_second),
                ticks_per_frame
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub format: Format,
    pub track_count: u16,
    pub division: Division,
}

impl Header {
    /// Decode an `MThd` chunk. Non-fatal oddities are appended to `warnings`.
    pub fn parse(chunk: &Chunk<'_>, strict: bool, warnings: &mut Vec<String>) -> Result<Self> {
        if !chunk.is_header() {
            return Err(MidiError::UnexpectedChunk {
                offset: chunk.offset,
                expected: "MThd",
                found: chunk.kind_str(),
            });
        }
        if chunk.declared_length < HEADER_DATA_LEN {
            return Err(MidiError::BadHeaderLength(chunk.declared_length));
        }

        let mut cursor = ByteCursor::new(chunk.data, chunk.data_offset());
        let format = Format::from_u16(cursor.read_u16_be("header format")?)?;
        let track_count = cursor.read_u16_be("header track count")?;
        let division = Division::from_u16(cursor.read_u16_be("header division")?)?;

        if chunk.declared_length > HEADER_DATA_LEN {
            let message = format!(
                "header chunk is {} bytes long, ignoring {} extra bytes",
                chunk.declared_length,
                chunk.declared_length - HEADER_DATA_LEN
            );
            warn!("{}", message);
            warnings.push(message);
        }

        if format == Format::SingleTrack && track_count != 1 {
            if strict {
                return Err(MidiError::FormatTrackMismatch(track_count));
            }
            let message = format!("format 0 file declares {} tracks", track_count);
            warn!("{}", message);
            warnings.push(message);
        }

        Ok(Self {
            format,
            track_count,
            division,
        })
    }
}
