use log::{debug, warn};
use serde::Serialize;

use crate::error::{MidiError, Result};
use crate::midi::cursor::ByteCursor;

pub const HEADER_CHUNK: [u8; 4] = *b"MThd";
pub const TRACK_CHUNK: [u8; 4] = *b"MTrk";

const CHUNK_PREAMBLE_LEN: usize = 8;

/// One `type + length + data` unit of a MIDI file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    /// Absolute offset of the chunk type bytes
    pub offset: usize,
    /// Length as declared in the file
    pub declared_length: u32,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn kind_str(&self) -> String {
        kind_to_string(&self.kind)
    }

    pub fn is_header(&self) -> bool {
        self.kind == HEADER_CHUNK
    }

    pub fn is_track(&self) -> bool {
        self.kind == TRACK_CHUNK
    }

    /// Absolute offset of the first data byte
    pub fn data_offset(&self) -> usize {
        self.offset + CHUNK_PREAMBLE_LEN
    }

    pub fn info(&self) -> ChunkInfo {
        ChunkInfo {
            kind: self.kind_str(),
            offset: self.offset,
            length: self.declared_length,
        }
    }
}

/// Owned description of a chunk, used for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub kind: String,
    pub offset: usize,
    pub length: u32,
}

pub(crate) fn kind_to_string(kind: &[u8]) -> String {
    kind.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Strip an RMID (RIFF) wrapper if present.
///
/// Returns the embedded SMF bytes and their absolute offset in `data`.
pub fn unwrap_riff(data: &[u8]) -> (&[u8], usize) {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"RMID" {
        return (data, 0);
    }

    let mut pos = 12;
    while pos + CHUNK_PREAMBLE_LEN <= data.len() {
        let id = &data[pos..pos + 4];
        let size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let start = pos + CHUNK_PREAMBLE_LEN;
        let end = start.saturating_add(size).min(data.len());

        if id == b"data" {
            debug!("Unwrapped RMID container, SMF data at offset {:#06x}", start);
            return (&data[start..end], start);
        }

        // RIFF sub-chunks are padded to an even length
        pos = end + (size & 1);
    }

    warn!("RIFF RMID container without a data chunk");
    (data, 0)
}

/// Split a MIDI file into its chunks.
///
/// In lenient mode a chunk whose declared length overruns the file is clamped
/// and a warning is pushed onto the returned list.
pub fn read_chunks(data: &[u8], strict: bool) -> Result<(Vec<Chunk<'_>>, Vec<String>)> {
    let (smf, base) = unwrap_riff(data);
    let mut cursor = ByteCursor::new(smf, base);
    let mut chunks = Vec::new();
    let mut warnings = Vec::new();

    while !cursor.is_empty() {
        let offset = cursor.position();

        if cursor.remaining() < CHUNK_PREAMBLE_LEN {
            let message = format!(
                "{} stray bytes at offset {:#06x} after the last chunk",
                cursor.remaining(),
                offset
            );
            if strict {
                return Err(MidiError::UnexpectedEof {
                    offset,
                    context: "chunk preamble",
                });
            }
            warn!("{}", message);
            warnings.push(message);
            break;
        }

        let kind_bytes = cursor.read_bytes(4, "chunk type")?;
        let kind = [kind_bytes[0], kind_bytes[1], kind_bytes[2], kind_bytes[3]];
        let declared_length = cursor.read_u32_be("chunk length")?;

        let available = cursor.remaining();
        let length = if declared_length as usize > available {
            if strict {
                return Err(MidiError::TruncatedChunk {
                    offset,
                    kind: kind_to_string(&kind),
                    declared: declared_length,
                    available,
                });
            }
            let message = format!(
                "chunk {} at offset {:#06x} declares {} bytes but only {} remain, clamping",
                kind_to_string(&kind),
                offset,
                declared_length,
                available
            );
            warn!("{}", message);
            warnings.push(message);
            available
        } else {
            declared_length as usize
        };

        let chunk_data = cursor.read_bytes(length, "chunk data")?;
        debug!(
            "Chunk {} at {:#06x}, {} bytes",
            kind_to_string(&kind),
            offset,
            length
        );

        chunks.push(Chunk {
            kind,
            offset,
            declared_length,
            data: chunk_data,
        });
    }

    Ok((chunks, warnings))
}
