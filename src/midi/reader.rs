use anyhow::Context;
use log::{debug, info, warn};
use std::path::Path;

use crate::error::{MidiError, Result};
use crate::midi::chunk::{read_chunks, Chunk, ChunkInfo};
use crate::midi::cursor::ByteCursor;
use crate::midi::event::{ChannelMessage, EventKind, MetaEvent, TextKind, TrackEvent};
use crate::midi::header::Header;

const META_STATUS: u8 = 0xFF;
const SYSEX_STATUS: u8 = 0xF0;
const ESCAPE_STATUS: u8 = 0xF7;

/// How forgiving the reader is about malformed files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject anything the SMF format does not allow instead of recovering
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// A decoded `MTrk` chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub index: usize,
    /// Absolute offset of the chunk type bytes
    pub offset: usize,
    pub length: u32,
    pub events: Vec<TrackEvent>,
    pub has_end_of_track: bool,
    /// Bytes left in the chunk after End of Track
    pub trailing_bytes: usize,
}

impl Track {
    /// Absolute tick of the last event
    pub fn end_tick(&self) -> u64 {
        self.events.last().map(|e| e.tick).unwrap_or(0)
    }

    /// First Track Name meta event, if any
    pub fn name(&self) -> Option<&str> {
        self.first_text(TextKind::TrackName)
    }

    pub fn instrument_name(&self) -> Option<&str> {
        self.first_text(TextKind::InstrumentName)
    }

    fn first_text(&self, wanted: TextKind) -> Option<&str> {
        self.events.iter().find_map(|e| match &e.kind {
            EventKind::Meta(MetaEvent::Text { kind, text }) if *kind == wanted => {
                Some(text.as_str())
            }
            _ => None,
        })
    }
}

/// A fully parsed Standard MIDI File
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    pub header: Header,
    pub tracks: Vec<Track>,
    /// Chunks that are neither `MThd` nor `MTrk`
    pub unknown_chunks: Vec<ChunkInfo>,
    /// Problems recovered from in lenient mode
    pub warnings: Vec<String>,
}

impl MidiFile {
    /// Parse with lenient options
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &ParseOptions::default())
    }

    pub fn parse_with(data: &[u8], options: &ParseOptions) -> Result<Self> {
        let (chunks, mut warnings) = read_chunks(data, options.strict)?;

        let first = chunks.first().ok_or(MidiError::UnexpectedEof {
            offset: 0,
            context: "header chunk",
        })?;
        let header = Header::parse(first, options.strict, &mut warnings)?;
        debug!(
            "Header: format {}, {} tracks, {}",
            header.format, header.track_count, header.division
        );

        let mut tracks = Vec::new();
        let mut unknown_chunks = Vec::new();

        for chunk in chunks.iter().skip(1) {
            if chunk.is_track() {
                let track = parse_track(chunk, tracks.len(), options, &mut warnings)?;
                tracks.push(track);
            } else {
                let message = format!(
                    "skipping unknown chunk {} at offset {:#06x}",
                    chunk.kind_str(),
                    chunk.offset
                );
                debug!("{}", message);
                unknown_chunks.push(chunk.info());
            }
        }

        if tracks.len() != usize::from(header.track_count) {
            if options.strict {
                return Err(MidiError::TrackCountMismatch {
                    declared: header.track_count,
                    found: tracks.len(),
                });
            }
            let message = format!(
                "header declares {} tracks but {} track chunks were found",
                header.track_count,
                tracks.len()
            );
            warn!("{}", message);
            warnings.push(message);
        }

        Ok(Self {
            header,
            tracks,
            unknown_chunks,
            warnings,
        })
    }

    /// Read and parse a file from disk
    pub fn open<P: AsRef<Path>>(path: P, options: &ParseOptions) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file = Self::parse_with(&data, options)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(
            "Loaded {:?}: {} tracks, {} events",
            path,
            file.tracks.len(),
            file.event_count()
        );
        Ok(file)
    }

    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }

    /// Absolute tick of the last event in any track
    pub fn end_tick(&self) -> u64 {
        self.tracks.iter().map(Track::end_tick).max().unwrap_or(0)
    }
}

/// Decode the events of one `MTrk` chunk
fn parse_track(
    chunk: &Chunk<'_>,
    index: usize,
    options: &ParseOptions,
    warnings: &mut Vec<String>,
) -> Result<Track> {
    let mut cursor = ByteCursor::new(chunk.data, chunk.data_offset());
    let mut events = Vec::new();
    let mut running_status: Option<u8> = None;
    let mut tick: u64 = 0;
    let mut has_end_of_track = false;

    while !cursor.is_empty() {
        let offset = cursor.position();
        let delta = cursor.read_vlq()?;
        let delta_len = cursor.position() - offset;
        tick += u64::from(delta);

        let status_offset = cursor.position();
        let first = cursor.read_u8("event status")?;

        let (kind, used_running_status) = match first {
            META_STATUS => {
                running_status = None;
                let meta_type = cursor.read_u8("meta event type")?;
                let len = cursor.read_vlq()? as usize;
                let data = cursor.read_bytes(len, "meta event data")?;
                (EventKind::Meta(MetaEvent::from_parts(meta_type, data)), false)
            }
            SYSEX_STATUS | ESCAPE_STATUS => {
                running_status = None;
                let len = cursor.read_vlq()? as usize;
                let data = cursor.read_bytes(len, "system exclusive data")?.to_vec();
                let kind = if first == SYSEX_STATUS {
                    EventKind::SysEx { data }
                } else {
                    EventKind::Escape { data }
                };
                (kind, false)
            }
            0xF1..=0xFE => {
                return Err(MidiError::InvalidStatus {
                    offset: status_offset,
                    byte: first,
                });
            }
            0x80..=0xEF => {
                running_status = Some(first);
                let kind = read_channel_message(&mut cursor, first, None, options, warnings)?;
                (kind, false)
            }
            data_byte => {
                let status = running_status.ok_or(MidiError::MissingStatus {
                    offset: status_offset,
                    byte: data_byte,
                })?;
                let kind = read_channel_message(
                    &mut cursor,
                    status,
                    Some((status_offset, data_byte)),
                    options,
                    warnings,
                )?;
                (kind, true)
            }
        };

        let end_of_track = matches!(kind, EventKind::Meta(MetaEvent::EndOfTrack));
        events.push(TrackEvent {
            offset,
            delta,
            tick,
            kind,
            running_status: used_running_status,
            delta_len,
            raw: cursor.slice_from(offset).to_vec(),
        });

        if end_of_track {
            has_end_of_track = true;
            break;
        }
    }

    let trailing_bytes = cursor.remaining();
    if trailing_bytes > 0 {
        let message = format!(
            "track {} has {} bytes after End of Track",
            index, trailing_bytes
        );
        warn!("{}", message);
        warnings.push(message);
    }

    if !has_end_of_track {
        if options.strict {
            return Err(MidiError::MissingEndOfTrack { track: index });
        }
        let message = format!("track {} has no End of Track event", index);
        warn!("{}", message);
        warnings.push(message);
    }

    debug!(
        "Track {} at {:#06x}: {} events, {} ticks",
        index,
        chunk.offset,
        events.len(),
        tick
    );

    Ok(Track {
        index,
        offset: chunk.offset,
        length: chunk.declared_length,
        events,
        has_end_of_track,
        trailing_bytes,
    })
}

/// Read the data bytes of a channel message.
///
/// With running status the first data byte has already been consumed and is
/// passed in as `first_data`.
fn read_channel_message(
    cursor: &mut ByteCursor<'_>,
    status: u8,
    first_data: Option<(usize, u8)>,
    options: &ParseOptions,
    warnings: &mut Vec<String>,
) -> Result<EventKind> {
    let needed = ChannelMessage::data_len(status);
    let mut data = [0u8; 2];

    for (i, slot) in data.iter_mut().enumerate().take(needed) {
        let (offset, byte) = match (i, first_data) {
            (0, Some(already_read)) => already_read,
            _ => (cursor.position(), cursor.read_u8("channel message data")?),
        };

        *slot = if byte & 0x80 != 0 {
            if options.strict {
                return Err(MidiError::InvalidDataByte { offset, byte });
            }
            let message = format!(
                "data byte {:#04x} at offset {:#06x} has its high bit set, masking",
                byte, offset
            );
            warn!("{}", message);
            warnings.push(message);
            byte & 0x7F
        } else {
            byte
        };
    }

    let message = ChannelMessage::from_bytes(status, &data[..needed]).ok_or(
        MidiError::InvalidStatus {
            offset: cursor.position(),
            byte: status,
        },
    )?;

    Ok(EventKind::Channel {
        channel: status & 0x0F,
        message,
    })
}
