use serde::Serialize;

pub const PITCH_BEND_CENTER: u16 = 8192;

/// A channel voice message without its channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyAftertouch { key: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelAftertouch { pressure: u8 },
    /// 14-bit value, 8192 is centered
    PitchBend { value: u16 },
}

impl ChannelMessage {
    /// Number of data bytes following a status byte with the given high nibble
    pub fn data_len(status: u8) -> usize {
        match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        }
    }

    /// Build a message from its status byte and data bytes.
    /// `data` must hold `data_len(status)` bytes, each below 0x80.
    pub fn from_bytes(status: u8, data: &[u8]) -> Option<Self> {
        let d0 = *data.first()?;
        let d1 = data.get(1).copied().unwrap_or(0);

        let message = match status & 0xF0 {
            0x80 => ChannelMessage::NoteOff {
                key: d0,
                velocity: d1,
            },
            0x90 => ChannelMessage::NoteOn {
                key: d0,
                velocity: d1,
            },
            0xA0 => ChannelMessage::PolyAftertouch {
                key: d0,
                pressure: d1,
            },
            0xB0 => ChannelMessage::ControlChange {
                controller: d0,
                value: d1,
            },
            0xC0 => ChannelMessage::ProgramChange { program: d0 },
            0xD0 => ChannelMessage::ChannelAftertouch { pressure: d0 },
            0xE0 => ChannelMessage::PitchBend {
                value: u16::from(d0) | (u16::from(d1) << 7),
            },
            _ => return None,
        };
        Some(message)
    }

    pub fn status_nibble(&self) -> u8 {
        match self {
            ChannelMessage::NoteOff { .. } => 0x80,
            ChannelMessage::NoteOn { .. } => 0x90,
            ChannelMessage::PolyAftertouch { .. } => 0xA0,
            ChannelMessage::ControlChange { .. } => 0xB0,
            ChannelMessage::ProgramChange { .. } => 0xC0,
            ChannelMessage::ChannelAftertouch { .. } => 0xD0,
            ChannelMessage::PitchBend { .. } => 0xE0,
        }
    }

    /// Wire bytes for this message on `channel`, with the status byte
    pub fn to_bytes(&self, channel: u8) -> Vec<u8> {
        let status = self.status_nibble() | (channel & 0x0F);
        match *self {
            ChannelMessage::NoteOff { key, velocity } | ChannelMessage::NoteOn { key, velocity } => {
                vec![status, key, velocity]
            }
            ChannelMessage::PolyAftertouch { key, pressure } => vec![status, key, pressure],
            ChannelMessage::ControlChange { controller, value } => {
                vec![status, controller, value]
            }
            ChannelMessage::ProgramChange { program } => vec![status, program],
            ChannelMessage::ChannelAftertouch { pressure } => vec![status, pressure],
            ChannelMessage::PitchBend { value } => {
                vec![status, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
            }
        }
    }

    /// The key this message starts sounding, if any
    pub fn note_started(&self) -> Option<(u8, u8)> {
        match *self {
            ChannelMessage::NoteOn { key, velocity } if velocity > 0 => Some((key, velocity)),
            _ => None,
        }
    }

    /// The key this message releases, if any. Note On with velocity 0 counts.
    pub fn note_released(&self) -> Option<(u8, u8)> {
        match *self {
            ChannelMessage::NoteOff { key, velocity } => Some((key, velocity)),
            ChannelMessage::NoteOn { key, velocity: 0 } => Some((key, 0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
    ProgramName,
    DeviceName,
}

impl TextKind {
    pub fn from_meta_type(meta_type: u8) -> Option<Self> {
        Some(match meta_type {
            0x01 => TextKind::Text,
            0x02 => TextKind::Copyright,
            0x03 => TextKind::TrackName,
            0x04 => TextKind::InstrumentName,
            0x05 => TextKind::Lyric,
            0x06 => TextKind::Marker,
            0x07 => TextKind::CuePoint,
            0x08 => TextKind::ProgramName,
            0x09 => TextKind::DeviceName,
            _ => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TextKind::Text => "Text",
            TextKind::Copyright => "Copyright",
            TextKind::TrackName => "Track Name",
            TextKind::InstrumentName => "Instrument Name",
            TextKind::Lyric => "Lyric",
            TextKind::Marker => "Marker",
            TextKind::CuePoint => "Cue Point",
            TextKind::ProgramName => "Program Name",
            TextKind::DeviceName => "Device Name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub fractional_frames: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Power of two: 2 means a quarter note, 3 an eighth
    pub denominator_power: u8,
    pub clocks_per_click: u8,
    pub thirty_seconds_per_quarter: u8,
}

impl TimeSignature {
    pub fn denominator(&self) -> u32 {
        1u32.checked_shl(u32::from(self.denominator_power))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeySignature {
    /// Negative for flats, positive for sharps
    pub sharps_flats: i8,
    pub minor: bool,
}

/// A meta event (status 0xFF)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetaEvent {
    SequenceNumber { number: Option<u16> },
    Text { kind: TextKind, text: String },
    ChannelPrefix { channel: u8 },
    Port { port: u8 },
    EndOfTrack,
    /// Microseconds per quarter note
    Tempo { micros_per_quarter: u32 },
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    SequencerSpecific { data: Vec<u8> },
    Unknown { meta_type: u8, data: Vec<u8> },
}

impl MetaEvent {
    /// Interpret a meta payload. Payloads too short for their type
    /// come back as `Unknown` so nothing is silently lost.
    pub fn from_parts(meta_type: u8, data: &[u8]) -> Self {
        if let Some(kind) = TextKind::from_meta_type(meta_type) {
            return MetaEvent::Text {
                kind,
                text: String::from_utf8_lossy(data).into_owned(),
            };
        }

        match (meta_type, data) {
            (0x00, []) => MetaEvent::SequenceNumber { number: None },
            (0x00, [hi, lo, ..]) => MetaEvent::SequenceNumber {
                number: Some(u16::from_be_bytes([*hi, *lo])),
            },
            (0x20, [channel, ..]) => MetaEvent::ChannelPrefix {
                channel: channel & 0x0F,
            },
            (0x21, [port, ..]) => MetaEvent::Port { port: *port },
            (0x2F, _) => MetaEvent::EndOfTrack,
            (0x51, [a, b, c, ..]) => MetaEvent::Tempo {
                micros_per_quarter: u32::from_be_bytes([0, *a, *b, *c]),
            },
            (0x54, [hours, minutes, seconds, frames, fractional_frames, ..]) => {
                MetaEvent::SmpteOffset(SmpteOffset {
                    hours: *hours,
                    minutes: *minutes,
                    seconds: *seconds,
                    frames: *frames,
                    fractional_frames: *fractional_frames,
                })
            }
            (0x58, [numerator, denominator_power, clocks_per_click, thirty_seconds, ..]) => {
                MetaEvent::TimeSignature(TimeSignature {
                    numerator: *numerator,
                    denominator_power: *denominator_power,
                    clocks_per_click: *clocks_per_click,
                    thirty_seconds_per_quarter: *thirty_seconds,
                })
            }
            (0x59, [sharps_flats, mode, ..]) => MetaEvent::KeySignature(KeySignature {
                sharps_flats: *sharps_flats as i8,
                minor: *mode == 1,
            }),
            (0x7F, _) => MetaEvent::SequencerSpecific {
                data: data.to_vec(),
            },
            _ => MetaEvent::Unknown {
                meta_type,
                data: data.to_vec(),
            },
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(self, MetaEvent::EndOfTrack)
    }
}

/// What an event in a track does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum EventKind {
    Channel {
        channel: u8,
        message: ChannelMessage,
    },
    Meta(MetaEvent),
    /// `F0` system exclusive; `data` excludes the F0 byte
    SysEx { data: Vec<u8> },
    /// `F7` escape: arbitrary bytes sent as-is
    Escape { data: Vec<u8> },
}

/// One decoded event together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackEvent {
    /// Absolute file offset of the delta-time bytes
    pub offset: usize,
    pub delta: u32,
    /// Absolute tick within the track
    pub tick: u64,
    pub kind: EventKind,
    /// The status byte was omitted and inherited from the previous event
    pub running_status: bool,
    /// Number of bytes the delta time took
    pub delta_len: usize,
    /// Raw bytes of the event including the delta time
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl TrackEvent {
    /// Raw bytes after the delta time
    pub fn body(&self) -> &[u8] {
        &self.raw[self.delta_len.min(self.raw.len())..]
    }

    pub fn channel_message(&self) -> Option<(u8, &ChannelMessage)> {
        match &self.kind {
            EventKind::Channel { channel, message } => Some((*channel, message)),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&MetaEvent> {
        match &self.kind {
            EventKind::Meta(meta) => Some(meta),
            _ => None,
        }
    }
}
