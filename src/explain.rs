use serde::Serialize;
use std::fmt::Write;

use crate::error::Result;
use crate::gm;
use crate::midi::chunk::read_chunks;
use crate::midi::event::{ChannelMessage, EventKind, MetaEvent, TrackEvent, PITCH_BEND_CENTER};
use crate::midi::header::Header;
use crate::midi::reader::{MidiFile, ParseOptions};
use crate::pitch;

const GM_SYSTEM_ON: &[u8] = &[0x7E, 0x7F, 0x09, 0x01, 0xF7];
const GS_RESET: &[u8] = &[0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7];
const XG_SYSTEM_ON: &[u8] = &[0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];

#[derive(Debug, Clone, Copy)]
pub struct DumpOptions {
    pub hex_bytes_per_line: usize,
    pub max_payload_preview: usize,
    /// Only show events of this track
    pub track: Option<usize>,
    pub use_flats: bool,
    pub strict: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            hex_bytes_per_line: 8,
            max_payload_preview: 16,
            track: None,
            use_flats: false,
            strict: false,
        }
    }
}

/// A run of file bytes and what they mean
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpLine {
    pub offset: usize,
    pub bytes: Vec<u8>,
    /// Only a prefix of the bytes is shown
    pub truncated: bool,
    pub text: String,
}

impl DumpLine {
    fn new(offset: usize, bytes: &[u8], text: impl Into<String>) -> Self {
        Self {
            offset,
            bytes: bytes.to_vec(),
            truncated: false,
            text: text.into(),
        }
    }
}

/// Explain every chunk and event of a MIDI file, byte by byte
pub fn explain(data: &[u8], options: &DumpOptions) -> Result<Vec<DumpLine>> {
    let parse_options = ParseOptions {
        strict: options.strict,
    };
    let file = MidiFile::parse_with(data, &parse_options)?;
    let (chunks, _) = read_chunks(data, options.strict)?;
    let mut lines = Vec::new();

    for chunk in &chunks {
        let preamble_end = chunk.data_offset().min(data.len());
        let preamble = &data[chunk.offset..preamble_end];

        if chunk.is_header() {
            lines.push(DumpLine::new(
                chunk.offset,
                preamble,
                format!("Header chunk MThd, {} bytes", chunk.declared_length),
            ));
            explain_header(chunk.data, chunk.data_offset(), &file.header, &mut lines);
        } else if chunk.is_track() {
            let Some(track) = file.tracks.iter().find(|t| t.offset == chunk.offset) else {
                continue;
            };
            if options.track.is_some_and(|wanted| wanted != track.index) {
                continue;
            }
            lines.push(DumpLine::new(
                chunk.offset,
                preamble,
                format!("Track chunk {}, {} bytes", track.index, chunk.declared_length),
            ));
            for event in &track.events {
                lines.push(explain_event(event, options));
            }
            if track.trailing_bytes > 0 {
                let start = chunk.data_offset() + chunk.data.len() - track.trailing_bytes;
                let mut line = DumpLine::new(
                    start,
                    &data[start..start + track.trailing_bytes],
                    "Bytes after End of Track (ignored)",
                );
                cap_payload(&mut line, 0, options.max_payload_preview);
                lines.push(line);
            }
        } else {
            lines.push(DumpLine::new(
                chunk.offset,
                preamble,
                format!(
                    "Unknown chunk {}, {} bytes (skipped)",
                    chunk.kind_str(),
                    chunk.declared_length
                ),
            ));
        }
    }

    Ok(lines)
}

fn explain_header(data: &[u8], base: usize, header: &Header, lines: &mut Vec<DumpLine>) {
    if data.len() < 6 {
        return;
    }
    lines.push(DumpLine::new(
        base,
        &data[0..2],
        format!("  Format {}", header.format),
    ));
    lines.push(DumpLine::new(
        base + 2,
        &data[2..4],
        format!("  {} tracks", header.track_count),
    ));
    lines.push(DumpLine::new(
        base + 4,
        &data[4..6],
        format!("  Division: {}", header.division),
    ));
    if data.len() > 6 {
        lines.push(DumpLine::new(
            base + 6,
            &data[6..],
            "  Extra header bytes (ignored)",
        ));
    }
}

fn explain_event(event: &TrackEvent, options: &DumpOptions) -> DumpLine {
    let mut text = format!(
        "  +{:<6} tick {:>8}  {}",
        event.delta,
        event.tick,
        describe_event(&event.kind, options.use_flats)
    );
    if event.running_status {
        text.push_str(" [running status]");
    }

    let payload_len = match &event.kind {
        EventKind::Meta(meta) => meta_payload_len(meta, event),
        EventKind::SysEx { data } | EventKind::Escape { data } => data.len(),
        EventKind::Channel { .. } => 0,
    };

    let mut line = DumpLine::new(event.offset, &event.raw, text);
    cap_payload(&mut line, event.raw.len() - payload_len, options.max_payload_preview);
    line
}

fn meta_payload_len(meta: &MetaEvent, event: &TrackEvent) -> usize {
    match meta {
        MetaEvent::Text { .. } | MetaEvent::SequencerSpecific { .. } | MetaEvent::Unknown { .. } => {
            // Everything after FF, the type byte and the length
            let body = event.body();
            body.len().saturating_sub(2 + vlq_len(&body[2.min(body.len())..]))
        }
        _ => 0,
    }
}

fn vlq_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .position(|b| b & 0x80 == 0)
        .map(|i| i + 1)
        .unwrap_or(bytes.len())
}

/// Keep `head` bytes plus at most `preview` payload bytes
fn cap_payload(line: &mut DumpLine, head: usize, preview: usize) {
    let keep = head.saturating_add(preview);
    if line.bytes.len() > keep {
        line.bytes.truncate(keep);
        line.truncated = true;
    }
}

/// Human-readable description of an event
pub fn describe_event(kind: &EventKind, use_flats: bool) -> String {
    match kind {
        EventKind::Channel { channel, message } => {
            format!(
                "Ch {:>2} {}",
                channel + 1,
                describe_channel_message(*channel, message, use_flats)
            )
        }
        EventKind::Meta(meta) => format!("Meta {}", describe_meta(meta)),
        EventKind::SysEx { data } => {
            let mut text = format!("SysEx, {} bytes", data.len());
            if let Some(known) = known_sysex(data) {
                write!(text, " ({})", known).ok();
            }
            if data.last() != Some(&0xF7) {
                text.push_str(", continues in a later packet");
            }
            text
        }
        EventKind::Escape { data } => format!("Escape, {} raw bytes", data.len()),
    }
}

fn key_label(channel: u8, key: u8, use_flats: bool) -> String {
    let name = pitch::note_name(key, use_flats);
    match gm::percussion_name(key) {
        Some(drum) if channel == gm::PERCUSSION_CHANNEL => format!("{} ({})", drum, name),
        _ => name,
    }
}

fn describe_channel_message(channel: u8, message: &ChannelMessage, use_flats: bool) -> String {
    match *message {
        ChannelMessage::NoteOn { key, velocity: 0 } => format!(
            "Note On  {} velocity 0 (acts as Note Off)",
            key_label(channel, key, use_flats)
        ),
        ChannelMessage::NoteOn { key, velocity } => format!(
            "Note On  {} velocity {}",
            key_label(channel, key, use_flats),
            velocity
        ),
        ChannelMessage::NoteOff { key, velocity } => format!(
            "Note Off {} velocity {}",
            key_label(channel, key, use_flats),
            velocity
        ),
        ChannelMessage::PolyAftertouch { key, pressure } => format!(
            "Poly Aftertouch {} pressure {}",
            key_label(channel, key, use_flats),
            pressure
        ),
        ChannelMessage::ControlChange { controller, value } => match gm::controller_name(controller)
        {
            Some(name) => format!("Control Change {} ({}) = {}", controller, name, value),
            None => format!("Control Change {} = {}", controller, value),
        },
        ChannelMessage::ProgramChange { program } if channel == gm::PERCUSSION_CHANNEL => {
            format!("Program Change {} (drum kit)", program)
        }
        ChannelMessage::ProgramChange { program } => format!(
            "Program Change {} ({})",
            program,
            gm::program_name(program)
        ),
        ChannelMessage::ChannelAftertouch { pressure } => {
            format!("Channel Aftertouch {}", pressure)
        }
        ChannelMessage::PitchBend { value } => format!(
            "Pitch Bend {} ({:+})",
            value,
            i32::from(value) - i32::from(PITCH_BEND_CENTER)
        ),
    }
}

fn describe_meta(meta: &MetaEvent) -> String {
    match meta {
        MetaEvent::SequenceNumber { number: Some(n) } => format!("Sequence Number {}", n),
        MetaEvent::SequenceNumber { number: None } => "Sequence Number (track position)".into(),
        MetaEvent::Text { kind, text } => format!("{} {:?}", kind.label(), text),
        MetaEvent::ChannelPrefix { channel } => format!("Channel Prefix {}", channel + 1),
        MetaEvent::Port { port } => format!("MIDI Port {}", port),
        MetaEvent::EndOfTrack => "End of Track".into(),
        MetaEvent::Tempo { micros_per_quarter } => format!(
            "Tempo {} µs per quarter ({:.2} BPM)",
            micros_per_quarter,
            60_000_000.0 / f64::from((*micros_per_quarter).max(1))
        ),
        MetaEvent::SmpteOffset(o) => format!(
            "SMPTE Offset {:02}:{:02}:{:02}:{:02}.{:02}",
            o.hours & 0x1F,
            o.minutes,
            o.seconds,
            o.frames,
            o.fractional_frames
        ),
        MetaEvent::TimeSignature(sig) => format!(
            "Time Signature {}/{}, {} clocks per click, {} 32nds per quarter",
            sig.numerator,
            sig.denominator(),
            sig.clocks_per_click,
            sig.thirty_seconds_per_quarter
        ),
        MetaEvent::KeySignature(sig) => match pitch::key_signature_name(sig.sharps_flats, sig.minor)
        {
            Some(name) => format!("Key Signature {}", name),
            None => format!("Key Signature (invalid: {})", sig.sharps_flats),
        },
        MetaEvent::SequencerSpecific { data } => {
            format!("Sequencer Specific, {} bytes", data.len())
        }
        MetaEvent::Unknown { meta_type, data } => {
            format!("Unknown type {:#04x}, {} bytes", meta_type, data.len())
        }
    }
}

fn known_sysex(data: &[u8]) -> Option<&'static str> {
    if data == GM_SYSTEM_ON {
        Some("General MIDI System On")
    } else if data == GS_RESET {
        Some("Roland GS Reset")
    } else if data == XG_SYSTEM_ON {
        Some("Yamaha XG System On")
    } else {
        None
    }
}

/// Format dump lines as `offset  hex  description`
pub fn render(lines: &[DumpLine], hex_bytes_per_line: usize) -> String {
    let per_line = hex_bytes_per_line.max(1);
    let width = per_line * 3;
    let mut out = String::new();

    for line in lines {
        let rows: Vec<&[u8]> = if line.bytes.is_empty() {
            vec![&[]]
        } else {
            line.bytes.chunks(per_line).collect()
        };
        let last = rows.len() - 1;

        for (i, row) in rows.iter().enumerate() {
            let mut hex: String = row.iter().map(|b| format!("{:02X} ", b)).collect();
            if i == last && line.truncated {
                hex.push_str("...");
            }
            if i == 0 {
                writeln!(
                    out,
                    "{:08X}  {:<width$} {}",
                    line.offset,
                    hex,
                    line.text,
                    width = width
                )
                .ok();
            } else {
                writeln!(out, "{:8}  {}", "", hex.trim_end()).ok();
            }
        }
    }

    out
}
