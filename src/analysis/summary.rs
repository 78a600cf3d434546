use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::notes::{extract_notes, NoteOptions};
use crate::analysis::tempo::TempoMap;
use crate::gm;
use crate::midi::chunk::ChunkInfo;
use crate::midi::event::{ChannelMessage, EventKind, MetaEvent};
use crate::midi::header::{Division, Format};
use crate::midi::reader::{MidiFile, Track};
use crate::pitch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSignatureAt {
    pub tick: u64,
    pub track: usize,
    pub numerator: u8,
    pub denominator: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySignatureAt {
    pub tick: u64,
    pub track: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramUse {
    pub channel: u8,
    pub program: u8,
    pub name: String,
}

/// Event counts grouped by category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub total: usize,
    pub channel: usize,
    pub meta: usize,
    pub sysex: usize,
    pub note_on: usize,
    pub note_off: usize,
    pub control_change: usize,
    pub program_change: usize,
    pub pitch_bend: usize,
    pub aftertouch: usize,
    pub running_status: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub index: usize,
    pub name: Option<String>,
    pub instrument: Option<String>,
    pub offset: usize,
    pub length: u32,
    pub events: EventCounts,
    pub channels: Vec<u8>,
    pub programs: Vec<ProgramUse>,
    pub note_count: usize,
    pub lowest_note: Option<String>,
    pub highest_note: Option<String>,
    pub end_tick: u64,
    pub has_end_of_track: bool,
}

/// Overview of a whole file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub format: Format,
    pub division: Division,
    pub declared_tracks: u16,
    pub tracks_found: usize,
    pub duration_ticks: u64,
    pub duration_seconds: f64,
    pub initial_bpm: f64,
    pub tempo_changes: usize,
    pub time_signatures: Vec<TimeSignatureAt>,
    pub key_signatures: Vec<KeySignatureAt>,
    pub unknown_chunks: Vec<ChunkInfo>,
    pub warnings: Vec<String>,
    pub tracks: Vec<TrackSummary>,
}

impl FileSummary {
    pub fn from_file(file: &MidiFile, options: NoteOptions) -> Self {
        let tempo = TempoMap::from_file(file);
        let duration_ticks = file.end_tick();

        let duration_seconds = if file.header.format == Format::MultiSong {
            // Songs play one after another
            file.tracks
                .iter()
                .map(|t| TempoMap::for_track(t, file.header.division).ticks_to_seconds(t.end_tick()))
                .sum()
        } else {
            tempo.ticks_to_seconds(duration_ticks)
        };

        let mut time_signatures = Vec::new();
        let mut key_signatures = Vec::new();
        for track in &file.tracks {
            for event in &track.events {
                match &event.kind {
                    EventKind::Meta(MetaEvent::TimeSignature(sig)) => {
                        time_signatures.push(TimeSignatureAt {
                            tick: event.tick,
                            track: track.index,
                            numerator: sig.numerator,
                            denominator: sig.denominator(),
                        })
                    }
                    EventKind::Meta(MetaEvent::KeySignature(sig)) => {
                        key_signatures.push(KeySignatureAt {
                            tick: event.tick,
                            track: track.index,
                            name: pitch::key_signature_name(sig.sharps_flats, sig.minor)
                                .unwrap_or_else(|| format!("invalid ({})", sig.sharps_flats)),
                        })
                    }
                    _ => {}
                }
            }
        }
        time_signatures.sort_by_key(|s| (s.tick, s.track));
        key_signatures.sort_by_key(|s| (s.tick, s.track));

        let tracks = file
            .tracks
            .iter()
            .map(|track| {
                let track_tempo = if file.header.format == Format::MultiSong {
                    TempoMap::for_track(track, file.header.division)
                } else {
                    tempo.clone()
                };
                summarize_track(track, &track_tempo, options)
            })
            .collect();

        Self {
            format: file.header.format,
            division: file.header.division,
            declared_tracks: file.header.track_count,
            tracks_found: file.tracks.len(),
            duration_ticks,
            duration_seconds,
            initial_bpm: tempo.bpm_at(0),
            tempo_changes: tempo.change_count(),
            time_signatures,
            key_signatures,
            unknown_chunks: file.unknown_chunks.clone(),
            warnings: file.warnings.clone(),
            tracks,
        }
    }
}

fn summarize_track(track: &Track, tempo: &TempoMap, options: NoteOptions) -> TrackSummary {
    let mut counts = EventCounts::default();
    let mut channels = BTreeSet::new();
    let mut programs = Vec::new();

    for event in &track.events {
        counts.total += 1;
        if event.running_status {
            counts.running_status += 1;
        }
        match &event.kind {
            EventKind::Channel { channel, message } => {
                counts.channel += 1;
                channels.insert(channel + 1);
                match message {
                    ChannelMessage::NoteOn { velocity, .. } if *velocity > 0 => {
                        counts.note_on += 1
                    }
                    ChannelMessage::NoteOn { .. } | ChannelMessage::NoteOff { .. } => {
                        counts.note_off += 1
                    }
                    ChannelMessage::ControlChange { .. } => counts.control_change += 1,
                    ChannelMessage::ProgramChange { program } => {
                        counts.program_change += 1;
                        let name = if *channel == gm::PERCUSSION_CHANNEL {
                            "Percussion".to_string()
                        } else {
                            gm::program_name(*program).to_string()
                        };
                        let entry = ProgramUse {
                            channel: channel + 1,
                            program: *program,
                            name,
                        };
                        if !programs.contains(&entry) {
                            programs.push(entry);
                        }
                    }
                    ChannelMessage::PitchBend { .. } => counts.pitch_bend += 1,
                    ChannelMessage::PolyAftertouch { .. }
                    | ChannelMessage::ChannelAftertouch { .. } => counts.aftertouch += 1,
                }
            }
            EventKind::Meta(_) => counts.meta += 1,
            EventKind::SysEx { .. } | EventKind::Escape { .. } => counts.sysex += 1,
        }
    }

    let notes = extract_notes(track, tempo, options).notes;
    let lowest = notes.iter().map(|n| n.key).min();
    let highest = notes.iter().map(|n| n.key).max();

    TrackSummary {
        index: track.index,
        name: track.name().map(str::to_string),
        instrument: track.instrument_name().map(str::to_string),
        offset: track.offset,
        length: track.length,
        events: counts,
        channels: channels.into_iter().collect(),
        programs,
        note_count: notes.len(),
        lowest_note: lowest.map(|k| pitch::note_name(k, options.use_flats)),
        highest_note: highest.map(|k| pitch::note_name(k, options.use_flats)),
        end_tick: track.end_tick(),
        has_end_of_track: track.has_end_of_track,
    }
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Format:      {}", self.format)?;
        writeln!(f, "Division:    {}", self.division)?;
        writeln!(
            f,
            "Tracks:      {} declared, {} found",
            self.declared_tracks, self.tracks_found
        )?;
        writeln!(
            f,
            "Duration:    {:.3} s ({} ticks)",
            self.duration_seconds, self.duration_ticks
        )?;
        writeln!(
            f,
            "Tempo:       {:.2} BPM initially, {} changes",
            self.initial_bpm, self.tempo_changes
        )?;
        for sig in &self.time_signatures {
            writeln!(
                f,
                "Time sig:    {}/{} at tick {}",
                sig.numerator, sig.denominator, sig.tick
            )?;
        }
        for sig in &self.key_signatures {
            writeln!(f, "Key sig:     {} at tick {}", sig.name, sig.tick)?;
        }
        for chunk in &self.unknown_chunks {
            writeln!(
                f,
                "Unknown chunk {} at {:#06x} ({} bytes)",
                chunk.kind, chunk.offset, chunk.length
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "Warning:     {}", warning)?;
        }

        for track in &self.tracks {
            writeln!(f)?;
            writeln!(
                f,
                "Track {} \"{}\" at {:#06x} ({} bytes)",
                track.index,
                track.name.as_deref().unwrap_or(""),
                track.offset,
                track.length
            )?;
            if let Some(instrument) = &track.instrument {
                writeln!(f, "  Instrument: {}", instrument)?;
            }
            writeln!(
                f,
                "  Events:     {} ({} channel, {} meta, {} sysex, {} using running status)",
                track.events.total,
                track.events.channel,
                track.events.meta,
                track.events.sysex,
                track.events.running_status
            )?;
            if !track.channels.is_empty() {
                let channels: Vec<String> = track.channels.iter().map(|c| c.to_string()).collect();
                writeln!(f, "  Channels:   {}", channels.join(", "))?;
            }
            for program in &track.programs {
                writeln!(
                    f,
                    "  Program:    {} on channel {} ({})",
                    program.program, program.channel, program.name
                )?;
            }
            if let (Some(low), Some(high)) = (&track.lowest_note, &track.highest_note) {
                writeln!(f, "  Notes:      {} ({} to {})", track.note_count, low, high)?;
            }
            if !track.has_end_of_track {
                writeln!(f, "  Missing End of Track")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::writer::demo_scale;
    use approx::assert_relative_eq;

    #[test]
    fn test_summary_of_demo_scale() {
        let bytes = demo_scale(60, 120.0).unwrap().to_bytes().unwrap();
        let file = MidiFile::parse(&bytes).unwrap();
        let summary = FileSummary::from_file(&file, NoteOptions::default());

        assert_eq!(summary.format, Format::SingleTrack);
        assert_eq!(summary.tracks_found, 1);
        assert_relative_eq!(summary.initial_bpm, 120.0);
        assert_eq!(summary.tempo_changes, 0);
        // 8 quarter notes plus a half-note chord
        assert_eq!(summary.duration_ticks, 480 * 10);
        assert_relative_eq!(summary.duration_seconds, 5.0);
        assert_eq!(summary.time_signatures.len(), 1);
        assert_eq!(summary.time_signatures[0].denominator, 4);

        let track = &summary.tracks[0];
        assert_eq!(track.name.as_deref(), Some("Major scale"));
        assert_eq!(track.note_count, 11);
        assert_eq!(track.events.note_on, 11);
        assert_eq!(track.events.note_off, 11);
        assert_eq!(track.channels, vec![1]);
        assert_eq!(track.programs[0].name, "Acoustic Grand Piano");
        assert_eq!(track.lowest_note.as_deref(), Some("C4"));
        assert_eq!(track.highest_note.as_deref(), Some("C5"));
    }

    #[test]
    fn test_summary_display_and_json() {
        let bytes = demo_scale(62, 90.0).unwrap().to_bytes().unwrap();
        let file = MidiFile::parse(&bytes).unwrap();
        let summary = FileSummary::from_file(&file, NoteOptions::default());

        let text = summary.to_string();
        assert!(text.contains("Major scale"));
        assert!(text.contains("D4 to D5"));

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"ticks_per_quarter\":480"));
        assert!(json.contains("\"note_count\":11"));
    }
}
