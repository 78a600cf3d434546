use anyhow::{Context, Result};
use log::{debug, info};
use midly::{MidiMessage, Smf, TrackEventKind};
use serde::Serialize;

use crate::midi::reader::{MidiFile, ParseOptions};

/// Per-track counts from both parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackComparison {
    pub index: usize,
    pub channel_events: (usize, usize),
    pub note_ons: (usize, usize),
}

impl TrackComparison {
    pub fn matches(&self) -> bool {
        self.channel_events.0 == self.channel_events.1 && self.note_ons.0 == self.note_ons.1
    }
}

/// Result of parsing the same bytes with this crate and with midly.
/// Tuples hold `(ours, midly)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub format: (u16, u16),
    pub track_count: (usize, usize),
    pub tracks: Vec<TrackComparison>,
    pub mismatches: Vec<String>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn midly_format(format: midly::Format) -> u16 {
    match format {
        midly::Format::SingleTrack => 0,
        midly::Format::Parallel => 1,
        midly::Format::Sequential => 2,
    }
}

/// Cross-check the hand-written reader against midly
pub fn verify(data: &[u8], options: &ParseOptions) -> Result<VerifyReport> {
    let ours = MidiFile::parse_with(data, options).context("Failed to parse MIDI data")?;
    let theirs = Smf::parse(data)
        .map_err(|e| anyhow::anyhow!("midly rejected the file: {}", e))?;

    let mut mismatches = Vec::new();

    let format = (ours.header.format.as_u16(), midly_format(theirs.header.format));
    if format.0 != format.1 {
        mismatches.push(format!("format: {} vs {}", format.0, format.1));
    }
    let track_count = (ours.tracks.len(), theirs.tracks.len());
    if track_count.0 != track_count.1 {
        mismatches.push(format!(
            "track count: {} vs {}",
            track_count.0, track_count.1
        ));
    }

    let mut tracks = Vec::new();
    for (track, their_track) in ours.tracks.iter().zip(theirs.tracks.iter()) {
        let our_channel = track
            .events
            .iter()
            .filter(|e| e.channel_message().is_some())
            .count();
        let our_note_ons = track
            .events
            .iter()
            .filter_map(|e| e.channel_message())
            .filter(|(_, m)| m.note_started().is_some())
            .count();

        let mut their_channel = 0;
        let mut their_note_ons = 0;
        for event in their_track {
            if let TrackEventKind::Midi { message, .. } = event.kind {
                their_channel += 1;
                if let MidiMessage::NoteOn { vel, .. } = message {
                    if vel.as_int() > 0 {
                        their_note_ons += 1;
                    }
                }
            }
        }

        let comparison = TrackComparison {
            index: track.index,
            channel_events: (our_channel, their_channel),
            note_ons: (our_note_ons, their_note_ons),
        };
        if comparison.channel_events.0 != comparison.channel_events.1 {
            mismatches.push(format!(
                "track {} channel events: {} vs {}",
                track.index, our_channel, their_channel
            ));
        }
        if comparison.note_ons.0 != comparison.note_ons.1 {
            mismatches.push(format!(
                "track {} note ons: {} vs {}",
                track.index, our_note_ons, their_note_ons
            ));
        }
        debug!("Track {} comparison: {:?}", track.index, comparison);
        tracks.push(comparison);
    }

    info!(
        "Verified {} tracks, {} mismatches",
        tracks.len(),
        mismatches.len()
    );

    Ok(VerifyReport {
        format,
        track_count,
        tracks,
        mismatches,
    })
}
