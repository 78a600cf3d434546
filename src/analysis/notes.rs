use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::analysis::tempo::TempoMap;
use crate::gm;
use crate::midi::header::Format;
use crate::midi::reader::{MidiFile, Track};
use crate::pitch;

/// Which open note a release closes when the same key is struck repeatedly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotePairing {
    /// The oldest sounding instance
    #[default]
    Fifo,
    /// The most recent instance
    Lifo,
}

/// A sounding note reconstructed from its attack and release events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub track: usize,
    pub channel: u8,
    pub key: u8,
    /// Pitch name, or the drum sound on the percussion channel
    pub name: String,
    pub velocity: u8,
    pub release_velocity: u8,
    pub start_tick: u64,
    pub end_tick: u64,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    /// No release was found; the note ends with its track
    pub unterminated: bool,
}

impl Note {
    pub fn duration_ticks(&self) -> u64 {
        self.end_tick - self.start_tick
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteExtraction {
    pub notes: Vec<Note>,
    /// Releases with no matching sounding note
    pub orphan_releases: usize,
    /// Notes still sounding when their track ended
    pub unterminated: usize,
}

impl NoteExtraction {
    fn merge(&mut self, other: NoteExtraction) {
        self.notes.extend(other.notes);
        self.orphan_releases += other.orphan_releases;
        self.unterminated += other.unterminated;
    }

    fn sort(&mut self) {
        self.notes
            .sort_by(|a, b| (a.start_tick, a.key, a.track).cmp(&(b.start_tick, b.key, b.track)));
    }
}

/// Options shared by note extraction entry points
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteOptions {
    pub pairing: NotePairing,
    pub use_flats: bool,
}

/// Pair attacks with releases in one track
pub fn extract_notes(track: &Track, tempo: &TempoMap, options: NoteOptions) -> NoteExtraction {
    let mut open: BTreeMap<(u8, u8), VecDeque<(u64, u8)>> = BTreeMap::new();
    let mut result = NoteExtraction::default();

    for event in &track.events {
        let Some((channel, message)) = event.channel_message() else {
            continue;
        };

        if let Some((key, velocity)) = message.note_started() {
            open.entry((channel, key))
                .or_default()
                .push_back((event.tick, velocity));
        } else if let Some((key, release_velocity)) = message.note_released() {
            let started = open.get_mut(&(channel, key)).and_then(|q| match options.pairing {
                NotePairing::Fifo => q.pop_front(),
                NotePairing::Lifo => q.pop_back(),
            });

            match started {
                Some((start_tick, velocity)) => result.notes.push(make_note(
                    track.index,
                    channel,
                    key,
                    velocity,
                    release_velocity,
                    start_tick,
                    event.tick,
                    false,
                    tempo,
                    options.use_flats,
                )),
                None => {
                    debug!(
                        "Track {}: release of key {} on channel {} at tick {} with no sounding note",
                        track.index, key, channel, event.tick
                    );
                    result.orphan_releases += 1;
                }
            }
        }
    }

    let end_tick = track.end_tick();
    for ((channel, key), pending) in open {
        for (start_tick, velocity) in pending {
            result.unterminated += 1;
            result.notes.push(make_note(
                track.index,
                channel,
                key,
                velocity,
                0,
                start_tick,
                end_tick,
                true,
                tempo,
                options.use_flats,
            ));
        }
    }

    result.sort();
    result
}

/// Notes of every track in a file.
///
/// Format 2 tracks are timed with their own tempo events.
pub fn extract_file_notes(file: &MidiFile, options: NoteOptions) -> NoteExtraction {
    let shared = TempoMap::from_file(file);
    let mut result = NoteExtraction::default();

    for track in &file.tracks {
        result.merge(extract_timed(file, track, &shared, options));
    }

    result.sort();
    result
}

/// Notes of one track, timed the same way as in [`extract_file_notes`].
/// Orphan and unterminated counts cover only that track.
pub fn extract_track_notes(
    file: &MidiFile,
    index: usize,
    options: NoteOptions,
) -> Option<NoteExtraction> {
    let track = file.tracks.get(index)?;
    Some(extract_timed(file, track, &TempoMap::from_file(file), options))
}

fn extract_timed(
    file: &MidiFile,
    track: &Track,
    shared: &TempoMap,
    options: NoteOptions,
) -> NoteExtraction {
    if file.header.format == Format::MultiSong {
        let own = TempoMap::for_track(track, file.header.division);
        extract_notes(track, &own, options)
    } else {
        extract_notes(track, shared, options)
    }
}

#[allow(clippy::too_many_arguments)]
fn make_note(
    track: usize,
    channel: u8,
    key: u8,
    velocity: u8,
    release_velocity: u8,
    start_tick: u64,
    end_tick: u64,
    unterminated: bool,
    tempo: &TempoMap,
    use_flats: bool,
) -> Note {
    let name = if channel == gm::PERCUSSION_CHANNEL {
        gm::percussion_name(key)
            .map(str::to_string)
            .unwrap_or_else(|| pitch::note_name(key, use_flats))
    } else {
        pitch::note_name(key, use_flats)
    };
    let start_seconds = tempo.ticks_to_seconds(start_tick);

    Note {
        track,
        channel,
        key,
        name,
        velocity,
        release_velocity,
        start_tick,
        end_tick,
        start_seconds,
        duration_seconds: tempo.ticks_to_seconds(end_tick) - start_seconds,
        unterminated,
    }
}
