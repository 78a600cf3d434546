mod common;

use approx::assert_relative_eq;
use midi_anatomy::analysis::{
    extract_file_notes, extract_track_notes, FileSummary, NoteOptions, TempoMap,
};
use midi_anatomy::error::MidiError;
use midi_anatomy::explain::{explain, render, DumpOptions};
use midi_anatomy::midi::{
    read_chunks, Division, EventKind, Format, MetaEvent, MidiFile, ParseOptions, SequenceBuilder,
};
use midi_anatomy::playback::schedule;
use midi_anatomy::verify::verify;
use std::time::Duration;

#[test]
fn test_format_1_with_tempo_change() {
    let bytes = common::tempo_change_file();
    let file = MidiFile::parse_with(&bytes, &ParseOptions::strict()).unwrap();

    assert_eq!(file.header.format, Format::MultiTrack);
    assert_eq!(
        file.header.division,
        Division::Metrical {
            ticks_per_quarter: 480
        }
    );
    assert_eq!(file.tracks.len(), 2);
    assert_eq!(file.tracks[0].name(), Some("Conductor"));
    assert_eq!(file.tracks[1].name(), Some("Piano"));
    assert!(file.warnings.is_empty());

    let tempo = TempoMap::from_file(&file);
    assert_eq!(tempo.change_count(), 1);
    assert_relative_eq!(tempo.ticks_to_seconds(480), 0.5, epsilon = 1e-9);
    assert_relative_eq!(tempo.ticks_to_seconds(960), 0.75, epsilon = 1e-9);
    assert_relative_eq!(tempo.bpm_at(960), 240.0, epsilon = 1e-9);

    // Conductor tempo events time the notes of the other track
    let notes = extract_file_notes(&file, NoteOptions::default());
    assert_eq!(notes.notes.len(), 1);
    let note = &notes.notes[0];
    assert_eq!(note.track, 1);
    assert_eq!(note.name, "C4");
    assert_eq!(note.velocity, 100);
    assert_eq!(note.release_velocity, 64);
    assert_eq!(note.duration_ticks(), 960);
    assert_relative_eq!(note.duration_seconds, 0.75, epsilon = 1e-9);
}

#[test]
fn test_summary_of_format_1_file() {
    let file = MidiFile::parse(&common::tempo_change_file()).unwrap();
    let summary = FileSummary::from_file(&file, NoteOptions::default());

    assert_eq!(summary.tracks_found, 2);
    assert_eq!(summary.duration_ticks, 960);
    assert_relative_eq!(summary.duration_seconds, 0.75, epsilon = 1e-9);
    assert_relative_eq!(summary.initial_bpm, 120.0, epsilon = 1e-9);
    assert_eq!(summary.tempo_changes, 1);
    assert_eq!(summary.time_signatures.len(), 1);
    assert_eq!(summary.time_signatures[0].numerator, 3);
    assert_eq!(summary.time_signatures[0].denominator, 4);

    let piano = &summary.tracks[1];
    assert_eq!(piano.note_count, 1);
    assert_eq!(piano.channels, vec![1]);
    assert_eq!(piano.programs[0].name, "Acoustic Grand Piano");

    let text = summary.to_string();
    assert!(text.contains("Piano"));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["division"]["kind"], "metrical");
}

#[test]
fn test_smpte_timing() {
    let file = MidiFile::parse(&common::smpte_file()).unwrap();
    assert_eq!(
        file.header.division,
        Division::Timecode {
            frames_per_second: 25,
            ticks_per_frame: 40
        }
    );

    let notes = extract_file_notes(&file, NoteOptions::default());
    assert_eq!(notes.notes.len(), 1);
    let kick = &notes.notes[0];
    assert_eq!(kick.channel, 9);
    assert_eq!(kick.name, "Bass Drum 1");
    assert_relative_eq!(kick.duration_seconds, 1.0, epsilon = 1e-9);
}

#[test]
fn test_rmid_container() {
    let smf = common::tempo_change_file();
    let wrapped = common::rmid(&smf);

    let plain = MidiFile::parse(&smf).unwrap();
    let unwrapped = MidiFile::parse(&wrapped).unwrap();
    assert_eq!(plain.tracks.len(), unwrapped.tracks.len());
    assert_eq!(plain.event_count(), unwrapped.event_count());

    // Offsets point into the container, past the 20 byte RIFF preamble
    assert_eq!(unwrapped.tracks[0].offset, plain.tracks[0].offset + 20);
}

#[test]
fn test_unknown_chunk_is_skipped() {
    let mut bytes = common::tempo_change_file();
    bytes.extend(common::chunk(b"XFIH", &[1, 2, 3]));

    let file = MidiFile::parse_with(&bytes, &ParseOptions::strict()).unwrap();
    assert_eq!(file.tracks.len(), 2);
    assert_eq!(file.unknown_chunks.len(), 1);
    assert_eq!(file.unknown_chunks[0].kind, "XFIH");
    assert_eq!(file.unknown_chunks[0].length, 3);

    let (chunks, warnings) = read_chunks(&bytes, true).unwrap();
    assert_eq!(chunks.len(), 4);
    assert!(warnings.is_empty());
}

#[test]
fn test_truncated_track_strict_and_lenient() {
    let mut bytes = common::tempo_change_file();
    bytes.truncate(bytes.len() - 4);

    let err = MidiFile::parse_with(&bytes, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, MidiError::TruncatedChunk { .. }), "{:?}", err);

    let file = MidiFile::parse(&bytes).unwrap();
    assert!(!file.tracks[1].has_end_of_track);
    assert_eq!(file.warnings.len(), 2);
}

#[test]
fn test_missing_status_byte_is_an_error() {
    let track: &[u8] = &[0x00, 0x3C, 0x40, 0x00, 0xFF, 0x2F, 0x00];
    let bytes = common::smf(0, [0x00, 0x60], &[track]);

    let err = MidiFile::parse(&bytes).unwrap_err();
    assert_eq!(
        err,
        MidiError::MissingStatus {
            offset: 23,
            byte: 0x3C
        }
    );
}

#[test]
fn test_running_status_is_cancelled_by_meta_events() {
    let track: &[u8] = &[
        0x00, 0x90, 0x3C, 0x40, //
        0x00, 0xFF, 0x01, 0x01, b'x', //
        0x00, 0x3C, 0x00, // data byte after a meta event
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = common::smf(0, [0x00, 0x60], &[track]);
    assert!(matches!(
        MidiFile::parse(&bytes),
        Err(MidiError::MissingStatus { .. })
    ));
}

#[test]
fn test_track_count_mismatch() {
    let mut bytes = common::tempo_change_file();
    // Claim three tracks
    bytes[11] = 3;

    let err = MidiFile::parse_with(&bytes, &ParseOptions::strict()).unwrap_err();
    assert_eq!(
        err,
        MidiError::TrackCountMismatch {
            declared: 3,
            found: 2
        }
    );
    let file = MidiFile::parse(&bytes).unwrap();
    assert_eq!(file.warnings.len(), 1);
}

#[test]
fn test_builder_output_round_trips_through_reader() {
    let mut builder = SequenceBuilder::new(96)
        .tempo_bpm(90.0)
        .track_name("Bass")
        .program(1, 33);
    builder.add_note(1, 40, 110, 0, 96).unwrap();
    builder.add_note(1, 43, 100, 96, 96).unwrap();
    let bytes = builder.to_bytes().unwrap();

    let file = MidiFile::parse_with(&bytes, &ParseOptions::strict()).unwrap();
    assert_eq!(file.tracks[0].name(), Some("Bass"));
    let tempo = file.tracks[0].events.iter().find_map(|e| match e.meta() {
        Some(MetaEvent::Tempo { micros_per_quarter }) => Some(*micros_per_quarter),
        _ => None,
    });
    assert_eq!(tempo, Some(666_667));

    let notes = extract_file_notes(&file, NoteOptions::default());
    let keys: Vec<u8> = notes.notes.iter().map(|n| n.key).collect();
    assert_eq!(keys, vec![40, 43]);

    let report = verify(&bytes, &ParseOptions::strict()).unwrap();
    assert!(report.is_consistent());
}

#[test]
fn test_explain_covers_every_event() {
    let bytes = common::tempo_change_file();
    let file = MidiFile::parse(&bytes).unwrap();
    let lines = explain(&bytes, &DumpOptions::default()).unwrap();

    for event in file.tracks.iter().flat_map(|t| t.events.iter()) {
        assert!(
            lines.iter().any(|l| l.offset == event.offset),
            "no line for event at {:#06x}",
            event.offset
        );
    }
    for pair in lines.windows(2) {
        assert!(pair[0].offset < pair[1].offset);
    }

    let text = render(&lines, 8);
    assert!(text.starts_with("00000000  4D 54 68 64"));
    assert!(text.contains("Track chunk 0"));
}

#[test]
fn test_explain_single_track() {
    let bytes = common::tempo_change_file();
    let options = DumpOptions {
        track: Some(1),
        ..Default::default()
    };
    let lines = explain(&bytes, &options).unwrap();
    assert!(lines.iter().any(|l| l.text.starts_with("Track chunk 1")));
    assert!(!lines.iter().any(|l| l.text.starts_with("Track chunk 0")));
}

#[test]
fn test_end_of_track_is_last_event() {
    let file = MidiFile::parse(&common::tempo_change_file()).unwrap();
    for track in &file.tracks {
        assert!(track.has_end_of_track);
        let last = track.events.last().unwrap();
        assert!(matches!(last.kind, EventKind::Meta(MetaEvent::EndOfTrack)));
    }
}

#[test]
fn test_multi_song_notes_use_their_own_tempo() {
    let file = MidiFile::parse_with(&common::multi_song_file(), &ParseOptions::strict()).unwrap();
    assert_eq!(file.header.format, Format::MultiSong);

    let notes = extract_file_notes(&file, NoteOptions::default());
    assert_eq!(notes.notes.len(), 2);
    let first = notes.notes.iter().find(|n| n.track == 0).unwrap();
    let second = notes.notes.iter().find(|n| n.track == 1).unwrap();
    assert_relative_eq!(first.duration_seconds, 0.5, epsilon = 1e-9);
    assert_relative_eq!(second.duration_seconds, 1.0, epsilon = 1e-9);

    let only_second = extract_track_notes(&file, 1, NoteOptions::default()).unwrap();
    assert_relative_eq!(only_second.notes[0].duration_seconds, 1.0, epsilon = 1e-9);
}

#[test]
fn test_multi_song_duration_is_the_sum_of_songs() {
    let file = MidiFile::parse(&common::multi_song_file()).unwrap();
    let summary = FileSummary::from_file(&file, NoteOptions::default());

    assert_eq!(summary.duration_ticks, 480);
    assert_relative_eq!(summary.duration_seconds, 1.5, epsilon = 1e-9);
    assert_relative_eq!(summary.initial_bpm, 120.0, epsilon = 1e-9);
}

#[test]
fn test_multi_song_tempo_map_uses_first_song() {
    let file = MidiFile::parse(&common::multi_song_file()).unwrap();
    let tempo = TempoMap::from_file(&file);

    assert_eq!(tempo.change_count(), 0);
    assert_relative_eq!(tempo.bpm_at(0), 120.0, epsilon = 1e-9);
    assert_relative_eq!(tempo.ticks_to_seconds(480), 0.5, epsilon = 1e-9);
}

#[test]
fn test_multi_song_playback_plays_first_song() {
    let file = MidiFile::parse(&common::multi_song_file()).unwrap();
    let tempo = TempoMap::from_file(&file);
    let messages = schedule(&file, &tempo, 1.0).unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].bytes, vec![0x90, 0x3C, 0x64]);
    assert_eq!(messages[1].bytes, vec![0x80, 0x3C, 0x40]);
    assert_eq!(messages[1].at, Duration::from_millis(500));
}

#[test]
fn test_single_track_counts_cover_that_track_only() {
    let file = MidiFile::parse(&common::untidy_first_track_file()).unwrap();

    let whole = extract_file_notes(&file, NoteOptions::default());
    assert_eq!(whole.orphan_releases, 1);
    assert_eq!(whole.unterminated, 1);

    let clean = extract_track_notes(&file, 1, NoteOptions::default()).unwrap();
    assert_eq!(clean.notes.len(), 1);
    assert_eq!(clean.orphan_releases, 0);
    assert_eq!(clean.unterminated, 0);

    let untidy = extract_track_notes(&file, 0, NoteOptions::default()).unwrap();
    assert_eq!(untidy.orphan_releases, 1);
    assert_eq!(untidy.unterminated, 1);

    assert!(extract_track_notes(&file, 2, NoteOptions::default()).is_none());
}

#[test]
fn test_zero_length_note_never_reaches_the_file() {
    let mut builder = SequenceBuilder::default();
    assert!(builder.add_note(0, 60, 80, 0, 0).is_err());
    builder.add_note(0, 64, 80, 480, 480).unwrap();

    let file = MidiFile::parse(&builder.to_bytes().unwrap()).unwrap();
    let notes = extract_file_notes(&file, NoteOptions::default());
    assert_eq!(notes.notes.len(), 1);
    assert_eq!(notes.orphan_releases, 0);
    assert_eq!(notes.unterminated, 0);
}
