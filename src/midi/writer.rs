use anyhow::{Context, Result};
use log::{debug, info};
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::midi::vlq::MAX_VLQ;

pub const DEFAULT_TICKS_PER_QUARTER: u16 = 480;
const MICROSECONDS_PER_MINUTE: u32 = 60_000_000;
const MAJOR_SCALE: [u8; 8] = [0, 2, 4, 5, 7, 9, 11, 12];

#[derive(Debug, Clone, Copy)]
struct PendingEvent {
    tick: u64,
    channel: u8,
    message: MidiMessage,
}

impl PendingEvent {
    // Releases go before attacks at the same tick so repeated notes retrigger
    fn order(&self) -> u8 {
        match self.message {
            MidiMessage::NoteOff { .. } => 0,
            _ => 1,
        }
    }
}

/// Builds a format 0 Standard MIDI File from notes
pub struct SequenceBuilder {
    events: Vec<PendingEvent>,
    tempo: u32, // Microseconds per quarter note
    ticks_per_quarter: u16,
    track_name: Option<String>,
    time_signature: (u8, u8),
    programs: Vec<(u8, u8)>,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_QUARTER)
    }
}

impl SequenceBuilder {
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            events: Vec::new(),
            tempo: MICROSECONDS_PER_MINUTE / 120, // 120 BPM default
            ticks_per_quarter: ticks_per_quarter.clamp(1, 0x7FFF),
            track_name: None,
            time_signature: (4, 2),
            programs: Vec::new(),
        }
    }

    pub fn tempo_bpm(mut self, bpm: f64) -> Self {
        if bpm > 0.0 {
            self.tempo = (f64::from(MICROSECONDS_PER_MINUTE) / bpm)
                .round()
                .clamp(1.0, f64::from(0x00FF_FFFF)) as u32;
        }
        self
    }

    pub fn track_name(mut self, name: impl Into<String>) -> Self {
        self.track_name = Some(name.into());
        self
    }

    /// Numerator and denominator power of two (2 = quarter note)
    pub fn time_signature(mut self, numerator: u8, denominator_power: u8) -> Self {
        self.time_signature = (numerator, denominator_power);
        self
    }

    /// Program change emitted at tick 0 on `channel`
    pub fn program(mut self, channel: u8, program: u8) -> Self {
        self.programs.push((channel & 0x0F, program & 0x7F));
        self
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn micros_per_quarter(&self) -> u32 {
        self.tempo
    }

    /// Add a note by tick position
    pub fn add_note(
        &mut self,
        channel: u8,
        key: u8,
        velocity: u8,
        start_tick: u64,
        duration_ticks: u64,
    ) -> Result<()> {
        if channel > 15 {
            anyhow::bail!("channel {} is out of range (0-15)", channel);
        }
        if key > 127 {
            anyhow::bail!("key {} is out of range (0-127)", key);
        }
        if velocity == 0 || velocity > 127 {
            anyhow::bail!("velocity {} is out of range (1-127)", velocity);
        }
        // A zero-length note would sort its release before its attack
        if duration_ticks == 0 {
            anyhow::bail!("note {} at tick {} has zero duration", key, start_tick);
        }
        let end_tick = start_tick
            .checked_add(duration_ticks)
            .context("note end tick overflows")?;

        self.events.push(PendingEvent {
            tick: start_tick,
            channel,
            message: MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(velocity),
            },
        });
        self.events.push(PendingEvent {
            tick: end_tick,
            channel,
            message: MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        });
        debug!(
            "Added note {} on channel {} at tick {} for {} ticks",
            key, channel, start_tick, duration_ticks
        );
        Ok(())
    }

    /// Add a note by time in seconds at the builder tempo.
    ///
    /// Positive durations shorter than one tick are lengthened to one tick.
    pub fn add_note_seconds(
        &mut self,
        channel: u8,
        key: u8,
        velocity: u8,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<()> {
        if !start_seconds.is_finite() || !duration_seconds.is_finite() {
            anyhow::bail!(
                "note times must be finite, got start {} and duration {}",
                start_seconds,
                duration_seconds
            );
        }
        if duration_seconds <= 0.0 {
            anyhow::bail!("note duration must be positive, got {}", duration_seconds);
        }
        let start = self.micros_to_ticks((start_seconds.max(0.0) * 1_000_000.0) as u64)?;
        let duration = self
            .micros_to_ticks((duration_seconds * 1_000_000.0) as u64)?
            .max(1);
        self.add_note(channel, key, velocity, start, duration)
    }

    pub fn note_count(&self) -> usize {
        self.events.len() / 2
    }

    /// Encode the sequence as SMF bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.events.is_empty() {
            anyhow::bail!("No notes to write");
        }

        let mut sorted = self.events.clone();
        sorted.sort_by_key(|e| (e.tick, e.order()));

        let mut track_events = Vec::with_capacity(sorted.len() + 4 + self.programs.len());

        if let Some(name) = &self.track_name {
            track_events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            });
        }

        track_events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(self.tempo))),
        });

        let (numerator, denominator_power) = self.time_signature;
        track_events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                numerator,
                denominator_power,
                24,
                8,
            )),
        });

        for &(channel, program) in &self.programs {
            track_events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::ProgramChange {
                        program: u7::new(program),
                    },
                },
            });
        }

        let mut last_tick = 0u64;
        for event in &sorted {
            let gap = event.tick - last_tick;
            if gap > u64::from(MAX_VLQ) {
                anyhow::bail!(
                    "gap of {} ticks before tick {} exceeds the largest delta time ({})",
                    gap,
                    event.tick,
                    MAX_VLQ
                );
            }
            let delta = gap as u32;
            track_events.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi {
                    channel: u4::new(event.channel),
                    message: event.message,
                },
            });
            last_tick = event.tick;
        }

        track_events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(u15::new(self.ticks_per_quarter)),
            },
            tracks: vec![Track::from(track_events)],
        };

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)
            .context("Failed to encode MIDI data")?;
        Ok(bytes)
    }

    /// Write the sequence to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        info!("Saving {} notes to {:?}", self.note_count(), path);

        let mut file = File::create(path).context("Failed to create MIDI file")?;
        file.write_all(&bytes)
            .context("Failed to write MIDI data")?;
        file.flush().context("Failed to flush MIDI file")?;

        info!("MIDI file saved successfully to {:?}", path);
        Ok(())
    }

    /// Convert microseconds to ticks at the builder tempo
    fn micros_to_ticks(&self, micros: u64) -> Result<u64> {
        // ticks = (microseconds * ticks_per_quarter) / tempo
        let ticks = u128::from(micros) * u128::from(self.ticks_per_quarter)
            / u128::from(self.tempo);
        u64::try_from(ticks).context("note time is too far out to express in ticks")
    }
}

/// One octave of the major scale starting at `tonic`, followed by the tonic triad
pub fn demo_scale(tonic: u8, bpm: f64) -> Result<SequenceBuilder> {
    if tonic > 127 - 12 {
        anyhow::bail!("tonic {} leaves no room for an octave above it", tonic);
    }

    let mut builder = SequenceBuilder::new(DEFAULT_TICKS_PER_QUARTER)
        .tempo_bpm(bpm)
        .track_name("Major scale")
        .program(0, 0);
    let quarter = u64::from(builder.ticks_per_quarter());

    for (i, step) in MAJOR_SCALE.iter().enumerate() {
        builder.add_note(0, tonic + step, 80, i as u64 * quarter, quarter)?;
    }

    let chord_start = MAJOR_SCALE.len() as u64 * quarter;
    for step in [0u8, 4, 7] {
        builder.add_note(0, tonic + step, 70, chord_start, quarter * 2)?;
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = SequenceBuilder::default();
        assert_eq!(builder.ticks_per_quarter(), 480);
        assert_eq!(builder.micros_per_quarter(), 500_000);
        assert_eq!(builder.note_count(), 0);
    }

    #[test]
    fn test_tempo_bpm() {
        let builder = SequenceBuilder::default().tempo_bpm(90.0);
        assert_eq!(builder.micros_per_quarter(), 666_667);
        // Non-positive tempo keeps the default
        let builder = SequenceBuilder::default().tempo_bpm(0.0);
        assert_eq!(builder.micros_per_quarter(), 500_000);
    }

    #[test]
    fn test_empty_builder_fails() {
        assert!(SequenceBuilder::default().to_bytes().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut builder = SequenceBuilder::default();
        assert!(builder.add_note(16, 60, 80, 0, 10).is_err());
        assert!(builder.add_note(0, 128, 80, 0, 10).is_err());
        assert!(builder.add_note(0, 60, 0, 0, 10).is_err());
        assert_eq!(builder.note_count(), 0);
    }

    #[test]
    fn test_micros_to_ticks() {
        let builder = SequenceBuilder::default();
        // One beat at 120 BPM
        assert_eq!(builder.micros_to_ticks(500_000).unwrap(), 480);

        // One microsecond per quarter at the finest resolution
        let fine = SequenceBuilder::new(0x7FFF).tempo_bpm(60_000_000.0);
        assert_eq!(fine.micros_per_quarter(), 1);
        assert!(fine.micros_to_ticks(u64::MAX).is_err());
    }

    #[test]
    fn test_add_note_seconds() {
        let mut builder = SequenceBuilder::default();
        builder.add_note_seconds(0, 60, 80, 1.0, 0.5).unwrap();
        assert_eq!(builder.events[0].tick, 960);
        assert_eq!(builder.events[1].tick, 1440);
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        let mut builder = SequenceBuilder::default();
        assert!(builder.add_note(0, 60, 80, 0, 0).is_err());
        assert!(builder.add_note(0, 60, 80, u64::MAX, 1).is_err());
        assert!(builder.add_note_seconds(0, 60, 80, 1.0, 0.0).is_err());
        assert!(builder.add_note_seconds(0, 60, 80, f64::NAN, 1.0).is_err());
        assert_eq!(builder.note_count(), 0);
    }

    #[test]
    fn test_sub_tick_duration_becomes_one_tick() {
        let mut builder = SequenceBuilder::default();
        builder.add_note_seconds(0, 60, 80, 0.0, 0.0001).unwrap();
        assert_eq!(builder.events[0].tick, 0);
        assert_eq!(builder.events[1].tick, 1);
    }

    #[test]
    fn test_far_out_times_fail_instead_of_panicking() {
        let mut builder = SequenceBuilder::new(0x7FFF).tempo_bpm(60_000_000.0);
        assert!(builder.add_note_seconds(0, 60, 80, 4.0e10, 1.0).is_err());
        assert_eq!(builder.note_count(), 0);

        // Representable in ticks but not as a delta time
        let mut builder = SequenceBuilder::default();
        builder.add_note_seconds(0, 60, 80, 4.0e10, 1.0).unwrap();
        assert!(builder.to_bytes().is_err());
    }

    #[test]
    fn test_gap_beyond_delta_range_is_an_error() {
        let mut builder = SequenceBuilder::default();
        builder.add_note(0, 60, 80, 0, 480).unwrap();
        builder
            .add_note(0, 64, 80, u64::from(MAX_VLQ) + 1000, 480)
            .unwrap();
        assert!(builder.to_bytes().is_err());
    }

    #[test]
    fn test_bytes_start_with_header() {
        let mut builder = SequenceBuilder::default();
        builder.add_note(0, 60, 80, 0, 480).unwrap();
        let bytes = builder.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[14..18], b"MTrk");
    }

    #[test]
    fn test_demo_scale() {
        let builder = demo_scale(60, 120.0).unwrap();
        assert_eq!(builder.note_count(), 11);
        assert!(demo_scale(120, 120.0).is_err());
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scale.mid");
        demo_scale(60, 100.0).unwrap().save(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 22);
    }
}
