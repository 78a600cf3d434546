use log::debug;
use serde::Serialize;

use crate::midi::event::{EventKind, MetaEvent};
use crate::midi::header::{Division, Format};
use crate::midi::reader::{MidiFile, Track};

/// Tempo in effect before the first Tempo event (120 BPM)
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

/// A stretch of the timeline with a constant tempo
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoSegment {
    pub start_tick: u64,
    pub start_seconds: f64,
    pub micros_per_quarter: u32,
}

impl TempoSegment {
    pub fn bpm(&self) -> f64 {
        MICROSECONDS_PER_MINUTE / f64::from(self.micros_per_quarter)
    }
}

/// Converts between ticks and wall-clock seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    division: Division,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build a map from `(tick, micros_per_quarter)` changes in any order.
    ///
    /// Later changes at the same tick replace earlier ones. Under an SMPTE
    /// division tempo changes have no effect on timing and are dropped.
    pub fn new(division: Division, changes: impl IntoIterator<Item = (u64, u32)>) -> Self {
        let mut changes: Vec<(u64, u32)> = match division {
            Division::Metrical { .. } => changes.into_iter().filter(|&(_, t)| t > 0).collect(),
            Division::Timecode { .. } => Vec::new(),
        };
        // Stable sort keeps file order among events on the same tick
        changes.sort_by_key(|&(tick, _)| tick);

        let mut segments = vec![TempoSegment {
            start_tick: 0,
            start_seconds: 0.0,
            micros_per_quarter: DEFAULT_MICROS_PER_QUARTER,
        }];

        for (tick, micros) in changes {
            let last = segments[segments.len() - 1];
            if last.start_tick == tick {
                if let Some(segment) = segments.last_mut() {
                    segment.micros_per_quarter = micros;
                }
                continue;
            }
            let start_seconds = last.start_seconds
                + segment_seconds(division, tick - last.start_tick, last.micros_per_quarter);
            segments.push(TempoSegment {
                start_tick: tick,
                start_seconds,
                micros_per_quarter: micros,
            });
        }

        debug!("Tempo map with {} segments", segments.len());
        Self { division, segments }
    }

    /// Tempo map for a whole file.
    ///
    /// Formats 0 and 1 share one map built from every track. Format 2 tracks
    /// are independent, so only the first track is used; see [`TempoMap::for_track`].
    pub fn from_file(file: &MidiFile) -> Self {
        let division = file.header.division;
        match file.header.format {
            Format::MultiSong => match file.tracks.first() {
                Some(track) => Self::for_track(track, division),
                None => Self::new(division, []),
            },
            _ => Self::new(division, file.tracks.iter().flat_map(tempo_changes)),
        }
    }

    /// Tempo map built only from one track's events
    pub fn for_track(track: &Track, division: Division) -> Self {
        Self::new(division, tempo_changes(track))
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// Number of tempo changes after the implicit initial tempo
    pub fn change_count(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn ticks_to_seconds(&self, tick: u64) -> f64 {
        let segment = self.segment_at_tick(tick);
        segment.start_seconds
            + segment_seconds(
                self.division,
                tick - segment.start_tick,
                segment.micros_per_quarter,
            )
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let index = self
            .segments
            .partition_point(|s| s.start_seconds <= seconds)
            .saturating_sub(1);
        let segment = self.segments[index];
        let elapsed = seconds - segment.start_seconds;

        let ticks = match self.division {
            Division::Metrical { ticks_per_quarter } => {
                elapsed * 1_000_000.0 * f64::from(ticks_per_quarter)
                    / f64::from(segment.micros_per_quarter)
            }
            Division::Timecode {
                frames_per_second,
                ticks_per_frame,
            } => elapsed * ticks_per_second(frames_per_second, ticks_per_frame),
        };
        segment.start_tick + ticks.round() as u64
    }

    /// Tempo in beats per minute at `tick` (constant 120 under SMPTE timing)
    pub fn bpm_at(&self, tick: u64) -> f64 {
        self.segment_at_tick(tick).bpm()
    }

    fn segment_at_tick(&self, tick: u64) -> TempoSegment {
        let index = self
            .segments
            .partition_point(|s| s.start_tick <= tick)
            .saturating_sub(1);
        self.segments[index]
    }
}

fn tempo_changes(track: &Track) -> impl Iterator<Item = (u64, u32)> + '_ {
    track.events.iter().filter_map(|event| match event.kind {
        EventKind::Meta(MetaEvent::Tempo { micros_per_quarter }) => {
            Some((event.tick, micros_per_quarter))
        }
        _ => None,
    })
}

fn ticks_per_second(frames_per_second: u8, ticks_per_frame: u8) -> f64 {
    Division::frames_per_second_exact(frames_per_second) * f64::from(ticks_per_frame.max(1))
}

fn segment_seconds(division: Division, ticks: u64, micros_per_quarter: u32) -> f64 {
    match division {
        Division::Metrical { ticks_per_quarter } => {
            ticks as f64 * f64::from(micros_per_quarter)
                / (f64::from(ticks_per_quarter) * 1_000_000.0)
        }
        Division::Timecode {
            frames_per_second,
            ticks_per_frame,
        } => ticks as f64 / ticks_per_second(frames_per_second, ticks_per_frame),
    }
}
