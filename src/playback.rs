use anyhow::{Context, Result};
use log::{debug, info};
use midir::{MidiOutput, MidiOutputConnection};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::tempo::TempoMap;
use crate::midi::event::{ChannelMessage, EventKind};
use crate::midi::header::Format;
use crate::midi::reader::MidiFile;

const CLIENT_NAME: &str = "midi_anatomy";
const CONNECTION_NAME: &str = "midi_anatomy_out";
const CONTROL_CHANGE: u8 = 0xB0;
const ALL_NOTES_OFF: u8 = 123;
const NOTE_OFF: u8 = 0x80;

/// A message to send at a given time after playback starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub at: Duration,
    pub bytes: Vec<u8>,
}

/// Lay out every channel message of a file on one timeline.
///
/// Format 2 files only play their first song. `speed` scales playback,
/// 2.0 plays twice as fast.
pub fn schedule(file: &MidiFile, tempo: &TempoMap, speed: f32) -> Result<Vec<ScheduledMessage>> {
    if speed.is_nan() || speed <= 0.0 {
        anyhow::bail!("playback speed must be positive, got {}", speed);
    }

    let tracks = match file.header.format {
        Format::MultiSong => &file.tracks[..file.tracks.len().min(1)],
        _ => &file.tracks[..],
    };

    let mut timeline: Vec<(u64, usize, usize, ScheduledMessage)> = Vec::new();
    for track in tracks {
        for (position, event) in track.events.iter().enumerate() {
            if let EventKind::Channel { channel, message } = &event.kind {
                let seconds = tempo.ticks_to_seconds(event.tick) / f64::from(speed);
                let at = Duration::try_from_secs_f64(seconds.max(0.0)).with_context(|| {
                    format!(
                        "event at tick {} lands {} s into playback at {}x speed",
                        event.tick, seconds, speed
                    )
                })?;
                timeline.push((
                    event.tick,
                    track.index,
                    position,
                    ScheduledMessage {
                        at,
                        bytes: message.to_bytes(*channel),
                    },
                ));
            }
        }
    }

    // Keep file order for events on the same tick
    timeline.sort_by_key(|(tick, track, position, _)| (*tick, *track, *position));
    debug!("Scheduled {} messages", timeline.len());
    Ok(timeline.into_iter().map(|(_, _, _, m)| m).collect())
}

pub struct MidiOutputHandler {
    connection: Option<MidiOutputConnection>,
    sounding: HashSet<(u8, u8)>,
}

impl MidiOutputHandler {
    /// Create a new MIDI output handler
    pub fn new() -> Result<Self> {
        Ok(Self {
            connection: None,
            sounding: HashSet::new(),
        })
    }

    /// Connect to a MIDI output port by name or create a virtual port
    pub fn connect(&mut self, port_name: Option<&str>) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let connection = if let Some(name) = port_name {
            // Find port by name
            let ports = midi_out.ports();
            let port = ports
                .iter()
                .find(|p| {
                    midi_out
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .context(format!("MIDI port '{}' not found", name))?;

            info!("Connecting to MIDI port: {}", midi_out.port_name(port)?);
            midi_out
                .connect(port, CONNECTION_NAME)
                .map_err(|e| anyhow::anyhow!("Failed to connect to MIDI port: {:?}", e))?
        } else {
            // Try to create virtual port (Unix only), otherwise use first available port
            #[cfg(target_os = "linux")]
            {
                use midir::os::unix::VirtualOutput;
                info!("Creating virtual MIDI port: {}", CLIENT_NAME);
                midi_out
                    .create_virtual(CLIENT_NAME)
                    .map_err(|e| anyhow::anyhow!("Failed to create virtual MIDI port: {:?}", e))?
            }
            #[cfg(not(target_os = "linux"))]
            {
                let ports = midi_out.ports();
                if ports.is_empty() {
                    anyhow::bail!("No MIDI output ports available");
                }
                let port = &ports[0];
                info!("Using MIDI port: {}", midi_out.port_name(port)?);
                midi_out
                    .connect(port, CONNECTION_NAME)
                    .map_err(|e| anyhow::anyhow!("Failed to connect to MIDI port: {:?}", e))?
            }
        };

        self.connection = Some(connection);
        Ok(())
    }

    /// Send raw message bytes and track which notes are sounding
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(conn) = &mut self.connection else {
            anyhow::bail!("MIDI output not connected")
        };
        conn.send(bytes)?;
        self.track_message(bytes);
        Ok(())
    }

    fn track_message(&mut self, bytes: &[u8]) {
        if bytes.len() < 2 {
            return;
        }
        let channel = bytes[0] & 0x0F;
        let Some(message) = ChannelMessage::from_bytes(bytes[0], &bytes[1..]) else {
            return;
        };
        if let Some((key, _)) = message.note_started() {
            self.sounding.insert((channel, key));
        } else if let Some((key, _)) = message.note_released() {
            self.sounding.remove(&(channel, key));
        }
    }

    /// Release every sounding note and send All Notes Off on each used channel
    pub fn all_notes_off(&mut self) -> Result<()> {
        if self.connection.is_none() {
            self.sounding.clear();
            return Ok(());
        }
        let notes: Vec<(u8, u8)> = self.sounding.iter().copied().collect();
        let channels: HashSet<u8> = notes.iter().map(|(c, _)| *c).collect();
        for (channel, key) in notes {
            self.send(&[NOTE_OFF | channel, key, 0])?;
        }
        for channel in channels {
            self.send(&[CONTROL_CHANGE | channel, ALL_NOTES_OFF, 0])?;
        }
        Ok(())
    }

    /// Get the number of sounding notes
    pub fn sounding_count(&self) -> usize {
        self.sounding.len()
    }
}

impl Drop for MidiOutputHandler {
    fn drop(&mut self) {
        // Send note off for all sounding notes when dropping
        let _ = self.all_notes_off();
    }
}

/// Plays a schedule in real time through a connected output
pub struct Player {
    output: MidiOutputHandler,
}

impl Player {
    pub fn new(output: MidiOutputHandler) -> Self {
        Self { output }
    }

    pub fn play(&mut self, messages: &[ScheduledMessage]) -> Result<()> {
        let total = messages.last().map(|m| m.at).unwrap_or_default();
        info!(
            "Playing {} messages over {:.1}s",
            messages.len(),
            total.as_secs_f64()
        );

        let start = Instant::now();
        for message in messages {
            let elapsed = start.elapsed();
            if message.at > elapsed {
                thread::sleep(message.at - elapsed);
            }
            self.output.send(&message.bytes)?;
        }

        self.output.all_notes_off()?;
        info!("Playback finished after {:.1}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}

/// List available MIDI output ports
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let ports = midi_out.ports();

    let mut port_names = Vec::new();
    for port in ports.iter() {
        if let Ok(name) = midi_out.port_name(port) {
            port_names.push(name);
        }
    }

    Ok(port_names)
}
