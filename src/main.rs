use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use midi_anatomy::{
    analysis::{extract_file_notes, extract_track_notes, FileSummary, TempoMap},
    config::Config,
    explain,
    midi::{read_chunks, writer::demo_scale, MidiFile},
    playback::{self, MidiOutputHandler, Player},
    pitch, verify,
};

#[derive(Parser)]
#[command(name = "midi_anatomy")]
#[command(author = "Tim von Hahn")]
#[command(version)]
#[command(about = "Understanding the inner workings of MIDI files", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Reject malformed files instead of recovering with warnings
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a MIDI file
    Info {
        /// MIDI file to read
        file: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the chunks of a MIDI file
    Chunks {
        /// MIDI file to read
        file: String,
    },

    /// Explain a MIDI file byte by byte
    Dump {
        /// MIDI file to read
        file: String,

        /// Only show events of this track
        #[arg(short, long)]
        track: Option<usize>,
    },

    /// List the notes of a MIDI file
    Notes {
        /// MIDI file to read
        file: String,

        /// Only show notes of this track
        #[arg(short, long)]
        track: Option<usize>,

        /// Print the notes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tempo map of a MIDI file
    Tempo {
        /// MIDI file to read
        file: String,
    },

    /// Cross-check the parser against midly
    Verify {
        /// MIDI file to read
        file: String,
    },

    /// Play a MIDI file through a MIDI output port
    Play {
        /// MIDI file to play
        file: String,

        /// MIDI output port name (omit to create virtual port)
        #[arg(short, long)]
        port: Option<String>,

        /// Playback speed multiplier
        #[arg(short, long)]
        speed: Option<f32>,
    },

    /// List available MIDI output ports
    ListPorts,

    /// Write a demo file containing one octave of a major scale
    Generate {
        /// Output file path
        output: String,

        /// Key number of the first note (60 = C4)
        #[arg(long, default_value = "60")]
        tonic: u8,

        /// Tempo in beats per minute
        #[arg(long, default_value = "120")]
        bpm: f64,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Output file path
        #[arg(default_value = "config.json")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::default()
    };

    // Override with CLI arguments
    config.verbose |= cli.verbose;
    config.strict |= cli.strict;

    // Initialize logger
    let level = if config.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::Info { file, json } => {
            let midi = MidiFile::open(&file, &config.parse_options())?;
            let summary = FileSummary::from_file(&midi, config.note_options());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary);
            }
            Ok(())
        }

        Commands::Chunks { file } => {
            let data = std::fs::read(&file).with_context(|| format!("Failed to read {}", file))?;
            let (chunks, warnings) = read_chunks(&data, config.strict)?;
            println!("{:<10} {:<6} {:>10}", "Offset", "Type", "Length");
            for chunk in &chunks {
                println!(
                    "{:#010x} {:<6} {:>10}",
                    chunk.offset,
                    chunk.kind_str(),
                    chunk.declared_length
                );
            }
            for warning in warnings {
                println!("Warning: {}", warning);
            }
            Ok(())
        }

        Commands::Dump { file, track } => {
            let data = std::fs::read(&file).with_context(|| format!("Failed to read {}", file))?;
            let lines = explain::explain(&data, &config.dump_options(track))
                .with_context(|| format!("Failed to parse {}", file))?;
            print!("{}", explain::render(&lines, config.hex_bytes_per_line));
            Ok(())
        }

        Commands::Notes { file, track, json } => {
            let midi = MidiFile::open(&file, &config.parse_options())?;
            let extraction = match track {
                Some(index) => extract_track_notes(&midi, index, config.note_options())
                    .with_context(|| {
                        format!("Track {} not found, the file has {}", index, midi.tracks.len())
                    })?,
                None => extract_file_notes(&midi, config.note_options()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&extraction)?);
                return Ok(());
            }

            println!(
                "{:>5} {:>3} {:<20} {:>4} {:>10} {:>10} {:>10}",
                "Track", "Ch", "Note", "Vel", "Start", "Ticks", "Seconds"
            );
            for note in &extraction.notes {
                println!(
                    "{:>5} {:>3} {:<20} {:>4} {:>10.3} {:>10} {:>10.3}{}",
                    note.track,
                    note.channel + 1,
                    note.name,
                    note.velocity,
                    note.start_seconds,
                    note.duration_ticks(),
                    note.duration_seconds,
                    if note.unterminated { "  (unterminated)" } else { "" }
                );
            }
            println!(
                "{} notes, {} orphan releases, {} unterminated",
                extraction.notes.len(),
                extraction.orphan_releases,
                extraction.unterminated
            );
            Ok(())
        }

        Commands::Tempo { file } => {
            let midi = MidiFile::open(&file, &config.parse_options())?;
            let tempo = TempoMap::from_file(&midi);
            println!("Division: {}", tempo.division());
            println!("{:>10} {:>12} {:>12} {:>8}", "Tick", "Seconds", "µs/quarter", "BPM");
            for segment in tempo.segments() {
                println!(
                    "{:>10} {:>12.3} {:>12} {:>8.2}",
                    segment.start_tick,
                    segment.start_seconds,
                    segment.micros_per_quarter,
                    segment.bpm()
                );
            }
            Ok(())
        }

        Commands::Verify { file } => {
            let data = std::fs::read(&file).with_context(|| format!("Failed to read {}", file))?;
            let report = verify::verify(&data, &config.parse_options())?;
            for track in &report.tracks {
                println!(
                    "Track {}: {} / {} channel events, {} / {} note ons",
                    track.index,
                    track.channel_events.0,
                    track.channel_events.1,
                    track.note_ons.0,
                    track.note_ons.1
                );
            }
            if report.is_consistent() {
                println!("Parser agrees with midly");
                Ok(())
            } else {
                for mismatch in &report.mismatches {
                    println!("Mismatch: {}", mismatch);
                }
                anyhow::bail!("{} mismatches against midly", report.mismatches.len())
            }
        }

        Commands::Play { file, port, speed } => {
            if port.is_some() {
                config.midi_port = port;
            }
            if let Some(speed) = speed {
                config.playback_speed = speed;
            }
            config.validate()?;

            let midi = MidiFile::open(&file, &config.parse_options())?;
            let tempo = TempoMap::from_file(&midi);
            let messages = playback::schedule(&midi, &tempo, config.playback_speed)?;

            let mut output = MidiOutputHandler::new()?;
            output.connect(config.midi_port.as_deref())?;
            info!("Playing {} at {}x speed", file, config.playback_speed);
            Player::new(output).play(&messages)
        }

        Commands::ListPorts => {
            println!("Available MIDI output ports:");
            let ports = playback::list_midi_ports()?;
            if ports.is_empty() {
                println!("  (no ports found)");
            } else {
                for (i, port) in ports.iter().enumerate() {
                    println!("  {}: {}", i + 1, port);
                }
            }
            Ok(())
        }

        Commands::Generate { output, tonic, bpm } => {
            let builder = demo_scale(tonic, bpm)?;
            builder.save(&output)?;
            println!(
                "Wrote {} major scale to {}",
                pitch::note_name(tonic, config.use_flats),
                output
            );
            Ok(())
        }

        Commands::GenerateConfig { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Configuration file generated: {}", output);
            Ok(())
        }
    }
}
