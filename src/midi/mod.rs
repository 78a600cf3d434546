//! Byte-level reading and writing of Standard MIDI Files

pub mod chunk;
pub mod cursor;
pub mod event;
pub mod header;
pub mod reader;
pub mod vlq;
pub mod writer;

pub use chunk::{read_chunks, Chunk, ChunkInfo};
pub use event::{ChannelMessage, EventKind, MetaEvent, TrackEvent};
pub use header::{Division, Format, Header};
pub use reader::{MidiFile, ParseOptions, Track};
pub use writer::SequenceBuilder;
