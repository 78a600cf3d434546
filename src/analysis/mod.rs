//! Musical facts derived from parsed events

pub mod notes;
pub mod summary;
pub mod tempo;

pub use notes::{
    extract_file_notes, extract_notes, extract_track_notes, Note, NoteExtraction, NoteOptions,
    NotePairing,
};
pub use summary::FileSummary;
pub use tempo::{TempoMap, TempoSegment};
