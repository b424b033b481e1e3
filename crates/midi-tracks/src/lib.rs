pub mod midi_writer;
pub mod note;
pub mod parse;
pub mod tempo;

pub use midi_writer::{tracks_to_midi, TrackSpec};
pub use note::{select_tracks, InstrumentTrack, NoteEvent, TrackSelection, DRUM_CHANNEL};
pub use parse::MidiFile;
pub use tempo::{TempoChange, TempoMap, TimeSignature, DEFAULT_TEMPO};

use std::path::PathBuf;

/// Errors from MIDI track extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("no usable melody track: {0}")]
    MissingTrack(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
