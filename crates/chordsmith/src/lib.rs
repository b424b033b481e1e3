//! Chord prediction data shaping.
//!
//! Turns MIDI files into fixed-width training rows (melody pitch-class
//! windows paired with padded chord labels), trains a classifier over them,
//! and renders predicted chords back onto a melody's timeline.

pub mod align;
pub mod artifact;
pub mod chords;
pub mod classifier;
pub mod corpus;
pub mod engine;
pub mod labels;
pub mod pitch;
pub mod synth;
pub mod types;

pub use align::{inference_windows, training_rows};
pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use chords::group_chords;
pub use classifier::{exact_match_accuracy, predict_checked, ChordClassifier, NearestWindowClassifier};
pub use corpus::{file_rows, CorpusBuilder, CorpusReport, SkippedFile, TrainingSet};
pub use engine::{Harmonization, Harmonizer};
pub use labels::{max_chord_width, normalize_label, normalize_labels, PADDING};
pub use pitch::{melody_stream, pitch_class, pitch_name};
pub use synth::{ChordSlot, ChordTimeline, RenderOptions, TimingSource};
pub use types::{ChordEvent, FeatureTable, LabelVector, TrainingRow, Window};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing track: {0}")]
    MissingTrack(String),

    #[error("no harmony track to take chord labels from")]
    MissingHarmony,

    #[error("no training rows in corpus")]
    EmptyCorpus,

    #[error("{what} has width {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("sequence length must be at least 1")]
    InvalidSeqLength,

    #[error(transparent)]
    Midi(midi_tracks::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("model artifact: {0}")]
    Artifact(String),
}

impl From<midi_tracks::Error> for Error {
    fn from(err: midi_tracks::Error) -> Self {
        match err {
            midi_tracks::Error::MissingTrack(what) => Error::MissingTrack(what),
            other => Error::Midi(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
