//! Melody-to-chords inference.

use std::sync::Arc;

use midi_tracks::MidiFile;
use tracing::{info, warn};

use crate::align::inference_windows;
use crate::artifact::ModelArtifact;
use crate::classifier::{predict_checked, ChordClassifier};
use crate::pitch::melody_stream;
use crate::synth::{chord_names, synthesize, ChordTimeline, RenderOptions};
use crate::types::{LabelVector, Window};
use crate::{Error, Result};

/// Predicted chords for one input file and the timeline they render to.
#[derive(Debug, Clone)]
pub struct Harmonization {
    pub windows: Vec<Window>,
    pub predicted: Vec<LabelVector>,
    pub timeline: ChordTimeline,
    pitch_offset: u8,
}

impl Harmonization {
    /// Note names for each predicted chord, in prediction order.
    pub fn chord_names(&self) -> Vec<Vec<String>> {
        self.predicted
            .iter()
            .map(|chord| chord_names(chord, self.pitch_offset))
            .collect()
    }

    pub fn to_midi_bytes(&self) -> Vec<u8> {
        self.timeline.to_midi_bytes()
    }
}

/// Runs a trained classifier over melody files.
#[derive(Clone)]
pub struct Harmonizer {
    classifier: Arc<dyn ChordClassifier>,
    options: RenderOptions,
}

impl std::fmt::Debug for Harmonizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harmonizer")
            .field("classifier", &self.classifier.name())
            .field("seq_length", &self.classifier.seq_length())
            .field("label_width", &self.classifier.label_width())
            .field("options", &self.options)
            .finish()
    }
}

impl Harmonizer {
    pub fn new(classifier: Arc<dyn ChordClassifier>, options: RenderOptions) -> Result<Self> {
        if classifier.seq_length() == 0 {
            return Err(Error::InvalidSeqLength);
        }
        Ok(Self {
            classifier,
            options,
        })
    }

    pub fn from_artifact(artifact: ModelArtifact, options: RenderOptions) -> Result<Self> {
        Self::new(Arc::new(artifact.classifier), options)
    }

    pub fn seq_length(&self) -> usize {
        self.classifier.seq_length()
    }

    pub fn harmonize(&self, file: &MidiFile) -> Result<Harmonization> {
        let selection = file.select_tracks()?;
        let melody = file
            .instrument(selection.melody)
            .ok_or_else(|| Error::MissingTrack(format!("instrument {}", selection.melody)))?;

        let stream = melody_stream(&melody.notes);
        let windows = inference_windows(&stream, self.seq_length())?;
        if windows.is_empty() {
            warn!(
                melody_notes = stream.len(),
                seq_length = self.seq_length(),
                "melody too short for any window; output will have no chords"
            );
        }

        let predicted = predict_checked(self.classifier.as_ref(), &windows)?;
        let timeline = synthesize(file, &selection, &predicted, &self.options)?;

        info!(
            windows = windows.len(),
            timing = %timeline.timing,
            slots = timeline.slots.len(),
            placed = timeline.placed,
            "harmonized melody"
        );

        Ok(Harmonization {
            windows,
            predicted,
            timeline,
            pitch_offset: self.options.pitch_offset,
        })
    }

    pub fn harmonize_bytes(&self, midi_bytes: &[u8]) -> Result<Harmonization> {
        let file = MidiFile::parse(midi_bytes)?;
        self.harmonize(&file)
    }
}
