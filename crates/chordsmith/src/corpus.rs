//! Corpus building for training.
//!
//! Files are folded one at a time into a `CorpusBuilder` value. Per-file
//! failures are recorded and skipped; only `finish` can fail the corpus,
//! because label width is a property of every file together.

use midi_tracks::MidiFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::training_rows;
use crate::chords::group_chords;
use crate::labels::normalize_labels;
use crate::pitch::melody_stream;
use crate::types::{FeatureTable, TrainingRow, Window};
use crate::{Error, Result};

/// A file excluded from the corpus and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusReport {
    pub seq_length: usize,
    pub max_chord_width: usize,
    pub rows: usize,
    pub files_used: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

/// Normalized training data plus how it was assembled.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub table: FeatureTable,
    pub report: CorpusReport,
}

/// Accumulates training rows across files.
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    seq_length: usize,
    windows: Vec<Window>,
    labels: Vec<Vec<u8>>,
    files_used: Vec<String>,
    skipped: Vec<SkippedFile>,
}

impl CorpusBuilder {
    pub fn new(seq_length: usize) -> Result<Self> {
        if seq_length == 0 {
            return Err(Error::InvalidSeqLength);
        }
        Ok(Self {
            seq_length,
            windows: Vec::new(),
            labels: Vec::new(),
            files_used: Vec::new(),
            skipped: Vec::new(),
        })
    }

    /// Fold one loaded (or failed-to-load) file into the corpus.
    pub fn absorb<E>(self, source: impl Into<String>, file: std::result::Result<MidiFile, E>) -> Self
    where
        E: Into<Error>,
    {
        let source = source.into();
        let rows = file
            .map_err(Into::into)
            .and_then(|file| file_rows(&file, self.seq_length));

        match rows {
            Ok(rows) => self.with_rows(source, rows),
            Err(e) => self.with_skipped(source, e),
        }
    }

    pub fn rows(&self) -> usize {
        self.windows.len()
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Normalize every label to the corpus-wide width.
    pub fn finish(self) -> Result<TrainingSet> {
        if self.windows.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let (width, labels) = normalize_labels(&self.labels)?;
        let rows = self.windows.len();
        let table = FeatureTable::new(self.seq_length, width, self.windows, labels)?;

        Ok(TrainingSet {
            table,
            report: CorpusReport {
                seq_length: self.seq_length,
                max_chord_width: width,
                rows,
                files_used: self.files_used,
                skipped: self.skipped,
            },
        })
    }

    fn with_rows(mut self, source: String, rows: Vec<TrainingRow>) -> Self {
        debug!(source = %source, rows = rows.len(), "absorbed training file");
        for row in rows {
            self.windows.push(row.window);
            self.labels.push(row.label);
        }
        self.files_used.push(source);
        self
    }

    fn with_skipped(mut self, source: String, error: Error) -> Self {
        warn!(source = %source, reason = %error, "skipping training file");
        self.skipped.push(SkippedFile {
            source,
            reason: error.to_string(),
        });
        self
    }
}

/// Training rows for one file: melody windows paired with harmony chords.
pub fn file_rows(file: &MidiFile, seq_length: usize) -> Result<Vec<TrainingRow>> {
    let selection = file.select_tracks()?;
    let harmony = selection
        .harmony
        .and_then(|index| file.instrument(index))
        .ok_or(Error::MissingHarmony)?;
    let melody = file
        .instrument(selection.melody)
        .ok_or_else(|| Error::MissingTrack(format!("instrument {}", selection.melody)))?;

    let stream = melody_stream(&melody.notes);
    let chords = group_chords(&harmony.notes);
    training_rows(&stream, &chords, seq_length)
}
