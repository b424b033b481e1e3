use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A set of harmony notes sharing one onset time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    /// Onset in seconds, shared by every member note
    pub start: f64,
    /// End of the first member note
    pub end: f64,
    /// Absolute MIDI pitches in track order; duplicates allowed
    pub pitches: Vec<u8>,
}

impl ChordEvent {
    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }
}

/// A contiguous run of melody pitch classes (each 1–12) fed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Window(Vec<u8>);

impl Window {
    pub fn new(pitch_classes: &[u8]) -> Self {
        Self(pitch_classes.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of positions at which the two windows differ.
    pub fn hamming(&self, other: &Window) -> usize {
        let mismatched = self
            .0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a != b)
            .count();
        mismatched + self.0.len().abs_diff(other.0.len())
    }
}

/// A fixed-width chord label: pitches first, zero padding after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelVector(Vec<u8>);

impl LabelVector {
    pub fn new(values: Vec<u8>) -> Self {
        Self(values)
    }

    pub fn zeros(width: usize) -> Self {
        Self(vec![0; width])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One training example before label normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub window: Window,
    pub label: Vec<u8>,
}

/// Rectangular pairing of windows and label vectors, row for row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    seq_length: usize,
    width: usize,
    windows: Vec<Window>,
    labels: Vec<LabelVector>,
}

impl FeatureTable {
    /// Build a table, rejecting rows that break its rectangular shape.
    pub fn new(
        seq_length: usize,
        width: usize,
        windows: Vec<Window>,
        labels: Vec<LabelVector>,
    ) -> Result<Self> {
        if windows.len() != labels.len() {
            return Err(Error::ShapeMismatch {
                what: "label rows",
                expected: windows.len(),
                actual: labels.len(),
            });
        }
        if let Some(bad) = windows.iter().find(|w| w.len() != seq_length) {
            return Err(Error::ShapeMismatch {
                what: "feature row",
                expected: seq_length,
                actual: bad.len(),
            });
        }
        crate::labels::check_width("label vector", &labels, width)?;

        Ok(Self {
            seq_length,
            width,
            windows,
            labels,
        })
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn labels(&self) -> &[LabelVector] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Window, &LabelVector)> {
        self.windows.iter().zip(self.labels.iter())
    }

    /// Split off every k-th row (k ≈ 1 / fraction) as a holdout table.
    ///
    /// Returns `None` for the holdout when the fraction is not positive or
    /// the table is too small to give up a row.
    pub fn split_holdout(&self, fraction: f64) -> (FeatureTable, Option<FeatureTable>) {
        if fraction.is_nan() || fraction <= 0.0 || self.len() < 2 {
            return (self.clone(), None);
        }

        let stride = ((1.0 / fraction.min(0.5)).round() as usize).max(2);
        let mut train = self.empty_like();
        let mut holdout = self.empty_like();

        for (i, (window, label)) in self.rows().enumerate() {
            let target = if (i + 1) % stride == 0 {
                &mut holdout
            } else {
                &mut train
            };
            target.windows.push(window.clone());
            target.labels.push(label.clone());
        }

        if holdout.is_empty() {
            (train, None)
        } else {
            (train, Some(holdout))
        }
    }

    fn empty_like(&self) -> FeatureTable {
        FeatureTable {
            seq_length: self.seq_length,
            width: self.width,
            windows: Vec::new(),
            labels: Vec::new(),
        }
    }
}
