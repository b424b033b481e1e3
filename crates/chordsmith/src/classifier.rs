use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::labels::check_width;
use crate::types::{FeatureTable, LabelVector, Window};
use crate::{Error, Result};

/// Trait for chord prediction backends.
///
/// Receives fixed-width melody windows and returns one fixed-width label
/// vector per window. Callers validate both shapes around every call.
pub trait ChordClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn seq_length(&self) -> usize;

    fn label_width(&self) -> usize;

    fn predict(&self, windows: &[Window]) -> Result<Vec<LabelVector>>;
}

/// Run a classifier with shape checks on both sides of the call.
pub fn predict_checked(
    classifier: &dyn ChordClassifier,
    windows: &[Window],
) -> Result<Vec<LabelVector>> {
    if let Some(bad) = windows.iter().find(|w| w.len() != classifier.seq_length()) {
        return Err(Error::ShapeMismatch {
            what: "feature row",
            expected: classifier.seq_length(),
            actual: bad.len(),
        });
    }

    let predicted = classifier.predict(windows)?;
    if predicted.len() != windows.len() {
        return Err(Error::ShapeMismatch {
            what: "prediction rows",
            expected: windows.len(),
            actual: predicted.len(),
        });
    }
    check_width("predicted chord", &predicted, classifier.label_width())?;

    Ok(predicted)
}

/// Fraction of rows for which the prediction matches the label exactly.
pub fn exact_match_accuracy(classifier: &dyn ChordClassifier, table: &FeatureTable) -> Result<f64> {
    if table.is_empty() {
        return Ok(0.0);
    }

    let predicted = predict_checked(classifier, table.windows())?;
    let hits = predicted
        .iter()
        .zip(table.labels())
        .filter(|(p, l)| p == l)
        .count();

    Ok(hits as f64 / table.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LabelCount {
    label: LabelVector,
    count: usize,
}

/// A distinct training window and every label seen with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WindowEntry {
    window: Window,
    labels: Vec<LabelCount>,
}

impl WindowEntry {
    /// Most frequent label; earliest seen wins ties.
    fn majority(&self) -> Option<&LabelCount> {
        self.labels
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.count.cmp(&b.count).then(ib.cmp(ia)))
            .map(|(_, lc)| lc)
    }
}

/// Memorizes training windows and answers with the label of the closest one.
///
/// Distance is Hamming distance over pitch classes. Ties go to the window
/// whose majority label was seen more often, then to the earliest window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestWindowClassifier {
    seq_length: usize,
    label_width: usize,
    entries: Vec<WindowEntry>,
}

impl NearestWindowClassifier {
    pub fn train(table: &FeatureTable) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut entries: Vec<WindowEntry> = Vec::new();
        let mut index: HashMap<&Window, usize> = HashMap::new();

        for (window, label) in table.rows() {
            let slot = *index.entry(window).or_insert_with(|| {
                entries.push(WindowEntry {
                    window: window.clone(),
                    labels: Vec::new(),
                });
                entries.len() - 1
            });

            let entry = &mut entries[slot];
            match entry.labels.iter_mut().find(|lc| &lc.label == label) {
                Some(lc) => lc.count += 1,
                None => entry.labels.push(LabelCount {
                    label: label.clone(),
                    count: 1,
                }),
            }
        }

        Ok(Self {
            seq_length: table.seq_length(),
            label_width: table.width(),
            entries,
        })
    }

    /// Number of distinct windows memorized.
    pub fn distinct_windows(&self) -> usize {
        self.entries.len()
    }

    fn predict_one(&self, window: &Window) -> LabelVector {
        let mut best: Option<(usize, usize, &LabelVector)> = None;

        for entry in &self.entries {
            let Some(majority) = entry.majority() else {
                continue;
            };
            let distance = entry.window.hamming(window);

            let better = match best {
                None => true,
                Some((d, count, _)) => distance < d || (distance == d && majority.count > count),
            };
            if better {
                best = Some((distance, majority.count, &majority.label));
            }
        }

        best.map(|(_, _, label)| label.clone())
            .unwrap_or_else(|| LabelVector::zeros(self.label_width))
    }
}

impl ChordClassifier for NearestWindowClassifier {
    fn name(&self) -> &'static str {
        "nearest_window"
    }

    fn seq_length(&self) -> usize {
        self.seq_length
    }

    fn label_width(&self) -> usize {
        self.label_width
    }

    fn predict(&self, windows: &[Window]) -> Result<Vec<LabelVector>> {
        Ok(windows.iter().map(|w| self.predict_one(w)).collect())
    }
}
