use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{ChordClassifier, NearestWindowClassifier};
use crate::types::FeatureTable;
use crate::{Error, Result};

/// Bump when the artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A trained classifier saved together with the shapes it was trained on.
///
/// Inference must encode windows with `seq_length` and expects labels of
/// exactly `max_chord_width`, so both travel with the parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub classifier_name: String,
    pub seq_length: usize,
    pub max_chord_width: usize,
    pub training_rows: usize,
    pub classifier: NearestWindowClassifier,
}

impl ModelArtifact {
    pub fn train(table: &FeatureTable) -> Result<Self> {
        let classifier = NearestWindowClassifier::train(table)?;
        info!(
            rows = table.len(),
            distinct_windows = classifier.distinct_windows(),
            width = table.width(),
            "trained chord classifier"
        );

        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            classifier_name: classifier.name().to_string(),
            seq_length: table.seq_length(),
            max_chord_width: table.width(),
            training_rows: table.len(),
            classifier,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Artifact(format!("serializing model: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)
            .map_err(|e| Error::Artifact(format!("deserializing model: {e}")))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, self.to_json()?).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "saved model artifact");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::Artifact(format!(
                "unsupported artifact format {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if self.seq_length == 0 {
            return Err(Error::InvalidSeqLength);
        }
        if self.classifier.seq_length() != self.seq_length {
            return Err(Error::ShapeMismatch {
                what: "stored window length",
                expected: self.seq_length,
                actual: self.classifier.seq_length(),
            });
        }
        if self.classifier.label_width() != self.max_chord_width {
            return Err(Error::ShapeMismatch {
                what: "stored label width",
                expected: self.max_chord_width,
                actual: self.classifier.label_width(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelVector, Window};

    fn table() -> FeatureTable {
        FeatureTable::new(
            2,
            3,
            vec![Window::new(&[1, 5]), Window::new(&[5, 8])],
            vec![
                LabelVector::new(vec![60, 64, 67]),
                LabelVector::new(vec![65, 0, 0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn save_and_load_preserve_shapes_and_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/chords.json");

        let artifact = ModelArtifact::train(&table()).unwrap();
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.seq_length, 2);
        assert_eq!(loaded.max_chord_width, 3);
        assert_eq!(loaded.training_rows, 2);
        assert_eq!(loaded.classifier_name, "nearest_window");
        assert_eq!(loaded.classifier, artifact.classifier);

        let window = [Window::new(&[5, 8])];
        assert_eq!(
            loaded.classifier.predict(&window).unwrap(),
            artifact.classifier.predict(&window).unwrap()
        );
    }

    #[test]
    fn future_format_rejected() {
        let mut artifact = ModelArtifact::train(&table()).unwrap();
        artifact.format_version = ARTIFACT_FORMAT_VERSION + 1;
        let json = serde_json::to_string(&artifact).unwrap();

        assert!(matches!(
            ModelArtifact::from_json(&json),
            Err(Error::Artifact(_))
        ));
    }

    #[test]
    fn tampered_width_rejected() {
        let mut artifact = ModelArtifact::train(&table()).unwrap();
        artifact.max_chord_width = 4;
        let json = serde_json::to_string(&artifact).unwrap();

        assert!(matches!(
            ModelArtifact::from_json(&json),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelArtifact::load(&dir.path().join("nope.json")),
            Err(Error::Io { .. })
        ));
    }
}
