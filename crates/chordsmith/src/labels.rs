use crate::types::LabelVector;
use crate::{Error, Result};

/// Value filling unused label slots.
pub const PADDING: u8 = 0;

/// Widest chord across the whole corpus.
pub fn max_chord_width(labels: &[Vec<u8>]) -> Result<usize> {
    labels
        .iter()
        .map(Vec::len)
        .max()
        .ok_or(Error::EmptyCorpus)
}

/// Right-pad with `PADDING` or keep only the first `width` pitches.
pub fn normalize_label(label: &[u8], width: usize) -> LabelVector {
    let mut values: Vec<u8> = label.iter().copied().take(width).collect();
    values.resize(width, PADDING);
    LabelVector::new(values)
}

/// Two passes over the corpus: find the width, then pad or truncate to it.
pub fn normalize_labels(labels: &[Vec<u8>]) -> Result<(usize, Vec<LabelVector>)> {
    let width = max_chord_width(labels)?;
    let rows = labels.iter().map(|l| normalize_label(l, width)).collect();
    Ok((width, rows))
}

/// Reject any row whose width differs from the trained width.
pub fn check_width(what: &'static str, rows: &[LabelVector], width: usize) -> Result<()> {
    match rows.iter().find(|r| r.len() != width) {
        Some(bad) => Err(Error::ShapeMismatch {
            what,
            expected: width,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_padded() {
        assert_eq!(normalize_label(&[5], 3).as_slice(), &[5, 0, 0]);
    }

    #[test]
    fn long_label_keeps_first_entries() {
        assert_eq!(normalize_label(&[5, 9, 2, 7], 3).as_slice(), &[5, 9, 2]);
    }

    #[test]
    fn exact_width_unchanged() {
        assert_eq!(normalize_label(&[60, 64, 67], 3).as_slice(), &[60, 64, 67]);
    }

    #[test]
    fn corpus_width_is_widest_chord() {
        let labels = vec![vec![60], vec![60, 64, 67, 71], vec![62, 65]];
        let (width, rows) = normalize_labels(&labels).unwrap();

        assert_eq!(width, 4);
        assert!(rows.iter().all(|r| r.len() == 4));
        assert_eq!(rows[0].as_slice(), &[60, 0, 0, 0]);
        assert_eq!(rows[1].as_slice(), &[60, 64, 67, 71]);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        assert!(matches!(max_chord_width(&[]), Err(Error::EmptyCorpus)));
        assert!(matches!(normalize_labels(&[]), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn width_check() {
        let rows = vec![LabelVector::new(vec![60, 0]), LabelVector::new(vec![60])];
        assert!(check_width("prediction", &rows[..1], 2).is_ok());
        assert!(matches!(
            check_width("prediction", &rows, 2),
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }
}
