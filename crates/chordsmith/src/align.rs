use crate::types::{ChordEvent, TrainingRow, Window};
use crate::{Error, Result};

/// Sliding windows (step 1) over a melody's pitch classes, for prediction.
///
/// Yields `len - seq_length` windows; the last complete window is not
/// included, matching the training-time row count.
pub fn inference_windows(melody: &[u8], seq_length: usize) -> Result<Vec<Window>> {
    if seq_length == 0 {
        return Err(Error::InvalidSeqLength);
    }

    let count = melody.len().saturating_sub(seq_length);
    Ok((0..count)
        .map(|i| Window::new(&melody[i..i + seq_length]))
        .collect())
}

/// Pair each melody window with the chord sharing its start index.
///
/// Alignment is by index, not by time: window `i` is labelled with
/// `chords[i]`.
pub fn training_rows(
    melody: &[u8],
    chords: &[ChordEvent],
    seq_length: usize,
) -> Result<Vec<TrainingRow>> {
    if seq_length == 0 {
        return Err(Error::InvalidSeqLength);
    }

    let count = melody.len().min(chords.len()).saturating_sub(seq_length);
    Ok((0..count)
        .map(|i| TrainingRow {
            window: Window::new(&melody[i..i + seq_length]),
            label: chords[i].pitches.clone(),
        })
        .collect())
}
