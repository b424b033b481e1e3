use serde::{Deserialize, Serialize};

/// MIDI channel index reserved for percussion (channel 10 in 1-based terms).
pub const DRUM_CHANNEL: u8 = 9;

/// A single note with absolute timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start: f64,
    pub end: f64,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(pitch: u8, start: f64, end: f64, velocity: u8) -> Self {
        Self {
            pitch,
            start,
            end,
            velocity,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// The notes one instrument plays: a single (track, channel) pair of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentTrack {
    /// Position among the file's note-bearing instruments.
    pub index: usize,
    /// Index of the SMF track chunk the notes came from.
    pub source_track: usize,
    pub channel: u8,
    pub program: u8,
    pub name: Option<String>,
    pub is_drum: bool,
    /// Ordered by onset, then pitch.
    pub notes: Vec<NoteEvent>,
}

impl InstrumentTrack {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end).fold(0.0, f64::max)
    }
}

/// Which instruments act as melody and harmony for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    pub melody: usize,
    pub harmony: Option<usize>,
}

/// Select melody and harmony instruments.
///
/// Melody is instrument 0, or instrument 1 when instrument 0 is a drum track.
/// Harmony is the first non-drum instrument after the melody.
pub fn select_tracks(instruments: &[InstrumentTrack]) -> crate::Result<TrackSelection> {
    let first = instruments
        .first()
        .ok_or_else(|| crate::Error::MissingTrack("file has no instrument tracks".to_string()))?;

    let melody = if first.is_drum {
        if instruments.len() < 2 {
            return Err(crate::Error::MissingTrack(
                "only a percussion track is present".to_string(),
            ));
        }
        1
    } else {
        0
    };

    let harmony = instruments
        .iter()
        .skip(melody + 1)
        .find(|t| !t.is_drum)
        .map(|t| t.index);

    Ok(TrackSelection { melody, harmony })
}
