use midi_tracks::NoteEvent;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Chromatic class of a pitch in 1–12 (C = 1). Octave is discarded.
pub fn pitch_class(pitch: u8) -> u8 {
    (pitch % 12) + 1
}

/// Pitch classes of a melody, in note order.
pub fn melody_stream(notes: &[NoteEvent]) -> Vec<u8> {
    notes.iter().map(|n| pitch_class(n.pitch)).collect()
}

/// Scientific pitch name: 60 → "C4", 61 → "C#4".
pub fn pitch_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}
